//! Core module - storage, parsing and session logic

pub mod codec;
pub mod config;
pub mod debounce;
pub mod export;
pub mod session;
pub mod spc;
pub mod store;
pub mod tolerance;
pub mod undo;

pub use config::Config;
pub use debounce::Debouncer;
pub use export::{ExportError, ExportFilter, InspectionRow};
pub use session::{EditCommand, Mode, ResultEntry, Session, SessionError, Workspace};
pub use spc::{FeatureSpc, FeatureStats, Measurement};
pub use store::{
    Database, DocumentPaths, FeatureSnapshot, FeatureStore, MigrationError, MigrationOutcome,
    ResultStore, StoreError, StoreOptions,
};
pub use tolerance::{Tolerance, ToleranceError};
pub use undo::{Revert, UndoError, UndoLog, UndoOutcome};
