//! CLI command implementations

pub mod export;
pub mod feat;
pub mod init;
pub mod spc;
pub mod tol;
pub mod undo;
pub mod wo;
