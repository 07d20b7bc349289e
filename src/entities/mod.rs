//! Entity type definitions

pub mod feature;
pub mod result;

pub use feature::{Feature, FeatureField, FeatureRecord, FeatureUpdate, NewFeature, ValidationError};
pub use result::{normalize_result_entry, ResultRow, Verdict};
