//! Filter enums for CLI commands

use clap::ValueEnum;

use crate::entities::result::Verdict;

/// Verdict filter for inspection tables
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum VerdictFilter {
    Pass,
    Fail,
    /// Rows with no decidable verdict
    Unknown,
    #[default]
    All,
}

impl VerdictFilter {
    /// The verdict to keep, or `None` to keep everything
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            VerdictFilter::Pass => Some(Verdict::Pass),
            VerdictFilter::Fail => Some(Verdict::Fail),
            VerdictFilter::Unknown => Some(Verdict::Unknown),
            VerdictFilter::All => None,
        }
    }
}

impl std::fmt::Display for VerdictFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictFilter::Pass => write!(f, "pass"),
            VerdictFilter::Fail => write!(f, "fail"),
            VerdictFilter::Unknown => write!(f, "unknown"),
            VerdictFilter::All => write!(f, "all"),
        }
    }
}
