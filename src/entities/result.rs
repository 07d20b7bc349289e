//! Inspection results - one text cell per (feature, work order)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::codec;

/// Pass/fail classification of a result cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    /// Not enough information to decide
    #[serde(rename = "—")]
    Unknown,
}

impl Verdict {
    /// Classify a result against a tolerance band
    ///
    /// Literal `PASS`/`FAIL` (any case) wins. A numeric result is compared
    /// against the limits when both parse; anything else is unknown.
    pub fn evaluate(result: &str, lsl: &str, usl: &str) -> Self {
        let result = result.trim();
        if result.eq_ignore_ascii_case("PASS") {
            return Verdict::Pass;
        }
        if result.eq_ignore_ascii_case("FAIL") {
            return Verdict::Fail;
        }

        let (Some(value), Some(lo), Some(hi)) = (
            codec::parse_number(result),
            codec::parse_number(lsl),
            codec::parse_number(usl),
        ) else {
            return Verdict::Unknown;
        };

        if lo <= value && value <= hi {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
            Verdict::Unknown => write!(f, "{}", codec::MISSING),
        }
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pass" => Ok(Verdict::Pass),
            "fail" => Ok(Verdict::Fail),
            "unknown" | "—" | "-" => Ok(Verdict::Unknown),
            _ => Err(format!(
                "Invalid verdict: '{}'. Use 'pass', 'fail' or 'unknown'",
                s
            )),
        }
    }
}

/// Normalize a typed result before it is stored
///
/// `P`/`PASS` and `F`/`FAIL` shorthands are expanded (any case); other text is
/// kept as typed, minus surrounding whitespace.
pub fn normalize_result_entry(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.to_uppercase().as_str() {
        "P" | "PASS" => "PASS".to_string(),
        "F" | "FAIL" => "FAIL".to_string(),
        _ => trimmed.to_string(),
    }
}

/// A stored result with its provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub feature_id: String,
    pub workorder: String,
    pub result: String,
    /// `None` when the stored timestamp cannot be read
    pub updated_at: Option<DateTime<Utc>>,
}
