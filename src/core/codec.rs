//! Value codec - conversions between stored text and typed values
//!
//! Every persisted field is text (legacy stores and CSV files only know
//! strings), so all numeric parsing and formatting goes through here.

/// Placeholder shown for a statistic that could not be computed
pub const MISSING: &str = "—";

/// Default number of decimals used when writing tolerance values
pub const CANONICAL_DECIMALS: usize = 6;

/// Parse a numeric field
///
/// Returns `None` for empty text, unparseable text, and non-finite values
/// (`inf`, `NaN`), which carry no engineering meaning.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a numeric field, falling back to `default` when it is unset or invalid
pub fn parse_or(text: &str, default: f64) -> f64 {
    parse_number(text).unwrap_or(default)
}

/// Format a value with fixed precision, then trim trailing zeros
///
/// `-0` collapses to `0` so that values computed as `x - x` never persist
/// with a sign.
pub fn format_number(value: f64, decimals: usize) -> String {
    let mut text = format!("{:.*}", decimals, value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

/// Format a tolerance value the way it is persisted
pub fn format_canonical(value: f64) -> String {
    format_number(value, CANONICAL_DECIMALS)
}

/// Lossless text for geometry fields (shortest round-trip representation)
pub fn to_text(value: f64) -> String {
    if value == 0.0 {
        // Covers -0.0 as well
        return "0".to_string();
    }
    value.to_string()
}

/// Format an optional statistic for reports
pub fn format_stat(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => MISSING.to_string(),
    }
}

/// Parse a 1-based page number, defaulting to page 1
pub fn parse_page(text: &str) -> u32 {
    text.trim()
        .parse::<u32>()
        .ok()
        .or_else(|| parse_number(text).map(|v| v.round().max(1.0) as u32))
        .filter(|p| *p >= 1)
        .unwrap_or(1)
}
