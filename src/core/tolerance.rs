//! Tolerance expression parsing
//!
//! Turns free-text drawing callouts into a nominal value and a tolerance
//! band. Accepted forms, tried in this order:
//!
//! 1. Symmetric bilateral: `12.5 ±0.2`, `12.5 +/- 0.2`, `12.5+-0.2`
//! 2. Asymmetric bilateral: `10 +0.1 -0.2`, `10 -0.2/+0.1`
//! 3. Plain number with a tolerance implied by its precision: `5.25`
//!
//! The parser is pure; callers decide what to do with a failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::codec;

/// Separators accepted between the nominal and a symmetric tolerance
const SYMMETRIC_SEPARATORS: &[&str] = &["±", "+/-", "/-+", "+-", "+/", "+"];

/// Errors produced when an expression cannot be read as a tolerance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToleranceError {
    #[error("Tolerance expression is empty")]
    Empty,

    #[error("Unrecognized tolerance format: '{0}'")]
    Unrecognized(String),
}

/// A nominal value with its lower and upper specification limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub nominal: f64,
    pub lsl: f64,
    pub usl: f64,
}

impl Tolerance {
    /// Tolerance band centred on `nominal`
    pub fn symmetric(nominal: f64, tol: f64) -> Self {
        let tol = tol.abs();
        Self {
            nominal,
            lsl: nominal - tol,
            usl: nominal + tol,
        }
    }

    /// Canonical text for the nominal, LSL and USL fields
    pub fn to_fields(&self) -> (String, String, String) {
        (
            codec::format_canonical(self.nominal),
            codec::format_canonical(self.lsl),
            codec::format_canonical(self.usl),
        )
    }
}

/// Replace Unicode sign variants, drop diameter symbols, trim
pub fn normalize(expr: &str) -> String {
    let replaced: String = expr
        .chars()
        .filter(|c| !matches!(c, 'Ø' | 'ø'))
        .map(|c| match c {
            '\u{2212}' | '\u{FF0D}' | '\u{2013}' | '\u{FE63}' => '-',
            '\u{FF0B}' | '\u{FE62}' => '+',
            other => other,
        })
        .collect();
    replaced.trim().to_string()
}

/// Parse a tolerance expression into nominal / LSL / USL
pub fn parse(expr: &str) -> Result<Tolerance, ToleranceError> {
    let text = normalize(expr);
    if text.is_empty() {
        return Err(ToleranceError::Empty);
    }

    let parsed = parse_symmetric(&text)
        .or_else(|| parse_asymmetric(&text))
        .or_else(|| parse_plain(&text));
    match parsed {
        Some(tol) => Ok(tol),
        None => Err(ToleranceError::Unrecognized(text)),
    }
}

fn parse_symmetric(text: &str) -> Option<Tolerance> {
    let mut cursor = Cursor::new(text);
    let nominal = cursor.number(true)?;
    cursor.skip_ws();
    let after_nominal = cursor.pos;

    for sep in SYMMETRIC_SEPARATORS {
        let mut attempt = Cursor {
            text,
            pos: after_nominal,
        };
        if !attempt.eat(sep) {
            continue;
        }
        attempt.skip_ws();
        if let Some(tol) = attempt.number(true) {
            if attempt.at_end() {
                return Some(Tolerance::symmetric(nominal.value, tol.value));
            }
        }
    }
    None
}

fn parse_asymmetric(text: &str) -> Option<Tolerance> {
    let mut cursor = Cursor::new(text);
    let nominal = cursor.number(true)?.value;
    cursor.skip_ws();
    let first = cursor.delta()?;
    cursor.skip_ws();
    if cursor.eat("/") {
        cursor.skip_ws();
    }
    let second = cursor.delta()?;
    if !cursor.at_end() {
        return None;
    }

    let (plus, minus) = if first >= 0.0 && second <= 0.0 {
        (first, -second)
    } else if second >= 0.0 && first <= 0.0 {
        (second, -first)
    } else {
        // Both deltas share a sign: read them as offsets from nominal
        return Some(Tolerance {
            nominal,
            lsl: nominal + first.min(second),
            usl: nominal + first.max(second),
        });
    };

    Some(Tolerance {
        nominal,
        lsl: nominal - minus,
        usl: nominal + plus,
    })
}

fn parse_plain(text: &str) -> Option<Tolerance> {
    let mut cursor = Cursor::new(text);
    let number = cursor.number(true)?;
    if !cursor.at_end() {
        return None;
    }
    Some(Tolerance::symmetric(
        number.value,
        implied_tolerance(number.decimals),
    ))
}

/// Tolerance implied by the number of decimals written on the drawing
pub fn implied_tolerance(decimals: usize) -> f64 {
    match decimals {
        1 => 0.03,
        2 => 0.01,
        _ => 0.005,
    }
}

/// A number read from the expression, with its written precision
struct Number {
    value: f64,
    decimals: usize,
}

/// Byte cursor over a normalized expression
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn eat_sign(&mut self) -> Option<char> {
        match self.rest().chars().next() {
            Some(c @ ('+' | '-')) => {
                self.pos += 1;
                Some(c)
            }
            _ => None,
        }
    }

    fn digits(&mut self) -> &'a str {
        let rest = self.rest();
        let len = rest.bytes().take_while(u8::is_ascii_digit).count();
        self.pos += len;
        &rest[..len]
    }

    /// `[+-]?digits(.digits)?` or `[+-]?.digits`; a trailing dot is not a number
    fn number(&mut self, allow_sign: bool) -> Option<Number> {
        let start = self.pos;
        if allow_sign {
            self.eat_sign();
        }
        let int_part = self.digits();
        let mut decimals = 0;
        if self.rest().starts_with('.') {
            let before_dot = self.pos;
            self.pos += 1;
            let frac = self.digits();
            if frac.is_empty() {
                self.pos = before_dot;
            } else {
                decimals = frac.len();
            }
        }
        if int_part.is_empty() && decimals == 0 {
            self.pos = start;
            return None;
        }
        match self.text[start..self.pos].parse::<f64>() {
            Ok(value) => Some(Number { value, decimals }),
            Err(_) => {
                self.pos = start;
                None
            }
        }
    }

    /// A signed offset; the sign is mandatory and may be followed by spaces
    fn delta(&mut self) -> Option<f64> {
        let start = self.pos;
        let Some(sign) = self.eat_sign() else {
            return None;
        };
        self.skip_ws();
        match self.number(false) {
            Some(n) if sign == '-' => Some(-n.value),
            Some(n) => Some(n.value),
            None => {
                self.pos = start;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_band(expr: &str, nominal: f64, lsl: f64, usl: f64) {
        let tol = parse(expr).unwrap_or_else(|e| panic!("{expr}: {e}"));
        assert_close(tol.nominal, nominal);
        assert_close(tol.lsl, lsl);
        assert_close(tol.usl, usl);
    }

    #[test]
    fn test_symmetric_plus_minus_sign() {
        assert_band("12.5 ±0.2", 12.5, 12.3, 12.7);
    }

    #[test]
    fn test_symmetric_ascii_spellings() {
        assert_band("12.5 +/- 0.2", 12.5, 12.3, 12.7);
        assert_band("12.5+-0.2", 12.5, 12.3, 12.7);
        assert_band("12.5 /-+ 0.2", 12.5, 12.3, 12.7);
        assert_band("12.5 +/0.2", 12.5, 12.3, 12.7);
    }

    #[test]
    fn test_symmetric_takes_magnitude_of_tolerance() {
        assert_band("20 ± -0.5", 20.0, 19.5, 20.5);
        assert_band("20 + -0.5", 20.0, 19.5, 20.5);
    }

    #[test]
    fn test_single_plus_delta_reads_as_symmetric() {
        assert_band("10 +0.1", 10.0, 9.9, 10.1);
    }

    #[test]
    fn test_asymmetric_plus_then_minus() {
        assert_band("10 +0.1 -0.2", 10.0, 9.8, 10.1);
    }

    #[test]
    fn test_asymmetric_order_independent() {
        assert_band("10 -0.2 +0.1", 10.0, 9.8, 10.1);
        assert_band("10 -0.2/+0.1", 10.0, 9.8, 10.1);
        assert_band("10 + 0.1 - 0.2", 10.0, 9.8, 10.1);
    }

    #[test]
    fn test_asymmetric_zero_delta() {
        assert_band("5 +0 -0.1", 5.0, 4.9, 5.0);
        assert_band("5 -0 +0.1", 5.0, 5.0, 5.1);
    }

    #[test]
    fn test_asymmetric_same_sign_both_positive() {
        // Both offsets above nominal: band sits entirely above it
        assert_band("10 +0.2 +0.1", 10.0, 10.1, 10.2);
    }

    #[test]
    fn test_asymmetric_same_sign_both_negative() {
        assert_band("10 -0.1 -0.5", 10.0, 9.5, 9.9);
    }

    #[test]
    fn test_plain_two_decimals() {
        assert_band("5.25", 5.25, 5.24, 5.26);
    }

    #[test]
    fn test_plain_one_decimal() {
        assert_band("7.1", 7.1, 7.07, 7.13);
    }

    #[test]
    fn test_plain_integer_and_fine_precision() {
        assert_band("12", 12.0, 11.995, 12.005);
        assert_band("3.125", 3.125, 3.12, 3.13);
        assert_band(".5", 0.5, 0.47, 0.53);
        assert_band("-4.25", -4.25, -4.26, -4.24);
    }

    #[test]
    fn test_normalization() {
        assert_band("Ø12.5 ±0.2", 12.5, 12.3, 12.7);
        assert_band("  10 +0.1 \u{2212}0.2  ", 10.0, 9.8, 10.1);
        assert_band("10 \u{FF0B}0.1 \u{FF0D}0.2", 10.0, 9.8, 10.1);
        assert_eq!(normalize(" ø 4 "), "4");
    }

    #[test]
    fn test_empty_expression() {
        assert_eq!(parse(""), Err(ToleranceError::Empty));
        assert_eq!(parse("   "), Err(ToleranceError::Empty));
        assert_eq!(parse("Ø"), Err(ToleranceError::Empty));
    }

    #[test]
    fn test_unrecognized_keeps_normalized_text() {
        assert_eq!(
            parse("abc"),
            Err(ToleranceError::Unrecognized("abc".to_string()))
        );
        assert_eq!(
            parse(" Ø1.2.3 "),
            Err(ToleranceError::Unrecognized("1.2.3".to_string()))
        );
    }

    #[test]
    fn test_rejects_malformed_numbers() {
        assert!(parse("12.").is_err());
        assert!(parse("10 -0.1").is_err());
        assert!(parse("10 +0.1 -0.2 +0.3").is_err());
        assert!(parse("PASS").is_err());
    }

    #[test]
    fn test_to_fields_canonical_text() {
        let tol = parse("10 +0.1 -0.2").unwrap();
        assert_eq!(
            tol.to_fields(),
            ("10".to_string(), "9.8".to_string(), "10.1".to_string())
        );
        let tol = parse("0 ±0").unwrap();
        assert_eq!(
            tol.to_fields(),
            ("0".to_string(), "0".to_string(), "0".to_string())
        );
    }
}
