//! Feature entity - a ballooned characteristic on a drawing
//!
//! A feature is a picked region on one page of the drawing together with its
//! balloon placement, its measurement method and an optional tolerance band.
//! Tolerance fields are kept as text: the empty string means "unset" and
//! round-trips legacy stores unchanged.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::core::codec;

/// Default balloon radius in drawing units
pub const DEFAULT_RADIUS: f64 = 14.0;

/// Column order shared by the store, legacy CSV files and exports
pub const FEATURE_COLUMNS: [&str; 15] = [
    "id", "page", "x", "y", "w", "h", "zoom", "method", "nominal", "lsl", "usl", "bx", "by", "br",
    "username",
];

/// Errors raised when feature input fails validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidValue { field: String, value: String },

    #[error("Unknown or read-only field '{0}'")]
    UnknownField(String),
}

/// A ballooned feature as held in the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    /// 1-based page index
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub zoom: f64,
    pub method: String,
    pub nominal: String,
    pub lsl: String,
    pub usl: String,
    /// Balloon offset from the region centre
    pub bx: f64,
    pub by: f64,
    /// Balloon radius
    pub br: f64,
    pub username: String,
}

impl Feature {
    /// True when none of nominal, LSL or USL is set
    pub fn tolerance_is_blank(&self) -> bool {
        self.nominal.trim().is_empty() && self.lsl.trim().is_empty() && self.usl.trim().is_empty()
    }

    /// Parsed (nominal, LSL, USL); unset or invalid values are `None`
    pub fn limits(&self) -> (Option<f64>, Option<f64>, Option<f64>) {
        (
            codec::parse_number(&self.nominal),
            codec::parse_number(&self.lsl),
            codec::parse_number(&self.usl),
        )
    }
}

/// Trailing ASCII digits of an id, if any
pub fn id_suffix(id: &str) -> Option<u64> {
    let digits = id.len() - id.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    id[id.len() - digits..].parse().ok()
}

/// Text form of a feature, one string per column
///
/// This is the shape of a store row and of a legacy CSV record. Conversion to
/// [`Feature`] is lenient: unreadable numbers fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureRecord {
    pub id: String,
    pub page: String,
    pub x: String,
    pub y: String,
    pub w: String,
    pub h: String,
    pub zoom: String,
    pub method: String,
    pub nominal: String,
    pub lsl: String,
    pub usl: String,
    pub bx: String,
    pub by: String,
    pub br: String,
    pub username: String,
}

impl FeatureRecord {
    /// Values in [`FEATURE_COLUMNS`] order
    pub fn values(&self) -> [&str; 15] {
        [
            &self.id,
            &self.page,
            &self.x,
            &self.y,
            &self.w,
            &self.h,
            &self.zoom,
            &self.method,
            &self.nominal,
            &self.lsl,
            &self.usl,
            &self.bx,
            &self.by,
            &self.br,
            &self.username,
        ]
    }

    pub fn into_feature(self) -> Feature {
        let id = self.id;
        let number = |field: &str, text: &str, default: f64| match codec::parse_number(text) {
            Some(v) => v,
            None => {
                if !text.trim().is_empty() {
                    warn!("Feature {}: unreadable {} '{}', using {}", id, field, text, default);
                }
                default
            }
        };

        Feature {
            page: codec::parse_page(&self.page),
            x: number("x", &self.x, 0.0),
            y: number("y", &self.y, 0.0),
            w: number("w", &self.w, 0.0),
            h: number("h", &self.h, 0.0),
            zoom: number("zoom", &self.zoom, 1.0),
            bx: number("bx", &self.bx, 0.0),
            by: number("by", &self.by, 0.0),
            br: number("br", &self.br, DEFAULT_RADIUS),
            id: id.clone(),
            method: self.method,
            nominal: self.nominal,
            lsl: self.lsl,
            usl: self.usl,
            username: self.username,
        }
    }
}

impl From<&Feature> for FeatureRecord {
    fn from(f: &Feature) -> Self {
        Self {
            id: f.id.clone(),
            page: f.page.to_string(),
            x: codec::to_text(f.x),
            y: codec::to_text(f.y),
            w: codec::to_text(f.w),
            h: codec::to_text(f.h),
            zoom: codec::to_text(f.zoom),
            method: f.method.clone(),
            nominal: f.nominal.clone(),
            lsl: f.lsl.clone(),
            usl: f.usl.clone(),
            bx: codec::to_text(f.bx),
            by: codec::to_text(f.by),
            br: codec::to_text(f.br),
            username: f.username.clone(),
        }
    }
}

/// Input for adding a feature; the store allocates the id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewFeature {
    pub page: Option<u32>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub w: Option<f64>,
    pub h: Option<f64>,
    pub zoom: Option<f64>,
    pub method: String,
    pub nominal: String,
    pub lsl: String,
    pub usl: String,
    pub bx: Option<f64>,
    pub by: Option<f64>,
    pub br: Option<f64>,
    pub username: Option<String>,
}

impl NewFeature {
    /// A freshly picked region with its balloon in the region's top-left corner
    ///
    /// When the region is narrower (or shorter) than the balloon diameter the
    /// balloon is centred on that axis instead.
    pub fn picked(page: u32, x: f64, y: f64, w: f64, h: f64, radius: f64) -> Self {
        let ox = if w >= radius * 2.0 { radius } else { w / 2.0 };
        let oy = if h >= radius * 2.0 { radius } else { h / 2.0 };
        Self {
            page: Some(page),
            x: Some(x),
            y: Some(y),
            w: Some(w),
            h: Some(h),
            bx: Some(ox - w / 2.0),
            by: Some(oy - h / 2.0),
            br: Some(radius),
            ..Default::default()
        }
    }

    /// Check that the geometry needed to place the feature is present
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if self.page.is_none() {
            missing.push("page");
        }
        for (name, value) in [("x", self.x), ("y", self.y), ("w", self.w), ("h", self.h)] {
            match value {
                None => missing.push(name),
                Some(v) if !v.is_finite() => {
                    return Err(ValidationError::InvalidValue {
                        field: name.to_string(),
                        value: v.to_string(),
                    })
                }
                Some(_) => {}
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingFields(missing))
        }
    }

    /// Build the stored record, filling defaults for everything optional
    pub fn into_feature(
        self,
        id: String,
        default_radius: f64,
        default_user: &str,
    ) -> Result<Feature, ValidationError> {
        self.validate()?;
        Ok(Feature {
            id,
            page: self.page.unwrap_or(1).max(1),
            x: self.x.unwrap_or_default(),
            y: self.y.unwrap_or_default(),
            w: self.w.unwrap_or_default(),
            h: self.h.unwrap_or_default(),
            zoom: self.zoom.unwrap_or(1.0),
            method: self.method,
            nominal: self.nominal,
            lsl: self.lsl,
            usl: self.usl,
            bx: self.bx.unwrap_or(0.0),
            by: self.by.unwrap_or(0.0),
            br: self.br.unwrap_or(default_radius),
            username: self
                .username
                .unwrap_or_else(|| default_user.to_string()),
        })
    }
}

/// A mutable feature column (everything except `id`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureField {
    Page,
    X,
    Y,
    W,
    H,
    Zoom,
    Method,
    Nominal,
    Lsl,
    Usl,
    Bx,
    By,
    Br,
    Username,
}

impl FeatureField {
    pub fn column(&self) -> &'static str {
        match self {
            FeatureField::Page => "page",
            FeatureField::X => "x",
            FeatureField::Y => "y",
            FeatureField::W => "w",
            FeatureField::H => "h",
            FeatureField::Zoom => "zoom",
            FeatureField::Method => "method",
            FeatureField::Nominal => "nominal",
            FeatureField::Lsl => "lsl",
            FeatureField::Usl => "usl",
            FeatureField::Bx => "bx",
            FeatureField::By => "by",
            FeatureField::Br => "br",
            FeatureField::Username => "username",
        }
    }
}

impl fmt::Display for FeatureField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

impl FromStr for FeatureField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "page" => Ok(FeatureField::Page),
            "x" => Ok(FeatureField::X),
            "y" => Ok(FeatureField::Y),
            "w" => Ok(FeatureField::W),
            "h" => Ok(FeatureField::H),
            "zoom" => Ok(FeatureField::Zoom),
            "method" => Ok(FeatureField::Method),
            "nominal" | "nom" => Ok(FeatureField::Nominal),
            "lsl" => Ok(FeatureField::Lsl),
            "usl" => Ok(FeatureField::Usl),
            "bx" => Ok(FeatureField::Bx),
            "by" => Ok(FeatureField::By),
            "br" | "radius" => Ok(FeatureField::Br),
            "username" | "user" => Ok(FeatureField::Username),
            other => Err(ValidationError::UnknownField(other.to_string())),
        }
    }
}

/// Partial update of a feature; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureUpdate {
    pub page: Option<u32>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub w: Option<f64>,
    pub h: Option<f64>,
    pub zoom: Option<f64>,
    pub method: Option<String>,
    pub nominal: Option<String>,
    pub lsl: Option<String>,
    pub usl: Option<String>,
    pub bx: Option<f64>,
    pub by: Option<f64>,
    pub br: Option<f64>,
    pub username: Option<String>,
}

impl FeatureUpdate {
    /// Balloon offset change, as produced by dragging
    pub fn position(bx: f64, by: f64) -> Self {
        Self {
            bx: Some(bx),
            by: Some(by),
            ..Default::default()
        }
    }

    /// Tolerance band change
    pub fn tolerance(nominal: String, lsl: String, usl: String) -> Self {
        Self {
            nominal: Some(nominal),
            lsl: Some(lsl),
            usl: Some(usl),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set one field from text, validating numeric columns
    pub fn set(&mut self, field: FeatureField, value: &str) -> Result<(), ValidationError> {
        let invalid = || ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        };
        let number = || codec::parse_number(value).ok_or_else(invalid);

        match field {
            FeatureField::Page => {
                let page: u32 = value.trim().parse().map_err(|_| invalid())?;
                if page == 0 {
                    return Err(invalid());
                }
                self.page = Some(page);
            }
            FeatureField::X => self.x = Some(number()?),
            FeatureField::Y => self.y = Some(number()?),
            FeatureField::W => self.w = Some(number()?),
            FeatureField::H => self.h = Some(number()?),
            FeatureField::Zoom => self.zoom = Some(number()?),
            FeatureField::Bx => self.bx = Some(number()?),
            FeatureField::By => self.by = Some(number()?),
            FeatureField::Br => {
                let r = number()?;
                if r <= 0.0 {
                    return Err(invalid());
                }
                self.br = Some(r);
            }
            FeatureField::Method => self.method = Some(value.trim().to_string()),
            FeatureField::Nominal => self.nominal = Some(tolerance_text(value, field)?),
            FeatureField::Lsl => self.lsl = Some(tolerance_text(value, field)?),
            FeatureField::Usl => self.usl = Some(tolerance_text(value, field)?),
            FeatureField::Username => self.username = Some(value.trim().to_string()),
        }
        Ok(())
    }

    /// Parse `field=value` pairs
    pub fn from_assignments<S: AsRef<str>>(pairs: &[S]) -> Result<Self, ValidationError> {
        let mut update = Self::default();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ValidationError::UnknownField(pair.to_string()))?;
            if key.trim().eq_ignore_ascii_case("id") {
                return Err(ValidationError::UnknownField("id".to_string()));
            }
            update.set(key.parse()?, value)?;
        }
        Ok(update)
    }

    /// Apply to an in-memory feature
    pub fn apply(&self, feature: &mut Feature) {
        if let Some(v) = self.page {
            feature.page = v;
        }
        if let Some(v) = self.x {
            feature.x = v;
        }
        if let Some(v) = self.y {
            feature.y = v;
        }
        if let Some(v) = self.w {
            feature.w = v;
        }
        if let Some(v) = self.h {
            feature.h = v;
        }
        if let Some(v) = self.zoom {
            feature.zoom = v;
        }
        if let Some(v) = &self.method {
            feature.method = v.clone();
        }
        if let Some(v) = &self.nominal {
            feature.nominal = v.clone();
        }
        if let Some(v) = &self.lsl {
            feature.lsl = v.clone();
        }
        if let Some(v) = &self.usl {
            feature.usl = v.clone();
        }
        if let Some(v) = self.bx {
            feature.bx = v;
        }
        if let Some(v) = self.by {
            feature.by = v;
        }
        if let Some(v) = self.br {
            feature.br = v;
        }
        if let Some(v) = &self.username {
            feature.username = v.clone();
        }
    }

    /// `(column, text)` pairs for the fields that are set
    pub fn columns(&self) -> Vec<(&'static str, String)> {
        let mut cols = Vec::new();
        if let Some(v) = self.page {
            cols.push(("page", v.to_string()));
        }
        let numeric = [
            ("x", self.x),
            ("y", self.y),
            ("w", self.w),
            ("h", self.h),
            ("zoom", self.zoom),
            ("bx", self.bx),
            ("by", self.by),
            ("br", self.br),
        ];
        for (name, value) in numeric {
            if let Some(v) = value {
                cols.push((name, codec::to_text(v)));
            }
        }
        let text = [
            ("method", &self.method),
            ("nominal", &self.nominal),
            ("lsl", &self.lsl),
            ("usl", &self.usl),
            ("username", &self.username),
        ];
        for (name, value) in text {
            if let Some(v) = value {
                cols.push((name, v.clone()));
            }
        }
        cols
    }
}

/// Tolerance columns accept a number or the empty string (clears the value)
fn tolerance_text(value: &str, field: FeatureField) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    codec::parse_number(trimmed)
        .map(codec::format_canonical)
        .ok_or_else(|| ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> NewFeature {
        NewFeature {
            page: Some(1),
            x: Some(10.0),
            y: Some(20.0),
            w: Some(40.0),
            h: Some(12.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_id_suffix() {
        assert_eq!(id_suffix("007"), Some(7));
        assert_eq!(id_suffix("F-12"), Some(12));
        assert_eq!(id_suffix("A1B"), None);
        assert_eq!(id_suffix(""), None);
    }

    #[test]
    fn test_validate_reports_all_missing_fields() {
        let input = NewFeature {
            page: Some(1),
            x: Some(1.0),
            ..Default::default()
        };
        assert_eq!(
            input.validate(),
            Err(ValidationError::MissingFields(vec!["y", "w", "h"]))
        );
    }

    #[test]
    fn test_into_feature_fills_defaults() {
        let feature = region().into_feature("001".into(), 14.0, "alice").unwrap();
        assert_eq!(feature.id, "001");
        assert_eq!(feature.bx, 0.0);
        assert_eq!(feature.by, 0.0);
        assert_eq!(feature.br, 14.0);
        assert_eq!(feature.zoom, 1.0);
        assert_eq!(feature.username, "alice");
        assert!(feature.tolerance_is_blank());
    }

    #[test]
    fn test_picked_places_balloon_in_corner() {
        let input = NewFeature::picked(2, 0.0, 0.0, 100.0, 10.0, 14.0);
        // Wide enough: balloon one radius in from the left edge
        assert_eq!(input.bx, Some(14.0 - 50.0));
        // Too short: centred vertically
        assert_eq!(input.by, Some(0.0));
        assert_eq!(input.br, Some(14.0));
    }

    #[test]
    fn test_record_roundtrip() {
        let feature = Feature {
            method: "CMM".into(),
            nominal: "10".into(),
            lsl: "9.8".into(),
            usl: "10.1".into(),
            ..region().into_feature("004".into(), 14.0, "").unwrap()
        };
        let record = FeatureRecord::from(&feature);
        assert_eq!(record.x, "10");
        assert_eq!(record.into_feature(), feature);
    }

    #[test]
    fn test_record_is_lenient() {
        let record = FeatureRecord {
            id: "001".into(),
            page: "".into(),
            x: "abc".into(),
            zoom: "".into(),
            br: "".into(),
            ..Default::default()
        };
        let feature = record.into_feature();
        assert_eq!(feature.page, 1);
        assert_eq!(feature.x, 0.0);
        assert_eq!(feature.zoom, 1.0);
        assert_eq!(feature.br, DEFAULT_RADIUS);
    }

    #[test]
    fn test_update_from_assignments() {
        let update =
            FeatureUpdate::from_assignments(&["method=Caliper", "usl=10.10", "bx=-3.5"]).unwrap();
        assert_eq!(update.method.as_deref(), Some("Caliper"));
        assert_eq!(update.usl.as_deref(), Some("10.1"));
        assert_eq!(update.bx, Some(-3.5));
        assert!(update.page.is_none());
    }

    #[test]
    fn test_update_rejects_id_and_bad_values() {
        assert_eq!(
            FeatureUpdate::from_assignments(&["id=9"]),
            Err(ValidationError::UnknownField("id".into()))
        );
        assert!(matches!(
            FeatureUpdate::from_assignments(&["page=0"]),
            Err(ValidationError::InvalidValue { .. })
        ));
        assert!(matches!(
            FeatureUpdate::from_assignments(&["lsl=low"]),
            Err(ValidationError::InvalidValue { .. })
        ));
        assert!(matches!(
            FeatureUpdate::from_assignments(&["colour=red"]),
            Err(ValidationError::UnknownField(_))
        ));
    }

    #[test]
    fn test_update_clears_tolerance_with_empty_text() {
        let update = FeatureUpdate::from_assignments(&["nominal="]).unwrap();
        assert_eq!(update.nominal.as_deref(), Some(""));
        assert!(!update.is_empty());
    }

    #[test]
    fn test_apply_and_columns() {
        let mut feature = region().into_feature("001".into(), 14.0, "").unwrap();
        let update = FeatureUpdate::position(2.0, -1.5);
        update.apply(&mut feature);
        assert_eq!((feature.bx, feature.by), (2.0, -1.5));
        assert_eq!(
            update.columns(),
            vec![("bx", "2".to_string()), ("by", "-1.5".to_string())]
        );
        assert!(FeatureUpdate::default().is_empty());
    }
}
