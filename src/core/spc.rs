//! Statistical process control across work orders
//!
//! Every numeric result recorded for a feature, in any work order, is a
//! measurement. Features with at least one measurement get summary statistics
//! and, when both specification limits are known, Cp and Cpk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::codec;
use crate::core::store::{Database, DocumentPaths, StoreError};

/// One numeric result with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub feature_id: String,
    pub value: f64,
    pub workorder: String,
    /// Last write time of the work order
    pub timestamp: Option<DateTime<Utc>>,
    /// Where the value came from, for traceability
    pub source: String,
}

/// Summary statistics of a feature's measurements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1); zero for a single value
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
    /// Cp = (USL - LSL) / (6s)
    pub cp: Option<f64>,
    /// Cpk = min(USL - mean, mean - LSL) / (3s)
    pub cpk: Option<f64>,
}

/// SPC data for one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpc {
    pub feature_id: String,
    pub method: String,
    pub nominal: Option<f64>,
    pub lsl: Option<f64>,
    pub usl: Option<f64>,
    pub measurements: Vec<Measurement>,
    pub stats: FeatureStats,
}

/// Compute statistics for a set of values; `None` when there are none
pub fn compute_stats(values: &[f64], lsl: Option<f64>, usl: Option<f64>) -> Option<FeatureStats> {
    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let stdev = if values.len() > 1 {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.max(0.0).sqrt()
    } else {
        0.0
    };
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let (cp, cpk) = match (lsl, usl) {
        (Some(lsl), Some(usl)) if stdev > 0.0 => {
            let cp = (usl - lsl) / (6.0 * stdev);
            let upper = (usl - mean) / (3.0 * stdev);
            let lower = (mean - lsl) / (3.0 * stdev);
            (Some(cp), Some(upper.min(lower)))
        }
        _ => (None, None),
    };

    Some(FeatureStats {
        count: values.len(),
        mean,
        stdev,
        min,
        max,
        cp,
        cpk,
    })
}

/// Human-readable origin of a work order's results
///
/// The legacy CSV file name while that file still exists, otherwise the store
/// file name with the work order appended.
pub fn provenance(paths: &DocumentPaths, workorder: &str) -> String {
    let legacy = paths.legacy_workorder(workorder);
    if legacy.exists() {
        if let Some(name) = legacy.file_name() {
            return name.to_string_lossy().into_owned();
        }
    }
    let db_name = paths
        .database()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}#{}", db_name, workorder)
}

/// Build the SPC dataset for every feature that has measurements
///
/// Features keep store order; measurements follow work order order.
pub fn load_dataset(db: &mut Database) -> Result<Vec<FeatureSpc>, StoreError> {
    let features = db.features().list()?;

    let mut measurements: HashMap<String, Vec<Measurement>> = HashMap::new();
    let workorders = db.results().list_workorders()?;
    for workorder in &workorders {
        let timestamp = db.results().latest_timestamp(workorder)?;
        let source = provenance(db.paths(), workorder);
        for (feature_id, text) in db.results().read(workorder)? {
            let Some(value) = codec::parse_number(&text) else {
                continue;
            };
            measurements
                .entry(feature_id.clone())
                .or_default()
                .push(Measurement {
                    feature_id,
                    value,
                    workorder: workorder.clone(),
                    timestamp,
                    source: source.clone(),
                });
        }
    }

    let mut dataset = Vec::new();
    for feature in features {
        let Some(measured) = measurements.remove(&feature.id) else {
            continue;
        };
        let (nominal, lsl, usl) = feature.limits();
        let values: Vec<f64> = measured.iter().map(|m| m.value).collect();
        let Some(stats) = compute_stats(&values, lsl, usl) else {
            continue;
        };
        dataset.push(FeatureSpc {
            feature_id: feature.id,
            method: feature.method.trim().to_string(),
            nominal,
            lsl,
            usl,
            measurements: measured,
            stats,
        });
    }
    Ok(dataset)
}
