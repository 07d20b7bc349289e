//! Inspection table export
//!
//! One row per feature for a work order, with the verdict of each result.

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::store::{Database, StoreError};
use crate::entities::feature::Feature;
use crate::entities::result::Verdict;

pub const EXPORT_HEADER: [&str; 8] = [
    "ID", "Page", "Method", "Result", "Nominal", "LSL", "USL", "Status",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Cannot write {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One line of the inspection table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionRow {
    pub id: String,
    pub page: u32,
    pub method: String,
    pub result: String,
    pub nominal: String,
    pub lsl: String,
    pub usl: String,
    pub status: Verdict,
}

impl InspectionRow {
    pub fn new(feature: &Feature, result: &str) -> Self {
        Self {
            id: feature.id.clone(),
            page: feature.page,
            method: feature.method.clone(),
            result: result.to_string(),
            nominal: feature.nominal.clone(),
            lsl: feature.lsl.clone(),
            usl: feature.usl.clone(),
            status: Verdict::evaluate(result, &feature.lsl, &feature.usl),
        }
    }

    fn record(&self) -> [String; 8] {
        [
            self.id.clone(),
            self.page.to_string(),
            self.method.clone(),
            self.result.clone(),
            self.nominal.clone(),
            self.lsl.clone(),
            self.usl.clone(),
            self.status.to_string(),
        ]
    }
}

/// Row filter matching the table's status and method filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportFilter {
    /// Keep only rows with this verdict
    pub status: Option<Verdict>,
    /// Keep only rows whose method contains this text (ignoring case)
    pub method: Option<String>,
}

impl ExportFilter {
    pub fn matches(&self, row: &InspectionRow) -> bool {
        if let Some(status) = self.status {
            if row.status != status {
                return false;
            }
        }
        match self.method.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => row.method.to_lowercase().contains(&m.to_lowercase()),
            _ => true,
        }
    }
}

/// Build the inspection table in feature order
pub fn inspection_rows(
    features: &[Feature],
    results: &BTreeMap<String, String>,
    filter: &ExportFilter,
) -> Vec<InspectionRow> {
    features
        .iter()
        .map(|f| {
            let result = results.get(&f.id).map(String::as_str).unwrap_or("");
            InspectionRow::new(f, result)
        })
        .filter(|row| filter.matches(row))
        .collect()
}

/// Write rows as CSV with the standard header
pub fn write_csv<W: Write>(writer: W, rows: &[InspectionRow]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(EXPORT_HEADER)?;
    for row in rows {
        wtr.write_record(row.record())?;
    }
    wtr.flush()?;
    Ok(())
}

/// Export one work order's inspection table to a file; returns the row count
pub fn export_workorder(
    db: &mut Database,
    workorder: &str,
    filter: &ExportFilter,
    path: &Path,
) -> Result<usize, ExportError> {
    let features = db.features().list()?;
    let results = db.results().read(workorder)?;
    let rows = inspection_rows(&features, &results, filter);

    let csv_err = |source: csv::Error| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::create(path).map_err(|e| csv_err(e.into()))?;
    write_csv(file, &rows).map_err(csv_err)?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{DocumentPaths, StoreOptions};
    use crate::entities::feature::NewFeature;
    use tempfile::tempdir;

    fn feature(id: &str, method: &str, lsl: &str, usl: &str) -> Feature {
        Feature {
            id: id.into(),
            page: 2,
            method: method.into(),
            nominal: "10".into(),
            lsl: lsl.into(),
            usl: usl.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rows_carry_verdicts() {
        let features = vec![
            feature("001", "Caliper", "9.9", "10.1"),
            feature("002", "CMM", "9.9", "10.1"),
            feature("003", "Visual", "", ""),
        ];
        let mut results = BTreeMap::new();
        results.insert("001".to_string(), "10.05".to_string());
        results.insert("002".to_string(), "10.3".to_string());

        let rows = inspection_rows(&features, &results, &ExportFilter::default());
        let statuses: Vec<Verdict> = rows.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![Verdict::Pass, Verdict::Fail, Verdict::Unknown]);
        assert_eq!(rows[2].result, "");
    }

    #[test]
    fn test_filters_by_status_and_method() {
        let features = vec![
            feature("001", "Caliper", "9.9", "10.1"),
            feature("002", "Height Gauge", "9.9", "10.1"),
            feature("003", "caliper", "9.9", "10.1"),
        ];
        let mut results = BTreeMap::new();
        results.insert("001".to_string(), "PASS".to_string());
        results.insert("002".to_string(), "PASS".to_string());
        results.insert("003".to_string(), "FAIL".to_string());

        let filter = ExportFilter {
            status: Some(Verdict::Pass),
            method: Some("CALIP".into()),
        };
        let rows = inspection_rows(&features, &results, &filter);
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["001"]);
    }

    #[test]
    fn test_csv_layout() {
        let rows = vec![InspectionRow::new(&feature("001", "CMM", "9.9", "10.1"), "10")];
        let mut out = Vec::new();
        write_csv(&mut out, &rows).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID,Page,Method,Result,Nominal,LSL,USL,Status");
        assert_eq!(lines[1], "001,2,CMM,10,10,9.9,10.1,PASS");
    }

    #[test]
    fn test_export_workorder_writes_file() {
        let tmp = tempdir().unwrap();
        let paths = DocumentPaths::new(tmp.path().join("cover.pdf"));
        let mut db = Database::open(paths, StoreOptions::default()).unwrap();
        db.features()
            .add(NewFeature::picked(1, 0.0, 0.0, 30.0, 30.0, 14.0))
            .unwrap();
        db.results().set("WO-1", "001", "FAIL").unwrap();

        let out = tmp.path().join("out.csv");
        let count = export_workorder(&mut db, "WO-1", &ExportFilter::default(), &out).unwrap();
        assert_eq!(count, 1);

        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.contains("001,1,,FAIL,,,,FAIL"));
    }
}
