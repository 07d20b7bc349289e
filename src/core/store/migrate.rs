//! One-time import of legacy CSV files
//!
//! Older tool versions kept features in `<drawing>.balloons.csv` and results
//! in one `<drawing>.<workorder>.csv` per work order. Features are imported
//! only into an empty `features` table and results only into an empty
//! `results` table. A successful import is recorded in `meta`, so deleting
//! every feature later never brings the legacy rows back.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use rusqlite::{params, Connection, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::features::upsert_feature;
use super::{
    format_timestamp, raise_high_water, read_meta, text_column, write_meta, DocumentPaths,
    StoreOptions, LEGACY_IMPORTED_KEY,
};
use crate::entities::feature::FeatureRecord;

/// Legacy import failures; never fatal to opening a store
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Cannot read legacy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed legacy CSV {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Database error during import: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// What happened to legacy data when a store was opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// Nothing to import
    NotNeeded,
    Imported {
        features: usize,
        results: usize,
        workorders: usize,
    },
    /// The import was rolled back; the store is as it was before
    Failed { reason: String },
}

/// A row of a legacy work-order file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyResult {
    id: String,
    result: String,
}

pub(super) fn import_legacy(
    conn: &mut Connection,
    paths: &DocumentPaths,
    options: &StoreOptions,
) -> MigrationOutcome {
    match run_import(conn, paths, options) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(
                "Legacy import for {} failed and was rolled back: {}",
                paths.drawing().display(),
                e
            );
            MigrationOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

fn run_import(
    conn: &mut Connection,
    paths: &DocumentPaths,
    options: &StoreOptions,
) -> Result<MigrationOutcome, MigrationError> {
    let tx = conn.transaction()?;
    if read_meta(&tx, LEGACY_IMPORTED_KEY)?.is_some() {
        return Ok(MigrationOutcome::NotNeeded);
    }

    let mut features = 0;
    let legacy_features = paths.legacy_features();
    if table_is_empty(&tx, "features")? && legacy_features.exists() {
        features = import_features(&tx, &legacy_features, options)?;
    }

    let mut results = 0;
    let mut workorders = 0;
    if table_is_empty(&tx, "results")? {
        let known = feature_ids(&tx)?;
        for (workorder, path) in legacy_workorder_files(paths)? {
            let imported = import_workorder(&tx, &workorder, &path, &known)?;
            if imported > 0 {
                workorders += 1;
                results += imported;
            }
        }
    }

    if features == 0 && results == 0 {
        return Ok(MigrationOutcome::NotNeeded);
    }

    // An error anywhere above drops `tx`, which rolls everything back
    write_meta(&tx, LEGACY_IMPORTED_KEY, &format_timestamp(&Utc::now()))?;
    tx.commit()?;

    debug!(
        "Imported {} features and {} results from {} work orders",
        features, results, workorders
    );
    Ok(MigrationOutcome::Imported {
        features,
        results,
        workorders,
    })
}

fn table_is_empty(tx: &Transaction<'_>, table: &str) -> rusqlite::Result<bool> {
    let count: i64 = tx.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;
    Ok(count == 0)
}

fn feature_ids(tx: &Transaction<'_>) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = tx.prepare("SELECT id FROM features")?;
    let ids = stmt.query_map([], |row| text_column(row, 0))?;
    ids.collect()
}

fn csv_reader(path: &Path) -> Result<csv::Reader<fs::File>, MigrationError> {
    let file = fs::File::open(path).map_err(|source| MigrationError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new().flexible(true).from_reader(file))
}

fn import_features(
    tx: &Transaction<'_>,
    path: &Path,
    options: &StoreOptions,
) -> Result<usize, MigrationError> {
    let csv_err = |source: csv::Error| MigrationError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut reader = csv_reader(path)?;
    let mut count = 0;
    let mut highest = 0;
    for record in reader.deserialize::<FeatureRecord>() {
        let record = record.map_err(csv_err)?;
        if record.id.trim().is_empty() {
            continue;
        }
        // Stored as written so legacy text survives unchanged
        upsert_feature(tx, &record)?;
        highest = highest.max(options.id_number(&record.id).unwrap_or(0));
        count += 1;
    }
    raise_high_water(tx, highest)?;
    Ok(count)
}

/// `(workorder, path)` for every legacy result file beside the drawing
fn legacy_workorder_files(
    paths: &DocumentPaths,
) -> Result<Vec<(String, std::path::PathBuf)>, MigrationError> {
    let directory = paths.directory();
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(_) => return Ok(Vec::new()),
    };

    let prefix = format!("{}.", paths.base_name());
    let balloons = format!("{}.balloons.csv", paths.base_name());

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| MigrationError::Io {
            path: directory.display().to_string(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == balloons {
            continue;
        }
        let Some(middle) = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".csv"))
        else {
            continue;
        };
        if middle.is_empty() {
            continue;
        }
        files.push((middle.replace('_', "/"), entry.path()));
    }
    files.sort();
    Ok(files)
}

fn import_workorder(
    tx: &Transaction<'_>,
    workorder: &str,
    path: &Path,
    known: &HashSet<String>,
) -> Result<usize, MigrationError> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|source| MigrationError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let timestamp = format_timestamp(&DateTime::<Utc>::from(modified));

    let mut reader = csv_reader(path)?;
    let mut count = 0;
    for row in reader.deserialize::<LegacyResult>() {
        let row = row.map_err(|source| MigrationError::Csv {
            path: path.display().to_string(),
            source,
        })?;
        if row.id.is_empty() {
            continue;
        }
        if !known.contains(&row.id) {
            debug!("Skipping legacy result for unknown feature {}", row.id);
            continue;
        }
        tx.execute(
            "INSERT INTO results (feature_id, workorder, result, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(feature_id, workorder)
             DO UPDATE SET result = excluded.result, updated_at = excluded.updated_at",
            params![row.id, workorder, row.result, timestamp],
        )?;
        count += 1;
    }
    Ok(count)
}
