//! Feature CRUD and id allocation

use log::debug;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{format_timestamp, raise_high_water, read_high_water, text_column, StoreError, StoreOptions};
use crate::core::codec;
use crate::core::store::results::select_results_for;
use crate::entities::feature::{Feature, FeatureRecord, FeatureUpdate, NewFeature, FEATURE_COLUMNS};
use crate::entities::result::ResultRow;

/// A feature together with every result recorded against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub feature: Feature,
    #[serde(default)]
    pub results: Vec<ResultRow>,
}

/// Feature operations on an open store
pub struct FeatureStore<'a> {
    conn: &'a mut Connection,
    options: &'a StoreOptions,
}

impl<'a> FeatureStore<'a> {
    pub(super) fn new(conn: &'a mut Connection, options: &'a StoreOptions) -> Self {
        Self { conn, options }
    }

    /// All features, ordered by id ignoring case
    pub fn list(&self) -> Result<Vec<Feature>, StoreError> {
        let sql = format!(
            "SELECT {} FROM features ORDER BY id COLLATE NOCASE",
            FEATURE_COLUMNS.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_record)?;

        let mut features = Vec::new();
        for record in rows {
            let record = record?;
            if record.id.is_empty() {
                continue;
            }
            features.push(record.into_feature());
        }
        Ok(features)
    }

    pub fn get(&self, id: &str) -> Result<Option<Feature>, StoreError> {
        select_feature(&*self.conn, id)
    }

    /// Add a feature under a freshly allocated id
    ///
    /// Allocation, insert and high-water update share one transaction.
    pub fn add(&mut self, input: NewFeature) -> Result<Feature, StoreError> {
        input.validate()?;

        let tx = self.conn.transaction()?;
        let number = next_id_number(&tx, self.options)?;
        let id = self.options.format_id(number);
        let feature = input.into_feature(id, self.options.default_radius, &self.options.username)?;

        insert_feature(&tx, &FeatureRecord::from(&feature))?;
        raise_high_water(&tx, number)?;
        tx.commit()?;

        debug!("Allocated feature id {}", feature.id);
        Ok(feature)
    }

    /// Apply a partial update; returns `false` if nothing was changed
    pub fn update(&mut self, id: &str, update: &FeatureUpdate) -> Result<bool, StoreError> {
        let columns = update.columns();
        if id.is_empty() || columns.is_empty() {
            return Ok(false);
        }

        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{} = ?{}", name, i + 1))
            .collect();
        let sql = format!(
            "UPDATE features SET {} WHERE id = ?{}",
            assignments.join(", "),
            columns.len() + 1
        );
        let values = columns
            .into_iter()
            .map(|(_, value)| value)
            .chain(std::iter::once(id.to_string()));

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(changed > 0)
    }

    /// Delete a feature and all of its results
    pub fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        if id.is_empty() {
            return Ok(false);
        }
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM results WHERE feature_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM features WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    /// Make the stored feature set equal to `features`
    ///
    /// Existing ids are updated, new ids inserted and ids not present are
    /// deleted together with their results. Rows with an empty id are skipped.
    /// Cells are written from the typed values, so blank legacy text comes
    /// back as the field default.
    pub fn replace_all(&mut self, features: &[Feature]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        let existing: HashSet<String> = {
            let mut stmt = tx.prepare("SELECT id FROM features")?;
            let ids = stmt.query_map([], |row| text_column(row, 0))?;
            ids.collect::<Result<_, _>>()?
        };

        let mut incoming = HashSet::new();
        let mut highest = 0;
        for feature in features.iter().filter(|f| !f.id.is_empty()) {
            upsert_feature(&tx, &FeatureRecord::from(feature))?;
            highest = highest.max(self.options.id_number(&feature.id).unwrap_or(0));
            incoming.insert(feature.id.as_str());
        }

        for id in existing.iter().filter(|id| !incoming.contains(id.as_str())) {
            tx.execute("DELETE FROM results WHERE feature_id = ?1", params![id])?;
            tx.execute("DELETE FROM features WHERE id = ?1", params![id])?;
        }

        raise_high_water(&tx, highest)?;
        tx.commit()?;
        Ok(())
    }

    /// Capture a feature and its results, e.g. before deleting it
    pub fn snapshot(&self, id: &str) -> Result<Option<FeatureSnapshot>, StoreError> {
        let Some(feature) = select_feature(&*self.conn, id)? else {
            return Ok(None);
        };
        let results = select_results_for(&*self.conn, id)?;
        Ok(Some(FeatureSnapshot { feature, results }))
    }

    /// Re-insert a previously captured feature under its original id
    pub fn restore(&mut self, snapshot: &FeatureSnapshot) -> Result<(), StoreError> {
        let feature = &snapshot.feature;
        if feature.id.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        upsert_feature(&tx, &FeatureRecord::from(feature))?;
        for row in &snapshot.results {
            let updated_at = row.updated_at.as_ref().map(format_timestamp);
            tx.execute(
                "INSERT INTO results (feature_id, workorder, result, updated_at)
                 VALUES (?1, ?2, ?3, COALESCE(?4, CURRENT_TIMESTAMP))
                 ON CONFLICT(feature_id, workorder)
                 DO UPDATE SET result = excluded.result, updated_at = excluded.updated_at",
                params![feature.id, row.workorder, row.result, updated_at],
            )?;
        }
        raise_high_water(&tx, self.options.id_number(&feature.id).unwrap_or(0))?;
        tx.commit()?;
        Ok(())
    }

    /// Distinct method labels, case-insensitively unique and sorted
    pub fn methods(&self) -> Result<Vec<String>, StoreError> {
        let mut seen = HashSet::new();
        let mut methods: Vec<String> = self
            .list()?
            .into_iter()
            .map(|f| f.method.trim().to_string())
            .filter(|m| !m.is_empty() && seen.insert(m.to_lowercase()))
            .collect();
        methods.sort_by_key(|m| m.to_lowercase());
        Ok(methods)
    }

    /// Set the balloon radius of every feature; returns how many changed
    ///
    /// Only the `br` column is written so other stored text stays as it was.
    pub fn set_radius_all(&mut self, radius: f64) -> Result<usize, StoreError> {
        let text = codec::to_text(radius);
        let changed = self.conn.execute(
            "UPDATE features SET br = ?1 WHERE id <> '' AND (br IS NULL OR br <> ?1)",
            params![text],
        )?;
        Ok(changed)
    }

    /// Whether a feature with this id exists
    pub fn exists(&self, id: &str) -> Result<bool, StoreError> {
        feature_exists(&*self.conn, id)
    }
}

fn read_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeatureRecord> {
    Ok(FeatureRecord {
        id: text_column(row, 0)?,
        page: text_column(row, 1)?,
        x: text_column(row, 2)?,
        y: text_column(row, 3)?,
        w: text_column(row, 4)?,
        h: text_column(row, 5)?,
        zoom: text_column(row, 6)?,
        method: text_column(row, 7)?,
        nominal: text_column(row, 8)?,
        lsl: text_column(row, 9)?,
        usl: text_column(row, 10)?,
        bx: text_column(row, 11)?,
        by: text_column(row, 12)?,
        br: text_column(row, 13)?,
        username: text_column(row, 14)?,
    })
}

fn select_feature(conn: &Connection, id: &str) -> Result<Option<Feature>, StoreError> {
    let sql = format!(
        "SELECT {} FROM features WHERE id = ?1",
        FEATURE_COLUMNS.join(", ")
    );
    let record = conn
        .query_row(&sql, params![id], read_record)
        .optional()?;
    Ok(record.map(FeatureRecord::into_feature))
}

pub(crate) fn feature_exists(conn: &Connection, id: &str) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM features WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Next id number: one past the larger of the high-water mark and every
/// id number currently in the table
fn next_id_number(tx: &Transaction<'_>, options: &StoreOptions) -> Result<u64, StoreError> {
    let high_water = read_high_water(tx)?;
    let mut stmt = tx.prepare("SELECT id FROM features")?;
    let ids = stmt.query_map([], |row| text_column(row, 0))?;

    let mut highest = high_water;
    for id in ids {
        if let Some(n) = options.id_number(&id?) {
            highest = highest.max(n);
        }
    }
    Ok(highest + 1)
}

fn insert_sql(on_conflict_update: bool) -> String {
    let columns = FEATURE_COLUMNS.join(", ");
    let placeholders: Vec<String> = (1..=FEATURE_COLUMNS.len()).map(|i| format!("?{}", i)).collect();
    let mut sql = format!(
        "INSERT INTO features ({}) VALUES ({})",
        columns,
        placeholders.join(", ")
    );
    if on_conflict_update {
        let updates: Vec<String> = FEATURE_COLUMNS
            .iter()
            .skip(1)
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        sql.push_str(&format!(" ON CONFLICT(id) DO UPDATE SET {}", updates.join(", ")));
    }
    sql
}

fn insert_feature(conn: &Connection, record: &FeatureRecord) -> rusqlite::Result<()> {
    conn.execute(&insert_sql(false), params_from_iter(record.values()))?;
    Ok(())
}

/// Insert or overwrite in place; an upsert keeps dependent result rows
pub(crate) fn upsert_feature(conn: &Connection, record: &FeatureRecord) -> rusqlite::Result<()> {
    conn.execute(&insert_sql(true), params_from_iter(record.values()))?;
    Ok(())
}
