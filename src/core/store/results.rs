//! Work-order results

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;

use super::features::feature_exists;
use super::{format_timestamp, parse_timestamp, text_column, StoreError};
use crate::entities::result::ResultRow;

/// Result operations on an open store
pub struct ResultStore<'a> {
    conn: &'a mut Connection,
}

impl<'a> ResultStore<'a> {
    pub(super) fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Results of one work order keyed by feature id
    pub fn read(&self, workorder: &str) -> Result<BTreeMap<String, String>, StoreError> {
        if workorder.is_empty() {
            return Ok(BTreeMap::new());
        }
        let mut stmt = self
            .conn
            .prepare("SELECT feature_id, result FROM results WHERE workorder = ?1")?;
        let rows = stmt.query_map(params![workorder], |row| {
            Ok((text_column(row, 0)?, text_column(row, 1)?))
        })?;

        let mut map = BTreeMap::new();
        for row in rows {
            let (id, result) = row?;
            map.insert(id, result);
        }
        Ok(map)
    }

    /// Replace the whole result set of a work order
    ///
    /// Every row is stamped with the same UTC time. An empty mapping clears
    /// the work order; an unknown feature id aborts without writing anything.
    pub fn write(
        &mut self,
        workorder: &str,
        results: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        if workorder.is_empty() {
            return Ok(());
        }
        let timestamp = format_timestamp(&Utc::now());

        let tx = self.conn.transaction()?;
        for id in results.keys().filter(|id| !id.is_empty()) {
            if !feature_exists(&tx, id)? {
                return Err(StoreError::UnknownFeature(id.clone()));
            }
        }

        tx.execute(
            "DELETE FROM results WHERE workorder = ?1",
            params![workorder],
        )?;
        for (id, result) in results.iter().filter(|(id, _)| !id.is_empty()) {
            tx.execute(
                "INSERT INTO results (feature_id, workorder, result, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, workorder, result, timestamp],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Set a single cell, keeping the rest of the work order
    pub fn set(&mut self, workorder: &str, feature_id: &str, result: &str) -> Result<(), StoreError> {
        let mut current = self.read(workorder)?;
        current.insert(feature_id.to_string(), result.to_string());
        self.write(workorder, &current)
    }

    /// Remove every result of a work order
    pub fn clear(&mut self, workorder: &str) -> Result<(), StoreError> {
        self.write(workorder, &BTreeMap::new())
    }

    /// Distinct work order names, ordered ignoring case
    pub fn list_workorders(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT workorder FROM results
             WHERE workorder <> '' ORDER BY LOWER(workorder)",
        )?;
        let names = stmt.query_map([], |row| text_column(row, 0))?;
        Ok(names.collect::<Result<Vec<_>, _>>()?)
    }

    /// Most recent write time of a work order
    pub fn latest_timestamp(&self, workorder: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        if workorder.is_empty() {
            return Ok(None);
        }
        let latest = self.conn.query_row(
            "SELECT MAX(updated_at) FROM results WHERE workorder = ?1",
            params![workorder],
            |row| text_column(row, 0),
        )?;
        Ok(parse_timestamp(&latest))
    }

    /// Every result recorded for one feature, across work orders
    pub fn results_for(&self, feature_id: &str) -> Result<Vec<ResultRow>, StoreError> {
        select_results_for(&*self.conn, feature_id)
    }
}

pub(crate) fn select_results_for(
    conn: &Connection,
    feature_id: &str,
) -> Result<Vec<ResultRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT feature_id, workorder, result, updated_at FROM results
         WHERE feature_id = ?1 ORDER BY LOWER(workorder)",
    )?;
    let rows = stmt.query_map(params![feature_id], |row| {
        let updated_at = text_column(row, 3)?;
        Ok(ResultRow {
            feature_id: text_column(row, 0)?,
            workorder: text_column(row, 1)?,
            result: text_column(row, 2)?,
            updated_at: parse_timestamp(&updated_at),
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
