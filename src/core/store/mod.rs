//! Per-drawing SQLite store for features and inspection results
//!
//! Each drawing gets one database file beside it (`<drawing>.axis.db`). The
//! schema is versioned with `PRAGMA user_version`; opening a store brings it
//! up to date and imports legacy CSV files once.

mod features;
mod migrate;
mod results;

#[cfg(test)]
mod tests;

pub use features::{FeatureSnapshot, FeatureStore};
pub use migrate::{MigrationError, MigrationOutcome};
pub use results::ResultStore;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::codec;
use crate::entities::feature::{id_suffix, ValidationError, DEFAULT_RADIUS};

const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Key in the `meta` table holding the highest id number ever issued
const HIGH_WATER_KEY: &str = "id_high_water";

/// Key in the `meta` table set once legacy files have been imported
pub(crate) const LEGACY_IMPORTED_KEY: &str = "legacy_imported";

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot open store at {}: {source}", path.display())]
    Init {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store at {} has schema version {found}, newer than supported version {supported}", path.display())]
    UnsupportedVersion {
        path: PathBuf,
        found: i32,
        supported: i32,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Files that belong to one drawing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPaths {
    drawing: PathBuf,
}

impl DocumentPaths {
    pub fn new(drawing: impl Into<PathBuf>) -> Self {
        Self {
            drawing: drawing.into(),
        }
    }

    pub fn drawing(&self) -> &Path {
        &self.drawing
    }

    /// Directory holding the drawing (and every sidecar file)
    pub fn directory(&self) -> &Path {
        match self.drawing.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// File name of the drawing, used as the prefix of every sidecar
    pub fn base_name(&self) -> String {
        self.drawing
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn database(&self) -> PathBuf {
        self.sidecar(".axis.db")
    }

    pub fn undo_log(&self) -> PathBuf {
        self.sidecar(".axis.undo.json")
    }

    /// Legacy feature table written by older tool versions
    pub fn legacy_features(&self) -> PathBuf {
        self.sidecar(".balloons.csv")
    }

    /// Legacy per-work-order result file (`/` in the name becomes `_`)
    pub fn legacy_workorder(&self, workorder: &str) -> PathBuf {
        self.sidecar(&format!(".{}.csv", workorder.replace('/', "_")))
    }

    fn sidecar(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.drawing.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }
}

/// Store-wide conventions
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    /// Text placed before the zero-padded id number
    pub id_prefix: String,
    /// Minimum number of digits in an id
    pub id_width: usize,
    pub default_radius: f64,
    /// Recorded on new features that do not name a user
    pub username: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            id_prefix: String::new(),
            id_width: 3,
            default_radius: DEFAULT_RADIUS,
            username: String::new(),
        }
    }
}

impl StoreOptions {
    pub fn format_id(&self, number: u64) -> String {
        format!("{}{:0width$}", self.id_prefix, number, width = self.id_width)
    }

    /// Number part of an id
    ///
    /// Ids carrying the configured prefix are read after it, so a prefix
    /// ending in a digit never leaks into the number. Other ids fall back to
    /// their trailing digits.
    pub fn id_number(&self, id: &str) -> Option<u64> {
        if !self.id_prefix.is_empty() {
            if let Some(rest) = id.strip_prefix(self.id_prefix.as_str()) {
                if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                    return rest.parse().ok();
                }
            }
        }
        id_suffix(id)
    }
}

/// An open drawing store
pub struct Database {
    conn: Connection,
    paths: DocumentPaths,
    options: StoreOptions,
    migration: MigrationOutcome,
}

impl Database {
    /// Open (creating if needed) the store for a drawing
    ///
    /// Safe to call repeatedly: schema steps are idempotent and legacy data is
    /// only imported into empty tables. A failed legacy import does not fail
    /// the open; see [`Database::migration`].
    pub fn open(paths: DocumentPaths, options: StoreOptions) -> Result<Self, StoreError> {
        let db_path = paths.database();
        let init_err = |source: rusqlite::Error| StoreError::Init {
            path: db_path.clone(),
            source,
        };

        let mut conn = Connection::open(&db_path).map_err(init_err)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(init_err)?;
        run_migrations(&mut conn, &db_path)?;

        let migration = migrate::import_legacy(&mut conn, &paths, &options);
        debug!("Opened store {} ({:?})", db_path.display(), migration);

        Ok(Self {
            conn,
            paths,
            options,
            migration,
        })
    }

    pub fn paths(&self) -> &DocumentPaths {
        &self.paths
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// What the legacy import did when the store was opened
    pub fn migration(&self) -> &MigrationOutcome {
        &self.migration
    }

    pub fn features(&mut self) -> FeatureStore<'_> {
        FeatureStore::new(&mut self.conn, &self.options)
    }

    pub fn results(&mut self) -> ResultStore<'_> {
        ResultStore::new(&mut self.conn)
    }

    /// Schema version currently recorded in the file
    pub fn schema_version(&self) -> Result<i32, StoreError> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }
}

fn run_migrations(conn: &mut Connection, path: &Path) -> Result<(), StoreError> {
    let init_err = |source: rusqlite::Error| StoreError::Init {
        path: path.to_path_buf(),
        source,
    };

    let mut version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(init_err)?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction().map_err(init_err)?;
    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        apply_migration(&tx, next).map_err(init_err)?;
        debug!("Store schema migrated to version {}", next);
        version = next;
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .map_err(init_err)?;
    tx.commit().map_err(init_err)
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> rusqlite::Result<()> {
    match version {
        1 => tx.execute_batch(include_str!("schema/v1.sql")),
        2 => {
            // Stores written before per-feature authorship lack this column
            if !has_column(tx, "features", "username")? {
                tx.execute_batch("ALTER TABLE features ADD COLUMN username TEXT")?;
            }
            Ok(())
        }
        3 => tx.execute_batch(include_str!("schema/v3.sql")),
        _ => Ok(()),
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name?.eq_ignore_ascii_case(column) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Read any column as text; NULL becomes the empty string
///
/// Legacy stores declare TEXT columns but nothing stops other tools from
/// writing numbers into them.
pub(crate) fn text_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => codec::to_text(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    })
}

/// Canonical text form of a timestamp as stored in `results.updated_at`
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
///
/// Accepts RFC 3339 and the naive ISO / `CURRENT_TIMESTAMP` forms written by
/// older stores, which are taken to be UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub(crate) fn read_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub(crate) fn write_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub(crate) fn read_high_water(conn: &Connection) -> rusqlite::Result<u64> {
    let value = read_meta(conn, HIGH_WATER_KEY)?;
    Ok(value.and_then(|v| v.trim().parse().ok()).unwrap_or(0))
}

/// Raise the id high-water mark; never lowers it
pub(crate) fn raise_high_water(conn: &Connection, number: u64) -> rusqlite::Result<()> {
    if number > read_high_water(conn)? {
        write_meta(conn, HIGH_WATER_KEY, &number.to_string())?;
    }
    Ok(())
}
