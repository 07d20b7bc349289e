//! Editing session over one drawing
//!
//! A [`Session`] owns the working set of features, the selection, the current
//! mode and work order, the undo log and the pending balloon positions. The
//! presentation layer drives it; every business rule lives here.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

use crate::core::config::Config;
use crate::core::debounce::Debouncer;
use crate::core::store::{Database, FeatureSnapshot, StoreError};
use crate::core::tolerance::{self, Tolerance, ToleranceError};
use crate::core::undo::{Revert, UndoError, UndoLog, UndoOutcome};
use crate::entities::feature::{Feature, FeatureUpdate, NewFeature};
use crate::entities::result::{normalize_result_entry, Verdict};

/// Regions smaller than this on either axis are treated as accidental clicks
pub const MIN_PICK_SIZE: f64 = 5.0;

/// Bounds for the balloon radius derived from existing features
pub const RADIUS_RANGE: (f64, f64) = (6.0, 60.0);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Undo(#[from] UndoError),

    #[error(transparent)]
    Tolerance(#[from] ToleranceError),

    #[error("{action} is only available in {required} mode")]
    WrongMode { action: &'static str, required: Mode },

    #[error("Inspection needs a work order name")]
    MissingWorkorder,

    #[error("Cannot access undo log {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid undo log {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// What the session is being used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Placing balloons and editing feature attributes
    #[default]
    Ballooning,
    /// Recording results against a work order
    Inspection,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Ballooning => write!(f, "Ballooning"),
            Mode::Inspection => write!(f, "Inspection"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ballooning" | "balloon" => Ok(Mode::Ballooning),
            "inspection" | "inspect" => Ok(Mode::Inspection),
            _ => Err(format!("Unknown mode: {}", s)),
        }
    }
}

/// Reversible feature edits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditCommand {
    /// A feature was added; reverting deletes it
    Created { id: String },
    /// A feature was deleted; reverting restores it with its results
    Deleted {
        snapshot: FeatureSnapshot,
        /// Position in the working set before the delete
        index: usize,
        /// Selection held before the delete
        selection: Option<String>,
    },
}

/// The store plus the in-memory working set
///
/// Undo commands revert against this type, which has no access to the log.
pub struct Workspace {
    db: Database,
    rows: Vec<Feature>,
    selection: Option<String>,
}

impl Workspace {
    pub fn open(mut db: Database) -> Result<Self, StoreError> {
        let rows = db.features().list()?;
        Ok(Self {
            db,
            rows,
            selection: None,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    pub fn rows(&self) -> &[Feature] {
        &self.rows
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.rows.iter().find(|f| f.id == id)
    }

    /// Re-read the working set from the store
    pub fn reload(&mut self) -> Result<(), StoreError> {
        self.rows = self.db.features().list()?;
        if let Some(sel) = &self.selection {
            if !self.rows.iter().any(|f| &f.id == sel) {
                self.selection = None;
            }
        }
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|f| f.id == id)
    }

    fn feature_mut(&mut self, id: &str) -> Option<&mut Feature> {
        self.rows.iter_mut().find(|f| f.id == id)
    }

    fn forget(&mut self, id: &str) {
        self.rows.retain(|f| f.id != id);
        if self.selection.as_deref() == Some(id) {
            self.selection = None;
        }
    }
}

impl Revert<Workspace> for EditCommand {
    fn revert(&self, workspace: &mut Workspace) -> Result<(), StoreError> {
        match self {
            EditCommand::Created { id } => {
                workspace.db.features().delete(id)?;
                workspace.forget(id);
            }
            EditCommand::Deleted {
                snapshot,
                index,
                selection,
            } => {
                workspace.db.features().restore(snapshot)?;
                let id = &snapshot.feature.id;
                workspace.rows.retain(|f| &f.id != id);
                let at = (*index).min(workspace.rows.len());
                workspace.rows.insert(at, snapshot.feature.clone());
                workspace.selection = selection.clone();
            }
        }
        Ok(())
    }
}

/// Outcome of typing into a feature's result cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResultEntry {
    /// Ballooning: the text was a tolerance expression for a blank band
    ToleranceFilled { tolerance: Tolerance },
    /// Inspection: the result was stored against the current work order
    Recorded { result: String, verdict: Verdict },
    /// Nothing to do with the text
    Ignored,
}

pub struct Session {
    workspace: Workspace,
    undo: UndoLog<EditCommand>,
    persister: Debouncer<String, (f64, f64)>,
    mode: Mode,
    workorder: Option<String>,
    radius: f64,
}

impl Session {
    pub fn open(db: Database, config: &Config) -> Result<Self, StoreError> {
        let workspace = Workspace::open(db)?;
        let radius = workspace
            .rows
            .first()
            .map(|f| clamp_radius(f.br))
            .unwrap_or(config.balloon_radius);

        Ok(Self {
            workspace,
            undo: UndoLog::new(config.undo_depth),
            persister: Debouncer::new(config.persist_delay()),
            mode: Mode::Ballooning,
            workorder: None,
            radius,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn db_mut(&mut self) -> &mut Database {
        self.workspace.db_mut()
    }

    pub fn rows(&self) -> &[Feature] {
        self.workspace.rows()
    }

    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.workspace.feature(id)
    }

    pub fn selection(&self) -> Option<&str> {
        self.workspace.selection()
    }

    pub fn select(&mut self, id: Option<&str>) {
        self.workspace.selection = id
            .filter(|id| self.workspace.feature(id).is_some())
            .map(str::to_string);
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn workorder(&self) -> Option<&str> {
        self.workorder.as_deref()
    }

    /// Balloon radius used for newly picked regions
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn undo_log(&self) -> &UndoLog<EditCommand> {
        &self.undo
    }

    pub fn enter_ballooning(&mut self) {
        self.mode = Mode::Ballooning;
        self.workorder = None;
    }

    pub fn enter_inspection(&mut self, workorder: &str) -> Result<(), SessionError> {
        let workorder = workorder.trim();
        if workorder.is_empty() {
            return Err(SessionError::MissingWorkorder);
        }
        self.flush_all();
        self.mode = Mode::Inspection;
        self.workorder = Some(workorder.to_string());
        Ok(())
    }

    /// Add a feature and record it for undo
    pub fn add_feature(&mut self, input: NewFeature) -> Result<Feature, SessionError> {
        self.require(Mode::Ballooning, "Adding features")?;
        let feature = self.workspace.db.features().add(input)?;
        self.undo.push(
            EditCommand::Created {
                id: feature.id.clone(),
            },
            format!("Add {}", feature.id),
        );
        self.workspace.rows.push(feature.clone());
        self.workspace.selection = Some(feature.id.clone());
        Ok(feature)
    }

    /// Add a feature for a region picked on the drawing
    ///
    /// Returns `None` for regions below [`MIN_PICK_SIZE`].
    pub fn pick_region(
        &mut self,
        page: u32,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        zoom: f64,
    ) -> Result<Option<Feature>, SessionError> {
        self.require(Mode::Ballooning, "Picking regions")?;
        if w < MIN_PICK_SIZE || h < MIN_PICK_SIZE {
            debug!("Ignoring {}x{} pick below minimum size", w, h);
            return Ok(None);
        }
        let input = NewFeature {
            zoom: Some(zoom),
            ..NewFeature::picked(page, x, y, w, h, self.radius)
        };
        self.add_feature(input).map(Some)
    }

    /// Delete a feature and its results, recording it for undo
    pub fn delete_feature(&mut self, id: &str) -> Result<bool, SessionError> {
        self.require(Mode::Ballooning, "Deleting features")?;
        self.persister.cancel(&id.to_string());

        let Some(snapshot) = self.workspace.db.features().snapshot(id)? else {
            return Ok(false);
        };
        let index = self
            .workspace
            .position(id)
            .unwrap_or(self.workspace.rows.len());
        let selection = self.workspace.selection.clone();

        if !self.workspace.db.features().delete(id)? {
            return Ok(false);
        }
        self.undo.push(
            EditCommand::Deleted {
                snapshot,
                index,
                selection,
            },
            format!("Delete {}", id),
        );
        self.workspace.forget(id);
        Ok(true)
    }

    /// Edit feature attributes (not recorded for undo)
    pub fn update_feature(
        &mut self,
        id: &str,
        update: &FeatureUpdate,
    ) -> Result<bool, SessionError> {
        self.require(Mode::Ballooning, "Editing features")?;
        if !self.workspace.db.features().update(id, update)? {
            return Ok(false);
        }
        if let Some(row) = self.workspace.feature_mut(id) {
            update.apply(row);
        }
        Ok(true)
    }

    /// Parse a tolerance expression and write the band to a feature
    pub fn apply_tolerance(&mut self, id: &str, expr: &str) -> Result<Tolerance, SessionError> {
        let tolerance = tolerance::parse(expr)?;
        let (nominal, lsl, usl) = tolerance.to_fields();
        let update = FeatureUpdate::tolerance(nominal, lsl, usl);
        if !self.update_feature(id, &update)? {
            return Err(StoreError::UnknownFeature(id.to_string()).into());
        }
        Ok(tolerance)
    }

    /// Handle text typed into a feature's result cell
    ///
    /// In Ballooning mode the text fills a blank tolerance band when it
    /// parses; otherwise it is discarded. In Inspection mode the normalized
    /// result is stored against the current work order.
    pub fn enter_result(&mut self, id: &str, text: &str) -> Result<ResultEntry, SessionError> {
        let entry = normalize_result_entry(text);
        let Some(feature) = self.workspace.feature(id) else {
            return Err(StoreError::UnknownFeature(id.to_string()).into());
        };

        match self.mode {
            Mode::Ballooning => {
                if entry.is_empty() || !feature.tolerance_is_blank() {
                    return Ok(ResultEntry::Ignored);
                }
                match self.apply_tolerance(id, &entry) {
                    Ok(tolerance) => Ok(ResultEntry::ToleranceFilled { tolerance }),
                    Err(SessionError::Tolerance(e)) => {
                        debug!("Result text for {} is not a tolerance: {}", id, e);
                        Ok(ResultEntry::Ignored)
                    }
                    Err(e) => Err(e),
                }
            }
            Mode::Inspection => {
                let verdict = Verdict::evaluate(&entry, &feature.lsl, &feature.usl);
                let workorder = self.workorder.clone().ok_or(SessionError::MissingWorkorder)?;
                self.workspace.db.results().set(&workorder, id, &entry)?;
                Ok(ResultEntry::Recorded {
                    result: entry,
                    verdict,
                })
            }
        }
    }

    /// Record several results against the current work order in one write
    ///
    /// Every id is checked before anything is stored, so an unknown id leaves
    /// the work order untouched.
    pub fn record_results(
        &mut self,
        entries: &[(&str, &str)],
    ) -> Result<Vec<(String, String, Verdict)>, SessionError> {
        self.require(Mode::Inspection, "Recording results")?;
        let workorder = self.workorder.clone().ok_or(SessionError::MissingWorkorder)?;
        let mut results = self.workspace.db.results().read(&workorder)?;

        let mut recorded = Vec::with_capacity(entries.len());
        for &(id, text) in entries {
            let Some(feature) = self.workspace.feature(id) else {
                return Err(StoreError::UnknownFeature(id.to_string()).into());
            };
            let entry = normalize_result_entry(text);
            let verdict = Verdict::evaluate(&entry, &feature.lsl, &feature.usl);
            results.insert(id.to_string(), entry.clone());
            recorded.push((id.to_string(), entry, verdict));
        }

        self.workspace.db.results().write(&workorder, &results)?;
        Ok(recorded)
    }

    /// Current result and verdict of a feature in the current work order
    pub fn result(&mut self, id: &str) -> Result<(String, Verdict), SessionError> {
        let Some(workorder) = self.workorder.clone() else {
            return Ok((String::new(), Verdict::Unknown));
        };
        let results = self.workspace.db.results().read(&workorder)?;
        let text = results.get(id).cloned().unwrap_or_default();
        let verdict = self
            .workspace
            .feature(id)
            .map(|f| Verdict::evaluate(&text, &f.lsl, &f.usl))
            .unwrap_or(Verdict::Unknown);
        Ok((text, verdict))
    }

    /// Set the balloon radius on every feature
    pub fn set_radius(&mut self, radius: f64) -> Result<usize, SessionError> {
        self.require(Mode::Ballooning, "Resizing balloons")?;
        let changed = self.workspace.db.features().set_radius_all(radius)?;
        for row in &mut self.workspace.rows {
            row.br = radius;
        }
        self.radius = radius;
        Ok(changed)
    }

    /// Revert the most recent add or delete
    pub fn undo(&mut self) -> Result<UndoOutcome, SessionError> {
        if self.mode != Mode::Ballooning {
            return Ok(UndoOutcome::Unavailable);
        }
        self.flush_all();
        Ok(self.undo.undo(&mut self.workspace)?)
    }

    /// Move a balloon; the position is written once the drag settles
    pub fn drag_balloon(&mut self, id: &str, bx: f64, by: f64, now: Instant) -> bool {
        let Some(row) = self.workspace.feature_mut(id) else {
            return false;
        };
        row.bx = bx;
        row.by = by;
        self.persister.schedule(id.to_string(), (bx, by), now);
        true
    }

    /// Finish a drag, writing the pending position immediately
    pub fn release_balloon(&mut self, id: &str) -> bool {
        match self.persister.release(&id.to_string()) {
            Some(position) => self.persist_position(id, position),
            None => false,
        }
    }

    /// Write every position whose delay has elapsed; returns how many were written
    pub fn flush_due(&mut self, now: Instant) -> usize {
        let due = self.persister.due(now);
        self.persist_all(due)
    }

    /// Write every pending position regardless of delay
    pub fn flush_all(&mut self) -> usize {
        let pending = self.persister.drain();
        self.persist_all(pending)
    }

    pub fn has_pending_positions(&self) -> bool {
        !self.persister.is_empty()
    }

    /// Replace the undo log with the one saved beside the drawing, if any
    pub fn load_undo_log(&mut self, path: &Path) -> Result<(), SessionError> {
        if !path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut log: UndoLog<EditCommand> =
            serde_json::from_str(&content).map_err(|source| SessionError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        log.set_capacity(self.undo.capacity());
        self.undo = log;
        Ok(())
    }

    pub fn save_undo_log(&self, path: &Path) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(&self.undo).map_err(|source| SessionError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn persist_all(&mut self, positions: Vec<(String, (f64, f64))>) -> usize {
        positions
            .into_iter()
            .filter(|(id, position)| self.persist_position(id, *position))
            .count()
    }

    // Failures are logged; the in-memory position is kept
    fn persist_position(&mut self, id: &str, (bx, by): (f64, f64)) -> bool {
        let update = FeatureUpdate::position(bx, by);
        match self.workspace.db.features().update(id, &update) {
            Ok(written) => written,
            Err(e) => {
                warn!("Failed to save balloon position for {}: {}", id, e);
                false
            }
        }
    }

    fn require(&self, mode: Mode, action: &'static str) -> Result<(), SessionError> {
        if self.mode == mode {
            Ok(())
        } else {
            Err(SessionError::WrongMode {
                action,
                required: mode,
            })
        }
    }
}

fn clamp_radius(radius: f64) -> f64 {
    if !radius.is_finite() {
        return RADIUS_RANGE.0;
    }
    radius.round().clamp(RADIUS_RANGE.0, RADIUS_RANGE.1)
}
