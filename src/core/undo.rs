//! Bounded undo log for feature edits
//!
//! Each entry is a serializable command describing how to reverse one edit.
//! Commands act on a target that has no access to the log, so reverting a
//! command can never record a new entry. There is no redo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

use crate::core::store::StoreError;

/// Entries kept when no other depth is configured
pub const DEFAULT_UNDO_DEPTH: usize = 50;

/// Errors raised while reverting an edit
#[derive(Debug, Error)]
pub enum UndoError {
    #[error("Cannot undo '{label}': {source}")]
    Revert {
        label: String,
        #[source]
        source: StoreError,
    },
}

/// Result of an undo request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UndoOutcome {
    /// The labelled edit was reverted
    Undone(String),
    /// The log is empty
    Nothing,
    /// Undo is not allowed in the current mode
    Unavailable,
}

/// A command that can reverse an edit on `T`
pub trait Revert<T> {
    fn revert(&self, target: &mut T) -> Result<(), StoreError>;
}

/// One recorded edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoEntry<C> {
    pub label: String,
    pub command: C,
    pub recorded_at: DateTime<Utc>,
}

/// Most-recent-last log of reversible edits, oldest dropped on overflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoLog<C> {
    capacity: usize,
    entries: VecDeque<UndoEntry<C>>,
}

impl<C> Default for UndoLog<C> {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_DEPTH)
    }
}

impl<C> UndoLog<C> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the bound, dropping the oldest entries if needed
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.trim();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, command: C, label: impl Into<String>) {
        self.entries.push_back(UndoEntry {
            label: label.into(),
            command,
            recorded_at: Utc::now(),
        });
        self.trim();
    }

    /// Label of the edit that would be undone next
    pub fn peek_label(&self) -> Option<&str> {
        self.entries.back().map(|e| e.label.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = &UndoEntry<C>> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Pop the newest entry and revert it against `target`
    ///
    /// A failed revert is reported and the entry stays popped.
    pub fn undo<T>(&mut self, target: &mut T) -> Result<UndoOutcome, UndoError>
    where
        C: Revert<T>,
    {
        let Some(entry) = self.entries.pop_back() else {
            return Ok(UndoOutcome::Nothing);
        };
        entry
            .command
            .revert(target)
            .map_err(|source| UndoError::Revert {
                label: entry.label.clone(),
                source,
            })?;
        Ok(UndoOutcome::Undone(entry.label))
    }

    fn trim(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}
