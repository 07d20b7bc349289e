//! User configuration
//!
//! Loaded from `$AXIS_CONFIG` or the platform config directory, with
//! environment overrides on top. A missing or unreadable file yields the
//! defaults.

use directories::ProjectDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::debounce::DEFAULT_DELAY;
use crate::core::store::StoreOptions;
use crate::core::undo::DEFAULT_UNDO_DEPTH;
use crate::entities::feature::DEFAULT_RADIUS;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "AXIS_CONFIG";

/// Environment variable overriding the author
pub const USER_ENV: &str = "AXIS_USER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recorded on new features; falls back to the login name
    pub author: Option<String>,
    pub balloon_radius: f64,
    pub id_prefix: String,
    pub id_width: usize,
    /// Delay before a dragged balloon position is written
    pub persist_delay_ms: u64,
    pub undo_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            author: None,
            balloon_radius: DEFAULT_RADIUS,
            id_prefix: String::new(),
            id_width: 3,
            persist_delay_ms: DEFAULT_DELAY.as_millis() as u64,
            undo_depth: DEFAULT_UNDO_DEPTH,
        }
    }
}

impl Config {
    /// Load configuration; never fails
    pub fn load() -> Self {
        let mut config = Self::config_path()
            .filter(|p| p.exists())
            .and_then(|p| Self::load_file(&p))
            .unwrap_or_default();

        if let Ok(user) = std::env::var(USER_ENV) {
            if !user.trim().is_empty() {
                config.author = Some(user.trim().to_string());
            }
        }
        config
    }

    /// Read one YAML config file, warning on failure
    pub fn load_file(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Cannot read config {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_yml::from_str::<Config>(&content) {
            Ok(c) => Some(c.sanitized()),
            Err(e) => {
                warn!("Ignoring invalid config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Path of the config file that [`Config::load`] reads
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            if !explicit.is_empty() {
                return Some(PathBuf::from(explicit));
            }
        }
        ProjectDirs::from("", "", "axis").map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Author for new features
    pub fn author(&self) -> String {
        self.author
            .clone()
            .filter(|a| !a.trim().is_empty())
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn persist_delay(&self) -> Duration {
        Duration::from_millis(self.persist_delay_ms)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            id_prefix: self.id_prefix.clone(),
            id_width: self.id_width,
            default_radius: self.balloon_radius,
            username: self.author(),
        }
    }

    // Out-of-range values fall back to their defaults
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.balloon_radius.is_finite() && self.balloon_radius > 0.0) {
            self.balloon_radius = defaults.balloon_radius;
        }
        if self.id_width == 0 {
            self.id_width = defaults.id_width;
        }
        if self.undo_depth == 0 {
            self.undo_depth = defaults.undo_depth;
        }
        self
    }
}
