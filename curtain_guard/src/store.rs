//! Configuration Store — durable copy of the input table and limited speed.
//!
//! The store is a pretty-printed JSON document:
//!
//! ```json
//! {
//!     "lastUpdate": "2026-03-02T08:15:00Z",
//!     "limitedSpeed": 30,
//!     "entries": [
//!         { "index": 12, "resetIndex": 40, "triggerLevel": 1, "description": "cell door" }
//!     ]
//! }
//! ```
//!
//! Loading is lenient per entry (bad entries are skipped with a warning)
//! but strict for the document as a whole.

use chrono::{DateTime, Utc};
use curtain_common::consts::{DEFAULT_LIMITED_SPEED, MAX_LIMITED_SPEED};
use curtain_common::io::config::{
    entries_from_json, validate_entries, InputEntry, SafetyInputConfig,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Store read/write error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("store I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid JSON or not a JSON object.
    #[error("store {path:?} is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// Serialization failed.
    #[error("failed to encode store document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Configuration recovered from (or written to) the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConfig {
    pub inputs: Vec<SafetyInputConfig>,
    pub limited_speed: u8,
}

impl Default for StoredConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            limited_speed: DEFAULT_LIMITED_SPEED,
        }
    }
}

/// Result of [`ConfigStore::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Existing document parsed.
    Loaded(StoredConfig),
    /// No document existed; a default one was written.
    Created(StoredConfig),
}

impl LoadOutcome {
    pub fn into_config(self) -> StoredConfig {
        match self {
            Self::Loaded(c) | Self::Created(c) => c,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreDocument<'a> {
    last_update: DateTime<Utc>,
    limited_speed: u8,
    entries: &'a [InputEntry],
}

/// File-backed store.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the store, creating a default document if none exists.
    ///
    /// # Errors
    /// `StoreError::Io` if the file cannot be read or the default cannot be
    /// written, `StoreError::Malformed` if the document does not parse.
    pub fn load(&self) -> Result<LoadOutcome, StoreError> {
        if !self.path.exists() {
            info!("No store at {:?}, creating default", self.path);
            let defaults = StoredConfig::default();
            self.save(&[], defaults.limited_speed)?;
            return Ok(LoadOutcome::Created(defaults));
        }

        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        let doc: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| self.malformed(e.to_string()))?;
        let obj = doc
            .as_object()
            .ok_or_else(|| self.malformed("top level is not an object".to_string()))?;

        let inputs = match obj.get("entries").and_then(serde_json::Value::as_array) {
            Some(items) => validate_entries(&entries_from_json(items)),
            None => {
                warn!("Store {:?} has no 'entries' array", self.path);
                Vec::new()
            }
        };

        let limited_speed = match obj.get("limitedSpeed") {
            None => DEFAULT_LIMITED_SPEED,
            Some(v) => match v.as_i64().filter(|s| (0..=MAX_LIMITED_SPEED).contains(s)) {
                Some(s) => s as u8,
                None => {
                    warn!(
                        "Stored limitedSpeed {v} invalid, using default {DEFAULT_LIMITED_SPEED}"
                    );
                    DEFAULT_LIMITED_SPEED
                }
            },
        };

        info!(
            "Loaded {} input(s) from {:?}, limited speed {}%",
            inputs.len(),
            self.path,
            limited_speed
        );
        Ok(LoadOutcome::Loaded(StoredConfig {
            inputs,
            limited_speed,
        }))
    }

    /// Write the document, replacing any previous one.
    ///
    /// The parent directory is created on demand and the file is swapped
    /// in by rename, so readers never see a half-written document.
    pub fn save(&self, entries: &[InputEntry], limited_speed: u8) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let doc = StoreDocument {
            last_update: Utc::now(),
            limited_speed,
            entries,
        };
        let body = serde_json::to_string_pretty(&doc)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        set_permissions(&self.path);

        debug!("Saved {} input(s) to {:?}", entries.len(), self.path);
        Ok(())
    }

    fn malformed(&self, reason: String) -> StoreError {
        StoreError::Malformed {
            path: self.path.clone(),
            reason,
        }
    }
}

/// rw-r--r--. Failure is logged only.
#[cfg(unix)]
fn set_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o644)) {
        warn!("Failed to set permissions on {:?}: {}", path, e);
    }
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path) {}
