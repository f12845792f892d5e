//! Snapshot persistence
//!
//! Loading happens once at startup; saving is best-effort and never rolls
//! back in-memory state.

use std::{fs, io, path::PathBuf};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::state::{AppState, NoticeLevel, Snapshot};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Medium the snapshot is loaded from and saved to.
///
/// Implementations only decode; the schema version is checked when the
/// snapshot is loaded into the timer store.
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<Snapshot>, PersistenceError>;

    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError>;
}

/// Snapshot kept as a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        // Write beside the target and rename so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

/// Load the saved snapshot into the store, falling back to empty defaults
pub fn restore_snapshot(state: &AppState, store: &dyn SnapshotStore) {
    match store.load() {
        Ok(Some(snapshot)) => {
            // Rejections are logged and surfaced as notices by the state
            let _ = state.load_snapshot(snapshot);
        }
        Ok(None) => info!("No saved timer data found, starting empty"),
        Err(e) => {
            warn!("Failed to load saved timer data: {}", e);
            state.add_notice(NoticeLevel::Warning, format!("Error loading saved data: {}", e));
        }
    }
}

/// File name offered for an export taken on `date`
pub fn export_filename(date: NaiveDate) -> String {
    format!("timer-data-{}.json", date.format("%Y-%m-%d"))
}
