//! Snapshot persistence and history log
//!
//! The last [`Snapshot`] lives in a single JSON state file that survives
//! restarts. A missing file is a cold start; a file that exists but cannot be
//! decoded is [`LinecardError::CorruptState`] and is never overwritten by a
//! run. Saves go through a temporary file in the same directory that is
//! fsynced and renamed over the destination, so a killed process leaves
//! either the old or the new state behind.
//!
//! The history log is plain text opened in append mode. Failing to append
//! never affects the state file.

use crate::error::{LinecardError, Result};
use crate::lock::StateLock;
use crate::report::HistoryEntry;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// On-disk state format version
pub const STATE_VERSION: u32 = 1;

/// Serialized state record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Format version for forward compatibility
    pub version: u32,
    /// When the snapshot was saved
    pub saved_at: DateTime<Utc>,
    /// The snapshot itself
    pub modules: Snapshot,
}

/// State file and history log of one checker
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    state_path: PathBuf,
    log_path: PathBuf,
}

impl SnapshotStore {
    /// Create a store over the given state file and history log
    pub fn new(state_path: impl Into<PathBuf>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            log_path: log_path.into(),
        }
    }

    /// State file path
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// History log path
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Lock file guarding the state file (`<state_file>.lock`)
    pub fn lock_path(&self) -> PathBuf {
        let mut name: OsString = self.state_path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Take the exclusive run lock
    pub fn lock(&self) -> Result<StateLock> {
        StateLock::acquire(&self.lock_path())
    }

    /// Load the last saved snapshot; `None` on cold start
    pub fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.load_state()?.map(|state| state.modules))
    }

    /// Load the full state record; `None` on cold start
    pub fn load_state(&self) -> Result<Option<PersistedState>> {
        let text = match fs::read_to_string(&self.state_path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.state_path.display(), "No saved state");
                return Ok(None);
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(LinecardError::corrupt_state(&self.state_path, e.to_string()));
            }
            Err(e) => return Err(LinecardError::state_io(&self.state_path, e)),
        };

        let state: PersistedState = serde_json::from_str(&text)
            .map_err(|e| LinecardError::corrupt_state(&self.state_path, e.to_string()))?;

        if state.version != STATE_VERSION {
            return Err(LinecardError::corrupt_state(
                &self.state_path,
                format!("unsupported state version {}", state.version),
            ));
        }

        Ok(Some(state))
    }

    /// Atomically replace the saved snapshot
    pub fn save(&self, snapshot: &Snapshot, saved_at: DateTime<Utc>) -> Result<()> {
        let dir = self
            .state_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(|e| LinecardError::state_io(dir, e))?;

        let state = PersistedState {
            version: STATE_VERSION,
            saved_at,
            modules: snapshot.clone(),
        };
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| LinecardError::state_io(&self.state_path, e.into()))?;

        // Dropping the temp file before persist() removes it
        let mut tmp =
            NamedTempFile::new_in(dir).map_err(|e| LinecardError::state_io(dir, e))?;
        let write = |tmp: &mut NamedTempFile| -> std::io::Result<()> {
            tmp.write_all(json.as_bytes())?;
            tmp.write_all(b"\n")?;
            tmp.as_file().sync_all()
        };
        write(&mut tmp).map_err(|e| LinecardError::state_io(&self.state_path, e))?;
        tmp.persist(&self.state_path)
            .map_err(|e| LinecardError::state_io(&self.state_path, e.error))?;

        info!(
            path = %self.state_path.display(),
            modules = snapshot.module_count(),
            "Saved counter snapshot"
        );
        Ok(())
    }

    /// Append one entry to the history log
    pub fn append_log(&self, entry: &HistoryEntry) -> Result<()> {
        let log_err = |e| LinecardError::LogAppend {
            path: self.log_path.clone(),
            source: e,
        };

        if let Some(parent) = self.log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(log_err)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(log_err)?;
        file.write_all(entry.render().as_bytes()).map_err(log_err)?;
        file.flush().map_err(log_err)?;

        debug!(path = %self.log_path.display(), "Appended history entry");
        Ok(())
    }
}
