//! Recoverable upload sessions.
//!
//! A snapshot of the orchestrator is written under one fixed key at every
//! transition and removed on completion or cancel. On startup a snapshot
//! younger than the staleness horizon is handed back for recovery; anything
//! older, corrupt, from another version, or internally inconsistent is
//! deleted and ignored.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use formbatch_protocol::ValidationVerdict;
use formbatch_transfer::{FileDescriptor, FileId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::types::FileFailure;

/// Key under which the snapshot is stored.
pub const SESSION_KEY: &str = "upload-session";

/// Snapshot format version; anything else is discarded.
pub const SESSION_VERSION: u32 = 1;

/// Snapshots strictly older than this are stale.
pub const STALENESS_HORIZON: TimeDelta = TimeDelta::minutes(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub current: usize,
    pub total: usize,
}

/// Serializable picture of the orchestrator between chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionState {
    pub version: u32,
    pub active: bool,
    pub paused: bool,
    pub stopped: bool,
    pub queue: Vec<FileDescriptor>,
    /// Settled files, in settle order.
    pub processed: Vec<FileId>,
    pub cursor: usize,
    pub progress: SessionProgress,
    #[serde(default)]
    pub validation_results: HashMap<FileId, ValidationVerdict>,
    #[serde(default)]
    pub all_valid: bool,
    #[serde(default)]
    pub succeeded: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub failures: Vec<FileFailure>,
    pub saved_at: DateTime<Utc>,
}

impl UploadSessionState {
    /// Checks the structural invariants of a snapshot taken between chunks.
    pub fn check(&self) -> Result<(), SessionError> {
        if self.version != SESSION_VERSION {
            return Err(SessionError::VersionMismatch {
                found: self.version,
                expected: SESSION_VERSION,
            });
        }
        if self.cursor > self.queue.len() {
            return Err(SessionError::Inconsistent(format!(
                "cursor {} beyond queue of {}",
                self.cursor,
                self.queue.len()
            )));
        }
        if self.processed.len() != self.cursor {
            return Err(SessionError::Inconsistent(format!(
                "{} processed files for cursor {}",
                self.processed.len(),
                self.cursor
            )));
        }
        let settled: HashSet<FileId> = self.queue[..self.cursor].iter().map(|d| d.id).collect();
        if self.processed.iter().any(|id| !settled.contains(id)) {
            return Err(SessionError::Inconsistent(
                "processed file outside the settled prefix".into(),
            ));
        }
        let tallied = self
            .succeeded
            .checked_add(self.failed)
            .and_then(|n| usize::try_from(n).ok());
        if tallied != Some(self.cursor) {
            return Err(SessionError::Inconsistent(format!(
                "{} succeeded + {} failed for cursor {}",
                self.succeeded, self.failed, self.cursor
            )));
        }
        Ok(())
    }

    /// Whether the session is worth keeping.
    pub fn is_live(&self) -> bool {
        self.active || self.paused
    }
}

/// Key-value storage for snapshots.
pub trait SessionStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn save(&self, key: &str, data: &str) -> Result<(), SessionError>;
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// Stores each key as `<dir>/<key>.json`.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        let path = self.path(key);
        match std::fs::read_to_string(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, data: &str) -> Result<(), SessionError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        // Write then rename so a crash never leaves half a snapshot.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries().get(key).cloned())
    }

    fn save(&self, key: &str, data: &str) -> Result<(), SessionError> {
        self.entries().insert(key.to_string(), data.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Serial writer/reader of the session snapshot.
///
/// Every write goes through [`SessionRecorder::lock`]; callers build the
/// snapshot while holding the returned guard so writes land in order.
pub struct SessionRecorder {
    store: Box<dyn SessionStore>,
    key: String,
    horizon: TimeDelta,
    write_lock: Mutex<()>,
}

/// Exclusive write access to the recorder.
pub struct RecorderGuard<'a> {
    recorder: &'a SessionRecorder,
    _lock: MutexGuard<'a, ()>,
}

impl SessionRecorder {
    pub fn new(store: impl SessionStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            key: SESSION_KEY.to_string(),
            horizon: STALENESS_HORIZON,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_horizon(mut self, horizon: TimeDelta) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn horizon(&self) -> TimeDelta {
        self.horizon
    }

    pub fn lock(&self) -> RecorderGuard<'_> {
        RecorderGuard {
            recorder: self,
            _lock: self.write_lock.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Saves a snapshot; see [`RecorderGuard::save`].
    pub fn save(&self, state: &UploadSessionState) -> Result<bool, SessionError> {
        self.lock().save(state)
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        self.lock().clear()
    }

    /// Loads the snapshot, treating stale or broken ones as absent.
    pub fn restore(&self) -> Option<UploadSessionState> {
        self.restore_at(Utc::now())
    }

    /// [`restore`](Self::restore) against an explicit clock.
    pub fn restore_at(&self, now: DateTime<Utc>) -> Option<UploadSessionState> {
        let guard = self.lock();
        let data = match self.store.load(&self.key) {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "could not read upload session");
                return None;
            }
        };

        let state = match serde_json::from_str::<UploadSessionState>(&data)
            .map_err(SessionError::from)
            .and_then(|s| s.check().map(|()| s))
        {
            Ok(state) => state,
            Err(e) => {
                debug!(error = %e, "discarding upload session");
                guard.discard();
                return None;
            }
        };

        let age = now.signed_duration_since(state.saved_at);
        if age > self.horizon {
            debug!(age_secs = age.num_seconds(), "discarding stale upload session");
            guard.discard();
            return None;
        }
        if !state.is_live() {
            guard.discard();
            return None;
        }
        Some(state)
    }
}

impl RecorderGuard<'_> {
    /// Writes the snapshot when the session is active or paused.
    ///
    /// Returns whether anything was written.
    pub fn save(&self, state: &UploadSessionState) -> Result<bool, SessionError> {
        if !state.is_live() {
            return Ok(false);
        }
        let data = serde_json::to_string(state)?;
        self.recorder.store.save(&self.recorder.key, &data)?;
        debug!(cursor = state.cursor, total = state.queue.len(), "upload session saved");
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        self.recorder.store.remove(&self.recorder.key)
    }

    fn discard(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "could not remove upload session");
        }
    }
}
