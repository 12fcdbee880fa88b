//! Data types for the upload flow.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use formbatch_protocol::{FormPreview, FormsList};
use formbatch_transfer::{DEFAULT_MAX_CONCURRENT, FileId};
use serde::{Deserialize, Serialize};

/// Lifecycle of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    #[default]
    Idle,
    Uploading,
    Paused,
    Completed,
    /// Cancellation requested; the in-flight chunk is still settling.
    Cancelled,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UploadState::Idle => "idle",
            UploadState::Uploading => "uploading",
            UploadState::Paused => "paused",
            UploadState::Completed => "completed",
            UploadState::Cancelled => "cancelling",
        })
    }
}

/// A file that settled as failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub file_id: FileId,
    pub name: String,
    pub error: String,
}

/// Final tally of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub total: usize,
    pub succeeded: u32,
    pub failed: u32,
    pub failures: Vec<FileFailure>,
}

/// Surfaced when a persisted session is found at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryNotice {
    pub processed: usize,
    pub total: usize,
    pub succeeded: u32,
    pub failed: u32,
    pub saved_at: DateTime<Utc>,
    /// Remaining files whose content cannot be read again.
    pub unavailable: usize,
}

impl fmt::Display for RecoveryNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "processed {}/{}", self.processed, self.total)
    }
}

/// Event emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    Started {
        total: usize,
    },
    /// A chunk was dispatched; `index` counts from zero.
    ChunkStarted {
        index: usize,
        files: Vec<FileId>,
    },
    FileCommitted {
        file_id: FileId,
        name: String,
        form_id: Option<String>,
        previews: Vec<FormPreview>,
    },
    FileFailed {
        file_id: FileId,
        name: String,
        error: String,
    },
    /// A chunk settled.
    Progress {
        current: usize,
        total: usize,
    },
    Paused {
        current: usize,
        total: usize,
    },
    Resumed {
        current: usize,
        total: usize,
    },
    Cancelled {
        current: usize,
        total: usize,
    },
    Completed(UploadSummary),
    Recovered(RecoveryNotice),
    /// Remote list fetched after completion.
    FormsReloaded(FormsList),
}

/// Tunables of the upload flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSettings {
    /// Requested window size; clamped when the window is built.
    pub max_concurrent: usize,
    /// Snapshots older than this are discarded.
    pub staleness_horizon: TimeDelta,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            staleness_horizon: crate::session::STALENESS_HORIZON,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = UploadSettings::default();
        assert_eq!(s.max_concurrent, 3);
        assert_eq!(s.staleness_horizon, TimeDelta::minutes(30));
        assert_eq!(UploadState::default(), UploadState::Idle);
    }

    #[test]
    fn recovery_notice_display() {
        let n = RecoveryNotice {
            processed: 3,
            total: 6,
            succeeded: 3,
            failed: 0,
            saved_at: Utc::now(),
            unavailable: 0,
        };
        assert_eq!(n.to_string(), "processed 3/6");
    }
}
