//! Read-only projection of the orchestrator for display.

use std::time::Duration;

use formbatch_protocol::FormPreview;
use formbatch_transfer::FileId;

use crate::types::UploadState;

/// Where one file stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Selected, not validated yet.
    Selected,
    Valid,
    Invalid,
    /// Queued, waiting for its chunk.
    Pending,
    InFlight,
    Committed { form_id: Option<String> },
    Failed { error: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileRow {
    pub id: FileId,
    pub name: String,
    pub status: FileStatus,
    pub preview: Option<FormPreview>,
}

/// Which user controls are enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub can_validate: bool,
    pub can_start: bool,
    pub can_pause: bool,
    pub can_resume: bool,
    pub can_cancel: bool,
}

impl Controls {
    pub fn for_state(state: UploadState, has_files: bool, all_valid: bool) -> Self {
        let busy = matches!(
            state,
            UploadState::Uploading | UploadState::Paused | UploadState::Cancelled
        );
        Self {
            can_validate: !busy && has_files,
            can_start: !busy && has_files && all_valid,
            can_pause: state == UploadState::Uploading,
            can_resume: state == UploadState::Paused,
            can_cancel: matches!(state, UploadState::Uploading | UploadState::Paused),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusView {
    pub state: UploadState,
    pub current: usize,
    pub total: usize,
    pub succeeded: u32,
    pub failed: u32,
    pub eta: Option<Duration>,
    pub files: Vec<FileRow>,
    pub controls: Controls,
}

impl StatusView {
    /// Whole-number percentage of settled files.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.current * 100) / self.total) as u8
    }

    /// `processed 3/6`
    pub fn progress_label(&self) -> String {
        format!("processed {}/{}", self.current, self.total)
    }
}
