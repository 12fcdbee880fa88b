//! Batch upload flow for spreadsheet forms.
//!
//! This crate implements the **business logic** of sending a selected batch
//! of workbooks to the form service. It has no HTTP or UI dependencies; the
//! application provides a `FormsConnection` implementation over its client.
//!
//! # Pipeline
//!
//! 1. **Select**: files join a [`Selection`] after a local spreadsheet check
//! 2. **Validate**: every file is dry-run validated; upload is gated on all passing
//! 3. **Upload**: the [`UploadOrchestrator`] commits files in chunks of at
//!    most `max_concurrent`, with pause, resume and cancel between chunks
//! 4. **Record**: progress is snapshotted after every transition so an
//!    interrupted batch can be recovered within the staleness horizon

pub mod connection;
pub mod error;
pub mod orchestrator;
pub mod selection;
pub mod session;
pub mod status;
pub mod transport;
pub mod types;
pub mod validator;

// Re-export primary types for convenience.
pub use connection::FormsConnection;
pub use error::{SessionError, UploadError};
pub use orchestrator::UploadOrchestrator;
pub use selection::Selection;
pub use session::{
    JsonFileStore, MemoryStore, SESSION_KEY, SESSION_VERSION, STALENESS_HORIZON, SessionRecorder,
    SessionStore, UploadSessionState,
};
pub use status::{Controls, FileRow, FileStatus, StatusView};
pub use transport::{CONTENT_UNAVAILABLE, Outcome, OutcomeKind, Transport};
pub use types::{
    FileFailure, RecoveryNotice, UploadEvent, UploadSettings, UploadState, UploadSummary,
};
pub use validator::Validator;
