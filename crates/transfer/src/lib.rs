//! Local side of a batch: selected spreadsheet handles, the checks applied
//! before anything is queued, the concurrency window, and throughput.

mod fileset;
mod progress;
mod types;
mod validation;
mod window;

pub use fileset::FileSet;
pub use progress::ThroughputMeter;
pub use types::{FileDescriptor, FileHandle, FileId, FileSource};
pub use validation::{
    XLS_MIME, XLSX_MIME, check_selectable, content_type_for, is_spreadsheet,
};
pub use window::{ConcurrencyWindow, DEFAULT_MAX_CONCURRENT, MAX_CONCURRENT, MIN_CONCURRENT};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes behind a handle can no longer be read (in-memory content
    /// lost across a restart).
    #[error("file content unavailable: {0}")]
    ContentUnavailable(String),

    #[error("{name} rejected: {reason}")]
    Rejected { name: String, reason: String },
}
