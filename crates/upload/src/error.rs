//! Upload error types.

use crate::types::UploadState;

/// Errors produced by the upload flow.
///
/// Per-file failures never surface as an `UploadError` from the
/// orchestrator; they become failed outcomes. These are the blocking
/// conditions plus the transport-level errors a connection reports.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] formbatch_protocol::ProtocolError),

    #[error("transfer error: {0}")]
    Transfer(#[from] formbatch_transfer::TransferError),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The service could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("every selected file must pass validation before upload")]
    NotValidated,

    #[error("no files selected")]
    EmptySelection,

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: UploadState,
    },

    #[error("session store error: {0}")]
    Session(#[from] SessionError),
}

/// Errors produced by a session store or while decoding a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot version {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),
}
