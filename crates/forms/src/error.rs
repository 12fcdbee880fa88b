//! Error types for stored forms management.

use formbatch_protocol::ValidationVerdict;

/// Errors produced while managing stored forms.
#[derive(Debug, thiserror::Error)]
pub enum FormsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] formbatch_protocol::ProtocolError),

    #[error("transfer error: {0}")]
    Transfer(#[from] formbatch_transfer::TransferError),

    #[error("service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("form not found: {0}")]
    NotFound(String),

    /// The replacement file did not pass validation; nothing was changed.
    #[error("file failed validation: {}", .0.message)]
    Invalid(Box<ValidationVerdict>),
}
