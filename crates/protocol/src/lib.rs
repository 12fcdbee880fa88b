//! Wire types for the formbatch service.
//!
//! Everything the remote validation/parsing/storage service speaks lives
//! here: endpoints, the request/response envelope, payload shapes, and the
//! adapters that turn each known response shape into one typed value.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{Endpoint, Method};
pub use envelope::{FilePart, Request, Response};
pub use messages::{
    Ack, FormDetails, FormPayload, FormPreview, FormRecord, FormsList, ParsedSchema,
    ValidatePayload,
};
pub use types::{
    FormMetadata, IssueKind, ParseErrorKind, ParseFailure, ValidationIssue, ValidationVerdict,
};

/// Errors produced while building requests or decoding responses.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0:?} requires a form id")]
    MissingFormId(Endpoint),

    #[error("{0:?} requires a file")]
    MissingFile(Endpoint),

    #[error("empty response body")]
    EmptyBody,
}
