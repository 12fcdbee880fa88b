//! Per-file commit unit.

use std::sync::Arc;

use formbatch_protocol::{FormPayload, FormPreview, Request};
use formbatch_transfer::{FileHandle, FileId, TransferError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connection::{FormsConnection, ensure_success};
use crate::error::UploadError;

/// Message recorded for restored files whose bytes were held in memory.
pub const CONTENT_UNAVAILABLE: &str = "file content unavailable after restart";

/// How one commit settled.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeKind {
    Committed {
        form_id: Option<String>,
        previews: Vec<FormPreview>,
    },
    Failed {
        error: String,
    },
    /// The cancellation signal fired before or during the request.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub file_id: FileId,
    pub name: String,
    pub kind: OutcomeKind,
}

/// Wraps the remote `commit` operation for one file at a time.
#[derive(Clone)]
pub struct Transport {
    conn: Arc<dyn FormsConnection>,
}

impl Transport {
    pub fn new(conn: Arc<dyn FormsConnection>) -> Self {
        Self { conn }
    }

    /// Commits one file. Always resolves; errors become `Failed`.
    pub async fn commit(&self, file: &FileHandle, cancel: &CancellationToken) -> Outcome {
        let kind = if cancel.is_cancelled() {
            OutcomeKind::Cancelled
        } else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => OutcomeKind::Cancelled,
                result = self.try_commit(file) => match result {
                    Ok((form_id, previews)) => OutcomeKind::Committed { form_id, previews },
                    Err(e) => {
                        warn!(file = %file.name, error = %e, "commit failed");
                        OutcomeKind::Failed { error: describe(&e) }
                    }
                },
            }
        };

        if kind == OutcomeKind::Cancelled {
            debug!(file = %file.name, "commit cancelled");
        }
        Outcome {
            file_id: file.id,
            name: file.name.clone(),
            kind,
        }
    }

    async fn try_commit(
        &self,
        file: &FileHandle,
    ) -> Result<(Option<String>, Vec<FormPreview>), UploadError> {
        let part = file.read().await?;
        let response = ensure_success(self.conn.send_request(Request::upload(part)).await?)?;

        match response.parse_payload::<FormPayload>() {
            Ok(payload) => Ok((payload.first_id(), payload.previews())),
            Err(e) => {
                // The service accepted the file; only the summary is lost.
                debug!(file = %file.name, error = %e, "unrecognized commit payload");
                Ok((None, Vec::new()))
            }
        }
    }
}

fn describe(err: &UploadError) -> String {
    match err {
        UploadError::Transfer(TransferError::ContentUnavailable(_)) => CONTENT_UNAVAILABLE.into(),
        UploadError::Api { status, body } if body.is_empty() => format!("HTTP {status}"),
        UploadError::Api { body, .. } => body.clone(),
        other => other.to_string(),
    }
}
