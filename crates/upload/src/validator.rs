//! Dry-run validation of selected files.

use std::sync::Arc;

use formbatch_protocol::{Request, ValidatePayload, ValidationVerdict};
use formbatch_transfer::{FileHandle, FileId};
use tracing::{debug, info, warn};

use crate::connection::{FormsConnection, ensure_success};
use crate::error::UploadError;
use crate::selection::Selection;

/// Runs the remote `validate` operation; persists nothing server-side.
#[derive(Clone)]
pub struct Validator {
    conn: Arc<dyn FormsConnection>,
}

impl Validator {
    pub fn new(conn: Arc<dyn FormsConnection>) -> Self {
        Self { conn }
    }

    /// Validates one file. Never fails: any error becomes a synthetic
    /// "Validation failed" verdict.
    pub async fn validate(&self, file: &FileHandle) -> ValidationVerdict {
        match self.try_validate(file).await {
            Ok(verdict) => {
                debug!(
                    file = %file.name,
                    valid = verdict.valid,
                    errors = verdict.errors.len(),
                    warnings = verdict.warnings.len(),
                    "validated"
                );
                verdict
            }
            Err(e) => {
                warn!(file = %file.name, error = %e, "validation request failed");
                ValidationVerdict::validation_failed(&file.name, e.to_string())
            }
        }
    }

    async fn try_validate(&self, file: &FileHandle) -> Result<ValidationVerdict, UploadError> {
        let part = file.read().await?;
        let response = match self.conn.send_request(Request::validate(part)).await {
            Ok(resp) => resp,
            // A rejecting answer may still carry a verdict body.
            Err(UploadError::Api { status, body }) => {
                return serde_json::from_str::<ValidatePayload>(&body)
                    .map(ValidatePayload::into_verdict)
                    .map_err(|_| UploadError::Api { status, body });
            }
            Err(e) => return Err(e),
        };

        if !response.is_success()
            && let Ok(payload) = response.parse_payload::<ValidatePayload>()
        {
            return Ok(payload.into_verdict());
        }
        let response = ensure_success(response)?;
        Ok(response.parse_payload::<ValidatePayload>()?.into_verdict())
    }

    /// Validates every file of a batch concurrently.
    ///
    /// Results come back in selection order.
    pub async fn validate_batch(&self, files: &[FileHandle]) -> Vec<(FileId, ValidationVerdict)> {
        let verdicts =
            futures_util::future::join_all(files.iter().map(|f| self.validate(f))).await;
        files.iter().map(|f| f.id).zip(verdicts).collect()
    }

    /// Validates the whole selection and recomputes `all_valid` once every
    /// file has resolved.
    pub async fn validate_all(&self, selection: &mut Selection) -> bool {
        let files = selection.files().snapshot();
        let results = self.validate_batch(&files).await;
        for (id, verdict) in results {
            selection.record(id, verdict);
        }
        let all_valid = selection.recompute_all_valid();
        info!(files = files.len(), all_valid, "validation pass finished");
        all_valid
    }
}
