//! Forms manager: business logic for stored forms CRUD.
//!
//! Uses the same connection trait shape as the upload crate, but returns
//! `FormsError` instead of `UploadError`.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use formbatch_protocol::{
    Ack, FormDetails, FormPayload, FormsList, ParseErrorKind, ParseFailure, ParsedSchema, Request,
    Response, ValidatePayload,
};
use formbatch_transfer::FileHandle;
use tracing::{debug, info, warn};

use crate::error::FormsError;
use crate::types::{ExportReport, UpdateOutcome};

/// Abstract connection to the form service.
///
/// The application implements this trait on top of its HTTP client.
/// Same shape as the upload crate's trait but returns `FormsError`.
pub trait FormsConnection: Send + Sync {
    /// Sends a request and waits for the raw answer.
    fn send_request(
        &self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Response, FormsError>> + Send + '_>>;
}

/// Manages forms stored by the service.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormsManager;

impl FormsManager {
    pub fn new() -> Self {
        Self
    }

    /// Lists every stored form.
    pub async fn list_all(&self, conn: &dyn FormsConnection) -> Result<FormsList, FormsError> {
        let resp = send(conn, Request::list_forms()).await?;
        Ok(resp.parse_payload()?)
    }

    /// Fetches one form with its questions and options.
    pub async fn get_by_id(
        &self,
        conn: &dyn FormsConnection,
        form_id: &str,
    ) -> Result<FormDetails, FormsError> {
        let resp = send(conn, Request::get_form(form_id))
            .await
            .map_err(|e| not_found(e, form_id))?;
        Ok(resp.parse_payload()?)
    }

    /// Deletes one form.
    pub async fn delete_by_id(
        &self,
        conn: &dyn FormsConnection,
        form_id: &str,
    ) -> Result<Ack, FormsError> {
        let resp = send(conn, Request::delete_form(form_id))
            .await
            .map_err(|e| not_found(e, form_id))?;
        info!(form_id, "form deleted");
        Ok(ack_or(&resp, "Form deleted successfully"))
    }

    /// Deletes every stored form.
    pub async fn delete_all(&self, conn: &dyn FormsConnection) -> Result<Ack, FormsError> {
        let resp = send(conn, Request::delete_all_forms()).await?;
        info!("all forms deleted");
        Ok(ack_or(&resp, "All forms deleted successfully"))
    }

    /// Replaces a stored form with a new workbook.
    ///
    /// The file is validated first; an invalid file is rejected with
    /// [`FormsError::Invalid`] and the stored form is left untouched.
    pub async fn update_by_id(
        &self,
        conn: &dyn FormsConnection,
        form_id: &str,
        file: &FileHandle,
    ) -> Result<UpdateOutcome, FormsError> {
        let part = file.read().await?;

        let resp = send(conn, Request::validate(part.clone())).await?;
        let verdict = resp.parse_payload::<ValidatePayload>()?.into_verdict();
        if !verdict.valid {
            debug!(form_id, file = %file.name, "update rejected by validation");
            return Err(FormsError::Invalid(Box::new(verdict)));
        }

        let resp = send(conn, Request::update_form(form_id, part))
            .await
            .map_err(|e| not_found(e, form_id))?;
        let previews = match resp.parse_payload::<FormPayload>() {
            Ok(payload) => payload.previews(),
            Err(e) => {
                debug!(form_id, error = %e, "unrecognized update payload");
                Vec::new()
            }
        };
        info!(form_id, file = %file.name, "form updated");
        Ok(UpdateOutcome { verdict, previews })
    }

    /// Parses a workbook without storing it.
    ///
    /// Failures are classified into a [`ParseFailure`] with a user-facing
    /// message and remediation hints.
    pub async fn parse_only(
        &self,
        conn: &dyn FormsConnection,
        file: &FileHandle,
    ) -> Result<ParsedSchema, ParseFailure> {
        let part = file
            .read()
            .await
            .map_err(|e| ParseFailure::new(ParseErrorKind::Unknown, e.to_string()))?;

        let resp = send(conn, Request::parse_form(part))
            .await
            .map_err(|e| match e {
                FormsError::Api { status, body } => ParseFailure::classify(Some(status), body),
                FormsError::Connection(detail) => ParseFailure::classify(None, detail),
                other => ParseFailure::new(ParseErrorKind::Unknown, other.to_string()),
            })?;

        resp.parse_payload::<ParsedSchema>().map_err(|e| {
            warn!(file = %file.name, error = %e, "unreadable parse result");
            ParseFailure::new(ParseErrorKind::Unknown, e.to_string())
        })
    }

    /// Writes one form's details to `dir` as pretty JSON.
    pub async fn export_form(
        &self,
        conn: &dyn FormsConnection,
        form_id: &str,
        dir: &Path,
    ) -> Result<PathBuf, FormsError> {
        let details = self.get_by_id(conn, form_id).await?;
        let path = dir.join(export_file_name(&details.form.title, &details.form.id));
        let json = serde_json::to_string_pretty(&details)?;
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, json).await?;
        debug!(form_id, path = %path.display(), "form exported");
        Ok(path)
    }

    /// Exports every stored form. A form that fails is logged and skipped.
    pub async fn export_all(
        &self,
        conn: &dyn FormsConnection,
        dir: &Path,
    ) -> Result<ExportReport, FormsError> {
        let list = self.list_all(conn).await?;
        let mut report = ExportReport::default();

        for form in list.forms {
            match self.export_form(conn, &form.id, dir).await {
                Ok(path) => report.written.push(path),
                Err(e) => {
                    warn!(form_id = %form.id, error = %e, "failed to export form");
                    report.failed.push((form.id, e.to_string()));
                }
            }
        }

        info!(
            written = report.written.len(),
            failed = report.failed.len(),
            "export finished"
        );
        Ok(report)
    }
}

/// `<sanitized-title>-<id>.json`
pub fn export_file_name(title: &str, form_id: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.trim().chars() {
        if c.is_alphanumeric() || c == '_' {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "form" } else { slug };

    let id: String = form_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    format!("{slug}-{id}.json")
}

async fn send(conn: &dyn FormsConnection, request: Request) -> Result<Response, FormsError> {
    let resp = conn.send_request(request).await?;
    if resp.is_success() {
        Ok(resp)
    } else {
        Err(FormsError::Api {
            status: resp.status,
            body: resp.error_detail(),
        })
    }
}

fn not_found(err: FormsError, form_id: &str) -> FormsError {
    match err {
        FormsError::Api { status: 404, .. } => FormsError::NotFound(form_id.to_string()),
        other => other,
    }
}

fn ack_or(resp: &Response, fallback: &str) -> Ack {
    resp.parse_payload::<Ack>().unwrap_or_else(|_| Ack {
        message: fallback.to_string(),
    })
}
