use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Base URL of a locally running service.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Timeout for JSON-only requests (list, get, delete).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for requests carrying a spreadsheet body.
///
/// Validation and commit both parse the whole workbook server-side, which
/// is far slower than a list or delete.
pub const FILE_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Multipart field name for a single file body.
pub const FILE_FIELD: &str = "file";

/// HTTP method used by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// Remote operation exposed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// Dry-run validation; persists nothing.
    Validate,
    /// Parse and store a form.
    Upload,
    ListForms,
    GetForm,
    DeleteForm,
    DeleteAllForms,
    /// Re-parse a file and replace an existing form.
    UpdateForm,
    /// Parse without storing.
    ParseForm,
}

impl Endpoint {
    /// HTTP method for this endpoint.
    pub fn method(self) -> Method {
        match self {
            Endpoint::Validate | Endpoint::Upload | Endpoint::ParseForm => Method::Post,
            Endpoint::ListForms | Endpoint::GetForm => Method::Get,
            Endpoint::DeleteForm | Endpoint::DeleteAllForms => Method::Delete,
            Endpoint::UpdateForm => Method::Put,
        }
    }

    /// Whether the path contains a `{id}` segment.
    pub fn needs_form_id(self) -> bool {
        matches!(
            self,
            Endpoint::GetForm | Endpoint::DeleteForm | Endpoint::UpdateForm
        )
    }

    /// Whether the request body is a multipart file upload.
    pub fn carries_file(self) -> bool {
        matches!(
            self,
            Endpoint::Validate | Endpoint::Upload | Endpoint::UpdateForm | Endpoint::ParseForm
        )
    }

    /// Request timeout appropriate for this endpoint.
    pub fn timeout(self) -> Duration {
        if self.carries_file() {
            FILE_REQUEST_TIMEOUT
        } else {
            REQUEST_TIMEOUT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_match_service_routes() {
        assert_eq!(Endpoint::Validate.method(), Method::Post);
        assert_eq!(Endpoint::ListForms.method(), Method::Get);
        assert_eq!(Endpoint::DeleteAllForms.method(), Method::Delete);
        assert_eq!(Endpoint::UpdateForm.method(), Method::Put);
    }

    #[test]
    fn file_endpoints_get_long_timeout() {
        assert_eq!(Endpoint::Upload.timeout(), FILE_REQUEST_TIMEOUT);
        assert_eq!(Endpoint::GetForm.timeout(), REQUEST_TIMEOUT);
    }

    #[test]
    fn endpoint_serialization() {
        assert_eq!(
            serde_json::to_string(&Endpoint::DeleteAllForms).unwrap(),
            "\"delete_all_forms\""
        );
    }
}
