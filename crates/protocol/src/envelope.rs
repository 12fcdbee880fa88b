use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;

use crate::ProtocolError;
use crate::constants::Endpoint;

/// A spreadsheet attached to a request as a multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A single call against the service.
///
/// Transport-agnostic: the HTTP client turns this into a concrete request,
/// test doubles match on `endpoint` directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub endpoint: Endpoint,
    pub form_id: Option<String>,
    pub file: Option<FilePart>,
}

impl Request {
    fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            form_id: None,
            file: None,
        }
    }

    pub fn validate(file: FilePart) -> Self {
        Self {
            file: Some(file),
            ..Self::new(Endpoint::Validate)
        }
    }

    pub fn upload(file: FilePart) -> Self {
        Self {
            file: Some(file),
            ..Self::new(Endpoint::Upload)
        }
    }

    pub fn list_forms() -> Self {
        Self::new(Endpoint::ListForms)
    }

    pub fn get_form(form_id: impl Into<String>) -> Self {
        Self {
            form_id: Some(form_id.into()),
            ..Self::new(Endpoint::GetForm)
        }
    }

    pub fn delete_form(form_id: impl Into<String>) -> Self {
        Self {
            form_id: Some(form_id.into()),
            ..Self::new(Endpoint::DeleteForm)
        }
    }

    pub fn delete_all_forms() -> Self {
        Self::new(Endpoint::DeleteAllForms)
    }

    pub fn update_form(form_id: impl Into<String>, file: FilePart) -> Self {
        Self {
            endpoint: Endpoint::UpdateForm,
            form_id: Some(form_id.into()),
            file: Some(file),
        }
    }

    pub fn parse_form(file: FilePart) -> Self {
        Self {
            file: Some(file),
            ..Self::new(Endpoint::ParseForm)
        }
    }

    /// Path relative to the API base URL, with the form id percent-encoded.
    pub fn path(&self) -> Result<String, ProtocolError> {
        let id = || {
            self.form_id
                .as_deref()
                .filter(|id| !id.is_empty())
                .map(|id| utf8_percent_encode(id, NON_ALPHANUMERIC).to_string())
                .ok_or(ProtocolError::MissingFormId(self.endpoint))
        };

        let path = match self.endpoint {
            Endpoint::Validate => "/validate".to_string(),
            Endpoint::Upload => "/upload".to_string(),
            Endpoint::ListForms | Endpoint::DeleteAllForms => "/forms".to_string(),
            Endpoint::GetForm | Endpoint::DeleteForm => format!("/forms/{}", id()?),
            Endpoint::UpdateForm => format!("/forms/{}/update", id()?),
            Endpoint::ParseForm => "/forms/parse".to_string(),
        };

        if self.endpoint.carries_file() && self.file.is_none() {
            return Err(ProtocolError::MissingFile(self.endpoint));
        }
        Ok(path)
    }
}

/// Raw service answer: status code plus body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Error body shape used by the service (`{"detail": ...}` or `{"error": ...}`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    detail: serde_json::Value,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Builds a 200 response with a JSON body.
    pub fn json<T: serde::Serialize>(payload: &T) -> Result<Self, ProtocolError> {
        Ok(Self::new(200, serde_json::to_vec(payload)?))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserializes the body into the given type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, ProtocolError> {
        if self.body.is_empty() {
            return Err(ProtocolError::EmptyBody);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Human-readable error text from the body.
    ///
    /// Uses the service's `detail`/`error` field when present, the raw body
    /// otherwise.
    pub fn error_detail(&self) -> String {
        match serde_json::from_slice::<ErrorBody>(&self.body) {
            Ok(ErrorBody {
                detail: serde_json::Value::String(s),
            }) => s,
            Ok(ErrorBody { detail }) => detail.to_string(),
            Err(_) => String::from_utf8_lossy(&self.body).trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part() -> FilePart {
        FilePart {
            file_name: "survey.xlsx".into(),
            content_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                .into(),
            data: b"PK".to_vec(),
        }
    }

    #[test]
    fn paths_for_each_endpoint() {
        assert_eq!(Request::validate(part()).path().unwrap(), "/validate");
        assert_eq!(Request::upload(part()).path().unwrap(), "/upload");
        assert_eq!(Request::list_forms().path().unwrap(), "/forms");
        assert_eq!(Request::delete_all_forms().path().unwrap(), "/forms");
        assert_eq!(Request::get_form("f1").path().unwrap(), "/forms/f1");
        assert_eq!(
            Request::update_form("f1", part()).path().unwrap(),
            "/forms/f1/update"
        );
        assert_eq!(Request::parse_form(part()).path().unwrap(), "/forms/parse");
    }

    #[test]
    fn form_id_is_percent_encoded() {
        let req = Request::delete_form("a/b c");
        assert_eq!(req.path().unwrap(), "/forms/a%2Fb%20c");
    }

    #[test]
    fn missing_form_id_is_rejected() {
        let req = Request {
            endpoint: Endpoint::GetForm,
            form_id: None,
            file: None,
        };
        assert!(matches!(
            req.path(),
            Err(ProtocolError::MissingFormId(Endpoint::GetForm))
        ));
    }

    #[test]
    fn missing_file_is_rejected() {
        let req = Request {
            endpoint: Endpoint::Upload,
            form_id: None,
            file: None,
        };
        assert!(matches!(
            req.path(),
            Err(ProtocolError::MissingFile(Endpoint::Upload))
        ));
    }

    #[test]
    fn parse_payload_empty_body() {
        let resp = Response::new(204, Vec::new());
        let parsed: Result<serde_json::Value, _> = resp.parse_payload();
        assert!(matches!(parsed, Err(ProtocolError::EmptyBody)));
    }

    #[test]
    fn error_detail_prefers_detail_field() {
        let resp = Response::new(400, r#"{"detail":"Missing sheet: Forms"}"#);
        assert_eq!(resp.error_detail(), "Missing sheet: Forms");

        let resp = Response::new(500, r#"{"error":"boom"}"#);
        assert_eq!(resp.error_detail(), "boom");

        let resp = Response::new(502, "Bad Gateway\n");
        assert_eq!(resp.error_detail(), "Bad Gateway");
    }

    #[test]
    fn success_range() {
        assert!(Response::new(200, "{}").is_success());
        assert!(Response::new(204, "").is_success());
        assert!(!Response::new(413, "").is_success());
    }
}
