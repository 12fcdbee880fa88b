//! Connection trait to the form service.
//!
//! `FormsConnection` is implemented by the application on top of the HTTP
//! client. Keeping it a trait leaves the upload flow testable with mocks.

use std::future::Future;
use std::pin::Pin;

use formbatch_protocol::{Request, Response};

use crate::error::UploadError;

/// Abstract connection to the form service.
pub trait FormsConnection: Send + Sync {
    /// Sends a request and waits for the raw answer.
    ///
    /// Implementations may either return non-success statuses as a
    /// [`Response`] or map them to [`UploadError::Api`]; callers accept both.
    fn send_request(
        &self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Response, UploadError>> + Send + '_>>;
}

/// Turns a non-success [`Response`] into [`UploadError::Api`].
pub(crate) fn ensure_success(response: Response) -> Result<Response, UploadError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(UploadError::Api {
            status: response.status,
            body: response.error_detail(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_passes_through() {
        let resp = Response::new(201, "{}");
        assert_eq!(ensure_success(resp).unwrap().status, 201);
    }

    #[test]
    fn failure_becomes_api_error() {
        let resp = Response::new(422, r#"{"detail":"Missing sheet"}"#);
        match ensure_success(resp) {
            Err(UploadError::Api { status, body }) => {
                assert_eq!(status, 422);
                assert_eq!(body, "Missing sheet");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
