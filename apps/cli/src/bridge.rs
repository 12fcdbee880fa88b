//! Bridge between the HTTP `Client` and the `FormsConnection` traits.
//!
//! Both `upload` and `forms` define their own `FormsConnection` trait
//! (same shape, different error types). This module provides a single
//! struct that implements both.

use std::future::Future;
use std::pin::Pin;

use formbatch_client::Client;
use formbatch_protocol::{ProtocolError, Request, Response};
use formbatch_upload::UploadError;

/// Bridges `Client` to the connection traits expected by the upload and
/// forms crates.
#[derive(Debug, Clone)]
pub struct ClientBridge {
    client: Client,
}

/// Client failure after API errors have been folded back into a response.
enum Failure {
    Connection(String),
    Protocol(ProtocolError),
}

impl ClientBridge {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Executes a request. Non-success statuses come back as a `Response`
    /// so each crate applies its own status handling.
    async fn forward(&self, request: Request) -> Result<Response, Failure> {
        match self.client.execute(&request).await {
            Ok(resp) => Ok(resp),
            Err(formbatch_client::Error::Api { status, body }) => Ok(Response::new(status, body)),
            Err(formbatch_client::Error::Protocol(e)) => Err(Failure::Protocol(e)),
            Err(e) => Err(Failure::Connection(e.to_string())),
        }
    }
}

impl formbatch_upload::FormsConnection for ClientBridge {
    fn send_request(
        &self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Response, UploadError>> + Send + '_>> {
        Box::pin(async move {
            self.forward(request).await.map_err(|f| match f {
                Failure::Connection(e) => UploadError::Connection(e),
                Failure::Protocol(e) => UploadError::Protocol(e),
            })
        })
    }
}

impl formbatch_forms::FormsConnection for ClientBridge {
    fn send_request(
        &self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Response, formbatch_forms::FormsError>> + Send + '_>>
    {
        Box::pin(async move {
            self.forward(request).await.map_err(|f| match f {
                Failure::Connection(e) => formbatch_forms::FormsError::Connection(e),
                Failure::Protocol(e) => formbatch_forms::FormsError::Protocol(e),
            })
        })
    }
}
