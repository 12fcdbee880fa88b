//! Form service HTTP client.
//!
//! Async client using `reqwest`; spreadsheet bodies go out as multipart.

use formbatch_protocol::constants::FILE_FIELD;
use formbatch_protocol::{Method, ProtocolError, Request, Response};
use reqwest::multipart::{Form, Part};
use tracing::debug;

/// Errors from the form service client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status; `body` is the raw response text.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid API URL: {0}")]
    InvalidUrl(String),
}

/// Form service client.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Creates a client for the given API base URL (e.g. `http://localhost:8000/api`).
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one request.
    ///
    /// The per-endpoint timeout applies. Non-success statuses become
    /// [`Error::Api`] carrying the raw body.
    pub async fn execute(&self, request: &Request) -> Result<Response, Error> {
        let url = format!("{}{}", self.base_url, request.path()?);
        let method = match request.endpoint.method() {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .http
            .request(method.clone(), &url)
            .timeout(request.endpoint.timeout());

        if let Some(file) = &request.file {
            let part = Part::bytes(file.data.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)?;
            builder = builder.multipart(Form::new().part(FILE_FIELD, part));
        }

        debug!(%method, %url, "sending request");
        let resp = builder.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Response::new(status.as_u16(), resp.bytes().await?.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formbatch_protocol::{FilePart, FormsList};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Starts a mock HTTP server that answers once with `status` and `body`
    /// and hands back the head of the request it received.
    async fn mock_server(status: u16, body: &str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/api");
        let body = body.to_string();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 16384];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let _ = tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());

                let resp = format!(
                    "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, rx)
    }

    fn part() -> FilePart {
        FilePart {
            file_name: "survey.xlsx".into(),
            content_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                .into(),
            data: b"PK\x03\x04".to_vec(),
        }
    }

    #[tokio::test]
    async fn list_forms() {
        let (url, seen) = mock_server(200, r#"{"forms":[],"count":0}"#).await;
        let client = Client::new(&url).unwrap();

        let resp = client.execute(&Request::list_forms()).await.unwrap();
        let list: FormsList = resp.parse_payload().unwrap();
        assert_eq!(list.count, 0);

        let head = seen.await.unwrap();
        assert!(head.starts_with("GET /api/forms HTTP/1.1"), "{head}");
    }

    #[tokio::test]
    async fn upload_sends_multipart_file() {
        let (url, seen) = mock_server(200, r#"{"form":{"id":"f1","title":"T"}}"#).await;
        let client = Client::new(&url).unwrap();

        let resp = client.execute(&Request::upload(part())).await.unwrap();
        assert!(resp.is_success());

        let head = seen.await.unwrap();
        assert!(head.starts_with("POST /api/upload HTTP/1.1"), "{head}");
        assert!(head.to_ascii_lowercase().contains("multipart/form-data"));
    }

    #[tokio::test]
    async fn upload_carries_one_file_part() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/api");

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut seen = Vec::new();
            let mut buf = vec![0u8; 4096];
            // The closing boundary ends with "--\r\n".
            while !seen.ends_with(b"--\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                seen.extend_from_slice(&buf[..n]);
            }
            let body = r#"{"form":{"id":"f1","title":"T"}}"#;
            let resp = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(resp.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
            String::from_utf8_lossy(&seen).into_owned()
        });

        let client = Client::new(&url).unwrap();
        let resp = client.execute(&Request::upload(part())).await.unwrap();
        assert!(resp.is_success());

        let request = server.await.unwrap();
        assert_eq!(request.matches("name=\"file\"").count(), 1, "{request}");
        assert!(!request.contains("name=\"files\""));
        assert!(request.contains("filename=\"survey.xlsx\""));
    }

    #[tokio::test]
    async fn update_uses_put_and_encoded_id() {
        let (url, seen) = mock_server(200, "{}").await;
        let client = Client::new(&url).unwrap();
        client
            .execute(&Request::update_form("a b", part()))
            .await
            .unwrap();
        let head = seen.await.unwrap();
        assert!(head.starts_with("PUT /api/forms/a%20b/update"), "{head}");
    }

    #[tokio::test]
    async fn delete_all_uses_delete() {
        let (url, seen) = mock_server(200, r#"{"message":"ok"}"#).await;
        let client = Client::new(&url).unwrap();
        client.execute(&Request::delete_all_forms()).await.unwrap();
        assert!(seen.await.unwrap().starts_with("DELETE /api/forms HTTP/1.1"));
    }

    #[tokio::test]
    async fn error_status_keeps_raw_body() {
        let (url, _seen) = mock_server(404, r#"{"detail":"Form not found"}"#).await;
        let client = Client::new(&url).unwrap();
        let err = client.execute(&Request::get_form("x")).await.unwrap_err();
        match err {
            Error::Api { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, r#"{"detail":"Form not found"}"#);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_http_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = Client::new(&format!("http://127.0.0.1:{port}/api")).unwrap();
        let err = client.execute(&Request::list_forms()).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }

    #[tokio::test]
    async fn missing_file_is_rejected_before_sending() {
        let client = Client::new("http://127.0.0.1:9/api").unwrap();
        let req = Request {
            endpoint: formbatch_protocol::Endpoint::Upload,
            form_id: None,
            file: None,
        };
        assert!(matches!(
            client.execute(&req).await,
            Err(Error::Protocol(ProtocolError::MissingFile(_)))
        ));
    }

    #[test]
    fn base_url_is_normalized() {
        let client = Client::new("http://localhost:8000/api/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert!(matches!(
            Client::new("localhost:8000"),
            Err(Error::InvalidUrl(_))
        ));
    }
}
