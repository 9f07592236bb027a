use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::TransportError;

#[derive(Serialize)]
struct ChatRequest<'a> {
    prompt: &'a str,
}

/// A completed HTTP exchange, success or not. Interpretation of the body is
/// left to [`crate::reply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text(status),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Canonical reason phrase for a status code, or the bare code when the
/// code has none.
pub fn status_text(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string())
}

/// Request/response primitives the session needs from the backend.
///
/// Cancellation is not part of the trait: the session races the returned
/// future against its own token and drops it when superseded, which aborts
/// the underlying request.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// `GET {base}/ping`. Only success or failure matters.
    async fn ping(&self) -> Result<(), TransportError>;

    /// `POST {base}/chat` with `{"prompt": prompt}`.
    async fn chat(&self, prompt: &str) -> Result<RawResponse, TransportError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn ping(&self) -> Result<(), TransportError> {
        let url = format!("{}/ping", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::connect(&url, e))?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn chat(&self, prompt: &str) -> Result<RawResponse, TransportError> {
        let url = format!("{}/chat", self.base_url);

        // .json() sets Content-Type: application/json
        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { prompt })
            .send()
            .await
            .map_err(|e| TransportError::connect(&url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(RawResponse::new(status.as_u16(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_known_code() {
        assert_eq!(status_text(500), "Internal Server Error");
        assert_eq!(status_text(404), "Not Found");
    }

    #[test]
    fn test_status_text_unknown_code_falls_back_to_number() {
        assert_eq!(status_text(599), "599");
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let transport = HttpTransport::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_raw_response_success_range() {
        assert!(RawResponse::new(200, "").is_success());
        assert!(RawResponse::new(204, "").is_success());
        assert!(!RawResponse::new(301, "").is_success());
        assert!(!RawResponse::new(500, "").is_success());
    }
}
