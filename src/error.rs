//! Transport error types

use thiserror::Error;

/// Failure of an HTTP exchange before a usable response was obtained.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach the backend (DNS, refused connection, timeout).
    #[error("request to {url} failed: {message}")]
    Connect { url: String, message: String },

    /// Response arrived but its body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Non-success status where the caller required success (probe only).
    #[error("backend answered {0}")]
    Status(u16),
}

impl TransportError {
    pub fn connect(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Connect {
            url: url.into(),
            message: err.to_string(),
        }
    }

    /// True when the backend was never reached.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }
}
