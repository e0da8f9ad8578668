mod http;

use crate::core::models::ReloadResponse;
use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpSource;

/// Failures where no HTTP status was received.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid page URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("could not connect: {0}")]
    Connection(String),

    #[error("request timed out")]
    TimedOut,

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("page request returned status {0}")]
    Status(u16),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::TimedOut
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else {
            TransportError::Request(err)
        }
    }
}

/// Where reload responses come from.
#[async_trait]
pub trait ReloadSource: Send + Sync {
    /// Human-readable target, used in log fields.
    fn target(&self) -> String;

    /// Issues one reload request and waits for it to complete.
    async fn fetch(&self) -> Result<ReloadResponse, TransportError>;

    /// Records the validator of a 200 response once its body has been
    /// applied. Until then the previous validator keeps being sent.
    async fn commit_validator(&self, _etag: Option<&str>) {}
}
