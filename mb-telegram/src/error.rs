use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Network failure or 5xx; safe to retry.
    #[error("transient transport error: {0}")]
    Transient(String),

    /// 429 from the Bot API.
    #[error("rate limited; retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Rejected request (bad request, message not found, forbidden, ...).
    #[error("telegram rejected request ({code}): {description}")]
    Permanent { code: i64, description: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Transient(_) | TransportError::RateLimited { .. }
        )
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transient(e.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Transient(format!("unexpected response format: {e}"))
    }
}
