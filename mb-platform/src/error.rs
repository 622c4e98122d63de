use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlatformError>;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid platform config: {0}")]
    InvalidConfig(String),

    #[error("platform already registered: {0}")]
    Duplicate(String),

    #[error("http error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            return Self::Unavailable(e.to_string());
        }
        Self::Http(e.to_string())
    }
}

impl From<regex::Error> for PlatformError {
    fn from(e: regex::Error) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}
