use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Client setup failed: {0}")]
    Client(String),
}

impl FetchError {
    pub(crate) fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_builder() {
            FetchError::InvalidUrl(url.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }

    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The page does not exist. Definitive: retrying will not help.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Rate limited, server overloaded, or timed out.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Timeout { .. }) || matches!(self.status(), Some(429 | 503))
    }

    /// Tag persisted as `ScrapingError.error_type`.
    pub fn error_type(&self) -> &'static str {
        match self {
            FetchError::Status { .. } => "http_status",
            FetchError::Timeout { .. } => "timeout",
            FetchError::Network(_) => "network",
            FetchError::InvalidUrl(_) => "invalid_url",
            FetchError::Client(_) => "client",
        }
    }
}
