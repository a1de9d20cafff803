//! Error taxonomy for one-shot backend requests.

use thiserror::Error;

/// Why a one-shot request did not produce a result.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A bearer endpoint was called without a token.
    #[error("not logged in")]
    NotAuthenticated,

    /// The backend answered 401.
    #[error("unauthorized")]
    Unauthorized,

    /// The backend answered 429.
    #[error("rate limited")]
    RateLimited,

    #[error("not found")]
    NotFound,

    /// Any other non-success status. `detail` is the backend's own message
    /// when the body carried one.
    #[error("backend returned status {status}")]
    Status { status: u16, detail: Option<String> },

    #[error("network error: {0}")]
    Transport(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Rejected before any network call.
    #[error("{0}")]
    Validation(String),

    /// The form already has a request in flight.
    #[error("a request is already in flight")]
    Busy,

    #[error("failed to save result: {0}")]
    Io(String),
}

impl AnalysisError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::RateLimited => Some(429),
            Self::NotFound => Some(404),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AnalysisError::Parse(err.to_string())
        } else {
            AnalysisError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for AnalysisError {
    fn from(err: std::io::Error) -> Self {
        AnalysisError::Io(err.to_string())
    }
}
