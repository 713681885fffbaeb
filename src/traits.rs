use crate::promote::search::SearchQuery;
use crate::promote::traits::SearchMatch;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store request timed out: {0}")]
    Timeout(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Store responded with {status}: {reason}")]
    Status { status: u16, reason: String },
    #[error("Malformed store response: {0}")]
    Decode(String),
    #[error("Invalid store configuration: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Transport failures, request timeouts and 5xx responses are transient.
    /// Authentication failures never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Timeout(_) | StoreError::Transport(_) => true,
            StoreError::Status { status, .. } => match *status {
                401 | 403 => false,
                408 => true,
                s => (500..600).contains(&s),
            },
            StoreError::Decode(_) | StoreError::Configuration(_) => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout(_))
    }
}

/// Status line of a store call, as recorded in outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreResponse {
    pub status: u16,
    pub reason: String,
}

impl StoreResponse {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(404, "Package Not Found")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<&StoreError> for StoreResponse {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::Status { status, reason } => Self::new(*status, reason.clone()),
            StoreError::Timeout(_) => Self::new(408, err.to_string()),
            _ => Self::new(500, err.to_string()),
        }
    }
}

/// The artifact store boundary: query for matches, and issue a copy/move.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Runs one search query and returns every match the store reports.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchMatch>, StoreError>;

    /// Issues the copy or move request at `url`. Non-2xx answers are `Err(Status)`.
    async fn transfer(&self, url: &str) -> Result<StoreResponse, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> StoreError {
        StoreError::Status {
            status: code,
            reason: String::new(),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(StoreError::Timeout("t".into()).is_retryable());
        assert!(StoreError::Transport("refused".into()).is_retryable());
        assert!(status(408).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());

        assert!(!status(401).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(409).is_retryable());
        assert!(!StoreError::Decode("bad json".into()).is_retryable());
    }

    #[test]
    fn test_response_from_error() {
        let r = StoreResponse::from(&status(409));
        assert_eq!(r.status, 409);
        assert!(!r.is_success());

        let r = StoreResponse::from(&StoreError::Timeout("slow".into()));
        assert_eq!(r.status, 408);

        let r = StoreResponse::from(&StoreError::Transport("reset".into()));
        assert_eq!(r.status, 500);
        assert!(r.reason.contains("reset"));
    }
}
