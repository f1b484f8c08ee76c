use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which extraction operation produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListVideos,
    ResolveStream,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListVideos => write!(f, "listVideos"),
            Self::ResolveStream => write!(f, "resolveStream"),
        }
    }
}

/// Why a single upstream fetch did not produce a body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream request failed: {0}")]
    Network(String),
}

impl From<reqwest::Error> for FetchFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{operation}: {failure}")]
    UpstreamFetch {
        operation: Operation,
        failure: FetchFailure,
    },

    #[error("stream URL not found on {page_url}")]
    StreamNotFound { page_url: String },
}

/// Stable, serializable error category handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InvalidInputError,
    UpstreamFetchError,
    StreamNotFoundError,
}

impl ExtractError {
    pub fn upstream(operation: Operation, failure: FetchFailure) -> Self {
        Self::UpstreamFetch { operation, failure }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInputError,
            Self::UpstreamFetch { .. } => ErrorKind::UpstreamFetchError,
            Self::StreamNotFound { .. } => ErrorKind::StreamNotFoundError,
        }
    }

    /// Upstream HTTP status, when the failure carried one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::UpstreamFetch {
                failure: FetchFailure::Status(code),
                ..
            } => Some(*code),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::UpstreamFetch {
                failure: FetchFailure::Timeout,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_only_for_status_failures() {
        let err = ExtractError::upstream(Operation::ListVideos, FetchFailure::Status(503));
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.kind(), ErrorKind::UpstreamFetchError);
        assert_eq!(err.to_string(), "listVideos: upstream returned HTTP 503");

        let err = ExtractError::upstream(Operation::ResolveStream, FetchFailure::Timeout);
        assert_eq!(err.status_code(), None);
        assert!(err.is_timeout());
    }

    #[test]
    fn stream_not_found_kind() {
        let err = ExtractError::StreamNotFound {
            page_url: "https://example.test/a/".into(),
        };
        assert_eq!(err.kind(), ErrorKind::StreamNotFoundError);
        assert_eq!(err.status_code(), None);
    }
}
