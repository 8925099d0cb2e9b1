//! Error types for costsync.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! - **Configuration**: invalid or inconsistent option values, caught by the
//!   validator before any request is made
//! - **Permanent HTTP**: auth rejection, missing resources, decode failures,
//!   other 4xx responses; never retried
//! - **Retryable HTTP**: rate limiting, 5xx, timeouts, network failures;
//!   absorbed by the retry loop up to its budget
//! - **Sink**: write or bookmark failures from the persistence layer
//!
//! Retryable errors carry enough information for the retry loop to decide
//! how long to wait ([`SyncError::retry_after`]).

use std::time::Duration;

use thiserror::Error;

/// Exit codes for the CLI wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Config validation or response decode errors
    ParseError = 3,
    /// Timeout
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for costsync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    // ==========================================================================
    // Configuration errors
    // ==========================================================================
    /// Invalid value in the option bundle.
    #[error("invalid config value for '{key}': {message}")]
    ConfigInvalid { key: String, message: String },

    // ==========================================================================
    // Permanent HTTP errors
    // ==========================================================================
    /// Authentication rejected by the vendor (401/403).
    #[error("authentication rejected by cost API (HTTP {status})")]
    AuthRejected { status: u16 },

    /// Requested report or workspace does not exist (404).
    #[error("cost API resource not found (HTTP 404)")]
    NotFound,

    /// Any other non-retryable API response.
    #[error("cost API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("failed to decode cost API response: {0}")]
    Decode(String),

    // ==========================================================================
    // Retryable HTTP errors
    // ==========================================================================
    /// Rate limited by the vendor (429).
    #[error("rate limited by cost API")]
    RateLimited { retry_after: Option<Duration> },

    /// Transient server-side failure (500/502/503/504).
    #[error("transient cost API failure (HTTP {status})")]
    Transient { status: u16 },

    /// Request timed out after the configured per-request deadline.
    #[error("request timeout after {0}s")]
    Timeout(u64),

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Retry budget exhausted; wraps the final underlying error.
    #[error("request failed after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<SyncError>,
    },

    // ==========================================================================
    // Sink errors
    // ==========================================================================
    /// A sink operation failed. The sink decides its own sub-kinds.
    #[error("sink {op} failed: {cause}")]
    Sink { op: &'static str, cause: anyhow::Error },

    // ==========================================================================
    // I/O errors
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Map error to exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::ConfigInvalid { .. } | Self::Decode(_) | Self::Json(_) => ExitCode::ParseError,
            Self::Timeout(_) => ExitCode::Timeout,
            Self::AuthRejected { .. }
            | Self::NotFound
            | Self::Api { .. }
            | Self::RateLimited { .. }
            | Self::Transient { .. }
            | Self::Network(_)
            | Self::RetriesExhausted { .. }
            | Self::Sink { .. }
            | Self::Io(_) => ExitCode::GeneralError,
        }
    }

    /// Returns whether the error is recoverable by retrying the request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Transient { .. } | Self::Timeout(_) | Self::Network(_)
        )
    }

    /// Returns the wait the vendor asked for, if this error specifies one.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for costsync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::Timeout(60).is_retryable());
        assert!(SyncError::Network("connection reset".to_string()).is_retryable());
        assert!(SyncError::Transient { status: 503 }.is_retryable());
        assert!(
            SyncError::RateLimited {
                retry_after: Some(Duration::from_secs(5)),
            }
            .is_retryable()
        );
    }

    #[test]
    fn non_retryable_errors() {
        assert!(!SyncError::AuthRejected { status: 401 }.is_retryable());
        assert!(!SyncError::NotFound.is_retryable());
        assert!(
            !SyncError::Api {
                status: 422,
                body: "bad request".to_string(),
            }
            .is_retryable()
        );
        assert!(!SyncError::Decode("truncated body".to_string()).is_retryable());
        assert!(
            !SyncError::ConfigInvalid {
                key: "page_size".to_string(),
                message: "must be at least 1".to_string(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn retries_exhausted_is_not_retryable() {
        let err = SyncError::RetriesExhausted {
            attempts: 6,
            source: Box::new(SyncError::Transient { status: 502 }),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn retry_after_returns_duration() {
        let err = SyncError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(SyncError::Transient { status: 500 }.retry_after(), None);
    }

    #[test]
    fn exit_codes_are_correct() {
        let config = SyncError::ConfigInvalid {
            key: "granularity".to_string(),
            message: "must be 'day' or 'month'".to_string(),
        };
        assert_eq!(config.exit_code(), ExitCode::ParseError);
        assert_eq!(SyncError::Timeout(60).exit_code(), ExitCode::Timeout);
        assert_eq!(
            SyncError::AuthRejected { status: 403 }.exit_code(),
            ExitCode::GeneralError
        );
        assert_eq!(
            SyncError::Decode("unexpected field".to_string()).exit_code(),
            ExitCode::ParseError
        );
    }

    #[test]
    fn error_messages_name_the_stage() {
        let err = SyncError::RetriesExhausted {
            attempts: 3,
            source: Box::new(SyncError::Transient { status: 503 }),
        };
        assert_eq!(err.to_string(), "request failed after 3 attempts");

        let sink = SyncError::Sink {
            op: "write",
            cause: anyhow::anyhow!("disk full"),
        };
        assert_eq!(sink.to_string(), "sink write failed: disk full");
    }
}
