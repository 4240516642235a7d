//! Sluice error types

use std::time::Duration;

/// Sluice error types
#[derive(Debug, thiserror::Error)]
pub enum SluiceError {
    // Caller errors — never retried, surfaced immediately
    #[error("validation failed: {0}")]
    Validation(String),

    /// The submitted target matches none of the broker's configured
    /// patterns. Raised before the job is enqueued.
    #[error("target not allowed by this broker: {url}")]
    TargetNotAllowed { url: String },

    #[error("unauthorized")]
    Unauthorized,

    // Network errors — transient, retried by the resiliency layer.
    // Inside the worker they become a `Failed` job outcome instead of
    // terminating the loop.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    // Unknown references — reported as not-found, never a panic
    #[error("broker not found: {0}")]
    BrokerNotFound(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unexpected failure. Carries a correlation id so the log line and
    /// the surfaced error can be matched up; not retried by default.
    #[error("internal error [{correlation_id}]: {message}")]
    Internal {
        correlation_id: String,
        message: String,
    },
}

impl SluiceError {
    /// Build an `Internal` error with a fresh correlation id, logging the
    /// full message at error level under that id.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        let correlation_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        tracing::error!(correlation_id, %message, "internal error");
        Self::Internal {
            correlation_id,
            message,
        }
    }

    /// Whether this error is transient and worth retrying.
    ///
    /// Only the network family qualifies: connection failures, timeouts,
    /// rate limiting, and 5xx upstream responses. A 4xx is a caller error
    /// and retrying it cannot succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SluiceError::Http(_) | SluiceError::Timeout { .. } | SluiceError::RateLimited { .. } => {
                true
            }
            SluiceError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Retry-after hint from a `RateLimited` error, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SluiceError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Stable error code for the admin surface.
    ///
    /// These strings are the only error detail external callers see for
    /// internal failures — never stack traces or wrapped source errors.
    pub fn code(&self) -> &'static str {
        match self {
            SluiceError::Validation(_) => "validation_error",
            SluiceError::TargetNotAllowed { .. } => "target_not_allowed",
            SluiceError::Unauthorized => "unauthorized",
            SluiceError::Http(_) => "network_error",
            SluiceError::Timeout { .. } => "timeout",
            SluiceError::Upstream { .. } => "upstream_error",
            SluiceError::RateLimited { .. } => "rate_limited",
            SluiceError::BrokerNotFound(_) => "broker_not_found",
            SluiceError::JobNotFound(_) => "job_not_found",
            SluiceError::Json(_) => "invalid_json",
            SluiceError::Configuration(_) => "configuration_error",
            SluiceError::Internal { .. } => "internal_error",
        }
    }
}

impl From<reqwest::Error> for SluiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured timeout here; the
            // dispatcher rewraps with the real value when it has it.
            SluiceError::Timeout { seconds: 0 }
        } else if let Some(status) = err.status() {
            SluiceError::Upstream {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            SluiceError::Http(err.to_string())
        }
    }
}

/// Result type alias for sluice operations
pub type Result<T> = std::result::Result<T, SluiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_family_is_transient() {
        assert!(SluiceError::Http("connection refused".into()).is_transient());
        assert!(SluiceError::Timeout { seconds: 30 }.is_transient());
        assert!(SluiceError::RateLimited { retry_after: None }.is_transient());
        assert!(
            SluiceError::Upstream {
                status: 503,
                message: "unavailable".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn caller_errors_are_permanent() {
        assert!(!SluiceError::Validation("bad url".into()).is_transient());
        assert!(
            !SluiceError::TargetNotAllowed {
                url: "https://x".into()
            }
            .is_transient()
        );
        assert!(!SluiceError::Unauthorized.is_transient());
        assert!(
            !SluiceError::Upstream {
                status: 404,
                message: "not found".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn retry_after_hint_only_on_rate_limited() {
        let hint = Duration::from_secs(7);
        let err = SluiceError::RateLimited {
            retry_after: Some(hint),
        };
        assert_eq!(err.retry_after(), Some(hint));
        assert_eq!(SluiceError::Timeout { seconds: 1 }.retry_after(), None);
    }

    #[test]
    fn internal_error_carries_correlation_id() {
        let err = SluiceError::internal("boom");
        match err {
            SluiceError::Internal {
                correlation_id,
                message,
            } => {
                assert_eq!(correlation_id.len(), 8);
                assert_eq!(message, "boom");
            }
            other => panic!("expected Internal, got {other:?}"),
        }
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(SluiceError::Unauthorized.code(), "unauthorized");
        assert_eq!(
            SluiceError::BrokerNotFound("x".into()).code(),
            "broker_not_found"
        );
        assert_eq!(SluiceError::Http("x".into()).code(), "network_error");
    }
}
