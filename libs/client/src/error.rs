//! Error taxonomy for upstream calls.
//!
//! Local validation failures (`InvalidCursor`, `UnparseableTime`) are never
//! retried and map to a 400-class code. Transient upstream failures are
//! retried inside the transport; the variants here describe what is left
//! after the retry budget is spent.

use std::time::Duration;

/// Why an in-flight request was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The per-attempt timeout fired.
    Timeout,
    /// The caller's cancellation signal fired.
    Cancelled,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::Timeout => write!(f, "attempt timed out"),
            AbortReason::Cancelled => write!(f, "cancelled by caller"),
        }
    }
}

/// Unified error type for the client crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A pagination token that was not produced by [`crate::PageCursor::encode`].
    #[error("invalid pagination token: {0}")]
    InvalidCursor(String),

    /// A time value that none of the parsing strategies accepted.
    #[error("could not parse time value {value:?} for field '{field}'")]
    UnparseableTime { field: String, value: String },

    /// Upstream answered 429 even after the retry budget was spent.
    #[error("upstream rate limit exceeded (429)")]
    RateLimited { retry_after: Option<Duration> },

    /// Upstream kept answering 502/503/504 until the retry budget was spent.
    #[error("transient upstream failure (status {status})")]
    TransientStatus { status: u16 },

    /// Network-level failure (connect, TLS, reset) after the retry budget.
    #[error("upstream connection failed: {0}")]
    Network(#[source] reqwest::Error),

    /// The attempt was aborted by timeout or caller cancellation. Never retried.
    #[error("request aborted: {0}")]
    Aborted(AbortReason),

    /// Any other non-2xx upstream answer. Not retryable.
    #[error("upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// A 2xx answer whose body did not match the expected schema.
    #[error("failed to decode upstream response: {0}")]
    Decode(#[source] reqwest::Error),

    /// The request body cannot be cloned for a retry attempt.
    #[error("request cannot be replayed for retry")]
    UnreplayableRequest,

    /// A [`crate::RetryPolicy`] that violates its own invariants.
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),

    /// A base URL rejected at client construction time.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ClientError {
    /// Stable machine-readable code for the outer protocol layer.
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::InvalidCursor(_) | ClientError::UnparseableTime { .. } => {
                "INVALID_REQUEST"
            }
            ClientError::RateLimited { .. } => "RATE_LIMITED",
            ClientError::TransientStatus { .. } | ClientError::Network(_) => "SERVICE_UNAVAILABLE",
            ClientError::Aborted(AbortReason::Timeout) => "TIMEOUT",
            ClientError::Aborted(AbortReason::Cancelled) => "ABORTED",
            ClientError::UpstreamStatus { .. } | ClientError::Decode(_) => "UPSTREAM_ERROR",
            ClientError::UnreplayableRequest
            | ClientError::InvalidPolicy(_)
            | ClientError::InvalidBaseUrl(_) => "INTERNAL",
        }
    }

    /// HTTP status the error maps to when surfaced over an HTTP boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            ClientError::InvalidCursor(_) | ClientError::UnparseableTime { .. } => 400,
            ClientError::RateLimited { .. } => 429,
            ClientError::TransientStatus { .. } | ClientError::Network(_) => 503,
            ClientError::Aborted(AbortReason::Timeout) => 504,
            ClientError::Aborted(AbortReason::Cancelled) => 499,
            ClientError::UpstreamStatus { .. } | ClientError::Decode(_) => 502,
            ClientError::UnreplayableRequest
            | ClientError::InvalidPolicy(_)
            | ClientError::InvalidBaseUrl(_) => 500,
        }
    }

    /// Whether the caller may reasonably retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::RateLimited { .. }
                | ClientError::TransientStatus { .. }
                | ClientError::Network(_)
        )
    }

    /// Retry-after hint echoed from the upstream, when it sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ClientError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
