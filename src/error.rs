//! # Gateway Error Taxonomy
//!
//! Every terminal condition the dispatcher can produce is a distinct, named
//! variant with its own HTTP status mapping. Cache backend failures are
//! deliberately absent from this surface: they degrade to pass-through inside
//! the cache layer (see `cache::CacheError`) and never reach a caller.

use std::time::Duration;
use thiserror::Error;

/// Terminal request outcomes and configuration-time failures.
///
/// `Clone` so that a single origin-fetch failure can be shared with every
/// waiter parked on the same in-flight cache fetch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    /// Admission denied by the token-bucket limiter. Client should back off
    /// for `retry_after` before reattempting.
    #[error("rate limit exceeded for {key}, retry after {retry_after:?}")]
    RateLimited { key: String, retry_after: Duration },

    /// No configured route matched the request.
    #[error("no route matches {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// Circuit breaker is open for the target backend; the backend was not
    /// contacted.
    #[error("circuit open for backend {backend}, retry after {retry_after:?}")]
    CircuitOpen {
        backend: String,
        retry_after: Duration,
    },

    /// Every attempt timed out.
    #[error("backend {backend} timed out after {attempts} attempts")]
    BackendTimeout { backend: String, attempts: u32 },

    /// Retry budget exhausted, or a non-retryable backend failure.
    #[error("backend {backend} failed after {attempts} attempts (last status {last_status:?})")]
    BackendExhausted {
        backend: String,
        attempts: u32,
        last_status: Option<u16>,
    },

    /// Invalid configuration, rejected at load time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invariant violation inside the data plane. Should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status code the excluded server layer should surface.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::RateLimited { .. } => 429,
            GatewayError::RouteNotFound { .. } => 404,
            GatewayError::CircuitOpen { .. } => 503,
            GatewayError::BackendTimeout { .. } => 504,
            GatewayError::BackendExhausted { .. } => 502,
            GatewayError::Configuration(_) | GatewayError::Internal(_) => 500,
        }
    }

    /// Backoff hint for 429/503 responses, when one exists.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after, .. }
            | GatewayError::CircuitOpen { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_distinct_per_condition() {
        let denied = GatewayError::RateLimited {
            key: "k".into(),
            retry_after: Duration::from_secs(30),
        };
        assert_eq!(denied.status_code(), 429);
        assert_eq!(denied.retry_after(), Some(Duration::from_secs(30)));

        let not_found = GatewayError::RouteNotFound {
            method: "GET".into(),
            path: "/x".into(),
        };
        assert_eq!(not_found.status_code(), 404);
        assert_eq!(not_found.retry_after(), None);

        let open = GatewayError::CircuitOpen {
            backend: "b".into(),
            retry_after: Duration::from_secs(42),
        };
        assert_eq!(open.status_code(), 503);
        assert_eq!(open.retry_after(), Some(Duration::from_secs(42)));

        let timeout = GatewayError::BackendTimeout {
            backend: "b".into(),
            attempts: 3,
        };
        assert_eq!(timeout.status_code(), 504);

        let exhausted = GatewayError::BackendExhausted {
            backend: "b".into(),
            attempts: 3,
            last_status: Some(502),
        };
        assert_eq!(exhausted.status_code(), 502);
    }
}
