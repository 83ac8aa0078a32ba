//! Backend transport seam.
//!
//! The actual HTTP client lives outside this crate; the dispatcher only
//! depends on status/error classification. Implementations should honor
//! `BackendRequest::timeout`, but the dispatcher additionally enforces it so
//! the retry loop never hangs on a misbehaving transport.

use crate::routing::RouteConfig;
use crate::types::GatewayRequest;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// One outgoing backend call.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

impl BackendRequest {
    /// Compose the backend call from the matched route and the incoming
    /// request. Query parameters are appended in sorted order.
    pub fn from_parts(route: &RouteConfig, request: &GatewayRequest) -> Self {
        let mut url = format!(
            "{}{}",
            route.backend_url.trim_end_matches('/'),
            request.path
        );
        if !request.query.is_empty() {
            url.push('?');
            for (i, (name, value)) in request.query.iter().enumerate() {
                if i > 0 {
                    url.push('&');
                }
                url.push_str(name);
                url.push('=');
                url.push_str(value);
            }
        }
        Self {
            url,
            method: request.method.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            timeout: route.timeout(),
        }
    }
}

/// A backend's answer, regardless of status code.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl BackendResponse {
    pub fn content_type(&self) -> String {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}

/// Transport-level failures, as opposed to backend-reported statuses.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
}

/// The externally supplied backend client.
#[async_trait]
pub trait BackendTransport: Send + Sync {
    async fn call(&self, request: BackendRequest) -> Result<BackendResponse, TransportError>;
}

/// How a backend status is treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Recorded as a failure, retried within the attempt budget.
    Retryable,
    /// Recorded as a failure, surfaced immediately.
    Fatal,
}

/// Classify a backend status. `None` means the response passes through as a
/// backend success (client errors included: a 4xx says nothing about backend
/// health and must not trip the breaker).
pub fn classify_status(status: u16, retryable_statuses: &[u16]) -> Option<FailureKind> {
    if retryable_statuses.contains(&status) {
        Some(FailureKind::Retryable)
    } else if status >= 500 {
        Some(FailureKind::Fatal)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identity;

    #[test]
    fn url_composition_appends_sorted_query() {
        let mut route = RouteConfig::for_tests("http://broker.local/");
        route.timeout_seconds = 7;
        let request = GatewayRequest::new("GET", "/entities", Identity::ApiKey("k".into()))
            .with_query("type", "Sensor")
            .with_query("limit", "10");

        let backend = BackendRequest::from_parts(&route, &request);
        assert_eq!(backend.url, "http://broker.local/entities?limit=10&type=Sensor");
        assert_eq!(backend.timeout, Duration::from_secs(7));
    }

    #[test]
    fn classification_follows_configured_set() {
        let retryable = vec![500, 502, 503, 504];
        assert_eq!(classify_status(200, &retryable), None);
        assert_eq!(classify_status(404, &retryable), None);
        assert_eq!(classify_status(503, &retryable), Some(FailureKind::Retryable));
        // A 5xx outside the retryable set fails fast but is still a failure.
        assert_eq!(classify_status(501, &retryable), Some(FailureKind::Fatal));
    }

    #[test]
    fn content_type_defaults_to_octet_stream() {
        let mut resp = BackendResponse {
            status: 200,
            headers: HashMap::new(),
            body: Vec::new(),
        };
        assert_eq!(resp.content_type(), "application/octet-stream");
        resp.headers
            .insert("Content-Type".to_string(), "application/ld+json".to_string());
        assert_eq!(resp.content_type(), "application/ld+json");
    }
}
