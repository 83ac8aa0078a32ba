//! # Request/Response Surface
//!
//! Transport-neutral request and response types. The excluded HTTP server
//! layer constructs a [`GatewayRequest`] (including the already-resolved
//! caller [`Identity`]) and maps [`ProxiedResponse`] / `GatewayError` back to
//! wire framing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Caller identity, resolved by the external auth layer before dispatch.
///
/// The data plane treats this as an opaque rate-limit key; it never inspects
/// or validates credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    /// Authenticated caller, keyed by API key id (or equivalent principal).
    ApiKey(String),
    /// Unauthenticated caller, keyed by source IP.
    AnonymousIp(String),
}

impl Identity {
    /// Opaque admission-control key for this caller.
    pub fn rate_limit_key(&self) -> &str {
        match self {
            Identity::ApiKey(key) => key,
            Identity::AnonymousIp(ip) => ip,
        }
    }
}

/// An incoming request as seen by the dispatcher.
///
/// Header names are lowercased at construction so lookups are
/// case-insensitive. Query parameters are kept sorted so cache-key generation
/// sees a canonical order.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub identity: Identity,
}

impl GatewayRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>, identity: Identity) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            query: BTreeMap::new(),
            headers: HashMap::new(),
            body: Vec::new(),
            identity,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Where the response body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    /// Served from the response cache.
    Hit,
    /// Fetched from the backend (and stored, if cacheable).
    Miss,
    /// Caching did not apply to this request.
    Bypass,
}

/// Terminal successful response returned by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxiedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub cache_status: CacheStatus,
}
