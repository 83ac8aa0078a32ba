//! Route configuration types. Immutable once loaded; the dispatcher only ever
//! borrows them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How `path_pattern` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathType {
    Exact,
    Prefix,
    Regex,
}

/// A request dimension that participates in cache key computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VaryFactor {
    /// A single query parameter by name.
    Query { name: String },
    /// A single request header by (case-insensitive) name.
    Header { name: String },
    /// The request body, as a truncated content hash.
    Body,
}

/// Per-route response caching behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
    /// Ordered vary-by factors. When no `query` factor is present, all query
    /// parameters participate (sorted) by default.
    #[serde(default)]
    pub vary_by: Vec<VaryFactor>,
    /// Methods eligible for cache lookup/store.
    #[serde(default = "default_cacheable_methods")]
    pub cacheable_methods: Vec<String>,
    /// Key globs invalidated when a write method succeeds on this route.
    #[serde(default)]
    pub invalidate_patterns: Vec<String>,
    /// Tags attached to entries stored for this route.
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_cacheable_methods() -> Vec<String> {
    vec!["GET".to_string(), "HEAD".to_string()]
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_seconds: default_cache_ttl(),
            vary_by: Vec::new(),
            cacheable_methods: default_cacheable_methods(),
            invalidate_patterns: Vec::new(),
            tags: Vec::new(),
        }
    }
}

impl CachePolicy {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn method_is_cacheable(&self, method: &str) -> bool {
        self.cacheable_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// Bounded retry with exponential backoff for backend calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// One proxied route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub name: String,
    pub path_pattern: String,
    pub path_type: PathType,
    /// Backend identifier; also the circuit breaker key.
    pub backend_url: String,
    /// Allowed methods. Empty means all methods.
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub cache_policy: CachePolicy,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    /// Per-attempt backend call timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

impl RouteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("route name must not be empty".to_string());
        }
        if self.backend_url.is_empty() {
            return Err(format!("route {}: backend_url must not be empty", self.name));
        }
        if self.path_pattern.is_empty() {
            return Err(format!("route {}: path_pattern must not be empty", self.name));
        }
        if self.retry_policy.max_attempts == 0 {
            return Err(format!("route {}: max_attempts must be at least 1", self.name));
        }
        if self.cache_policy.enabled && self.cache_policy.ttl_seconds == 0 {
            return Err(format!("route {}: cache ttl must be positive", self.name));
        }
        Ok(())
    }

    /// Minimal route for unit tests.
    #[doc(hidden)]
    pub fn for_tests(backend_url: &str) -> Self {
        Self {
            name: "test".to_string(),
            path_pattern: "/".to_string(),
            path_type: PathType::Prefix,
            backend_url: backend_url.to_string(),
            methods: Vec::new(),
            cache_policy: CachePolicy::default(),
            retry_policy: RetryPolicy::default(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}
