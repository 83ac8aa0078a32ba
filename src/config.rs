//! # Configuration Management
//!
//! Typed configuration for the whole data plane, with eager validation: an
//! impossible rate-limit rule, a zero threshold or an invalid route regex is
//! a load-time error, never a runtime surprise.
//!
//! Loading layers a TOML file under `GATEWAY__`-prefixed environment
//! overrides (e.g. `GATEWAY__CACHE__ENABLED=false`).

use crate::cache::CacheSettings;
use crate::error::{GatewayError, Result};
use crate::limiter::RateLimitSettings;
use crate::resilience::CircuitBreakerSettings;
use crate::routing::{RouteConfig, RouteMatcher};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_retryable_statuses() -> Vec<u16> {
    vec![500, 502, 503, 504]
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub circuit_breakers: CircuitBreakerSettings,
    #[serde(default = "CacheSettings::default")]
    pub cache: CacheSettings,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    /// Backend statuses treated as retryable failures.
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitSettings::default(),
            circuit_breakers: CircuitBreakerSettings::default(),
            cache: CacheSettings::default(),
            routes: Vec::new(),
            retryable_statuses: default_retryable_statuses(),
        }
    }
}

impl GatewayConfig {
    /// Load from an optional TOML file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("GATEWAY")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: GatewayConfig = builder
            .build()
            .map_err(|e| GatewayError::Configuration(e.to_string()))?
            .try_deserialize()
            .map_err(|e| GatewayError::Configuration(e.to_string()))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject any configuration that could fail at runtime.
    pub fn validate(&self) -> Result<()> {
        self.rate_limit
            .validate()
            .map_err(GatewayError::Configuration)?;
        self.circuit_breakers
            .validate()
            .map_err(GatewayError::Configuration)?;
        for route in &self.routes {
            route.validate().map_err(GatewayError::Configuration)?;
        }
        // Compiling the table exercises every regex route.
        RouteMatcher::new(self.routes.clone()).map_err(GatewayError::Configuration)?;
        if self.cache.namespace.is_empty() {
            return Err(GatewayError::Configuration(
                "cache namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
