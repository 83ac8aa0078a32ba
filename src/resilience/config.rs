//! Circuit breaker configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Thresholds and timers for one circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in Closed before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds the circuit stays Open before allowing recovery probes.
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_seconds: u64,
    /// Probe successes in HalfOpen required to close the circuit.
    #[serde(default = "default_half_open_required")]
    pub half_open_required: u32,
    /// Simultaneous HalfOpen probes allowed. Probes beyond this bound
    /// fast-fail so a recovering backend is not re-overwhelmed.
    #[serde(default = "default_half_open_max_concurrent")]
    pub half_open_max_concurrent: u32,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> u64 {
    60
}

fn default_half_open_required() -> u32 {
    3
}

fn default_half_open_max_concurrent() -> u32 {
    1
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_seconds: default_recovery_timeout(),
            half_open_required: default_half_open_required(),
            half_open_max_concurrent: default_half_open_max_concurrent(),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_seconds)
    }

    pub fn validate(&self, label: &str) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err(format!("circuit breaker {label}: failure_threshold must be at least 1"));
        }
        if self.half_open_required == 0 {
            return Err(format!("circuit breaker {label}: half_open_required must be at least 1"));
        }
        if self.half_open_max_concurrent == 0 {
            return Err(format!(
                "circuit breaker {label}: half_open_max_concurrent must be at least 1"
            ));
        }
        Ok(())
    }
}

/// Default configuration plus per-backend overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    #[serde(default)]
    pub default: CircuitBreakerConfig,
    /// Specific configurations for named backends.
    #[serde(default)]
    pub backends: HashMap<String, CircuitBreakerConfig>,
}

impl CircuitBreakerSettings {
    /// Configuration for a specific backend, falling back to the default.
    pub fn config_for_backend(&self, backend: &str) -> CircuitBreakerConfig {
        self.backends
            .get(backend)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn validate(&self) -> Result<(), String> {
        self.default.validate("default")?;
        for (name, config) in &self.backends {
            config.validate(name)?;
        }
        Ok(())
    }
}
