//! Per-backend circuit breaker registry.
//!
//! Breakers are created lazily on first use, with per-backend configuration
//! overrides falling back to the default. The map itself is append-only for
//! the process lifetime.

use crate::clock::Clock;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::config::CircuitBreakerSettings;
use crate::resilience::metrics::CircuitBreakerMetrics;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct CircuitBreakerManager {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    settings: CircuitBreakerSettings,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerManager {
    pub fn new(settings: CircuitBreakerSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            settings,
            clock,
        }
    }

    /// Breaker for `backend`, created on first access.
    pub fn breaker_for(&self, backend: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(backend) {
            return existing.clone();
        }
        self.breakers
            .entry(backend.to_string())
            .or_insert_with(|| {
                debug!(backend = %backend, "creating circuit breaker");
                Arc::new(CircuitBreaker::new(
                    backend.to_string(),
                    self.settings.config_for_backend(backend),
                    self.clock.clone(),
                ))
            })
            .clone()
    }

    /// Metrics snapshot for every known backend.
    pub fn metrics(&self) -> Vec<CircuitBreakerMetrics> {
        self.breakers
            .iter()
            .map(|entry| entry.value().metrics())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::resilience::config::CircuitBreakerConfig;
    use crate::resilience::CircuitState;

    #[test]
    fn same_backend_gets_same_breaker() {
        let manager = CircuitBreakerManager::new(
            CircuitBreakerSettings::default(),
            Arc::new(ManualClock::new()),
        );
        let a = manager.breaker_for("broker");
        let b = manager.breaker_for("broker");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn backend_override_applies() {
        let mut settings = CircuitBreakerSettings::default();
        settings.backends.insert(
            "fragile".to_string(),
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..CircuitBreakerConfig::default()
            },
        );
        let manager = CircuitBreakerManager::new(settings, Arc::new(ManualClock::new()));

        let fragile = manager.breaker_for("fragile");
        fragile.allow_request().unwrap().record_failure();
        assert_eq!(fragile.state(), CircuitState::Open);

        let sturdy = manager.breaker_for("sturdy");
        sturdy.allow_request().unwrap().record_failure();
        assert_eq!(sturdy.state(), CircuitState::Closed);
    }

    #[test]
    fn metrics_cover_all_backends() {
        let manager = CircuitBreakerManager::new(
            CircuitBreakerSettings::default(),
            Arc::new(ManualClock::new()),
        );
        manager.breaker_for("a").allow_request().unwrap().record_success();
        manager.breaker_for("b").allow_request().unwrap().record_failure();

        let metrics = manager.metrics();
        assert_eq!(metrics.len(), 2);
        assert!(metrics.iter().all(|m| m.total_calls == 1));
    }
}
