//! Read-only call metrics per circuit breaker.

use crate::resilience::circuit_breaker::CircuitState;
use serde::{Deserialize, Serialize};

/// Snapshot of one breaker's counters, for monitoring and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub backend: String,
    pub current_state: CircuitState,
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u32,
    pub failure_rate: f64,
}

impl CircuitBreakerMetrics {
    pub fn is_healthy(&self) -> bool {
        self.current_state == CircuitState::Closed
            && (self.total_calls < 10 || self.failure_rate < 0.1)
    }
}
