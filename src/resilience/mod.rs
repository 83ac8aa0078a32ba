//! # Resilience Module
//!
//! Per-backend failure isolation via the classic circuit breaker pattern:
//! Closed (normal operation), Open (failing fast), and HalfOpen (testing
//! recovery with a bounded number of probes).
//!
//! The dispatcher consults [`CircuitBreakerManager`] before every backend
//! attempt; a rejection is a fast-fail that stops the retry loop without
//! touching the backend. Admission is a [`CallPermit`] held for the duration
//! of the attempt, so a cancelled call releases its probe slot on drop.

pub mod circuit_breaker;
pub mod config;
pub mod manager;
pub mod metrics;

pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerSettings};
pub use manager::CircuitBreakerManager;
pub use metrics::CircuitBreakerMetrics;
