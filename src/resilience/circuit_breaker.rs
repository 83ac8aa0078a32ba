//! # Circuit Breaker Implementation
//!
//! Per-backend state machine with linearizable transitions. All state lives
//! under one short-lived mutex: two concurrent failures can never both
//! increment past the threshold without one of them witnessing the Open
//! transition, and HalfOpen admission is a bounded in-flight count rather
//! than an ad hoc check.
//!
//! Admission hands out a [`CallPermit`]. The permit owns the half-open probe
//! slot it claimed: reporting an outcome releases it, and dropping the permit
//! without an outcome (a cancelled request, a panicked caller) releases it
//! too, so an abandoned probe can never wedge the breaker in HalfOpen.

use crate::clock::Clock;
use crate::resilience::config::CircuitBreakerConfig;
use crate::resilience::metrics::CircuitBreakerMetrics;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// `Retry-After` hint for calls fast-failed while a half-open probe is in
/// flight: the probe resolves within one backend timeout, so a short retry
/// is appropriate rather than a full recovery window.
const HALF_OPEN_RETRY_HINT: Duration = Duration::from_secs(1);

/// Circuit breaker states representing the current operational mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through.
    Closed,
    /// Failure mode - all calls fail fast without executing.
    Open,
    /// Testing recovery - limited probes allowed to test backend health.
    HalfOpen,
}

/// Mutable breaker state. `state == Open` implies `opened_at.is_some()`.
#[derive(Debug)]
struct Core {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    /// Probes currently admitted in HalfOpen, bounded by
    /// `half_open_max_concurrent`.
    half_open_in_flight: u32,
    opened_at: Option<Duration>,
    total_calls: u64,
    success_count: u64,
    failure_count: u64,
}

impl Core {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            half_open_successes: 0,
            half_open_in_flight: 0,
            opened_at: None,
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
        }
    }
}

/// An admitted backend call.
///
/// Consume it with [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure). If the permit is dropped
/// without either (the call future was cancelled), any half-open probe slot
/// it holds is released and the call counts toward neither recovery nor
/// reopening.
#[must_use = "dropping the permit without recording an outcome discards the call"]
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    /// Whether this permit claimed one of the bounded HalfOpen probe slots.
    holds_probe_slot: bool,
    outcome_recorded: bool,
}

impl CallPermit<'_> {
    pub fn record_success(mut self) {
        self.outcome_recorded = true;
        self.breaker.on_success(self.holds_probe_slot);
    }

    pub fn record_failure(mut self) {
        self.outcome_recorded = true;
        self.breaker.on_failure(self.holds_probe_slot);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if self.outcome_recorded || !self.holds_probe_slot {
            return;
        }
        let mut core = self.breaker.core.lock();
        // Only HalfOpen tracks in-flight probes; any transition out of
        // HalfOpen already reset or will re-seed the counter.
        if core.state == CircuitState::HalfOpen {
            core.half_open_in_flight = core.half_open_in_flight.saturating_sub(1);
            debug!(
                backend = %self.breaker.backend,
                "half-open probe dropped before completion, slot released"
            );
        }
    }
}

/// Circuit breaker guarding one backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    backend: String,
    config: CircuitBreakerConfig,
    core: Mutex<Core>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(backend: String, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        info!(
            backend = %backend,
            failure_threshold = config.failure_threshold,
            recovery_timeout_seconds = config.recovery_timeout_seconds,
            half_open_required = config.half_open_required,
            "circuit breaker initialized"
        );
        Self {
            backend,
            config,
            core: Mutex::new(Core::new()),
            clock,
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn state(&self) -> CircuitState {
        self.core.lock().state
    }

    /// Check whether a call to the backend may proceed.
    ///
    /// In Open, an elapsed recovery timeout transitions to HalfOpen and
    /// admits the caller as the first probe. In HalfOpen, admission is
    /// granted while fewer than `half_open_max_concurrent` probes are in
    /// flight; excess probes fast-fail with `None`.
    pub fn allow_request(&self) -> Option<CallPermit<'_>> {
        let mut core = self.core.lock();
        match core.state {
            CircuitState::Closed => Some(self.permit(false)),
            CircuitState::Open => {
                let opened_at = match core.opened_at {
                    Some(t) => t,
                    None => {
                        warn!(backend = %self.backend, "circuit open without opened_at, allowing call");
                        return Some(self.permit(false));
                    }
                };
                let elapsed = self.clock.now().saturating_sub(opened_at);
                if elapsed >= self.config.recovery_timeout() {
                    core.state = CircuitState::HalfOpen;
                    core.half_open_successes = 0;
                    core.half_open_in_flight = 1;
                    info!(
                        backend = %self.backend,
                        half_open_required = self.config.half_open_required,
                        "circuit breaker half-open (testing recovery)"
                    );
                    Some(self.permit(true))
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                if core.half_open_in_flight < self.config.half_open_max_concurrent {
                    core.half_open_in_flight += 1;
                    Some(self.permit(true))
                } else {
                    debug!(
                        backend = %self.backend,
                        in_flight = core.half_open_in_flight,
                        "half-open probe budget exhausted, fast-failing"
                    );
                    None
                }
            }
        }
    }

    fn permit(&self, holds_probe_slot: bool) -> CallPermit<'_> {
        CallPermit {
            breaker: self,
            holds_probe_slot,
            outcome_recorded: false,
        }
    }

    /// Record a successful backend call. Only permits that claimed a probe
    /// slot count toward half-open recovery.
    fn on_success(&self, probe: bool) {
        let mut core = self.core.lock();
        core.total_calls += 1;
        core.success_count += 1;

        match core.state {
            CircuitState::Closed => {
                core.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                if probe {
                    core.half_open_in_flight = core.half_open_in_flight.saturating_sub(1);
                    core.half_open_successes += 1;
                    if core.half_open_successes >= self.config.half_open_required {
                        self.transition_to_closed(&mut core);
                    }
                }
            }
            CircuitState::Open => {
                warn!(backend = %self.backend, "success recorded while circuit is open");
            }
        }
    }

    /// Record a failed backend call.
    fn on_failure(&self, probe: bool) {
        let mut core = self.core.lock();
        core.total_calls += 1;
        core.failure_count += 1;

        match core.state {
            CircuitState::Closed => {
                core.consecutive_failures += 1;
                if core.consecutive_failures >= self.config.failure_threshold {
                    self.transition_to_open(&mut core);
                }
            }
            CircuitState::HalfOpen => {
                // Any failure while testing recovery immediately reopens.
                if probe {
                    core.half_open_in_flight = core.half_open_in_flight.saturating_sub(1);
                }
                self.transition_to_open(&mut core);
            }
            CircuitState::Open => {}
        }
    }

    /// `Retry-After` hint for rejected calls: the remaining recovery window
    /// while Open, a short probe interval while HalfOpen.
    pub fn retry_after(&self) -> Duration {
        let core = self.core.lock();
        match (core.state, core.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                let elapsed = self.clock.now().saturating_sub(opened_at);
                self.config.recovery_timeout().saturating_sub(elapsed)
            }
            (CircuitState::HalfOpen, _) => {
                HALF_OPEN_RETRY_HINT.min(self.config.recovery_timeout())
            }
            _ => Duration::ZERO,
        }
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let core = self.core.lock();
        let failure_rate = if core.total_calls > 0 {
            core.failure_count as f64 / core.total_calls as f64
        } else {
            0.0
        };
        CircuitBreakerMetrics {
            backend: self.backend.clone(),
            current_state: core.state,
            total_calls: core.total_calls,
            success_count: core.success_count,
            failure_count: core.failure_count,
            consecutive_failures: core.consecutive_failures,
            failure_rate,
        }
    }

    fn transition_to_closed(&self, core: &mut Core) {
        core.state = CircuitState::Closed;
        core.consecutive_failures = 0;
        core.half_open_successes = 0;
        core.half_open_in_flight = 0;
        core.opened_at = None;
        info!(
            backend = %self.backend,
            total_calls = core.total_calls,
            "circuit breaker closed (recovered)"
        );
    }

    fn transition_to_open(&self, core: &mut Core) {
        core.state = CircuitState::Open;
        core.opened_at = Some(self.clock.now());
        core.half_open_successes = 0;
        error!(
            backend = %self.backend,
            consecutive_failures = core.consecutive_failures,
            failure_threshold = self.config.failure_threshold,
            recovery_timeout_seconds = self.config.recovery_timeout_seconds,
            "circuit breaker opened (failing fast)"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn breaker(
        failure_threshold: u32,
        recovery_secs: u64,
        half_open_required: u32,
        half_open_max_concurrent: u32,
    ) -> (Arc<ManualClock>, CircuitBreaker) {
        let clock = Arc::new(ManualClock::new());
        let config = CircuitBreakerConfig {
            failure_threshold,
            recovery_timeout_seconds: recovery_secs,
            half_open_required,
            half_open_max_concurrent,
        };
        let cb = CircuitBreaker::new("test".to_string(), config, clock.clone());
        (clock, cb)
    }

    fn fail(cb: &CircuitBreaker) {
        cb.allow_request().unwrap().record_failure();
    }

    fn succeed(cb: &CircuitBreaker) {
        cb.allow_request().unwrap().record_success();
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let (_, cb) = breaker(3, 60, 2, 1);
        assert_eq!(cb.state(), CircuitState::Closed);

        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.allow_request().is_none());
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let (_, cb) = breaker(3, 60, 2, 1);
        fail(&cb);
        fail(&cb);
        succeed(&cb);
        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn recovery_timeout_transitions_to_half_open() {
        let (clock, cb) = breaker(1, 60, 2, 1);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.allow_request().is_none());

        clock.advance(Duration::from_secs(59));
        assert!(cb.allow_request().is_none());

        clock.advance(Duration::from_secs(1));
        assert!(cb.allow_request().is_some());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_closes_after_required_successes() {
        let (clock, cb) = breaker(1, 60, 2, 2);
        fail(&cb);
        clock.advance(Duration::from_secs(60));

        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().consecutive_failures, 0);
    }

    #[test]
    fn half_open_failure_reopens_with_fresh_timestamp() {
        let (clock, cb) = breaker(1, 60, 2, 1);
        fail(&cb);
        clock.advance(Duration::from_secs(60));
        let probe = cb.allow_request().unwrap();

        clock.advance(Duration::from_secs(5));
        probe.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        // opened_at was refreshed: the full recovery window applies again.
        assert_eq!(cb.retry_after(), Duration::from_secs(60));
    }

    #[test]
    fn half_open_probe_budget_is_bounded() {
        let (clock, cb) = breaker(1, 60, 3, 2);
        fail(&cb);
        clock.advance(Duration::from_secs(60));

        // First admission transitions and claims one probe slot.
        let first = cb.allow_request().unwrap();
        let _second = cb.allow_request().unwrap();
        // Third concurrent probe exceeds max_concurrent = 2.
        assert!(cb.allow_request().is_none());

        // Completing a probe frees its slot.
        first.record_success();
        assert!(cb.allow_request().is_some());
    }

    #[test]
    fn dropped_probe_releases_its_slot() {
        let (clock, cb) = breaker(1, 60, 1, 1);
        fail(&cb);
        clock.advance(Duration::from_secs(60));

        // The probe's call future is cancelled before an outcome is known.
        let probe = cb.allow_request().unwrap();
        assert!(cb.allow_request().is_none());
        drop(probe);

        // The slot is free again: the next caller probes, and recovery
        // proceeds normally.
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        succeed(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
        // The abandoned call counted toward neither outcome.
        assert_eq!(cb.metrics().total_calls, 2);
    }

    #[test]
    fn recorded_probe_does_not_release_twice() {
        let (clock, cb) = breaker(1, 60, 2, 2);
        fail(&cb);
        clock.advance(Duration::from_secs(60));

        let first = cb.allow_request().unwrap();
        let second = cb.allow_request().unwrap();
        first.record_success();
        second.record_success();

        // Both slots released exactly once each; a third release would have
        // corrupted the count for the next half-open cycle.
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_fast_fail_carries_a_short_retry_hint() {
        let (clock, cb) = breaker(1, 60, 1, 1);
        fail(&cb);
        clock.advance(Duration::from_secs(60));

        let _probe = cb.allow_request().unwrap();
        assert!(cb.allow_request().is_none());
        let hint = cb.retry_after();
        assert!(hint > Duration::ZERO);
        assert!(hint <= Duration::from_secs(1));
    }

    #[test]
    fn retry_after_counts_down_while_open() {
        let (clock, cb) = breaker(1, 60, 1, 1);
        fail(&cb);
        assert_eq!(cb.retry_after(), Duration::from_secs(60));
        clock.advance(Duration::from_secs(45));
        assert_eq!(cb.retry_after(), Duration::from_secs(15));
    }

    #[test]
    fn concurrent_failures_open_exactly_once() {
        let (_, cb) = breaker(100, 60, 1, 1);
        let cb = Arc::new(cb);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cb = cb.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..25 {
                    cb.on_failure(false);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // 100 failures against threshold 100: the breaker is open and opened
        // exactly at the threshold, never past it.
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.metrics().failure_count, 100);
    }
}
