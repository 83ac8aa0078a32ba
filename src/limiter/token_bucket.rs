//! Token-bucket limiter with lazy refill.
//!
//! Each key owns an independent bucket stored in a concurrent map. The
//! refill-then-consume sequence runs under a per-key mutex so two concurrent
//! requests for the same key can never both observe pre-refill token counts.

use crate::clock::Clock;
use crate::limiter::config::{RateLimitRule, RateLimitSettings};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// How long the caller should wait before the deficit refills. Zero when
    /// allowed.
    pub retry_after: Duration,
}

impl RateLimitDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: Duration::ZERO,
        }
    }

    fn deny(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after,
        }
    }
}

/// Per-key bucket state. `0 <= tokens <= capacity` holds at every step.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Duration,
}

impl TokenBucket {
    /// Buckets start full so a fresh key can burst immediately.
    fn new(rule: &RateLimitRule, now: Duration) -> Self {
        Self {
            tokens: rule.capacity(),
            capacity: rule.capacity(),
            refill_rate: rule.refill_rate(),
            last_refill: now,
        }
    }

    fn refill_and_consume(&mut self, cost: f64, now: Duration) -> RateLimitDecision {
        let elapsed = now.saturating_sub(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= cost {
            self.tokens -= cost;
            RateLimitDecision::allow()
        } else {
            let deficit = cost - self.tokens;
            RateLimitDecision::deny(Duration::from_secs_f64(deficit / self.refill_rate))
        }
    }
}

/// Per-identity token-bucket limiter.
///
/// Buckets are created lazily on first access and are fully independent; no
/// key shares quota with another. Configuration resolution (per-route and
/// per-method overrides) happens on every call so the same identity can carry
/// different budgets on different routes.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    buckets: DashMap<String, Mutex<TokenBucket>>,
    settings: RateLimitSettings,
    clock: Arc<dyn Clock>,
}

impl TokenBucketLimiter {
    pub fn new(settings: RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            settings,
            clock,
        }
    }

    /// Admit or deny one request for `key`.
    ///
    /// `route`, `method` and `path` only steer override resolution; the bucket
    /// itself is keyed solely by `key` (callers compose identity and route
    /// into the key when they want per-route buckets).
    pub fn admit(&self, key: &str, route: Option<&str>, method: &str, path: &str) -> RateLimitDecision {
        let rule = self.settings.resolve(route, method, path);
        let now = self.clock.now();

        let bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(TokenBucket::new(rule, now)));

        let decision = bucket.lock().refill_and_consume(rule.cost, now);

        if decision.allowed {
            trace!(key = %key, "request admitted");
        } else {
            debug!(
                key = %key,
                retry_after_secs = decision.retry_after.as_secs_f64(),
                "request denied by rate limiter"
            );
        }
        decision
    }

    /// Drop buckets idle longer than `grace`. Purely a memory-bound measure;
    /// an evicted key's next request simply recreates a full bucket.
    pub fn evict_idle(&self, grace: Duration) {
        let cutoff = self.clock.now().saturating_sub(grace);
        self.buckets
            .retain(|_, bucket| bucket.lock().last_refill >= cutoff);
    }

    /// Number of live buckets, for host-side monitoring.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
