//! # Injectable Time Source
//!
//! All algorithmic time in the crate (bucket refill, breaker recovery windows,
//! backoff schedules) flows through the [`Clock`] trait so that tests can
//! advance time without sleeping. Only the dispatcher's actual backoff sleep
//! uses wall-clock time.

use parking_lot::Mutex;
use std::fmt;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Monotonic time source.
///
/// `now()` returns the elapsed time since an arbitrary fixed epoch. Values are
/// only ever compared or subtracted, never interpreted as wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Duration;
}

/// Production clock backed by a process-lifetime [`Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

fn process_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        process_epoch().elapsed()
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, to: Duration) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}
