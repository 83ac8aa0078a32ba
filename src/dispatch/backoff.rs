//! Exponential backoff as data.
//!
//! The schedule is a pure function of the retry policy and the attempt
//! number, so it is testable without any time passing. The dispatcher
//! performs the actual sleeps.

use crate::routing::RetryPolicy;
use std::time::Duration;

/// Kept small so the doubling below cannot overflow; delays are capped by
/// `max_delay` long before this matters.
const MAX_EXPONENT: u32 = 32;

/// Delay to sleep after a failed attempt, 1-based:
/// `min(base_delay * 2^(attempt-1), max_delay)`.
pub fn delay_for_attempt(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
    let scaled = policy.base_delay().as_secs_f64() * 2f64.powi(exponent as i32);
    Duration::from_secs_f64(scaled.min(policy.max_delay().as_secs_f64()))
}

/// The full backoff sequence for a policy, one entry per failed attempt that
/// leaves budget for another try.
pub fn schedule(policy: &RetryPolicy) -> Vec<Duration> {
    (1..policy.max_attempts)
        .map(|attempt| delay_for_attempt(policy, attempt))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32, base_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: base_ms,
            max_delay_ms: max_ms,
        }
    }

    #[test]
    fn doubles_until_the_cap() {
        let p = policy(6, 100, 1_000);
        assert_eq!(delay_for_attempt(&p, 1), Duration::from_millis(100));
        assert_eq!(delay_for_attempt(&p, 2), Duration::from_millis(200));
        assert_eq!(delay_for_attempt(&p, 3), Duration::from_millis(400));
        assert_eq!(delay_for_attempt(&p, 4), Duration::from_millis(800));
        assert_eq!(delay_for_attempt(&p, 5), Duration::from_millis(1_000));
        assert_eq!(delay_for_attempt(&p, 6), Duration::from_millis(1_000));
    }

    #[test]
    fn schedule_has_one_slot_per_retry() {
        let p = policy(4, 50, 10_000);
        assert_eq!(
            schedule(&p),
            vec![
                Duration::from_millis(50),
                Duration::from_millis(100),
                Duration::from_millis(200),
            ]
        );
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let p = policy(3, 100, 30_000);
        assert_eq!(delay_for_attempt(&p, u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn single_attempt_policy_never_sleeps() {
        let p = policy(1, 100, 1_000);
        assert!(schedule(&p).is_empty());
    }
}
