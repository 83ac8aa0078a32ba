//! # Admission Control Module
//!
//! Token-bucket rate limiting keyed by caller identity (API key, or source IP
//! for anonymous callers), with optional per-route/method/path overrides.
//!
//! Buckets refill lazily at access time; there are no background timers and
//! no shared quota between keys.

pub mod config;
pub mod token_bucket;

pub use config::{RateLimitOverride, RateLimitRule, RateLimitSettings};
pub use token_bucket::{RateLimitDecision, TokenBucketLimiter};
