//! Key-value store trait definition.
//!
//! Backs the response cache. Implementations may be in-process or networked;
//! the cache layer treats every error as a miss or a no-op.

use super::errors::CacheResult;
use std::time::Duration;

/// Trait defining key-value store operations.
///
/// Implemented by concrete store providers (Memory, NoOp). All operations are
/// async and return `CacheResult` for error handling.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key. `Ok(Some(bytes))` on hit, `Ok(None)` on miss.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = CacheResult<Option<Vec<u8>>>> + Send;

    /// Set a value with a TTL.
    fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Delete a specific key.
    fn delete(&self, key: &str) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Keys matching a glob pattern (`*` and `?` wildcards).
    fn scan(
        &self,
        pattern: &str,
    ) -> impl std::future::Future<Output = CacheResult<Vec<String>>> + Send;

    /// Whether the store backend is reachable.
    fn health_check(&self) -> impl std::future::Future<Output = CacheResult<bool>> + Send;

    /// Name of the store provider.
    fn provider_name(&self) -> &'static str;
}
