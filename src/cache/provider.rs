//! Key-value store provider with enum dispatch.
//!
//! Mirrors the trait surface over a closed set of backends so the hot path
//! pays no vtable cost. Consumers hold a `StoreProvider`; the choice of
//! backend is a construction-time decision.

use crate::cache::errors::CacheResult;
use crate::cache::providers::{MemoryStore, NoOpStore};
use crate::cache::traits::KeyValueStore;
use crate::clock::Clock;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum StoreProvider {
    /// In-process store with per-entry TTL.
    Memory(MemoryStore),
    /// Always-miss fallback when caching is disabled.
    NoOp(NoOpStore),
}

impl StoreProvider {
    pub fn memory(clock: Arc<dyn Clock>) -> Self {
        Self::Memory(MemoryStore::new(clock))
    }

    pub fn noop() -> Self {
        Self::NoOp(NoOpStore::new())
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::NoOp(_))
    }
}

impl KeyValueStore for StoreProvider {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match self {
            Self::Memory(s) => s.get(key).await,
            Self::NoOp(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        match self {
            Self::Memory(s) => s.set(key, value, ttl).await,
            Self::NoOp(s) => s.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        match self {
            Self::Memory(s) => s.delete(key).await,
            Self::NoOp(s) => s.delete(key).await,
        }
    }

    async fn scan(&self, pattern: &str) -> CacheResult<Vec<String>> {
        match self {
            Self::Memory(s) => s.scan(pattern).await,
            Self::NoOp(s) => s.scan(pattern).await,
        }
    }

    async fn health_check(&self) -> CacheResult<bool> {
        match self {
            Self::Memory(s) => s.health_check().await,
            Self::NoOp(s) => s.health_check().await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            Self::Memory(s) => s.provider_name(),
            Self::NoOp(s) => s.provider_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[tokio::test]
    async fn dispatches_to_memory_backend() {
        let provider = StoreProvider::memory(Arc::new(ManualClock::new()));
        assert!(provider.is_enabled());
        assert_eq!(provider.provider_name(), "memory");
        provider.set("k", b"v", Duration::from_secs(5)).await.unwrap();
        assert_eq!(provider.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn noop_backend_reports_disabled() {
        let provider = StoreProvider::noop();
        assert!(!provider.is_enabled());
        provider.set("k", b"v", Duration::from_secs(5)).await.unwrap();
        assert_eq!(provider.get("k").await.unwrap(), None);
    }
}
