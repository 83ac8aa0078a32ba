//! Always-miss, always-succeed store.
//!
//! Used when caching is disabled: every lookup misses, every write is
//! accepted and dropped, so the surrounding code needs no special casing.

use crate::cache::errors::CacheResult;
use crate::cache::traits::KeyValueStore;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStore;

impl NoOpStore {
    pub fn new() -> Self {
        Self
    }
}

impl KeyValueStore for NoOpStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn scan(&self, _pattern: &str) -> CacheResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }
}
