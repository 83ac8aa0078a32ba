//! In-process key-value store.
//!
//! A DashMap of byte values with per-entry expiry. Expired entries are
//! indistinguishable from absent ones and are removed lazily on access; no
//! background sweeper runs.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::KeyValueStore;
use crate::clock::Clock;
use dashmap::DashMap;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Duration,
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Translate a glob (`*`, `?`) into an anchored regex.
fn glob_to_regex(pattern: &str) -> CacheResult<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            other => translated.push_str(regex::escape(&other.to_string()).as_str()),
        }
    }
    translated.push('$');
    Regex::new(&translated).map_err(|e| CacheError::BackendError(format!("bad scan pattern: {e}")))
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.bytes.clone()));
            }
        } else {
            return Ok(None);
        }
        // Expired: drop it lazily.
        self.entries.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(
            key.to_string(),
            StoredValue {
                bytes: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let regex = glob_to_regex(pattern)?;
        let now = self.clock.now();
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.value().expires_at > now && regex.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
