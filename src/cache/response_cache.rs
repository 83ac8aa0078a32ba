//! Response cache with tri-state lookups and single-flight fetches.
//!
//! Storage failures never propagate: a failing backend turns lookups into
//! `Unavailable` and writes into logged no-ops, so caching can only ever make
//! a request cheaper, never break it.
//!
//! Stampede protection: the check for an existing in-flight fetch and the
//! creation of a new one happen atomically through the map's entry API, so at
//! most one origin fetch runs per key. The fetch itself runs in a spawned
//! task; a caller that disconnects mid-fetch does not cancel it for the
//! other waiters.

use crate::cache::entry::CacheEntry;
use crate::cache::traits::KeyValueStore;
use crate::clock::Clock;
use crate::error::GatewayError;
use crate::types::CacheStatus;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::provider::StoreProvider;

/// Cache-wide tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// When false the cache runs on the NoOp store: every lookup misses and
    /// every write is dropped.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Constant prefix for every generated key.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Payloads below this size are never compressed.
    #[serde(default = "default_min_compress_size")]
    pub min_compress_size: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_namespace() -> String {
    "gwcache:v1".to_string()
}

fn default_min_compress_size() -> usize {
    1024
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            namespace: default_namespace(),
            min_compress_size: default_min_compress_size(),
        }
    }
}

/// Outcome of a cache read. `Unavailable` is a degraded miss: the store
/// could not answer, and the caller falls through to the backend.
#[derive(Debug)]
pub enum CacheLookup {
    Hit(CacheEntry),
    Miss,
    Unavailable,
}

/// The value shared between a fetch and its waiters, and the shape restored
/// from a cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

type FetchResult = Result<FetchedResponse, GatewayError>;

struct Inner<S> {
    store: S,
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
    in_flight: DashMap<String, broadcast::Sender<FetchResult>>,
}

impl<S: KeyValueStore> Inner<S> {
    async fn store_entry(&self, key: &str, resp: &FetchedResponse, ttl: Duration, tags: &[String]) {
        let entry = CacheEntry::build(
            key.to_string(),
            resp.body.clone(),
            resp.content_type.clone(),
            self.clock.now(),
            ttl,
            tags.iter().cloned().collect(),
            self.settings.min_compress_size,
        );
        match serde_json::to_vec(&entry) {
            Ok(bytes) => {
                if let Err(e) = self.store.set(key, &bytes, ttl).await {
                    warn!(key = %key, error = %e, "cache store failed, continuing uncached");
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache entry serialization failed");
            }
        }
    }
}

/// The response cache. Cheap to clone; clones share state.
pub struct ResponseCache<S: KeyValueStore = StoreProvider> {
    inner: Arc<Inner<S>>,
}

impl<S: KeyValueStore> Clone for ResponseCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: KeyValueStore + 'static> ResponseCache<S> {
    pub fn new(store: S, settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                settings,
                clock,
                in_flight: DashMap::new(),
            }),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    /// Read one entry. Expired or undecodable entries are misses; store
    /// failures are `Unavailable`.
    pub async fn get(&self, key: &str) -> CacheLookup {
        match self.inner.store.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<CacheEntry>(&bytes) {
                Ok(entry) if entry.is_fresh(self.inner.clock.now()) => CacheLookup::Hit(entry),
                Ok(_) => {
                    if let Err(e) = self.inner.store.delete(key).await {
                        warn!(key = %key, error = %e, "failed to drop expired cache entry");
                    }
                    CacheLookup::Miss
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "undecodable cache entry, treating as miss");
                    CacheLookup::Miss
                }
            },
            Ok(None) => CacheLookup::Miss,
            Err(e) => {
                warn!(key = %key, error = %e, "cache backend unavailable, passing through");
                CacheLookup::Unavailable
            }
        }
    }

    /// Return a fresh cached response, or fetch it exactly once.
    ///
    /// Concurrent callers for the same missing key share a single origin
    /// fetch: the first caller becomes the leader, everyone else awaits the
    /// shared result. A failed fetch is propagated to every waiter and
    /// caches nothing. Only 200 responses are stored.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        tags: &[String],
        fetch_fn: F,
    ) -> Result<(FetchedResponse, CacheStatus), GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let mut fetch_fn = Some(fetch_fn);
        loop {
            match self.get(key).await {
                CacheLookup::Hit(entry) => match entry.body() {
                    Ok(body) => {
                        debug!(key = %key, "cache hit");
                        return Ok((
                            FetchedResponse {
                                status: 200,
                                content_type: entry.content_type,
                                body,
                            },
                            CacheStatus::Hit,
                        ));
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "corrupt cached payload, refetching");
                        if let Err(e) = self.inner.store.delete(key).await {
                            warn!(key = %key, error = %e, "failed to drop corrupt cache entry");
                        }
                    }
                },
                CacheLookup::Miss | CacheLookup::Unavailable => {}
            }

            // Atomic check-then-create: at most one in-flight fetch per key.
            enum Role {
                Leader(broadcast::Sender<FetchResult>, broadcast::Receiver<FetchResult>),
                Waiter(broadcast::Receiver<FetchResult>),
            }

            let role = match self.inner.in_flight.entry(key.to_string()) {
                Entry::Occupied(occupied) => Role::Waiter(occupied.get().subscribe()),
                Entry::Vacant(vacant) => {
                    let (tx, rx) = broadcast::channel(1);
                    vacant.insert(tx.clone());
                    Role::Leader(tx, rx)
                }
            };

            match role {
                Role::Leader(tx, mut rx) => {
                    let fetch_fn = match fetch_fn.take() {
                        Some(f) => f,
                        None => {
                            // A completed leader always returns; reaching here
                            // twice would mean the fetch closure was consumed.
                            self.inner.in_flight.remove(key);
                            return Err(GatewayError::Internal(
                                "origin fetch closure already consumed".to_string(),
                            ));
                        }
                    };
                    let fut = fetch_fn();
                    let inner = self.inner.clone();
                    let owned_key = key.to_string();
                    let tags = tags.to_vec();
                    // Detached so a cancelled leader does not cancel the
                    // fetch for remaining waiters. Ordering matters: store,
                    // then unregister, then notify, so every subscribed
                    // waiter observes either the broadcast or the stored
                    // entry.
                    tokio::spawn(async move {
                        let result = fut.await;
                        if let Ok(resp) = &result {
                            if resp.status == 200 {
                                inner.store_entry(&owned_key, resp, ttl, &tags).await;
                            }
                        }
                        inner.in_flight.remove(&owned_key);
                        let _ = tx.send(result);
                    });

                    return match rx.recv().await {
                        Ok(Ok(resp)) => Ok((resp, CacheStatus::Miss)),
                        Ok(Err(e)) => Err(e),
                        Err(_) => Err(GatewayError::Internal(
                            "origin fetch ended without a result".to_string(),
                        )),
                    };
                }
                Role::Waiter(mut rx) => match rx.recv().await {
                    Ok(Ok(resp)) => {
                        debug!(key = %key, "served from shared in-flight fetch");
                        return Ok((resp, CacheStatus::Miss));
                    }
                    Ok(Err(e)) => return Err(e),
                    // The fetch resolved between our subscribe and its send.
                    // Loop: the entry is now cached (or we become the leader).
                    Err(_) => continue,
                },
            }
        }
    }

    /// Remove every key matching the glob pattern. Best effort; returns the
    /// number of keys removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        let keys = match self.inner.store.scan(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "cache scan failed, skipping invalidation");
                return 0;
            }
        };
        let mut removed = 0;
        for key in keys {
            match self.inner.store.delete(&key).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %key, error = %e, "cache delete failed"),
            }
        }
        debug!(pattern = %pattern, removed = removed, "pattern invalidation complete");
        removed
    }

    /// Remove every entry tagged with `tag`. Best effort.
    pub async fn invalidate_tag(&self, tag: &str) -> u64 {
        let pattern = format!("{}:*", self.inner.settings.namespace);
        let keys = match self.inner.store.scan(&pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(tag = %tag, error = %e, "cache scan failed, skipping invalidation");
                return 0;
            }
        };
        let mut removed = 0;
        for key in keys {
            let tagged = match self.inner.store.get(&key).await {
                Ok(Some(bytes)) => serde_json::from_slice::<CacheEntry>(&bytes)
                    .map(|entry| entry.tags.contains(tag))
                    .unwrap_or(false),
                _ => false,
            };
            if tagged {
                match self.inner.store.delete(&key).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(key = %key, error = %e, "cache delete failed"),
                }
            }
        }
        debug!(tag = %tag, removed = removed, "tag invalidation complete");
        removed
    }
}
