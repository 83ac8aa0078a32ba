//! Cache entry envelope.
//!
//! Entries travel through the key-value store as a JSON envelope. Timestamps
//! are monotonic milliseconds from the injected clock, so freshness checks
//! are deterministic under test and never go backwards under clock skew.
//! Envelopes are process-local by construction; a networked store shared
//! between processes would need wall-clock timestamps instead.

use crate::cache::compression;
use crate::cache::errors::CacheResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// Stored payload; the compressed form iff `compressed` is true.
    pub payload: Vec<u8>,
    pub content_type: String,
    pub compressed: bool,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl CacheEntry {
    /// Build an entry, compressing the payload when it pays off.
    ///
    /// Compression is attempted at or above `min_compress_size` bytes and the
    /// compressed form is kept only when it shrinks the payload below 90% of
    /// the original size.
    pub fn build(
        key: String,
        payload: Vec<u8>,
        content_type: String,
        now: Duration,
        ttl: Duration,
        tags: BTreeSet<String>,
        min_compress_size: usize,
    ) -> Self {
        let (payload, compressed) = compression::maybe_compress(payload, min_compress_size);
        let created_at_ms = now.as_millis() as u64;
        Self {
            key,
            payload,
            content_type,
            compressed,
            created_at_ms,
            expires_at_ms: created_at_ms + ttl.as_millis() as u64,
            tags,
        }
    }

    /// An entry past its expiry is treated identically to absence.
    pub fn is_fresh(&self, now: Duration) -> bool {
        (now.as_millis() as u64) < self.expires_at_ms
    }

    /// The original payload, decompressed transparently.
    pub fn body(&self) -> CacheResult<Vec<u8>> {
        if self.compressed {
            compression::decompress(&self.payload)
        } else {
            Ok(self.payload.clone())
        }
    }
}
