//! Cache error types.
//!
//! These never cross the dispatch boundary: the response cache absorbs them
//! into tri-state lookups and best-effort writes.

use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to reach the cache backend.
    #[error("cache connection error: {0}")]
    ConnectionError(String),

    /// Failed to serialize or deserialize a cache entry.
    #[error("cache serialization error: {0}")]
    SerializationError(String),

    /// Failed to compress or decompress a payload.
    #[error("cache compression error: {0}")]
    CompressionError(String),

    /// Generic backend error.
    #[error("cache backend error: {0}")]
    BackendError(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
