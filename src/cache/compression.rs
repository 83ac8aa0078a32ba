//! Gzip payload compression.
//!
//! Compression is only worth the CPU and the round-trip decompress when it
//! meaningfully shrinks the payload: the compressed form is kept only when it
//! lands below [`KEEP_RATIO`] of the original size.

use crate::cache::errors::{CacheError, CacheResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compressed form is kept only when `compressed_size < KEEP_RATIO * original`.
pub const KEEP_RATIO: f64 = 0.9;

/// Compress `payload` when it is at least `min_size` bytes and compression
/// shrinks it by 10% or more. Returns the stored form and whether it is
/// compressed.
pub fn maybe_compress(payload: Vec<u8>, min_size: usize) -> (Vec<u8>, bool) {
    if payload.len() < min_size {
        return (payload, false);
    }
    match compress(&payload) {
        Ok(compressed) if (compressed.len() as f64) < KEEP_RATIO * payload.len() as f64 => {
            (compressed, true)
        }
        Ok(_) => (payload, false),
        Err(e) => {
            tracing::warn!(error = %e, "compression failed, storing uncompressed");
            (payload, false)
        }
    }
}

pub fn compress(payload: &[u8]) -> CacheResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(payload)
        .map_err(|e| CacheError::CompressionError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CacheError::CompressionError(e.to_string()))
}

pub fn decompress(data: &[u8]) -> CacheResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CacheError::CompressionError(e.to_string()))?;
    Ok(out)
}
