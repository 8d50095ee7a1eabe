//! Raw-DEFLATE compression with inflation-bomb guards.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::write::DeflateEncoder;

use thiserror::Error;

/// Errors from compression/decompression.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// The underlying DEFLATE stream was malformed.
    #[error("malformed DEFLATE stream: {0}")]
    Malformed(String),

    /// Decompression was aborted because the output would exceed
    /// `InflateLimits::max_inflated_bytes`.
    #[error("inflated size exceeds the {max} byte limit")]
    TooLarge {
        /// The configured limit that was hit.
        max: u64,
    },

    /// Decompression was aborted because the output/input ratio exceeded
    /// `InflateLimits::max_inflate_ratio` — a classic "zip bomb" guard.
    #[error("inflate ratio exceeds the configured limit of {max}x")]
    RatioExceeded {
        /// The configured ratio limit that was hit.
        max: u64,
    },
}

/// Limits enforced while inflating untrusted compressed data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InflateLimits {
    /// Hard cap on the decompressed byte count.
    pub max_inflated_bytes: u64,
    /// Hard cap on `inflated / max(compressed, 1)`.
    pub max_inflate_ratio: u64,
}

impl Default for InflateLimits {
    fn default() -> Self {
        Self {
            max_inflated_bytes: 134_217_728,
            max_inflate_ratio: 200,
        }
    }
}

/// Fixed delta-chain-depth constant exposed for pack-aware consumers. This
/// core does not itself resolve deltas, but downstream pack tooling built on
/// top of it needs a shared ceiling to detect runaway chains.
pub const MAX_DELTA_CHAIN_DEPTH: usize = 50;

/// Raw-DEFLATE compress `data` (no zlib header/trailer).
///
/// # Errors
/// Returns an error only if the underlying writer fails, which cannot happen
/// for an in-memory `Vec` sink; kept fallible for API symmetry with
/// `inflate_raw`.
pub fn deflate_raw(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| CompressionError::Malformed(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CompressionError::Malformed(e.to_string()))
}

/// Raw-DEFLATE decompress `data`, enforcing `limits` against decompression
/// bombs. Reads in bounded chunks so the ratio/size checks trigger before an
/// attacker-controlled stream can allocate unbounded memory.
///
/// # Errors
/// Returns [`CompressionError::TooLarge`] or
/// [`CompressionError::RatioExceeded`] if a limit is breached, or
/// [`CompressionError::Malformed`] if the stream itself is invalid DEFLATE.
pub fn inflate_raw(data: &[u8], limits: InflateLimits) -> Result<Vec<u8>, CompressionError> {
    let mut decoder = flate2::read::DeflateDecoder::new(data);
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    let compressed_len = data.len().max(1) as u64;

    loop {
        let n = decoder
            .read(&mut buf)
            .map_err(|e| CompressionError::Malformed(e.to_string()))?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);

        if out.len() as u64 > limits.max_inflated_bytes {
            return Err(CompressionError::TooLarge {
                max: limits.max_inflated_bytes,
            });
        }
        if out.len() as u64 > compressed_len * limits.max_inflate_ratio {
            return Err(CompressionError::RatioExceeded {
                max: limits.max_inflate_ratio,
            });
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(10);
        let compressed = deflate_raw(&data).unwrap();
        let decompressed = inflate_raw(&compressed, InflateLimits::default()).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn rejects_oversized_output() {
        let data = vec![0u8; 1_000_000];
        let compressed = deflate_raw(&data).unwrap();
        let limits = InflateLimits {
            max_inflated_bytes: 1000,
            max_inflate_ratio: 1_000_000,
        };
        let err = inflate_raw(&compressed, limits).unwrap_err();
        assert!(matches!(err, CompressionError::TooLarge { .. }));
    }

    #[test]
    fn rejects_excessive_ratio() {
        let data = vec![0u8; 1_000_000];
        let compressed = deflate_raw(&data).unwrap();
        let limits = InflateLimits {
            max_inflated_bytes: u64::MAX,
            max_inflate_ratio: 10,
        };
        let err = inflate_raw(&compressed, limits).unwrap_err();
        assert!(matches!(err, CompressionError::RatioExceeded { .. }));
    }

    #[test]
    fn empty_input_roundtrips() {
        let compressed = deflate_raw(b"").unwrap();
        let decompressed = inflate_raw(&compressed, InflateLimits::default()).unwrap();
        assert!(decompressed.is_empty());
    }
}
