//! Zstandard glue for entry payloads
//!
//! Levels follow the classic 0-9 scale: 0 stores bytes as-is, 1-9 map onto
//! the same zstd levels.

use crate::error::{Result, WrapError};
use std::fmt;
use std::io::Read;

/// Compression level of one entry, validated to `0..=9`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// Store uncompressed
    pub const NONE: Self = Self(0);
    /// Lightly compress, quickly
    pub const FAST: Self = Self(1);
    /// Heavily compress, slowly
    pub const SLOW: Self = Self(9);
    pub const LOW: Self = Self::FAST;
    pub const HIGH: Self = Self::SLOW;
    pub const DEFAULT: Self = Self(6);

    /// Highest accepted level
    pub const MAX: u8 = 9;

    pub fn new(level: u8) -> Result<Self> {
        if level > Self::MAX {
            return Err(WrapError::InvalidCompression(level));
        }
        Ok(Self(level))
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<u8> for CompressionLevel {
    type Error = WrapError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {}", self.0)
    }
}

/// Upper bound on the compressed size of `source_size` input bytes
pub fn bounded_size(source_size: usize) -> usize {
    zstd::zstd_safe::compress_bound(source_size)
}

/// Compress `source` at `level` into a scratch buffer sized by [`bounded_size`]
pub fn compress(source: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    if level.is_none() {
        return Ok(source.to_vec());
    }

    let mut dest = vec![0u8; bounded_size(source.len())];
    let written = zstd::bulk::compress_to_buffer(source, &mut dest[..], level.as_u8() as i32)
        .map_err(|e| WrapError::CompressionFailed(format!("Zstd compression failed: {}", e)))?;
    dest.truncate(written);
    Ok(dest)
}

/// Decompress `source`, which must expand to exactly `expected_size` bytes
pub fn decompress(source: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let data = zstd::bulk::decompress(source, expected_size)
        .map_err(|e| WrapError::DecompressionFailed(format!("Zstd decompression failed: {}", e)))?;

    if data.len() != expected_size {
        return Err(WrapError::DecompressionFailed(format!(
            "Size mismatch: expected {} bytes, got {}",
            expected_size,
            data.len()
        )));
    }
    Ok(data)
}

/// Compress with fallback to stored bytes when compression does not help.
///
/// Returns the payload and the level actually recorded for it.
pub fn encode(data: &[u8], level: CompressionLevel) -> Result<(Vec<u8>, CompressionLevel)> {
    if level.is_none() {
        return Ok((data.to_vec(), CompressionLevel::NONE));
    }

    let compressed = compress(data, level)?;
    if compressed.len() < data.len() {
        Ok((compressed, level))
    } else {
        Ok((data.to_vec(), CompressionLevel::NONE))
    }
}

/// Inverse of [`encode`]
pub fn decode(payload: Vec<u8>, level: CompressionLevel, expected_size: usize) -> Result<Vec<u8>> {
    if level.is_none() {
        if payload.len() != expected_size {
            return Err(WrapError::InvalidFormat(format!(
                "Stored entry is {} bytes, header says {}",
                payload.len(),
                expected_size
            )));
        }
        return Ok(payload);
    }
    decompress(&payload, expected_size)
}

/// Streaming decoder over a compressed payload
pub fn decoder<R: Read>(reader: R) -> Result<zstd::stream::read::Decoder<'static, std::io::BufReader<R>>> {
    zstd::stream::read::Decoder::new(reader)
        .map_err(|e| WrapError::DecompressionFailed(format!("Zstd decoder init failed: {}", e)))
}
