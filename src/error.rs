use std::io;
use thiserror::Error;

/// Result type for wrap operations
pub type Result<T> = std::result::Result<T, WrapError>;

/// Unified error type for all wrap operations
#[derive(Debug, Error)]
pub enum WrapError {
    // Lookup errors
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Entry not found in archive: {0}")]
    EntryNotFound(String),

    // Format errors
    #[error("Invalid magic number in archive header")]
    InvalidMagic,

    #[error("Missing .wrap extension: {0}")]
    InvalidExtension(String),

    #[error("Unsupported archive version: {0}")]
    UnsupportedVersion(u16),

    #[error("Invalid archive format: {0}")]
    InvalidFormat(String),

    // Allocation errors
    #[error("Archive capacity exceeded: all {capacity} slots are in use or too small")]
    CapacityExceeded { capacity: u32 },

    #[error("Archive data region too large: {0} bytes (max 4 GiB)")]
    TooLarge(u64),

    #[error("Cannot store an empty payload")]
    EmptyPayload,

    #[error("Slot {index} out of range (capacity {capacity})")]
    SlotOutOfRange { index: usize, capacity: u32 },

    // Compression errors
    #[error("Invalid compression level: {0}")]
    InvalidCompression(u8),

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    // Input errors
    #[error("{field} too long: {len} bytes (max {max})")]
    StringTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl WrapError {
    /// True for every error raised because the bytes on disk are not a valid archive
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            WrapError::InvalidMagic
                | WrapError::InvalidExtension(_)
                | WrapError::UnsupportedVersion(_)
                | WrapError::InvalidFormat(_)
        )
    }
}

impl From<toml::de::Error> for WrapError {
    fn from(err: toml::de::Error) -> Self {
        WrapError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for WrapError {
    fn from(err: toml::ser::Error) -> Self {
        WrapError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_grouping() {
        assert!(WrapError::InvalidMagic.is_format_error());
        assert!(WrapError::InvalidExtension("a.zip".into()).is_format_error());
        assert!(WrapError::InvalidFormat("truncated".into()).is_format_error());
        assert!(!WrapError::CapacityExceeded { capacity: 4 }.is_format_error());
        assert!(!WrapError::EntryNotFound("x".into()).is_format_error());
    }

    #[test]
    fn test_error_messages() {
        let err = WrapError::StringTooLong {
            field: "name",
            len: 80,
            max: 49,
        };
        assert_eq!(err.to_string(), "name too long: 80 bytes (max 49)");
    }
}
