use crate::archive::compression::CompressionLevel;
use crate::error::{Result, WrapError};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Signature at byte 0 of every archive
pub const MAGIC_NUMBER: [u8; 4] = *b"WRAP";

/// Format version written by this crate
pub const FORMAT_VERSION: u16 = 1;

/// Required file extension (without the dot)
pub const WRAP_EXTENSION: &str = "wrap";

/// Byte capacity of the header base path field, terminator included
pub const BASE_PATH_SIZE: usize = 100;

/// Byte capacity of the header name field, terminator included
pub const NAME_SIZE: usize = 50;

/// Byte capacity of the entry path field, terminator included
pub const ENTRY_PATH_SIZE: usize = 255;

/// Header size in bytes
pub const HEADER_SIZE: usize = 4 + 4 + 2 + 4 + BASE_PATH_SIZE + NAME_SIZE + 4;

/// Entry table record size in bytes
pub const ENTRY_SIZE: usize = ENTRY_PATH_SIZE + 1 + 4 * 4;

/// Byte offset of the entry record for `index`
pub fn entry_offset(index: u32) -> u64 {
    HEADER_SIZE as u64 + index as u64 * ENTRY_SIZE as u64
}

/// Byte offset where the data region begins for an archive of `capacity` slots
pub fn data_start(capacity: u32) -> u64 {
    entry_offset(capacity)
}

/// Purpose of an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum ArchiveKind {
    /// No declared purpose
    None = 0,
    /// Base file archive
    #[default]
    File = 1,
    /// Content that overrides entries of base archives; searched first by
    /// [`ArchiveSet`](crate::archive::ArchiveSet)
    Update = 2,
}

impl ArchiveKind {
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::File),
            2 => Ok(Self::Update),
            _ => Err(WrapError::InvalidFormat(format!(
                "Unknown archive kind: {}",
                value
            ))),
        }
    }
}

/// UTF-8 string stored in a NUL-padded field of `N` bytes.
///
/// Holds at most `N - 1` bytes so the stored field is always terminated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FixedString<const N: usize>(String);

impl<const N: usize> FixedString<N> {
    /// Maximum content length in bytes
    pub const MAX_LEN: usize = N - 1;

    /// Validate `value` for a field named `field`
    pub fn new(field: &'static str, value: &str) -> Result<Self> {
        if value.len() > Self::MAX_LEN {
            return Err(WrapError::StringTooLong {
                field,
                len: value.len(),
                max: Self::MAX_LEN,
            });
        }
        if value.contains('\0') {
            return Err(WrapError::InvalidPath(format!(
                "{} contains a NUL byte",
                field
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut buf = [0u8; N];
        buf[..self.0.len()].copy_from_slice(self.0.as_bytes());
        writer.write_all(&buf)?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = [0u8; N];
        reader.read_exact(&mut buf)?;

        let len = buf.iter().position(|&b| b == 0).ok_or_else(|| {
            WrapError::InvalidFormat(format!("Unterminated {}-byte string field", N))
        })?;

        let value = std::str::from_utf8(&buf[..len])
            .map_err(|e| WrapError::InvalidFormat(format!("Invalid UTF-8 in string field: {}", e)))?;
        Ok(Self(value.to_string()))
    }
}

impl<const N: usize> std::fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Archive header, written once at byte 0.
///
/// Layout (little-endian, packed, 168 bytes):
/// - Signature: "WRAP" (4 bytes)
/// - Kind: uint32 (4 bytes)
/// - Format Version: uint16 (2 bytes)
/// - Content Version: uint32 (4 bytes)
/// - Base Path: 100 bytes, NUL-padded
/// - Name: 50 bytes, NUL-padded
/// - Entry Capacity: uint32 (4 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub kind: ArchiveKind,
    pub format_version: u16,
    pub content_version: u32,
    pub base_path: FixedString<BASE_PATH_SIZE>,
    pub name: FixedString<NAME_SIZE>,
    pub entry_capacity: u32,
}

impl ArchiveHeader {
    pub fn new(
        kind: ArchiveKind,
        name: &str,
        base_path: &str,
        content_version: u32,
        entry_capacity: u32,
    ) -> Result<Self> {
        Ok(Self {
            kind,
            format_version: FORMAT_VERSION,
            content_version,
            base_path: FixedString::new("base path", base_path)?,
            name: FixedString::new("name", name)?,
            entry_capacity,
        })
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&MAGIC_NUMBER)?;
        writer.write_all(&(self.kind as u32).to_le_bytes())?;
        writer.write_all(&self.format_version.to_le_bytes())?;
        writer.write_all(&self.content_version.to_le_bytes())?;
        self.base_path.write_to(&mut writer)?;
        self.name.write_to(&mut writer)?;
        writer.write_all(&self.entry_capacity.to_le_bytes())?;
        Ok(())
    }

    /// Read header from a reader
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;

        if magic != MAGIC_NUMBER {
            return Err(WrapError::InvalidMagic);
        }

        let kind = ArchiveKind::from_u32(read_u32(&mut reader)?)?;
        let format_version = read_u16(&mut reader)?;
        let content_version = read_u32(&mut reader)?;
        let base_path = FixedString::read_from(&mut reader)?;
        let name = FixedString::read_from(&mut reader)?;
        let entry_capacity = read_u32(&mut reader)?;

        Ok(Self {
            kind,
            format_version,
            content_version,
            base_path,
            name,
            entry_capacity,
        })
    }

    /// Validate version compatibility
    pub fn validate_version(&self) -> Result<()> {
        if self.format_version > FORMAT_VERSION {
            return Err(WrapError::UnsupportedVersion(self.format_version));
        }
        Ok(())
    }

    /// Offset of the first data byte
    pub fn data_start(&self) -> u64 {
        data_start(self.entry_capacity)
    }
}

/// Entry table record, one per slot.
///
/// Layout (little-endian, packed, 272 bytes):
/// - Path: 255 bytes, NUL-padded, relative to the header base path
/// - Compression Level: uint8 (1 byte)
/// - Reserved Size: uint32 (4 bytes)
/// - Compressed Size: uint32 (4 bytes)
/// - Uncompressed Size: uint32 (4 bytes)
/// - Offset: uint32 (4 bytes)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: FixedString<ENTRY_PATH_SIZE>,
    pub compression: CompressionLevel,
    pub reserved_size: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub offset: u32,
}

impl ArchiveEntry {
    /// A slot holds no payload iff its uncompressed size is zero
    pub fn is_empty(&self) -> bool {
        self.uncompressed_size == 0
    }

    /// The empty form of this slot. Offset and reserved size survive so the
    /// region can be handed to a later entry.
    pub fn vacated(&self) -> Self {
        Self {
            reserved_size: self.reserved_size,
            offset: self.offset,
            ..Self::default()
        }
    }

    /// End of the reserved region
    pub fn reserved_end(&self) -> u64 {
        self.offset as u64 + self.reserved_size as u64
    }

    /// Write entry record
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        self.path.write_to(&mut writer)?;
        writer.write_all(&[self.compression.as_u8()])?;
        writer.write_all(&self.reserved_size.to_le_bytes())?;
        writer.write_all(&self.compressed_size.to_le_bytes())?;
        writer.write_all(&self.uncompressed_size.to_le_bytes())?;
        writer.write_all(&self.offset.to_le_bytes())?;
        Ok(())
    }

    /// Read entry record
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let path = FixedString::read_from(&mut reader)?;

        let mut level = [0u8; 1];
        reader.read_exact(&mut level)?;
        let compression = CompressionLevel::new(level[0])
            .map_err(|_| WrapError::InvalidFormat(format!("Invalid compression level: {}", level[0])))?;

        let reserved_size = read_u32(&mut reader)?;
        let compressed_size = read_u32(&mut reader)?;
        let uncompressed_size = read_u32(&mut reader)?;
        let offset = read_u32(&mut reader)?;

        Ok(Self {
            path,
            compression,
            reserved_size,
            compressed_size,
            uncompressed_size,
            offset,
        })
    }
}

// Helper functions for reading primitive types
fn read_u16<R: Read>(mut reader: R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(mut reader: R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
