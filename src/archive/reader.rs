use crate::archive::allocator::SlotAllocator;
use crate::archive::byte_range::ByteRange;
use crate::archive::compression::{self, CompressionLevel};
use crate::archive::format::{
    ArchiveEntry, ArchiveHeader, ArchiveKind, HEADER_SIZE, WRAP_EXTENSION,
};
use crate::archive::path_index::PathIndex;
use crate::error::{Result, WrapError};
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Handle to one `.wrap` archive.
///
/// Holds the header, the entry table and the path index in memory. Every
/// operation opens the backing file, does its work and closes it again, so
/// no descriptor outlives a call. Writers must be serialised by the caller.
///
/// Slots repaired while opening are only fixed in memory until the first
/// `emplace` or `remove`, which writes them back before anything else.
#[derive(Debug, Clone)]
pub struct Archive {
    pub(super) path: PathBuf,
    pub(super) header: ArchiveHeader,
    pub(super) entries: Vec<ArchiveEntry>,
    pub(super) index: PathIndex,
    pub(super) allocator: SlotAllocator,
    /// Slots whose on-disk record differs from the repaired in-memory one
    pub(super) repairs: BTreeSet<u32>,
}

impl Archive {
    /// Open an existing archive
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let metadata = std::fs::metadata(path).map_err(|e| not_found_or_io(path, e))?;
        if !metadata.is_file() {
            return Err(WrapError::InvalidFormat(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        if path.extension() != Some(OsStr::new(WRAP_EXTENSION)) {
            return Err(WrapError::InvalidExtension(path.display().to_string()));
        }

        let file_len = metadata.len();
        if file_len < HEADER_SIZE as u64 {
            return Err(WrapError::InvalidFormat(format!(
                "Truncated header: {} bytes",
                file_len
            )));
        }

        let mut reader = BufReader::new(File::open(path)?);

        let header = ArchiveHeader::read_from(&mut reader)?;
        header.validate_version()?;

        // Reject before allocating anything sized by the capacity field
        let data_start = header.data_start();
        if file_len < data_start {
            return Err(WrapError::InvalidFormat(format!(
                "Truncated entry table: {} slots need {} bytes, file has {}",
                header.entry_capacity, data_start, file_len
            )));
        }

        let mut entries = Vec::with_capacity(header.entry_capacity as usize);
        for _ in 0..header.entry_capacity {
            entries.push(ArchiveEntry::read_from(&mut reader)?);
        }

        let archive = Self::from_parts(path.to_path_buf(), header, entries, file_len);
        info!(
            path = %path.display(),
            capacity = archive.entry_count(),
            occupied = archive.occupied_count(),
            "Opened archive"
        );
        Ok(archive)
    }

    /// Build the in-memory state from a parsed table.
    ///
    /// Slots whose metadata does not fit the file are treated as empty.
    pub(super) fn from_parts(
        path: PathBuf,
        header: ArchiveHeader,
        mut entries: Vec<ArchiveEntry>,
        file_len: u64,
    ) -> Self {
        let data_start = header.data_start();
        let mut index = PathIndex::with_capacity(header.base_path.as_str(), entries.len());
        let mut repairs = BTreeSet::new();

        for (slot, entry) in entries.iter_mut().enumerate() {
            if entry.is_empty() {
                if entry.reserved_size != 0
                    && ((entry.offset as u64) < data_start || entry.reserved_end() > file_len)
                {
                    warn!(slot, "Dropping out-of-bounds reservation of empty slot");
                    *entry = ArchiveEntry::default();
                    repairs.insert(slot as u32);
                }
                continue;
            }

            if let Some(reason) = inconsistency(entry, data_start, file_len) {
                warn!(slot, reason, "Treating inconsistent slot as empty");
                *entry = ArchiveEntry::default();
                repairs.insert(slot as u32);
                continue;
            }

            let key = index.join(entry.path.as_str());
            if index.contains(&key) {
                warn!(slot, path = %key, "Duplicate path, vacating later slot");
                *entry = entry.vacated();
                repairs.insert(slot as u32);
                continue;
            }
            index.insert(key, slot as u32);
        }

        let allocator = SlotAllocator::from_entries(&entries);
        Self {
            path,
            header,
            entries,
            index,
            allocator,
            repairs,
        }
    }

    /// Check if a virtual path is stored in the archive
    pub fn contains(&self, path: &str) -> bool {
        self.index.lookup(path).is_some()
    }

    /// Slot index holding a virtual path
    pub fn slot_of(&self, path: &str) -> Result<u32> {
        self.index
            .lookup(path)
            .ok_or_else(|| WrapError::EntryNotFound(path.to_string()))
    }

    /// Entry metadata by slot index
    pub fn entry(&self, index: usize) -> Result<&ArchiveEntry> {
        self.entries.get(index).ok_or(WrapError::SlotOutOfRange {
            index,
            capacity: self.header.entry_capacity,
        })
    }

    /// Entry metadata by virtual path
    pub fn entry_by_path(&self, path: &str) -> Result<&ArchiveEntry> {
        let slot = self.slot_of(path)?;
        Ok(&self.entries[slot as usize])
    }

    /// Read and decompress one entry
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let entry = self.entry_by_path(path)?;

        let mut range = self.open_range(entry)?;
        let mut payload = Vec::with_capacity(entry.compressed_size as usize);
        range.read_to_end(&mut payload)?;

        if payload.len() != entry.compressed_size as usize {
            return Err(WrapError::InvalidFormat(format!(
                "Entry {} truncated: expected {} bytes, got {}",
                path,
                entry.compressed_size,
                payload.len()
            )));
        }

        compression::decode(payload, entry.compression, entry.uncompressed_size as usize)
    }

    /// Raw stored bytes of one entry, as a standalone readable file
    pub fn open_entry(&self, path: &str) -> Result<ByteRange<File>> {
        let entry = self.entry_by_path(path)?;
        self.open_range(entry)
    }

    /// Decompressed bytes of one entry, decoded as they are read
    pub fn stream(&self, path: &str) -> Result<EntryReader> {
        let entry = self.entry_by_path(path)?;
        let range = self.open_range(entry)?;

        let inner = if entry.compression.is_none() {
            EntryStream::Stored(range)
        } else {
            EntryStream::Compressed(compression::decoder(range)?)
        };

        Ok(EntryReader {
            inner,
            len: entry.uncompressed_size as u64,
        })
    }

    fn open_range(&self, entry: &ArchiveEntry) -> Result<ByteRange<File>> {
        let file = File::open(&self.path).map_err(|e| not_found_or_io(&self.path, e))?;
        Ok(ByteRange::new(
            file,
            entry.offset as u64,
            entry.compressed_size as u64,
        )?)
    }

    /// Canonical paths of all stored entries with their slots, in slot order
    pub fn occupied_slots(&self) -> Vec<(String, u32)> {
        let mut slots: Vec<(String, u32)> = self
            .index
            .iter()
            .map(|(path, slot)| (path.to_string(), slot))
            .collect();
        slots.sort_by_key(|(_, slot)| *slot);
        slots
    }

    /// Canonical paths of all stored entries, in slot order
    pub fn paths(&self) -> Vec<String> {
        self.occupied_slots().into_iter().map(|(path, _)| path).collect()
    }

    /// Canonicalize a virtual path against this archive's base path
    pub fn canonicalize(&self, path: &str) -> String {
        self.index.canonicalize(path)
    }

    /// Get archive header information
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Location of the archive on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.header.name.as_str()
    }

    pub fn base_path(&self) -> &str {
        self.header.base_path.as_str()
    }

    pub fn kind(&self) -> ArchiveKind {
        self.header.kind
    }

    pub fn format_version(&self) -> u16 {
        self.header.format_version
    }

    pub fn content_version(&self) -> u32 {
        self.header.content_version
    }

    /// Number of slots in the entry table (the fixed capacity)
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of slots holding an entry
    pub fn occupied_count(&self) -> usize {
        self.index.len()
    }

    /// Number of slots available to new entries
    pub fn empty_count(&self) -> usize {
        self.allocator.empty_count()
    }

    /// Number of slots repaired on open and not yet written back
    pub fn pending_repairs(&self) -> usize {
        self.repairs.len()
    }

    /// Current size of the archive file
    pub fn file_size(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }
}

/// Why an occupied slot cannot be trusted, if it cannot
fn inconsistency(entry: &ArchiveEntry, data_start: u64, file_len: u64) -> Option<&'static str> {
    if entry.path.is_empty() {
        Some("missing path")
    } else if entry.compressed_size == 0 {
        Some("zero compressed size")
    } else if entry.compressed_size > entry.reserved_size {
        Some("payload larger than reservation")
    } else if (entry.offset as u64) < data_start {
        Some("payload overlaps entry table")
    } else if entry.reserved_end() > file_len {
        Some("reservation past end of file")
    } else if entry.compression == CompressionLevel::NONE
        && entry.compressed_size != entry.uncompressed_size
    {
        Some("stored size mismatch")
    } else {
        None
    }
}

pub(super) fn not_found_or_io(path: &Path, err: io::Error) -> WrapError {
    if err.kind() == io::ErrorKind::NotFound {
        WrapError::NotFound(path.display().to_string())
    } else {
        WrapError::Io(err)
    }
}

enum EntryStream {
    Stored(ByteRange<File>),
    Compressed(zstd::stream::read::Decoder<'static, BufReader<ByteRange<File>>>),
}

/// Streaming reader over one entry's decompressed bytes
pub struct EntryReader {
    inner: EntryStream,
    len: u64,
}

impl EntryReader {
    /// Decompressed size of the entry
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            EntryStream::Stored(range) => range.read(buf),
            EntryStream::Compressed(decoder) => decoder.read(buf),
        }
    }
}

impl std::fmt::Debug for EntryReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.inner {
            EntryStream::Stored(_) => "stored",
            EntryStream::Compressed(_) => "compressed",
        };
        f.debug_struct("EntryReader")
            .field("mode", &mode)
            .field("len", &self.len)
            .finish()
    }
}
