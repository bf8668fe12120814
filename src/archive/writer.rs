use crate::archive::allocator::Allocation;
use crate::archive::byte_range::ByteRange;
use crate::archive::compression::{self, CompressionLevel};
use crate::archive::format::{
    entry_offset, ArchiveEntry, ArchiveHeader, FixedString, ENTRY_PATH_SIZE, ENTRY_SIZE,
    WRAP_EXTENSION,
};
use crate::archive::reader::{not_found_or_io, Archive};
use crate::config::ArchiveOptions;
use crate::error::{Result, WrapError};
use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info};

impl Archive {
    /// Create a new archive with `capacity` empty slots, replacing any file at `path`
    pub fn create<P: AsRef<Path>>(
        path: P,
        name: &str,
        capacity: u32,
        base_path: &str,
        content_version: u32,
    ) -> Result<Self> {
        let options = ArchiveOptions::new(name, capacity)
            .with_base_path(base_path)
            .with_content_version(content_version);
        Self::create_with(path, &options)
    }

    /// Create a new archive from options
    pub fn create_with<P: AsRef<Path>>(path: P, options: &ArchiveOptions) -> Result<Self> {
        let path = path.as_ref();
        if path.extension() != Some(OsStr::new(WRAP_EXTENSION)) {
            return Err(WrapError::InvalidExtension(path.display().to_string()));
        }

        let header = ArchiveHeader::new(
            options.kind,
            &options.name,
            &options.base_path,
            options.content_version,
            options.capacity,
        )?;

        let data_start = header.data_start();
        if data_start > u32::MAX as u64 {
            return Err(WrapError::TooLarge(data_start));
        }

        let entries = vec![ArchiveEntry::default(); options.capacity as usize];

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);

        header.write_to(&mut writer)?;
        for entry in &entries {
            entry.write_to(&mut writer)?;
        }

        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        info!(
            path = %path.display(),
            capacity = options.capacity,
            base_path = %options.base_path,
            "Created archive"
        );

        Ok(Self::from_parts(path.to_path_buf(), header, entries, data_start))
    }

    /// Open the archive at `path`, or create it from `options` if there is none
    pub fn load_or_create<P: AsRef<Path>>(path: P, options: &ArchiveOptions) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            Self::create_with(path, options)
        }
    }

    /// Store `data` under `virtual_path`, returning the slot it landed in.
    ///
    /// `reserved_size` asks for room beyond the payload so later, larger
    /// versions can be rewritten in place; it is raised to the payload size
    /// when smaller. The entry table is only written after the payload.
    pub fn emplace(
        &mut self,
        data: &[u8],
        virtual_path: &str,
        level: CompressionLevel,
        reserved_size: u32,
    ) -> Result<u32> {
        let key = self.index.canonicalize(virtual_path);
        let relative = self.index.relativize(&key);
        if relative.is_empty() {
            return Err(WrapError::InvalidPath(virtual_path.to_string()));
        }
        let stored_path = FixedString::<ENTRY_PATH_SIZE>::new("entry path", &relative)?;

        if data.is_empty() {
            return Err(WrapError::EmptyPayload);
        }
        if data.len() > u32::MAX as usize {
            return Err(WrapError::TooLarge(data.len() as u64));
        }

        // Compress before the file is opened for writing
        let (payload, actual_level) = compression::encode(data, level)?;
        let payload_len = payload.len() as u32;
        let needed = reserved_size.max(payload_len);

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| not_found_or_io(&self.path, e))?;
        self.persist_repairs(&mut file)?;
        let data_end = file.metadata()?.len().max(self.header.data_start());

        let (allocation, vacate) = self.place(&key, needed, data_end)?;
        debug!(
            path = %key,
            slot = allocation.index,
            offset = allocation.offset,
            reserved = allocation.reserved_size,
            reused = allocation.reused,
            "Placing entry"
        );

        write_payload(&mut file, &allocation, &payload)?;

        let entry = ArchiveEntry {
            path: stored_path,
            compression: actual_level,
            reserved_size: allocation.reserved_size,
            compressed_size: payload_len,
            uncompressed_size: data.len() as u32,
            offset: allocation.offset,
        };
        write_entry(&mut file, allocation.index, &entry)?;

        if let Some(old) = vacate {
            write_entry(&mut file, old, &self.entries[old as usize].vacated())?;
        }
        file.sync_data()?;

        // Disk is consistent; commit the in-memory view
        let slot = allocation.index as usize;
        if !self.entries[slot].is_empty() {
            let previous = self.index.join(self.entries[slot].path.as_str());
            if self.index.get(&previous) == Some(allocation.index) {
                self.index.remove(&previous);
            }
        }
        self.entries[slot] = entry;
        self.allocator.claim(allocation.index);
        self.index.insert(key, allocation.index);

        if let Some(old) = vacate {
            let old = old as usize;
            self.entries[old] = self.entries[old].vacated();
            self.allocator.release(old as u32);
        }

        Ok(allocation.index)
    }

    /// Store the file at `physical_path` under `virtual_path`
    pub fn emplace_file<P: AsRef<Path>>(
        &mut self,
        physical_path: P,
        virtual_path: &str,
        level: CompressionLevel,
        reserved_size: u32,
    ) -> Result<u32> {
        let physical_path = physical_path.as_ref();
        let metadata =
            std::fs::metadata(physical_path).map_err(|e| not_found_or_io(physical_path, e))?;
        if !metadata.is_file() {
            return Err(WrapError::InvalidArgument(format!(
                "{} is not a regular file",
                physical_path.display()
            )));
        }

        let data = std::fs::read(physical_path)?;
        self.emplace(&data, virtual_path, level, reserved_size)
    }

    /// Write back the slots repaired on open.
    ///
    /// Runs before any payload is written: a stale record left on disk could
    /// otherwise describe bytes that a grown slot is about to reuse.
    fn persist_repairs(&mut self, file: &mut File) -> Result<()> {
        if self.repairs.is_empty() {
            return Ok(());
        }

        for &slot in &self.repairs {
            write_entry(file, slot, &self.entries[slot as usize])?;
        }
        file.sync_data()?;

        debug!(slots = self.repairs.len(), "Persisted repaired slots");
        self.repairs.clear();
        Ok(())
    }

    /// Pick the slot for a payload needing `needed` bytes.
    ///
    /// Returns the allocation and, when an entry moves to another slot, the
    /// slot it leaves behind.
    fn place(&self, key: &str, needed: u32, data_end: u64) -> Result<(Allocation, Option<u32>)> {
        let Some(current) = self.index.get(key) else {
            return Ok((self.allocator.plan(&self.entries, needed, data_end)?, None));
        };

        let entry = &self.entries[current as usize];
        if entry.reserved_size >= needed {
            return Ok((Allocation::in_place(current, entry), None));
        }

        match self.allocator.best_reserved_fit(&self.entries, needed) {
            Some(other) => Ok((
                Allocation::in_place(other, &self.entries[other as usize]),
                Some(current),
            )),
            None => Ok((Allocation::grow(current, data_end, needed)?, None)),
        }
    }

    /// Empty the slot holding `virtual_path`.
    ///
    /// The slot keeps its offset and reserved size, so the region is offered
    /// to the next entry that fits.
    pub fn remove(&mut self, virtual_path: &str) -> Result<()> {
        let key = self.index.canonicalize(virtual_path);
        let slot = self
            .index
            .get(&key)
            .ok_or_else(|| WrapError::EntryNotFound(virtual_path.to_string()))?;

        let vacated = self.entries[slot as usize].vacated();

        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| not_found_or_io(&self.path, e))?;
        self.persist_repairs(&mut file)?;
        write_entry(&mut file, slot, &vacated)?;
        file.sync_data()?;

        debug!(path = %key, slot, "Removed entry");

        self.entries[slot as usize] = vacated;
        self.index.remove(&key);
        self.allocator.release(slot);
        Ok(())
    }

    /// Copy every stored entry into a fresh archive with `new_capacity` slots.
    ///
    /// Payloads are copied as stored, without recompression. Vacated regions
    /// are not carried over.
    pub fn rebuild<P: AsRef<Path>>(&self, dest: P, new_capacity: u32) -> Result<Archive> {
        let dest = dest.as_ref();
        if same_file(dest, &self.path) {
            return Err(WrapError::InvalidArgument(format!(
                "cannot rebuild {} onto itself",
                dest.display()
            )));
        }

        let occupied = self.occupied_slots();
        if (new_capacity as usize) < occupied.len() {
            return Err(WrapError::CapacityExceeded {
                capacity: new_capacity,
            });
        }

        let options = ArchiveOptions::new(self.name(), new_capacity)
            .with_base_path(self.base_path())
            .with_content_version(self.content_version())
            .with_kind(self.kind());
        let mut target = Archive::create_with(dest, &options)?;

        let mut source = File::open(&self.path).map_err(|e| not_found_or_io(&self.path, e))?;
        let mut out = OpenOptions::new().read(true).write(true).open(dest)?;
        let mut data_end = target.header.data_start();

        for (new_index, (key, slot)) in occupied.into_iter().enumerate() {
            let new_index = new_index as u32;
            let entry = &self.entries[slot as usize];

            let mut payload = vec![0u8; entry.compressed_size as usize];
            ByteRange::new(&mut source, entry.offset as u64, entry.compressed_size as u64)?
                .read_exact(&mut payload)?;

            let allocation = Allocation::grow(new_index, data_end, entry.reserved_size)?;
            write_payload(&mut out, &allocation, &payload)?;
            data_end += allocation.reserved_size as u64;

            let moved = ArchiveEntry {
                offset: allocation.offset,
                ..entry.clone()
            };
            write_entry(&mut out, new_index, &moved)?;

            target.entries[new_index as usize] = moved;
            target.allocator.claim(new_index);
            target.index.insert(key, new_index);
        }
        out.sync_all()?;

        info!(
            from = %self.path.display(),
            to = %dest.display(),
            capacity = new_capacity,
            entries = target.occupied_count(),
            "Rebuilt archive"
        );
        Ok(target)
    }
}

/// Write `payload` into the allocated region, growing the file to cover the
/// whole reservation
fn write_payload(file: &mut File, allocation: &Allocation, payload: &[u8]) -> Result<()> {
    let mut range = ByteRange::new(
        &mut *file,
        allocation.offset as u64,
        allocation.reserved_size as u64,
    )?;
    range.write_all(payload)?;

    let end = allocation.offset as u64 + allocation.reserved_size as u64;
    if file.metadata()?.len() < end {
        file.set_len(end)?;
    }
    Ok(())
}

/// Write one entry record at its table position
fn write_entry(file: &mut File, index: u32, entry: &ArchiveEntry) -> Result<()> {
    let mut buf = Vec::with_capacity(ENTRY_SIZE);
    entry.write_to(&mut buf)?;

    file.seek(SeekFrom::Start(entry_offset(index)))?;
    file.write_all(&buf)?;
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_writes_full_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.wrap");

        let archive = Archive::create(&path, "Table", 8, "data", 2).unwrap();
        assert_eq!(archive.entry_count(), 8);
        assert_eq!(archive.empty_count(), 8);
        assert_eq!(archive.occupied_count(), 0);
        assert_eq!(
            archive.file_size().unwrap(),
            archive.header().data_start()
        );
    }

    #[test]
    fn test_create_requires_extension() {
        let dir = tempdir().unwrap();
        let result = Archive::create(dir.path().join("table.zip"), "T", 1, "", 0);
        assert!(matches!(result, Err(WrapError::InvalidExtension(_))));
    }

    #[test]
    fn test_create_rejects_long_name() {
        let dir = tempdir().unwrap();
        let name = "n".repeat(60);
        let result = Archive::create(dir.path().join("t.wrap"), &name, 1, "", 0);
        assert!(matches!(result, Err(WrapError::StringTooLong { field: "name", .. })));
    }

    #[test]
    fn test_emplace_grows_file_to_reservation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grow.wrap");
        let mut archive = Archive::create(&path, "Grow", 2, "", 0).unwrap();
        let start = archive.header().data_start();

        archive
            .emplace(b"abc", "a.txt", CompressionLevel::NONE, 100)
            .unwrap();

        let entry = archive.entry_by_path("a.txt").unwrap();
        assert_eq!(entry.offset as u64, start);
        assert_eq!(entry.reserved_size, 100);
        assert_eq!(entry.compressed_size, 3);
        assert_eq!(archive.file_size().unwrap(), start + 100);
    }

    #[test]
    fn test_payload_written_before_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("order.wrap");
        let mut archive = Archive::create(&path, "Order", 1, "", 0).unwrap();

        archive
            .emplace(b"first", "a.txt", CompressionLevel::NONE, 0)
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let start = archive.header().data_start() as usize;
        assert_eq!(&bytes[start..start + 5], b"first");
    }

    #[test]
    fn test_empty_payload_rejected() {
        let dir = tempdir().unwrap();
        let mut archive = Archive::create(dir.path().join("e.wrap"), "E", 1, "", 0).unwrap();
        let result = archive.emplace(b"", "a.txt", CompressionLevel::NONE, 0);
        assert!(matches!(result, Err(WrapError::EmptyPayload)));
        assert_eq!(archive.empty_count(), 1);
    }

    #[test]
    fn test_invalid_virtual_path() {
        let dir = tempdir().unwrap();
        let mut archive = Archive::create(dir.path().join("p.wrap"), "P", 1, "assets", 0).unwrap();

        let result = archive.emplace(b"x", "assets/", CompressionLevel::NONE, 0);
        assert!(matches!(result, Err(WrapError::InvalidPath(_))));

        let long = "d/".repeat(200);
        let result = archive.emplace(b"x", &long, CompressionLevel::NONE, 0);
        assert!(matches!(result, Err(WrapError::StringTooLong { .. })));
    }

    #[test]
    fn test_same_file_detection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("same.wrap");
        let archive = Archive::create(&path, "S", 1, "", 0).unwrap();

        let result = archive.rebuild(&path, 4);
        assert!(matches!(result, Err(WrapError::InvalidArgument(_))));
    }
}
