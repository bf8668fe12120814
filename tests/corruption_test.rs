//! Corruption detection and recovery
//!
//! Damaged headers and tables must be rejected with format errors; damaged
//! slot metadata must be dropped on open rather than trusted.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::{tempdir, TempDir};
use wrap_rs::archive::{entry_offset, ENTRY_PATH_SIZE};
use wrap_rs::{Archive, CompressionLevel, WrapError, HEADER_SIZE};

/// Helper: Create a valid test archive
fn create_test_archive() -> (TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wrap");
    let mut archive = Archive::create(&path, "Test", 4, "", 0).unwrap();
    archive.emplace(b"Hello, World!", "test.txt", CompressionLevel::NONE, 0).unwrap();
    archive.emplace(&vec![0xAB; 1024], "data.bin", CompressionLevel::FAST, 0).unwrap();
    (dir, path)
}

/// Helper: Overwrite bytes at specific offset
fn corrupt_bytes_at(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().read(true).write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
}

/// Helper: Truncate file at specific offset
fn truncate_at(path: &Path, new_length: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(new_length).unwrap();
}

/// Offset of a slot's `offset` field
fn offset_field(slot: u32) -> u64 {
    entry_offset(slot) + ENTRY_PATH_SIZE as u64 + 1 + 12
}

#[test]
fn test_corrupted_magic_number() {
    let (_dir, path) = create_test_archive();
    corrupt_bytes_at(&path, 0, &[0xFF]);

    match Archive::open(&path) {
        Err(WrapError::InvalidMagic) => {}
        other => panic!("Expected InvalidMagic, got: {:?}", other),
    }
}

#[test]
fn test_wrong_extension() {
    let (dir, path) = create_test_archive();
    let renamed = dir.path().join("test.pak");
    std::fs::rename(&path, &renamed).unwrap();

    let err = Archive::open(&renamed).unwrap_err();
    assert!(matches!(err, WrapError::InvalidExtension(_)));
    assert!(err.is_format_error());
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    let result = Archive::open(dir.path().join("absent.wrap"));
    assert!(matches!(result, Err(WrapError::NotFound(_))));
}

#[test]
fn test_directory_rejected() {
    let dir = tempdir().unwrap();
    let fake = dir.path().join("folder.wrap");
    std::fs::create_dir(&fake).unwrap();

    let err = Archive::open(&fake).unwrap_err();
    assert!(err.is_format_error(), "got {:?}", err);
}

#[test]
fn test_truncated_header() {
    let (_dir, path) = create_test_archive();
    truncate_at(&path, 20);

    let err = Archive::open(&path).unwrap_err();
    assert!(matches!(err, WrapError::InvalidFormat(_)), "got {:?}", err);
}

#[test]
fn test_truncated_entry_table() {
    let (_dir, path) = create_test_archive();
    truncate_at(&path, entry_offset(2) + 10);

    let err = Archive::open(&path).unwrap_err();
    assert!(matches!(err, WrapError::InvalidFormat(_)), "got {:?}", err);
}

#[test]
fn test_huge_capacity_rejected() {
    let (_dir, path) = create_test_archive();
    corrupt_bytes_at(&path, HEADER_SIZE as u64 - 4, &u32::MAX.to_le_bytes());

    let err = Archive::open(&path).unwrap_err();
    assert!(err.is_format_error(), "got {:?}", err);
}

#[test]
fn test_unknown_kind_rejected() {
    let (_dir, path) = create_test_archive();
    corrupt_bytes_at(&path, 4, &99u32.to_le_bytes());

    let err = Archive::open(&path).unwrap_err();
    assert!(matches!(err, WrapError::InvalidFormat(_)), "got {:?}", err);
}

#[test]
fn test_future_version_rejected() {
    let (_dir, path) = create_test_archive();
    corrupt_bytes_at(&path, 8, &99u16.to_le_bytes());

    assert!(matches!(
        Archive::open(&path),
        Err(WrapError::UnsupportedVersion(99))
    ));
}

#[test]
fn test_slot_pointing_past_eof_treated_as_empty() {
    let (_dir, path) = create_test_archive();
    corrupt_bytes_at(&path, offset_field(1), &0x7FFF_FFFFu32.to_le_bytes());

    let archive = Archive::open(&path).unwrap();
    assert!(archive.contains("test.txt"));
    assert!(!archive.contains("data.bin"));
    assert_eq!(archive.occupied_count(), 1);
    assert_eq!(archive.empty_count(), 3);
    assert_eq!(archive.read("test.txt").unwrap(), b"Hello, World!");
}

#[test]
fn test_torn_payload_recovered() {
    let (_dir, path) = create_test_archive();
    let archive = Archive::open(&path).unwrap();
    let data_entry = archive.entry_by_path("data.bin").unwrap().clone();

    // Crash while the second payload was being written
    truncate_at(&path, data_entry.offset as u64 + 2);

    let mut archive = Archive::open(&path).unwrap();
    assert!(archive.contains("test.txt"));
    assert!(!archive.contains("data.bin"));

    // The recovered slot is usable again
    archive.emplace(b"fresh", "fresh.txt", CompressionLevel::NONE, 0).unwrap();
    assert_eq!(archive.read("fresh.txt").unwrap(), b"fresh");
}

#[test]
fn test_compressed_payload_corruption_detected() {
    let (_dir, path) = create_test_archive();
    let archive = Archive::open(&path).unwrap();
    let entry = archive.entry_by_path("data.bin").unwrap().clone();
    assert_eq!(entry.compression, CompressionLevel::FAST);

    corrupt_bytes_at(&path, entry.offset as u64, &[0u8; 8]);

    let err = archive.read("data.bin").unwrap_err();
    assert!(matches!(err, WrapError::DecompressionFailed(_)), "got {:?}", err);
}

#[test]
fn test_failed_open_leaves_nothing_behind() {
    let (_dir, path) = create_test_archive();
    let original = std::fs::read(&path).unwrap();
    corrupt_bytes_at(&path, 1, b"X");

    assert!(Archive::open(&path).is_err());

    // Opening never writes
    let after = std::fs::read(&path).unwrap();
    assert_eq!(after.len(), original.len());
    assert_eq!(&after[2..], &original[2..]);
}

/// Helper: Overwrite the stored path of a slot
fn rename_slot(path: &Path, slot: u32, name: &str) {
    let mut field = vec![0u8; ENTRY_PATH_SIZE];
    field[..name.len()].copy_from_slice(name.as_bytes());
    corrupt_bytes_at(path, entry_offset(slot), &field);
}

#[test]
fn test_recovered_slot_stays_dead_after_growth() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("grow.wrap");
    let mut archive = Archive::create(&path, "Grow", 3, "", 0).unwrap();
    archive.emplace(&[1u8; 10], "x.bin", CompressionLevel::NONE, 0).unwrap();
    archive.emplace(&[2u8; 50], "y.bin", CompressionLevel::NONE, 0).unwrap();
    let y_offset = archive.entry_by_path("y.bin").unwrap().offset as u64;

    truncate_at(&path, y_offset + 2);
    let before = std::fs::read(&path).unwrap();

    let mut archive = Archive::open(&path).unwrap();
    assert!(!archive.contains("y.bin"));
    assert_eq!(archive.pending_repairs(), 1);
    assert_eq!(std::fs::read(&path).unwrap(), before);

    // Grows x over the region the dropped record still described
    let x = vec![3u8; 200];
    archive.emplace(&x, "x.bin", CompressionLevel::NONE, 0).unwrap();
    assert_eq!(archive.pending_repairs(), 0);

    let mut reopened = Archive::open(&path).unwrap();
    assert!(!reopened.contains("y.bin"));
    assert_eq!(reopened.pending_repairs(), 0);
    assert_eq!(reopened.occupied_count(), 1);

    reopened.emplace(&[4u8; 40], "y.bin", CompressionLevel::NONE, 0).unwrap();
    assert_eq!(reopened.read("x.bin").unwrap(), x);
    assert_eq!(reopened.read("y.bin").unwrap(), vec![4u8; 40]);

    let last = Archive::open(&path).unwrap();
    assert_eq!(last.read("x.bin").unwrap(), x);
    assert_eq!(last.read("y.bin").unwrap(), vec![4u8; 40]);
}

#[test]
fn test_duplicate_path_lower_slot_wins() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dup.wrap");
    let mut archive = Archive::create(&path, "Dup", 3, "", 0).unwrap();
    archive.emplace(b"old-a", "a.txt", CompressionLevel::NONE, 0).unwrap();
    archive.emplace(b"new-a", "b.txt", CompressionLevel::NONE, 0).unwrap();

    // Crash between writing the moved entry and vacating its old slot
    rename_slot(&path, 1, "a.txt");

    let archive = Archive::open(&path).unwrap();
    assert_eq!(archive.read("a.txt").unwrap(), b"old-a");
    assert_eq!(archive.slot_of("a.txt").unwrap(), 0);
    assert!(!archive.contains("b.txt"));
    assert_eq!(archive.occupied_count(), 1);
    assert_eq!(archive.empty_count(), 2);

    let loser = archive.entry(1).unwrap();
    assert!(loser.is_empty());
    assert_eq!(loser.reserved_size, 5);
}

#[test]
fn test_removed_duplicate_does_not_return() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dup.wrap");
    let mut archive = Archive::create(&path, "Dup", 3, "", 0).unwrap();
    archive.emplace(b"old-a", "a.txt", CompressionLevel::NONE, 0).unwrap();
    archive.emplace(b"new-a", "b.txt", CompressionLevel::NONE, 0).unwrap();
    rename_slot(&path, 1, "a.txt");

    let mut archive = Archive::open(&path).unwrap();
    assert_eq!(archive.pending_repairs(), 1);
    archive.remove("a.txt").unwrap();
    assert!(!archive.contains("a.txt"));

    let reopened = Archive::open(&path).unwrap();
    assert!(!reopened.contains("a.txt"));
    assert_eq!(reopened.occupied_count(), 0);
    assert_eq!(reopened.pending_repairs(), 0);

    // Both regions stay reusable
    assert_eq!(reopened.entry(0).unwrap().reserved_size, 5);
    assert_eq!(reopened.entry(1).unwrap().reserved_size, 5);
}

#[test]
fn test_empty_slot_loses_out_of_bounds_reservation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vacant.wrap");
    let mut archive = Archive::create(&path, "Vacant", 2, "", 0).unwrap();
    archive.emplace(&[1u8; 10], "x.bin", CompressionLevel::NONE, 0).unwrap();
    archive.emplace(&[2u8; 20], "y.bin", CompressionLevel::NONE, 0).unwrap();
    let y_offset = archive.entry_by_path("y.bin").unwrap().offset as u64;
    archive.remove("y.bin").unwrap();

    truncate_at(&path, y_offset + 5);

    let mut archive = Archive::open(&path).unwrap();
    assert_eq!(archive.entry(1).unwrap().reserved_size, 0);
    assert_eq!(archive.empty_count(), 1);
    assert_eq!(archive.pending_repairs(), 1);
    assert_eq!(archive.read("x.bin").unwrap(), vec![1u8; 10]);

    // The slot now grows from the current end of file
    archive.emplace(&[5u8; 8], "z.bin", CompressionLevel::NONE, 0).unwrap();
    let z = archive.entry_by_path("z.bin").unwrap();
    assert_eq!(z.offset as u64, y_offset + 5);

    let reopened = Archive::open(&path).unwrap();
    assert_eq!(reopened.read("z.bin").unwrap(), vec![5u8; 8]);
    assert_eq!(reopened.read("x.bin").unwrap(), vec![1u8; 10]);
    assert_eq!(reopened.pending_repairs(), 0);
}
