//! Wrap-rs: fixed-capacity packed archives
//!
//! A `.wrap` file is a single binary container holding many named,
//! optionally compressed blobs:
//! - A fixed header (signature, kind, versions, base path, name, capacity)
//! - An entry table with one fixed-size slot per possible entry
//! - A data region that grows as payloads are added
//!
//! The slot count is fixed at creation. Replacing an entry rewrites its
//! reserved region in place when the new payload fits, and slots emptied by
//! [`Archive::remove`] are reused best-fit. Each entry can be read as a
//! standalone stream through a [`ByteRange`] view of the archive file.
//!
//! # Example
//!
//! ```no_run
//! use wrap_rs::{Archive, CompressionLevel};
//!
//! // Create an archive with room for 4 entries
//! let mut archive = Archive::create("game.wrap", "Game", 4, "assets", 1)?;
//! archive.emplace(b"Hello, World!", "assets/hello.txt", CompressionLevel::FAST, 0)?;
//!
//! // Read it back
//! let archive = Archive::open("game.wrap")?;
//! assert!(archive.contains("assets/hello.txt"));
//! let data = archive.read("hello.txt")?;
//! # Ok::<(), wrap_rs::error::WrapError>(())
//! ```

// Core modules
pub mod archive;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use archive::{
    Archive, ArchiveEntry, ArchiveHeader, ArchiveKind, ArchiveSet, ByteRange, CompressionLevel,
    EntryReader, ENTRY_SIZE, FORMAT_VERSION, HEADER_SIZE, MAGIC_NUMBER, WRAP_EXTENSION,
};
pub use config::ArchiveOptions;
pub use error::{Result, WrapError};
