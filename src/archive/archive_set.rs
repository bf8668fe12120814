//! Ordered lookup across several archives
//!
//! A path resolves against the first archive that contains it. Archives of
//! kind [`ArchiveKind::Update`] are searched before every other archive, the
//! most recently added update first, so a patch archive overrides entries of
//! the base archives it was layered on.

use crate::archive::byte_range::ByteRange;
use crate::archive::format::ArchiveKind;
use crate::archive::reader::{Archive, EntryReader};
use crate::error::{Result, WrapError};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ArchiveSet {
    archives: Vec<Archive>,
}

impl ArchiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an archive, returning its position in search order
    pub fn emplace(&mut self, archive: Archive) -> usize {
        let position = match archive.kind() {
            ArchiveKind::Update => 0,
            ArchiveKind::File | ArchiveKind::None => self.archives.len(),
        };

        debug!(
            name = archive.name(),
            kind = ?archive.kind(),
            position,
            "Added archive to set"
        );
        self.archives.insert(position, archive);
        position
    }

    /// Open the archive at `path` and add it
    pub fn emplace_path<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let archive = Archive::open(path)?;
        Ok(self.emplace(archive))
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    /// Archive at `index` in search order
    pub fn get(&self, index: usize) -> Option<&Archive> {
        self.archives.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Archive> {
        self.archives.get_mut(index)
    }

    /// Archives in search order
    pub fn iter(&self) -> impl Iterator<Item = &Archive> {
        self.archives.iter()
    }

    /// First archive containing `path`
    pub fn find_by_path(&self, path: &str) -> Option<&Archive> {
        self.archives.iter().find(|archive| archive.contains(path))
    }

    pub fn find_by_path_mut(&mut self, path: &str) -> Option<&mut Archive> {
        self.archives.iter_mut().find(|archive| archive.contains(path))
    }

    /// First archive whose header name is `name`
    pub fn find_by_name(&self, name: &str) -> Option<&Archive> {
        self.archives.iter().find(|archive| archive.name() == name)
    }

    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut Archive> {
        self.archives.iter_mut().find(|archive| archive.name() == name)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.find_by_path(path).is_some()
    }

    fn resolve(&self, path: &str) -> Result<&Archive> {
        self.find_by_path(path)
            .ok_or_else(|| WrapError::EntryNotFound(path.to_string()))
    }

    /// Read `path` from the first archive holding it
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.resolve(path)?.read(path)
    }

    /// Raw stored bytes of `path` from the first archive holding it
    pub fn open_entry(&self, path: &str) -> Result<ByteRange<File>> {
        self.resolve(path)?.open_entry(path)
    }

    pub fn stream(&self, path: &str) -> Result<EntryReader> {
        self.resolve(path)?.stream(path)
    }

    /// Canonical paths visible through the set, each listed once
    pub fn paths(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.archives
            .iter()
            .flat_map(|archive| archive.paths())
            .filter(|path| seen.insert(path.clone()))
            .collect()
    }
}
