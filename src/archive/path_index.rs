use std::collections::HashMap;

/// Normalize path to forward slashes, dropping empty and `.` segments
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Maps canonical virtual paths to entry table slots.
///
/// A canonical path always starts with the archive base path; entries store
/// the remainder.
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    base: String,
    slots: HashMap<String, u32>,
}

impl PathIndex {
    pub fn new(base_path: &str) -> Self {
        Self {
            base: normalize_path(base_path),
            slots: HashMap::new(),
        }
    }

    pub fn with_capacity(base_path: &str, capacity: usize) -> Self {
        Self {
            base: normalize_path(base_path),
            slots: HashMap::with_capacity(capacity),
        }
    }

    /// Normalized base path, without a trailing slash
    pub fn base(&self) -> &str {
        &self.base
    }

    fn has_base(&self, path: &str) -> bool {
        path == self.base
            || (path.len() > self.base.len()
                && path.starts_with(&self.base)
                && path.as_bytes()[self.base.len()] == b'/')
    }

    /// Prefix `path` with the base path unless it already starts with it
    pub fn canonicalize(&self, path: &str) -> String {
        let path = normalize_path(path);
        if self.base.is_empty() || path.is_empty() || self.has_base(&path) {
            path
        } else {
            format!("{}/{}", self.base, path)
        }
    }

    /// Strip one leading base path, if present
    pub fn relativize(&self, path: &str) -> String {
        let path = normalize_path(path);
        if self.base.is_empty() || !self.has_base(&path) {
            return path;
        }
        path[self.base.len()..].trim_start_matches('/').to_string()
    }

    /// Canonical key for a path stored relative to the base
    pub fn join(&self, stored: &str) -> String {
        if self.base.is_empty() || stored.is_empty() {
            stored.to_string()
        } else {
            format!("{}/{}", self.base, stored)
        }
    }

    /// Slot holding `path`, after canonicalization
    pub fn lookup(&self, path: &str) -> Option<u32> {
        self.get(&self.canonicalize(path))
    }

    /// Slot holding an already-canonical key
    pub fn get(&self, key: &str) -> Option<u32> {
        self.slots.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Map `key` to `slot`, returning the slot it previously mapped to
    pub fn insert(&mut self, key: String, slot: u32) -> Option<u32> {
        self.slots.insert(key, slot)
    }

    pub fn remove(&mut self, key: &str) -> Option<u32> {
        self.slots.remove(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.slots.iter().map(|(path, &slot)| (path.as_str(), slot))
    }
}
