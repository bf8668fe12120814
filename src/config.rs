//! Archive creation options
//!
//! Options can be built in code or loaded from TOML:
//!
//! ```toml
//! name = "Game"
//! capacity = 256
//! base_path = "assets"
//! content_version = 3
//! kind = "file"
//! ```

use crate::archive::ArchiveKind;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default slot count for a new archive
pub const DEFAULT_CAPACITY: u32 = 64;

fn default_capacity() -> u32 {
    DEFAULT_CAPACITY
}

/// Parameters fixed when an archive is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveOptions {
    /// Human-readable label, not used for addressing
    pub name: String,

    /// Number of entry slots; immutable once written
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Prefix every stored virtual path is relative to
    pub base_path: String,

    /// Caller-defined content revision
    pub content_version: u32,

    pub kind: ArchiveKind,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            capacity: DEFAULT_CAPACITY,
            base_path: String::new(),
            content_version: 0,
            kind: ArchiveKind::File,
        }
    }
}

impl ArchiveOptions {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
            ..Self::default()
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_content_version(mut self, content_version: u32) -> Self {
        self.content_version = content_version;
        self
    }

    pub fn with_kind(mut self, kind: ArchiveKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
