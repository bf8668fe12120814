mod allocator;
mod archive_set;
mod byte_range;
mod compression;
mod format;
mod path_index;
mod reader;
mod writer;

pub use allocator::{Allocation, SlotAllocator};
pub use archive_set::ArchiveSet;
pub use byte_range::ByteRange;
pub use compression::{bounded_size, compress, decompress, CompressionLevel};
pub use format::{
    data_start, entry_offset, ArchiveEntry, ArchiveHeader, ArchiveKind, FixedString,
    BASE_PATH_SIZE, ENTRY_PATH_SIZE, ENTRY_SIZE, FORMAT_VERSION, HEADER_SIZE, MAGIC_NUMBER,
    NAME_SIZE, WRAP_EXTENSION,
};
pub use path_index::{normalize_path, PathIndex};
pub use reader::{Archive, EntryReader};
