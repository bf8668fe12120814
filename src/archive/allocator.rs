//! Slot selection for new entries
//!
//! The entry table never grows, so allocation is a choice among the empty
//! slots that exist. Slots that once held data keep their reserved region and
//! are reused in place, smallest fitting region first. Slots that never held
//! data take fresh space at the end of the data region.

use crate::archive::format::ArchiveEntry;
use crate::error::{Result, WrapError};
use std::collections::BTreeSet;

/// Where a new payload goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Slot index in the entry table
    pub index: u32,
    /// Payload offset in the file
    pub offset: u32,
    /// Bytes reserved at `offset`
    pub reserved_size: u32,
    /// True if an existing reserved region is reused
    pub reused: bool,
}

impl Allocation {
    /// A slot whose existing region is rewritten
    pub fn in_place(index: u32, entry: &ArchiveEntry) -> Self {
        Self {
            index,
            offset: entry.offset,
            reserved_size: entry.reserved_size,
            reused: true,
        }
    }

    /// A slot that takes `reserved_size` fresh bytes at `data_end`
    pub fn grow(index: u32, data_end: u64, reserved_size: u32) -> Result<Self> {
        let end = data_end + reserved_size as u64;
        if end > u32::MAX as u64 {
            return Err(WrapError::TooLarge(end));
        }
        Ok(Self {
            index,
            offset: data_end as u32,
            reserved_size,
            reused: false,
        })
    }
}

/// Tracks empty slots and picks one for each new entry
#[derive(Debug, Clone, Default)]
pub struct SlotAllocator {
    empties: BTreeSet<u32>,
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the empty set from an entry table
    pub fn from_entries(entries: &[ArchiveEntry]) -> Self {
        let empties = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_empty())
            .map(|(index, _)| index as u32)
            .collect();
        Self { empties }
    }

    /// Best empty slot for `requested` bytes.
    ///
    /// A previously reserved slot that fits wins, the smallest such one first.
    /// Otherwise the first never-used slot is chosen.
    pub fn select(&self, entries: &[ArchiveEntry], requested: u32) -> Option<u32> {
        self.best_reserved_fit(entries, requested)
            .or_else(|| self.first_unreserved(entries))
    }

    /// Smallest previously reserved empty slot that can hold `requested` bytes
    pub fn best_reserved_fit(&self, entries: &[ArchiveEntry], requested: u32) -> Option<u32> {
        self.empties
            .iter()
            .copied()
            .filter(|&index| {
                let reserved = entries[index as usize].reserved_size;
                reserved != 0 && reserved >= requested
            })
            .min_by_key(|&index| (entries[index as usize].reserved_size, index))
    }

    fn first_unreserved(&self, entries: &[ArchiveEntry]) -> Option<u32> {
        self.empties
            .iter()
            .copied()
            .find(|&index| entries[index as usize].reserved_size == 0)
    }

    /// Decide placement for `requested` bytes without changing any state
    pub fn plan(&self, entries: &[ArchiveEntry], requested: u32, data_end: u64) -> Result<Allocation> {
        let index = self
            .select(entries, requested)
            .ok_or(WrapError::CapacityExceeded {
                capacity: entries.len() as u32,
            })?;

        let entry = &entries[index as usize];
        if entry.reserved_size != 0 {
            Ok(Allocation::in_place(index, entry))
        } else {
            Allocation::grow(index, data_end, requested)
        }
    }

    /// Mark `index` occupied
    pub fn claim(&mut self, index: u32) {
        self.empties.remove(&index);
    }

    /// Mark `index` empty
    pub fn release(&mut self, index: u32) {
        self.empties.insert(index);
    }

    pub fn is_empty_slot(&self, index: u32) -> bool {
        self.empties.contains(&index)
    }

    /// Number of empty slots
    pub fn empty_count(&self) -> usize {
        self.empties.len()
    }
}
