//! The mapped translation table.

use core::ops::Range;
use core::sync::atomic::{Ordering, fence};

use gtt_core::PhysAddr;
use gtt_driver_api::{CacheMode, GttError, KernelServices, MmioRegion};

/// Bytes per translation entry.
pub const PTE_BYTES: u64 = 4;

/// Owns the write-combined mapping of the translation table.
///
/// The mapping is exactly `entries * 4` bytes long.
#[derive(Debug)]
pub struct TranslationTable {
    region: MmioRegion,
    entries: u32,
}

impl TranslationTable {
    /// Maps a table of `entries` entries at `phys`.
    pub fn map(
        services: &dyn KernelServices,
        phys: PhysAddr,
        entries: u32,
    ) -> Result<Self, GttError> {
        let size = u64::from(entries) * PTE_BYTES;
        let region = services.map_mmio(phys, size, CacheMode::WriteCombining)?;
        if region.size() != size {
            services.unmap_mmio(region);
            return Err(GttError::Mapping {
                phys: phys.as_u64(),
                size,
            });
        }
        Ok(Self { region, entries })
    }

    /// Releases the mapping.
    pub fn unmap(self, services: &dyn KernelServices) {
        services.unmap_mmio(self.region);
    }

    /// Number of entries.
    #[must_use]
    pub const fn entries(&self) -> u32 {
        self.entries
    }

    /// Physical address of the table.
    #[must_use]
    pub const fn phys(&self) -> PhysAddr {
        self.region.phys_base()
    }

    /// Stores one raw entry.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`entries`](Self::entries).
    pub fn write(&self, index: u32, pte: u32) {
        if let Err(err) = self.region.write_u32(u64::from(index) * PTE_BYTES, pte) {
            panic!("translation entry {index} out of range: {err}");
        }
    }

    /// Loads one raw entry.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`entries`](Self::entries).
    #[must_use]
    pub fn read(&self, index: u32) -> u32 {
        match self.region.read_u32(u64::from(index) * PTE_BYTES) {
            Ok(pte) => pte,
            Err(err) => panic!("translation entry {index} out of range: {err}"),
        }
    }

    /// Stores `pte` into every entry of `range`, then posts the writes.
    ///
    /// # Panics
    ///
    /// Panics if `range` extends past the table.
    pub fn fill(&self, range: Range<u32>, pte: u32) {
        Self::check_range(&range, self.entries);
        for index in range.clone() {
            self.write(index, pte);
        }
        self.post(range);
    }

    /// Orders the entry writes of `range` before anything that follows and
    /// flushes them out of the write-combining buffer with a posting read
    /// of the last entry.
    pub fn post(&self, range: Range<u32>) {
        fence(Ordering::SeqCst);
        if let Some(last) = range.end.checked_sub(1).filter(|&last| last >= range.start) {
            let _ = self.read(last);
        }
    }

    /// Asserts that `range` lies inside a table of `entries` entries.
    ///
    /// # Panics
    ///
    /// Panics if `range` is inverted or extends past `entries`.
    pub(crate) fn check_range(range: &Range<u32>, entries: u32) {
        assert!(
            range.start <= range.end && range.end <= entries,
            "entry range {range:?} outside table of {entries} entries"
        );
    }
}
