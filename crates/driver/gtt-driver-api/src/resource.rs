//! Hardware resource types representing exclusive claims on MMIO regions.

use core::fmt;

use gtt_core::{PhysAddr, VirtAddr};

/// Caching policy requested for a kernel MMIO mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Strong uncached: register windows.
    Uncached,
    /// Write-combined: translation tables written in bulk.
    WriteCombining,
}

/// An access that would fall outside its [`MmioRegion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    /// Byte offset of the rejected access.
    pub offset: u64,
    /// Access width in bytes.
    pub width: u64,
    /// Size of the region.
    pub size: u64,
}

impl fmt::Display for OutOfBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-byte access at {:#x} outside {:#x}-byte region",
            self.width, self.offset, self.size
        )
    }
}

/// An exclusive claim on a memory-mapped I/O region.
///
/// Not `Clone`: the claim is released by handing the value back to
/// `KernelServices::unmap_mmio`, so each mapping is released once.
#[derive(Debug, PartialEq, Eq)]
pub struct MmioRegion {
    phys_base: PhysAddr,
    virt_base: VirtAddr,
    size: u64,
}

impl MmioRegion {
    /// Creates a new MMIO region descriptor.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `phys_base` and `virt_base` refer to the same physical region.
    /// - The region is not claimed by another driver.
    /// - The virtual mapping is valid for the lifetime of the region.
    #[must_use]
    pub const unsafe fn new(phys_base: PhysAddr, virt_base: VirtAddr, size: u64) -> Self {
        Self {
            phys_base,
            virt_base,
            size,
        }
    }

    /// Returns the physical base address.
    #[must_use]
    pub const fn phys_base(&self) -> PhysAddr {
        self.phys_base
    }

    /// Returns the virtual base address.
    #[must_use]
    pub const fn virt_base(&self) -> VirtAddr {
        self.virt_base
    }

    /// Returns the size of the region in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns `true` if a `width`-byte access at `offset` lies inside the
    /// region and is naturally aligned.
    #[must_use]
    pub const fn contains(&self, offset: u64, width: u64) -> bool {
        offset % width == 0 && offset < self.size && width <= self.size - offset
    }

    fn check(&self, offset: u64, width: u64) -> Result<*mut u8, OutOfBounds> {
        if self.contains(offset, width) {
            Ok((self.virt_base.as_u64() + offset) as *mut u8)
        } else {
            Err(OutOfBounds {
                offset,
                width,
                size: self.size,
            })
        }
    }

    /// Volatile byte read at `offset`.
    pub fn read_u8(&self, offset: u64) -> Result<u8, OutOfBounds> {
        let ptr = self.check(offset, 1)?;
        // SAFETY: `check` verified the byte lies inside the mapping.
        Ok(unsafe { core::ptr::read_volatile(ptr) })
    }

    /// Volatile dword read at `offset`.
    pub fn read_u32(&self, offset: u64) -> Result<u32, OutOfBounds> {
        let ptr = self.check(offset, 4)?;
        // SAFETY: `check` verified the dword lies inside the mapping and is aligned.
        Ok(unsafe { core::ptr::read_volatile(ptr.cast::<u32>()) })
    }

    /// Volatile dword write at `offset`.
    pub fn write_u32(&self, offset: u64, value: u32) -> Result<(), OutOfBounds> {
        let ptr = self.check(offset, 4)?;
        // SAFETY: `check` verified the dword lies inside the mapping and is aligned.
        unsafe { core::ptr::write_volatile(ptr.cast::<u32>(), value) };
        Ok(())
    }
}
