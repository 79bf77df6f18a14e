//! Kernel service contracts for drivers.
//!
//! Drivers use [`KernelServices`] to map register and table regions and to
//! allocate physical frames without depending on the kernel crate directly.

use gtt_core::PhysAddr;

use crate::error::GttError;
use crate::resource::{CacheMode, MmioRegion};

/// Trait providing kernel services to drivers.
///
/// Implemented by the kernel and passed to drivers during probe. Every
/// region returned by [`map_mmio`](Self::map_mmio) must be handed back to
/// [`unmap_mmio`](Self::unmap_mmio) exactly once.
pub trait KernelServices: Send + Sync {
    /// Maps `size` bytes of physical MMIO space at `phys` into kernel
    /// virtual address space with the given caching policy.
    fn map_mmio(&self, phys: PhysAddr, size: u64, mode: CacheMode)
    -> Result<MmioRegion, GttError>;

    /// Tears down a mapping created by [`map_mmio`](Self::map_mmio).
    fn unmap_mmio(&self, region: MmioRegion);

    /// Allocates `count` contiguous, zeroed physical frames.
    ///
    /// Returns the physical base address of the first frame.
    fn alloc_frames(&self, count: usize) -> Result<PhysAddr, GttError>;

    /// Frees frames previously allocated with [`alloc_frames`](Self::alloc_frames).
    ///
    /// # Safety
    ///
    /// The caller must ensure that no device still references these frames
    /// and that `phys` and `count` match a previous allocation.
    unsafe fn free_frames(&self, phys: PhysAddr, count: usize);
}
