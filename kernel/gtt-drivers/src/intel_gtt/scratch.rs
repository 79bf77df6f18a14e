//! The page every unbound translation entry points at.

use gtt_core::PhysAddr;
use gtt_driver_api::{GttError, KernelServices};

/// One physical page owned by the driver for its whole lifetime.
///
/// Not `Clone`: [`ScratchPage::free`] consumes it, so the page is returned
/// to the allocator exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct ScratchPage {
    phys: PhysAddr,
}

impl ScratchPage {
    /// Allocates the scratch page.
    pub fn alloc(services: &dyn KernelServices) -> Result<Self, GttError> {
        let phys = services.alloc_frames(1)?;
        Ok(Self { phys })
    }

    /// Physical address written into unbound entries.
    #[must_use]
    pub const fn phys(&self) -> PhysAddr {
        self.phys
    }

    /// Returns the page to the allocator.
    ///
    /// The translation table must no longer reference it, i.e. the table
    /// has been unmapped or re-pointed.
    pub fn free(self, services: &dyn KernelServices) {
        // SAFETY: the page came from `alloc_frames(1)` and the caller
        // guarantees the table no longer reaches it.
        unsafe { services.free_frames(self.phys, 1) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intel_gtt::testing::FakeServices;

    #[test]
    fn alloc_and_free_once() {
        let services = FakeServices::new();
        let page = ScratchPage::alloc(&services).unwrap();
        let phys = page.phys();
        assert!(phys.is_page_aligned());
        page.free(&services);
        assert_eq!(services.allocations(), vec![(phys.as_u64(), 1)]);
        assert_eq!(services.frees(), vec![(phys.as_u64(), 1)]);
    }

    #[test]
    fn exhaustion_is_reported() {
        let services = FakeServices::new();
        services.fail_alloc_after(0);
        assert_eq!(ScratchPage::alloc(&services), Err(GttError::ResourceExhausted));
    }
}
