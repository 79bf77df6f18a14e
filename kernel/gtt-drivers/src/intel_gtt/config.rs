//! Build-time tunables for the Intel GTT driver.

/// Route page addresses through the IOMMU-aware DMA API.
///
/// Off unless the kernel is built with DMA remapping support.
pub const USE_DMA_API: bool = false;

/// Spins allowed for the gen 2 `HIC` flush bit to clear.
pub const FLUSH_TIMEOUT_SPINS: u32 = 1000;

/// Driver configuration handed to [`IntelGtt::probe`](super::IntelGtt::probe).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GttConfig {
    /// Page addresses written into the table come from the DMA API, which
    /// on gen 3+ may hand out addresses above 4 GiB.
    pub use_dma_api: bool,
    /// Upper bound on polls of the gen 2 chipset flush bit.
    pub flush_timeout_spins: u32,
    /// Point every entry back at the scratch page before teardown releases
    /// the table.
    pub scrub_on_teardown: bool,
}

impl Default for GttConfig {
    fn default() -> Self {
        Self {
            use_dma_api: USE_DMA_API,
            flush_timeout_spins: FLUSH_TIMEOUT_SPINS,
            scrub_on_teardown: false,
        }
    }
}
