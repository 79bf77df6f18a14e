//! Intel GMCH / integrated graphics register definitions.
//!
//! Three register spaces are involved: the host bridge's PCI configuration
//! space (aperture and stolen-memory control), the graphics function's PCI
//! configuration space (BAR addresses, gen 6 memory control) and the
//! graphics MMIO window mapped from `MMADDR`.

use bitflags::bitflags;
use gtt_mmio::register_block;

// ---------------------------------------------------------------------------
// Host bridge configuration space
// ---------------------------------------------------------------------------

/// i81x system management RAM control (dword).
pub const I810_SMRAM_MISCC: u16 = 0x70;
/// `SMRAM_MISCC` graphics window size bit: set selects a 32M window.
pub const I810_GFX_MEM_WIN_SIZE: u32 = 0x0001_0000;

/// Graphics memory controller hub control (word).
pub const I830_GMCH_CTRL: u16 = 0x52;

/// i830-family stolen memory field.
pub const I830_GMCH_GMS_MASK: u16 = 0x70;
/// Stolen memory lives in local RDRAM.
pub const I830_GMCH_GMS_LOCAL: u16 = 0x10;
/// 512K stolen.
pub const I830_GMCH_GMS_STOLEN_512: u16 = 0x20;
/// 1M stolen.
pub const I830_GMCH_GMS_STOLEN_1024: u16 = 0x30;
/// 8M stolen.
pub const I830_GMCH_GMS_STOLEN_8192: u16 = 0x40;

/// i855-and-later stolen memory field.
pub const I855_GMCH_GMS_MASK: u16 = 0xf0;

/// G4x/Ironlake translation table size field.
pub const G4X_GMCH_SIZE_MASK: u16 = 0xf << 8;
/// 1M table.
pub const G4X_GMCH_SIZE_1M: u16 = 0x1 << 8;
/// 2M table.
pub const G4X_GMCH_SIZE_2M: u16 = 0x3 << 8;
/// Virtualization-enabled variants of the size field.
pub const G4X_GMCH_SIZE_VT_EN: u16 = 0x8 << 8;
/// 1M table with VT.
pub const G4X_GMCH_SIZE_VT_1M: u16 = G4X_GMCH_SIZE_VT_EN | G4X_GMCH_SIZE_1M;
/// 1.5M table with VT.
pub const G4X_GMCH_SIZE_VT_1_5M: u16 = G4X_GMCH_SIZE_VT_EN | (0x2 << 8);
/// 2M table with VT.
pub const G4X_GMCH_SIZE_VT_2M: u16 = G4X_GMCH_SIZE_VT_EN | G4X_GMCH_SIZE_2M;

bitflags! {
    /// `GMCH_CTRL` single-bit fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GmchCtrl: u16 {
        /// i830: aperture is 64M (clear: 128M).
        const MEM_64M = 1 << 0;
        /// Graphics translation through the GMCH is enabled.
        const ENABLED = 1 << 2;
    }
}

// ---------------------------------------------------------------------------
// Graphics function configuration space
// ---------------------------------------------------------------------------

/// gen 1-2 aperture BAR.
pub const I810_GMADDR: u16 = 0x10;
/// gen 1-2 register BAR.
pub const I810_MMADDR: u16 = 0x14;
/// gen 3+ register BAR.
pub const I915_MMADDR: u16 = 0x10;
/// gen 3+ aperture BAR.
pub const I915_GMADDR: u16 = 0x18;
/// gen 3 translation table BAR.
pub const I915_PTEADDR: u16 = 0x1c;

/// Memory BAR address mask.
pub const PCI_BASE_ADDRESS_MEM_MASK: u32 = !0xf;
/// Register BAR alignment mask (512K).
pub const MMADDR_MASK: u32 = 0xfff8_0000;

/// Sandybridge memory control (word).
pub const SNB_GMCH_CTRL: u16 = 0x50;
/// Translation table size field.
pub const SNB_GTT_SIZE_MASK: u16 = 3 << 8;
/// 1M table.
pub const SNB_GTT_SIZE_1M: u16 = 1 << 8;
/// 2M table.
pub const SNB_GTT_SIZE_2M: u16 = 2 << 8;
/// Stolen memory field, 32M per step.
pub const SNB_GMCH_GMS_STOLEN_MASK: u16 = 0xf8;
/// Bit position of the stolen memory field.
pub const SNB_GMCH_GMS_SHIFT: u16 = 3;

// ---------------------------------------------------------------------------
// MMIO window
// ---------------------------------------------------------------------------

/// Offset of the gen 1-2 translation table from the register BAR.
pub const I810_PTE_BASE: u64 = 0x1_0000;
/// gen 1-2 register window length.
pub const I810_MMIO_SIZE: u64 = 64 * 1024;
/// gen 3+ register window length.
pub const I915_MMIO_SIZE: u64 = 512 * 1024;

/// `PGETBL_CTL` size field values (gen 4+, G33).
pub const I965_PGETBL_SIZE_512KB: u32 = 0 << 1;
/// 256K table.
pub const I965_PGETBL_SIZE_256KB: u32 = 1 << 1;
/// 128K table.
pub const I965_PGETBL_SIZE_128KB: u32 = 2 << 1;
/// 1M table.
pub const I965_PGETBL_SIZE_1MB: u32 = 3 << 1;
/// 2M table.
pub const I965_PGETBL_SIZE_2MB: u32 = 4 << 1;
/// 1.5M table.
pub const I965_PGETBL_SIZE_1_5MB: u32 = 5 << 1;

/// i830 RDRAM: number of devices per channel, minus one.
pub const fn i830_rdram_nd(rdct: u8) -> u8 {
    (rdct & 0x20) >> 5
}

/// i830 RDRAM: device density index.
pub const fn i830_rdram_ddt(rdct: u8) -> u8 {
    (rdct & 0x18) >> 3
}

register_block! {
    /// Graphics MMIO registers used for translation table control.
    pub GttRegs {
        /// Host interface control (gen 2 chipset flush).
        [0x0070; u32; rw] hic => Hic,
        /// Page table control: table base, size and enable.
        [0x2020; u32; rw] pgetbl_ctl => PgetblCtl,
        /// Per-process table control (gen 4+).
        [0x20c4; u32; rw] pgetbl_ctl2 => PgetblCtl,
        /// Chipset write buffer flush (gen 3+).
        [0x2170; u32; wo] gfx_flsh_cntl,
        /// RDRAM channel type (830M / 845G local memory).
        [0x3010; u8; ro] rdram_channel_type,
    }
}

/// Name used in diagnostics for [`GttRegs::pgetbl_ctl`].
pub const PGETBL_CTL_NAME: &str = "PGETBL_CTL";
/// Name used in diagnostics for [`I830_GMCH_CTRL`].
pub const GMCH_CTRL_NAME: &str = "GMCH_CTRL";

bitflags! {
    /// `PGETBL_CTL` / `PGETBL_CTL2` fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PgetblCtl: u32 {
        /// Translation through the table is enabled.
        const ENABLED = 1 << 0;
        /// Table size field (G33, gen 4+).
        const SIZE = 0x7 << 1;
    }
}

bitflags! {
    /// `HIC` fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Hic: u32 {
        /// Flush chipset write buffers; hardware clears it when done.
        const FLUSH = 1 << 31;
    }
}
