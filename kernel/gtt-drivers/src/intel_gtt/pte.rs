//! Translation entry encoding.
//!
//! Callers describe memory with AGP memory-type flags. Those are classified
//! once per variant into a [`PteFlags`] template, so the write path only
//! ever sees flag words the hardware accepts.

use gtt_core::PhysAddr;

// ---------------------------------------------------------------------------
// Caller-facing memory types
// ---------------------------------------------------------------------------

/// Ordinary memory.
pub const AGP_NORMAL_MEMORY: u32 = 0;
/// Physically contiguous memory (cursor, overlay).
pub const AGP_PHYS_MEMORY: u32 = 2;
/// Base of the user memory type range.
pub const AGP_USER_TYPES: u32 = 1 << 16;
/// User memory, uncached.
pub const AGP_USER_MEMORY: u32 = AGP_USER_TYPES;
/// User memory, snooped.
pub const AGP_USER_CACHED_MEMORY: u32 = AGP_USER_TYPES + 1;
/// User memory cached in LLC and MLC (gen 6).
pub const AGP_USER_CACHED_MEMORY_LLC_MLC: u32 = AGP_USER_TYPES + 2;
/// User memory, explicitly uncached.
pub const AGP_USER_UNCACHED_MEMORY: u32 = AGP_USER_TYPES + 4;
/// Graphics flush data type modifier for cached types (gen 6).
pub const AGP_USER_CACHED_MEMORY_GFDT: u32 = 1 << 3;

// ---------------------------------------------------------------------------
// Hardware entry bits
// ---------------------------------------------------------------------------

/// Entry is valid.
pub const I810_PTE_VALID: u32 = 0x1;
/// Entry maps snooped system memory.
pub const I830_PTE_SYSTEM_CACHED: u32 = 0x6;
/// gen 6: uncached.
pub const GEN6_PTE_UNCACHED: u32 = 1 << 1;
/// gen 6: cached in LLC.
pub const GEN6_PTE_LLC: u32 = 2 << 1;
/// gen 6: cached in LLC and MLC.
pub const GEN6_PTE_LLC_MLC: u32 = 3 << 1;
/// gen 6: graphics flush data type.
pub const GEN6_PTE_GFDT: u32 = 1 << 3;

/// Page address bits of an entry.
const PTE_ADDR_MASK: u32 = 0xffff_f000;

/// How page address bits above 31 are folded into an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PteAddrLayout {
    /// 32-bit addresses only.
    Direct,
    /// Bits 32..35 land in entry bits 4..7.
    High4,
    /// Bits 32..39 land in entry bits 4..11.
    High8,
}

impl PteAddrLayout {
    /// Mask of the entry bits holding the folded high address bits.
    const fn high_mask(self) -> u32 {
        match self {
            Self::Direct => 0,
            Self::High4 => 0xf0,
            Self::High8 => 0xff0,
        }
    }

    /// Number of physical address bits an entry can express.
    #[must_use]
    pub const fn address_bits(self) -> u32 {
        match self {
            Self::Direct => 32,
            Self::High4 => 36,
            Self::High8 => 40,
        }
    }
}

/// A validated entry flag template for one variant.
///
/// Only produced by classification, which is why entry writes cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PteFlags(u32);

impl PteFlags {
    /// Raw flag bits ORed into the entry.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

/// Pre-gen 6 template for normal memory.
pub(crate) const LEGACY_NORMAL: PteFlags = PteFlags(I810_PTE_VALID);
/// Pre-gen 6 template for snooped memory.
const LEGACY_CACHED: PteFlags = PteFlags(I810_PTE_VALID | I830_PTE_SYSTEM_CACHED);
/// gen 6 template for normal memory: cached in LLC.
pub(crate) const GEN6_NORMAL: PteFlags = PteFlags(GEN6_PTE_LLC | I810_PTE_VALID);

/// Classifies pre-gen 6 memory types.
///
/// Normal, physical and user memory map as plain valid entries; user
/// cached memory adds the snoop bits.
pub(crate) fn classify_legacy(flags: u32) -> Option<PteFlags> {
    match flags {
        AGP_NORMAL_MEMORY | AGP_PHYS_MEMORY | AGP_USER_MEMORY => Some(LEGACY_NORMAL),
        AGP_USER_CACHED_MEMORY => Some(LEGACY_CACHED),
        _ => None,
    }
}

/// Classifies gen 6 memory types into the uncached, LLC/MLC and LLC
/// templates. GFDT is honored on the cached templates only.
pub(crate) fn classify_gen6(flags: u32) -> Option<PteFlags> {
    let gfdt = flags & AGP_USER_CACHED_MEMORY_GFDT != 0;
    let gfdt_bit = if gfdt { GEN6_PTE_GFDT } else { 0 };

    match flags & !AGP_USER_CACHED_MEMORY_GFDT {
        AGP_USER_MEMORY | AGP_USER_UNCACHED_MEMORY if !gfdt => {
            Some(PteFlags(GEN6_PTE_UNCACHED | I810_PTE_VALID))
        }
        AGP_USER_CACHED_MEMORY_LLC_MLC => {
            Some(PteFlags(GEN6_PTE_LLC_MLC | I810_PTE_VALID | gfdt_bit))
        }
        AGP_NORMAL_MEMORY | AGP_USER_CACHED_MEMORY => Some(PteFlags(GEN6_NORMAL.0 | gfdt_bit)),
        _ => None,
    }
}

/// Encodes a page address and flag template into an entry.
///
/// `addr` must be page aligned and within [`PteAddrLayout::address_bits`].
#[must_use]
pub fn encode(layout: PteAddrLayout, addr: PhysAddr, flags: PteFlags) -> u32 {
    debug_assert!(addr.is_page_aligned(), "unaligned page address {addr}");
    debug_assert!(
        addr.fits_in_bits(layout.address_bits()),
        "page address {addr} too wide for {layout:?}"
    );
    let raw = addr.as_u64();
    let folded = (raw >> 28) as u32 & layout.high_mask();
    (raw as u32 & PTE_ADDR_MASK) | folded | flags.bits()
}

/// Recovers the page address from an entry.
#[must_use]
pub fn decode(layout: PteAddrLayout, pte: u32) -> PhysAddr {
    let low = u64::from(pte & PTE_ADDR_MASK);
    let high = u64::from(pte & layout.high_mask()) << 28;
    PhysAddr::new(high | low)
}
