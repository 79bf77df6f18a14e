//! Per-generation driver variants.
//!
//! Every generation difference the driver cares about is answered by a
//! `match` on [`GttVariant`]: register window layout, table location,
//! entry encoding, flag classification and chipset flushing.

use gtt_core::{PhysAddr, kwarn};
use gtt_driver_api::{CacheMode, GttError, KernelServices, MmioRegion, PciConfigSpace};

use super::pte::{self, PteAddrLayout, PteFlags};
use super::regs::{
    GttRegs, Hic, I810_MMADDR, I810_MMIO_SIZE, I810_PTE_BASE, I915_MMADDR, I915_MMIO_SIZE,
    I915_PTEADDR, MMADDR_MASK, PgetblCtl,
};

/// Pages backing the i81x graphics aperture translation table (64 KiB).
pub const I81X_GATT_PAGES: usize = 16;

/// Intel GTT hardware generation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GttVariant {
    /// i810 / i815.
    I81x,
    /// 830M, 845G, 852GM/855GM, 865G.
    I8xx,
    /// 915G/GM, 945G/GM/GME, E7221.
    I915,
    /// G33, Q33, Q35.
    G33,
    /// Pineview (Atom D4xx/N4xx).
    Pineview,
    /// 946GZ, 965G/Q/GM/GME, G35.
    I965,
    /// GM45, G45, Q45, G41, B43, Eaglelake.
    G4x,
    /// First generation Core integrated graphics.
    Ironlake,
    /// Second generation Core integrated graphics.
    Sandybridge,
}

/// Static capability description of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantInfo {
    /// Hardware generation.
    pub generation: u8,
    /// G33-style table sizing on a gen 3 part.
    pub is_g33: bool,
    /// Pineview.
    pub is_pineview: bool,
    /// Ironlake.
    pub is_ironlake: bool,
    /// `PGETBL_CTL` carries an enable bit that must be set and verified.
    pub has_pgtbl_enable: bool,
    /// Width of device DMA addresses.
    pub dma_mask_size: u8,
}

impl VariantInfo {
    const fn new(generation: u8, has_pgtbl_enable: bool, dma_mask_size: u8) -> Self {
        Self {
            generation,
            is_g33: false,
            is_pineview: false,
            is_ironlake: false,
            has_pgtbl_enable,
            dma_mask_size,
        }
    }
}

/// Where the translation table lives once the register window is mapped.
#[derive(Debug)]
pub struct VariantResources {
    /// Graphics MMIO register window.
    pub registers: MmioRegion,
    /// Physical address of the translation table.
    pub table_phys: PhysAddr,
    /// i81x GATT backing pages.
    pub gatt: Option<PhysAddr>,
}

impl GttVariant {
    /// Returns the static capability description.
    #[must_use]
    pub const fn info(self) -> VariantInfo {
        match self {
            Self::I81x => VariantInfo::new(1, true, 32),
            Self::I8xx => VariantInfo::new(2, true, 32),
            Self::I915 => VariantInfo::new(3, true, 32),
            Self::G33 => VariantInfo {
                is_g33: true,
                ..VariantInfo::new(3, false, 36)
            },
            Self::Pineview => VariantInfo {
                is_g33: true,
                is_pineview: true,
                ..VariantInfo::new(3, false, 36)
            },
            Self::I965 => VariantInfo::new(4, true, 36),
            Self::G4x => VariantInfo::new(5, false, 36),
            Self::Ironlake => VariantInfo {
                is_ironlake: true,
                ..VariantInfo::new(5, false, 36)
            },
            Self::Sandybridge => VariantInfo::new(6, false, 40),
        }
    }

    /// Returns the hardware generation.
    #[must_use]
    pub const fn generation(self) -> u8 {
        self.info().generation
    }

    /// Returns how page addresses are folded into entries.
    #[must_use]
    pub const fn pte_layout(self) -> PteAddrLayout {
        match self {
            Self::I81x | Self::I8xx | Self::I915 => PteAddrLayout::Direct,
            Self::G33 | Self::Pineview | Self::I965 | Self::G4x | Self::Ironlake => {
                PteAddrLayout::High4
            }
            Self::Sandybridge => PteAddrLayout::High8,
        }
    }

    /// Returns `true` if the table size comes from `PGETBL_CTL`.
    #[must_use]
    pub const fn sizes_from_pgetbl(self) -> bool {
        let info = self.info();
        info.is_g33 || info.generation == 4 || info.generation == 5
    }

    /// Classifies caller memory-type flags into an entry template.
    #[must_use]
    pub fn classify_flags(self, flags: u32) -> Option<PteFlags> {
        match self {
            Self::Sandybridge => pte::classify_gen6(flags),
            _ => pte::classify_legacy(flags),
        }
    }

    /// Returns `true` if `flags` names a memory type this variant can map.
    #[must_use]
    pub fn check_flags(self, flags: u32) -> bool {
        self.classify_flags(flags).is_some()
    }

    /// Template for entries pointing at the scratch page: the variant's
    /// normal-memory template.
    #[must_use]
    pub const fn scratch_flags(self) -> PteFlags {
        match self {
            Self::Sandybridge => pte::GEN6_NORMAL,
            _ => pte::LEGACY_NORMAL,
        }
    }

    /// Encodes one translation entry.
    #[must_use]
    pub fn encode(self, addr: PhysAddr, flags: PteFlags) -> u32 {
        pte::encode(self.pte_layout(), addr, flags)
    }

    /// Decodes the page address of one translation entry.
    #[must_use]
    pub fn decode(self, pte: u32) -> PhysAddr {
        pte::decode(self.pte_layout(), pte)
    }

    /// Register BAR offset and window length.
    const fn register_window(self) -> (u16, u64) {
        match self.generation() {
            1 | 2 => (I810_MMADDR, I810_MMIO_SIZE),
            _ => (I915_MMADDR, I915_MMIO_SIZE),
        }
    }

    /// Offset of the translation table from the register BAR, `None` when
    /// the table has its own BAR.
    const fn table_offset(self) -> Option<u64> {
        match self.generation() {
            1 | 2 => Some(I810_PTE_BASE),
            3 => None,
            4 => Some(512 * 1024),
            _ => Some(2 * 1024 * 1024),
        }
    }

    /// Maps the register window and locates the translation table.
    ///
    /// On i81x this also allocates the GATT pages and points `PGETBL_CTL`
    /// at them. Whatever was acquired before a failure is released again.
    pub fn setup(
        self,
        graphics: &dyn PciConfigSpace,
        services: &dyn KernelServices,
    ) -> Result<VariantResources, GttError> {
        let (bar, size) = self.register_window();
        let reg_addr = graphics.read_u32(bar)? & MMADDR_MASK;
        let reg_phys = PhysAddr::new(u64::from(reg_addr));

        let table_phys = match self.table_offset() {
            Some(offset) => reg_phys + offset,
            None => PhysAddr::new(u64::from(graphics.read_u32(I915_PTEADDR)?)),
        };

        let registers = services.map_mmio(reg_phys, size, CacheMode::Uncached)?;

        let gatt = if self == Self::I81x {
            match setup_gatt(&registers, services) {
                Ok(gatt) => Some(gatt),
                Err(err) => {
                    services.unmap_mmio(registers);
                    return Err(err);
                }
            }
        } else {
            None
        };

        Ok(VariantResources {
            registers,
            table_phys,
            gatt,
        })
    }

    /// Undoes variant-specific setup: on i81x, disables the GATT and frees
    /// its pages. The register window itself is unmapped by the caller.
    pub fn cleanup(
        self,
        registers: Option<&MmioRegion>,
        gatt: Option<PhysAddr>,
        services: &dyn KernelServices,
    ) {
        if self != Self::I81x {
            return;
        }
        if let Some(regs) = registers.and_then(GttRegs::new) {
            regs.set_pgetbl_ctl(PgetblCtl::empty());
        }
        if let Some(gatt) = gatt {
            // SAFETY: translation through the GATT is disabled and the pages
            // came from `alloc_frames(I81X_GATT_PAGES)` in `setup`.
            unsafe { services.free_frames(gatt, I81X_GATT_PAGES) };
        }
    }

    /// Flushes chipset write buffers so entry writes reach memory.
    pub fn chipset_flush(self, regs: &GttRegs<'_>, timeout_spins: u32) {
        match self.generation() {
            2 => {
                regs.modify_hic(|hic| hic | Hic::FLUSH);
                let mut spins = 0;
                while regs.hic().contains(Hic::FLUSH) {
                    if spins >= timeout_spins {
                        kwarn!("intel-gtt: chipset flush timed out");
                        return;
                    }
                    spins += 1;
                    core::hint::spin_loop();
                }
            }
            3..=5 => regs.set_gfx_flsh_cntl(0),
            _ => {}
        }
    }
}

/// Allocates the i81x GATT and enables translation through it.
fn setup_gatt(registers: &MmioRegion, services: &dyn KernelServices) -> Result<PhysAddr, GttError> {
    let regs = GttRegs::new(registers).ok_or(GttError::Mapping {
        phys: registers.phys_base().as_u64(),
        size: registers.size(),
    })?;
    let gatt = services.alloc_frames(I81X_GATT_PAGES)?;
    let Ok(base) = u32::try_from(gatt.as_u64()) else {
        kwarn!("intel-gtt: GATT at {gatt} is beyond 32-bit reach");
        // SAFETY: the pages were just allocated and nothing references them.
        unsafe { services.free_frames(gatt, I81X_GATT_PAGES) };
        return Err(GttError::ResourceExhausted);
    };
    regs.set_pgetbl_ctl(PgetblCtl::from_bits_retain(base) | PgetblCtl::ENABLED);
    Ok(gatt)
}
