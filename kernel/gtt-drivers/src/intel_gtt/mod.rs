//! Intel integrated graphics GTT driver.
//!
//! Drives the graphics translation table of Intel integrated graphics from
//! the i810 through Sandybridge. The table maps the CPU-visible graphics
//! aperture onto arbitrary system pages; [`IntelGtt`] owns the register
//! window, the table mapping and the scratch page that every unbound entry
//! points at.
//!
//! Bring-up order at probe:
//!
//! 1. Identify the chipset from the host bridge.
//! 2. Map the register window and locate the table ([`GttVariant::setup`]).
//! 3. Size the aperture and table.
//! 4. Map the table, detect stolen memory, allocate the scratch page and
//!    point every entry at it.
//! 5. Enable translation.
//!
//! A failure at any step releases everything acquired before it.

pub mod chipset;
pub mod config;
pub mod enable;
pub mod pte;
pub mod regs;
pub mod scratch;
pub mod sizing;
pub mod table;
pub mod variant;

#[cfg(test)]
pub(crate) mod testing;

use core::ops::Range;

use gtt_core::{PhysAddr, kerr, kinfo, ktrace, kwarn};
use gtt_driver_api::{
    ConfigurationError, GttError, KernelServices, MmioRegion, PciConfigSpace, PciFunction,
};

use self::chipset::ChipsetDescriptor;
use self::enable::{EnableController, EnableState};
use self::regs::{GttRegs, I810_GMADDR, I915_GMADDR, PCI_BASE_ADDRESS_MEM_MASK};
use self::scratch::ScratchPage;
use self::sizing::{ApertureSizer, ApertureSizes};
use self::table::TranslationTable;

pub use self::config::GttConfig;
pub use self::pte::PteFlags;
pub use self::variant::GttVariant;

/// The host bridge and integrated graphics function of one chipset.
#[derive(Debug, Clone, Copy)]
pub struct GmchDevices<'a> {
    /// Host bridge (bus 0, device 0).
    pub bridge: PciFunction<'a>,
    /// Integrated graphics function.
    pub graphics: PciFunction<'a>,
}

/// A probed and enabled Intel GTT.
///
/// Resources are released exactly once, either by [`teardown`](Self::teardown)
/// or when the value is dropped.
pub struct IntelGtt<'a> {
    descriptor: &'static ChipsetDescriptor,
    devices: GmchDevices<'a>,
    services: &'a dyn KernelServices,
    config: GttConfig,
    registers: Option<MmioRegion>,
    gatt: Option<PhysAddr>,
    table: Option<TranslationTable>,
    scratch: Option<ScratchPage>,
    sizes: ApertureSizes,
    stolen_size: u32,
    aperture_base: PhysAddr,
    enable: EnableController,
}

impl<'a> IntelGtt<'a> {
    /// Probes the chipset described by `devices` and enables translation.
    ///
    /// Returns [`ConfigurationError::UnsupportedDevice`] without touching
    /// any hardware when the host bridge is not a supported chipset.
    pub fn probe(
        devices: GmchDevices<'a>,
        services: &'a dyn KernelServices,
        config: GttConfig,
    ) -> Result<Self, GttError> {
        let device_id = devices.bridge.info.device_id;
        let descriptor =
            chipset::lookup(device_id).ok_or(ConfigurationError::UnsupportedDevice { device_id })?;
        kinfo!(
            "intel-gtt: detected {} chipset ({})",
            descriptor.name,
            devices.bridge.info.address
        );

        let resources = descriptor.variant.setup(devices.graphics.config, services)?;

        let mut gtt = Self {
            descriptor,
            devices,
            services,
            config,
            registers: Some(resources.registers),
            gatt: resources.gatt,
            table: None,
            scratch: None,
            sizes: ApertureSizes {
                mappable_entries: 0,
                total_entries: 0,
            },
            stolen_size: 0,
            aperture_base: PhysAddr::zero(),
            enable: EnableController::new(0),
        };

        if let Err(err) = gtt.bring_up(resources.table_phys) {
            kerr!("intel-gtt: {} bring-up failed: {err}", descriptor.name);
            return Err(err);
        }
        Ok(gtt)
    }

    fn bring_up(&mut self, table_phys: PhysAddr) -> Result<(), GttError> {
        let variant = self.variant();
        let regs = register_block(self.registers.as_ref())?;
        let sizer = ApertureSizer::new(variant, &self.devices, &regs);

        let mut sizes = sizer.sizes()?;
        if sizes.mappable_entries > sizes.total_entries {
            kwarn!(
                "intel-gtt: aperture of {} entries exceeds table of {}, clamping",
                sizes.mappable_entries,
                sizes.total_entries
            );
            sizes.mappable_entries = sizes.total_entries;
        }
        self.sizes = sizes;

        // Captured after sizing: gen 5 may have rewritten the size field.
        let saved = EnableController::saved_value(variant, regs.pgetbl_ctl());
        kinfo!(
            "intel-gtt: detected gtt size: {}K total, {}K mappable",
            sizes.total_entries * 4,
            sizes.mappable_entries * 4
        );

        let table = self.table.insert(TranslationTable::map(
            self.services,
            table_phys,
            sizes.total_entries,
        )?);
        self.stolen_size = sizer.stolen_size()?;

        let scratch = self.scratch.insert(ScratchPage::alloc(self.services)?);
        let scratch_pte = variant.encode(scratch.phys(), variant.scratch_flags());
        table.fill(0..table.entries(), scratch_pte);

        self.aperture_base = read_aperture_base(variant, self.devices.graphics.config)?;

        self.enable = EnableController::new(saved);
        self.enable.enable(variant, self.devices.bridge.config, &regs)
    }

    // -----------------------------------------------------------------------
    // Geometry
    // -----------------------------------------------------------------------

    /// The chipset's driver variant.
    #[must_use]
    pub fn variant(&self) -> GttVariant {
        self.descriptor.variant
    }

    /// Chipset name used in log messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Entries in the translation table.
    #[must_use]
    pub fn total_entries(&self) -> u32 {
        self.sizes.total_entries
    }

    /// Entries covering the CPU-visible aperture. Never exceeds
    /// [`total_entries`](Self::total_entries).
    #[must_use]
    pub fn mappable_entries(&self) -> u32 {
        self.sizes.mappable_entries
    }

    /// Bytes of firmware-reserved graphics memory, zero if none.
    #[must_use]
    pub fn stolen_size(&self) -> u32 {
        self.stolen_size
    }

    /// Physical base of the graphics aperture.
    #[must_use]
    pub fn aperture_base(&self) -> PhysAddr {
        self.aperture_base
    }

    /// Whether page addresses may exceed 32 bits and need the DMA API.
    #[must_use]
    pub fn needs_extended_addressing(&self) -> bool {
        self.config.use_dma_api && self.variant().generation() > 2
    }

    /// Physical address of the scratch page.
    #[must_use]
    pub fn scratch_page(&self) -> PhysAddr {
        self.scratch.as_ref().map_or(PhysAddr::zero(), ScratchPage::phys)
    }

    /// Current enable state.
    #[must_use]
    pub fn enable_state(&self) -> EnableState {
        self.enable.state()
    }

    // -----------------------------------------------------------------------
    // Entries
    // -----------------------------------------------------------------------

    /// Returns `true` if `flags` names a memory type this chipset can map.
    #[must_use]
    pub fn check_flags(&self, flags: u32) -> bool {
        self.variant().check_flags(flags)
    }

    /// Classifies memory-type flags into the template accepted by
    /// [`write_entry`](Self::write_entry). `None` for unsupported types.
    #[must_use]
    pub fn classify_flags(&self, flags: u32) -> Option<PteFlags> {
        self.variant().classify_flags(flags)
    }

    /// Points entry `index` at the page `addr`.
    ///
    /// The write is not posted; callers batch entries and finish with
    /// [`insert_pages`](Self::insert_pages) or a read back.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`total_entries`](Self::total_entries).
    pub fn write_entry(&mut self, addr: PhysAddr, index: u32, flags: PteFlags) {
        let pte = self.variant().encode(addr, flags);
        if let Some(table) = &self.table {
            table.write(index, pte);
        }
    }

    /// Binds `pages` to consecutive entries starting at `first` and posts
    /// the writes.
    ///
    /// # Panics
    ///
    /// Panics if the entries extend past the table.
    pub fn insert_pages(&mut self, first: u32, pages: &[PhysAddr], flags: PteFlags) {
        let variant = self.variant();
        let Some(table) = &self.table else { return };
        let count = u32::try_from(pages.len()).unwrap_or(u32::MAX);
        let range = first..first.saturating_add(count);
        TranslationTable::check_range(&range, table.entries());

        ktrace!("intel-gtt: binding {} pages at entry {first}", pages.len());
        for (index, &page) in range.clone().zip(pages) {
            table.write(index, variant.encode(page, flags));
        }
        table.post(range);
    }

    /// Points every entry in `range` back at the scratch page.
    ///
    /// # Panics
    ///
    /// Panics if `range` extends past the table.
    pub fn clear_range(&mut self, range: Range<u32>) {
        let variant = self.variant();
        if let (Some(table), Some(scratch)) = (&self.table, &self.scratch) {
            ktrace!("intel-gtt: clearing entries {range:?}");
            table.fill(range, variant.encode(scratch.phys(), variant.scratch_flags()));
        }
    }

    /// Reads back the raw entry at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`total_entries`](Self::total_entries).
    #[must_use]
    pub fn read_entry(&self, index: u32) -> u32 {
        self.table.as_ref().map_or(0, |table| table.read(index))
    }

    /// Flushes chipset write buffers so entry writes reach memory.
    pub fn chipset_flush(&self) {
        if let Ok(regs) = register_block(self.registers.as_ref()) {
            self.variant()
                .chipset_flush(&regs, self.config.flush_timeout_spins);
        }
    }

    // -----------------------------------------------------------------------
    // Power management
    // -----------------------------------------------------------------------

    /// Disables translation ahead of a suspend.
    pub fn suspend(&mut self) -> Result<(), GttError> {
        let regs = register_block(self.registers.as_ref())?;
        self.enable
            .disable(self.descriptor.variant, self.devices.bridge.config, &regs)
    }

    /// Re-enables translation with the value saved at probe.
    pub fn resume(&mut self) -> Result<(), GttError> {
        let regs = register_block(self.registers.as_ref())?;
        let result = self
            .enable
            .enable(self.descriptor.variant, self.devices.bridge.config, &regs);
        if let Err(err) = result {
            kerr!("intel-gtt: {} resume failed: {err}", self.descriptor.name);
        }
        result
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Releases every resource acquired at probe.
    pub fn teardown(mut self) {
        kinfo!("intel-gtt: tearing down {}", self.descriptor.name);
        self.release();
    }

    /// Releases in reverse acquisition order. Safe to call more than once.
    fn release(&mut self) {
        let variant = self.variant();
        if self.config.scrub_on_teardown {
            if let (Some(table), Some(scratch)) = (&self.table, &self.scratch) {
                table.fill(
                    0..table.entries(),
                    variant.encode(scratch.phys(), variant.scratch_flags()),
                );
            }
        }

        variant.cleanup(self.registers.as_ref(), self.gatt.take(), self.services);
        if let Some(table) = self.table.take() {
            table.unmap(self.services);
        }
        if let Some(registers) = self.registers.take() {
            self.services.unmap_mmio(registers);
        }
        if let Some(scratch) = self.scratch.take() {
            scratch.free(self.services);
        }
    }
}

impl Drop for IntelGtt<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl core::fmt::Debug for IntelGtt<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IntelGtt")
            .field("chipset", &self.descriptor.name)
            .field("variant", &self.descriptor.variant)
            .field("sizes", &self.sizes)
            .field("stolen_size", &self.stolen_size)
            .field("aperture_base", &self.aperture_base)
            .field("state", &self.enable.state())
            .finish_non_exhaustive()
    }
}

fn register_block(region: Option<&MmioRegion>) -> Result<GttRegs<'_>, GttError> {
    region.and_then(GttRegs::new).ok_or(GttError::Mapping {
        phys: region.map_or(0, |r| r.phys_base().as_u64()),
        size: GttRegs::SPAN,
    })
}

/// Reads the aperture base from the graphics function's memory BAR.
fn read_aperture_base(
    variant: GttVariant,
    graphics: &dyn PciConfigSpace,
) -> Result<PhysAddr, GttError> {
    let bar = if variant.generation() <= 2 {
        I810_GMADDR
    } else {
        I915_GMADDR
    };
    let base = graphics.read_u32(bar)? & PCI_BASE_ADDRESS_MEM_MASK;
    Ok(PhysAddr::new(u64::from(base)))
}
