//! Aperture, translation table and stolen memory sizing.
//!
//! The decode tables are pure `(field bits, size)` pairs so they can be
//! checked without hardware; [`ApertureSizer`] reads the registers and
//! applies them once at probe.

use gtt_core::{PAGE_SHIFT, kerr, kinfo, kwarn};
use gtt_driver_api::{ConfigurationError, GttError};

use super::GmchDevices;
use super::chipset::{PCI_DEVICE_ID_INTEL_82830_HB, PCI_DEVICE_ID_INTEL_82845G_HB};
use super::regs::{
    G4X_GMCH_SIZE_1M, G4X_GMCH_SIZE_2M, G4X_GMCH_SIZE_MASK, G4X_GMCH_SIZE_VT_1_5M,
    G4X_GMCH_SIZE_VT_1M, G4X_GMCH_SIZE_VT_2M, GmchCtrl, GttRegs, I810_GFX_MEM_WIN_SIZE,
    I810_SMRAM_MISCC, I830_GMCH_CTRL, I830_GMCH_GMS_LOCAL, I830_GMCH_GMS_MASK,
    I830_GMCH_GMS_STOLEN_512, I830_GMCH_GMS_STOLEN_1024, I830_GMCH_GMS_STOLEN_8192,
    I855_GMCH_GMS_MASK, I965_PGETBL_SIZE_1_5MB, I965_PGETBL_SIZE_1MB, I965_PGETBL_SIZE_2MB,
    I965_PGETBL_SIZE_128KB, I965_PGETBL_SIZE_256KB, I965_PGETBL_SIZE_512KB, PgetblCtl,
    SNB_GMCH_CTRL, SNB_GMCH_GMS_SHIFT, SNB_GMCH_GMS_STOLEN_MASK, SNB_GTT_SIZE_1M,
    SNB_GTT_SIZE_2M, SNB_GTT_SIZE_MASK, i830_rdram_ddt, i830_rdram_nd,
};
use super::variant::GttVariant;

const KB: u32 = 1024;
const MB: u32 = 1024 * KB;

// ---------------------------------------------------------------------------
// Decode tables
// ---------------------------------------------------------------------------

/// `PGETBL_CTL` size field to table bytes.
const PGETBL_TABLE_SIZES: [(u32, u32); 6] = [
    (I965_PGETBL_SIZE_128KB, 128 * KB),
    (I965_PGETBL_SIZE_256KB, 256 * KB),
    (I965_PGETBL_SIZE_512KB, 512 * KB),
    (I965_PGETBL_SIZE_1MB, MB),
    (I965_PGETBL_SIZE_2MB, 2 * MB),
    (I965_PGETBL_SIZE_1_5MB, MB + 512 * KB),
];

/// Table size assumed when `PGETBL_CTL` holds a reserved size.
const PGETBL_FALLBACK_SIZE: u32 = 512 * KB;

/// Bridge `GMCH_CTRL` size field to the `PGETBL_CTL` size it forces (gen 5).
const G4X_RESIZE: [(u16, u32); 5] = [
    (G4X_GMCH_SIZE_1M, I965_PGETBL_SIZE_1MB),
    (G4X_GMCH_SIZE_VT_1M, I965_PGETBL_SIZE_1MB),
    (G4X_GMCH_SIZE_VT_1_5M, I965_PGETBL_SIZE_1_5MB),
    (G4X_GMCH_SIZE_2M, I965_PGETBL_SIZE_2MB),
    (G4X_GMCH_SIZE_VT_2M, I965_PGETBL_SIZE_2MB),
];

/// Sandybridge `SNB_GMCH_CTRL` table size field.
const SNB_TABLE_SIZES: [(u16, u32); 2] = [(SNB_GTT_SIZE_1M, MB), (SNB_GTT_SIZE_2M, 2 * MB)];

/// 830M / 845G stolen memory field, excluding the local-memory encoding.
const I830_STOLEN: [(u16, u32); 3] = [
    (I830_GMCH_GMS_STOLEN_512, 512 * KB),
    (I830_GMCH_GMS_STOLEN_1024, MB),
    (I830_GMCH_GMS_STOLEN_8192, 8 * MB),
];

/// 855 and later stolen memory field.
const I855_STOLEN: [(u16, u32); 13] = [
    (0x10, MB),
    (0x20, 4 * MB),
    (0x30, 8 * MB),
    (0x40, 16 * MB),
    (0x50, 32 * MB),
    (0x60, 48 * MB),
    (0x70, 64 * MB),
    (0x80, 128 * MB),
    (0x90, 256 * MB),
    (0xa0, 96 * MB),
    (0xb0, 160 * MB),
    (0xc0, 224 * MB),
    (0xd0, 352 * MB),
];

/// Per-channel RDRAM device sizes in MiB, indexed by density.
const RDRAM_DDT_MB: [u32; 4] = [0, 16, 32, 64];

/// Sandybridge stolen memory step.
const SNB_STOLEN_STEP: u32 = 32 * MB;
/// Highest valid Sandybridge stolen memory step (512M).
const SNB_STOLEN_MAX_STEPS: u16 = 16;

fn lookup<K: Copy + PartialEq, V: Copy>(table: &[(K, V)], key: K) -> Option<V> {
    table.iter().find(|&&(bits, _)| bits == key).map(|&(_, size)| size)
}

/// i81x aperture size from `SMRAM_MISCC`.
#[must_use]
pub fn i81x_aperture_bytes(smram_miscc: u32) -> u32 {
    if smram_miscc & I810_GFX_MEM_WIN_SIZE != 0 {
        32 * MB
    } else {
        64 * MB
    }
}

/// i830-family aperture size from `GMCH_CTRL`.
#[must_use]
pub fn i830_aperture_bytes(gmch_ctrl: u16) -> u32 {
    if GmchCtrl::from_bits_retain(gmch_ctrl).contains(GmchCtrl::MEM_64M) {
        64 * MB
    } else {
        128 * MB
    }
}

/// Table size from the `PGETBL_CTL` size field, `None` if reserved.
#[must_use]
pub fn pgetbl_table_bytes(pgetbl_ctl: u32) -> Option<u32> {
    lookup(&PGETBL_TABLE_SIZES, pgetbl_ctl & PgetblCtl::SIZE.bits())
}

/// `PGETBL_CTL` size field a gen 5 bridge forces, `None` to leave it.
#[must_use]
pub fn g4x_forced_size(gmch_ctrl: u16) -> Option<u32> {
    lookup(&G4X_RESIZE, gmch_ctrl & G4X_GMCH_SIZE_MASK)
}

/// Sandybridge table size, `None` for a reserved encoding.
#[must_use]
pub fn snb_table_bytes(snb_gmch_ctrl: u16) -> Option<u32> {
    lookup(&SNB_TABLE_SIZES, snb_gmch_ctrl & SNB_GTT_SIZE_MASK)
}

/// Sandybridge stolen memory: 32M steps from 32M to 512M.
#[must_use]
pub fn snb_stolen_bytes(snb_gmch_ctrl: u16) -> u32 {
    let steps = (snb_gmch_ctrl & SNB_GMCH_GMS_STOLEN_MASK) >> SNB_GMCH_GMS_SHIFT;
    if (1..=SNB_STOLEN_MAX_STEPS).contains(&steps) {
        u32::from(steps) * SNB_STOLEN_STEP
    } else {
        0
    }
}

/// 855-and-later stolen memory.
#[must_use]
pub fn i855_stolen_bytes(gmch_ctrl: u16) -> u32 {
    lookup(&I855_STOLEN, gmch_ctrl & I855_GMCH_GMS_MASK).unwrap_or(0)
}

/// 830M / 845G stolen memory, `None` when it lives in local RDRAM.
#[must_use]
pub fn i830_stolen_bytes(gmch_ctrl: u16) -> Option<u32> {
    match gmch_ctrl & I830_GMCH_GMS_MASK {
        I830_GMCH_GMS_LOCAL => None,
        field => Some(lookup(&I830_STOLEN, field).unwrap_or(0)),
    }
}

/// Local RDRAM size from `RDRAM_CHANNEL_TYPE`: channels times device size.
#[must_use]
pub fn i830_local_bytes(rdct: u8) -> u32 {
    let channels = u32::from(i830_rdram_nd(rdct)) + 1;
    channels * RDRAM_DDT_MB[usize::from(i830_rdram_ddt(rdct))] * MB
}

// ---------------------------------------------------------------------------
// ApertureSizer
// ---------------------------------------------------------------------------

/// Sizes computed once at probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApertureSizes {
    /// Entries covering the CPU-visible aperture.
    pub mappable_entries: u32,
    /// Entries in the translation table.
    pub total_entries: u32,
}

/// Reads the chipset registers that determine the table geometry.
pub struct ApertureSizer<'a, 'r> {
    variant: GttVariant,
    devices: &'a GmchDevices<'a>,
    regs: &'a GttRegs<'r>,
}

impl<'a, 'r> ApertureSizer<'a, 'r> {
    /// Creates a sizer for `variant` over the mapped register window.
    pub fn new(variant: GttVariant, devices: &'a GmchDevices<'a>, regs: &'a GttRegs<'r>) -> Self {
        Self {
            variant,
            devices,
            regs,
        }
    }

    /// Computes the mappable and total entry counts.
    ///
    /// On gen 5 this rewrites the `PGETBL_CTL` size field first.
    pub fn sizes(&self) -> Result<ApertureSizes, GttError> {
        let mappable_entries = self.mappable_entries()?;
        let total_entries = if self.variant.sizes_from_pgetbl() {
            self.pgetbl_entries()?
        } else if self.variant == GttVariant::Sandybridge {
            self.snb_entries()?
        } else {
            mappable_entries
        };
        Ok(ApertureSizes {
            mappable_entries,
            total_entries,
        })
    }

    fn mappable_entries(&self) -> Result<u32, GttError> {
        let bytes = match self.variant.generation() {
            1 => {
                let miscc = self.devices.bridge.config.read_u32(I810_SMRAM_MISCC)?;
                u64::from(i81x_aperture_bytes(miscc))
            }
            2 => {
                let gmch = self.devices.bridge.config.read_u16(I830_GMCH_CTRL)?;
                u64::from(i830_aperture_bytes(gmch))
            }
            _ => self
                .devices
                .graphics
                .info
                .bar(2)
                .memory_size()
                .ok_or(ConfigurationError::MissingAperture)?,
        };
        Ok((bytes >> PAGE_SHIFT) as u32)
    }

    fn pgetbl_entries(&self) -> Result<u32, GttError> {
        if self.variant.generation() == 5 {
            let gmch = self.devices.bridge.config.read_u16(I830_GMCH_CTRL)?;
            if let Some(size) = g4x_forced_size(gmch) {
                self.force_table_size(size);
            }
        }

        let ctl = self.regs.pgetbl_ctl().bits();
        let bytes = pgetbl_table_bytes(ctl).unwrap_or_else(|| {
            kwarn!("intel-gtt: unknown page table size {ctl:#x}, assuming 512K");
            PGETBL_FALLBACK_SIZE
        });
        Ok(bytes / 4)
    }

    /// Disables the per-process table and writes a new global table size.
    fn force_table_size(&self, size: u32) {
        self.regs.modify_pgetbl_ctl2(|ctl2| ctl2 - PgetblCtl::ENABLED);
        self.regs
            .modify_pgetbl_ctl(|ctl| (ctl - PgetblCtl::SIZE) | PgetblCtl::from_bits_retain(size));
    }

    fn snb_entries(&self) -> Result<u32, GttError> {
        let ctl = self.devices.graphics.config.read_u16(SNB_GMCH_CTRL)?;
        match snb_table_bytes(ctl) {
            Some(bytes) => Ok(bytes / 4),
            None => {
                kerr!("intel-gtt: bad GTT size mask {ctl:#06x}");
                Err(ConfigurationError::InvalidTableSize { raw: ctl }.into())
            }
        }
    }

    /// Detects firmware-reserved graphics memory. Zero means none.
    pub fn stolen_size(&self) -> Result<u32, GttError> {
        if self.variant.generation() == 1 {
            return Ok(0);
        }

        let bridge = &self.devices.bridge;
        let gmch = bridge.config.read_u16(I830_GMCH_CTRL)?;
        let mut local = false;

        let bytes = if matches!(
            bridge.info.device_id,
            PCI_DEVICE_ID_INTEL_82830_HB | PCI_DEVICE_ID_INTEL_82845G_HB
        ) {
            i830_stolen_bytes(gmch).unwrap_or_else(|| {
                local = true;
                i830_local_bytes(self.regs.rdram_channel_type())
            })
        } else if self.variant == GttVariant::Sandybridge {
            snb_stolen_bytes(self.devices.graphics.config.read_u16(SNB_GMCH_CTRL)?)
        } else {
            i855_stolen_bytes(gmch)
        };

        if bytes > 0 {
            kinfo!(
                "intel-gtt: detected {}K {} memory",
                bytes / KB,
                if local { "local" } else { "stolen" }
            );
        } else {
            kinfo!("intel-gtt: no pre-allocated video memory detected");
        }
        Ok(bytes)
    }
}
