//! Host bridge to driver variant table.

use super::variant::GttVariant;

/// 830M host bridge.
pub const PCI_DEVICE_ID_INTEL_82830_HB: u16 = 0x3575;
/// 845G host bridge.
pub const PCI_DEVICE_ID_INTEL_82845G_HB: u16 = 0x2560;

/// One supported chipset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipsetDescriptor {
    /// Host bridge PCI device ID.
    pub device_id: u16,
    /// Marketing name used in log messages.
    pub name: &'static str,
    /// Driver variant handling the chipset.
    pub variant: GttVariant,
}

const fn chipset(device_id: u16, name: &'static str, variant: GttVariant) -> ChipsetDescriptor {
    ChipsetDescriptor {
        device_id,
        name,
        variant,
    }
}

/// Supported chipsets, keyed by host bridge device ID.
pub static CHIPSETS: &[ChipsetDescriptor] = &[
    chipset(0x7120, "i810", GttVariant::I81x),
    chipset(0x7122, "i810", GttVariant::I81x),
    chipset(0x7124, "i810", GttVariant::I81x),
    chipset(0x1130, "i815", GttVariant::I81x),
    chipset(PCI_DEVICE_ID_INTEL_82830_HB, "830M", GttVariant::I8xx),
    chipset(PCI_DEVICE_ID_INTEL_82845G_HB, "845G", GttVariant::I8xx),
    chipset(0x358c, "854", GttVariant::I8xx),
    chipset(0x3580, "855GM", GttVariant::I8xx),
    chipset(0x2570, "865", GttVariant::I8xx),
    chipset(0x2588, "E7221 (i915)", GttVariant::I915),
    chipset(0x2580, "915G", GttVariant::I915),
    chipset(0x2590, "915GM", GttVariant::I915),
    chipset(0x2770, "945G", GttVariant::I915),
    chipset(0x27a0, "945GM", GttVariant::I915),
    chipset(0x27ac, "945GME", GttVariant::I915),
    chipset(0x29c0, "G33", GttVariant::G33),
    chipset(0x29b0, "Q35", GttVariant::G33),
    chipset(0x29d0, "Q33", GttVariant::G33),
    chipset(0xa010, "GMA3150", GttVariant::Pineview),
    chipset(0xa000, "GMA3150", GttVariant::Pineview),
    chipset(0x2970, "946GZ", GttVariant::I965),
    chipset(0x2980, "G35", GttVariant::I965),
    chipset(0x2990, "965Q", GttVariant::I965),
    chipset(0x29a0, "965G", GttVariant::I965),
    chipset(0x2a00, "965GM", GttVariant::I965),
    chipset(0x2a10, "965GME/GLE", GttVariant::I965),
    chipset(0x2a40, "GM45", GttVariant::G4x),
    chipset(0x2e00, "Eaglelake", GttVariant::G4x),
    chipset(0x2e10, "Q45/Q43", GttVariant::G4x),
    chipset(0x2e20, "G45/G43", GttVariant::G4x),
    chipset(0x2e30, "G41", GttVariant::G4x),
    chipset(0x2e40, "B43", GttVariant::G4x),
    chipset(0x2e90, "B43", GttVariant::G4x),
    chipset(0x0040, "HD Graphics", GttVariant::Ironlake),
    chipset(0x0069, "HD Graphics", GttVariant::Ironlake),
    chipset(0x0044, "HD Graphics", GttVariant::Ironlake),
    chipset(0x0062, "HD Graphics", GttVariant::Ironlake),
    chipset(0x006a, "HD Graphics", GttVariant::Ironlake),
    chipset(0x0100, "Sandybridge", GttVariant::Sandybridge),
    chipset(0x0104, "Sandybridge", GttVariant::Sandybridge),
    chipset(0x0108, "Sandybridge", GttVariant::Sandybridge),
];

/// Finds the descriptor for a host bridge. First match wins.
#[must_use]
pub fn lookup(device_id: u16) -> Option<&'static ChipsetDescriptor> {
    CHIPSETS.iter().find(|desc| desc.device_id == device_id)
}
