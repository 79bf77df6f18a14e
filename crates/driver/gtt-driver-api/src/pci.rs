//! PCI types handed to drivers by the bus enumerator.

use crate::error::GttError;

/// Intel's PCI vendor ID.
pub const PCI_VENDOR_INTEL: u16 = 0x8086;

/// PCI bus/device/function address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciAddress {
    /// Bus number (0-255).
    pub bus: u8,
    /// Device number (0-31).
    pub device: u8,
    /// Function number (0-7).
    pub function: u8,
}

impl core::fmt::Display for PciAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02x}:{:02x}.{}", self.bus, self.device, self.function)
    }
}

/// Decoded PCI Base Address Register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PciBar {
    /// Memory-mapped BAR.
    Memory {
        /// Base physical address.
        base: u64,
        /// Size in bytes.
        size: u64,
        /// Whether the region is prefetchable.
        prefetchable: bool,
    },
    /// I/O port BAR.
    Io {
        /// Base I/O port address.
        base: u32,
        /// Size in bytes.
        size: u32,
    },
    /// BAR slot is unused or consumed by the upper half of a 64-bit BAR.
    Unused,
}

impl PciBar {
    /// Returns the length of a memory BAR, `None` for I/O or unused slots.
    #[must_use]
    pub const fn memory_size(&self) -> Option<u64> {
        match *self {
            Self::Memory { size, .. } => Some(size),
            _ => None,
        }
    }
}

/// Information about a discovered PCI function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciDeviceInfo {
    /// Bus/device/function address.
    pub address: PciAddress,
    /// Vendor ID.
    pub vendor_id: u16,
    /// Device ID.
    pub device_id: u16,
    /// Revision ID.
    pub revision: u8,
    /// Class code.
    pub class: u8,
    /// Subclass code.
    pub subclass: u8,
    /// Base Address Registers.
    pub bars: [PciBar; 6],
}

impl PciDeviceInfo {
    /// Returns BAR `index`, or [`PciBar::Unused`] when out of range.
    #[must_use]
    pub fn bar(&self, index: usize) -> PciBar {
        self.bars.get(index).copied().unwrap_or(PciBar::Unused)
    }
}

/// Access to one function's configuration registers.
///
/// Offsets are byte offsets into the 256-byte header. Implementations
/// report failed accesses as [`GttError::RegisterAccess`].
pub trait PciConfigSpace {
    /// Reads a word.
    fn read_u16(&self, offset: u16) -> Result<u16, GttError>;
    /// Reads a dword.
    fn read_u32(&self, offset: u16) -> Result<u32, GttError>;
    /// Writes a word.
    fn write_u16(&self, offset: u16, value: u16) -> Result<(), GttError>;
}

/// A PCI function together with its configuration space.
#[derive(Clone, Copy)]
pub struct PciFunction<'a> {
    /// Enumerated device information.
    pub info: PciDeviceInfo,
    /// Configuration register access.
    pub config: &'a dyn PciConfigSpace,
}

impl core::fmt::Debug for PciFunction<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PciFunction")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with_bars(bars: [PciBar; 6]) -> PciDeviceInfo {
        PciDeviceInfo {
            address: PciAddress {
                bus: 0,
                device: 2,
                function: 0,
            },
            vendor_id: PCI_VENDOR_INTEL,
            device_id: 0x0102,
            revision: 9,
            class: 0x03,
            subclass: 0x00,
            bars,
        }
    }

    #[test]
    fn address_display() {
        let addr = PciAddress {
            bus: 0,
            device: 2,
            function: 1,
        };
        assert_eq!(format!("{addr}"), "00:02.1");
    }

    #[test]
    fn memory_bar_size() {
        let mut bars = [PciBar::Unused; 6];
        bars[0] = PciBar::Io {
            base: 0x3000,
            size: 8,
        };
        bars[2] = PciBar::Memory {
            base: 0xe000_0000,
            size: 256 << 20,
            prefetchable: true,
        };
        let info = info_with_bars(bars);
        assert_eq!(info.bar(2).memory_size(), Some(256 << 20));
        assert_eq!(info.bar(0).memory_size(), None);
        assert_eq!(info.bar(5).memory_size(), None);
        assert_eq!(info.bar(9), PciBar::Unused);
    }
}
