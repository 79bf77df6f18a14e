//! Driver error types.

use core::fmt;

/// Reasons a device cannot be driven with its current configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No chipset descriptor matches the device id. Benign: the device is
    /// simply not handled by this driver.
    UnsupportedDevice {
        /// Device id that was looked up.
        device_id: u16,
    },
    /// The translation table size field holds a reserved encoding.
    InvalidTableSize {
        /// Raw control word the size was decoded from.
        raw: u16,
    },
    /// The graphics function has no memory BAR describing the aperture.
    MissingAperture,
}

/// Errors that can occur while probing or driving a GTT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GttError {
    /// The device or its configuration is not supported.
    Configuration(ConfigurationError),
    /// A configuration-space read or write failed.
    RegisterAccess {
        /// Configuration-space offset of the failed access.
        offset: u16,
    },
    /// Mapping a register or table region failed.
    Mapping {
        /// Physical base of the requested mapping.
        phys: u64,
        /// Requested length in bytes.
        size: u64,
    },
    /// Physical frame allocation failed.
    ResourceExhausted,
    /// The hardware did not acknowledge the enable bit.
    HardwareEnableFailed {
        /// Name of the control register that was read back.
        register: &'static str,
        /// Value written.
        expected: u32,
        /// Value read back.
        observed: u32,
    },
}

impl GttError {
    /// Returns `true` for configuration errors, which mean "device
    /// unsupported or misconfigured" rather than a failed bring-up.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<ConfigurationError> for GttError {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedDevice { device_id } => {
                write!(f, "unsupported device {device_id:#06x}")
            }
            Self::InvalidTableSize { raw } => {
                write!(f, "invalid translation table size encoding {raw:#06x}")
            }
            Self::MissingAperture => f.write_str("aperture BAR missing"),
        }
    }
}

impl fmt::Display for GttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "configuration error: {err}"),
            Self::RegisterAccess { offset } => {
                write!(f, "config space access failed at {offset:#x}")
            }
            Self::Mapping { phys, size } => {
                write!(f, "failed to map {size:#x} bytes at {phys:#x}")
            }
            Self::ResourceExhausted => f.write_str("out of physical frames"),
            Self::HardwareEnableFailed {
                register,
                expected,
                observed,
            } => write!(
                f,
                "failed to enable the GTT: {register}={observed:#x} [expected {expected:#x}]"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_all_variants() {
        assert_eq!(
            format!(
                "{}",
                GttError::from(ConfigurationError::UnsupportedDevice { device_id: 0x0102 })
            ),
            "configuration error: unsupported device 0x0102"
        );
        assert_eq!(
            format!("{}", ConfigurationError::InvalidTableSize { raw: 0x0300 }),
            "invalid translation table size encoding 0x0300"
        );
        assert_eq!(
            format!("{}", ConfigurationError::MissingAperture),
            "aperture BAR missing"
        );
        assert_eq!(
            format!("{}", GttError::RegisterAccess { offset: 0x52 }),
            "config space access failed at 0x52"
        );
        assert_eq!(
            format!(
                "{}",
                GttError::Mapping {
                    phys: 0xfe00_0000,
                    size: 0x8_0000
                }
            ),
            "failed to map 0x80000 bytes at 0xfe000000"
        );
        assert_eq!(
            format!("{}", GttError::ResourceExhausted),
            "out of physical frames"
        );
        assert_eq!(
            format!(
                "{}",
                GttError::HardwareEnableFailed {
                    register: "PGETBL_CTL",
                    expected: 0x1,
                    observed: 0x0
                }
            ),
            "failed to enable the GTT: PGETBL_CTL=0x0 [expected 0x1]"
        );
    }

    #[test]
    fn configuration_classification() {
        assert!(GttError::from(ConfigurationError::MissingAperture).is_configuration());
        assert!(!GttError::ResourceExhausted.is_configuration());
    }
}
