//! Graphics translation table drivers.

#![cfg_attr(not(test), no_std)]

pub mod intel_gtt;

pub use self::intel_gtt::{GmchDevices, GttConfig, IntelGtt};
