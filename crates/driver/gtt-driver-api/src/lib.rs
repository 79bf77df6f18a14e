//! Driver API types and collaborator traits for the GTT drivers.
//!
//! - **Resources** -- [`MmioRegion`], an owned, bounds-checked mapping.
//! - **Bus** -- [`PciDeviceInfo`] and [`PciConfigSpace`] as handed over by the
//!   bus enumerator.
//! - **Services** -- [`KernelServices`], the mapping and frame allocation
//!   contract the kernel provides to drivers.
//! - **Errors** -- [`GttError`], the single failure type of every probe and
//!   power transition.

#![cfg_attr(not(test), no_std)]

pub mod error;
pub mod pci;
pub mod resource;
pub mod services;

pub use error::{ConfigurationError, GttError};
pub use pci::{PciAddress, PciBar, PciConfigSpace, PciDeviceInfo, PciFunction};
pub use resource::{CacheMode, MmioRegion, OutOfBounds};
pub use services::KernelServices;
