//! Typed MMIO register block abstractions.
//!
//! Re-exports the [`register_block!`] macro from `gtt-mmio-macros`. A
//! generated block borrows an [`MmioRegion`] and refuses construction when
//! the region does not cover every declared register, so individual reads
//! and writes are safe and always land inside the mapping.
//!
//! # Example
//!
//! ```ignore
//! use gtt_mmio::register_block;
//!
//! register_block! {
//!     /// Page table control registers.
//!     pub PgtblRegs {
//!         /// Page table control.
//!         [0x2020; u32; rw] pgetbl_ctl,
//!         /// Flush control.
//!         [0x2170; u32; wo] gfx_flsh_cntl,
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

// Generated blocks name `::gtt_mmio::MmioRegion`; make that path resolve here too.
#[cfg(test)]
extern crate self as gtt_mmio;

pub use gtt_driver_api::resource::MmioRegion;
pub use gtt_mmio_macros::register_block;
