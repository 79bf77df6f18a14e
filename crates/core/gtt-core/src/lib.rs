//! Core types shared by the GTT driver crates: typed physical/virtual
//! addresses, page geometry, and the leveled kernel log macros.

#![cfg_attr(not(test), no_std)]

pub mod addr;
pub mod log;

pub use addr::{PAGE_SHIFT, PAGE_SIZE, PhysAddr, VirtAddr};
