//! GTT enable/disable sequencing.
//!
//! State machine: `Disabled → Enabling → Enabled → Disabling → Disabled`.
//! A failed enable falls back to `Disabled`. Enabling restores the
//! `PGETBL_CTL` value saved at probe, so the same path serves resume.

use gtt_core::kdebug;
use gtt_driver_api::{GttError, PciConfigSpace};

use super::regs::{GMCH_CTRL_NAME, GmchCtrl, GttRegs, I830_GMCH_CTRL, PGETBL_CTL_NAME, PgetblCtl};
use super::variant::GttVariant;

/// Enable state of the translation hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableState {
    /// Translation is off.
    Disabled,
    /// Enable sequence in progress.
    Enabling,
    /// Translation is on.
    Enabled,
    /// Disable sequence in progress.
    Disabling,
}

/// Drives the enable sequence and checks the hardware acknowledged it.
#[derive(Debug)]
pub struct EnableController {
    state: EnableState,
    saved: u32,
}

impl EnableController {
    /// Creates a controller in the `Disabled` state.
    ///
    /// `saved` is the `PGETBL_CTL` value to restore on every enable,
    /// including the enable bit on variants that have one.
    #[must_use]
    pub const fn new(saved: u32) -> Self {
        Self {
            state: EnableState::Disabled,
            saved,
        }
    }

    /// Computes the value to save from `PGETBL_CTL` as read at probe.
    #[must_use]
    pub fn saved_value(variant: GttVariant, pgetbl_ctl: PgetblCtl) -> u32 {
        let mut saved = pgetbl_ctl - PgetblCtl::ENABLED;
        if variant.info().has_pgtbl_enable {
            saved |= PgetblCtl::ENABLED;
        }
        saved.bits()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> EnableState {
        self.state
    }

    /// Enables translation. A no-op when already enabled.
    ///
    /// Returns [`GttError::HardwareEnableFailed`] if an enable bit does not
    /// read back set; the controller then stays `Disabled`. Failures are
    /// left to the caller to report.
    pub fn enable(
        &mut self,
        variant: GttVariant,
        bridge: &dyn PciConfigSpace,
        regs: &GttRegs<'_>,
    ) -> Result<(), GttError> {
        if self.state == EnableState::Enabled {
            return Ok(());
        }

        self.state = EnableState::Enabling;
        let result = self.run_enable(variant, bridge, regs);
        self.state = if result.is_ok() {
            EnableState::Enabled
        } else {
            EnableState::Disabled
        };
        result
    }

    fn run_enable(
        &self,
        variant: GttVariant,
        bridge: &dyn PciConfigSpace,
        regs: &GttRegs<'_>,
    ) -> Result<(), GttError> {
        // Sandybridge enables translation implicitly.
        if variant.generation() >= 6 {
            return Ok(());
        }

        if variant.generation() == 2 {
            let gmch = GmchCtrl::from_bits_retain(bridge.read_u16(I830_GMCH_CTRL)?)
                | GmchCtrl::ENABLED;
            bridge.write_u16(I830_GMCH_CTRL, gmch.bits())?;
            let observed = bridge.read_u16(I830_GMCH_CTRL)?;
            verify(
                GMCH_CTRL_NAME,
                u32::from(gmch.bits()),
                u32::from(observed),
                u32::from(GmchCtrl::ENABLED.bits()),
            )?;
        }

        // The saved value may differ from what is programmed on the resume
        // path; drain chipset write buffers around the update.
        flush_write_buffers(variant, regs);

        regs.set_pgetbl_ctl(PgetblCtl::from_bits_retain(self.saved));
        if variant.info().has_pgtbl_enable {
            verify(
                PGETBL_CTL_NAME,
                self.saved,
                regs.pgetbl_ctl().bits(),
                PgetblCtl::ENABLED.bits(),
            )?;
        }

        flush_write_buffers(variant, regs);
        kdebug!("intel-gtt: enabled, PGETBL_CTL={:#x}", self.saved);
        Ok(())
    }

    /// Disables translation. A no-op when already disabled. Nothing is
    /// read back.
    pub fn disable(
        &mut self,
        variant: GttVariant,
        bridge: &dyn PciConfigSpace,
        regs: &GttRegs<'_>,
    ) -> Result<(), GttError> {
        if self.state == EnableState::Disabled {
            return Ok(());
        }

        self.state = EnableState::Disabling;
        let result = self.run_disable(variant, bridge, regs);
        self.state = EnableState::Disabled;
        result
    }

    fn run_disable(
        &self,
        variant: GttVariant,
        bridge: &dyn PciConfigSpace,
        regs: &GttRegs<'_>,
    ) -> Result<(), GttError> {
        if variant.generation() >= 6 {
            return Ok(());
        }

        if variant.generation() == 2 {
            let gmch = GmchCtrl::from_bits_retain(bridge.read_u16(I830_GMCH_CTRL)?);
            bridge.write_u16(I830_GMCH_CTRL, (gmch - GmchCtrl::ENABLED).bits())?;
        }

        flush_write_buffers(variant, regs);
        regs.set_pgetbl_ctl(PgetblCtl::from_bits_retain(self.saved) - PgetblCtl::ENABLED);
        flush_write_buffers(variant, regs);
        Ok(())
    }
}

/// Checks that `bit` reads back set.
pub fn verify(register: &'static str, expected: u32, observed: u32, bit: u32) -> Result<(), GttError> {
    if observed & bit == bit {
        Ok(())
    } else {
        Err(GttError::HardwareEnableFailed {
            register,
            expected,
            observed,
        })
    }
}

fn flush_write_buffers(variant: GttVariant, regs: &GttRegs<'_>) {
    if variant.generation() >= 3 {
        regs.set_gfx_flsh_cntl(0);
    }
}
