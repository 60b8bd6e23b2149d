//! SysTick timebase timer
//!
//! SysTick counts down from RVR to zero and pends the SysTick exception on
//! every reload. COUNTFLAG clears when CSR is read, so the pending state is
//! taken from the SCB instead, which also holds while interrupts are
//! masked.

use cortex_m::peripheral::{syst, SCB, SYST};
use horolog_hal::{TimebaseTimer, TimerWidth};

const CSR_ENABLE: u32 = 1 << 0;
const CSR_TICKINT: u32 = 1 << 1;
const CSR_CLKSOURCE_CORE: u32 = 1 << 2;
const COUNTER_MASK: u32 = 0x00FF_FFFF;

/// Ticks elapsed in the current period of a down-counter
pub const fn elapsed(reload: u32, current: u32) -> u32 {
    let reload = reload & COUNTER_MASK;
    let current = current & COUNTER_MASK;
    reload.saturating_sub(current)
}

/// SysTick driven from the core clock
pub struct SysTickTimer {
    _private: (),
}

impl SysTickTimer {
    /// Take ownership of SysTick
    pub fn new(_syst: SYST) -> Self {
        Self { _private: () }
    }

    /// Create a handle without the `SYST` token, for use in a `static`
    ///
    /// # Safety
    ///
    /// Nothing else may program SysTick for the lifetime of this handle.
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }

    fn regs(&self) -> &'static syst::RegisterBlock {
        // SAFETY: SYST::PTR is the fixed SysTick address; ownership is
        // established by `new` or `steal`
        unsafe { &*SYST::PTR }
    }
}

impl TimebaseTimer for SysTickTimer {
    const WIDTH: TimerWidth = TimerWidth::Bits24;

    /// Program the reload value and start counting on the core clock
    ///
    /// SysTick has no prescaler; only a divider of 1 is meaningful.
    fn configure(&self, period: u32, divider: u16) {
        if divider != 1 {
            #[cfg(feature = "defmt")]
            defmt::error!("SysTick has no prescaler, divider {} ignored", divider);
        }
        let regs = self.regs();
        // SAFETY: plain register writes on an owned peripheral
        unsafe {
            regs.csr.write(0);
            regs.rvr.write(period & COUNTER_MASK);
            regs.cvr.write(0);
            regs.csr.write(CSR_CLKSOURCE_CORE | CSR_ENABLE);
        }
    }

    fn reset(&self) {
        // SAFETY: as in `configure`
        unsafe { self.regs().csr.write(0) }
    }

    fn read_ticks(&self) -> u32 {
        let regs = self.regs();
        elapsed(regs.rvr.read(), regs.cvr.read())
    }

    fn overflow_pending(&self) -> bool {
        SCB::is_pendst_pending()
    }

    fn clear_overflow(&self) {
        SCB::clear_pendst();
    }

    fn enable_overflow_interrupt(&self) {
        // SAFETY: as in `configure`
        unsafe { self.regs().csr.modify(|v| v | CSR_TICKINT) }
    }

    fn disable_overflow_interrupt(&self) {
        // SAFETY: as in `configure`
        unsafe { self.regs().csr.modify(|v| v & !CSR_TICKINT) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_counts_up() {
        // 48 MHz, 1 ms period
        assert_eq!(elapsed(47_999, 47_999), 0);
        assert_eq!(elapsed(47_999, 0), 47_999);
        assert_eq!(elapsed(47_999, 40_000), 7_999);
    }

    #[test]
    fn test_elapsed_ignores_reserved_bits() {
        assert_eq!(elapsed(0xFF00_0010, 0xAA00_0004), 12);
    }
}
