//! Timebase timer abstraction
//!
//! A timebase timer is a free-running counter that reloads at a configured
//! top value and raises an interrupt on every reload. Everything the
//! timekeeping core needs from the peripheral goes through this trait.

/// Width of the hardware counter register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerWidth {
    /// 8-bit counter (e.g. one half of a split TCA0)
    Bits8,
    /// 12-bit counter (TCD0)
    Bits12,
    /// 16-bit counter (TCB, RTC)
    Bits16,
    /// 24-bit counter (Cortex-M SysTick)
    Bits24,
}

impl TimerWidth {
    /// Largest value the period (top) register can hold
    pub const fn max_period(self) -> u32 {
        match self {
            TimerWidth::Bits8 => 0xFF,
            TimerWidth::Bits12 => 0x0FFF,
            TimerWidth::Bits16 => 0xFFFF,
            TimerWidth::Bits24 => 0x00FF_FFFF,
        }
    }
}

/// Free-running overflow timer backing the timebase
///
/// All methods take `&self`: implementations are handles onto
/// memory-mapped peripherals and perform volatile register accesses, so
/// the same handle can be shared between foreground code and the overflow
/// interrupt.
///
/// Tick values are always reported as ticks elapsed since the last
/// overflow, in `0..=period`. Drivers for down-counting hardware convert
/// before returning.
pub trait TimebaseTimer {
    /// Width of the counter register
    const WIDTH: TimerWidth;

    /// True when the counter cannot be read directly and a capture command
    /// must be issued first (see [`TimebaseTimer::start_capture`])
    const SYNCHRONIZED_CAPTURE: bool = false;

    /// Program the peripheral to count at `clock / divider` and overflow
    /// after `period + 1` ticks.
    ///
    /// Does not enable the overflow interrupt.
    fn configure(&self, period: u32, divider: u16);

    /// Return the peripheral to the state `configure` expects
    ///
    /// Called before re-configuring on restart, since intervening code may
    /// have repurposed the timer.
    fn reset(&self) {}

    /// Issue a capture command for synchronised peripherals
    ///
    /// Must be cheap and non-blocking: it runs inside the critical section
    /// of `micros()`. The matching [`TimebaseTimer::read_ticks`] call,
    /// which may wait for the peripheral, happens after interrupts are
    /// restored.
    fn start_capture(&self) {}

    /// Ticks elapsed in the current period
    ///
    /// Never blocks longer than one peripheral synchronisation cycle.
    fn read_ticks(&self) -> u32;

    /// Overwrite the running count (RTC-style timebases only)
    fn write_ticks(&self, _ticks: u32) {}

    /// An overflow is latched but has not been serviced yet
    fn overflow_pending(&self) -> bool;

    /// Acknowledge the overflow in hardware
    fn clear_overflow(&self);

    /// Enable the overflow interrupt
    fn enable_overflow_interrupt(&self);

    /// Disable the overflow interrupt, leaving the counter running
    fn disable_overflow_interrupt(&self);

    /// Stop the counter itself, for timers that keep running in sleep
    fn halt(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_period() {
        assert_eq!(TimerWidth::Bits8.max_period(), 255);
        assert_eq!(TimerWidth::Bits12.max_period(), 4095);
        assert_eq!(TimerWidth::Bits16.max_period(), 65535);
        assert_eq!(TimerWidth::Bits24.max_period(), 16_777_215);
    }
}
