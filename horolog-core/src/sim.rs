//! Simulated timer and interrupt harness
//!
//! [`SimTimer`] behaves like a free-running up-counter with a latched
//! overflow flag. [`SimMachine`] drives a [`Timebase`] built on it: it
//! advances simulated time and runs the overflow handler whenever the
//! interrupt is enabled and an overflow is latched, the way the hardware
//! would once interrupts are unmasked.
//!
//! Nothing here advances on its own. Tests decide exactly when time passes
//! and when the handler gets to run, which is what makes the race cases in
//! `micros()` reproducible.

use core::cell::Cell;

use horolog_hal::{TimebaseTimer, TimerWidth};

use crate::delay::Clock;
use crate::timebase::Timebase;

/// Simulated up-counting timer
#[derive(Debug, Default)]
pub struct SimTimer {
    period: Cell<u32>,
    divider: Cell<u16>,
    count: Cell<u32>,
    pending: Cell<bool>,
    interrupt_enabled: Cell<bool>,
    halted: Cell<bool>,
    latch_after_read: Cell<bool>,
    reads: Cell<u32>,
    resets: Cell<u32>,
}

impl SimTimer {
    /// Create an unconfigured timer at count zero
    pub const fn new() -> Self {
        Self {
            period: Cell::new(0),
            divider: Cell::new(0),
            count: Cell::new(0),
            pending: Cell::new(false),
            interrupt_enabled: Cell::new(false),
            halted: Cell::new(false),
            latch_after_read: Cell::new(false),
            reads: Cell::new(0),
            resets: Cell::new(0),
        }
    }

    /// Advance the counter by `ticks`, latching the overflow flag on wrap
    ///
    /// Returns the number of wraps. However many there were, only one
    /// overflow stays latched.
    pub fn advance(&self, ticks: u32) -> u32 {
        if self.halted.get() {
            return 0;
        }
        let ticks_per_overflow = self.period.get() as u64 + 1;
        let total = self.count.get() as u64 + ticks as u64;
        let wraps = (total / ticks_per_overflow) as u32;
        self.count.set((total % ticks_per_overflow) as u32);
        if wraps > 0 {
            self.pending.set(true);
        }
        wraps
    }

    /// Ticks left before the next wrap
    pub fn ticks_until_overflow(&self) -> u32 {
        self.period.get() - self.count.get() + 1
    }

    /// Latch an overflow immediately after the next tick read
    ///
    /// Reproduces the counter wrapping between the tick read and the
    /// pending-flag read inside `micros()`.
    pub fn latch_overflow_after_next_read(&self) {
        self.latch_after_read.set(true);
    }

    /// Force the counter value
    pub fn set_count(&self, ticks: u32) {
        self.count.set(ticks);
    }

    /// Current counter value
    pub fn count(&self) -> u32 {
        self.count.get()
    }

    /// Period last passed to `configure`
    pub fn period(&self) -> u32 {
        self.period.get()
    }

    /// Divider last passed to `configure`
    pub fn divider(&self) -> u16 {
        self.divider.get()
    }

    /// Overflow interrupt enabled
    pub fn interrupt_enabled(&self) -> bool {
        self.interrupt_enabled.get()
    }

    /// Counter halted
    pub fn halted(&self) -> bool {
        self.halted.get()
    }

    /// Number of tick reads so far
    pub fn reads(&self) -> u32 {
        self.reads.get()
    }

    /// Number of `reset` calls so far
    pub fn resets(&self) -> u32 {
        self.resets.get()
    }
}

impl TimebaseTimer for SimTimer {
    const WIDTH: TimerWidth = TimerWidth::Bits24;

    fn configure(&self, period: u32, divider: u16) {
        self.period.set(period);
        self.divider.set(divider);
        self.halted.set(false);
        if self.count.get() > period {
            self.count.set(0);
        }
    }

    fn reset(&self) {
        self.resets.set(self.resets.get() + 1);
    }

    fn read_ticks(&self) -> u32 {
        self.reads.set(self.reads.get() + 1);
        if self.latch_after_read.take() {
            self.pending.set(true);
        }
        self.count.get()
    }

    fn write_ticks(&self, ticks: u32) {
        self.count.set(ticks);
    }

    fn overflow_pending(&self) -> bool {
        self.pending.get()
    }

    fn clear_overflow(&self) {
        self.pending.set(false);
    }

    fn enable_overflow_interrupt(&self) {
        self.interrupt_enabled.set(true);
    }

    fn disable_overflow_interrupt(&self) {
        self.interrupt_enabled.set(false);
    }

    fn halt(&self) {
        self.halted.set(true);
    }
}

/// Simulated timer that must be read through a capture command, like TCD0
#[derive(Debug, Default)]
pub struct SyncSimTimer {
    inner: SimTimer,
    captured: Cell<u32>,
    captures: Cell<u32>,
    late_capture: Cell<bool>,
}

impl SyncSimTimer {
    /// Create an unconfigured timer at count zero
    pub const fn new() -> Self {
        Self {
            inner: SimTimer::new(),
            captured: Cell::new(0),
            captures: Cell::new(0),
            late_capture: Cell::new(false),
        }
    }

    /// Let the counter wrap before the next capture latches
    ///
    /// The next `read_ticks` resolves to one tick past the wrap, with the
    /// overflow flag latched, as when the wrap lands inside the
    /// synchronisation wait.
    pub fn wrap_before_capture_latches(&self) {
        self.late_capture.set(true);
    }

    /// Number of capture commands issued
    pub fn captures(&self) -> u32 {
        self.captures.get()
    }
}

impl TimebaseTimer for SyncSimTimer {
    const WIDTH: TimerWidth = TimerWidth::Bits24;
    const SYNCHRONIZED_CAPTURE: bool = true;

    fn configure(&self, period: u32, divider: u16) {
        self.inner.configure(period, divider);
    }

    fn reset(&self) {
        self.inner.reset();
    }

    fn start_capture(&self) {
        self.captures.set(self.captures.get() + 1);
        self.captured.set(self.inner.count());
    }

    fn read_ticks(&self) -> u32 {
        self.inner.reads.set(self.inner.reads.get() + 1);
        if self.late_capture.take() {
            self.inner.advance(self.inner.ticks_until_overflow() + 1);
            self.captured.set(self.inner.count());
        }
        self.captured.get()
    }

    fn overflow_pending(&self) -> bool {
        self.inner.overflow_pending()
    }

    fn clear_overflow(&self) {
        self.inner.clear_overflow();
    }

    fn enable_overflow_interrupt(&self) {
        self.inner.enable_overflow_interrupt();
    }

    fn disable_overflow_interrupt(&self) {
        self.inner.disable_overflow_interrupt();
    }
}

/// Access to the underlying [`SimTimer`] of a simulated driver
pub trait Simulated {
    fn sim(&self) -> &SimTimer;
}

impl Simulated for SimTimer {
    fn sim(&self) -> &SimTimer {
        self
    }
}

impl Simulated for SyncSimTimer {
    fn sim(&self) -> &SimTimer {
        &self.inner
    }
}

/// Drives a simulated timebase: advances time and services overflows
pub struct SimMachine<'a, T> {
    timebase: &'a Timebase<T>,
    ticks_per_poll: u32,
    elapsed_ticks: Cell<u64>,
    polls: Cell<u32>,
}

impl<'a, T: TimebaseTimer + Simulated> SimMachine<'a, T> {
    /// Create a harness that advances one tick per clock query
    pub fn new(timebase: &'a Timebase<T>) -> Self {
        Self {
            timebase,
            ticks_per_poll: 1,
            elapsed_ticks: Cell::new(0),
            polls: Cell::new(0),
        }
    }

    /// Set how far time advances on every clock query
    pub fn with_ticks_per_poll(mut self, ticks: u32) -> Self {
        self.ticks_per_poll = ticks;
        self
    }

    /// Let `ticks` timer ticks pass
    ///
    /// Every wrap is serviced before the next one if the overflow
    /// interrupt is enabled; otherwise the flag stays latched.
    pub fn run_ticks(&self, ticks: u32) {
        let sim = self.timebase.timer().sim();
        let mut remaining = ticks;
        while remaining > 0 {
            let step = remaining.min(sim.ticks_until_overflow());
            sim.advance(step);
            self.elapsed_ticks.set(self.elapsed_ticks.get() + step as u64);
            remaining -= step;

            if sim.overflow_pending() && sim.interrupt_enabled() {
                self.timebase.on_overflow();
            }
        }
    }

    /// Ticks of simulated time since this harness was created
    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks.get()
    }

    /// Simulated time since this harness was created (µs)
    pub fn elapsed_us(&self) -> u64 {
        let ratio = self.timebase.config().us_per_tick();
        self.elapsed_ticks() * ratio.num as u64 / ratio.den as u64
    }

    /// Number of clock queries answered
    pub fn polls(&self) -> u32 {
        self.polls.get()
    }

    fn poll(&self) {
        self.polls.set(self.polls.get() + 1);
        self.run_ticks(self.ticks_per_poll);
    }
}

impl<T: TimebaseTimer + Simulated> Clock for SimMachine<'_, T> {
    fn millis(&self) -> u32 {
        self.poll();
        self.timebase.millis()
    }

    fn micros(&self) -> u32 {
        self.poll();
        self.timebase.micros()
    }

    fn fine_grained(&self) -> bool {
        self.timebase.fine_grained()
    }

    fn is_running(&self) -> bool {
        self.timebase.state().is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_latches_single_overflow() {
        let timer = SimTimer::new();
        timer.configure(9, 1);
        assert_eq!(timer.advance(25), 2);
        assert_eq!(timer.count(), 5);
        assert!(timer.overflow_pending());
        timer.clear_overflow();
        assert!(!timer.overflow_pending());
    }

    #[test]
    fn test_halted_timer_does_not_count() {
        let timer = SimTimer::new();
        timer.configure(9, 1);
        timer.halt();
        assert_eq!(timer.advance(25), 0);
        assert_eq!(timer.count(), 0);
    }

    #[test]
    fn test_capture_holds_value() {
        let timer = SyncSimTimer::new();
        timer.configure(99, 1);
        timer.inner.advance(10);
        timer.start_capture();
        timer.inner.advance(30);
        assert_eq!(timer.read_ticks(), 10);
    }
}
