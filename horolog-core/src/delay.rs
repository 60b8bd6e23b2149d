//! Blocking delays
//!
//! Millisecond delays poll a [`Clock`] and compare differences, so they are
//! safe across the `u32` wrap and never mask interrupts while waiting.
//! Microsecond delays are cycle-counted busy loops: reading the timebase
//! would cost more than the delay itself.

use embedded_hal::delay::DelayNs;
use horolog_hal::{BusyLoop, TimebaseTimer};

use crate::timebase::Timebase;

/// Source of elapsed time for delays
pub trait Clock {
    /// Milliseconds since init
    fn millis(&self) -> u32;

    /// Microseconds since init
    fn micros(&self) -> u32;

    /// Check if `micros()` resolves below one millisecond
    fn fine_grained(&self) -> bool;

    /// Check if time is advancing
    ///
    /// False before init and while stopped; polling such a clock would
    /// never see the wait end.
    fn is_running(&self) -> bool;
}

impl<T: TimebaseTimer> Clock for Timebase<T> {
    fn millis(&self) -> u32 {
        Timebase::millis(self)
    }

    fn micros(&self) -> u32 {
        Timebase::micros(self)
    }

    fn fine_grained(&self) -> bool {
        Timebase::fine_grained(self)
    }

    fn is_running(&self) -> bool {
        self.state().is_running()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn millis(&self) -> u32 {
        (**self).millis()
    }

    fn micros(&self) -> u32 {
        (**self).micros()
    }

    fn fine_grained(&self) -> bool {
        (**self).fine_grained()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }
}

/// Clock type for builds with timekeeping disabled
///
/// Uninhabited: a [`Delay`] over `NoClock` can only be built with
/// [`Delay::without_clock`].
#[derive(Debug, Clone, Copy)]
pub enum NoClock {}

impl Clock for NoClock {
    fn millis(&self) -> u32 {
        match *self {}
    }

    fn micros(&self) -> u32 {
        match *self {}
    }

    fn fine_grained(&self) -> bool {
        match *self {}
    }

    fn is_running(&self) -> bool {
        match *self {}
    }
}

/// Wait at least `ms` milliseconds
///
/// Fine-grained clocks are polled in 1000 µs steps on `micros()`, so the
/// wait ends less than one overflow period late. Coarse clocks (RTC) poll
/// `millis()` and wait for one extra increment, since the start sample may
/// land just before a millisecond boundary.
///
/// A clock that is not running (uninitialised or stopped) cannot be
/// polled; the wait falls back to `spinner`, 1000 busy-loop microseconds
/// per millisecond.
///
/// `ms == 0` returns without touching the clock.
pub fn delay_ms<C: Clock + ?Sized, B: BusyLoop>(
    clock: &C,
    spinner: &B,
    cpu_hz: u32,
    ms: u32,
) {
    if ms == 0 {
        return;
    }

    if !clock.is_running() {
        spin_ms(spinner, cpu_hz, ms);
    } else if clock.fine_grained() {
        let mut remaining = ms;
        let mut start = clock.micros();
        while remaining > 0 {
            if clock.micros().wrapping_sub(start) >= 1000 {
                remaining -= 1;
                start = start.wrapping_add(1000);
            }
        }
    } else {
        let start = clock.millis();
        while clock.millis().wrapping_sub(start) <= ms {}
    }
}

/// Wait `ms` milliseconds on the busy loop alone
pub fn spin_ms<B: BusyLoop>(spinner: &B, cpu_hz: u32, ms: u32) {
    for _ in 0..ms {
        delay_us(spinner, cpu_hz, 1000);
    }
}

/// Busy-loop iterations for a `us` microsecond delay
///
/// The call overhead is subtracted first; delays shorter than the overhead
/// get zero iterations and return early. The product is formed in `u64` so
/// `u16::MAX` µs at any supported clock cannot overflow.
pub const fn spin_iterations(
    cpu_hz: u32,
    us: u16,
    cycles_per_iteration: u32,
    overhead_cycles: u32,
) -> u32 {
    let cycles = (us as u64 * cpu_hz as u64 / 1_000_000) as u32;
    if cycles <= overhead_cycles || cycles_per_iteration == 0 {
        return 0;
    }
    (cycles - overhead_cycles) / cycles_per_iteration
}

/// Busy-wait `us` microseconds on a calibrated loop
pub fn delay_us<B: BusyLoop>(spinner: &B, cpu_hz: u32, us: u16) {
    let iterations = spin_iterations(
        cpu_hz,
        us,
        B::CYCLES_PER_ITERATION,
        B::OVERHEAD_CYCLES,
    );
    if iterations > 0 {
        spinner.spin(iterations);
    }
}

/// Blocking delay provider
///
/// Uses the clock for milliseconds and the busy loop for microseconds.
/// Built with [`Delay::without_clock`], or while the clock is not running,
/// milliseconds become 1000 busy-loop microseconds each.
pub struct Delay<'a, C: ?Sized, B> {
    clock: Option<&'a C>,
    spinner: B,
    cpu_hz: u32,
}

impl<'a, C: Clock + ?Sized, B: BusyLoop> Delay<'a, C, B> {
    pub const fn new(clock: &'a C, spinner: B, cpu_hz: u32) -> Self {
        Self {
            clock: Some(clock),
            spinner,
            cpu_hz,
        }
    }

    /// Wait at least `ms` milliseconds
    pub fn block_ms(&self, ms: u32) {
        match self.clock {
            Some(clock) => delay_ms(clock, &self.spinner, self.cpu_hz, ms),
            None => spin_ms(&self.spinner, self.cpu_hz, ms),
        }
    }

    /// Wait `us` microseconds on the busy loop
    pub fn block_us(&self, us: u16) {
        delay_us(&self.spinner, self.cpu_hz, us);
    }
}

impl<B: BusyLoop> Delay<'static, NoClock, B> {
    /// Delay provider for builds with timekeeping disabled
    pub const fn without_clock(spinner: B, cpu_hz: u32) -> Self {
        Self {
            clock: None,
            spinner,
            cpu_hz,
        }
    }
}

impl<C: Clock + ?Sized, B: BusyLoop> DelayNs for Delay<'_, C, B> {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_us(ns.div_ceil(1000));
    }

    fn delay_us(&mut self, mut us: u32) {
        while us > 0 {
            let chunk = us.min(u16::MAX as u32);
            self.block_us(chunk as u16);
            us -= chunk;
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        self.block_ms(ms);
    }
}
