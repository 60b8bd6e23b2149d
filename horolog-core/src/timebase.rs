//! Timebase context: query engine, overflow handler and lifecycle
//!
//! One [`Timebase`] exists per device, normally as a `static`. Foreground
//! code calls [`Timebase::millis`] / [`Timebase::micros`]; the overflow
//! interrupt vector calls [`Timebase::on_overflow`].
//!
//! # Concurrency
//!
//! The only concurrent actors are foreground code and the overflow
//! interrupt, which is never re-entered by its own source. Foreground
//! access to the shared counters happens inside `critical_section::with`
//! and is kept to a handful of loads and stores. If interrupts stay masked
//! for longer than one overflow period, the extra overflows are lost and
//! the clock runs slow; this is not compensated.

use core::cell::Cell;

use critical_section::Mutex;
use horolog_hal::TimebaseTimer;

use crate::accumulator::Counters;
use crate::config::{Accumulation, TimebaseConfig};
use crate::state::{LifecycleError, TimebaseState, Transition};

/// Decide how many overflows a snapshot really represents
///
/// A pending overflow together with a tick count still inside the race
/// window means the counter wrapped but the handler has not run yet, so
/// the snapshot is one overflow behind. A pending overflow with a high
/// tick count means the tick was read just before the wrap and the
/// snapshot is already consistent.
pub fn reconcile(overflows: u32, pending: bool, ticks: u32, race_window_ticks: u32) -> u32 {
    if pending && ticks < race_window_ticks {
        overflows.wrapping_add(1)
    } else {
        overflows
    }
}

/// Process-wide timekeeping context
pub struct Timebase<T> {
    timer: T,
    config: TimebaseConfig,
    counters: Mutex<Cell<Counters>>,
    state: Mutex<Cell<TimebaseState>>,
}

impl<T: TimebaseTimer> Timebase<T> {
    /// Create an uninitialised timebase
    ///
    /// Panics (at compile time in a `static`) if the configured period
    /// does not fit the timer's counter.
    pub const fn new(timer: T, config: TimebaseConfig) -> Self {
        assert!(
            config.period() <= T::WIDTH.max_period(),
            "timebase period exceeds the timer width"
        );
        Self {
            timer,
            config,
            counters: Mutex::new(Cell::new(Counters::ZERO)),
            state: Mutex::new(Cell::new(TimebaseState::Uninitialized)),
        }
    }

    /// Configuration this timebase was built with
    pub fn config(&self) -> &TimebaseConfig {
        &self.config
    }

    /// Underlying timer driver
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Current lifecycle state
    pub fn state(&self) -> TimebaseState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }

    /// Copy of the shared counters, taken atomically
    pub fn counters(&self) -> Counters {
        critical_section::with(|cs| self.counters.borrow(cs).get())
    }

    /// Program the timer, zero the counters and enable the overflow interrupt
    pub fn init(&self) -> Result<(), LifecycleError> {
        critical_section::with(|cs| {
            let state = self.state.borrow(cs);
            let next = state.get().apply(Transition::Init)?;

            self.timer
                .configure(self.config.period(), self.config.divider());
            self.timer.clear_overflow();
            self.counters.borrow(cs).set(Counters::ZERO);
            self.timer.enable_overflow_interrupt();

            state.set(next);
            Ok(())
        })?;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Timebase running: {:?}, {} us/overflow",
            self.config.timer(),
            self.config.us_per_overflow()
        );
        Ok(())
    }

    /// Disable the overflow interrupt, freezing the counters
    ///
    /// Tick-counting timebases (RTC) also halt the counter.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        critical_section::with(|cs| {
            let state = self.state.borrow(cs);
            let next = state.get().apply(Transition::Stop)?;

            self.timer.disable_overflow_interrupt();
            if self.config.accumulation() == Accumulation::Ticks {
                self.timer.halt();
            }

            state.set(next);
            Ok(())
        })?;

        #[cfg(feature = "defmt")]
        defmt::debug!("Timebase stopped");
        Ok(())
    }

    /// Re-apply the timer configuration and re-enable the overflow interrupt
    ///
    /// The counters keep their frozen values. Overflows latched while
    /// stopped are discarded.
    pub fn restart(&self) -> Result<(), LifecycleError> {
        critical_section::with(|cs| {
            let state = self.state.borrow(cs);
            let next = state.get().apply(Transition::Restart)?;

            self.timer.reset();
            self.timer
                .configure(self.config.period(), self.config.divider());
            self.timer.clear_overflow();
            self.timer.enable_overflow_interrupt();

            state.set(next);
            Ok(())
        })?;

        #[cfg(feature = "defmt")]
        defmt::debug!("Timebase restarted");
        Ok(())
    }

    /// Set the clock to `millis` milliseconds
    ///
    /// Millisecond timebases also rebase the overflow counter so that
    /// `micros()` follows to within one overflow period. Tick-counting
    /// timebases convert to 1024 Hz ticks; the conversion is rounded up so
    /// the next `millis()` reads back exactly `millis`, leaving the
    /// underlying count up to one tick ahead.
    pub fn set(&self, millis: u32) -> Result<(), LifecycleError> {
        critical_section::with(|cs| {
            let state = self.state.borrow(cs);
            state.get().apply(Transition::Set)?;

            let counters = self.counters.borrow(cs);
            match self.config.accumulation() {
                Accumulation::Milliseconds { .. } => {
                    let overflows =
                        millis as u64 * 1000 / self.config.us_per_overflow() as u64;
                    counters.set(Counters {
                        overflows: overflows as u32,
                        millis,
                        fract: 0,
                    });
                }
                Accumulation::Ticks => {
                    let ratio = self.config.us_per_tick();
                    let num = ratio.num as u64;
                    let scaled = millis as u64 * 1000 * ratio.den as u64;
                    let ticks = (scaled + num - 1) / num;
                    let per_overflow = self.config.ticks_per_overflow() as u64;

                    counters.set(Counters {
                        overflows: (ticks / per_overflow) as u32,
                        millis: 0,
                        fract: 0,
                    });
                    // The pending overflow, if any, belongs to the old time
                    self.timer.clear_overflow();
                    self.timer.write_ticks((ticks % per_overflow) as u32);
                }
            }
            Ok(())
        })?;

        #[cfg(feature = "defmt")]
        defmt::debug!("Timebase set to {} ms", millis);
        Ok(())
    }

    /// Overflow interrupt handler body
    ///
    /// Call from the timer's interrupt vector. Not re-entrant; runs in
    /// bounded time. Clears the hardware flag as its last action so an
    /// overflow that arrives while it runs is latched, not lost.
    pub fn on_overflow(&self) {
        critical_section::with(|cs| {
            let counters = self.counters.borrow(cs);
            let mut value = counters.get();
            value.accumulate(self.config.accumulation());
            counters.set(value);
        });
        self.timer.clear_overflow();
    }

    /// Check if `micros()` resolves below one millisecond
    ///
    /// False for tick-counting timebases, whose 1024 Hz tick is coarser
    /// than a millisecond.
    pub fn fine_grained(&self) -> bool {
        matches!(self.config.accumulation(), Accumulation::Milliseconds { .. })
    }

    /// Milliseconds since init, wrapping at `u32::MAX`
    pub fn millis(&self) -> u32 {
        match self.config.accumulation() {
            Accumulation::Milliseconds { .. } => {
                critical_section::with(|cs| self.counters.borrow(cs).get().millis)
            }
            Accumulation::Ticks => {
                let ratio = self.config.us_per_tick();
                let ticks = self.total_ticks();
                (ticks * ratio.num as u64 / (ratio.den as u64 * 1000)) as u32
            }
        }
    }

    /// Microseconds since init, wrapping at `u32::MAX`
    pub fn micros(&self) -> u32 {
        match self.config.accumulation() {
            Accumulation::Milliseconds { .. } => {
                let (overflows, ticks) = self.snapshot();
                overflows
                    .wrapping_mul(self.config.us_per_overflow())
                    .wrapping_add(self.config.ticks_to_us(ticks))
            }
            Accumulation::Ticks => {
                let ratio = self.config.us_per_tick();
                (self.total_ticks() * ratio.num as u64 / ratio.den as u64) as u32
            }
        }
    }

    fn total_ticks(&self) -> u64 {
        let (overflows, ticks) = self.snapshot();
        overflows as u64 * self.config.ticks_per_overflow() as u64 + ticks as u64
    }

    /// Consistent (overflows, ticks) pair
    ///
    /// The tick count is read before the pending flag, both with interrupts
    /// masked. Synchronised peripherals wait for their capture inside the
    /// critical section: the flag must be sampled after the capture has
    /// latched, or a wrap during the synchronisation wait would pair a
    /// post-wrap count with a clear flag. The wait is bounded at one
    /// synchroniser cycle.
    fn snapshot(&self) -> (u32, u32) {
        let sample = critical_section::with(|cs| {
            if self.state.borrow(cs).get() == TimebaseState::Uninitialized {
                return None;
            }
            if T::SYNCHRONIZED_CAPTURE {
                self.timer.start_capture();
            }
            let ticks = self.timer.read_ticks();
            let pending = self.timer.overflow_pending();
            let overflows = self.counters.borrow(cs).get().overflows;
            Some((overflows, pending, ticks))
        });

        let Some((overflows, pending, ticks)) = sample else {
            return (0, 0);
        };

        let overflows = reconcile(overflows, pending, ticks, self.config.race_window_ticks());
        (overflows, ticks)
    }
}
