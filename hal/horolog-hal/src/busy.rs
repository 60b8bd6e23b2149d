//! Calibrated busy loops
//!
//! Used for microsecond delays, where reading the timebase would cost more
//! than the delay itself, and for millisecond delays when timekeeping is
//! disabled.

/// A loop that burns a known number of CPU cycles per iteration
pub trait BusyLoop {
    /// CPU cycles consumed by one iteration of [`BusyLoop::spin`]
    const CYCLES_PER_ITERATION: u32;

    /// Fixed cost of calling into a delay, in CPU cycles
    ///
    /// Delays shorter than this return without spinning.
    const OVERHEAD_CYCLES: u32 = 16;

    /// Spin for `iterations` loop iterations
    fn spin(&self, iterations: u32);
}

/// Portable busy loop
///
/// `CYCLES` is the cost of one iteration on the target. The loop counter
/// goes through [`core::hint::black_box`], so the loop survives
/// optimisation even where [`core::hint::spin_loop`] compiles to nothing
/// (AVR). The default of 4 is the floor for a decrement-and-branch loop on
/// AVR and Cortex-M0; real iterations cost at least that much, so an
/// uncalibrated `SpinLoop` errs long, never short.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinLoop<const CYCLES: u32 = 4>;

impl<const CYCLES: u32> SpinLoop<CYCLES> {
    /// Create a new spin loop
    pub const fn new() -> Self {
        Self
    }
}

impl<const CYCLES: u32> BusyLoop for SpinLoop<CYCLES> {
    const CYCLES_PER_ITERATION: u32 = CYCLES;

    fn spin(&self, iterations: u32) {
        let mut remaining = iterations;
        while core::hint::black_box(remaining) > 0 {
            core::hint::spin_loop();
            remaining -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::time::Instant;

    #[test]
    fn test_spin_loop_cycles() {
        assert_eq!(<SpinLoop as BusyLoop>::CYCLES_PER_ITERATION, 4);
        assert_eq!(<SpinLoop<6> as BusyLoop>::CYCLES_PER_ITERATION, 6);
        assert_eq!(<SpinLoop as BusyLoop>::OVERHEAD_CYCLES, 16);
        SpinLoop::<4>::new().spin(100);
    }

    #[test]
    fn test_spin_loop_takes_time() {
        let start = Instant::now();
        SpinLoop::<4>::new().spin(0);
        let empty = start.elapsed();

        let start = Instant::now();
        SpinLoop::<4>::new().spin(20_000_000);
        let spun = start.elapsed();

        assert!(spun > empty, "spin(20_000_000) took {spun:?}");
        assert!(spun.as_micros() > 0);
    }
}
