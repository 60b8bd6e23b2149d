//! Overflow accumulator
//!
//! The counters advanced by the overflow interrupt. Kept free of any
//! hardware or locking so the arithmetic can be tested on its own; the
//! [`Timebase`](crate::timebase::Timebase) wraps it in a critical-section
//! mutex.

use crate::config::{Accumulation, FRACT_MAX};

/// Counters shared between the overflow interrupt and foreground queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Counters {
    /// Overflows since init (wraps at `u32::MAX`)
    pub overflows: u32,
    /// Whole milliseconds since init, millisecond accumulation only
    pub millis: u32,
    /// Sub-millisecond remainder in thousandths, always `< FRACT_MAX`
    pub fract: u16,
}

impl Counters {
    /// All counters at zero
    pub const ZERO: Counters = Counters {
        overflows: 0,
        millis: 0,
        fract: 0,
    };

    /// Account for one overflow
    ///
    /// Runs in interrupt context: bounded time, no loops, no waiting.
    pub fn accumulate(&mut self, accumulation: Accumulation) {
        self.overflows = self.overflows.wrapping_add(1);

        if let Accumulation::Milliseconds {
            millis_inc,
            fract_inc,
        } = accumulation
        {
            let mut millis = self.millis.wrapping_add(millis_inc);
            let mut fract = self.fract + fract_inc;
            if fract >= FRACT_MAX {
                fract -= FRACT_MAX;
                millis = millis.wrapping_add(1);
            }
            self.fract = fract;
            self.millis = millis;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ONE_MS: Accumulation = Accumulation::Milliseconds {
        millis_inc: 1,
        fract_inc: 0,
    };

    // TCA0 at 16 MHz: 1020 µs per overflow
    const TCA_16MHZ: Accumulation = Accumulation::Milliseconds {
        millis_inc: 1,
        fract_inc: 20,
    };

    #[test]
    fn test_exact_millisecond() {
        let mut counters = Counters::ZERO;
        for _ in 0..1000 {
            counters.accumulate(ONE_MS);
        }
        assert_eq!(counters.millis, 1000);
        assert_eq!(counters.overflows, 1000);
        assert_eq!(counters.fract, 0);
    }

    #[test]
    fn test_fraction_carries() {
        let mut counters = Counters::ZERO;
        for _ in 0..49 {
            counters.accumulate(TCA_16MHZ);
        }
        // 49 * 1020 = 49980 µs
        assert_eq!(counters.millis, 49);
        assert_eq!(counters.fract, 980);

        counters.accumulate(TCA_16MHZ);
        // 50 * 1020 = 51000 µs, carry taken
        assert_eq!(counters.millis, 51);
        assert_eq!(counters.fract, 0);
    }

    #[test]
    fn test_tick_mode_counts_overflows_only() {
        let mut counters = Counters::ZERO;
        counters.accumulate(Accumulation::Ticks);
        counters.accumulate(Accumulation::Ticks);
        assert_eq!(
            counters,
            Counters {
                overflows: 2,
                millis: 0,
                fract: 0,
            }
        );
    }

    #[test]
    fn test_millis_wraps() {
        let mut counters = Counters {
            overflows: u32::MAX,
            millis: u32::MAX,
            fract: 999,
        };
        counters.accumulate(TCA_16MHZ);
        assert_eq!(counters.overflows, 0);
        // MAX + 1 + carry
        assert_eq!(counters.millis, 1);
        assert_eq!(counters.fract, 19);
    }

    proptest! {
        #[test]
        fn prop_millis_tracks_elapsed_time(
            us_per_overflow in 1u32..5000,
            overflows in 0u32..20_000,
        ) {
            let accumulation = Accumulation::Milliseconds {
                millis_inc: us_per_overflow / 1000,
                fract_inc: (us_per_overflow % 1000) as u16,
            };
            let mut counters = Counters::ZERO;
            for _ in 0..overflows {
                counters.accumulate(accumulation);
                prop_assert!(counters.fract < FRACT_MAX);
            }
            let elapsed_us = overflows as u64 * us_per_overflow as u64;
            prop_assert_eq!(counters.millis as u64, elapsed_us / 1000);
            prop_assert_eq!(counters.fract as u64, elapsed_us % 1000);
        }
    }
}
