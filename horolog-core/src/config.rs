//! Timebase configuration
//!
//! A [`TimebaseConfig`] fixes everything about the timebase that is known
//! at build time: which timer backs it, how fast that timer counts, where
//! it overflows, and how each overflow is turned into milliseconds.
//!
//! All constructors are `const fn`. Building a configuration in a `const`
//! or `static` turns an unsupported combination into a compile error.

use horolog_hal::TimerWidth;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fractional units per millisecond carried by the overflow accumulator
pub const FRACT_MAX: u16 = 1000;

/// Worst-case interrupt latency assumed when none is configured (µs)
pub const DEFAULT_IRQ_LATENCY_US: u16 = 64;

/// CPU frequencies supported by the tinyAVR timer tables
pub const MEGATINY_CPU_HZ: [u32; 7] = [
    1_000_000, 4_000_000, 5_000_000, 8_000_000, 10_000_000, 16_000_000, 20_000_000,
];

/// RTC input clock (32.768 kHz oscillator or crystal)
pub const RTC_CLOCK_HZ: u32 = 32_768;

/// Hardware timer backing the timebase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MillisTimer {
    /// TCA0 in split mode, high half (8-bit, down-counting)
    Tca0,
    /// TCB0 in periodic interrupt mode
    Tcb0,
    /// TCB1 in periodic interrupt mode
    Tcb1,
    /// TCD0 in one-ramp mode, read through capture
    Tcd0,
    /// RTC counting the 32.768 kHz clock prescaled by 32
    Rtc,
    /// Cortex-M SysTick
    SysTick,
    /// Hand-picked period and divider (see [`TimebaseConfig::custom`])
    Custom,
}

/// How an overflow interrupt advances the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Accumulation {
    /// Each overflow adds whole milliseconds plus a fractional remainder
    ///
    /// `fract_inc` is in thousandths of a millisecond and is always below
    /// [`FRACT_MAX`].
    Milliseconds { millis_inc: u32, fract_inc: u16 },
    /// Only overflows are counted; time is derived from the live count
    ///
    /// Used by the RTC, whose period is far longer than a millisecond.
    Ticks,
}

/// Errors from deriving a timebase configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The CPU frequency is not one the selected timer supports
    UnsupportedFrequency,
    /// Period of zero ticks
    ZeroPeriod,
    /// Period wider than any supported timer counter (24 bits), or one
    /// overflow longer than `u32::MAX` µs
    PeriodTooLarge,
    /// [`MillisTimer::Custom`] has no derived period; use
    /// [`TimebaseConfig::custom`]
    CustomNeedsPeriod,
    /// Clock divider of zero
    ZeroDivider,
    /// The timer input clock is not a whole number of MHz
    FractionalMhz,
    /// One overflow is shorter than a microsecond
    OverflowTooShort,
}

/// Rational number of microseconds per timer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TickRatio {
    /// Numerator (µs)
    pub num: u32,
    /// Denominator (ticks)
    pub den: u32,
}

/// Immutable timebase configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimebaseConfig {
    timer: MillisTimer,
    cpu_hz: u32,
    timer_clock_hz: u32,
    period: u32,
    divider: u16,
    accumulation: Accumulation,
    us_per_overflow: u32,
    us_per_tick: TickRatio,
    irq_latency_us: u16,
    race_window_ticks: u32,
}

const fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

const fn is_megatiny_frequency(cpu_hz: u32) -> bool {
    let mut i = 0;
    while i < MEGATINY_CPU_HZ.len() {
        if MEGATINY_CPU_HZ[i] == cpu_hz {
            return true;
        }
        i += 1;
    }
    false
}

impl TimebaseConfig {
    /// Derive the configuration for `timer` at `cpu_hz`
    ///
    /// Panics (at compile time when used in a `const`) if the combination
    /// is unsupported. Use [`TimebaseConfig::for_timer`] to handle the
    /// error instead.
    pub const fn new(timer: MillisTimer, cpu_hz: u32) -> Self {
        match Self::for_timer(timer, cpu_hz) {
            Ok(config) => config,
            Err(_) => panic!("unsupported timebase timer / CPU frequency combination"),
        }
    }

    /// Derive the configuration for `timer` at `cpu_hz`
    ///
    /// Periods and dividers follow the tinyAVR core's timer tables; SysTick
    /// reloads every millisecond.
    pub const fn for_timer(timer: MillisTimer, cpu_hz: u32) -> Result<Self, ConfigError> {
        match timer {
            MillisTimer::Tca0 => {
                if !is_megatiny_frequency(cpu_hz) {
                    return Err(ConfigError::UnsupportedFrequency);
                }
                let divider = match cpu_hz {
                    5_000_000 | 4_000_000 => 16,
                    1_000_000 => 8,
                    _ => 64,
                };
                Self::build(timer, cpu_hz, cpu_hz, 0xFE, divider, false)
            }
            MillisTimer::Tcb0 | MillisTimer::Tcb1 => {
                if !is_megatiny_frequency(cpu_hz) {
                    return Err(ConfigError::UnsupportedFrequency);
                }
                if cpu_hz == 1_000_000 {
                    Self::build(timer, cpu_hz, cpu_hz, cpu_hz / 500 - 1, 1, false)
                } else {
                    Self::build(timer, cpu_hz, cpu_hz, cpu_hz / 2000 - 1, 2, false)
                }
            }
            MillisTimer::Tcd0 => {
                if !is_megatiny_frequency(cpu_hz) {
                    return Err(ConfigError::UnsupportedFrequency);
                }
                // TCD0 always runs from the internal oscillator, not CLK_PER
                let timer_clock_hz = match cpu_hz {
                    20_000_000 | 10_000_000 | 5_000_000 => 20_000_000,
                    _ => 16_000_000,
                };
                let divider = if cpu_hz == 1_000_000 { 64 } else { 32 };
                Self::build(timer, cpu_hz, timer_clock_hz, 0x1FD, divider, false)
            }
            MillisTimer::Rtc => Self::build(timer, cpu_hz, RTC_CLOCK_HZ, 0xFFFF, 32, true),
            MillisTimer::SysTick => {
                if cpu_hz == 0 || cpu_hz % 1_000_000 != 0 {
                    return Err(ConfigError::UnsupportedFrequency);
                }
                Self::build(timer, cpu_hz, cpu_hz, cpu_hz / 1000 - 1, 1, false)
            }
            MillisTimer::Custom => Err(ConfigError::CustomNeedsPeriod),
        }
    }

    /// Build a configuration from a hand-picked period and divider
    ///
    /// The timer is assumed to count the CPU clock. For example
    /// `custom(249, 64, 16_000_000)` overflows every 250 ticks of 4 µs,
    /// exactly once per millisecond.
    pub const fn custom(period: u32, divider: u16, cpu_hz: u32) -> Result<Self, ConfigError> {
        Self::build(MillisTimer::Custom, cpu_hz, cpu_hz, period, divider, false)
    }

    const fn build(
        timer: MillisTimer,
        cpu_hz: u32,
        timer_clock_hz: u32,
        period: u32,
        divider: u16,
        tick_counting: bool,
    ) -> Result<Self, ConfigError> {
        if period == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if period > TimerWidth::Bits24.max_period() {
            return Err(ConfigError::PeriodTooLarge);
        }
        if divider == 0 {
            return Err(ConfigError::ZeroDivider);
        }
        if !tick_counting && timer_clock_hz % 1_000_000 != 0 {
            return Err(ConfigError::FractionalMhz);
        }

        let ticks_per_overflow = period as u64 + 1;
        let cycles_per_overflow = ticks_per_overflow * divider as u64;
        let us_per_overflow = cycles_per_overflow * 1_000_000 / timer_clock_hz as u64;
        if us_per_overflow == 0 {
            return Err(ConfigError::OverflowTooShort);
        }
        if us_per_overflow > u32::MAX as u64 {
            return Err(ConfigError::PeriodTooLarge);
        }

        let num = divider as u64 * 1_000_000;
        let den = timer_clock_hz as u64;
        let g = gcd(num, den);
        let us_per_tick = TickRatio {
            num: (num / g) as u32,
            den: (den / g) as u32,
        };

        let accumulation = if tick_counting {
            Accumulation::Ticks
        } else {
            Accumulation::Milliseconds {
                millis_inc: (us_per_overflow / 1000) as u32,
                fract_inc: (us_per_overflow % 1000) as u16,
            }
        };

        let config = Self {
            timer,
            cpu_hz,
            timer_clock_hz,
            period,
            divider,
            accumulation,
            us_per_overflow: us_per_overflow as u32,
            us_per_tick,
            irq_latency_us: DEFAULT_IRQ_LATENCY_US,
            race_window_ticks: 0,
        };
        Ok(config.with_irq_latency_us(DEFAULT_IRQ_LATENCY_US))
    }

    /// Set the worst-case interrupt latency and re-derive the race window
    ///
    /// The window is the number of ticks that can elapse between the
    /// hardware latching an overflow and the overflow handler running,
    /// clamped to `1..=ticks_per_overflow / 2`.
    pub const fn with_irq_latency_us(mut self, latency_us: u16) -> Self {
        let latency_cycles = latency_us as u64 * self.timer_clock_hz as u64 / 1_000_000;
        let divider = self.divider as u64;
        let mut window = (latency_cycles + divider - 1) / divider;
        let half_period = self.ticks_per_overflow() as u64 / 2;
        if window > half_period {
            window = half_period;
        }
        if window == 0 {
            window = 1;
        }
        self.irq_latency_us = latency_us;
        self.race_window_ticks = window as u32;
        self
    }

    /// Timer backing the timebase
    pub const fn timer(&self) -> MillisTimer {
        self.timer
    }

    /// CPU clock frequency (Hz)
    pub const fn cpu_hz(&self) -> u32 {
        self.cpu_hz
    }

    /// Timer input clock before the divider (Hz)
    ///
    /// Differs from [`TimebaseConfig::cpu_hz`] for timers running off an
    /// independent oscillator (TCD0, RTC).
    pub const fn timer_clock_hz(&self) -> u32 {
        self.timer_clock_hz
    }

    /// Value written to the period (top) register
    pub const fn period(&self) -> u32 {
        self.period
    }

    /// Ticks between two overflows
    pub const fn ticks_per_overflow(&self) -> u32 {
        self.period + 1
    }

    /// Clock divider (prescaler)
    pub const fn divider(&self) -> u16 {
        self.divider
    }

    /// How overflows are accumulated
    pub const fn accumulation(&self) -> Accumulation {
        self.accumulation
    }

    /// Whole microseconds per overflow, truncated
    pub const fn us_per_overflow(&self) -> u32 {
        self.us_per_overflow
    }

    /// Microseconds per tick as a reduced fraction
    pub const fn us_per_tick(&self) -> TickRatio {
        self.us_per_tick
    }

    /// Configured worst-case interrupt latency (µs)
    pub const fn irq_latency_us(&self) -> u16 {
        self.irq_latency_us
    }

    /// Tick threshold below which a pending overflow is treated as unserviced
    pub const fn race_window_ticks(&self) -> u32 {
        self.race_window_ticks
    }

    /// Convert ticks within one period to microseconds
    pub const fn ticks_to_us(&self, ticks: u32) -> u32 {
        ((ticks as u64 * self.us_per_tick.num as u64) / self.us_per_tick.den as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis_increments(config: &TimebaseConfig) -> (u32, u16) {
        match config.accumulation() {
            Accumulation::Milliseconds {
                millis_inc,
                fract_inc,
            } => (millis_inc, fract_inc),
            Accumulation::Ticks => panic!("expected millisecond accumulation"),
        }
    }

    #[test]
    fn test_custom_one_millisecond() {
        let config = TimebaseConfig::custom(249, 64, 16_000_000).unwrap();
        assert_eq!(config.ticks_per_overflow(), 250);
        assert_eq!(config.us_per_overflow(), 1000);
        assert_eq!(millis_increments(&config), (1, 0));
        assert_eq!(config.us_per_tick(), TickRatio { num: 4, den: 1 });
    }

    #[test]
    fn test_tca0_16mhz() {
        let config = TimebaseConfig::new(MillisTimer::Tca0, 16_000_000);
        assert_eq!(config.period(), 254);
        assert_eq!(config.divider(), 64);
        // 255 ticks * 4 µs
        assert_eq!(config.us_per_overflow(), 1020);
        assert_eq!(millis_increments(&config), (1, 20));
    }

    #[test]
    fn test_tca0_dividers() {
        assert_eq!(TimebaseConfig::new(MillisTimer::Tca0, 5_000_000).divider(), 16);
        assert_eq!(TimebaseConfig::new(MillisTimer::Tca0, 4_000_000).divider(), 16);
        assert_eq!(TimebaseConfig::new(MillisTimer::Tca0, 1_000_000).divider(), 8);
        assert_eq!(TimebaseConfig::new(MillisTimer::Tca0, 20_000_000).divider(), 64);

        let config = TimebaseConfig::new(MillisTimer::Tca0, 20_000_000);
        assert_eq!(config.us_per_overflow(), 816);
        assert_eq!(config.us_per_tick(), TickRatio { num: 16, den: 5 });
    }

    #[test]
    fn test_tcb_exact_millisecond() {
        for &hz in MEGATINY_CPU_HZ.iter().filter(|&&hz| hz != 1_000_000) {
            let config = TimebaseConfig::new(MillisTimer::Tcb0, hz);
            assert_eq!(config.divider(), 2);
            assert_eq!(config.period(), hz / 2000 - 1);
            assert_eq!(millis_increments(&config), (1, 0));
        }
    }

    #[test]
    fn test_tcb_1mhz_two_milliseconds() {
        let config = TimebaseConfig::new(MillisTimer::Tcb1, 1_000_000);
        assert_eq!(config.divider(), 1);
        assert_eq!(config.period(), 1999);
        assert_eq!(millis_increments(&config), (2, 0));
    }

    #[test]
    fn test_tcd0_independent_clock() {
        let config = TimebaseConfig::new(MillisTimer::Tcd0, 10_000_000);
        assert_eq!(config.timer_clock_hz(), 20_000_000);
        assert_eq!(config.us_per_overflow(), 816);

        let config = TimebaseConfig::new(MillisTimer::Tcd0, 8_000_000);
        assert_eq!(config.timer_clock_hz(), 16_000_000);
        assert_eq!(config.us_per_overflow(), 1020);

        let config = TimebaseConfig::new(MillisTimer::Tcd0, 1_000_000);
        assert_eq!(config.divider(), 64);
        assert_eq!(config.us_per_overflow(), 2040);
    }

    #[test]
    fn test_rtc_counts_ticks() {
        let config = TimebaseConfig::new(MillisTimer::Rtc, 20_000_000);
        assert_eq!(config.accumulation(), Accumulation::Ticks);
        assert_eq!(config.ticks_per_overflow(), 65536);
        assert_eq!(config.us_per_tick(), TickRatio { num: 15625, den: 16 });
        assert_eq!(config.us_per_overflow(), 64_000_000);
    }

    #[test]
    fn test_systick_reload() {
        let config = TimebaseConfig::new(MillisTimer::SysTick, 48_000_000);
        assert_eq!(config.period(), 47_999);
        assert_eq!(millis_increments(&config), (1, 0));
    }

    #[test]
    fn test_unsupported_frequency() {
        assert_eq!(
            TimebaseConfig::for_timer(MillisTimer::Tca0, 12_000_000),
            Err(ConfigError::UnsupportedFrequency)
        );
        assert_eq!(
            TimebaseConfig::for_timer(MillisTimer::SysTick, 12_500_000),
            Err(ConfigError::UnsupportedFrequency)
        );
    }

    #[test]
    fn test_custom_rejects_zero() {
        assert_eq!(
            TimebaseConfig::custom(0, 64, 16_000_000),
            Err(ConfigError::ZeroPeriod)
        );
        assert_eq!(
            TimebaseConfig::custom(249, 0, 16_000_000),
            Err(ConfigError::ZeroDivider)
        );
        assert_eq!(
            TimebaseConfig::custom(249, 64, 16_500_000),
            Err(ConfigError::FractionalMhz)
        );
    }

    #[test]
    fn test_custom_rejects_oversized_period() {
        assert_eq!(
            TimebaseConfig::custom(u32::MAX, 1, 16_000_000),
            Err(ConfigError::PeriodTooLarge)
        );
        assert_eq!(
            TimebaseConfig::custom(0x0100_0000, 1, 16_000_000),
            Err(ConfigError::PeriodTooLarge)
        );
        let widest = TimebaseConfig::custom(0x00FF_FFFF, 1, 16_000_000).unwrap();
        assert_eq!(widest.ticks_per_overflow(), 0x0100_0000);
    }

    #[test]
    fn test_custom_timer_needs_explicit_period() {
        assert_eq!(
            TimebaseConfig::for_timer(MillisTimer::Custom, 16_000_000),
            Err(ConfigError::CustomNeedsPeriod)
        );
    }

    #[test]
    fn test_race_window_from_latency() {
        // 64 µs at 16 MHz / 64 = 16 ticks
        let config = TimebaseConfig::new(MillisTimer::Tca0, 16_000_000);
        assert_eq!(config.race_window_ticks(), 16);

        // 10 µs at 16 MHz / 64 = 2.5 ticks, rounded up
        let config = config.with_irq_latency_us(10);
        assert_eq!(config.race_window_ticks(), 3);

        // Never more than half a period
        let config = config.with_irq_latency_us(u16::MAX);
        assert_eq!(config.race_window_ticks(), 127);

        // Never zero
        let config = TimebaseConfig::new(MillisTimer::Rtc, 16_000_000).with_irq_latency_us(0);
        assert_eq!(config.race_window_ticks(), 1);
    }

    #[test]
    fn test_ticks_to_us() {
        let config = TimebaseConfig::new(MillisTimer::Tcd0, 20_000_000);
        // 32 / 20 MHz = 1.6 µs per tick
        assert_eq!(config.ticks_to_us(10), 16);
        assert_eq!(config.ticks_to_us(509), 814);
    }
}
