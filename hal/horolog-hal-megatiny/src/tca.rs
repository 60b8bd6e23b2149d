//! TCA0 in split mode
//!
//! Split mode turns TCA0 into two 8-bit down-counters sharing one
//! prescaler. The low half stays free for PWM; the high half runs the
//! timebase and raises HUNF on every underflow.

use horolog_hal::{TimebaseTimer, TimerWidth};

use crate::bus::{Mmio, RegisterBus};

const BASE: u16 = 0x0A00;

const CTRLA: u16 = BASE;
const CTRLD: u16 = BASE + 0x03;
const INTCTRL: u16 = BASE + 0x0A;
const INTFLAGS: u16 = BASE + 0x0B;
const HCNT: u16 = BASE + 0x21;
const HPER: u16 = BASE + 0x27;

const ENABLE: u8 = 1 << 0;
const SPLITM: u8 = 1 << 0;
/// High-half underflow, in both INTCTRL and INTFLAGS
const HUNF: u8 = 1 << 1;

/// CTRLA clock select bits for a prescaler divider
const fn clksel(divider: u16) -> Option<u8> {
    let select = match divider {
        1 => 0,
        2 => 1,
        4 => 2,
        8 => 3,
        16 => 4,
        64 => 5,
        256 => 6,
        1024 => 7,
        _ => return None,
    };
    Some(select << 1)
}

/// High half of a split-mode TCA0
pub struct Tca0Split<B = Mmio> {
    bus: B,
}

impl<B: RegisterBus> Tca0Split<B> {
    pub const fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B: RegisterBus> TimebaseTimer for Tca0Split<B> {
    const WIDTH: TimerWidth = TimerWidth::Bits8;

    fn configure(&self, period: u32, divider: u16) {
        let Some(clksel) = clksel(divider) else {
            #[cfg(feature = "defmt")]
            defmt::error!("TCA0: no prescaler for divider {}", divider);
            return;
        };
        self.bus.write8(CTRLD, SPLITM);
        self.bus.write8(HPER, period as u8);
        self.bus.write8(CTRLA, clksel | ENABLE);
    }

    /// Stop TCA0 and re-enter split mode
    ///
    /// PWM code may have switched TCA0 to single (16-bit) mode.
    fn reset(&self) {
        self.bus.write8(CTRLA, 0);
        self.bus.write8(CTRLD, SPLITM);
    }

    fn read_ticks(&self) -> u32 {
        // HCNT counts down from HPER
        let top = self.bus.read8(HPER);
        let count = self.bus.read8(HCNT);
        top.saturating_sub(count) as u32
    }

    fn overflow_pending(&self) -> bool {
        self.bus.read8(INTFLAGS) & HUNF != 0
    }

    fn clear_overflow(&self) {
        self.bus.write8(INTFLAGS, HUNF);
    }

    fn enable_overflow_interrupt(&self) {
        self.bus.modify8(INTCTRL, |v| v | HUNF);
    }

    fn disable_overflow_interrupt(&self) {
        self.bus.modify8(INTCTRL, |v| v & !HUNF);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBus;

    #[test]
    fn test_configure_split_mode() {
        let bus = FakeBus::new();
        let tca = Tca0Split::new(&bus);
        tca.configure(0xFE, 64);

        assert_eq!(bus.peek(CTRLD), SPLITM);
        assert_eq!(bus.peek(HPER), 0xFE);
        // DIV64 | ENABLE
        assert_eq!(bus.peek(CTRLA), 0x0B);
        // Enabled last
        assert_eq!(bus.writes().last(), Some(&(CTRLA, 0x0B)));
    }

    #[test]
    fn test_clock_selects() {
        assert_eq!(clksel(8), Some(0x06));
        assert_eq!(clksel(16), Some(0x08));
        assert_eq!(clksel(64), Some(0x0A));
        assert_eq!(clksel(32), None);
    }

    #[test]
    fn test_unsupported_divider_leaves_timer_off() {
        let bus = FakeBus::new();
        Tca0Split::new(&bus).configure(0xFE, 3);
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn test_ticks_count_up_from_down_counter() {
        let bus = FakeBus::new();
        let tca = Tca0Split::new(&bus);
        tca.configure(0xFE, 64);

        bus.poke(HCNT, 0xFE);
        assert_eq!(tca.read_ticks(), 0);
        bus.poke(HCNT, 0x00);
        assert_eq!(tca.read_ticks(), 0xFE);
        bus.poke(HCNT, 0x7E);
        assert_eq!(tca.read_ticks(), 0x80);
    }

    #[test]
    fn test_overflow_flag() {
        let bus = FakeBus::new();
        let tca = Tca0Split::new(&bus);
        assert!(!tca.overflow_pending());
        bus.poke(INTFLAGS, HUNF | 1);
        assert!(tca.overflow_pending());

        tca.clear_overflow();
        // Write-one-to-clear: only HUNF written
        assert_eq!(bus.writes(), vec![(INTFLAGS, HUNF)]);
    }

    #[test]
    fn test_interrupt_enable_keeps_low_half() {
        let bus = FakeBus::new();
        let tca = Tca0Split::new(&bus);
        // LUNF enabled by PWM code
        bus.poke(INTCTRL, 0x01);
        tca.enable_overflow_interrupt();
        assert_eq!(bus.peek(INTCTRL), 0x03);
        tca.disable_overflow_interrupt();
        assert_eq!(bus.peek(INTCTRL), 0x01);
    }

    #[test]
    fn test_reset_reenters_split_mode() {
        let bus = FakeBus::new();
        let tca = Tca0Split::new(&bus);
        bus.poke(CTRLD, 0);
        bus.poke(CTRLA, 0x0B);
        tca.reset();
        assert_eq!(bus.peek(CTRLA), 0);
        assert_eq!(bus.peek(CTRLD), SPLITM);
    }
}
