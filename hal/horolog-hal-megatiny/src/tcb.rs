//! TCB in periodic interrupt mode
//!
//! CNT counts up from zero, sets CAPT on reaching CCMP, and restarts.

use horolog_hal::{TimebaseTimer, TimerWidth};

use crate::bus::{Mmio, RegisterBus};

pub const TCB0_BASE: u16 = 0x0A40;
pub const TCB1_BASE: u16 = 0x0A50;

const CTRLA: u16 = 0x00;
const CTRLB: u16 = 0x01;
const INTCTRL: u16 = 0x05;
const INTFLAGS: u16 = 0x06;
const CNT: u16 = 0x0A;
const CCMP: u16 = 0x0C;

const ENABLE: u8 = 1 << 0;
const CAPT: u8 = 1 << 0;
const CLKSEL_DIV1: u8 = 0x00;
const CLKSEL_DIV2: u8 = 0x01 << 1;

/// A TCB instance
pub struct Tcb<B = Mmio> {
    bus: B,
    base: u16,
}

impl<B: RegisterBus> Tcb<B> {
    pub const fn tcb0(bus: B) -> Self {
        Self {
            bus,
            base: TCB0_BASE,
        }
    }

    /// TCB1 (parts with two TCBs only)
    pub const fn tcb1(bus: B) -> Self {
        Self {
            bus,
            base: TCB1_BASE,
        }
    }

    const fn reg(&self, offset: u16) -> u16 {
        self.base + offset
    }
}

impl<B: RegisterBus> TimebaseTimer for Tcb<B> {
    const WIDTH: TimerWidth = TimerWidth::Bits16;

    fn configure(&self, period: u32, divider: u16) {
        let clksel = match divider {
            1 => CLKSEL_DIV1,
            2 => CLKSEL_DIV2,
            _ => {
                #[cfg(feature = "defmt")]
                defmt::error!("TCB: no prescaler for divider {}", divider);
                return;
            }
        };
        // Periodic interrupt mode
        self.bus.write8(self.reg(CTRLB), 0);
        self.bus.write16(self.reg(CCMP), period as u16);
        self.bus.write8(self.reg(CTRLA), clksel | ENABLE);
    }

    /// Disable and return to periodic interrupt mode
    fn reset(&self) {
        self.bus.write8(self.reg(CTRLA), 0);
        self.bus.write8(self.reg(CTRLB), 0);
    }

    fn read_ticks(&self) -> u32 {
        self.bus.read16(self.reg(CNT)) as u32
    }

    fn overflow_pending(&self) -> bool {
        self.bus.read8(self.reg(INTFLAGS)) & CAPT != 0
    }

    fn clear_overflow(&self) {
        self.bus.write8(self.reg(INTFLAGS), CAPT);
    }

    fn enable_overflow_interrupt(&self) {
        self.bus.modify8(self.reg(INTCTRL), |v| v | CAPT);
    }

    fn disable_overflow_interrupt(&self) {
        self.bus.modify8(self.reg(INTCTRL), |v| v & !CAPT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBus;

    #[test]
    fn test_configure_tcb0() {
        let bus = FakeBus::new();
        let tcb = Tcb::tcb0(&bus);
        // 16 MHz: 7999 at ÷2
        tcb.configure(7999, 2);

        assert_eq!(bus.peek16(TCB0_BASE + CCMP), 7999);
        assert_eq!(bus.peek(TCB0_BASE + CTRLA), CLKSEL_DIV2 | ENABLE);
        assert_eq!(bus.writes().last(), Some(&(TCB0_BASE + CTRLA, 0x03)));
    }

    #[test]
    fn test_tcb1_uses_own_registers() {
        let bus = FakeBus::new();
        let tcb = Tcb::tcb1(&bus);
        tcb.configure(1999, 1);
        assert_eq!(bus.peek16(TCB1_BASE + CCMP), 1999);
        assert_eq!(bus.peek(TCB1_BASE + CTRLA), ENABLE);
        assert!(!bus.written(TCB0_BASE + CTRLA));
    }

    #[test]
    fn test_read_ticks() {
        let bus = FakeBus::new();
        let tcb = Tcb::tcb0(&bus);
        bus.poke16(TCB0_BASE + CNT, 4321);
        assert_eq!(tcb.read_ticks(), 4321);
    }

    #[test]
    fn test_capture_flag_is_overflow() {
        let bus = FakeBus::new();
        let tcb = Tcb::tcb0(&bus);
        bus.poke(TCB0_BASE + INTFLAGS, CAPT);
        assert!(tcb.overflow_pending());
        tcb.clear_overflow();
        assert_eq!(bus.writes(), vec![(TCB0_BASE + INTFLAGS, CAPT)]);
    }

    #[test]
    fn test_reset_clears_mode() {
        let bus = FakeBus::new();
        let tcb = Tcb::tcb0(&bus);
        // Left in PWM mode by other code
        bus.poke(TCB0_BASE + CTRLB, 0x07);
        tcb.reset();
        assert_eq!(bus.peek(TCB0_BASE + CTRLB), 0);
        assert_eq!(bus.peek(TCB0_BASE + CTRLA), 0);
    }
}
