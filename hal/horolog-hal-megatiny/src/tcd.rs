//! TCD0 in one-ramp mode (1-series parts only)
//!
//! TCD0 runs in its own clock domain. Its counter cannot be read directly:
//! a capture command copies it into CAPTUREA, which becomes valid once the
//! command has crossed the synchronizer (CMDRDY set).

use horolog_hal::{TimebaseTimer, TimerWidth};

use crate::bus::{Mmio, RegisterBus};

const BASE: u16 = 0x0A80;

const CTRLA: u16 = BASE;
const CTRLB: u16 = BASE + 0x01;
const CTRLE: u16 = BASE + 0x04;
const INTCTRL: u16 = BASE + 0x0C;
const INTFLAGS: u16 = BASE + 0x0D;
const STATUS: u16 = BASE + 0x0E;
const CAPTUREA: u16 = BASE + 0x22;
const CMPBCLR: u16 = BASE + 0x2E;

const ENABLE: u8 = 1 << 0;
const SCAPTUREA: u8 = 1 << 3;
const OVF: u8 = 1 << 0;
const ENRDY: u8 = 1 << 0;
const CMDRDY: u8 = 1 << 1;
const WGMODE_ONERAMP: u8 = 0x00;
/// CLKSEL = OSC20M (runs at 16 or 20 MHz depending on fuses)
const CLKSEL_OSC20M: u8 = 0x00;

/// CTRLA prescaler bits (CNTPRES and SYNCPRES) for a divider
const fn prescaler(divider: u16) -> Option<u8> {
    let (cntpres, syncpres) = match divider {
        1 => (0, 0),
        2 => (0, 1),
        4 => (1, 0),
        8 => (1, 1),
        32 => (2, 0),
        64 => (2, 1),
        128 => (2, 2),
        256 => (2, 3),
        _ => return None,
    };
    Some((cntpres << 3) | (syncpres << 1))
}

/// TCD0 timer
pub struct Tcd0<B = Mmio> {
    bus: B,
}

impl<B: RegisterBus> Tcd0<B> {
    pub const fn new(bus: B) -> Self {
        Self { bus }
    }

    fn disable(&self) {
        self.bus.write8(CTRLA, 0);
        while self.bus.read8(STATUS) & ENRDY == 0 {
            core::hint::spin_loop();
        }
    }
}

impl<B: RegisterBus> TimebaseTimer for Tcd0<B> {
    const WIDTH: TimerWidth = TimerWidth::Bits12;
    const SYNCHRONIZED_CAPTURE: bool = true;

    fn configure(&self, period: u32, divider: u16) {
        let Some(prescaler) = prescaler(divider) else {
            #[cfg(feature = "defmt")]
            defmt::error!("TCD0: no prescaler for divider {}", divider);
            return;
        };
        // Configuration registers are only writable while disabled
        self.disable();
        self.bus.write16(CMPBCLR, period as u16);
        self.bus.write8(CTRLB, WGMODE_ONERAMP);
        self.bus.write8(CTRLA, CLKSEL_OSC20M | prescaler);
        self.bus.write8(CTRLA, CLKSEL_OSC20M | prescaler | ENABLE);
    }

    fn reset(&self) {
        self.disable();
    }

    fn start_capture(&self) {
        self.bus.write8(CTRLE, SCAPTUREA);
    }

    fn read_ticks(&self) -> u32 {
        while self.bus.read8(STATUS) & CMDRDY == 0 {
            core::hint::spin_loop();
        }
        self.bus.read16(CAPTUREA) as u32
    }

    fn overflow_pending(&self) -> bool {
        self.bus.read8(INTFLAGS) & OVF != 0
    }

    fn clear_overflow(&self) {
        self.bus.write8(INTFLAGS, OVF);
    }

    fn enable_overflow_interrupt(&self) {
        self.bus.modify8(INTCTRL, |v| v | OVF);
    }

    fn disable_overflow_interrupt(&self) {
        self.bus.modify8(INTCTRL, |v| v & !OVF);
    }
}
