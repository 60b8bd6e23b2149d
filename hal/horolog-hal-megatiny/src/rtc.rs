//! RTC counter on a 32.768 kHz source
//!
//! The RTC keeps counting in standby, so it is the timebase of choice for
//! sleeping applications. Its registers sit behind a clock-domain
//! synchronizer; every write first waits for the matching STATUS busy flag.

use horolog_hal::{TimebaseTimer, TimerWidth};

use crate::bus::{Mmio, RegisterBus};

const BASE: u16 = 0x0140;

const CTRLA: u16 = BASE;
const STATUS: u16 = BASE + 0x01;
const INTCTRL: u16 = BASE + 0x02;
const INTFLAGS: u16 = BASE + 0x03;
const CLKSEL: u16 = BASE + 0x07;
const CNT: u16 = BASE + 0x08;
const PER: u16 = BASE + 0x0A;

const RTCEN: u8 = 1 << 0;
const RUNSTDBY: u8 = 1 << 7;
const OVF: u8 = 1 << 0;

const CTRLABUSY: u8 = 1 << 0;
const CNTBUSY: u8 = 1 << 1;
const PERBUSY: u8 = 1 << 2;

const CLKCTRL_OSC32KCTRLA: u16 = 0x0078;
const CLKCTRL_XOSC32KCTRLA: u16 = 0x007C;
const CLKCTRL_ENABLE: u8 = 1 << 0;
const CLKCTRL_RUNSTDBY: u8 = 1 << 1;
const CLKCTRL_SEL: u8 = 1 << 2;
const CLKCTRL_CSUT_16K: u8 = 0x01 << 4;

const CLKSEL_INT32K: u8 = 0x00;
const CLKSEL_TOSC32K: u8 = 0x02;

/// 32.768 kHz clock feeding the RTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtcSource {
    /// Internal ULP oscillator
    Internal,
    /// Crystal on TOSC1/TOSC2
    Crystal,
    /// External clock on TOSC1
    External,
}

/// CTRLA PRESCALER bits for a power-of-two divider up to 32768
const fn prescaler(divider: u16) -> Option<u8> {
    if !divider.is_power_of_two() {
        return None;
    }
    Some((divider.trailing_zeros() as u8) << 3)
}

/// RTC counter
pub struct Rtc<B = Mmio> {
    bus: B,
    source: RtcSource,
}

impl<B: RegisterBus> Rtc<B> {
    pub const fn new(bus: B, source: RtcSource) -> Self {
        Self { bus, source }
    }

    fn wait_idle(&self, busy: u8) {
        while self.bus.read8(STATUS) & busy != 0 {
            core::hint::spin_loop();
        }
    }

    fn select_source(&self) {
        match self.source {
            RtcSource::Internal => {
                self.bus
                    .protected_write8(CLKCTRL_OSC32KCTRLA, CLKCTRL_RUNSTDBY);
                self.bus.write8(CLKSEL, CLKSEL_INT32K);
            }
            RtcSource::Crystal => {
                self.bus.protected_write8(
                    CLKCTRL_XOSC32KCTRLA,
                    CLKCTRL_CSUT_16K | CLKCTRL_ENABLE | CLKCTRL_RUNSTDBY,
                );
                self.bus.write8(CLKSEL, CLKSEL_TOSC32K);
            }
            RtcSource::External => {
                self.bus.protected_write8(
                    CLKCTRL_XOSC32KCTRLA,
                    CLKCTRL_SEL | CLKCTRL_ENABLE | CLKCTRL_RUNSTDBY,
                );
                self.bus.write8(CLKSEL, CLKSEL_TOSC32K);
            }
        }
    }
}

impl<B: RegisterBus> TimebaseTimer for Rtc<B> {
    const WIDTH: TimerWidth = TimerWidth::Bits16;

    fn configure(&self, period: u32, divider: u16) {
        let Some(prescaler) = prescaler(divider) else {
            #[cfg(feature = "defmt")]
            defmt::error!("RTC: no prescaler for divider {}", divider);
            return;
        };
        self.wait_idle(CTRLABUSY | PERBUSY);
        self.bus.write16(PER, period as u16);
        self.select_source();
        self.bus.write8(CTRLA, RUNSTDBY | prescaler | RTCEN);
    }

    fn read_ticks(&self) -> u32 {
        self.bus.read16(CNT) as u32
    }

    fn write_ticks(&self, ticks: u32) {
        self.wait_idle(CNTBUSY);
        self.bus.write16(CNT, ticks as u16);
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

    fn halt(&self) {
        self.wait_idle(CTRLABUSY);
        self.bus.modify8(CTRLA, |v| v & !RTCEN);
    }
}
