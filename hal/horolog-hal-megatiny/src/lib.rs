//! tinyAVR 0/1-series timebase timers
//!
//! Drivers implementing `horolog-hal`'s [`TimebaseTimer`] for the timers a
//! tinyAVR can dedicate to timekeeping:
//!
//! - [`Tca0Split`] - high half of TCA0 in split mode (8-bit, down-counting)
//! - [`Tcb`] - TCB0 / TCB1 in periodic interrupt mode (16-bit)
//! - [`Tcd0`] - TCD0 one-ramp mode, read through a capture (12-bit, 1-series only)
//! - [`Rtc`] - RTC counter on a 32.768 kHz source (16-bit)
//!
//! All register access goes through a [`RegisterBus`]. On hardware that is
//! [`Mmio`]; tests substitute a fake bus and inspect what was written.
//!
//! [`TimebaseTimer`]: horolog_hal::TimebaseTimer

#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod rtc;
pub mod tca;
pub mod tcb;
pub mod tcd;

#[cfg(test)]
mod fake;

pub use bus::{Mmio, RegisterBus};
pub use rtc::{Rtc, RtcSource};
pub use tca::Tca0Split;
pub use tcb::Tcb;
pub use tcd::Tcd0;
