//! Board-agnostic millis/micros timebase
//!
//! This crate turns a hardware timer's finite tick count plus an
//! interrupt-driven overflow counter into monotonic, interrupt-safe time:
//!
//! - Timer/frequency configuration and derived constants
//! - Overflow accumulation (runs in the interrupt)
//! - Time queries with overflow race reconciliation
//! - Lifecycle controls (init / stop / restart / set)
//! - Blocking delays
//!
//! Hardware access goes through the `horolog-hal` traits. The `sim` feature
//! exposes a simulated timer for host-side testing.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod accumulator;
pub mod config;
pub mod delay;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod state;
pub mod timebase;

pub use config::{ConfigError, MillisTimer, TimebaseConfig};
pub use delay::{Clock, Delay, NoClock};
pub use state::{LifecycleError, TimebaseState};
pub use timebase::Timebase;
