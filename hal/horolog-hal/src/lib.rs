//! Horolog Hardware Abstraction Layer
//!
//! This crate defines the capability traits a hardware timer must offer to
//! back the millis/micros timebase. Chip-specific HALs (tinyAVR, Cortex-M,
//! ...) implement them; `horolog-core` consumes them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application / horolog-firmware         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  horolog-core (timebase, delay)         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  horolog-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ horolog-hal-  │       │ horolog-hal-  │
//! │   megatiny    │       │   cortex-m    │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`timer::TimebaseTimer`] - Free-running overflow timer
//! - [`busy::BusyLoop`] - Calibrated cycle-burning loop

#![no_std]
#![deny(unsafe_code)]

pub mod busy;
pub mod timer;

// Re-export key traits at crate root for convenience
pub use busy::{BusyLoop, SpinLoop};
pub use timer::{TimebaseTimer, TimerWidth};
