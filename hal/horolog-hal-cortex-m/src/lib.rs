//! Cortex-M timebase support
//!
//! - [`SysTickTimer`] - SysTick as a 24-bit timebase timer
//! - [`CycleLoop`] - busy loop on `cortex_m::asm::delay`
//!
//! # Usage
//!
//! The SysTick exception is the overflow interrupt. Forward it to the
//! timebase:
//!
//! ```ignore
//! #[exception]
//! fn SysTick() {
//!     TIMEBASE.on_overflow();
//! }
//! ```

#![no_std]

pub mod busy;
pub mod systick;

pub use busy::CycleLoop;
pub use systick::SysTickTimer;
