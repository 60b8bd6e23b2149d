//! Arduino-style timing API over the board timebase
//!
//! When board.toml disables timekeeping, queries return 0, lifecycle calls
//! do nothing, and delays fall back to cycle-counted busy loops.

use defmt::*;
use horolog_core::delay::{delay_ms, delay_us, spin_ms};
use horolog_core::{LifecycleError, Timebase};
use horolog_hal_cortex_m::{CycleLoop, SysTickTimer};

use crate::board::{CONFIG, CPU_HZ, TIMEKEEPING_ENABLED};

// SAFETY: SysTick is programmed by this timebase only
pub static TIMEBASE: Timebase<SysTickTimer> =
    Timebase::new(unsafe { SysTickTimer::steal() }, CONFIG);

fn report(operation: &str, result: Result<(), LifecycleError>) {
    if let Err(e) = result {
        warn!(
            "{}: not allowed while {} ({})",
            operation, e.state, e.transition
        );
    }
}

/// Start the timebase
pub fn init_timebase() {
    if TIMEKEEPING_ENABLED {
        report("init_timebase", TIMEBASE.init());
    }
}

/// Milliseconds since `init_timebase`
pub fn millis() -> u32 {
    if TIMEKEEPING_ENABLED {
        TIMEBASE.millis()
    } else {
        0
    }
}

/// Microseconds since `init_timebase`
pub fn micros() -> u32 {
    if TIMEKEEPING_ENABLED {
        TIMEBASE.micros()
    } else {
        0
    }
}

/// Wait at least `ms` milliseconds
///
/// Busy-waits while the timebase is not running.
pub fn delay(ms: u32) {
    if TIMEKEEPING_ENABLED {
        delay_ms(&TIMEBASE, &CycleLoop, CPU_HZ, ms);
    } else {
        spin_ms(&CycleLoop, CPU_HZ, ms);
    }
}

/// Busy-wait `us` microseconds
pub fn delay_microseconds(us: u16) {
    delay_us(&CycleLoop, CPU_HZ, us);
}

/// Freeze millis()/micros()
pub fn stop_timebase() {
    if TIMEKEEPING_ENABLED {
        report("stop_timebase", TIMEBASE.stop());
    }
}

/// Resume after `stop_timebase`
pub fn restart_timebase() {
    if TIMEKEEPING_ENABLED {
        report("restart_timebase", TIMEBASE.restart());
    }
}

/// Set millis() to `ms`
pub fn set_timebase(ms: u32) {
    if TIMEKEEPING_ENABLED {
        report("set_timebase", TIMEBASE.set(ms));
    }
}
