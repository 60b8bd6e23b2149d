//! Horolog - timebase demo firmware
//!
//! Runs the millis()/micros() timebase on SysTick and exercises the
//! lifecycle controls, logging over RTT.

#![no_std]
#![no_main]

use cortex_m_rt::{entry, exception};
use defmt::*;
use embedded_hal::delay::DelayNs;
use horolog_core::Delay;
use horolog_hal_cortex_m::CycleLoop;
use {defmt_rtt as _, panic_probe as _};

mod board {
    include!(concat!(env!("OUT_DIR"), "/board_config.rs"));
}
mod timing;

use board::CONFIG;

use timing::{
    delay, delay_microseconds, init_timebase, micros, millis, restart_timebase, set_timebase,
    stop_timebase, TIMEBASE,
};

#[exception]
fn SysTick() {
    TIMEBASE.on_overflow();
}

/// Wait on any `DelayNs` provider, the way an ecosystem driver would
fn settle<D: DelayNs>(delay: &mut D) {
    delay.delay_ms(5);
    delay.delay_us(250);
}

#[entry]
fn main() -> ! {
    info!("Horolog firmware starting...");
    info!(
        "Timebase: {} Hz, {} us/overflow, race window {} ticks",
        CONFIG.cpu_hz(),
        CONFIG.us_per_overflow(),
        CONFIG.race_window_ticks()
    );

    init_timebase();
    if !board::TIMEKEEPING_ENABLED {
        warn!("Timekeeping disabled in board.toml");
    }

    let start = micros();
    delay_microseconds(100);
    if board::TIMEKEEPING_ENABLED {
        settle(&mut Delay::new(&TIMEBASE, CycleLoop, board::CPU_HZ));
    } else {
        settle(&mut Delay::without_clock(CycleLoop, board::CPU_HZ));
    }
    info!("Settle took {} us", micros().wrapping_sub(start));

    // Frozen clock across stop/restart; delay() busy-waits meanwhile
    stop_timebase();
    let frozen = millis();
    delay(10);
    info!("Stopped: millis {} -> {}", frozen, millis());
    restart_timebase();

    set_timebase(1_000_000);
    info!("Set: millis {}", millis());

    let mut last = millis();
    loop {
        delay(1000);
        let now = millis();
        info!("millis {} (+{}), micros {}", now, now.wrapping_sub(last), micros());
        last = now;
    }
}
