//! Cycle-counted busy loop

use horolog_hal::BusyLoop;

/// Busy loop backed by [`cortex_m::asm::delay`]
///
/// One iteration is one requested cycle; `asm::delay` already accounts
/// for its own loop cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleLoop;

impl BusyLoop for CycleLoop {
    const CYCLES_PER_ITERATION: u32 = 1;

    fn spin(&self, iterations: u32) {
        cortex_m::asm::delay(iterations);
    }
}
