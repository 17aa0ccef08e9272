//! Master clock configuration and the generator that drives a bus with it.

use crate::lines::CLOCK;
use crate::{BusState, FlatBus, HalfCycles, Observable, Value};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Master clock configuration for a system.
///
/// Each machine has one crystal; the clock line toggles twice per period.
#[derive(Debug, Clone, Copy)]
pub struct MasterClock {
    /// Crystal frequency in Hz (e.g. `3_250_000` for a ZX80).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Clock line transitions per second.
    #[must_use]
    pub const fn half_cycles_per_second(&self) -> u64 {
        self.frequency_hz * 2
    }
}

/// Toggles the clock line of a bus and keeps time.
///
/// Elapsed wall time is projected onto half-cycles with a run-slice
/// Bresenham step so it never drifts, whatever the frequency.
pub struct ClockGenerator {
    bus: FlatBus,
    lines: BusState,
    half_cycles: HalfCycles,
    elapsed_nanos: u64,
    whole_step: u64,
    adjust_up: i64,
    adjust_down: i64,
    error: i64,
}

impl ClockGenerator {
    #[must_use]
    pub fn new(bus: FlatBus, clock: MasterClock) -> Self {
        let rate = clock.half_cycles_per_second().max(1);
        let adjust_up = ((NANOS_PER_SECOND % rate) << 1) as i64;
        let adjust_down = (rate << 1) as i64;
        Self {
            bus,
            lines: BusState::IDLE,
            half_cycles: HalfCycles::ZERO,
            elapsed_nanos: 0,
            whole_step: NANOS_PER_SECOND / rate,
            adjust_up,
            adjust_down,
            error: adjust_up - adjust_down,
        }
    }

    /// Run the bus for `count` clock transitions.
    pub fn run_for_half_cycles(&mut self, count: u64) {
        for _ in 0..count {
            self.lines.0 ^= CLOCK;
            self.bus.propagate(self.lines, self.half_cycles);
            self.half_cycles += HalfCycles::new(1);

            self.elapsed_nanos += self.whole_step;
            self.error += self.adjust_up;
            if self.error > 0 {
                self.elapsed_nanos += 1;
                self.error -= self.adjust_down;
            }
        }
    }

    #[must_use]
    pub const fn half_cycles_to_date(&self) -> HalfCycles {
        self.half_cycles
    }

    #[must_use]
    pub const fn elapsed_nanos(&self) -> u64 {
        self.elapsed_nanos
    }

    /// Hold host-driven lines (interrupts, WAIT, RESET...) low.
    pub fn set_lines_active(&mut self, mask: u64) {
        self.lines.set_active(mask & !CLOCK);
    }

    pub fn set_lines_inactive(&mut self, mask: u64) {
        self.lines.set_inactive(mask & !CLOCK);
    }

    /// The lines the host is driving, clock included.
    #[must_use]
    pub const fn lines(&self) -> BusState {
        self.lines
    }

    #[must_use]
    pub const fn bus(&self) -> &FlatBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut FlatBus {
        &mut self.bus
    }
}

const CLOCK_QUERY_PATHS: &[&str] = &["half_cycles", "nanos", "clock"];

impl Observable for ClockGenerator {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "half_cycles" => Some(self.half_cycles.get().into()),
            "nanos" => Some(self.elapsed_nanos.into()),
            "clock" => Some((self.lines.raw() & CLOCK != 0).into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        CLOCK_QUERY_PATHS
    }
}
