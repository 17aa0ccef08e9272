//! Core types for half-cycle signal-bus emulation.
//!
//! Every chip is a [`Component`] attached to a [`FlatBus`]. The bus is a
//! 64-line, active-low, wired-AND word; a [`ClockGenerator`] toggles its
//! clock line and the bus dispatches each change to whoever asked for it.

mod clock;
mod component;
mod condition;
mod error;
mod flat_bus;
mod lines;
mod observable;
mod ticks;

pub use clock::{ClockGenerator, MasterClock};
pub use component::{Component, FnComponent, Prefilter, from_fn};
pub use condition::Condition;
pub use error::BusError;
pub use flat_bus::{ComponentId, FlatBus, Partition};
pub use lines::{ADDRESS_MASK, ADDRESS_SHIFT, BusState, CLOCK, DATA_MASK, DATA_SHIFT};
pub use observable::{Observable, Value};
pub use ticks::HalfCycles;
