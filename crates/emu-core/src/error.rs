//! Errors raised while wiring up a bus.

use thiserror::Error;

use crate::flat_bus::Partition;

/// Failure to attach a component.
///
/// The bus is left exactly as it was before the failed call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("could not grow the {partition} partition to hold another component")]
    Allocation { partition: Partition },
}
