//! Z80 control lines on the signal bus.
//!
//! Data and address use the standard low-order allocation. The processor
//! claims bits 40 to 52 for its control pins; peripherals must not reuse
//! them. Together with the clock that covers all of the chip's signal pins.

use emu_core::{ADDRESS_MASK, DATA_MASK};

/// I/O request (output).
pub const IORQ: u64 = 1 << 40;
/// Machine cycle one (output).
pub const M1: u64 = 1 << 41;
/// Read (output).
pub const RD: u64 = 1 << 42;
/// Write (output).
pub const WR: u64 = 1 << 43;
/// Memory request (output).
pub const MREQ: u64 = 1 << 44;
/// Refresh (output).
pub const RFSH: u64 = 1 << 45;
/// Bus acknowledge (output).
pub const BUSACK: u64 = 1 << 46;
/// Halt (output).
pub const HALT: u64 = 1 << 47;

/// Maskable interrupt request (input).
pub const INT: u64 = 1 << 48;
/// Non-maskable interrupt (input).
pub const NMI: u64 = 1 << 49;
/// Reset (input).
pub const RESET: u64 = 1 << 50;
/// Wait (input).
pub const WAIT: u64 = 1 << 51;
/// Bus request (input).
pub const BUSRQ: u64 = 1 << 52;

/// Every control line the processor drives.
pub const CONTROL_OUTPUTS: u64 = IORQ | M1 | RD | WR | MREQ | RFSH | BUSACK | HALT;

/// Every line the processor may drive.
pub const OUTPUT_LINES: u64 = DATA_MASK | ADDRESS_MASK | CONTROL_OUTPUTS;
