//! Micro-operation definitions for half-cycle Z80 execution.
//!
//! Each instruction is broken down into a sequence of micro-operations.
//! `Advance` markers are the only steps that take time: the processor
//! consumes exactly one marker per clock edge and performs every work step
//! that follows it before the next marker.

use thiserror::Error;

use crate::alu::{AluOp, Shift};
use crate::flags::Cc;
use crate::registers::{Reg8, Reg16};

/// Worst case is EX (SP),IX with its prefix, plus headroom for the
/// interrupt acknowledge sequences.
pub const QUEUE_CAPACITY: usize = 64;

/// Opcode tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Standard,
    Cb,
    Ed,
    /// DD CB d op / FD CB d op.
    IndexedCb,
}

/// Read-modify-write operations on a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOp {
    Inc,
    Dec,
    Shift(Shift),
    /// Clear the bits in the mask.
    Res(u8),
    /// Set the bits in the mask.
    Set(u8),
}

/// Block transfer families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOp {
    Load,
    Compare,
    In,
    Out,
}

/// A single scheduled step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOp {
    /// One half-cycle passes. Flagged markers sample WAIT.
    Advance { sample_wait: bool },

    /// Put PC on the address bus, assert M1 and float the data bus.
    BeginFetch { increment_pc: bool },
    /// Pull control lines low.
    Assert(u64),
    /// Let control lines float high.
    Release(u64),
    /// Latch the opcode, end M1 and start the refresh cycle at I:R.
    BeginRefresh,
    /// Latch the interrupt vector byte and end the acknowledge.
    LatchVector,
    /// Decode the byte in the temp register on the given page.
    Decode {
        page: Page,
        index: Reg16,
        displaced: bool,
    },

    /// Place a register on the address bus and float the data bus.
    ReadAddress(Reg16),
    /// Place a register on the address bus.
    WriteAddress(Reg16),
    /// Drive the data bus from a register.
    DriveData(Reg8),
    /// Copy the data bus into a register, then release lines.
    Latch { target: Reg8, release: u64 },

    Inc16(Reg16),
    Dec16(Reg16),
    Copy16 { from: Reg16, to: Reg16 },
    Copy8 { from: Reg8, to: Reg8 },
    Set8 { target: Reg8, value: u8 },
    Jump(u16),
    /// temp address = index + signed offset.
    IndexAddress(Reg16),

    /// Accumulator operation against the temp register.
    Alu(AluOp),
    Modify { op: ModifyOp, target: Reg8 },
    /// BIT test against the temp register.
    Bit(u8),
    /// PC += offset if the condition holds, then idle five cycles.
    JumpRelative(Cc),
    Djnz,
    /// Flags for IN r,(C) from the byte just read.
    InputFlags(Reg8),
    Block {
        op: BlockOp,
        decrement: bool,
        repeat: bool,
    },
    Rrd,
    Rld,
    /// temp address = I:vector byte.
    VectorIm2,
}

impl MicroOp {
    pub const MARKER: Self = Self::Advance { sample_wait: false };
    pub const WAIT_MARKER: Self = Self::Advance { sample_wait: true };

    #[must_use]
    pub const fn is_marker(self) -> bool {
        matches!(self, Self::Advance { .. })
    }
}

/// The queue was asked to hold more than [`QUEUE_CAPACITY`] steps.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("micro-op queue overflow (capacity {QUEUE_CAPACITY})")]
pub struct QueueOverflow;

/// Queue of pending micro-operations.
/// Fixed size to avoid allocation.
#[derive(Debug, Clone)]
pub struct MicroOpQueue {
    ops: [MicroOp; QUEUE_CAPACITY],
    head: usize,
    len: usize,
}

impl Default for MicroOpQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MicroOpQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ops: [MicroOp::MARKER; QUEUE_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    /// Clear the queue and start fresh.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn try_push(&mut self, op: MicroOp) -> Result<(), QueueOverflow> {
        if self.len == QUEUE_CAPACITY {
            return Err(QueueOverflow);
        }
        self.ops[(self.head + self.len) % QUEUE_CAPACITY] = op;
        self.len += 1;
        Ok(())
    }

    /// Push a micro-op onto the queue.
    ///
    /// # Panics
    ///
    /// If the queue is full. No instruction needs that many steps, so this
    /// is a bug in the decoder.
    pub fn push(&mut self, op: MicroOp) {
        if let Err(err) = self.try_push(op) {
            panic!("{err} while scheduling {op:?}");
        }
    }

    pub fn pop(&mut self) -> Option<MicroOp> {
        if self.len == 0 {
            return None;
        }
        let op = self.ops[self.head];
        self.head = (self.head + 1) % QUEUE_CAPACITY;
        self.len -= 1;
        Some(op)
    }

    #[must_use]
    pub fn peek(&self) -> Option<MicroOp> {
        (self.len > 0).then(|| self.ops[self.head])
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        QUEUE_CAPACITY
    }

    /// Number of markers still scheduled.
    #[must_use]
    pub fn pending_markers(&self) -> usize {
        (0..self.len)
            .filter(|offset| self.ops[(self.head + offset) % QUEUE_CAPACITY].is_marker())
            .count()
    }
}
