//! Half-cycle accurate Z80 CPU.
//!
//! The processor is a component on an [`emu_core::FlatBus`]: it is clocked
//! on both edges and talks to memory and I/O only through the signal lines
//! in [`pins`]. Attach it with [`Z80::attach`] and drive the bus with an
//! [`emu_core::ClockGenerator`].

mod alu;
mod cpu;
pub mod disasm;
mod flags;
mod microcode;
pub mod pins;
mod registers;

pub use alu::{AluOp, AluResult, AluResult16, Shift};
pub use cpu::{ObserverId, Z80};
pub use disasm::{DisassemblyRow, disassemble, disassemble_one};
pub use flags::{CF, Cc, Flags, HF, NF, PF, SF, XF, YF, ZF};
pub use microcode::{BlockOp, MicroOp, MicroOpQueue, ModifyOp, Page, QUEUE_CAPACITY, QueueOverflow};
pub use registers::{Reg8, Reg16, RegisterKey, Registers, UnknownRegister};
