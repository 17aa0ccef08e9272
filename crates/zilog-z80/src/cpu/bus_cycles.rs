//! Machine-cycle skeletons.
//!
//! Each builder appends one bus cycle to the queue, one marker per
//! half-cycle with the work that happens on that edge scheduled behind it.

use emu_core::DATA_MASK;

use super::Z80;
use crate::microcode::MicroOp;
use crate::pins::{IORQ, MREQ, RD, RFSH, WR};
use crate::registers::{Reg8, Reg16};

const M: MicroOp = MicroOp::MARKER;
const MW: MicroOp = MicroOp::WAIT_MARKER;

impl Z80 {
    fn schedule_all(&mut self, ops: &[MicroOp]) {
        for &op in ops {
            self.schedule(op);
        }
    }

    /// Opcode fetch and refresh: four cycles. The opcode lands in the
    /// temp register.
    pub(crate) fn fetch(&mut self, increment_pc: bool) {
        self.schedule_all(&[
            M,
            MicroOp::BeginFetch { increment_pc },
            M,
            MicroOp::Assert(RD | MREQ),
            M,
            MW,
            M,
            MicroOp::BeginRefresh,
            M,
            MicroOp::Assert(MREQ),
            M,
            M,
            MicroOp::Release(MREQ | RFSH),
        ]);
    }

    /// Memory read: three cycles.
    pub(crate) fn read(&mut self, address: Reg16, target: Reg8) {
        self.schedule_all(&[
            M,
            MicroOp::ReadAddress(address),
            M,
            MicroOp::Assert(RD | MREQ),
            M,
            MW,
            M,
            M,
            MicroOp::Latch {
                target,
                release: RD | MREQ,
            },
        ]);
    }

    /// Memory write: three cycles. WR goes low with the wait sample.
    pub(crate) fn write(&mut self, address: Reg16, source: Reg8) {
        self.schedule_all(&[
            M,
            MicroOp::WriteAddress(address),
            M,
            MicroOp::DriveData(source),
            MicroOp::Assert(MREQ),
            M,
            MW,
            MicroOp::Assert(WR),
            M,
            M,
            MicroOp::Release(WR | MREQ | DATA_MASK),
        ]);
    }

    /// Port read: four cycles including the automatic wait state.
    pub(crate) fn input(&mut self, address: Reg16, target: Reg8) {
        self.schedule_all(&[
            M,
            MicroOp::ReadAddress(address),
            M,
            M,
            MicroOp::Assert(RD | IORQ),
            M,
            M,
            MW,
            M,
            M,
            MicroOp::Latch {
                target,
                release: RD | IORQ,
            },
        ]);
    }

    /// Port write: four cycles including the automatic wait state.
    pub(crate) fn output(&mut self, address: Reg16, source: Reg8) {
        self.schedule_all(&[
            M,
            MicroOp::WriteAddress(address),
            M,
            MicroOp::DriveData(source),
            M,
            MicroOp::Assert(IORQ | WR),
            M,
            M,
            MW,
            M,
            M,
            MicroOp::Release(IORQ | WR | DATA_MASK),
        ]);
    }

    /// Maskable interrupt acknowledge: M1 with IORQ in place of MREQ,
    /// five cycles. The vector byte lands in the temp register.
    pub(crate) fn irq_acknowledge(&mut self) {
        self.schedule_all(&[
            M,
            MicroOp::BeginFetch {
                increment_pc: false,
            },
            M,
            M,
            M,
            M,
            M,
            MicroOp::Assert(IORQ),
            M,
            MW,
            M,
            MicroOp::LatchVector,
            M,
        ]);
    }

    /// `cycles` internal cycles with nothing on the bus.
    pub(crate) fn pause(&mut self, cycles: usize) {
        for _ in 0..cycles * 2 {
            self.schedule(M);
        }
    }

    /// Read the byte at PC and step past it.
    pub(crate) fn read_operand(&mut self, target: Reg8) {
        self.read(Reg16::Pc, target);
        self.schedule(MicroOp::Inc16(Reg16::Pc));
    }

    /// Little-endian word at PC.
    pub(crate) fn read_operand16(&mut self, target: Reg16) {
        self.read_operand(Reg8::Low(target));
        self.read_operand(Reg8::High(target));
    }

    /// High byte first, as the stack grows down.
    pub(crate) fn push_word(&mut self, source: Reg16) {
        self.schedule(MicroOp::Dec16(Reg16::Sp));
        self.write(Reg16::Sp, Reg8::High(source));
        self.schedule(MicroOp::Dec16(Reg16::Sp));
        self.write(Reg16::Sp, Reg8::Low(source));
    }

    pub(crate) fn pop_word(&mut self, target: Reg16) {
        self.read(Reg16::Sp, Reg8::Low(target));
        self.schedule(MicroOp::Inc16(Reg16::Sp));
        self.read(Reg16::Sp, Reg8::High(target));
        self.schedule(MicroOp::Inc16(Reg16::Sp));
    }

    /// Point the temp address at (HL) or (IX+d)/(IY+d). The indexed form
    /// reads the displacement and idles five cycles while adding it.
    pub(crate) fn locate_operand(&mut self, index: Reg16, displaced: bool) {
        if displaced {
            self.read_operand(Reg8::Offset);
            self.pause(5);
            self.schedule(MicroOp::IndexAddress(index));
        } else {
            self.schedule(MicroOp::Copy16 {
                from: index,
                to: Reg16::Temp,
            });
        }
    }
}
