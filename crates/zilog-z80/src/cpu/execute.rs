//! Instruction decoding for the Z80.
//!
//! Opcodes are split into the usual `x y z` fields (`xx yyy zzz`, with
//! `y = p q`). Register-only work happens as soon as the opcode is
//! decoded; anything that touches the bus is scheduled as machine cycles.
//!
//! Under a DD/FD prefix `index` is IX or IY and `displaced` is set: H and L
//! become the index halves, (HL) becomes (IX+d), and HL-pair operations use
//! the index register.

#![allow(clippy::too_many_lines)]
#![allow(clippy::match_same_arms)]

use crate::alu::{self, AluOp, Shift};
use crate::flags::Cc;
use crate::microcode::{BlockOp, MicroOp, ModifyOp, Page};
use crate::registers::{Reg8, Reg16};

use super::Z80;

type DecodeFn = fn(&mut Z80, u8, Reg16, bool);

/// Indexed by [`Page`].
const PAGES: [DecodeFn; 4] = [standard, cb, ed, indexed_cb];

/// Interrupt mode selected by `ED 46 + 8y`.
const IM_MODES: [u8; 8] = [0, 0, 1, 2, 0, 0, 1, 2];

pub(super) fn decode(cpu: &mut Z80, page: Page, index: Reg16, displaced: bool) {
    let opcode = cpu.regs.temp;
    PAGES[page as usize](cpu, opcode, index, displaced);
}

#[derive(Debug, Clone, Copy)]
struct Fields {
    x: u8,
    y: u8,
    z: u8,
    p: u8,
    q: u8,
}

impl Fields {
    const fn of(opcode: u8) -> Self {
        let y = (opcode >> 3) & 7;
        Self {
            x: opcode >> 6,
            y,
            z: opcode & 7,
            p: y >> 1,
            q: y & 1,
        }
    }
}

/// `r` operand. 6 is the memory operand, which is always staged through
/// the temp register.
const fn reg8(r: u8, index: Reg16) -> Reg8 {
    match r & 7 {
        0 => Reg8::B,
        1 => Reg8::C,
        2 => Reg8::D,
        3 => Reg8::E,
        4 => Reg8::High(index),
        5 => Reg8::Low(index),
        6 => Reg8::Temp,
        _ => Reg8::A,
    }
}

/// `rp` operand: BC DE HL SP.
const fn rp(p: u8, index: Reg16) -> Reg16 {
    match p & 3 {
        0 => Reg16::Bc,
        1 => Reg16::De,
        2 => index,
        _ => Reg16::Sp,
    }
}

/// `rp2` operand: BC DE HL AF.
const fn rp2(p: u8, index: Reg16) -> Reg16 {
    match p & 3 {
        3 => Reg16::Af,
        p => rp(p, index),
    }
}

/// Accumulator ALU operation against a register, done on the spot.
fn alu_register(cpu: &mut Z80, op: AluOp, operand: Reg8) {
    let value = cpu.regs.get8(operand);
    let result = op.apply(cpu.regs.a, value, cpu.regs.flags);
    cpu.regs.a = result.value;
    cpu.regs.flags = result.flags;
}

/// Read, modify, idle a cycle, write back.
fn modify_memory(cpu: &mut Z80, op: ModifyOp) {
    cpu.read(Reg16::Temp, Reg8::Temp);
    cpu.schedule(MicroOp::Modify {
        op,
        target: Reg8::Temp,
    });
    cpu.pause(1);
    cpu.write(Reg16::Temp, Reg8::Temp);
}

fn call(cpu: &mut Z80, taken: bool) {
    cpu.read_operand16(Reg16::Temp);
    if taken {
        cpu.pause(1);
        cpu.push_word(Reg16::Pc);
        cpu.schedule(MicroOp::Copy16 {
            from: Reg16::Temp,
            to: Reg16::Pc,
        });
    }
}

fn jump(cpu: &mut Z80, taken: bool) {
    cpu.read_operand16(Reg16::Temp);
    if taken {
        cpu.schedule(MicroOp::Copy16 {
            from: Reg16::Temp,
            to: Reg16::Pc,
        });
    }
}

/// Fetch the byte after a prefix and decode it on `page`.
fn prefixed(cpu: &mut Z80, page: Page, index: Reg16, displaced: bool) {
    cpu.fetch(true);
    cpu.schedule(MicroOp::Decode {
        page,
        index,
        displaced,
    });
}

fn standard(cpu: &mut Z80, opcode: u8, index: Reg16, displaced: bool) {
    let Fields { x, y, z, p, q } = Fields::of(opcode);
    let flags = cpu.regs.flags;

    match (x, z) {
        // NOP, EX AF,AF', DJNZ, JR, JR cc
        (0, 0) => match y {
            0 => {}
            1 => cpu.regs.exchange_af(),
            2 => {
                cpu.pause(1);
                cpu.read_operand(Reg8::Offset);
                cpu.schedule(MicroOp::Djnz);
            }
            3 => {
                cpu.read_operand(Reg8::Offset);
                cpu.schedule(MicroOp::JumpRelative(Cc::Always));
            }
            _ => {
                cpu.read_operand(Reg8::Offset);
                cpu.schedule(MicroOp::JumpRelative(Cc::from_index(y - 4)));
            }
        },

        // LD rp,nn
        (0, 1) if q == 0 => cpu.read_operand16(rp(p, index)),

        // ADD HL,rp
        (0, 1) => {
            let result = alu::add16(cpu.regs.get16(index), cpu.regs.get16(rp(p, index)), flags);
            cpu.regs.set16(index, result.value);
            cpu.regs.flags = result.flags;
            cpu.pause(7);
        }

        // LD (BC),A / LD (DE),A / LD (nn),HL / LD (nn),A and the loads back
        (0, 2) => match (p, q) {
            (0, 0) => cpu.write(Reg16::Bc, Reg8::A),
            (1, 0) => cpu.write(Reg16::De, Reg8::A),
            (2, 0) => {
                cpu.read_operand16(Reg16::Temp);
                cpu.write(Reg16::Temp, Reg8::Low(index));
                cpu.schedule(MicroOp::Inc16(Reg16::Temp));
                cpu.write(Reg16::Temp, Reg8::High(index));
            }
            (3, 0) => {
                cpu.read_operand16(Reg16::Temp);
                cpu.write(Reg16::Temp, Reg8::A);
            }
            (0, _) => cpu.read(Reg16::Bc, Reg8::A),
            (1, _) => cpu.read(Reg16::De, Reg8::A),
            (2, _) => {
                cpu.read_operand16(Reg16::Temp);
                cpu.read(Reg16::Temp, Reg8::Low(index));
                cpu.schedule(MicroOp::Inc16(Reg16::Temp));
                cpu.read(Reg16::Temp, Reg8::High(index));
            }
            _ => {
                cpu.read_operand16(Reg16::Temp);
                cpu.read(Reg16::Temp, Reg8::A);
            }
        },

        // INC rp / DEC rp
        (0, 3) => {
            let pair = rp(p, index);
            let value = cpu.regs.get16(pair);
            let value = if q == 0 {
                value.wrapping_add(1)
            } else {
                value.wrapping_sub(1)
            };
            cpu.regs.set16(pair, value);
            cpu.pause(2);
        }

        // INC r / DEC r
        (0, 4 | 5) => {
            let op = if z == 4 { ModifyOp::Inc } else { ModifyOp::Dec };
            if y == 6 {
                cpu.locate_operand(index, displaced);
                modify_memory(cpu, op);
            } else {
                cpu.modify(op, reg8(y, index));
            }
        }

        // LD r,n
        (0, 6) if y == 6 => {
            if displaced {
                cpu.read_operand(Reg8::Offset);
                cpu.read_operand(Reg8::Temp);
                cpu.pause(2);
                cpu.schedule(MicroOp::IndexAddress(index));
            } else {
                cpu.locate_operand(index, false);
                cpu.read_operand(Reg8::Temp);
            }
            cpu.write(Reg16::Temp, Reg8::Temp);
        }
        (0, 6) => cpu.read_operand(reg8(y, index)),

        // RLCA RRCA RLA RRA DAA CPL SCF CCF
        (0, _) => {
            let a = cpu.regs.a;
            match y {
                0..=3 => {
                    let result = alu::rotate_accumulator(Shift::from_index(y), a, flags);
                    cpu.regs.a = result.value;
                    cpu.regs.flags = result.flags;
                }
                4 => {
                    let result = alu::daa(a, flags);
                    cpu.regs.a = result.value;
                    cpu.regs.flags = result.flags;
                }
                5 => {
                    let result = alu::cpl(a, flags);
                    cpu.regs.a = result.value;
                    cpu.regs.flags = result.flags;
                }
                6 => cpu.regs.flags = alu::scf(a, flags),
                _ => cpu.regs.flags = alu::ccf(a, flags),
            }
        }

        // HALT
        (1, 6) if y == 6 => cpu.enter_halt(),

        // LD r,(HL): the destination is never an index half.
        (1, 6) => {
            cpu.locate_operand(index, displaced);
            cpu.read(Reg16::Temp, reg8(y, Reg16::Hl));
        }

        // LD (HL),r
        (1, _) if y == 6 => {
            cpu.locate_operand(index, displaced);
            cpu.write(Reg16::Temp, reg8(z, Reg16::Hl));
        }

        // LD r,r'
        (1, _) => {
            let value = cpu.regs.get8(reg8(z, index));
            cpu.regs.set8(reg8(y, index), value);
        }

        // ALU A,(HL)
        (2, 6) => {
            cpu.locate_operand(index, displaced);
            cpu.read(Reg16::Temp, Reg8::Temp);
            cpu.schedule(MicroOp::Alu(AluOp::from_index(y)));
        }

        // ALU A,r
        (2, _) => alu_register(cpu, AluOp::from_index(y), reg8(z, index)),

        // RET cc
        (3, 0) => {
            cpu.pause(1);
            if flags.test(Cc::from_index(y)) {
                cpu.pop_word(Reg16::Pc);
            }
        }

        // POP rp2
        (3, 1) if q == 0 => cpu.pop_word(rp2(p, index)),

        // RET, EXX, JP (HL), LD SP,HL
        (3, 1) => match p {
            0 => cpu.pop_word(Reg16::Pc),
            1 => cpu.regs.exx(),
            2 => cpu.regs.pc = cpu.regs.get16(index),
            _ => {
                cpu.regs.sp = cpu.regs.get16(index);
                cpu.pause(2);
            }
        },

        // JP cc,nn
        (3, 2) => jump(cpu, flags.test(Cc::from_index(y))),

        // JP nn, CB prefix, OUT (n),A, IN A,(n), EX (SP),HL, EX DE,HL, DI, EI
        (3, 3) => match y {
            0 => jump(cpu, true),
            1 if displaced => {
                // DD CB d op: the displacement comes before the opcode, and
                // the opcode is read without an M1 cycle.
                cpu.read_operand(Reg8::Offset);
                cpu.read_operand(Reg8::Temp);
                cpu.pause(2);
                cpu.schedule(MicroOp::IndexAddress(index));
                cpu.schedule(MicroOp::Decode {
                    page: Page::IndexedCb,
                    index,
                    displaced,
                });
            }
            1 => prefixed(cpu, Page::Cb, Reg16::Hl, false),
            2 => {
                cpu.regs.set8(Reg8::High(Reg16::Temp), cpu.regs.a);
                cpu.read_operand(Reg8::Low(Reg16::Temp));
                cpu.output(Reg16::Temp, Reg8::A);
            }
            3 => {
                cpu.regs.set8(Reg8::High(Reg16::Temp), cpu.regs.a);
                cpu.read_operand(Reg8::Low(Reg16::Temp));
                cpu.input(Reg16::Temp, Reg8::A);
            }
            4 => {
                cpu.pop_word(Reg16::Temp);
                cpu.pause(1);
                cpu.push_word(index);
                cpu.pause(2);
                cpu.schedule(MicroOp::Copy16 {
                    from: Reg16::Temp,
                    to: index,
                });
            }
            5 => std::mem::swap(&mut cpu.regs.de, &mut cpu.regs.hl),
            6 => cpu.set_interrupts(false),
            _ => cpu.set_interrupts(true),
        },

        // CALL cc,nn
        (3, 4) => call(cpu, flags.test(Cc::from_index(y))),

        // PUSH rp2
        (3, 5) if q == 0 => {
            cpu.pause(1);
            cpu.push_word(rp2(p, index));
        }

        // CALL nn and the DD, ED and FD prefixes
        (3, 5) => match p {
            0 => call(cpu, true),
            1 => prefixed(cpu, Page::Standard, Reg16::Ix, true),
            2 => prefixed(cpu, Page::Ed, Reg16::Hl, false),
            _ => prefixed(cpu, Page::Standard, Reg16::Iy, true),
        },

        // ALU A,n
        (3, 6) => {
            cpu.read_operand(Reg8::Temp);
            cpu.schedule(MicroOp::Alu(AluOp::from_index(y)));
        }

        // RST
        _ => {
            cpu.pause(1);
            cpu.push_word(Reg16::Pc);
            cpu.schedule(MicroOp::Jump(u16::from(y) * 8));
        }
    }
}

/// Read-modify-write operation for CB-page opcodes other than BIT.
const fn cb_operation(x: u8, y: u8) -> ModifyOp {
    match x {
        0 => ModifyOp::Shift(Shift::from_index(y)),
        2 => ModifyOp::Res(1 << y),
        _ => ModifyOp::Set(1 << y),
    }
}

fn cb(cpu: &mut Z80, opcode: u8, _index: Reg16, _displaced: bool) {
    let Fields { x, y, z, .. } = Fields::of(opcode);

    if z == 6 {
        cpu.locate_operand(Reg16::Hl, false);
        if x == 1 {
            cpu.read(Reg16::Temp, Reg8::Temp);
            cpu.schedule(MicroOp::Bit(1 << y));
            cpu.pause(1);
        } else {
            modify_memory(cpu, cb_operation(x, y));
        }
        return;
    }

    let target = reg8(z, Reg16::Hl);
    if x == 1 {
        cpu.regs.flags = alu::bit(1 << y, cpu.regs.get8(target), cpu.regs.flags);
    } else {
        cpu.modify(cb_operation(x, y), target);
    }
}

/// DD CB d op. The temp address already points at (IX+d).
fn indexed_cb(cpu: &mut Z80, opcode: u8, _index: Reg16, _displaced: bool) {
    let Fields { x, y, z, .. } = Fields::of(opcode);

    cpu.read(Reg16::Temp, Reg8::Temp);
    if x == 1 {
        cpu.schedule(MicroOp::Bit(1 << y));
        cpu.pause(1);
        return;
    }

    modify_memory(cpu, cb_operation(x, y));
    if z != 6 {
        // Undocumented: the result is also copied to a register.
        cpu.schedule(MicroOp::Copy8 {
            from: Reg8::Temp,
            to: reg8(z, Reg16::Hl),
        });
    }
}

fn ed(cpu: &mut Z80, opcode: u8, _index: Reg16, _displaced: bool) {
    let Fields { x, y, z, p, q } = Fields::of(opcode);
    let flags = cpu.regs.flags;

    match (x, z) {
        // IN r,(C); y = 6 only sets flags
        (1, 0) => {
            let target = reg8(y, Reg16::Hl);
            cpu.input(Reg16::Bc, target);
            cpu.schedule(MicroOp::InputFlags(target));
        }

        // OUT (C),r; y = 6 outputs zero
        (1, 1) => {
            let source = reg8(y, Reg16::Hl);
            if y == 6 {
                cpu.regs.temp = 0;
            }
            cpu.output(Reg16::Bc, source);
        }

        // SBC HL,rp / ADC HL,rp
        (1, 2) => {
            let hl = cpu.regs.hl;
            let operand = cpu.regs.get16(rp(p, Reg16::Hl));
            let result = if q == 0 {
                alu::sbc16(hl, operand, flags)
            } else {
                alu::adc16(hl, operand, flags)
            };
            cpu.regs.hl = result.value;
            cpu.regs.flags = result.flags;
            cpu.pause(7);
        }

        // LD (nn),rp / LD rp,(nn)
        (1, 3) => {
            let pair = rp(p, Reg16::Hl);
            cpu.read_operand16(Reg16::Temp);
            if q == 0 {
                cpu.write(Reg16::Temp, Reg8::Low(pair));
                cpu.schedule(MicroOp::Inc16(Reg16::Temp));
                cpu.write(Reg16::Temp, Reg8::High(pair));
            } else {
                cpu.read(Reg16::Temp, Reg8::Low(pair));
                cpu.schedule(MicroOp::Inc16(Reg16::Temp));
                cpu.read(Reg16::Temp, Reg8::High(pair));
            }
        }

        // NEG
        (1, 4) => {
            let result = alu::neg(cpu.regs.a);
            cpu.regs.a = result.value;
            cpu.regs.flags = result.flags;
        }

        // RETN / RETI
        (1, 5) => {
            cpu.restore_iff1();
            cpu.pop_word(Reg16::Pc);
        }

        // IM 0/1/2
        (1, 6) => cpu.set_interrupt_mode(IM_MODES[usize::from(y)]),

        // LD I,A  LD R,A  LD A,I  LD A,R  RRD  RLD
        (1, 7) => match y {
            0 => {
                cpu.regs.i = cpu.regs.a;
                cpu.pause(1);
            }
            1 => {
                cpu.regs.r = cpu.regs.a;
                cpu.pause(1);
            }
            2 => {
                cpu.load_a_special(cpu.regs.i);
                cpu.pause(1);
            }
            3 => {
                cpu.load_a_special(cpu.regs.r);
                cpu.pause(1);
            }
            4 | 5 => {
                cpu.locate_operand(Reg16::Hl, false);
                cpu.read(Reg16::Temp, Reg8::Temp);
                cpu.pause(4);
                cpu.schedule(if y == 4 { MicroOp::Rrd } else { MicroOp::Rld });
                cpu.write(Reg16::Temp, Reg8::Temp);
            }
            _ => {}
        },

        // LDI CPI INI OUTI and their decrementing and repeating forms
        (2, 0..=3) if y >= 4 => {
            let decrement = y & 1 == 1;
            let repeat = y >= 6;
            let op = match z {
                0 => BlockOp::Load,
                1 => BlockOp::Compare,
                2 => BlockOp::In,
                _ => BlockOp::Out,
            };
            match op {
                BlockOp::Load => {
                    cpu.read(Reg16::Hl, Reg8::Temp);
                    cpu.write(Reg16::De, Reg8::Temp);
                    cpu.pause(2);
                }
                BlockOp::Compare => {
                    cpu.read(Reg16::Hl, Reg8::Temp);
                    cpu.pause(5);
                }
                BlockOp::In => {
                    cpu.pause(1);
                    cpu.input(Reg16::Bc, Reg8::Temp);
                    cpu.write(Reg16::Hl, Reg8::Temp);
                }
                BlockOp::Out => {
                    let b = cpu.regs.get8(Reg8::B).wrapping_sub(1);
                    cpu.regs.set8(Reg8::B, b);
                    cpu.pause(1);
                    cpu.read(Reg16::Hl, Reg8::Temp);
                    cpu.output(Reg16::Bc, Reg8::Temp);
                }
            }
            cpu.schedule(MicroOp::Block {
                op,
                decrement,
                repeat,
            });
        }

        // Everything else is a two-byte NOP.
        _ => {}
    }
}
