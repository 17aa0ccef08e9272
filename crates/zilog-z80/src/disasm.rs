//! Instruction disassembly for the Z80.
//!
//! Covers the same four opcode pages the processor decodes, including the
//! undocumented index-half registers, SLL and the DDCB register copies.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// The starting address of this instruction.
    pub address: u16,
    /// Length in bytes, prefixes included.
    pub length: u8,
    /// Mnemonic and operands, e.g. `LD A, (IX+$05)`.
    pub text: String,
}

const CC: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];
const ALU: [&str; 8] = ["ADD A, ", "ADC A, ", "SUB ", "SBC A, ", "AND ", "XOR ", "OR ", "CP "];
const ROT: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SLL", "SRL"];
const IM: [&str; 8] = ["0", "0", "1", "2", "0", "0", "1", "2"];
const BLOCK: [[&str; 4]; 4] = [
    ["LDI", "CPI", "INI", "OUTI"],
    ["LDD", "CPD", "IND", "OUTD"],
    ["LDIR", "CPIR", "INIR", "OTIR"],
    ["LDDR", "CPDR", "INDR", "OTDR"],
];

/// Disassemble `count` consecutive instructions starting at `start`.
///
/// Stops early if an instruction runs past the end of `memory`.
#[must_use]
pub fn disassemble(memory: &[u8], start: u16, count: usize) -> Vec<DisassemblyRow> {
    let mut rows = Vec::with_capacity(count);
    let mut address = start;
    for _ in 0..count {
        let Some(row) = disassemble_one(address, memory) else {
            break;
        };
        address = address.wrapping_add(u16::from(row.length));
        rows.push(row);
    }
    rows
}

/// Disassemble the instruction at `address`, or `None` if it runs past the
/// end of `memory`.
#[must_use]
pub fn disassemble_one(address: u16, memory: &[u8]) -> Option<DisassemblyRow> {
    let mut reader = Reader {
        memory,
        start: address,
        length: 0,
        index: "HL",
    };
    let text = reader.standard()?;
    Some(DisassemblyRow {
        address,
        length: reader.length,
        text,
    })
}

struct Reader<'a> {
    memory: &'a [u8],
    start: u16,
    length: u8,
    /// HL, IX or IY.
    index: &'static str,
}

impl Reader<'_> {
    fn byte(&mut self) -> Option<u8> {
        let address = self.start.wrapping_add(u16::from(self.length));
        let value = *self.memory.get(usize::from(address))?;
        self.length += 1;
        Some(value)
    }

    fn word(&mut self) -> Option<u16> {
        let low = self.byte()?;
        let high = self.byte()?;
        Some(u16::from_le_bytes([low, high]))
    }

    /// Relative jump target.
    fn target(&mut self) -> Option<String> {
        let offset = self.byte()? as i8;
        let next = self.start.wrapping_add(u16::from(self.length));
        Some(format!("${:04X}", next.wrapping_add_signed(i16::from(offset))))
    }

    fn indexed(&self) -> bool {
        self.index != "HL"
    }

    /// `(HL)` or `(IX+d)`, reading the displacement if there is one.
    fn memory_operand(&mut self) -> Option<String> {
        if self.indexed() {
            let offset = self.byte()? as i8;
            Some(self.displaced(offset))
        } else {
            Some("(HL)".to_string())
        }
    }

    fn displaced(&self, offset: i8) -> String {
        if offset < 0 {
            format!("({}-${:02X})", self.index, offset.unsigned_abs())
        } else {
            format!("({}+${offset:02X})", self.index)
        }
    }

    /// `r` operand. H and L become index halves unless `plain`.
    fn reg(&mut self, r: u8, plain: bool) -> Option<String> {
        let name = match r {
            0 => "B",
            1 => "C",
            2 => "D",
            3 => "E",
            4 | 5 if plain || !self.indexed() => {
                if r == 4 {
                    "H"
                } else {
                    "L"
                }
            }
            4 => return Some(format!("{}H", self.index)),
            5 => return Some(format!("{}L", self.index)),
            6 => return self.memory_operand(),
            _ => "A",
        };
        Some(name.to_string())
    }

    fn rp(&self, p: u8) -> &'static str {
        ["BC", "DE", self.index, "SP"][usize::from(p)]
    }

    fn rp2(&self, p: u8) -> &'static str {
        ["BC", "DE", self.index, "AF"][usize::from(p)]
    }

    fn standard(&mut self) -> Option<String> {
        let opcode = self.byte()?;
        let (x, y, z) = (opcode >> 6, (opcode >> 3) & 7, opcode & 7);
        let (p, q) = (y >> 1, y & 1);

        let text = match (x, z) {
            (0, 0) => match y {
                0 => "NOP".to_string(),
                1 => "EX AF, AF'".to_string(),
                2 => format!("DJNZ {}", self.target()?),
                3 => format!("JR {}", self.target()?),
                _ => format!("JR {}, {}", CC[usize::from(y - 4)], self.target()?),
            },
            (0, 1) if q == 0 => format!("LD {}, ${:04X}", self.rp(p), self.word()?),
            (0, 1) => format!("ADD {}, {}", self.index, self.rp(p)),
            (0, 2) => match y {
                0 => "LD (BC), A".to_string(),
                1 => "LD A, (BC)".to_string(),
                2 => "LD (DE), A".to_string(),
                3 => "LD A, (DE)".to_string(),
                4 => format!("LD (${:04X}), {}", self.word()?, self.index),
                5 => {
                    let address = self.word()?;
                    format!("LD {}, (${address:04X})", self.index)
                }
                6 => format!("LD (${:04X}), A", self.word()?),
                _ => format!("LD A, (${:04X})", self.word()?),
            },
            (0, 3) => format!("{} {}", if q == 0 { "INC" } else { "DEC" }, self.rp(p)),
            (0, 4) => format!("INC {}", self.reg(y, false)?),
            (0, 5) => format!("DEC {}", self.reg(y, false)?),
            (0, 6) => {
                let target = self.reg(y, false)?;
                format!("LD {target}, ${:02X}", self.byte()?)
            }
            (0, _) => ["RLCA", "RRCA", "RLA", "RRA", "DAA", "CPL", "SCF", "CCF"][usize::from(y)]
                .to_string(),
            (1, 6) if y == 6 => "HALT".to_string(),
            (1, _) => {
                let memory = y == 6 || z == 6;
                let target = self.reg(y, memory)?;
                let source = self.reg(z, memory)?;
                format!("LD {target}, {source}")
            }
            (2, _) => format!("{}{}", ALU[usize::from(y)], self.reg(z, false)?),
            (3, 0) => format!("RET {}", CC[usize::from(y)]),
            (3, 1) if q == 0 => format!("POP {}", self.rp2(p)),
            (3, 1) => match p {
                0 => "RET".to_string(),
                1 => "EXX".to_string(),
                2 => format!("JP ({})", self.index),
                _ => format!("LD SP, {}", self.index),
            },
            (3, 2) => format!("JP {}, ${:04X}", CC[usize::from(y)], self.word()?),
            (3, 3) => match y {
                0 => format!("JP ${:04X}", self.word()?),
                1 => return self.cb(),
                2 => format!("OUT (${:02X}), A", self.byte()?),
                3 => format!("IN A, (${:02X})", self.byte()?),
                4 => format!("EX (SP), {}", self.index),
                5 => "EX DE, HL".to_string(),
                6 => "DI".to_string(),
                _ => "EI".to_string(),
            },
            (3, 4) => format!("CALL {}, ${:04X}", CC[usize::from(y)], self.word()?),
            (3, 5) if q == 0 => format!("PUSH {}", self.rp2(p)),
            (3, 5) => match p {
                0 => format!("CALL ${:04X}", self.word()?),
                1 => return self.prefixed("IX"),
                2 => return self.ed(),
                _ => return self.prefixed("IY"),
            },
            (3, 6) => format!("{}${:02X}", ALU[usize::from(y)], self.byte()?),
            _ => format!("RST ${:02X}", y * 8),
        };
        Some(text)
    }

    /// DD or FD. A prefix followed by another prefix does nothing on its
    /// own and is listed as a one-byte row.
    fn prefixed(&mut self, index: &'static str) -> Option<String> {
        let next = self.start.wrapping_add(u16::from(self.length));
        if matches!(self.memory.get(usize::from(next)), Some(0xDD | 0xED | 0xFD)) {
            return Some("NOP*".to_string());
        }
        self.index = index;
        self.standard()
    }

    fn cb(&mut self) -> Option<String> {
        let offset = if self.indexed() {
            Some(self.byte()? as i8)
        } else {
            None
        };
        let opcode = self.byte()?;
        let (x, y, z) = (opcode >> 6, (opcode >> 3) & 7, opcode & 7);

        let operand = match offset {
            Some(offset) => self.displaced(offset),
            None => self.reg(z, true)?,
        };
        let text = match x {
            0 => format!("{} {operand}", ROT[usize::from(y)]),
            1 => format!("BIT {y}, {operand}"),
            2 => format!("RES {y}, {operand}"),
            _ => format!("SET {y}, {operand}"),
        };

        // DDCB forms other than BIT also copy the result to a register.
        if offset.is_some() && x != 1 && z != 6 {
            let copy = self.reg(z, true)?;
            return Some(format!("LD {copy}, {text}"));
        }
        Some(text)
    }

    fn ed(&mut self) -> Option<String> {
        let opcode = self.byte()?;
        let (x, y, z) = (opcode >> 6, (opcode >> 3) & 7, opcode & 7);
        let (p, q) = (y >> 1, y & 1);
        self.index = "HL";

        let text = match (x, z) {
            (1, 0) if y == 6 => "IN (C)".to_string(),
            (1, 0) => format!("IN {}, (C)", self.reg(y, true)?),
            (1, 1) if y == 6 => "OUT (C), 0".to_string(),
            (1, 1) => format!("OUT (C), {}", self.reg(y, true)?),
            (1, 2) => format!("{} HL, {}", if q == 0 { "SBC" } else { "ADC" }, self.rp(p)),
            (1, 3) if q == 0 => format!("LD (${:04X}), {}", self.word()?, self.rp(p)),
            (1, 3) => format!("LD {}, (${:04X})", self.rp(p), self.word()?),
            (1, 4) => "NEG".to_string(),
            (1, 5) if y == 1 => "RETI".to_string(),
            (1, 5) => "RETN".to_string(),
            (1, 6) => format!("IM {}", IM[usize::from(y)]),
            (1, 7) => match y {
                0 => "LD I, A",
                1 => "LD R, A",
                2 => "LD A, I",
                3 => "LD A, R",
                4 => "RRD",
                5 => "RLD",
                _ => "NOP",
            }
            .to_string(),
            (2, 0..=3) if y >= 4 => BLOCK[usize::from(y - 4)][usize::from(z)].to_string(),
            _ => "NOP".to_string(),
        };
        Some(text)
    }
}
