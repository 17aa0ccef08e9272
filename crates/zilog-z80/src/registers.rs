//! Z80 register set.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::flags::Flags;

/// Z80 registers snapshot for observation and save-states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Registers {
    // Main registers
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    // Alternate registers
    pub a_alt: u8,
    pub f_alt: u8,
    pub b_alt: u8,
    pub c_alt: u8,
    pub d_alt: u8,
    pub e_alt: u8,
    pub h_alt: u8,
    pub l_alt: u8,

    // Index registers
    pub ix: u16,
    pub iy: u16,

    // Other registers
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,

    // Interrupt state
    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,

    // Halt state
    pub halted: bool,
}

impl Registers {
    /// Get AF register pair.
    #[must_use]
    pub const fn af(&self) -> u16 {
        (self.a as u16) << 8 | self.f as u16
    }

    /// Get BC register pair.
    #[must_use]
    pub const fn bc(&self) -> u16 {
        (self.b as u16) << 8 | self.c as u16
    }

    /// Get DE register pair.
    #[must_use]
    pub const fn de(&self) -> u16 {
        (self.d as u16) << 8 | self.e as u16
    }

    /// Get HL register pair.
    #[must_use]
    pub const fn hl(&self) -> u16 {
        (self.h as u16) << 8 | self.l as u16
    }
}

/// Register pairs plus the internal address latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    Af,
    Bc,
    De,
    Hl,
    Ix,
    Iy,
    Sp,
    Pc,
    /// Scratch address used by indirect and indexed cycles.
    Temp,
}

/// Byte-wide registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    High(Reg16),
    Low(Reg16),
    I,
    R,
    /// Scratch byte: operands, fetched opcodes and vectors land here.
    Temp,
    /// Index displacement.
    Offset,
}

impl Reg8 {
    pub const A: Self = Self::High(Reg16::Af);
    pub const F: Self = Self::Low(Reg16::Af);
    pub const B: Self = Self::High(Reg16::Bc);
    pub const C: Self = Self::Low(Reg16::Bc);
    pub const D: Self = Self::High(Reg16::De);
    pub const E: Self = Self::Low(Reg16::De);
    pub const H: Self = Self::High(Reg16::Hl);
    pub const L: Self = Self::Low(Reg16::Hl);
}

/// Live processor registers.
#[derive(Debug, Clone)]
pub(crate) struct RegisterFile {
    pub a: u8,
    pub flags: Flags,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,

    pub af_alt: u16,
    pub bc_alt: u16,
    pub de_alt: u16,
    pub hl_alt: u16,

    pub temp: u8,
    pub offset: u8,
    pub temp_addr: u16,
}

impl Default for RegisterFile {
    /// Power-on: AF and SP all ones, everything else clear.
    fn default() -> Self {
        Self {
            a: 0xFF,
            flags: Flags::default(),
            bc: 0,
            de: 0,
            hl: 0,
            ix: 0,
            iy: 0,
            sp: 0xFFFF,
            pc: 0,
            i: 0,
            r: 0,
            af_alt: 0xFFFF,
            bc_alt: 0,
            de_alt: 0,
            hl_alt: 0,
            temp: 0,
            offset: 0,
            temp_addr: 0,
        }
    }
}

impl RegisterFile {
    pub fn af(&self) -> u16 {
        u16::from(self.a) << 8 | u16::from(self.flags.compose())
    }

    pub fn set_af(&mut self, value: u16) {
        self.a = (value >> 8) as u8;
        self.flags = Flags::decompose(value as u8);
    }

    pub fn get16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::Af => self.af(),
            Reg16::Bc => self.bc,
            Reg16::De => self.de,
            Reg16::Hl => self.hl,
            Reg16::Ix => self.ix,
            Reg16::Iy => self.iy,
            Reg16::Sp => self.sp,
            Reg16::Pc => self.pc,
            Reg16::Temp => self.temp_addr,
        }
    }

    pub fn set16(&mut self, reg: Reg16, value: u16) {
        match reg {
            Reg16::Af => self.set_af(value),
            Reg16::Bc => self.bc = value,
            Reg16::De => self.de = value,
            Reg16::Hl => self.hl = value,
            Reg16::Ix => self.ix = value,
            Reg16::Iy => self.iy = value,
            Reg16::Sp => self.sp = value,
            Reg16::Pc => self.pc = value,
            Reg16::Temp => self.temp_addr = value,
        }
    }

    pub fn get8(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::High(Reg16::Af) => self.a,
            Reg8::High(pair) => (self.get16(pair) >> 8) as u8,
            Reg8::Low(pair) => self.get16(pair) as u8,
            Reg8::I => self.i,
            Reg8::R => self.r,
            Reg8::Temp => self.temp,
            Reg8::Offset => self.offset,
        }
    }

    pub fn set8(&mut self, reg: Reg8, value: u8) {
        match reg {
            Reg8::High(Reg16::Af) => self.a = value,
            Reg8::Low(Reg16::Af) => self.flags = Flags::decompose(value),
            Reg8::High(pair) => {
                let low = self.get16(pair) & 0x00FF;
                self.set16(pair, u16::from(value) << 8 | low);
            }
            Reg8::Low(pair) => {
                let high = self.get16(pair) & 0xFF00;
                self.set16(pair, high | u16::from(value));
            }
            Reg8::I => self.i = value,
            Reg8::R => self.r = value,
            Reg8::Temp => self.temp = value,
            Reg8::Offset => self.offset = value,
        }
    }

    /// Advance the refresh counter. Bit 7 is only changed by `LD R,A`.
    pub fn inc_r(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }

    pub fn exchange_af(&mut self) {
        let af = self.af();
        self.set_af(self.af_alt);
        self.af_alt = af;
    }

    pub fn exx(&mut self) {
        std::mem::swap(&mut self.bc, &mut self.bc_alt);
        std::mem::swap(&mut self.de, &mut self.de_alt);
        std::mem::swap(&mut self.hl, &mut self.hl_alt);
    }
}

/// Every register addressable through [`crate::Z80::get`] and
/// [`crate::Z80::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKey {
    A,
    F,
    B,
    C,
    D,
    E,
    H,
    L,
    Af,
    Bc,
    De,
    Hl,
    AfAlt,
    BcAlt,
    DeAlt,
    HlAlt,
    R,
    I,
    Ix,
    Iy,
    Sp,
    Pc,
    Iff1,
    Iff2,
    InterruptMode,
    HalfCyclesToDate,
}

impl RegisterKey {
    pub const ALL: [Self; 26] = [
        Self::A,
        Self::F,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::H,
        Self::L,
        Self::Af,
        Self::Bc,
        Self::De,
        Self::Hl,
        Self::AfAlt,
        Self::BcAlt,
        Self::DeAlt,
        Self::HlAlt,
        Self::R,
        Self::I,
        Self::Ix,
        Self::Iy,
        Self::Sp,
        Self::Pc,
        Self::Iff1,
        Self::Iff2,
        Self::InterruptMode,
        Self::HalfCyclesToDate,
    ];

    /// Conventional assembler name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::F => "f",
            Self::B => "b",
            Self::C => "c",
            Self::D => "d",
            Self::E => "e",
            Self::H => "h",
            Self::L => "l",
            Self::Af => "af",
            Self::Bc => "bc",
            Self::De => "de",
            Self::Hl => "hl",
            Self::AfAlt => "af'",
            Self::BcAlt => "bc'",
            Self::DeAlt => "de'",
            Self::HlAlt => "hl'",
            Self::R => "r",
            Self::I => "i",
            Self::Ix => "ix",
            Self::Iy => "iy",
            Self::Sp => "sp",
            Self::Pc => "pc",
            Self::Iff1 => "iff1",
            Self::Iff2 => "iff2",
            Self::InterruptMode => "im",
            Self::HalfCyclesToDate => "half_cycles",
        }
    }
}

impl fmt::Display for RegisterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A register name that no [`RegisterKey`] answers to.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown register `{0}`")]
pub struct UnknownRegister(pub String);

impl FromStr for RegisterKey {
    type Err = UnknownRegister;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let key = match lower.as_str() {
            "af_alt" => Self::AfAlt,
            "bc_alt" => Self::BcAlt,
            "de_alt" => Self::DeAlt,
            "hl_alt" => Self::HlAlt,
            "interrupt_mode" => Self::InterruptMode,
            "half_cycles_to_date" => Self::HalfCyclesToDate,
            name => Self::ALL
                .into_iter()
                .find(|key| key.name() == name)
                .ok_or_else(|| UnknownRegister(s.to_string()))?,
        };
        Ok(key)
    }
}
