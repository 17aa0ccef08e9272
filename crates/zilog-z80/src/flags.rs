//! Z80 flag register bits and the decomposed flag store.
//!
//! The processor never keeps a packed F register. Carry, subtract,
//! parity/overflow and half-carry live together in their byte positions;
//! sign and zero are kept as the raw result byte they came from; bits 5
//! and 3 are whatever byte last showed through. `compose`/`decompose`
//! convert to and from the packed byte used by PUSH AF and save-states.

/// Sign flag (bit 7) - set if result is negative.
pub const SF: u8 = 0b1000_0000;

/// Zero flag (bit 6) - set if result is zero.
pub const ZF: u8 = 0b0100_0000;

/// Undocumented flag (bit 5) - copy of bit 5 of result.
pub const YF: u8 = 0b0010_0000;

/// Half-carry flag (bit 4) - carry from bit 3 to bit 4.
pub const HF: u8 = 0b0001_0000;

/// Undocumented flag (bit 3) - copy of bit 3 of result.
pub const XF: u8 = 0b0000_1000;

/// Parity/Overflow flag (bit 2) - parity or overflow depending on instruction.
pub const PF: u8 = 0b0000_0100;

/// Add/Subtract flag (bit 1) - set if last operation was subtraction.
pub const NF: u8 = 0b0000_0010;

/// Carry flag (bit 0) - carry out of bit 7.
pub const CF: u8 = 0b0000_0001;

/// Flags stored directly as bits.
const GENERAL: u8 = CF | NF | PF | HF;

/// Compute parity of a byte (true if even number of 1 bits).
#[must_use]
pub const fn parity(value: u8) -> bool {
    value.count_ones().is_multiple_of(2)
}

/// Branch conditions, in opcode order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cc {
    NonZero,
    Zero,
    NoCarry,
    Carry,
    ParityOdd,
    ParityEven,
    Plus,
    Minus,
    Always,
}

impl Cc {
    /// Decode the three-bit `ccc` field of a conditional opcode.
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index & 7 {
            0 => Self::NonZero,
            1 => Self::Zero,
            2 => Self::NoCarry,
            3 => Self::Carry,
            4 => Self::ParityOdd,
            5 => Self::ParityEven,
            6 => Self::Plus,
            _ => Self::Minus,
        }
    }
}

/// The flag register, decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    /// C, N, P/V and H in their register-byte positions.
    pub general: u8,
    /// Byte whose bit 7 is the sign flag.
    pub sign: u8,
    /// Byte whose zero-ness is the zero flag.
    pub zero: u8,
    /// Bits 5 and 3.
    pub undocumented: u8,
}

impl Default for Flags {
    /// Power-on state: every flag set.
    fn default() -> Self {
        Self::decompose(0xFF)
    }
}

impl Flags {
    /// Flags where sign, zero and bits 5/3 all come from `value`.
    #[must_use]
    pub const fn from_result(value: u8, general: u8) -> Self {
        Self {
            general,
            sign: value,
            zero: value,
            undocumented: value,
        }
    }

    #[must_use]
    pub const fn compose(self) -> u8 {
        let mut f = (self.undocumented & (YF | XF)) | (self.general & GENERAL) | (self.sign & SF);
        if self.zero == 0 {
            f |= ZF;
        }
        f
    }

    #[must_use]
    pub const fn decompose(f: u8) -> Self {
        Self {
            general: f & GENERAL,
            sign: f & SF,
            zero: if f & ZF == 0 { 1 } else { 0 },
            undocumented: f & (YF | XF),
        }
    }

    #[must_use]
    pub const fn carry(self) -> bool {
        self.general & CF != 0
    }

    #[must_use]
    pub const fn half_carry(self) -> bool {
        self.general & HF != 0
    }

    #[must_use]
    pub const fn subtract(self) -> bool {
        self.general & NF != 0
    }

    #[must_use]
    pub const fn parity_overflow(self) -> bool {
        self.general & PF != 0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.zero == 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.sign & SF != 0
    }

    /// Sign, zero and bits 5/3 from `value`; C/N/PV/H untouched.
    pub fn set_szxy(&mut self, value: u8) {
        self.sign = value;
        self.zero = value;
        self.undocumented = value;
    }

    #[must_use]
    pub const fn test(self, cc: Cc) -> bool {
        match cc {
            Cc::NonZero => !self.is_zero(),
            Cc::Zero => self.is_zero(),
            Cc::NoCarry => !self.carry(),
            Cc::Carry => self.carry(),
            Cc::ParityOdd => !self.parity_overflow(),
            Cc::ParityEven => self.parity_overflow(),
            Cc::Plus => !self.is_negative(),
            Cc::Minus => self.is_negative(),
            Cc::Always => true,
        }
    }
}
