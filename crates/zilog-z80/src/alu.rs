//! ALU operations for the Z80.
//!
//! Every helper is a pure function of its operands and the current flags.
//! Sign, zero and bits 5/3 come from the result byte unless noted.

#![allow(clippy::verbose_bit_mask)] // Clearer to read mask comparisons.

use crate::flags::{CF, Flags, HF, NF, PF, XF, YF, parity};

/// Result of an ALU operation with flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: Flags,
}

/// Result of a 16-bit ALU operation with flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult16 {
    pub value: u16,
    pub flags: Flags,
}

/// The eight accumulator operations, in opcode order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index & 7 {
            0 => Self::Add,
            1 => Self::Adc,
            2 => Self::Sub,
            3 => Self::Sbc,
            4 => Self::And,
            5 => Self::Xor,
            6 => Self::Or,
            _ => Self::Cp,
        }
    }

    /// Apply to the accumulator. CP's value is the untouched accumulator.
    #[must_use]
    pub fn apply(self, a: u8, operand: u8, flags: Flags) -> AluResult {
        match self {
            Self::Add => add8(a, operand, false),
            Self::Adc => add8(a, operand, flags.carry()),
            Self::Sub => sub8(a, operand, false),
            Self::Sbc => sub8(a, operand, flags.carry()),
            Self::And => and8(a, operand),
            Self::Xor => xor8(a, operand),
            Self::Or => or8(a, operand),
            Self::Cp => AluResult {
                value: a,
                flags: cp8(a, operand),
            },
        }
    }
}

/// The CB-page rotates and shifts, in opcode order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    /// Undocumented: shift left, filling bit 0 with 1.
    Sll,
    Srl,
}

impl Shift {
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index & 7 {
            0 => Self::Rlc,
            1 => Self::Rrc,
            2 => Self::Rl,
            3 => Self::Rr,
            4 => Self::Sla,
            5 => Self::Sra,
            6 => Self::Sll,
            _ => Self::Srl,
        }
    }

    #[must_use]
    pub fn apply(self, value: u8, flags: Flags) -> AluResult {
        let carry_in = u8::from(flags.carry());
        let (result, carry_out) = match self {
            Self::Rlc => (value.rotate_left(1), value >> 7),
            Self::Rrc => (value.rotate_right(1), value & 1),
            Self::Rl => ((value << 1) | carry_in, value >> 7),
            Self::Rr => ((value >> 1) | (carry_in << 7), value & 1),
            Self::Sla => (value << 1, value >> 7),
            Self::Sra => ((value >> 1) | (value & 0x80), value & 1),
            Self::Sll => ((value << 1) | 1, value >> 7),
            Self::Srl => (value >> 1, value & 1),
        };
        AluResult {
            value: result,
            flags: Flags::from_result(result, carry_out | parity_flag(result)),
        }
    }
}

const fn parity_flag(value: u8) -> u8 {
    if parity(value) { PF } else { 0 }
}

/// Add two bytes with optional carry, returning result and flags.
#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let result16 = u16::from(a) + u16::from(b) + u16::from(c);
    let result = result16 as u8;

    let mut general = 0;

    // Half-carry flag
    if (a & 0x0F) + (b & 0x0F) + c > 0x0F {
        general |= HF;
    }

    // Overflow flag (both operands same sign, result different sign)
    if (a ^ b) & 0x80 == 0 && (a ^ result) & 0x80 != 0 {
        general |= PF;
    }

    // Carry flag
    if result16 > 0xFF {
        general |= CF;
    }

    AluResult {
        value: result,
        flags: Flags::from_result(result, general),
    }
}

/// Subtract two bytes with optional borrow, returning result and flags.
#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let result = a.wrapping_sub(b).wrapping_sub(c);

    let mut general = NF;

    // Half-carry flag (borrow from bit 4)
    if (a & 0x0F) < (b & 0x0F) + c {
        general |= HF;
    }

    // Overflow flag (operands different sign, result same sign as subtrahend)
    if (a ^ b) & 0x80 != 0 && (b ^ result) & 0x80 == 0 {
        general |= PF;
    }

    // Carry flag (borrow)
    if u16::from(a) < u16::from(b) + u16::from(c) {
        general |= CF;
    }

    AluResult {
        value: result,
        flags: Flags::from_result(result, general),
    }
}

/// Compare: subtract for flags only. Bits 5/3 come from the operand.
#[must_use]
pub fn cp8(a: u8, b: u8) -> Flags {
    let mut flags = sub8(a, b, false).flags;
    flags.undocumented = b;
    flags
}

/// AND operation. H is always set.
#[must_use]
pub fn and8(a: u8, b: u8) -> AluResult {
    let result = a & b;
    AluResult {
        value: result,
        flags: Flags::from_result(result, HF | parity_flag(result)),
    }
}

/// OR operation.
#[must_use]
pub fn or8(a: u8, b: u8) -> AluResult {
    let result = a | b;
    AluResult {
        value: result,
        flags: Flags::from_result(result, parity_flag(result)),
    }
}

/// XOR operation.
#[must_use]
pub fn xor8(a: u8, b: u8) -> AluResult {
    let result = a ^ b;
    AluResult {
        value: result,
        flags: Flags::from_result(result, parity_flag(result)),
    }
}

/// Increment. Carry is preserved.
#[must_use]
pub fn inc8(value: u8, flags: Flags) -> AluResult {
    let result = value.wrapping_add(1);
    let mut general = flags.general & CF;
    if value & 0x0F == 0x0F {
        general |= HF;
    }
    if value == 0x7F {
        general |= PF;
    }
    AluResult {
        value: result,
        flags: Flags::from_result(result, general),
    }
}

/// Decrement. Carry is preserved.
#[must_use]
pub fn dec8(value: u8, flags: Flags) -> AluResult {
    let result = value.wrapping_sub(1);
    let mut general = (flags.general & CF) | NF;
    if value & 0x0F == 0 {
        general |= HF;
    }
    if value == 0x80 {
        general |= PF;
    }
    AluResult {
        value: result,
        flags: Flags::from_result(result, general),
    }
}

/// 16-bit add (ADD HL, rr). S, Z and P/V are preserved; bits 5/3 come
/// from the high byte.
#[must_use]
pub fn add16(a: u16, b: u16, flags: Flags) -> AluResult16 {
    let result32 = u32::from(a) + u32::from(b);
    let result = result32 as u16;

    let mut general = flags.general & PF;
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF {
        general |= HF;
    }
    if result32 > 0xFFFF {
        general |= CF;
    }

    AluResult16 {
        value: result,
        flags: Flags {
            general,
            sign: flags.sign,
            zero: flags.zero,
            undocumented: (result >> 8) as u8,
        },
    }
}

/// Flags for a full 16-bit result: sign and bits 5/3 from the high byte,
/// zero from both bytes.
const fn flags16(result: u16, general: u8) -> Flags {
    let high = (result >> 8) as u8;
    Flags {
        general,
        sign: high,
        zero: high | result as u8,
        undocumented: high,
    }
}

/// 16-bit add with carry (ADC HL, rr).
#[must_use]
pub fn adc16(a: u16, b: u16, flags: Flags) -> AluResult16 {
    let c = u16::from(flags.carry());
    let result32 = u32::from(a) + u32::from(b) + u32::from(c);
    let result = result32 as u16;

    let mut general = 0;
    if (a & 0x0FFF) + (b & 0x0FFF) + c > 0x0FFF {
        general |= HF;
    }
    if (a ^ b) & 0x8000 == 0 && (a ^ result) & 0x8000 != 0 {
        general |= PF;
    }
    if result32 > 0xFFFF {
        general |= CF;
    }

    AluResult16 {
        value: result,
        flags: flags16(result, general),
    }
}

/// 16-bit subtract with borrow (SBC HL, rr).
#[must_use]
pub fn sbc16(a: u16, b: u16, flags: Flags) -> AluResult16 {
    let c = u16::from(flags.carry());
    let result = a.wrapping_sub(b).wrapping_sub(c);

    let mut general = NF;
    if (a & 0x0FFF) < (b & 0x0FFF) + c {
        general |= HF;
    }
    if (a ^ b) & 0x8000 != 0 && (b ^ result) & 0x8000 == 0 {
        general |= PF;
    }
    if u32::from(a) < u32::from(b) + u32::from(c) {
        general |= CF;
    }

    AluResult16 {
        value: result,
        flags: flags16(result, general),
    }
}

/// RLCA, RRCA, RLA and RRA: like their CB-page cousins but S, Z and P/V
/// are left alone.
#[must_use]
pub fn rotate_accumulator(shift: Shift, a: u8, flags: Flags) -> AluResult {
    let rotated = shift.apply(a, flags);
    AluResult {
        value: rotated.value,
        flags: Flags {
            general: (flags.general & PF) | (rotated.flags.general & CF),
            sign: flags.sign,
            zero: flags.zero,
            undocumented: rotated.value,
        },
    }
}

/// BIT n: zero and P/V report the tested bit; sign only for bit 7.
#[must_use]
pub fn bit(mask: u8, value: u8, flags: Flags) -> Flags {
    let result = value & mask;
    let mut general = (flags.general & CF) | HF;
    if result == 0 {
        general |= PF;
    }
    Flags {
        general,
        sign: result,
        zero: result,
        undocumented: value,
    }
}

/// Decimal adjust after BCD add or subtract.
#[must_use]
pub fn daa(a: u8, flags: Flags) -> AluResult {
    let mut correction = 0;
    let mut carry = flags.carry();
    if flags.half_carry() || a & 0x0F > 9 {
        correction |= 0x06;
    }
    if carry || a > 0x99 {
        correction |= 0x60;
        carry = true;
    }

    let subtract = flags.subtract();
    let result = if subtract {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    let half = if subtract {
        flags.half_carry() && a & 0x0F < 6
    } else {
        a & 0x0F > 9
    };

    let mut general = (flags.general & NF) | parity_flag(result);
    if carry {
        general |= CF;
    }
    if half {
        general |= HF;
    }
    AluResult {
        value: result,
        flags: Flags::from_result(result, general),
    }
}

/// Complement the accumulator.
#[must_use]
pub fn cpl(a: u8, flags: Flags) -> AluResult {
    let result = !a;
    AluResult {
        value: result,
        flags: Flags {
            general: flags.general | HF | NF,
            undocumented: result,
            ..flags
        },
    }
}

/// Negate the accumulator: 0 - A.
#[must_use]
pub fn neg(a: u8) -> AluResult {
    sub8(0, a, false)
}

/// Set carry. Bits 5/3 come from the accumulator.
#[must_use]
pub fn scf(a: u8, flags: Flags) -> Flags {
    Flags {
        general: (flags.general & PF) | CF,
        undocumented: a,
        ..flags
    }
}

/// Complement carry; H takes the old carry.
#[must_use]
pub fn ccf(a: u8, flags: Flags) -> Flags {
    let mut general = flags.general & PF;
    if flags.carry() {
        general |= HF;
    } else {
        general |= CF;
    }
    Flags {
        general,
        undocumented: a,
        ..flags
    }
}

/// Bits 5/3 for the block transfer and compare instructions: bit 3 of `n`
/// and bit 1 of `n` moved up to bit 5.
#[must_use]
pub const fn block_undocumented(n: u8) -> u8 {
    (n & XF) | ((n << 4) & YF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{SF, ZF};
    use proptest::prelude::*;
    use rstest::rstest;

    fn composed(result: AluResult) -> (u8, u8) {
        (result.value, result.flags.compose())
    }

    #[rstest]
    #[case(0x0F, 0x01, false, 0x10, HF)]
    #[case(0x7F, 0x01, false, 0x80, SF | HF | PF)]
    #[case(0xFF, 0x01, false, 0x00, ZF | HF | CF)]
    #[case(0x80, 0x80, false, 0x00, ZF | PF | CF)]
    #[case(0x10, 0x17, true, 0x28, YF | XF)]
    fn add8_cases(#[case] a: u8, #[case] b: u8, #[case] carry: bool, #[case] value: u8, #[case] f: u8) {
        assert_eq!(composed(add8(a, b, carry)), (value, f));
    }

    #[rstest]
    #[case(0x10, 0x01, false, 0x0F, NF | HF | XF)]
    #[case(0x80, 0x01, false, 0x7F, NF | HF | PF | YF | XF)]
    #[case(0x00, 0x01, false, 0xFF, SF | YF | HF | XF | NF | CF)]
    #[case(0x05, 0x05, false, 0x00, ZF | NF)]
    fn sub8_cases(#[case] a: u8, #[case] b: u8, #[case] carry: bool, #[case] value: u8, #[case] f: u8) {
        assert_eq!(composed(sub8(a, b, carry)), (value, f));
    }

    #[test]
    fn inc_from_0x7f_overflows_and_keeps_carry() {
        let flags = Flags::decompose(CF);
        let result = inc8(0x7F, flags);
        assert_eq!(result.value, 0x80);
        assert_eq!(result.flags.compose(), SF | HF | PF | CF);

        let result = inc8(0x7F, Flags::decompose(0));
        assert!(!result.flags.carry());
    }

    #[test]
    fn dec_from_0x80_overflows() {
        let result = dec8(0x80, Flags::decompose(0));
        assert_eq!(result.value, 0x7F);
        assert_eq!(result.flags.compose(), YF | HF | XF | PF | NF);
    }

    #[test]
    fn compare_takes_bits_5_and_3_from_the_operand() {
        let flags = cp8(0x00, 0x28);
        assert_eq!(flags.compose() & (YF | XF), YF | XF);
        assert!(flags.carry());
    }

    #[test]
    fn only_and_forces_half_carry() {
        assert!(and8(0xF0, 0x0F).flags.half_carry());
        assert!(!or8(0xF0, 0x0F).flags.half_carry());
        assert!(!xor8(0xF0, 0x0F).flags.half_carry());
        assert!(and8(0xF0, 0x0F).flags.is_zero());
        assert!(and8(0xF0, 0x0F).flags.parity_overflow());
    }

    #[rstest]
    #[case(Shift::Rlc, 0x81, false, 0x03, true)]
    #[case(Shift::Rrc, 0x01, false, 0x80, true)]
    #[case(Shift::Rl, 0x80, true, 0x01, true)]
    #[case(Shift::Rr, 0x01, true, 0x80, true)]
    #[case(Shift::Sla, 0xC0, false, 0x80, true)]
    #[case(Shift::Sra, 0x81, false, 0xC0, true)]
    #[case(Shift::Sll, 0x40, false, 0x81, false)]
    #[case(Shift::Srl, 0x81, true, 0x40, true)]
    fn shifts(#[case] shift: Shift, #[case] value: u8, #[case] carry: bool, #[case] expected: u8, #[case] carry_out: bool) {
        let flags = Flags::decompose(if carry { CF } else { 0 });
        let result = shift.apply(value, flags);
        assert_eq!(result.value, expected);
        assert_eq!(result.flags.carry(), carry_out);
        assert!(!result.flags.half_carry());
    }

    #[test]
    fn accumulator_rotates_keep_sign_zero_and_parity() {
        let flags = Flags::decompose(SF | ZF | PF);
        let result = rotate_accumulator(Shift::Rlc, 0x80, flags);
        assert_eq!(result.value, 0x01);
        assert_eq!(result.flags.compose(), SF | ZF | PF | CF);
    }

    #[test]
    fn sixteen_bit_add_preserves_sign_zero_parity() {
        let flags = Flags::decompose(SF | ZF | PF);
        let result = add16(0x0FFF, 0x0001, flags);
        assert_eq!(result.value, 0x1000);
        assert_eq!(result.flags.compose(), SF | ZF | HF | PF);
    }

    #[test]
    fn sbc16_zero_needs_both_bytes() {
        let result = sbc16(0x0100, 0x00FF, Flags::decompose(CF));
        assert_eq!(result.value, 0x0000);
        assert!(result.flags.is_zero());
        let result = sbc16(0x0100, 0x0001, Flags::decompose(0));
        assert_eq!(result.value, 0x00FF);
        assert!(!result.flags.is_zero());
    }

    #[test]
    fn daa_adjusts_bcd_addition() {
        let sum = add8(0x15, 0x27, false);
        let adjusted = daa(sum.value, sum.flags);
        assert_eq!(adjusted.value, 0x42);
        assert!(!adjusted.flags.carry());

        let sum = add8(0x99, 0x01, false);
        let adjusted = daa(sum.value, sum.flags);
        assert_eq!(adjusted.value, 0x00);
        assert!(adjusted.flags.carry());
        assert!(adjusted.flags.is_zero());
    }

    #[test]
    fn bit_test_reports_tested_bit() {
        let flags = bit(0x80, 0x80, Flags::decompose(CF));
        assert!(flags.is_negative());
        assert!(!flags.is_zero());
        assert!(flags.carry());

        let flags = bit(0x01, 0xFE, Flags::decompose(0));
        assert!(flags.is_zero());
        assert!(flags.parity_overflow());
    }

    #[test]
    fn carry_flag_instructions() {
        let flags = scf(0x28, Flags::decompose(0));
        assert_eq!(flags.compose(), YF | XF | CF);
        let flags = scf(0x00, Flags::decompose(ZF | SF));
        assert_eq!(flags.compose(), SF | ZF | CF);
        let flags = ccf(0x00, Flags::decompose(CF));
        assert_eq!(flags.compose() & (HF | CF), HF);
    }

    proptest! {
        #[test]
        fn add_overflow_means_same_sign_operands_and_flipped_result(a: u8, b: u8, carry: bool) {
            let result = add8(a, b, carry);
            let expected = (a ^ b) & 0x80 == 0 && (a ^ result.value) & 0x80 != 0;
            prop_assert_eq!(result.flags.parity_overflow(), expected);
            prop_assert_eq!(result.value, a.wrapping_add(b).wrapping_add(u8::from(carry)));
        }

        #[test]
        fn sub_overflow_means_result_sign_matches_subtrahend(a: u8, b: u8, carry: bool) {
            let result = sub8(a, b, carry);
            let expected = (a ^ b) & 0x80 != 0 && (b ^ result.value) & 0x80 == 0;
            prop_assert_eq!(result.flags.parity_overflow(), expected);
            prop_assert!(result.flags.subtract());
        }

        #[test]
        fn signed_arithmetic_agrees_with_overflow(a: i8, b: i8) {
            let result = add8(a as u8, b as u8, false);
            prop_assert_eq!(result.flags.parity_overflow(), a.checked_add(b).is_none());
            let result = sub8(a as u8, b as u8, false);
            prop_assert_eq!(result.flags.parity_overflow(), a.checked_sub(b).is_none());
        }
    }
}
