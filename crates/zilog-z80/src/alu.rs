//! Arithmetic and logic primitives.
//!
//! Every helper is a pure function from operands (and the incoming flag
//! byte where an operation reads flags) to a `(result, flags)` pair, so
//! the execution loop stays free of flag bookkeeping and the exact
//! formulas are testable in isolation.

use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53, sz53p};

/// 8-bit add, optionally with carry in.
#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> (u8, u8) {
    let carry_in = u8::from(carry);
    let result = a.wrapping_add(b).wrapping_add(carry_in);
    let mut flags = sz53(result);
    if (a & 0x0F) + (b & 0x0F) + carry_in > 0x0F {
        flags |= HF;
    }
    if ((a ^ b) & 0x80) == 0 && ((a ^ result) & 0x80) != 0 {
        flags |= PF;
    }
    if u16::from(a) + u16::from(b) + u16::from(carry_in) > 0xFF {
        flags |= CF;
    }
    (result, flags)
}

/// 8-bit subtract, optionally with borrow in.
#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> (u8, u8) {
    let carry_in = u8::from(carry);
    let result = a.wrapping_sub(b).wrapping_sub(carry_in);
    let mut flags = sz53(result) | NF;
    if u16::from(a & 0x0F) < u16::from(b & 0x0F) + u16::from(carry_in) {
        flags |= HF;
    }
    if ((a ^ b) & 0x80) != 0 && ((b ^ result) & 0x80) == 0 {
        flags |= PF;
    }
    if u16::from(a) < u16::from(b) + u16::from(carry_in) {
        flags |= CF;
    }
    (result, flags)
}

#[must_use]
pub fn and8(a: u8, b: u8) -> (u8, u8) {
    let result = a & b;
    (result, sz53p(result) | HF)
}

#[must_use]
pub fn xor8(a: u8, b: u8) -> (u8, u8) {
    let result = a ^ b;
    (result, sz53p(result))
}

#[must_use]
pub fn or8(a: u8, b: u8) -> (u8, u8) {
    let result = a | b;
    (result, sz53p(result))
}

/// `CP`: subtract flags, except bits 3 and 5 come from the operand.
#[must_use]
pub fn cp8(a: u8, b: u8) -> u8 {
    let (_, flags) = sub8(a, b, false);
    (flags & !(XF | YF)) | (b & (XF | YF))
}

/// `INC r`: carry is untouched, overflow only fires at `0x7F`.
#[must_use]
pub fn inc8(value: u8, f: u8) -> (u8, u8) {
    let result = value.wrapping_add(1);
    let mut flags = (f & CF) | sz53(result);
    if value & 0x0F == 0x0F {
        flags |= HF;
    }
    if value == 0x7F {
        flags |= PF;
    }
    (result, flags)
}

/// `DEC r`: carry is untouched, overflow only fires at `0x80`.
#[must_use]
pub fn dec8(value: u8, f: u8) -> (u8, u8) {
    let result = value.wrapping_sub(1);
    let mut flags = (f & CF) | NF | sz53(result);
    if value & 0x0F == 0 {
        flags |= HF;
    }
    if value == 0x80 {
        flags |= PF;
    }
    (result, flags)
}

/// `ADD HL,rr`: sign, zero and parity survive; half-carry is from bit 11
/// and the undocumented bits come from the high byte of the result.
#[must_use]
pub fn add16(a: u16, b: u16, f: u8) -> (u16, u8) {
    let result = a.wrapping_add(b);
    let high = (result >> 8) as u8;
    let mut flags = (f & (SF | ZF | PF)) | (high & (XF | YF));
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF {
        flags |= HF;
    }
    if u32::from(a) + u32::from(b) > 0xFFFF {
        flags |= CF;
    }
    (result, flags)
}

/// `ADC HL,rr`: a full 16-bit add with every flag computed.
#[must_use]
pub fn adc16(a: u16, b: u16, f: u8) -> (u16, u8) {
    let carry_in = u16::from(f & CF);
    let wide = u32::from(a) + u32::from(b) + u32::from(carry_in);
    let result = wide as u16;
    let high = (result >> 8) as u8;
    let mut flags = high & (SF | YF | XF);
    if result == 0 {
        flags |= ZF;
    }
    if (a & 0x0FFF) + (b & 0x0FFF) + carry_in > 0x0FFF {
        flags |= HF;
    }
    if ((a ^ b) & 0x8000) == 0 && ((a ^ result) & 0x8000) != 0 {
        flags |= PF;
    }
    if wide > 0xFFFF {
        flags |= CF;
    }
    (result, flags)
}

/// `SBC HL,rr`: a full 16-bit subtract with every flag computed.
#[must_use]
pub fn sbc16(a: u16, b: u16, f: u8) -> (u16, u8) {
    let carry_in = u16::from(f & CF);
    let result = a.wrapping_sub(b).wrapping_sub(carry_in);
    let high = (result >> 8) as u8;
    let mut flags = NF | (high & (SF | YF | XF));
    if result == 0 {
        flags |= ZF;
    }
    if (a & 0x0FFF) < (b & 0x0FFF) + carry_in {
        flags |= HF;
    }
    if ((a ^ b) & 0x8000) != 0 && ((b ^ result) & 0x8000) == 0 {
        flags |= PF;
    }
    if u32::from(a) < u32::from(b) + u32::from(carry_in) {
        flags |= CF;
    }
    (result, flags)
}

#[must_use]
pub fn rlc8(value: u8) -> (u8, u8) {
    let result = value.rotate_left(1);
    (result, sz53p(result) | (value >> 7))
}

#[must_use]
pub fn rrc8(value: u8) -> (u8, u8) {
    let result = value.rotate_right(1);
    (result, sz53p(result) | (value & CF))
}

#[must_use]
pub fn rl8(value: u8, f: u8) -> (u8, u8) {
    let result = (value << 1) | (f & CF);
    (result, sz53p(result) | (value >> 7))
}

#[must_use]
pub fn rr8(value: u8, f: u8) -> (u8, u8) {
    let result = (value >> 1) | ((f & CF) << 7);
    (result, sz53p(result) | (value & CF))
}

#[must_use]
pub fn sla8(value: u8) -> (u8, u8) {
    let result = value << 1;
    (result, sz53p(result) | (value >> 7))
}

#[must_use]
pub fn sra8(value: u8) -> (u8, u8) {
    let result = (value >> 1) | (value & 0x80);
    (result, sz53p(result) | (value & CF))
}

/// Undocumented `SLL`: shifts left and feeds a `1` into bit 0.
#[must_use]
pub fn sll8(value: u8) -> (u8, u8) {
    let result = (value << 1) | 1;
    (result, sz53p(result) | (value >> 7))
}

#[must_use]
pub fn srl8(value: u8) -> (u8, u8) {
    let result = value >> 1;
    (result, sz53p(result) | (value & CF))
}

/// `RLCA`/`RRCA`/`RLA`/`RRA` keep sign, zero and parity; only carry and
/// the undocumented bits change.
fn acc_rotate_flags(result: u8, f: u8, carry: bool) -> u8 {
    (f & (SF | ZF | PF)) | (result & (XF | YF)) | u8::from(carry)
}

#[must_use]
pub fn rlca(a: u8, f: u8) -> (u8, u8) {
    let result = a.rotate_left(1);
    (result, acc_rotate_flags(result, f, a & 0x80 != 0))
}

#[must_use]
pub fn rrca(a: u8, f: u8) -> (u8, u8) {
    let result = a.rotate_right(1);
    (result, acc_rotate_flags(result, f, a & 0x01 != 0))
}

#[must_use]
pub fn rla(a: u8, f: u8) -> (u8, u8) {
    let result = (a << 1) | (f & CF);
    (result, acc_rotate_flags(result, f, a & 0x80 != 0))
}

#[must_use]
pub fn rra(a: u8, f: u8) -> (u8, u8) {
    let result = (a >> 1) | ((f & CF) << 7);
    (result, acc_rotate_flags(result, f, a & 0x01 != 0))
}

/// Decimal adjust after a BCD add or subtract.
#[must_use]
pub fn daa(a: u8, f: u8) -> (u8, u8) {
    let hf = f & HF != 0;
    let nf = f & NF != 0;
    let cf = f & CF != 0;
    let low = a & 0x0F;

    let mut correction = 0u8;
    if hf || low > 9 {
        correction |= 0x06;
    }
    let mut carry_out = cf;
    if cf || a > 0x99 {
        correction |= 0x60;
        carry_out = true;
    }
    let result = if nf {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    let half = if nf { hf && low < 6 } else { low > 9 };

    let mut flags = sz53p(result);
    if nf {
        flags |= NF;
    }
    if carry_out {
        flags |= CF;
    }
    if half {
        flags |= HF;
    }
    (result, flags)
}

#[must_use]
pub fn cpl(a: u8, f: u8) -> (u8, u8) {
    let result = !a;
    (
        result,
        (f & (SF | ZF | PF | CF)) | HF | NF | (result & (XF | YF)),
    )
}

#[must_use]
pub fn ccf(a: u8, f: u8) -> u8 {
    let carry = f & CF != 0;
    let mut flags = (f & (SF | ZF | PF)) | (a & (XF | YF));
    if carry {
        flags |= HF;
    } else {
        flags |= CF;
    }
    flags
}

#[must_use]
pub fn scf(a: u8, f: u8) -> u8 {
    (f & (SF | ZF | PF)) | (a & (XF | YF)) | CF
}

/// `BIT n`: the undocumented bits mirror `xy_source`, which is the tested
/// value for register forms and the fetched byte for memory forms.
#[must_use]
pub fn bit_flags(bit: u8, value: u8, f: u8, xy_source: u8) -> u8 {
    let set = value & (1 << bit) != 0;
    let mut flags = (f & CF) | HF | (xy_source & (XF | YF));
    if !set {
        flags |= ZF | PF;
    }
    if bit == 7 && set {
        flags |= SF;
    }
    flags
}

/// `IN r,(C)`: carry survives, everything else follows the input byte.
#[must_use]
pub fn in_flags(value: u8, f: u8) -> u8 {
    (f & CF) | sz53p(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_half_carry_and_overflow() {
        assert_eq!(add8(0x0F, 0x01, false), (0x10, HF));
        assert_eq!(add8(0x7F, 0x01, false), (0x80, SF | HF | PF));
        assert_eq!(add8(0xFF, 0x01, false), (0x00, ZF | HF | CF));
        assert_eq!(add8(0xFF, 0x00, true), (0x00, ZF | HF | CF));
    }

    #[test]
    fn sub_borrow_sets_every_expected_bit() {
        assert_eq!(sub8(0x00, 0x01, false), (0xFF, 0xBB));
        assert_eq!(sub8(0x80, 0x01, false), (0x7F, YF | HF | XF | PF | NF));
        assert_eq!(sub8(0x10, 0x10, false), (0x00, ZF | NF));
    }

    #[test]
    fn compare_copies_operand_bits_three_and_five() {
        assert_eq!(cp8(0x10, 0x20), SF | YF | NF | CF);
        assert_eq!(cp8(0x10, 0x08), XF | NF);
    }

    #[test]
    fn logic_ops() {
        assert_eq!(and8(0xF0, 0x0F), (0x00, ZF | HF | PF));
        assert_eq!(xor8(0x5A, 0x5A), (0x00, ZF | PF));
        assert_eq!(or8(0x80, 0x01), (0x81, SF | PF));
    }

    #[test]
    fn inc_dec_overflow_edges() {
        assert_eq!(inc8(0x7F, 0), (0x80, SF | HF | PF));
        assert_eq!(inc8(0xFF, CF), (0x00, ZF | HF | CF));
        assert_eq!(dec8(0x80, 0), (0x7F, YF | HF | XF | PF | NF));
        assert_eq!(dec8(0x01, CF), (0x00, ZF | NF | CF));
    }

    #[test]
    fn sixteen_bit_adds() {
        let (result, flags) = add16(0x0FFF, 0x0001, SF | ZF | PF);
        assert_eq!(result, 0x1000);
        assert_eq!(flags, SF | ZF | PF | HF | XF);

        let (result, flags) = adc16(0xFFFF, 0x0000, CF);
        assert_eq!(result, 0x0000);
        assert_eq!(flags, ZF | HF | CF);

        let (result, flags) = sbc16(0x0000, 0x0001, 0);
        assert_eq!(result, 0xFFFF);
        assert_eq!(flags, SF | YF | HF | XF | NF | CF);
    }

    #[test]
    fn rotates_move_the_right_bit_into_carry() {
        assert_eq!(rlc8(0x80), (0x01, CF));
        assert_eq!(rrc8(0x01), (0x80, SF | CF));
        assert_eq!(rl8(0x80, 0), (0x00, ZF | PF | CF));
        assert_eq!(rr8(0x01, CF), (0x80, SF | CF));
        assert_eq!(sra8(0x81), (0xC0, SF | PF | CF));
        assert_eq!(sll8(0x00), (0x01, 0));
        assert_eq!(srl8(0x01), (0x00, ZF | PF | CF));
    }

    #[test]
    fn accumulator_rotates_preserve_sign_zero_parity() {
        let (value, flags) = rlca(0x81, SF | ZF | PF);
        assert_eq!(value, 0x03);
        assert_eq!(flags, SF | ZF | PF | CF);
        let (value, flags) = rra(0x01, 0);
        assert_eq!(value, 0x00);
        assert_eq!(flags, CF);
    }

    #[test]
    fn daa_corrects_bcd_sums() {
        // 0x15 + 0x27 = 0x3C, adjusted to 0x42.
        let (_, add_flags) = add8(0x15, 0x27, false);
        assert_eq!(daa(0x3C, add_flags), (0x42, HF | PF));
        // 0x99 + 0x01 = 0x9A, adjusted to 0x00 with carry.
        let (_, add_flags) = add8(0x99, 0x01, false);
        assert_eq!(daa(0x9A, add_flags), (0x00, ZF | HF | PF | CF));
        // 0x20 - 0x05 = 0x1B, adjusted to 0x15.
        let (_, sub_flags) = sub8(0x20, 0x05, false);
        assert_eq!(daa(0x1B, sub_flags), (0x15, NF));
    }

    #[test]
    fn carry_flag_games() {
        assert_eq!(ccf(0x00, CF), HF);
        assert_eq!(ccf(0x28, 0), YF | XF | CF);
        assert_eq!(scf(0x00, SF | HF | NF), SF | CF);
    }

    #[test]
    fn bit_test_flags() {
        assert_eq!(bit_flags(7, 0x80, 0, 0x80), SF | HF);
        assert_eq!(bit_flags(0, 0x00, CF, 0x28), ZF | YF | HF | XF | PF | CF);
        assert_eq!(bit_flags(3, 0x08, 0, 0x00), HF);
    }
}
