//! Flag register bit masks and the shared flag-composition helpers.
//!
//! Bits 3 and 5 ([`XF`] and [`YF`]) have no documented meaning but are
//! observable through `PUSH AF`, so every operation computes them the way
//! the silicon does.

/// Sign flag (bit 7).
pub const SF: u8 = 0b1000_0000;
/// Zero flag (bit 6).
pub const ZF: u8 = 0b0100_0000;
/// Undocumented copy of result bit 5.
pub const YF: u8 = 0b0010_0000;
/// Half-carry flag (bit 4).
pub const HF: u8 = 0b0001_0000;
/// Undocumented copy of result bit 3.
pub const XF: u8 = 0b0000_1000;
/// Parity/overflow flag (bit 2).
pub const PF: u8 = 0b0000_0100;
/// Add/subtract flag (bit 1).
pub const NF: u8 = 0b0000_0010;
/// Carry flag (bit 0).
pub const CF: u8 = 0b0000_0001;

/// Returns true when `value` has an even number of set bits.
#[must_use]
pub const fn parity_even(value: u8) -> bool {
    value.count_ones() % 2 == 0
}

/// Sign, zero and the undocumented bit-3/bit-5 copies of `value`.
#[must_use]
pub const fn sz53(value: u8) -> u8 {
    let mut flags = value & (SF | YF | XF);
    if value == 0 {
        flags |= ZF;
    }
    flags
}

/// [`sz53`] plus the parity of `value` in [`PF`].
#[must_use]
pub const fn sz53p(value: u8) -> u8 {
    let mut flags = sz53(value);
    if parity_even(value) {
        flags |= PF;
    }
    flags
}
