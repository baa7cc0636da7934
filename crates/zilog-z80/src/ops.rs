//! The decoded instruction vocabulary.
//!
//! [`Op`] names what an instruction does once its operand bytes are in
//! hand; the decode tables map every byte sequence onto one of these
//! variants plus an [`Operands`] layout saying which trailing bytes to
//! fetch. Execution is then a single match over `Op`.

/// An 8-bit register operand, including the undocumented index-register
/// halves reachable through the `DD`/`FD` prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    B,
    C,
    D,
    E,
    H,
    L,
    A,
    IxH,
    IxL,
    IyH,
    IyL,
}

/// A 16-bit register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    Bc,
    De,
    Hl,
    Sp,
    Af,
    Ix,
    Iy,
}

/// A memory operand: `(HL)`, or an index register plus displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ea {
    Hl,
    Ix,
    Iy,
}

/// A branch condition, in opcode-field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Nz,
    Z,
    Nc,
    C,
    Po,
    Pe,
    P,
    M,
}

/// The eight accumulator arithmetic/logic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluCmd {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

/// The eight `CB`-page rotate/shift operations. `Sll` is undocumented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotCmd {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Sll,
    Srl,
}

/// Which trailing bytes an instruction carries after its opcode bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    /// Nothing beyond the opcode.
    None,
    /// One immediate byte.
    Imm8,
    /// Two immediate bytes, little-endian.
    Imm16,
    /// One signed branch displacement.
    Rel8,
    /// One signed index displacement.
    Disp,
    /// Index displacement followed by an immediate byte.
    DispImm8,
    /// Index displacement followed by the final opcode byte (`DD CB`).
    BitDisp,
}

/// A fully decoded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop,
    /// A `DD`/`FD` byte followed by another prefix: acts as a 4-cycle NOP
    /// and leaves the next byte to be decoded on its own.
    PrefixNop,
    Halt,

    // 8-bit loads.
    LdRR(Reg8, Reg8),
    LdRImm(Reg8),
    LdRMem(Reg8, Ea),
    LdMemR(Ea, Reg8),
    LdMemImm(Ea),
    LdABcInd,
    LdADeInd,
    LdAAbs,
    LdBcIndA,
    LdDeIndA,
    LdAbsA,
    LdAI,
    LdAR,
    LdIA,
    LdRA,

    // 16-bit loads.
    LdRpImm(Reg16),
    LdRpAbs(Reg16),
    LdAbsRp(Reg16),
    LdSpRp(Reg16),
    Push(Reg16),
    Pop(Reg16),

    // Exchanges.
    ExDeHl,
    ExAfAf,
    Exx,
    ExSpRp(Reg16),

    // 8-bit arithmetic and logic.
    AluR(AluCmd, Reg8),
    AluMem(AluCmd, Ea),
    AluImm(AluCmd),
    IncR(Reg8),
    DecR(Reg8),
    IncMem(Ea),
    DecMem(Ea),

    // Accumulator and flag operations.
    Daa,
    Cpl,
    Neg,
    Ccf,
    Scf,

    // 16-bit arithmetic.
    AddRp(Reg16, Reg16),
    AdcHl(Reg16),
    SbcHl(Reg16),
    IncRp(Reg16),
    DecRp(Reg16),

    // Rotates.
    Rlca,
    Rrca,
    Rla,
    Rra,
    Rld,
    Rrd,
    RotR(RotCmd, Reg8),
    RotMem(RotCmd, Ea),
    /// Undocumented `DD CB` form: rotate the memory byte, then copy the
    /// result into a register as well.
    RotMemCopy(RotCmd, Ea, Reg8),

    // Bit operations.
    BitR(u8, Reg8),
    BitMem(u8, Ea),
    ResR(u8, Reg8),
    ResMem(u8, Ea),
    ResMemCopy(u8, Ea, Reg8),
    SetR(u8, Reg8),
    SetMem(u8, Ea),
    SetMemCopy(u8, Ea, Reg8),

    // Control flow. `None` means unconditional.
    JpAbs(Option<Cond>),
    JpRp(Reg16),
    JrRel(Option<Cond>),
    Djnz,
    CallAbs(Option<Cond>),
    Ret,
    RetCc(Cond),
    RetI,
    RetN,
    Rst(u8),

    // Interrupt control.
    Di,
    Ei,
    Im(u8),

    // Input/output. `None` selects the flag-only / zero-output
    // undocumented forms of `IN (C)` and `OUT (C),0`.
    InAImm,
    OutImmA,
    InRC(Option<Reg8>),
    OutCR(Option<Reg8>),

    // Block transfer, search and I/O.
    Ldi,
    Ldd,
    Ldir,
    Lddr,
    Cpi,
    Cpd,
    Cpir,
    Cpdr,
    Ini,
    Ind,
    Inir,
    Indr,
    Outi,
    Outd,
    Otir,
    Otdr,

    /// An unassigned `ED`-page byte: two bytes, eight cycles, no effect.
    EdNop,
}
