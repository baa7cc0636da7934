//! The instruction decode tables.
//!
//! Decoding is a pure lookup: up to three bytes of a possible
//! prefix/opcode sequence select an [`Instruction`] out of seven
//! 256-entry pages built once at startup. Every byte value in every page
//! decodes to something well-defined, so the execution loop never meets
//! an "unknown opcode" case. Undocumented encodings follow the observed
//! NMOS behaviour: unassigned `ED` bytes are slow NOPs, a `DD`/`FD`
//! prefix in front of an instruction that never touches HL simply costs
//! a byte and four cycles, and `DD CB` rotates write their result to a
//! register as well as memory.
//!
//! The `DD` and `FD` pages are not written out by hand; they are derived
//! from the base page by substituting IX or IY into the HL-flavoured
//! entries and adjusting sizes and cycle counts.

use emu_core::Ticks;

use crate::disasm;
use crate::ops::{AluCmd, Cond, Ea, Op, Operands, Reg8, Reg16, RotCmd};

/// One fully decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub op: Op,
    pub operands: Operands,
    /// Total encoded length in bytes, including prefixes and operands.
    pub size: u8,
    /// How many of those bytes are prefix/opcode rather than operand.
    pub opcode_size: u8,
    /// Cycle cost when no conditional extra work happens.
    pub tstates: u8,
    /// Additional cycles when a branch is taken or a block op repeats.
    pub tstates_extra: u8,
    pub mnemonic: String,
}

impl Instruction {
    fn new(
        op: Op,
        operands: Operands,
        size: u8,
        opcode_size: u8,
        tstates: u8,
        tstates_extra: u8,
    ) -> Self {
        let mnemonic = disasm::mnemonic(&op);
        Self {
            op,
            operands,
            size,
            opcode_size,
            tstates,
            tstates_extra,
            mnemonic,
        }
    }

    /// Master-clock ticks for the unconditional cycle cost.
    #[must_use]
    pub fn ticks(&self) -> Ticks {
        Ticks::from_cycles(u64::from(self.tstates))
    }

    /// Master-clock ticks when the conditional extra cost is also paid.
    #[must_use]
    pub fn max_ticks(&self) -> Ticks {
        Ticks::from_cycles(u64::from(self.tstates) + u64::from(self.tstates_extra))
    }
}

type Page = Box<[Instruction; 256]>;

/// The seven decode pages, indexed by prefix then opcode byte.
pub struct InstructionTable {
    base: Page,
    cb: Page,
    ed: Page,
    dd: Page,
    fd: Page,
    ddcb: Page,
    fdcb: Page,
}

impl InstructionTable {
    #[must_use]
    pub fn new() -> Self {
        let base = build_page(build_base);
        let dd = build_index_page(&base, Ea::Ix);
        let fd = build_index_page(&base, Ea::Iy);
        Self {
            base,
            cb: build_page(build_cb),
            ed: build_page(build_ed),
            dd,
            fd,
            ddcb: build_page(|opcode| build_bit_indexed(opcode, Ea::Ix)),
            fdcb: build_page(|opcode| build_bit_indexed(opcode, Ea::Iy)),
        }
    }

    /// Decodes the byte sequence starting with `b0`. `b1` is the byte
    /// after a prefix and `b2` the final opcode byte of a `DD CB`/`FD CB`
    /// sequence; callers pass zeroes when those bytes are not present.
    #[must_use]
    pub fn lookup(&self, b0: u8, b1: u8, b2: u8) -> &Instruction {
        match b0 {
            0xCB => &self.cb[usize::from(b1)],
            0xED => &self.ed[usize::from(b1)],
            0xDD => {
                if b1 == 0xCB {
                    &self.ddcb[usize::from(b2)]
                } else {
                    &self.dd[usize::from(b1)]
                }
            }
            0xFD => {
                if b1 == 0xCB {
                    &self.fdcb[usize::from(b2)]
                } else {
                    &self.fd[usize::from(b1)]
                }
            }
            _ => &self.base[usize::from(b0)],
        }
    }
}

impl Default for InstructionTable {
    fn default() -> Self {
        Self::new()
    }
}

fn build_page(build: impl Fn(u8) -> Instruction) -> Page {
    Box::new(std::array::from_fn(|opcode| build(opcode as u8)))
}

/// Register operand in opcode-field order; index 6 is the `(HL)` column.
fn reg8(code: u8) -> Reg8 {
    match code {
        0 => Reg8::B,
        1 => Reg8::C,
        2 => Reg8::D,
        3 => Reg8::E,
        4 => Reg8::H,
        5 => Reg8::L,
        _ => Reg8::A,
    }
}

/// Register pair in opcode-field order with SP in slot 3.
fn rp(code: u8) -> Reg16 {
    match code {
        0 => Reg16::Bc,
        1 => Reg16::De,
        2 => Reg16::Hl,
        _ => Reg16::Sp,
    }
}

/// Register pair in opcode-field order with AF in slot 3 (PUSH/POP).
fn rp2(code: u8) -> Reg16 {
    match code {
        0 => Reg16::Bc,
        1 => Reg16::De,
        2 => Reg16::Hl,
        _ => Reg16::Af,
    }
}

fn cond(code: u8) -> Cond {
    match code {
        0 => Cond::Nz,
        1 => Cond::Z,
        2 => Cond::Nc,
        3 => Cond::C,
        4 => Cond::Po,
        5 => Cond::Pe,
        6 => Cond::P,
        _ => Cond::M,
    }
}

fn alu_cmd(code: u8) -> AluCmd {
    match code {
        0 => AluCmd::Add,
        1 => AluCmd::Adc,
        2 => AluCmd::Sub,
        3 => AluCmd::Sbc,
        4 => AluCmd::And,
        5 => AluCmd::Xor,
        6 => AluCmd::Or,
        _ => AluCmd::Cp,
    }
}

fn rot_cmd(code: u8) -> RotCmd {
    match code {
        0 => RotCmd::Rlc,
        1 => RotCmd::Rrc,
        2 => RotCmd::Rl,
        3 => RotCmd::Rr,
        4 => RotCmd::Sla,
        5 => RotCmd::Sra,
        6 => RotCmd::Sll,
        _ => RotCmd::Srl,
    }
}

/// Placeholder for table slots the decoder routes around (the prefix
/// bytes themselves). `lookup` never returns one of these entries from
/// the slots that carry them, but every slot still holds a valid
/// instruction.
fn prefix_slot() -> Instruction {
    Instruction::new(Op::PrefixNop, Operands::None, 1, 1, 4, 0)
}

fn build_base(opcode: u8) -> Instruction {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 7;
    let z = opcode & 7;
    let p = y >> 1;
    let q = y & 1;

    match x {
        0 => match z {
            0 => match y {
                0 => Instruction::new(Op::Nop, Operands::None, 1, 1, 4, 0),
                1 => Instruction::new(Op::ExAfAf, Operands::None, 1, 1, 4, 0),
                2 => Instruction::new(Op::Djnz, Operands::Rel8, 2, 1, 8, 5),
                3 => Instruction::new(Op::JrRel(None), Operands::Rel8, 2, 1, 12, 0),
                _ => Instruction::new(Op::JrRel(Some(cond(y - 4))), Operands::Rel8, 2, 1, 7, 5),
            },
            1 => {
                if q == 0 {
                    Instruction::new(Op::LdRpImm(rp(p)), Operands::Imm16, 3, 1, 10, 0)
                } else {
                    Instruction::new(Op::AddRp(Reg16::Hl, rp(p)), Operands::None, 1, 1, 11, 0)
                }
            }
            2 => match y {
                0 => Instruction::new(Op::LdBcIndA, Operands::None, 1, 1, 7, 0),
                1 => Instruction::new(Op::LdABcInd, Operands::None, 1, 1, 7, 0),
                2 => Instruction::new(Op::LdDeIndA, Operands::None, 1, 1, 7, 0),
                3 => Instruction::new(Op::LdADeInd, Operands::None, 1, 1, 7, 0),
                4 => Instruction::new(Op::LdAbsRp(Reg16::Hl), Operands::Imm16, 3, 1, 16, 0),
                5 => Instruction::new(Op::LdRpAbs(Reg16::Hl), Operands::Imm16, 3, 1, 16, 0),
                6 => Instruction::new(Op::LdAbsA, Operands::Imm16, 3, 1, 13, 0),
                _ => Instruction::new(Op::LdAAbs, Operands::Imm16, 3, 1, 13, 0),
            },
            3 => {
                if q == 0 {
                    Instruction::new(Op::IncRp(rp(p)), Operands::None, 1, 1, 6, 0)
                } else {
                    Instruction::new(Op::DecRp(rp(p)), Operands::None, 1, 1, 6, 0)
                }
            }
            4 => {
                if y == 6 {
                    Instruction::new(Op::IncMem(Ea::Hl), Operands::None, 1, 1, 11, 0)
                } else {
                    Instruction::new(Op::IncR(reg8(y)), Operands::None, 1, 1, 4, 0)
                }
            }
            5 => {
                if y == 6 {
                    Instruction::new(Op::DecMem(Ea::Hl), Operands::None, 1, 1, 11, 0)
                } else {
                    Instruction::new(Op::DecR(reg8(y)), Operands::None, 1, 1, 4, 0)
                }
            }
            6 => {
                if y == 6 {
                    Instruction::new(Op::LdMemImm(Ea::Hl), Operands::Imm8, 2, 1, 10, 0)
                } else {
                    Instruction::new(Op::LdRImm(reg8(y)), Operands::Imm8, 2, 1, 7, 0)
                }
            }
            _ => {
                let op = match y {
                    0 => Op::Rlca,
                    1 => Op::Rrca,
                    2 => Op::Rla,
                    3 => Op::Rra,
                    4 => Op::Daa,
                    5 => Op::Cpl,
                    6 => Op::Scf,
                    _ => Op::Ccf,
                };
                Instruction::new(op, Operands::None, 1, 1, 4, 0)
            }
        },
        1 => {
            if y == 6 && z == 6 {
                Instruction::new(Op::Halt, Operands::None, 1, 1, 4, 0)
            } else if y == 6 {
                Instruction::new(Op::LdMemR(Ea::Hl, reg8(z)), Operands::None, 1, 1, 7, 0)
            } else if z == 6 {
                Instruction::new(Op::LdRMem(reg8(y), Ea::Hl), Operands::None, 1, 1, 7, 0)
            } else {
                Instruction::new(Op::LdRR(reg8(y), reg8(z)), Operands::None, 1, 1, 4, 0)
            }
        }
        2 => {
            if z == 6 {
                Instruction::new(Op::AluMem(alu_cmd(y), Ea::Hl), Operands::None, 1, 1, 7, 0)
            } else {
                Instruction::new(Op::AluR(alu_cmd(y), reg8(z)), Operands::None, 1, 1, 4, 0)
            }
        }
        _ => match z {
            0 => Instruction::new(Op::RetCc(cond(y)), Operands::None, 1, 1, 5, 6),
            1 => {
                if q == 0 {
                    Instruction::new(Op::Pop(rp2(p)), Operands::None, 1, 1, 10, 0)
                } else {
                    match p {
                        0 => Instruction::new(Op::Ret, Operands::None, 1, 1, 10, 0),
                        1 => Instruction::new(Op::Exx, Operands::None, 1, 1, 4, 0),
                        2 => Instruction::new(Op::JpRp(Reg16::Hl), Operands::None, 1, 1, 4, 0),
                        _ => Instruction::new(Op::LdSpRp(Reg16::Hl), Operands::None, 1, 1, 6, 0),
                    }
                }
            }
            2 => Instruction::new(Op::JpAbs(Some(cond(y))), Operands::Imm16, 3, 1, 10, 0),
            3 => match y {
                0 => Instruction::new(Op::JpAbs(None), Operands::Imm16, 3, 1, 10, 0),
                1 => prefix_slot(), // 0xCB
                2 => Instruction::new(Op::OutImmA, Operands::Imm8, 2, 1, 11, 0),
                3 => Instruction::new(Op::InAImm, Operands::Imm8, 2, 1, 11, 0),
                4 => Instruction::new(Op::ExSpRp(Reg16::Hl), Operands::None, 1, 1, 19, 0),
                5 => Instruction::new(Op::ExDeHl, Operands::None, 1, 1, 4, 0),
                6 => Instruction::new(Op::Di, Operands::None, 1, 1, 4, 0),
                _ => Instruction::new(Op::Ei, Operands::None, 1, 1, 4, 0),
            },
            4 => Instruction::new(Op::CallAbs(Some(cond(y))), Operands::Imm16, 3, 1, 10, 7),
            5 => {
                if q == 0 {
                    Instruction::new(Op::Push(rp2(p)), Operands::None, 1, 1, 11, 0)
                } else if p == 0 {
                    Instruction::new(Op::CallAbs(None), Operands::Imm16, 3, 1, 17, 0)
                } else {
                    prefix_slot() // 0xDD, 0xED, 0xFD
                }
            }
            6 => Instruction::new(Op::AluImm(alu_cmd(y)), Operands::Imm8, 2, 1, 7, 0),
            _ => Instruction::new(Op::Rst(y * 8), Operands::None, 1, 1, 11, 0),
        },
    }
}

fn build_cb(opcode: u8) -> Instruction {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 7;
    let z = opcode & 7;

    match (x, z) {
        (0, 6) => Instruction::new(Op::RotMem(rot_cmd(y), Ea::Hl), Operands::None, 2, 2, 15, 0),
        (0, _) => Instruction::new(Op::RotR(rot_cmd(y), reg8(z)), Operands::None, 2, 2, 8, 0),
        (1, 6) => Instruction::new(Op::BitMem(y, Ea::Hl), Operands::None, 2, 2, 12, 0),
        (1, _) => Instruction::new(Op::BitR(y, reg8(z)), Operands::None, 2, 2, 8, 0),
        (2, 6) => Instruction::new(Op::ResMem(y, Ea::Hl), Operands::None, 2, 2, 15, 0),
        (2, _) => Instruction::new(Op::ResR(y, reg8(z)), Operands::None, 2, 2, 8, 0),
        (_, 6) => Instruction::new(Op::SetMem(y, Ea::Hl), Operands::None, 2, 2, 15, 0),
        (_, _) => Instruction::new(Op::SetR(y, reg8(z)), Operands::None, 2, 2, 8, 0),
    }
}

fn ed_nop() -> Instruction {
    Instruction::new(Op::EdNop, Operands::None, 2, 2, 8, 0)
}

fn build_ed(opcode: u8) -> Instruction {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 7;
    let z = opcode & 7;
    let p = y >> 1;
    let q = y & 1;

    match x {
        1 => match z {
            0 => {
                let reg = if y == 6 { None } else { Some(reg8(y)) };
                Instruction::new(Op::InRC(reg), Operands::None, 2, 2, 12, 0)
            }
            1 => {
                let reg = if y == 6 { None } else { Some(reg8(y)) };
                Instruction::new(Op::OutCR(reg), Operands::None, 2, 2, 12, 0)
            }
            2 => {
                if q == 0 {
                    Instruction::new(Op::SbcHl(rp(p)), Operands::None, 2, 2, 15, 0)
                } else {
                    Instruction::new(Op::AdcHl(rp(p)), Operands::None, 2, 2, 15, 0)
                }
            }
            3 => {
                if q == 0 {
                    Instruction::new(Op::LdAbsRp(rp(p)), Operands::Imm16, 4, 2, 20, 0)
                } else {
                    Instruction::new(Op::LdRpAbs(rp(p)), Operands::Imm16, 4, 2, 20, 0)
                }
            }
            // NEG repeats through the whole column.
            4 => Instruction::new(Op::Neg, Operands::None, 2, 2, 8, 0),
            // Only ED 4D is RETI; the other slots are RETN copies.
            5 => {
                if y == 1 {
                    Instruction::new(Op::RetI, Operands::None, 2, 2, 14, 0)
                } else {
                    Instruction::new(Op::RetN, Operands::None, 2, 2, 14, 0)
                }
            }
            6 => {
                let mode = match y & 3 {
                    2 => 1,
                    3 => 2,
                    _ => 0,
                };
                Instruction::new(Op::Im(mode), Operands::None, 2, 2, 8, 0)
            }
            _ => match y {
                0 => Instruction::new(Op::LdIA, Operands::None, 2, 2, 9, 0),
                1 => Instruction::new(Op::LdRA, Operands::None, 2, 2, 9, 0),
                2 => Instruction::new(Op::LdAI, Operands::None, 2, 2, 9, 0),
                3 => Instruction::new(Op::LdAR, Operands::None, 2, 2, 9, 0),
                4 => Instruction::new(Op::Rrd, Operands::None, 2, 2, 18, 0),
                5 => Instruction::new(Op::Rld, Operands::None, 2, 2, 18, 0),
                _ => ed_nop(),
            },
        },
        2 if z <= 3 && y >= 4 => {
            let op = match (y, z) {
                (4, 0) => Op::Ldi,
                (4, 1) => Op::Cpi,
                (4, 2) => Op::Ini,
                (4, _) => Op::Outi,
                (5, 0) => Op::Ldd,
                (5, 1) => Op::Cpd,
                (5, 2) => Op::Ind,
                (5, _) => Op::Outd,
                (6, 0) => Op::Ldir,
                (6, 1) => Op::Cpir,
                (6, 2) => Op::Inir,
                (6, _) => Op::Otir,
                (_, 0) => Op::Lddr,
                (_, 1) => Op::Cpdr,
                (_, 2) => Op::Indr,
                (_, _) => Op::Otdr,
            };
            let extra = if y >= 6 { 5 } else { 0 };
            Instruction::new(op, Operands::None, 2, 2, 16, extra)
        }
        _ => ed_nop(),
    }
}

fn build_bit_indexed(opcode: u8, ea: Ea) -> Instruction {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 7;
    let z = opcode & 7;

    let op = match (x, z) {
        (0, 6) => Op::RotMem(rot_cmd(y), ea),
        (0, _) => Op::RotMemCopy(rot_cmd(y), ea, reg8(z)),
        // Every column of the BIT rows tests the memory byte.
        (1, _) => Op::BitMem(y, ea),
        (2, 6) => Op::ResMem(y, ea),
        (2, _) => Op::ResMemCopy(y, ea, reg8(z)),
        (_, 6) => Op::SetMem(y, ea),
        (_, _) => Op::SetMemCopy(y, ea, reg8(z)),
    };
    let tstates = if x == 1 { 20 } else { 23 };
    Instruction::new(op, Operands::BitDisp, 4, 3, tstates, 0)
}

/// Swaps H or L for the matching index-register half.
fn index_reg8(reg: Reg8, ea: Ea) -> Reg8 {
    match (reg, ea) {
        (Reg8::H, Ea::Ix) => Reg8::IxH,
        (Reg8::L, Ea::Ix) => Reg8::IxL,
        (Reg8::H, Ea::Iy) => Reg8::IyH,
        (Reg8::L, Ea::Iy) => Reg8::IyL,
        _ => reg,
    }
}

fn build_index_page(base: &[Instruction; 256], ea: Ea) -> Page {
    Box::new(std::array::from_fn(|opcode| match opcode as u8 {
        // A prefix byte in front of another prefix: the first byte is
        // spent as a 4-cycle NOP and decoding restarts at the second.
        0xDD | 0xED | 0xFD => prefix_slot(),
        // DD CB sequences are decoded out of the bit-indexed page; this
        // slot is unreachable through lookup.
        0xCB => prefix_slot(),
        byte => index_variant(&base[usize::from(byte)], ea),
    }))
}

/// Derives the `DD`/`FD` page entry for one base-page instruction.
fn index_variant(base: &Instruction, ea: Ea) -> Instruction {
    let index_rp = match ea {
        Ea::Iy => Reg16::Iy,
        _ => Reg16::Ix,
    };
    let sub16 = |reg: Reg16| if reg == Reg16::Hl { index_rp } else { reg };

    match base.op {
        // (HL) operands pick up a displacement byte.
        Op::LdRMem(reg, Ea::Hl) => {
            Instruction::new(Op::LdRMem(reg, ea), Operands::Disp, 3, 2, 19, 0)
        }
        Op::LdMemR(Ea::Hl, reg) => {
            Instruction::new(Op::LdMemR(ea, reg), Operands::Disp, 3, 2, 19, 0)
        }
        Op::LdMemImm(Ea::Hl) => Instruction::new(Op::LdMemImm(ea), Operands::DispImm8, 4, 2, 19, 0),
        Op::IncMem(Ea::Hl) => Instruction::new(Op::IncMem(ea), Operands::Disp, 3, 2, 23, 0),
        Op::DecMem(Ea::Hl) => Instruction::new(Op::DecMem(ea), Operands::Disp, 3, 2, 23, 0),
        Op::AluMem(cmd, Ea::Hl) => Instruction::new(Op::AluMem(cmd, ea), Operands::Disp, 3, 2, 19, 0),
        // H and L become the undocumented index-register halves.
        Op::LdRR(dst, src) => Instruction::new(
            Op::LdRR(index_reg8(dst, ea), index_reg8(src, ea)),
            Operands::None,
            2,
            2,
            8,
            0,
        ),
        Op::LdRImm(reg) => {
            Instruction::new(Op::LdRImm(index_reg8(reg, ea)), Operands::Imm8, 3, 2, 11, 0)
        }
        Op::IncR(reg) => Instruction::new(Op::IncR(index_reg8(reg, ea)), Operands::None, 2, 2, 8, 0),
        Op::DecR(reg) => Instruction::new(Op::DecR(index_reg8(reg, ea)), Operands::None, 2, 2, 8, 0),
        Op::AluR(cmd, reg) => Instruction::new(
            Op::AluR(cmd, index_reg8(reg, ea)),
            Operands::None,
            2,
            2,
            8,
            0,
        ),
        // HL itself becomes IX or IY.
        Op::AddRp(Reg16::Hl, src) => Instruction::new(
            Op::AddRp(index_rp, sub16(src)),
            Operands::None,
            2,
            2,
            15,
            0,
        ),
        Op::LdRpImm(Reg16::Hl) => {
            Instruction::new(Op::LdRpImm(index_rp), Operands::Imm16, 4, 2, 14, 0)
        }
        Op::LdAbsRp(Reg16::Hl) => {
            Instruction::new(Op::LdAbsRp(index_rp), Operands::Imm16, 4, 2, 20, 0)
        }
        Op::LdRpAbs(Reg16::Hl) => {
            Instruction::new(Op::LdRpAbs(index_rp), Operands::Imm16, 4, 2, 20, 0)
        }
        Op::IncRp(Reg16::Hl) => Instruction::new(Op::IncRp(index_rp), Operands::None, 2, 2, 10, 0),
        Op::DecRp(Reg16::Hl) => Instruction::new(Op::DecRp(index_rp), Operands::None, 2, 2, 10, 0),
        Op::Pop(Reg16::Hl) => Instruction::new(Op::Pop(index_rp), Operands::None, 2, 2, 14, 0),
        Op::Push(Reg16::Hl) => Instruction::new(Op::Push(index_rp), Operands::None, 2, 2, 15, 0),
        Op::ExSpRp(Reg16::Hl) => {
            Instruction::new(Op::ExSpRp(index_rp), Operands::None, 2, 2, 23, 0)
        }
        Op::JpRp(Reg16::Hl) => Instruction::new(Op::JpRp(index_rp), Operands::None, 2, 2, 8, 0),
        Op::LdSpRp(Reg16::Hl) => Instruction::new(Op::LdSpRp(index_rp), Operands::None, 2, 2, 10, 0),
        // Anything else ignores the prefix: same operation, one byte
        // longer and four cycles slower. EX DE,HL lands here too; the
        // prefix never redirects it at IX or IY.
        _ => {
            let mut dup = base.clone();
            dup.size += 1;
            dup.opcode_size += 1;
            dup.tstates += 4;
            dup
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> InstructionTable {
        InstructionTable::new()
    }

    #[test]
    fn unprefixed_basics() {
        let t = table();
        let nop = t.lookup(0x00, 0, 0);
        assert_eq!(nop.op, Op::Nop);
        assert_eq!((nop.size, nop.tstates), (1, 4));

        let halt = t.lookup(0x76, 0, 0);
        assert_eq!(halt.op, Op::Halt);

        let ld_bc = t.lookup(0x01, 0, 0);
        assert_eq!(ld_bc.op, Op::LdRpImm(Reg16::Bc));
        assert_eq!((ld_bc.size, ld_bc.opcode_size, ld_bc.tstates), (3, 1, 10));

        let jr_nz = t.lookup(0x20, 0, 0);
        assert_eq!(jr_nz.op, Op::JrRel(Some(Cond::Nz)));
        assert_eq!((jr_nz.tstates, jr_nz.tstates_extra), (7, 5));

        let call = t.lookup(0xCD, 0, 0);
        assert_eq!(call.op, Op::CallAbs(None));
        assert_eq!(call.tstates, 17);
    }

    #[test]
    fn cb_page() {
        let t = table();
        assert_eq!(t.lookup(0xCB, 0x00, 0).op, Op::RotR(RotCmd::Rlc, Reg8::B));
        assert_eq!(t.lookup(0xCB, 0x37, 0).op, Op::RotR(RotCmd::Sll, Reg8::A));
        assert_eq!(t.lookup(0xCB, 0x46, 0).op, Op::BitMem(0, Ea::Hl));
        assert_eq!(t.lookup(0xCB, 0x46, 0).tstates, 12);
        assert_eq!(t.lookup(0xCB, 0xFF, 0).op, Op::SetR(7, Reg8::A));
    }

    #[test]
    fn ed_page_duplicates_and_gaps() {
        let t = table();
        assert_eq!(t.lookup(0xED, 0x44, 0).op, Op::Neg);
        // Undocumented NEG copies through the column.
        assert_eq!(t.lookup(0xED, 0x4C, 0).op, Op::Neg);
        assert_eq!(t.lookup(0xED, 0x7C, 0).op, Op::Neg);
        assert_eq!(t.lookup(0xED, 0x4D, 0).op, Op::RetI);
        assert_eq!(t.lookup(0xED, 0x55, 0).op, Op::RetN);
        assert_eq!(t.lookup(0xED, 0x6E, 0).op, Op::Im(0));
        assert_eq!(t.lookup(0xED, 0x5E, 0).op, Op::Im(2));
        // Unassigned slots decode to two-byte eight-cycle NOPs.
        let gap = t.lookup(0xED, 0x00, 0);
        assert_eq!(gap.op, Op::EdNop);
        assert_eq!((gap.size, gap.tstates), (2, 8));
        assert_eq!(t.lookup(0xED, 0xFF, 0).op, Op::EdNop);
        assert_eq!(t.lookup(0xED, 0xB0, 0).op, Op::Ldir);
        assert_eq!(t.lookup(0xED, 0xB0, 0).tstates_extra, 5);
    }

    #[test]
    fn index_pages_substitute_hl_forms() {
        let t = table();
        let inc_mem = t.lookup(0xDD, 0x34, 0);
        assert_eq!(inc_mem.op, Op::IncMem(Ea::Ix));
        assert_eq!((inc_mem.size, inc_mem.opcode_size, inc_mem.tstates), (3, 2, 23));

        let ld_h_mem = t.lookup(0xDD, 0x66, 0);
        assert_eq!(ld_h_mem.op, Op::LdRMem(Reg8::H, Ea::Ix));
        assert_eq!(ld_h_mem.mnemonic, "LD H,(IX+d)");

        let ld_ixh_ixl = t.lookup(0xDD, 0x65, 0);
        assert_eq!(ld_ixh_ixl.op, Op::LdRR(Reg8::IxH, Reg8::IxL));
        assert_eq!(ld_ixh_ixl.mnemonic, "LD IXH,IXL");
        assert_eq!((ld_ixh_ixl.size, ld_ixh_ixl.tstates), (2, 8));

        let ld_iy = t.lookup(0xFD, 0x21, 0);
        assert_eq!(ld_iy.op, Op::LdRpImm(Reg16::Iy));
        assert_eq!((ld_iy.size, ld_iy.tstates), (4, 14));

        let ex_sp = t.lookup(0xDD, 0xE3, 0);
        assert_eq!(ex_sp.op, Op::ExSpRp(Reg16::Ix));
        assert_eq!(ex_sp.tstates, 23);

        let ld_mem_imm = t.lookup(0xDD, 0x36, 0);
        assert_eq!(ld_mem_imm.op, Op::LdMemImm(Ea::Ix));
        assert_eq!(ld_mem_imm.operands, Operands::DispImm8);
        assert_eq!((ld_mem_imm.size, ld_mem_imm.tstates), (4, 19));
    }

    #[test]
    fn index_pages_duplicate_everything_else() {
        let t = table();
        // DD in front of an instruction with no HL involvement executes
        // it unchanged, one byte longer and four cycles slower.
        let dec_b = t.lookup(0xDD, 0x05, 0);
        assert_eq!(dec_b.op, Op::DecR(Reg8::B));
        assert_eq!((dec_b.size, dec_b.opcode_size, dec_b.tstates), (2, 2, 8));

        let ex_de_hl = t.lookup(0xDD, 0xEB, 0);
        assert_eq!(ex_de_hl.op, Op::ExDeHl);
        assert_eq!((ex_de_hl.size, ex_de_hl.tstates), (2, 8));

        let call_nc = t.lookup(0xFD, 0xD4, 0);
        assert_eq!(call_nc.op, Op::CallAbs(Some(Cond::Nc)));
        assert_eq!((call_nc.size, call_nc.tstates, call_nc.tstates_extra), (4, 14, 7));

        // A prefix byte before another prefix costs four cycles and one
        // byte, leaving the second prefix to decode fresh.
        let chained = t.lookup(0xDD, 0xFD, 0);
        assert_eq!(chained.op, Op::PrefixNop);
        assert_eq!((chained.size, chained.tstates), (1, 4));
    }

    #[test]
    fn bit_indexed_pages() {
        let t = table();
        let bit = t.lookup(0xDD, 0xCB, 0x46);
        assert_eq!(bit.op, Op::BitMem(0, Ea::Ix));
        assert_eq!((bit.size, bit.opcode_size, bit.tstates), (4, 3, 20));

        // Non-BIT columns copy the memory result into a register.
        let rlc_copy = t.lookup(0xDD, 0xCB, 0x00);
        assert_eq!(rlc_copy.op, Op::RotMemCopy(RotCmd::Rlc, Ea::Ix, Reg8::B));
        assert_eq!(rlc_copy.tstates, 23);

        let set_copy = t.lookup(0xFD, 0xCB, 0xC7);
        assert_eq!(set_copy.op, Op::SetMemCopy(0, Ea::Iy, Reg8::A));

        let res_mem = t.lookup(0xFD, 0xCB, 0x86);
        assert_eq!(res_mem.op, Op::ResMem(0, Ea::Iy));
    }

    #[test]
    fn every_sequence_decodes_within_bounds() {
        let t = table();
        for b0 in 0..=255u8 {
            for b1 in 0..=255u8 {
                // b2 only matters for DD CB / FD CB; sample it coarsely
                // elsewhere to keep the sweep fast.
                let b2_values: &[u8] = if (b0 == 0xDD || b0 == 0xFD) && b1 == 0xCB {
                    &[
                        0x00, 0x06, 0x3F, 0x40, 0x46, 0x7F, 0x80, 0x86, 0xC0, 0xC6, 0xFF,
                    ]
                } else {
                    &[0x00, 0xFF]
                };
                for &b2 in b2_values {
                    let instr = t.lookup(b0, b1, b2);
                    assert!(
                        (1..=4).contains(&instr.size),
                        "size out of range for {b0:02X} {b1:02X} {b2:02X}"
                    );
                    assert!(instr.opcode_size >= 1 && instr.opcode_size <= instr.size);
                    assert!(
                        (4..=23).contains(&instr.tstates),
                        "tstates out of range for {b0:02X} {b1:02X} {b2:02X}: {}",
                        instr.tstates
                    );
                    assert!(instr.tstates_extra <= 7);
                    assert!(!instr.mnemonic.is_empty());
                }
            }
        }
        // The bit-indexed pages get a dedicated full sweep.
        for b2 in 0..=255u8 {
            for prefix in [0xDD, 0xFD] {
                let instr = t.lookup(prefix, 0xCB, b2);
                assert_eq!(instr.size, 4);
                assert_eq!(instr.opcode_size, 3);
                assert!(instr.tstates == 20 || instr.tstates == 23);
            }
        }
    }

    #[test]
    fn cycle_costs_convert_to_master_clock_ticks() {
        let t = table();
        let nop = t.lookup(0x00, 0, 0);
        assert_eq!(nop.ticks().get(), 4000);
        let jr_nz = t.lookup(0x20, 0, 0);
        assert_eq!(jr_nz.ticks().get(), 7000);
        assert_eq!(jr_nz.max_ticks().get(), 12_000);
    }
}
