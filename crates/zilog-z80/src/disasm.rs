//! Mnemonic rendering.
//!
//! Decode-table entries carry a template mnemonic where operand bytes
//! appear as lowercase tokens (`n`, `nn`, `d`, `e`); everything else is
//! uppercase, so token substitution never collides with instruction
//! names. [`mnemonic`] builds the template from an [`Op`] and
//! [`disassemble`] fills the tokens in from raw instruction bytes.

use crate::ops::{AluCmd, Cond, Ea, Op, Operands, Reg8, Reg16, RotCmd};
use crate::table::Instruction;

fn reg8_name(reg: Reg8) -> &'static str {
    match reg {
        Reg8::B => "B",
        Reg8::C => "C",
        Reg8::D => "D",
        Reg8::E => "E",
        Reg8::H => "H",
        Reg8::L => "L",
        Reg8::A => "A",
        Reg8::IxH => "IXH",
        Reg8::IxL => "IXL",
        Reg8::IyH => "IYH",
        Reg8::IyL => "IYL",
    }
}

fn reg16_name(reg: Reg16) -> &'static str {
    match reg {
        Reg16::Bc => "BC",
        Reg16::De => "DE",
        Reg16::Hl => "HL",
        Reg16::Sp => "SP",
        Reg16::Af => "AF",
        Reg16::Ix => "IX",
        Reg16::Iy => "IY",
    }
}

fn ea_name(ea: Ea) -> &'static str {
    match ea {
        Ea::Hl => "(HL)",
        Ea::Ix => "(IX+d)",
        Ea::Iy => "(IY+d)",
    }
}

fn cond_name(cond: Cond) -> &'static str {
    match cond {
        Cond::Nz => "NZ",
        Cond::Z => "Z",
        Cond::Nc => "NC",
        Cond::C => "C",
        Cond::Po => "PO",
        Cond::Pe => "PE",
        Cond::P => "P",
        Cond::M => "M",
    }
}

fn alu_name(cmd: AluCmd, operand: &str) -> String {
    match cmd {
        AluCmd::Add => format!("ADD A,{operand}"),
        AluCmd::Adc => format!("ADC A,{operand}"),
        AluCmd::Sub => format!("SUB {operand}"),
        AluCmd::Sbc => format!("SBC A,{operand}"),
        AluCmd::And => format!("AND {operand}"),
        AluCmd::Xor => format!("XOR {operand}"),
        AluCmd::Or => format!("OR {operand}"),
        AluCmd::Cp => format!("CP {operand}"),
    }
}

fn rot_name(cmd: RotCmd) -> &'static str {
    match cmd {
        RotCmd::Rlc => "RLC",
        RotCmd::Rrc => "RRC",
        RotCmd::Rl => "RL",
        RotCmd::Rr => "RR",
        RotCmd::Sla => "SLA",
        RotCmd::Sra => "SRA",
        RotCmd::Sll => "SLL",
        RotCmd::Srl => "SRL",
    }
}

/// Builds the template mnemonic for a decoded operation.
#[must_use]
pub fn mnemonic(op: &Op) -> String {
    match *op {
        Op::Nop => "NOP".into(),
        Op::PrefixNop | Op::EdNop => "NOP*".into(),
        Op::Halt => "HALT".into(),
        Op::LdRR(dst, src) => format!("LD {},{}", reg8_name(dst), reg8_name(src)),
        Op::LdRImm(reg) => format!("LD {},n", reg8_name(reg)),
        Op::LdRMem(reg, ea) => format!("LD {},{}", reg8_name(reg), ea_name(ea)),
        Op::LdMemR(ea, reg) => format!("LD {},{}", ea_name(ea), reg8_name(reg)),
        Op::LdMemImm(ea) => format!("LD {},n", ea_name(ea)),
        Op::LdABcInd => "LD A,(BC)".into(),
        Op::LdADeInd => "LD A,(DE)".into(),
        Op::LdAAbs => "LD A,(nn)".into(),
        Op::LdBcIndA => "LD (BC),A".into(),
        Op::LdDeIndA => "LD (DE),A".into(),
        Op::LdAbsA => "LD (nn),A".into(),
        Op::LdAI => "LD A,I".into(),
        Op::LdAR => "LD A,R".into(),
        Op::LdIA => "LD I,A".into(),
        Op::LdRA => "LD R,A".into(),
        Op::LdRpImm(reg) => format!("LD {},nn", reg16_name(reg)),
        Op::LdRpAbs(reg) => format!("LD {},(nn)", reg16_name(reg)),
        Op::LdAbsRp(reg) => format!("LD (nn),{}", reg16_name(reg)),
        Op::LdSpRp(reg) => format!("LD SP,{}", reg16_name(reg)),
        Op::Push(reg) => format!("PUSH {}", reg16_name(reg)),
        Op::Pop(reg) => format!("POP {}", reg16_name(reg)),
        Op::ExDeHl => "EX DE,HL".into(),
        Op::ExAfAf => "EX AF,AF'".into(),
        Op::Exx => "EXX".into(),
        Op::ExSpRp(reg) => format!("EX (SP),{}", reg16_name(reg)),
        Op::AluR(cmd, reg) => alu_name(cmd, reg8_name(reg)),
        Op::AluMem(cmd, ea) => alu_name(cmd, ea_name(ea)),
        Op::AluImm(cmd) => alu_name(cmd, "n"),
        Op::IncR(reg) => format!("INC {}", reg8_name(reg)),
        Op::DecR(reg) => format!("DEC {}", reg8_name(reg)),
        Op::IncMem(ea) => format!("INC {}", ea_name(ea)),
        Op::DecMem(ea) => format!("DEC {}", ea_name(ea)),
        Op::Daa => "DAA".into(),
        Op::Cpl => "CPL".into(),
        Op::Neg => "NEG".into(),
        Op::Ccf => "CCF".into(),
        Op::Scf => "SCF".into(),
        Op::AddRp(dst, src) => format!("ADD {},{}", reg16_name(dst), reg16_name(src)),
        Op::AdcHl(reg) => format!("ADC HL,{}", reg16_name(reg)),
        Op::SbcHl(reg) => format!("SBC HL,{}", reg16_name(reg)),
        Op::IncRp(reg) => format!("INC {}", reg16_name(reg)),
        Op::DecRp(reg) => format!("DEC {}", reg16_name(reg)),
        Op::Rlca => "RLCA".into(),
        Op::Rrca => "RRCA".into(),
        Op::Rla => "RLA".into(),
        Op::Rra => "RRA".into(),
        Op::Rld => "RLD".into(),
        Op::Rrd => "RRD".into(),
        Op::RotR(cmd, reg) => format!("{} {}", rot_name(cmd), reg8_name(reg)),
        Op::RotMem(cmd, ea) => format!("{} {}", rot_name(cmd), ea_name(ea)),
        Op::RotMemCopy(cmd, ea, reg) => {
            format!("{} {},{}", rot_name(cmd), ea_name(ea), reg8_name(reg))
        }
        Op::BitR(bit, reg) => format!("BIT {},{}", bit, reg8_name(reg)),
        Op::BitMem(bit, ea) => format!("BIT {},{}", bit, ea_name(ea)),
        Op::ResR(bit, reg) => format!("RES {},{}", bit, reg8_name(reg)),
        Op::ResMem(bit, ea) => format!("RES {},{}", bit, ea_name(ea)),
        Op::ResMemCopy(bit, ea, reg) => {
            format!("RES {},{},{}", bit, ea_name(ea), reg8_name(reg))
        }
        Op::SetR(bit, reg) => format!("SET {},{}", bit, reg8_name(reg)),
        Op::SetMem(bit, ea) => format!("SET {},{}", bit, ea_name(ea)),
        Op::SetMemCopy(bit, ea, reg) => {
            format!("SET {},{},{}", bit, ea_name(ea), reg8_name(reg))
        }
        Op::JpAbs(None) => "JP nn".into(),
        Op::JpAbs(Some(cond)) => format!("JP {},nn", cond_name(cond)),
        Op::JpRp(reg) => format!("JP ({})", reg16_name(reg)),
        Op::JrRel(None) => "JR e".into(),
        Op::JrRel(Some(cond)) => format!("JR {},e", cond_name(cond)),
        Op::Djnz => "DJNZ e".into(),
        Op::CallAbs(None) => "CALL nn".into(),
        Op::CallAbs(Some(cond)) => format!("CALL {},nn", cond_name(cond)),
        Op::Ret => "RET".into(),
        Op::RetCc(cond) => format!("RET {}", cond_name(cond)),
        Op::RetI => "RETI".into(),
        Op::RetN => "RETN".into(),
        Op::Rst(target) => format!("RST {target:02X}H"),
        Op::Di => "DI".into(),
        Op::Ei => "EI".into(),
        Op::Im(mode) => format!("IM {mode}"),
        Op::InAImm => "IN A,(n)".into(),
        Op::OutImmA => "OUT (n),A".into(),
        Op::InRC(Some(reg)) => format!("IN {},(C)", reg8_name(reg)),
        Op::InRC(None) => "IN (C)".into(),
        Op::OutCR(Some(reg)) => format!("OUT (C),{}", reg8_name(reg)),
        Op::OutCR(None) => "OUT (C),0".into(),
        Op::Ldi => "LDI".into(),
        Op::Ldd => "LDD".into(),
        Op::Ldir => "LDIR".into(),
        Op::Lddr => "LDDR".into(),
        Op::Cpi => "CPI".into(),
        Op::Cpd => "CPD".into(),
        Op::Cpir => "CPIR".into(),
        Op::Cpdr => "CPDR".into(),
        Op::Ini => "INI".into(),
        Op::Ind => "IND".into(),
        Op::Inir => "INIR".into(),
        Op::Indr => "INDR".into(),
        Op::Outi => "OUTI".into(),
        Op::Outd => "OUTD".into(),
        Op::Otir => "OTIR".into(),
        Op::Otdr => "OTDR".into(),
    }
}

fn displacement_text(byte: u8) -> String {
    let disp = byte as i8;
    if disp < 0 {
        format!("-{}", -i16::from(disp))
    } else {
        format!("+{disp}")
    }
}

/// Renders one instruction with live operand values substituted into the
/// template tokens. `raw` holds the bytes at `pc`; only the first
/// `instr.size` of them are meaningful.
#[must_use]
pub fn disassemble(instr: &Instruction, pc: u16, raw: &[u8; 4]) -> String {
    let opcode = usize::from(instr.opcode_size);
    let mut text = instr.mnemonic.clone();
    match instr.operands {
        Operands::None => {}
        Operands::Imm8 => {
            text = text.replace('n', &format!("{:02X}H", raw[opcode]));
        }
        Operands::Imm16 => {
            let value = u16::from_le_bytes([raw[opcode], raw[opcode + 1]]);
            text = text.replace("nn", &format!("{value:04X}H"));
        }
        Operands::Rel8 => {
            let target = pc
                .wrapping_add(u16::from(instr.size))
                .wrapping_add(raw[opcode] as i8 as u16);
            text = text.replace('e', &format!("{target:04X}H"));
        }
        Operands::Disp => {
            text = text.replace("+d", &displacement_text(raw[opcode]));
        }
        Operands::DispImm8 => {
            text = text.replace("+d", &displacement_text(raw[opcode]));
            text = text.replace('n', &format!("{:02X}H", raw[opcode + 1]));
        }
        Operands::BitDisp => {
            text = text.replace("+d", &displacement_text(raw[2]));
        }
    }
    text
}
