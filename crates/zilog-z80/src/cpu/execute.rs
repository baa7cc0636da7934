//! Instruction effects.
//!
//! [`Z80::execute`] is called with PC already advanced past the whole
//! instruction and the operand bytes captured; it applies the state
//! change and returns the conditional extra cycles actually paid.

use emu_core::{Bus, IoBus};

use super::{Z80, read16, write16};
use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, parity_even, sz53, sz53p};
use crate::ops::{AluCmd, Op, RotCmd};

impl Z80 {
    pub(super) fn execute<B: IoBus>(&mut self, op: Op, extra: u32, bus: &mut B) -> u32 {
        match op {
            Op::Nop | Op::PrefixNop | Op::EdNop => {}
            Op::Halt => {
                // Park on the HALT opcode; an accepted interrupt steps
                // past it again.
                self.regs.halted = true;
                self.regs.pc = self.regs.pc.wrapping_sub(1);
            }

            Op::LdRR(dst, src) => {
                let value = self.get8(src);
                self.set8(dst, value);
            }
            Op::LdRImm(reg) => {
                let value = self.imm8();
                self.set8(reg, value);
            }
            Op::LdRMem(reg, ea) => {
                let value = bus.read(self.ea_addr(ea));
                self.set8(reg, value);
            }
            Op::LdMemR(ea, reg) => {
                bus.write(self.ea_addr(ea), self.get8(reg));
            }
            Op::LdMemImm(ea) => {
                bus.write(self.ea_addr(ea), self.imm8());
            }
            Op::LdABcInd => {
                let value = bus.read(self.regs.bc());
                self.regs.set_a(value);
            }
            Op::LdADeInd => {
                let value = bus.read(self.regs.de());
                self.regs.set_a(value);
            }
            Op::LdAAbs => {
                let value = bus.read(self.imm16());
                self.regs.set_a(value);
            }
            Op::LdBcIndA => bus.write(self.regs.bc(), self.regs.a()),
            Op::LdDeIndA => bus.write(self.regs.de(), self.regs.a()),
            Op::LdAbsA => bus.write(self.imm16(), self.regs.a()),
            Op::LdAI => {
                let value = self.regs.i;
                self.regs.set_a(value);
                self.ir_load_flags(value);
            }
            Op::LdAR => {
                let value = self.regs.r;
                self.regs.set_a(value);
                self.ir_load_flags(value);
            }
            Op::LdIA => self.regs.i = self.regs.a(),
            Op::LdRA => self.regs.r = self.regs.a(),

            Op::LdRpImm(reg) => {
                let value = self.imm16();
                self.set_rp(reg, value);
            }
            Op::LdRpAbs(reg) => {
                let value = read16(bus, self.imm16());
                self.set_rp(reg, value);
            }
            Op::LdAbsRp(reg) => {
                write16(bus, self.imm16(), self.get_rp(reg));
            }
            Op::LdSpRp(reg) => self.regs.sp = self.get_rp(reg),
            Op::Push(reg) => {
                let value = self.get_rp(reg);
                self.push(bus, value);
            }
            Op::Pop(reg) => {
                let value = self.pop(bus);
                self.set_rp(reg, value);
            }

            Op::ExDeHl => {
                let de = self.regs.de();
                let hl = self.regs.hl();
                self.regs.set_de(hl);
                self.regs.set_hl(de);
            }
            Op::ExAfAf => self.regs.exchange_af(),
            Op::Exx => self.regs.exchange_gp(),
            Op::ExSpRp(reg) => {
                let sp = self.regs.sp;
                let from_stack = read16(bus, sp);
                write16(bus, sp, self.get_rp(reg));
                self.set_rp(reg, from_stack);
            }

            Op::AluR(cmd, reg) => {
                let value = self.get8(reg);
                self.alu_apply(cmd, value);
            }
            Op::AluMem(cmd, ea) => {
                let value = bus.read(self.ea_addr(ea));
                self.alu_apply(cmd, value);
            }
            Op::AluImm(cmd) => {
                let value = self.imm8();
                self.alu_apply(cmd, value);
            }
            Op::IncR(reg) => {
                let (value, flags) = alu::inc8(self.get8(reg), self.regs.f());
                self.set8(reg, value);
                self.regs.set_f(flags);
            }
            Op::DecR(reg) => {
                let (value, flags) = alu::dec8(self.get8(reg), self.regs.f());
                self.set8(reg, value);
                self.regs.set_f(flags);
            }
            Op::IncMem(ea) => {
                let address = self.ea_addr(ea);
                let (value, flags) = alu::inc8(bus.read(address), self.regs.f());
                bus.write(address, value);
                self.regs.set_f(flags);
            }
            Op::DecMem(ea) => {
                let address = self.ea_addr(ea);
                let (value, flags) = alu::dec8(bus.read(address), self.regs.f());
                bus.write(address, value);
                self.regs.set_f(flags);
            }

            Op::Daa => {
                let (value, flags) = alu::daa(self.regs.a(), self.regs.f());
                self.regs.set_a(value);
                self.regs.set_f(flags);
            }
            Op::Cpl => {
                let (value, flags) = alu::cpl(self.regs.a(), self.regs.f());
                self.regs.set_a(value);
                self.regs.set_f(flags);
            }
            Op::Neg => {
                let (value, flags) = alu::sub8(0, self.regs.a(), false);
                self.regs.set_a(value);
                self.regs.set_f(flags);
            }
            Op::Ccf => {
                let flags = alu::ccf(self.regs.a(), self.regs.f());
                self.regs.set_f(flags);
            }
            Op::Scf => {
                let flags = alu::scf(self.regs.a(), self.regs.f());
                self.regs.set_f(flags);
            }

            Op::AddRp(dst, src) => {
                let (value, flags) = alu::add16(self.get_rp(dst), self.get_rp(src), self.regs.f());
                self.set_rp(dst, value);
                self.regs.set_f(flags);
            }
            Op::AdcHl(reg) => {
                let (value, flags) = alu::adc16(self.regs.hl(), self.get_rp(reg), self.regs.f());
                self.regs.set_hl(value);
                self.regs.set_f(flags);
            }
            Op::SbcHl(reg) => {
                let (value, flags) = alu::sbc16(self.regs.hl(), self.get_rp(reg), self.regs.f());
                self.regs.set_hl(value);
                self.regs.set_f(flags);
            }
            Op::IncRp(reg) => {
                let value = self.get_rp(reg).wrapping_add(1);
                self.set_rp(reg, value);
            }
            Op::DecRp(reg) => {
                let value = self.get_rp(reg).wrapping_sub(1);
                self.set_rp(reg, value);
            }

            Op::Rlca => {
                let (value, flags) = alu::rlca(self.regs.a(), self.regs.f());
                self.regs.set_a(value);
                self.regs.set_f(flags);
            }
            Op::Rrca => {
                let (value, flags) = alu::rrca(self.regs.a(), self.regs.f());
                self.regs.set_a(value);
                self.regs.set_f(flags);
            }
            Op::Rla => {
                let (value, flags) = alu::rla(self.regs.a(), self.regs.f());
                self.regs.set_a(value);
                self.regs.set_f(flags);
            }
            Op::Rra => {
                let (value, flags) = alu::rra(self.regs.a(), self.regs.f());
                self.regs.set_a(value);
                self.regs.set_f(flags);
            }
            Op::Rld => {
                let hl = self.regs.hl();
                let value = bus.read(hl);
                let a = self.regs.a();
                bus.write(hl, (value << 4) | (a & 0x0F));
                let result = (a & 0xF0) | (value >> 4);
                self.regs.set_a(result);
                let flags = (self.regs.f() & CF) | sz53p(result);
                self.regs.set_f(flags);
            }
            Op::Rrd => {
                let hl = self.regs.hl();
                let value = bus.read(hl);
                let a = self.regs.a();
                bus.write(hl, (value >> 4) | (a << 4));
                let result = (a & 0xF0) | (value & 0x0F);
                self.regs.set_a(result);
                let flags = (self.regs.f() & CF) | sz53p(result);
                self.regs.set_f(flags);
            }
            Op::RotR(cmd, reg) => {
                let value = self.rot_apply(cmd, self.get8(reg));
                self.set8(reg, value);
            }
            Op::RotMem(cmd, ea) => {
                let address = self.ea_addr(ea);
                let value = self.rot_apply(cmd, bus.read(address));
                bus.write(address, value);
            }
            Op::RotMemCopy(cmd, ea, reg) => {
                let address = self.ea_addr(ea);
                let value = self.rot_apply(cmd, bus.read(address));
                bus.write(address, value);
                self.set8(reg, value);
            }

            Op::BitR(bit, reg) => {
                let value = self.get8(reg);
                let flags = alu::bit_flags(bit, value, self.regs.f(), value);
                self.regs.set_f(flags);
            }
            Op::BitMem(bit, ea) => {
                let value = bus.read(self.ea_addr(ea));
                let flags = alu::bit_flags(bit, value, self.regs.f(), value);
                self.regs.set_f(flags);
            }
            Op::ResR(bit, reg) => {
                let value = self.get8(reg) & !(1 << bit);
                self.set8(reg, value);
            }
            Op::ResMem(bit, ea) => {
                let address = self.ea_addr(ea);
                let value = bus.read(address) & !(1 << bit);
                bus.write(address, value);
            }
            Op::ResMemCopy(bit, ea, reg) => {
                let address = self.ea_addr(ea);
                let value = bus.read(address) & !(1 << bit);
                bus.write(address, value);
                self.set8(reg, value);
            }
            Op::SetR(bit, reg) => {
                let value = self.get8(reg) | (1 << bit);
                self.set8(reg, value);
            }
            Op::SetMem(bit, ea) => {
                let address = self.ea_addr(ea);
                let value = bus.read(address) | (1 << bit);
                bus.write(address, value);
            }
            Op::SetMemCopy(bit, ea, reg) => {
                let address = self.ea_addr(ea);
                let value = bus.read(address) | (1 << bit);
                bus.write(address, value);
                self.set8(reg, value);
            }

            Op::JpAbs(cond) => {
                if cond.is_none_or(|c| self.condition(c)) {
                    self.regs.pc = self.imm16();
                }
            }
            Op::JpRp(reg) => self.regs.pc = self.get_rp(reg),
            Op::JrRel(cond) => {
                if cond.is_none_or(|c| self.condition(c)) {
                    self.regs.pc = self.rel_target();
                    return extra;
                }
            }
            Op::Djnz => {
                let b = self.regs.b().wrapping_sub(1);
                self.regs.set_b(b);
                if b != 0 {
                    self.regs.pc = self.rel_target();
                    return extra;
                }
            }
            Op::CallAbs(cond) => {
                if cond.is_none_or(|c| self.condition(c)) {
                    let pc = self.regs.pc;
                    self.push(bus, pc);
                    self.regs.pc = self.imm16();
                    return extra;
                }
            }
            Op::Ret => self.regs.pc = self.pop(bus),
            Op::RetCc(cond) => {
                if self.condition(cond) {
                    self.regs.pc = self.pop(bus);
                    return extra;
                }
            }
            Op::RetI | Op::RetN => {
                self.regs.pc = self.pop(bus);
                self.regs.iff1 = self.regs.iff2;
            }
            Op::Rst(target) => {
                let pc = self.regs.pc;
                self.push(bus, pc);
                self.regs.pc = u16::from(target);
            }

            Op::Di => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
            }
            Op::Ei => {
                self.regs.iff1 = true;
                self.regs.iff2 = true;
                // Interrupts stay held off until after the next
                // instruction, so an ISR can end with EI / RET safely.
                self.set_ei_pending(true);
            }
            Op::Im(mode) => self.regs.im = mode,

            Op::InAImm => {
                // IN A,(n) updates no flags.
                let value = bus.read_io(self.imm8());
                self.regs.set_a(value);
            }
            Op::OutImmA => bus.write_io(self.imm8(), self.regs.a()),
            Op::InRC(reg) => {
                let value = bus.read_io(self.regs.c());
                if let Some(reg) = reg {
                    self.set8(reg, value);
                }
                let flags = alu::in_flags(value, self.regs.f());
                self.regs.set_f(flags);
            }
            Op::OutCR(reg) => {
                let value = reg.map_or(0, |reg| self.get8(reg));
                bus.write_io(self.regs.c(), value);
            }

            Op::Ldi => {
                self.block_transfer(bus, 1);
            }
            Op::Ldd => {
                self.block_transfer(bus, -1);
            }
            Op::Ldir => {
                if self.block_transfer(bus, 1) {
                    self.repeat_block();
                    return extra;
                }
            }
            Op::Lddr => {
                if self.block_transfer(bus, -1) {
                    self.repeat_block();
                    return extra;
                }
            }
            Op::Cpi => {
                self.block_compare(bus, 1);
            }
            Op::Cpd => {
                self.block_compare(bus, -1);
            }
            Op::Cpir => {
                if self.block_compare(bus, 1) {
                    self.repeat_block();
                    return extra;
                }
            }
            Op::Cpdr => {
                if self.block_compare(bus, -1) {
                    self.repeat_block();
                    return extra;
                }
            }
            Op::Ini => {
                self.block_in(bus, 1);
            }
            Op::Ind => {
                self.block_in(bus, -1);
            }
            Op::Inir => {
                if self.block_in(bus, 1) {
                    self.repeat_block();
                    return extra;
                }
            }
            Op::Indr => {
                if self.block_in(bus, -1) {
                    self.repeat_block();
                    return extra;
                }
            }
            Op::Outi => {
                self.block_out(bus, 1);
            }
            Op::Outd => {
                self.block_out(bus, -1);
            }
            Op::Otir => {
                if self.block_out(bus, 1) {
                    self.repeat_block();
                    return extra;
                }
            }
            Op::Otdr => {
                if self.block_out(bus, -1) {
                    self.repeat_block();
                    return extra;
                }
            }
        }
        0
    }

    fn alu_apply(&mut self, cmd: AluCmd, value: u8) {
        let a = self.regs.a();
        let f = self.regs.f();
        let carry = f & CF != 0;
        let (result, flags) = match cmd {
            AluCmd::Add => alu::add8(a, value, false),
            AluCmd::Adc => alu::add8(a, value, carry),
            AluCmd::Sub => alu::sub8(a, value, false),
            AluCmd::Sbc => alu::sub8(a, value, carry),
            AluCmd::And => alu::and8(a, value),
            AluCmd::Xor => alu::xor8(a, value),
            AluCmd::Or => alu::or8(a, value),
            AluCmd::Cp => (a, alu::cp8(a, value)),
        };
        self.regs.set_a(result);
        self.regs.set_f(flags);
    }

    fn rot_apply(&mut self, cmd: RotCmd, value: u8) -> u8 {
        let f = self.regs.f();
        let (result, flags) = match cmd {
            RotCmd::Rlc => alu::rlc8(value),
            RotCmd::Rrc => alu::rrc8(value),
            RotCmd::Rl => alu::rl8(value, f),
            RotCmd::Rr => alu::rr8(value, f),
            RotCmd::Sla => alu::sla8(value),
            RotCmd::Sra => alu::sra8(value),
            RotCmd::Sll => alu::sll8(value),
            RotCmd::Srl => alu::srl8(value),
        };
        self.regs.set_f(flags);
        result
    }

    /// `LD A,I` / `LD A,R` flag composition; PV reports IFF2.
    fn ir_load_flags(&mut self, value: u8) {
        let mut flags = (self.regs.f() & CF) | sz53(value);
        if self.regs.iff2 {
            flags |= PF;
        }
        self.regs.set_f(flags);
    }

    /// One step of `LDI`/`LDD`; true while BC has not reached zero.
    fn block_transfer<B: Bus>(&mut self, bus: &mut B, direction: i16) -> bool {
        let hl = self.regs.hl();
        let de = self.regs.de();
        let value = bus.read(hl);
        bus.write(de, value);
        self.regs.set_hl(hl.wrapping_add_signed(direction));
        self.regs.set_de(de.wrapping_add_signed(direction));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        // Bits 3 and 5 come from value + A, of all things.
        let n = value.wrapping_add(self.regs.a());
        let mut flags = (self.regs.f() & (SF | ZF | CF)) | (n & XF);
        if n & 0x02 != 0 {
            flags |= YF;
        }
        if bc != 0 {
            flags |= PF;
        }
        self.regs.set_f(flags);
        bc != 0
    }

    /// One step of `CPI`/`CPD`; true while BC is nonzero and no match.
    fn block_compare<B: Bus>(&mut self, bus: &mut B, direction: i16) -> bool {
        let hl = self.regs.hl();
        let value = bus.read(hl);
        let a = self.regs.a();
        let result = a.wrapping_sub(value);
        let half = (a & 0x0F) < (value & 0x0F);
        self.regs.set_hl(hl.wrapping_add_signed(direction));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        let n = result.wrapping_sub(u8::from(half));
        let mut flags = (self.regs.f() & CF) | NF | (result & SF) | (n & XF);
        if result == 0 {
            flags |= ZF;
        }
        if half {
            flags |= HF;
        }
        if n & 0x02 != 0 {
            flags |= YF;
        }
        if bc != 0 {
            flags |= PF;
        }
        self.regs.set_f(flags);
        bc != 0 && result != 0
    }

    /// One step of `INI`/`IND`; true while B is nonzero.
    fn block_in<B: IoBus>(&mut self, bus: &mut B, direction: i16) -> bool {
        let port = self.regs.c();
        let value = bus.read_io(port);
        let hl = self.regs.hl();
        bus.write(hl, value);
        self.regs.set_hl(hl.wrapping_add_signed(direction));
        let b = self.regs.b().wrapping_sub(1);
        self.regs.set_b(b);

        let adjusted_port = port.wrapping_add_signed(direction as i8);
        let k = u16::from(value) + u16::from(adjusted_port);
        self.regs.set_f(block_io_flags(b, value, k));
        b != 0
    }

    /// One step of `OUTI`/`OUTD`; true while B is nonzero.
    fn block_out<B: IoBus>(&mut self, bus: &mut B, direction: i16) -> bool {
        let hl = self.regs.hl();
        let value = bus.read(hl);
        let b = self.regs.b().wrapping_sub(1);
        self.regs.set_b(b);
        bus.write_io(self.regs.c(), value);
        self.regs.set_hl(hl.wrapping_add_signed(direction));

        let k = u16::from(value) + u16::from(self.regs.l());
        self.regs.set_f(block_io_flags(b, value, k));
        b != 0
    }

    /// Rewinds PC onto the block instruction and patches the
    /// undocumented flag bits from the high byte of the rewound PC.
    fn repeat_block(&mut self) {
        self.regs.pc = self.regs.pc.wrapping_sub(2);
        let pch = (self.regs.pc >> 8) as u8;
        let flags = (self.regs.f() & !(XF | YF)) | (pch & (XF | YF));
        self.regs.set_f(flags);
    }
}

/// Shared flag composition for the block I/O instructions.
fn block_io_flags(b: u8, value: u8, k: u16) -> u8 {
    let mut flags = sz53(b);
    if value & 0x80 != 0 {
        flags |= NF;
    }
    if k > 0xFF {
        flags |= HF | CF;
    }
    if parity_even(((k as u8) & 0x07) ^ b) {
        flags |= PF;
    }
    flags
}
