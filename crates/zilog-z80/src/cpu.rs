//! The Z80 execution core.
//!
//! [`Z80::step`] runs exactly one instruction: fetch enough bytes to
//! decode, capture the operand bytes, advance PC past the whole
//! instruction, then apply the effect. Control flow therefore works in
//! terms of the already-advanced PC, which is what relative jumps and
//! `CALL`/`RST` push/return semantics expect. The return value is the
//! instruction's cycle cost, including any conditional extra.
//!
//! While halted the core stays parked on the `HALT` opcode and each step
//! burns one NOP's worth of cycles; an accepted interrupt moves PC past
//! the `HALT` before stacking it.

mod execute;

use emu_core::{Bus, Cpu, IoBus};

use crate::flags::{CF, PF, SF, ZF};
use crate::ops::{Cond, Ea, Operands, Reg8, Reg16};
use crate::registers::Registers;
use crate::table::InstructionTable;

/// Cycle cost of one idle step while halted.
pub const HALT_IDLE_CYCLES: u32 = 4;

/// Maskable-interrupt acceptance cost in modes 0 and 1.
pub const INT_ACCEPT_CYCLES: u32 = 13;
/// Maskable-interrupt acceptance cost in mode 2.
pub const INT_ACCEPT_IM2_CYCLES: u32 = 19;
/// Non-maskable-interrupt acceptance cost.
pub const NMI_ACCEPT_CYCLES: u32 = 11;

/// The CPU: register file, decode tables and instruction-fetch scratch.
pub struct Z80 {
    pub regs: Registers,
    table: InstructionTable,
    /// Set by `EI`; holds off maskable interrupts until one more
    /// instruction has run.
    ei_pending: bool,
    operand_lo: u8,
    operand_hi: u8,
    displacement: i8,
}

impl Z80 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            table: InstructionTable::new(),
            ei_pending: false,
            operand_lo: 0,
            operand_hi: 0,
            displacement: 0,
        }
    }

    #[must_use]
    pub fn table(&self) -> &InstructionTable {
        &self.table
    }

    /// True if a maskable interrupt would be accepted right now.
    #[must_use]
    pub fn interrupt_ready(&self) -> bool {
        self.regs.iff1 && !self.ei_pending
    }

    #[must_use]
    pub fn ei_pending(&self) -> bool {
        self.ei_pending
    }

    pub fn set_ei_pending(&mut self, pending: bool) {
        self.ei_pending = pending;
    }

    fn step_one<B: IoBus>(&mut self, bus: &mut B) -> u32 {
        if self.regs.halted {
            return HALT_IDLE_CYCLES;
        }
        self.ei_pending = false;

        let pc = self.regs.pc;
        let b0 = bus.read(pc);
        let mut b1 = 0;
        let mut b2 = 0;
        match b0 {
            0xCB | 0xED => b1 = bus.read(pc.wrapping_add(1)),
            0xDD | 0xFD => {
                b1 = bus.read(pc.wrapping_add(1));
                if b1 == 0xCB {
                    b2 = bus.read(pc.wrapping_add(3));
                }
            }
            _ => {}
        }

        let instr = self.table.lookup(b0, b1, b2);
        let op = instr.op;
        let operands = instr.operands;
        let size = instr.size;
        let opcode_size = instr.opcode_size;
        let tstates = u32::from(instr.tstates);
        let extra = u32::from(instr.tstates_extra);

        // One refresh per opcode fetch, a second for a prefix.
        self.regs.add_r(if opcode_size >= 2 { 2 } else { 1 });

        let operand_base = pc.wrapping_add(u16::from(opcode_size));
        match operands {
            Operands::None => {}
            Operands::Imm8 | Operands::Rel8 => self.operand_lo = bus.read(operand_base),
            Operands::Imm16 => {
                self.operand_lo = bus.read(operand_base);
                self.operand_hi = bus.read(operand_base.wrapping_add(1));
            }
            Operands::Disp => self.displacement = bus.read(operand_base) as i8,
            Operands::DispImm8 => {
                self.displacement = bus.read(operand_base) as i8;
                self.operand_lo = bus.read(operand_base.wrapping_add(1));
            }
            // DD CB: the displacement sits between the prefix pair and
            // the final opcode byte.
            Operands::BitDisp => self.displacement = bus.read(pc.wrapping_add(2)) as i8,
        }

        self.regs.pc = pc.wrapping_add(u16::from(size));
        tstates + self.execute(op, extra, bus)
    }

    /// Accepts a non-maskable interrupt: unconditional, vectors to
    /// `0x0066`, and parks the enable flag in IFF2 for `RETN`.
    pub fn accept_nmi<B: Bus>(&mut self, bus: &mut B) -> u32 {
        self.wake();
        self.regs.iff2 = self.regs.iff1;
        self.regs.iff1 = false;
        self.regs.add_r(1);
        let pc = self.regs.pc;
        self.push(bus, pc);
        self.regs.pc = 0x0066;
        NMI_ACCEPT_CYCLES
    }

    /// Accepts a maskable interrupt with `data_bus` on the bus. The
    /// caller has already checked [`Z80::interrupt_ready`].
    pub fn accept_int<B: Bus>(&mut self, bus: &mut B, data_bus: u8) -> u32 {
        self.wake();
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.regs.add_r(1);
        match self.regs.im {
            2 => {
                let pc = self.regs.pc;
                self.push(bus, pc);
                let vector = (u16::from(self.regs.i) << 8) | u16::from(data_bus);
                self.regs.pc = read16(bus, vector);
                INT_ACCEPT_IM2_CYCLES
            }
            1 => {
                let pc = self.regs.pc;
                self.push(bus, pc);
                self.regs.pc = 0x0038;
                INT_ACCEPT_CYCLES
            }
            _ => {
                // Mode 0 executes the byte supplied by the device. Only
                // the RST family is honoured here; any other byte is
                // treated as a NOP.
                if data_bus & 0xC7 == 0xC7 {
                    let pc = self.regs.pc;
                    self.push(bus, pc);
                    self.regs.pc = u16::from(data_bus & 0x38);
                }
                INT_ACCEPT_CYCLES
            }
        }
    }

    /// Leaves the halt state, stepping PC past the `HALT` opcode.
    fn wake(&mut self) {
        if self.regs.halted {
            self.regs.halted = false;
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }
    }

    fn imm8(&self) -> u8 {
        self.operand_lo
    }

    fn imm16(&self) -> u16 {
        u16::from_le_bytes([self.operand_lo, self.operand_hi])
    }

    /// Branch target of a relative jump, from the already-advanced PC.
    fn rel_target(&self) -> u16 {
        self.regs.pc.wrapping_add(self.operand_lo as i8 as u16)
    }

    fn ea_addr(&self, ea: Ea) -> u16 {
        match ea {
            Ea::Hl => self.regs.hl(),
            Ea::Ix => self.regs.ix.wrapping_add(self.displacement as u16),
            Ea::Iy => self.regs.iy.wrapping_add(self.displacement as u16),
        }
    }

    fn get8(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::B => self.regs.b(),
            Reg8::C => self.regs.c(),
            Reg8::D => self.regs.d(),
            Reg8::E => self.regs.e(),
            Reg8::H => self.regs.h(),
            Reg8::L => self.regs.l(),
            Reg8::A => self.regs.a(),
            Reg8::IxH => (self.regs.ix >> 8) as u8,
            Reg8::IxL => self.regs.ix as u8,
            Reg8::IyH => (self.regs.iy >> 8) as u8,
            Reg8::IyL => self.regs.iy as u8,
        }
    }

    fn set8(&mut self, reg: Reg8, value: u8) {
        match reg {
            Reg8::B => self.regs.set_b(value),
            Reg8::C => self.regs.set_c(value),
            Reg8::D => self.regs.set_d(value),
            Reg8::E => self.regs.set_e(value),
            Reg8::H => self.regs.set_h(value),
            Reg8::L => self.regs.set_l(value),
            Reg8::A => self.regs.set_a(value),
            Reg8::IxH => self.regs.ix = (self.regs.ix & 0x00FF) | (u16::from(value) << 8),
            Reg8::IxL => self.regs.ix = (self.regs.ix & 0xFF00) | u16::from(value),
            Reg8::IyH => self.regs.iy = (self.regs.iy & 0x00FF) | (u16::from(value) << 8),
            Reg8::IyL => self.regs.iy = (self.regs.iy & 0xFF00) | u16::from(value),
        }
    }

    fn get_rp(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::Bc => self.regs.bc(),
            Reg16::De => self.regs.de(),
            Reg16::Hl => self.regs.hl(),
            Reg16::Sp => self.regs.sp,
            Reg16::Af => self.regs.af(),
            Reg16::Ix => self.regs.ix,
            Reg16::Iy => self.regs.iy,
        }
    }

    fn set_rp(&mut self, reg: Reg16, value: u16) {
        match reg {
            Reg16::Bc => self.regs.set_bc(value),
            Reg16::De => self.regs.set_de(value),
            Reg16::Hl => self.regs.set_hl(value),
            Reg16::Sp => self.regs.sp = value,
            Reg16::Af => self.regs.set_af(value),
            Reg16::Ix => self.regs.ix = value,
            Reg16::Iy => self.regs.iy = value,
        }
    }

    fn condition(&self, cond: Cond) -> bool {
        let f = self.regs.f();
        match cond {
            Cond::Nz => f & ZF == 0,
            Cond::Z => f & ZF != 0,
            Cond::Nc => f & CF == 0,
            Cond::C => f & CF != 0,
            Cond::Po => f & PF == 0,
            Cond::Pe => f & PF != 0,
            Cond::P => f & SF == 0,
            Cond::M => f & SF != 0,
        }
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u16) {
        let [high, low] = value.to_be_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, high);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, low);
    }

    fn pop<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let low = bus.read(self.regs.sp);
        let high = bus.read(self.regs.sp.wrapping_add(1));
        self.regs.sp = self.regs.sp.wrapping_add(2);
        u16::from_be_bytes([high, low])
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: IoBus> Cpu<B> for Z80 {
    fn step(&mut self, bus: &mut B) -> u32 {
        self.step_one(bus)
    }

    fn reset(&mut self) {
        self.regs.reset();
        self.ei_pending = false;
        self.operand_lo = 0;
        self.operand_hi = 0;
        self.displacement = 0;
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }
}

fn read16<B: Bus>(bus: &mut B, address: u16) -> u16 {
    let low = bus.read(address);
    let high = bus.read(address.wrapping_add(1));
    u16::from_be_bytes([high, low])
}

fn write16<B: Bus>(bus: &mut B, address: u16, value: u16) {
    let [high, low] = value.to_be_bytes();
    bus.write(address, low);
    bus.write(address.wrapping_add(1), high);
}
