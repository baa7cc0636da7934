//! Instruction-level Zilog Z80 emulation.
//!
//! The core is organised around a total decode table: every one-, two-,
//! three- or four-byte prefix/opcode sequence maps to a well-defined
//! [`Instruction`], including all the undocumented encodings, so
//! execution is a straight table lookup followed by one `match` on the
//! operation. Cycle counts are instruction-grained.
//!
//! Memory and I/O go through the [`emu_core::Bus`] and
//! [`emu_core::IoBus`] traits; the CPU owns nothing outside its
//! registers.

pub mod alu;
pub mod cpu;
pub mod disasm;
pub mod flags;
pub mod interrupt;
pub mod ops;
pub mod registers;
pub mod table;

pub use cpu::{
    HALT_IDLE_CYCLES, INT_ACCEPT_CYCLES, INT_ACCEPT_IM2_CYCLES, NMI_ACCEPT_CYCLES, Z80,
};
pub use interrupt::InterruptController;
pub use registers::{Bank, Registers};
pub use table::{Instruction, InstructionTable};
