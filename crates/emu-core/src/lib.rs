//! Core traits and types for instruction-level emulation.
//!
//! A CPU core executes one instruction at a time against a [`Bus`] and
//! reports the T-states it consumed. Everything else — pacing, interrupt
//! delivery, peripheral delays — is built on that cycle count.

mod bus;
mod clock;
mod cpu;
mod history;
mod ticks;

pub use bus::{Bus, IoBus};
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use history::RingHistory;
pub use ticks::{TICKS_PER_CYCLE, Ticks};
