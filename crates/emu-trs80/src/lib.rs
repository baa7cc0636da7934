//! TRS-80 Model III emulator.
//!
//! A table-driven Z80 core ([`zilog_z80`]) runs against the Model III
//! address space: 14K ROM, memory-mapped keyboard matrix, 1K video
//! window, the 30 Hz heartbeat interrupt, a WD1793 floppy controller
//! ([`wd_fd1793`]) on the NMI line, and the cassette port. A scheduler
//! thread owns the machine while it runs and paces execution against
//! the 2.03 MHz master clock; the [`Trs80`] facade hands state to the
//! thread at `start`, takes it back at `stop`, and routes everything
//! else through shared flags or a command queue so nothing observes
//! the machine mid-instruction.

pub mod bus;
pub mod cassette;
pub mod config;
pub mod keyboard;
pub mod machine;
pub mod rtc;
pub mod scheduler;
pub mod snapshot;
pub mod video;

pub use bus::{PeripheralFault, Trs80Bus};
pub use config::{CLOCK_HZ, CYCLES_PER_FRAME, FRAME_RATE, Trs80Config, Trs80Model};
pub use machine::Trs80;
pub use scheduler::{ClockMode, SchedulerEvent, TraceRecord};
pub use snapshot::{SNAPSHOT_VERSION, SnapshotError};
pub use wd_fd1793::{Disk, GeometryError};
pub use zilog_z80::Registers;
