//! Interrupt request lines and delivery.
//!
//! Devices raise requests here; between instructions the scheduler calls
//! [`InterruptController::service`], which hands at most one interrupt
//! to the CPU per boundary. The non-maskable line is edge-style and is
//! consumed by delivery; the maskable line is level-style and stays
//! asserted until the device (or its port logic) drops it, so a masked
//! or disabled interrupt is picked up as soon as the CPU re-enables.

use emu_core::Bus;

use crate::cpu::Z80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptController {
    int_line: bool,
    nmi_pending: bool,
    /// Byte the interrupting device drives onto the data bus; selects
    /// the IM 0 instruction and the IM 2 vector low byte. Floats high
    /// when nothing drives it.
    data_bus: u8,
}

impl InterruptController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            int_line: false,
            nmi_pending: false,
            data_bus: 0xFF,
        }
    }

    /// Asserts the maskable interrupt line.
    pub fn request_maskable(&mut self) {
        self.int_line = true;
    }

    /// Drops the maskable interrupt line.
    pub fn clear_maskable(&mut self) {
        self.int_line = false;
    }

    /// Latches a non-maskable interrupt; delivered at the next boundary
    /// regardless of the CPU's enable flag.
    pub fn request_nonmaskable(&mut self) {
        self.nmi_pending = true;
    }

    pub fn set_data_bus(&mut self, byte: u8) {
        self.data_bus = byte;
    }

    #[must_use]
    pub fn maskable_pending(&self) -> bool {
        self.int_line
    }

    #[must_use]
    pub fn nonmaskable_pending(&self) -> bool {
        self.nmi_pending
    }

    #[must_use]
    pub fn data_bus(&self) -> u8 {
        self.data_bus
    }

    /// Restores latched state captured by a snapshot.
    pub fn restore(&mut self, int_line: bool, nmi_pending: bool, data_bus: u8) {
        self.int_line = int_line;
        self.nmi_pending = nmi_pending;
        self.data_bus = data_bus;
    }

    /// Delivers one pending interrupt if the CPU will take it, returning
    /// the acceptance cost in cycles. NMI wins over the maskable line.
    pub fn service<B: Bus>(&mut self, cpu: &mut Z80, bus: &mut B) -> Option<u32> {
        if self.nmi_pending {
            self.nmi_pending = false;
            return Some(cpu.accept_nmi(bus));
        }
        if self.int_line && cpu.interrupt_ready() {
            return Some(cpu.accept_int(bus, self.data_bus));
        }
        None
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}
