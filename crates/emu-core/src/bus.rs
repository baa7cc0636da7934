/// A bus that supports memory read/write operations.
///
/// The CPU core performs every fetch, operand read, load, and store through
/// this trait. Implementations decode the address to RAM, ROM, or a
/// memory-mapped peripheral window.
///
/// All operations must return promptly: a peripheral behind the bus models
/// slow work (disk stepping, tape motion) as an internal delay advanced by
/// [`Bus::tick`], never by blocking the access itself.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8);

    /// Notify peripherals that the CPU consumed `cycles` T-states.
    ///
    /// Called once per executed instruction (and once per serviced
    /// interrupt), not per bus access. Peripherals use this to advance
    /// internally modeled delays.
    fn tick(&mut self, cycles: u32) {
        let _ = cycles;
    }
}

/// A bus that also supports separate I/O port operations.
///
/// The Z80 has a dedicated I/O address space reached via IN and OUT.
/// Machines in this workspace decode only the low 8 address bits, so ports
/// are `u8`.
pub trait IoBus: Bus {
    /// Read a byte from the given I/O port.
    fn read_io(&mut self, port: u8) -> u8;

    /// Write a byte to the given I/O port.
    fn write_io(&mut self, port: u8, value: u8);
}
