use crate::Bus;

/// A CPU that executes whole instructions.
///
/// The type parameter `B` is the bus type this CPU operates on.
pub trait Cpu<B: Bus> {
    /// Execute one instruction. Returns T-states consumed.
    fn step(&mut self, bus: &mut B) -> u32;

    /// Reset the CPU to its power-on state.
    fn reset(&mut self);

    /// Current program counter.
    fn pc(&self) -> u16;
}
