//! Master clock configuration.

/// Nominal CPU clock for a machine.
///
/// All pacing derives from this frequency: the scheduler converts cycles
/// consumed by the CPU into wall-clock time to decide how far ahead of real
/// time it is running.
#[derive(Debug, Clone, Copy)]
pub struct MasterClock {
    /// CPU frequency in Hz (e.g. `2_027_520` for a TRS-80 Model III).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Cycles per frame at the given frame rate (integer division).
    #[must_use]
    pub const fn cycles_per_frame(&self, frames_per_second: u64) -> u64 {
        self.frequency_hz / frames_per_second
    }

    /// Wall-clock nanoseconds the given cycle count represents.
    #[must_use]
    pub fn nanos_for_cycles(&self, cycles: u64) -> u64 {
        let nanos = u128::from(cycles) * 1_000_000_000 / u128::from(self.frequency_hz);
        u64::try_from(nanos).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_division() {
        let clock = MasterClock::new(2_027_520);
        assert_eq!(clock.cycles_per_frame(60), 33_792);
    }

    #[test]
    fn cycle_duration() {
        let clock = MasterClock::new(2_000_000);
        // 2 MHz: one cycle is 500 ns.
        assert_eq!(clock.nanos_for_cycles(1), 500);
        assert_eq!(clock.nanos_for_cycles(2_000_000), 1_000_000_000);
    }
}
