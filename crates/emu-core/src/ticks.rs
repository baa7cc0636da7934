//! Sub-cycle time accounting.

/// Master-clock ticks per emulated CPU cycle (T-state).
///
/// Instruction timing is stored in whole T-states; converting to ticks gives
/// integer arithmetic headroom for pacing and for peripherals that divide
/// the CPU clock.
pub const TICKS_PER_CYCLE: u64 = 1000;

/// A count of master clock ticks.
///
/// One emulated T-state is [`TICKS_PER_CYCLE`] ticks, so a 4 T-state opcode
/// costs `Ticks(4000)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    /// Ticks for a whole number of CPU cycles.
    #[must_use]
    pub const fn from_cycles(cycles: u64) -> Self {
        Self(cycles * TICKS_PER_CYCLE)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl core::ops::Add for Ticks {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::ops::AddAssign for Ticks {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl core::ops::Sub for Ticks {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_conversion() {
        assert_eq!(Ticks::from_cycles(4), Ticks(4000));
        assert_eq!(Ticks::from_cycles(0), Ticks::ZERO);
    }

    #[test]
    fn subtraction_saturates() {
        assert_eq!(Ticks(5) - Ticks(9), Ticks::ZERO);
        assert_eq!(Ticks(9) - Ticks(5), Ticks(4));
    }
}
