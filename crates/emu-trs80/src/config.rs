//! Machine configuration.

/// CPU clock of the Model III, in Hz.
pub const CLOCK_HZ: u64 = 2_027_520;

/// Display refresh rate the frame cadence is derived from.
pub const FRAME_RATE: u64 = 60;

/// CPU cycles in one frame. A frame is the pacing and publication
/// quantum of the scheduler; the count is exact, so frame boundaries
/// land on the same cycle no matter how execution is timed.
pub const CYCLES_PER_FRAME: u64 = CLOCK_HZ / FRAME_RATE;

/// Machine variant. Only the Model III is implemented; the variant is
/// recorded in snapshots so images from a different machine are
/// refused rather than misapplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trs80Model {
    ModelIII,
}

impl Trs80Model {
    pub(crate) fn snapshot_byte(self) -> u8 {
        match self {
            Self::ModelIII => 3,
        }
    }

    pub(crate) fn from_snapshot_byte(byte: u8) -> Option<Self> {
        match byte {
            3 => Some(Self::ModelIII),
            _ => None,
        }
    }
}

/// Everything needed to build a machine. The ROM may be empty, which
/// leaves the low 14K as ordinary RAM; useful for running bare test
/// programs without a firmware image.
#[derive(Debug, Clone)]
pub struct Trs80Config {
    pub model: Trs80Model,
    pub rom: Vec<u8>,
}

impl Trs80Config {
    #[must_use]
    pub fn model_iii(rom: Vec<u8>) -> Self {
        Self {
            model: Trs80Model::ModelIII,
            rom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_length_is_exact() {
        assert_eq!(CYCLES_PER_FRAME, 33_792);
        assert_eq!(CYCLES_PER_FRAME * FRAME_RATE, CLOCK_HZ);
    }

    #[test]
    fn model_byte_round_trips() {
        let byte = Trs80Model::ModelIII.snapshot_byte();
        assert_eq!(Trs80Model::from_snapshot_byte(byte), Some(Trs80Model::ModelIII));
        assert_eq!(Trs80Model::from_snapshot_byte(0), None);
    }
}
