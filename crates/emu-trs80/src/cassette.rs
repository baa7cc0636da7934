//! Cassette port.
//!
//! Port FFh drives the recording head: the low two bits of a write set
//! the output level (01 high, 10 low, 00/11 rest). A read returns the
//! playback comparator in bit 7 with the unused bits floating high.
//! The motor relay lives in the mode register (port ECh bit 1) and is
//! switched from the bus.
//!
//! There is no real tape. Output is sampled into a ring while the
//! motor runs, at a divisor chosen to land near 44.1 kHz, and drained
//! at frame boundaries for WAV capture. Input is a pre-digitised list
//! of `(cycle, level)` transitions relative to motor start; the port
//! replays whichever level the list holds at the current position.

use emu_core::RingHistory;

use crate::config::CLOCK_HZ;

/// Cycles between output samples.
const CYCLES_PER_SAMPLE: u32 = 46;

/// Sample rate CYCLES_PER_SAMPLE yields, for WAV headers.
pub const SAMPLE_RATE_HZ: u32 = (CLOCK_HZ / CYCLES_PER_SAMPLE as u64) as u32;

/// Ring capacity. Holds over two frames of samples, so nothing is lost
/// as long as the ring is drained once per frame.
const SAMPLE_CAPACITY: usize = 2048;

pub struct Cassette {
    motor: bool,
    output_level: u8,
    samples: RingHistory<f32>,
    sample_countdown: u32,
    motor_cycles: u64,
    input: Vec<(u64, bool)>,
    input_pos: usize,
    input_level: bool,
}

impl Cassette {
    #[must_use]
    pub fn new() -> Self {
        Self {
            motor: false,
            output_level: 0,
            samples: RingHistory::new(SAMPLE_CAPACITY),
            sample_countdown: CYCLES_PER_SAMPLE,
            motor_cycles: 0,
            input: Vec::new(),
            input_pos: 0,
            input_level: false,
        }
    }

    /// Switches the motor relay. Starting the motor rewinds the input
    /// tape to its first transition.
    pub fn set_motor(&mut self, on: bool) {
        if on && !self.motor {
            self.motor_cycles = 0;
            self.sample_countdown = CYCLES_PER_SAMPLE;
            self.input_pos = 0;
            self.input_level = false;
        }
        self.motor = on;
    }

    #[must_use]
    pub fn motor(&self) -> bool {
        self.motor
    }

    pub fn write_port(&mut self, value: u8) {
        self.output_level = value & 0x03;
    }

    #[must_use]
    pub fn read_port(&self) -> u8 {
        let bit = u8::from(self.motor && self.input_level);
        (bit << 7) | 0x7F
    }

    #[must_use]
    pub fn output_level(&self) -> u8 {
        self.output_level
    }

    /// Mounts a digitised input tape: `(cycle, level)` transitions
    /// measured from motor start, sorted by cycle.
    pub fn load_levels(&mut self, levels: Vec<(u64, bool)>) {
        self.input = levels;
        self.input_pos = 0;
        self.input_level = false;
    }

    /// Advances tape time. Idle while the motor is off.
    pub fn tick(&mut self, cycles: u32) {
        if !self.motor {
            return;
        }
        self.motor_cycles += u64::from(cycles);
        while self.input_pos < self.input.len() && self.input[self.input_pos].0 <= self.motor_cycles
        {
            self.input_level = self.input[self.input_pos].1;
            self.input_pos += 1;
        }
        let mut remaining = cycles;
        while remaining >= self.sample_countdown {
            remaining -= self.sample_countdown;
            self.sample_countdown = CYCLES_PER_SAMPLE;
            let sample = match self.output_level {
                1 => 1.0,
                2 => -1.0,
                _ => 0.0,
            };
            self.samples.push(sample);
        }
        self.sample_countdown -= remaining;
    }

    /// Takes everything sampled since the last drain, oldest first.
    pub fn drain_samples(&mut self) -> Vec<f32> {
        let out = self.samples.to_vec();
        self.samples.clear();
        out
    }

    /// Restores snapshot state. The input tape is external media and
    /// keeps whatever is currently mounted.
    pub fn restore(&mut self, motor: bool, output_level: u8) {
        self.motor = motor;
        self.output_level = output_level & 0x03;
        self.samples.clear();
        self.sample_countdown = CYCLES_PER_SAMPLE;
    }

    /// Power-on reset. Mounted input media survives, rewound.
    pub fn reset(&mut self) {
        self.motor = false;
        self.output_level = 0;
        self.samples.clear();
        self.sample_countdown = CYCLES_PER_SAMPLE;
        self.motor_cycles = 0;
        self.input_pos = 0;
        self.input_level = false;
    }
}

impl Default for Cassette {
    fn default() -> Self {
        Self::new()
    }
}
