//! 30 Hz heartbeat timer.
//!
//! The Model III derives a 30 Hz interrupt from the video circuitry.
//! Each period latches a flag that asserts the maskable interrupt line
//! (subject to the mask at port E0h) until software acknowledges it by
//! reading port ECh.

use crate::config::CLOCK_HZ;

/// Cycles between heartbeats.
const PERIOD_CYCLES: u64 = CLOCK_HZ / 30;

#[derive(Debug)]
pub struct Rtc {
    countdown: u64,
    latched: bool,
}

impl Rtc {
    #[must_use]
    pub fn new() -> Self {
        Self {
            countdown: PERIOD_CYCLES,
            latched: false,
        }
    }

    pub fn tick(&mut self, cycles: u32) {
        let mut remaining = u64::from(cycles);
        while remaining >= self.countdown {
            remaining -= self.countdown;
            self.countdown = PERIOD_CYCLES;
            self.latched = true;
        }
        self.countdown -= remaining;
    }

    /// True while a heartbeat awaits acknowledgement.
    #[must_use]
    pub fn pending(&self) -> bool {
        self.latched
    }

    /// Acknowledges the latched heartbeat.
    pub fn clear(&mut self) {
        self.latched = false;
    }

    #[must_use]
    pub fn countdown(&self) -> u64 {
        self.countdown
    }

    pub fn restore(&mut self, countdown: u64, latched: bool) {
        self.countdown = countdown.clamp(1, PERIOD_CYCLES);
        self.latched = latched;
    }

    pub fn reset(&mut self) {
        self.countdown = PERIOD_CYCLES;
        self.latched = false;
    }
}

impl Default for Rtc {
    fn default() -> Self {
        Self::new()
    }
}
