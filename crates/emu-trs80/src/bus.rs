//! Model III address space.
//!
//! Memory map:
//!
//! | Range         | Contents                                      |
//! |---------------|-----------------------------------------------|
//! | 0000-37FF     | ROM (writes ignored)                          |
//! | 3800-3BFF     | keyboard matrix (low byte selects rows)       |
//! | 3C00-3FFF     | video RAM                                     |
//! | 4000-FFFF     | RAM                                           |
//!
//! I/O decodes the low address byte only:
//!
//! | Ports | Write                  | Read                          |
//! |-------|------------------------|-------------------------------|
//! | E0-E3 | interrupt mask         | interrupt status (active low) |
//! | E4-E7 | NMI mask               | NMI status (active low)       |
//! | EC-EF | mode register          | acknowledges the heartbeat    |
//! | F0-F3 | FD1793 registers       | FD1793 registers              |
//! | F4-F7 | drive select           | floating                      |
//! | FF    | cassette output level  | cassette input in bit 7       |
//!
//! Unmapped ports float high. A peripheral that detects an internal
//! inconsistency latches a [`PeripheralFault`] here instead of failing
//! the access; the offending read repeats the last value seen on that
//! port and the scheduler collects the fault as an event.

use emu_core::{Bus, IoBus};
use thiserror::Error;
use wd_fd1793::Fd1793;

use crate::cassette::Cassette;
use crate::config::{Trs80Config, Trs80Model};
use crate::keyboard::Keyboard;
use crate::rtc::Rtc;
use crate::video;

/// First address past the ROM socket.
pub const ROM_LIMIT: usize = 0x3800;
/// Keyboard matrix window.
pub const KEYBOARD_BASE: u16 = 0x3800;
const KEYBOARD_END: u16 = 0x3BFF;
/// Start of video RAM.
pub const VIDEO_BASE: u16 = 0x3C00;

/// Interrupt mask/status bit for the 30 Hz heartbeat.
const INT_RTC: u8 = 0x04;
/// NMI mask/status bit for FDC interrupt requests.
const NMI_FDC_INTRQ: u8 = 0x80;
/// Mode register bit driving the cassette motor relay.
const MODE_CASSETTE_MOTOR: u8 = 0x02;

/// Non-fatal failure raised by a peripheral. Execution continues; the
/// fault is delivered once as a scheduler event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{device}: {message}")]
pub struct PeripheralFault {
    pub device: &'static str,
    pub message: String,
}

/// Owner of an I/O port, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortOwner {
    None,
    IntControl,
    NmiControl,
    ModeControl,
    Fdc,
    DriveSelect,
    Cassette,
}

pub struct Trs80Bus {
    mem: Box<[u8; 0x10000]>,
    rom_len: usize,
    model: Trs80Model,
    pub keyboard: Keyboard,
    pub cassette: Cassette,
    pub rtc: Rtc,
    pub fdc: Fd1793,
    port_owners: [PortOwner; 256],
    pub(crate) int_mask: u8,
    pub(crate) nmi_mask: u8,
    pub(crate) drive_select: u8,
    last_port_in: [u8; 256],
    fault: Option<PeripheralFault>,
}

impl Trs80Bus {
    /// Builds the address space and loads the ROM at address zero.
    ///
    /// # Errors
    ///
    /// Fails if the ROM image does not fit below the keyboard window.
    pub fn new(config: &Trs80Config) -> Result<Self, String> {
        if config.rom.len() > ROM_LIMIT {
            return Err(format!(
                "ROM image is {} bytes; at most {ROM_LIMIT} fit below the keyboard window",
                config.rom.len()
            ));
        }
        let mut mem = Box::new([0u8; 0x10000]);
        mem[..config.rom.len()].copy_from_slice(&config.rom);
        Ok(Self {
            mem,
            rom_len: config.rom.len(),
            model: config.model,
            keyboard: Keyboard::new(),
            cassette: Cassette::new(),
            rtc: Rtc::new(),
            fdc: Fd1793::new(),
            port_owners: Self::build_port_map(),
            int_mask: 0,
            nmi_mask: 0,
            drive_select: 0,
            last_port_in: [0xFF; 256],
            fault: None,
        })
    }

    fn build_port_map() -> [PortOwner; 256] {
        let mut map = [PortOwner::None; 256];
        for port in 0xE0..=0xE3 {
            map[port] = PortOwner::IntControl;
        }
        for port in 0xE4..=0xE7 {
            map[port] = PortOwner::NmiControl;
        }
        for port in 0xEC..=0xEF {
            map[port] = PortOwner::ModeControl;
        }
        for port in 0xF0..=0xF3 {
            map[port] = PortOwner::Fdc;
        }
        for port in 0xF4..=0xF7 {
            map[port] = PortOwner::DriveSelect;
        }
        map[0xFF] = PortOwner::Cassette;
        map
    }

    #[must_use]
    pub fn model(&self) -> Trs80Model {
        self.model
    }

    /// Reads without port or acknowledgement side effects. The
    /// keyboard window still decodes, so observers see what the CPU
    /// would.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        match address {
            KEYBOARD_BASE..=KEYBOARD_END => self.keyboard.read(address as u8),
            _ => self.mem[usize::from(address)],
        }
    }

    /// Stores bytes directly, bypassing ROM write protection. The
    /// caller has validated that `org + bytes.len()` stays in range.
    pub fn load_bytes(&mut self, org: u16, bytes: &[u8]) {
        let start = usize::from(org);
        self.mem[start..start + bytes.len()].copy_from_slice(bytes);
    }

    #[must_use]
    pub fn memory(&self) -> &[u8; 0x10000] {
        &self.mem
    }

    pub fn restore_memory(&mut self, bytes: &[u8; 0x10000]) {
        *self.mem = *bytes;
    }

    /// Copies the video window out of memory.
    #[must_use]
    pub fn video_window(&self) -> [u8; video::CELLS] {
        let mut cells = [0u8; video::CELLS];
        let base = usize::from(VIDEO_BASE);
        cells.copy_from_slice(&self.mem[base..base + video::CELLS]);
        cells
    }

    /// Level of the maskable interrupt line.
    #[must_use]
    pub fn int_line(&self) -> bool {
        self.rtc.pending() && self.int_mask & INT_RTC != 0
    }

    /// Level of the non-maskable interrupt line.
    #[must_use]
    pub fn nmi_line(&self) -> bool {
        self.fdc.intrq() && self.nmi_mask & NMI_FDC_INTRQ != 0
    }

    /// Takes the pending peripheral fault, if any.
    pub fn take_fault(&mut self) -> Option<PeripheralFault> {
        self.fault.take()
    }

    /// Power-on reset. RAM and mounted media survive; peripheral
    /// electronics, masks, and the fault latch clear.
    pub fn reset(&mut self) {
        self.keyboard.release_all();
        self.cassette.reset();
        self.rtc.reset();
        self.fdc.reset();
        self.int_mask = 0;
        self.nmi_mask = 0;
        self.drive_select = 0;
        self.last_port_in = [0xFF; 256];
        self.fault = None;
    }

    fn apply_drive_select(&mut self, value: u8) {
        self.drive_select = value;
        for drive in 0..4 {
            if value & (1 << drive) != 0 {
                self.fdc.select_drive(drive);
                break;
            }
        }
        self.fdc.select_side((value >> 4) & 1);
    }

    /// Collects a fault the access may have raised in the device.
    fn poll_device_fault(&mut self, owner: PortOwner) -> bool {
        match owner {
            PortOwner::Fdc | PortOwner::DriveSelect => {
                if let Some(fault) = self.fdc.take_fault() {
                    self.fault = Some(PeripheralFault {
                        device: "fdc",
                        message: fault.to_string(),
                    });
                    return true;
                }
                false
            }
            _ => false,
        }
    }
}

impl Bus for Trs80Bus {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            KEYBOARD_BASE..=KEYBOARD_END => self.keyboard.read(address as u8),
            _ => self.mem[usize::from(address)],
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        if usize::from(address) < self.rom_len {
            return;
        }
        if (KEYBOARD_BASE..=KEYBOARD_END).contains(&address) {
            return;
        }
        self.mem[usize::from(address)] = value;
    }

    fn tick(&mut self, cycles: u32) {
        self.cassette.tick(cycles);
        self.rtc.tick(cycles);
        self.fdc.tick(cycles);
    }
}

impl IoBus for Trs80Bus {
    fn read_io(&mut self, port: u8) -> u8 {
        let owner = self.port_owners[usize::from(port)];
        let value = match owner {
            PortOwner::IntControl => {
                let mut status = 0xFF;
                if self.rtc.pending() {
                    status &= !INT_RTC;
                }
                status
            }
            PortOwner::NmiControl => {
                let mut status = 0xFF;
                if self.fdc.intrq() {
                    status &= !NMI_FDC_INTRQ;
                }
                status
            }
            PortOwner::ModeControl => {
                self.rtc.clear();
                0xFF
            }
            PortOwner::Fdc => match port & 3 {
                0 => self.fdc.read_status(),
                1 => self.fdc.read_track_reg(),
                2 => self.fdc.read_sector_reg(),
                _ => self.fdc.read_data(),
            },
            PortOwner::Cassette => self.cassette.read_port(),
            PortOwner::DriveSelect | PortOwner::None => 0xFF,
        };
        if self.poll_device_fault(owner) {
            // The faulting read is answered with the port's last known
            // value; the fault itself travels separately.
            return self.last_port_in[usize::from(port)];
        }
        self.last_port_in[usize::from(port)] = value;
        value
    }

    fn write_io(&mut self, port: u8, value: u8) {
        let owner = self.port_owners[usize::from(port)];
        match owner {
            PortOwner::IntControl => self.int_mask = value,
            PortOwner::NmiControl => self.nmi_mask = value,
            PortOwner::ModeControl => {
                self.cassette.set_motor(value & MODE_CASSETTE_MOTOR != 0);
            }
            PortOwner::Fdc => match port & 3 {
                0 => self.fdc.write_command(value),
                1 => self.fdc.write_track_reg(value),
                2 => self.fdc.write_sector_reg(value),
                _ => self.fdc.write_data(value),
            },
            PortOwner::DriveSelect => self.apply_drive_select(value),
            PortOwner::Cassette => self.cassette.write_port(value),
            PortOwner::None => {}
        }
        self.poll_device_fault(owner);
    }
}
