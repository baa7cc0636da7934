//! Western Digital FD1793 floppy disk controller.
//!
//! The FD1793 exposes four registers to the host. Command and status
//! share one address (write/read respectively); track, sector and data
//! each have their own. On the TRS-80 Model III the four land on ports
//! `F0h`-`F3h`, with drive and side select latched separately.
//!
//! Commands fall into four types. Type I commands move the head
//! (Restore, Seek, Step and friends) and complete after a step-rate
//! delay driven by [`Fd1793::tick`]. Type II commands (Read Sector,
//! Write Sector) stream sector bytes through the data register, raising
//! DRQ while bytes are pending. Type III Read Address returns the ID
//! field of the current track; Read Track and Write Track are accepted
//! but transfer nothing, since images here are sector-level. Type IV
//! Force Interrupt terminates whatever is in flight.
//!
//! INTRQ and DRQ are exposed as level accessors so the host can route
//! them to its interrupt logic. Reading the status register or writing
//! a new command clears INTRQ, as on the real chip.

mod disk;

pub use disk::{Disk, GeometryError};

use std::fmt;

/// Number of drive select lines.
pub const DRIVES: usize = 4;

/// Host clock cycles per millisecond. The controller is ticked on the
/// CPU clock of its host; the Model III runs at 2.02752 MHz.
const CYCLES_PER_MS: u64 = 2_028;

/// One disk revolution at 300 RPM.
const REVOLUTION_CYCLES: u64 = 200 * CYCLES_PER_MS;

/// Width of the index pulse within each revolution.
const INDEX_PULSE_CYCLES: u64 = 2 * CYCLES_PER_MS;

/// Head step time in milliseconds, indexed by the r1/r0 command bits.
const STEP_RATE_MS: [u64; 4] = [3, 6, 10, 15];

// Type I status bits.
const ST_BUSY: u8 = 0x01;
const ST_INDEX: u8 = 0x02;
const ST_TRACK0: u8 = 0x04;
const ST_HEAD_LOADED: u8 = 0x20;
// Type II/III status bits.
const ST_DRQ: u8 = 0x02;
const ST_RECORD_NOT_FOUND: u8 = 0x10;
// Shared.
const ST_WRITE_PROTECT: u8 = 0x40;
const ST_NOT_READY: u8 = 0x80;

/// Raised when a data command addresses a track past the end of the
/// mounted image: the image is smaller than whatever drove the head
/// there believes. The command still completes with Record Not Found
/// status, so emulation carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdcFault {
    pub drive: usize,
    pub track: u8,
}

impl fmt::Display for FdcFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "drive {}: track {} lies beyond the mounted image",
            self.drive, self.track
        )
    }
}

/// Which status register layout reads should compose. Set by the last
/// command accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusKind {
    TypeI,
    TypeII,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    None,
    Reading,
    Writing,
    ReadingAddress,
}

/// The controller proper.
#[derive(Debug)]
pub struct Fd1793 {
    // Host-visible registers.
    track: u8,
    sector: u8,
    data: u8,
    command: u8,

    // Mechanism state.
    head_track: [u8; DRIVES],
    step_direction: i8,
    drive: usize,
    side: u8,
    disks: [Option<Disk>; DRIVES],
    rev_position: u64,

    // Command state.
    status_kind: StatusKind,
    busy: bool,
    busy_cycles: u64,
    seek_target: u8,
    update_track_reg: bool,
    record_not_found: bool,
    write_protect_error: bool,

    // Data transfer state.
    transfer: Transfer,
    multiple: bool,
    transfer_len: usize,
    buffer: Vec<u8>,
    buffer_index: usize,

    intrq: bool,
    drq: bool,
    fault: Option<FdcFault>,
}

impl Fd1793 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            track: 0,
            sector: 0,
            data: 0,
            command: 0,
            head_track: [0; DRIVES],
            step_direction: 1,
            drive: 0,
            side: 0,
            disks: [None, None, None, None],
            rev_position: 0,
            status_kind: StatusKind::TypeI,
            busy: false,
            busy_cycles: 0,
            seek_target: 0,
            update_track_reg: false,
            record_not_found: false,
            write_protect_error: false,
            transfer: Transfer::None,
            multiple: false,
            transfer_len: 0,
            buffer: Vec::new(),
            buffer_index: 0,
            intrq: false,
            drq: false,
            fault: None,
        }
    }

    /// Power-on reset. Mounted disks and head positions survive; all
    /// electrical state is cleared.
    pub fn reset(&mut self) {
        self.track = 0;
        self.sector = 0;
        self.data = 0;
        self.command = 0;
        self.status_kind = StatusKind::TypeI;
        self.busy = false;
        self.busy_cycles = 0;
        self.record_not_found = false;
        self.write_protect_error = false;
        self.transfer = Transfer::None;
        self.multiple = false;
        self.buffer.clear();
        self.buffer_index = 0;
        self.intrq = false;
        self.drq = false;
        self.fault = None;
    }

    /// Advances the command timer and the spindle. Type I commands
    /// complete here; data transfers are paced by the host instead.
    pub fn tick(&mut self, cycles: u32) {
        let cycles = u64::from(cycles);
        self.rev_position = (self.rev_position + cycles) % REVOLUTION_CYCLES;
        if self.busy_cycles > 0 {
            if self.busy_cycles <= cycles {
                self.busy_cycles = 0;
                self.complete_type_i();
            } else {
                self.busy_cycles -= cycles;
            }
        }
    }

    pub fn insert_disk(&mut self, drive: usize, disk: Disk) {
        self.disks[drive % DRIVES] = Some(disk);
    }

    pub fn eject_disk(&mut self, drive: usize) -> Option<Disk> {
        self.disks[drive % DRIVES].take()
    }

    #[must_use]
    pub fn disk(&self, drive: usize) -> Option<&Disk> {
        self.disks[drive % DRIVES].as_ref()
    }

    pub fn select_drive(&mut self, drive: usize) {
        self.drive = drive % DRIVES;
    }

    pub fn select_side(&mut self, side: u8) {
        self.side = side & 1;
    }

    #[must_use]
    pub fn selected_drive(&self) -> usize {
        self.drive
    }

    #[must_use]
    pub fn selected_side(&self) -> u8 {
        self.side
    }

    #[must_use]
    pub fn head_track(&self, drive: usize) -> u8 {
        self.head_track[drive % DRIVES]
    }

    /// Forces a head position, for state restoration.
    pub fn set_head_track(&mut self, drive: usize, track: u8) {
        self.head_track[drive % DRIVES] = track;
    }

    #[must_use]
    pub fn intrq(&self) -> bool {
        self.intrq
    }

    #[must_use]
    pub fn drq(&self) -> bool {
        self.drq
    }

    #[must_use]
    pub fn busy(&self) -> bool {
        self.busy
    }

    /// Takes the pending image-inconsistency fault, if one was raised.
    pub fn take_fault(&mut self) -> Option<FdcFault> {
        self.fault.take()
    }

    /// Composes the status register for the last command type and
    /// clears INTRQ.
    pub fn read_status(&mut self) -> u8 {
        self.intrq = false;
        let disk = self.disks[self.drive].as_ref();
        let mut status = 0;
        if disk.is_none() {
            status |= ST_NOT_READY;
        }
        match self.status_kind {
            StatusKind::TypeI => {
                if self.busy {
                    status |= ST_BUSY;
                }
                if let Some(disk) = disk {
                    status |= ST_HEAD_LOADED;
                    if self.rev_position < INDEX_PULSE_CYCLES {
                        status |= ST_INDEX;
                    }
                    if disk.write_protected() {
                        status |= ST_WRITE_PROTECT;
                    }
                }
                if self.head_track[self.drive] == 0 {
                    status |= ST_TRACK0;
                }
            }
            StatusKind::TypeII => {
                if self.busy {
                    status |= ST_BUSY;
                }
                if self.drq {
                    status |= ST_DRQ;
                }
                if self.record_not_found {
                    status |= ST_RECORD_NOT_FOUND;
                }
                if self.write_protect_error {
                    status |= ST_WRITE_PROTECT;
                }
            }
        }
        status
    }

    pub fn write_command(&mut self, byte: u8) {
        // Force Interrupt is honoured even mid-command; everything else
        // is ignored until the controller goes idle.
        if byte & 0xF0 == 0xD0 {
            self.force_interrupt(byte);
            return;
        }
        if self.busy {
            return;
        }
        self.intrq = false;
        self.command = byte;
        match byte >> 4 {
            0x0 => self.begin_restore(byte),
            0x1 => self.begin_seek(byte),
            0x2 | 0x3 => self.begin_step(byte, self.step_direction),
            0x4 | 0x5 => self.begin_step(byte, 1),
            0x6 | 0x7 => self.begin_step(byte, -1),
            0x8 | 0x9 => self.begin_read_sector(byte),
            0xA | 0xB => self.begin_write_sector(byte),
            0xC => self.begin_read_address(),
            // Read Track / Write Track move raw track bitstreams, which
            // sector-level images cannot represent. Complete at once.
            _ => {
                self.status_kind = StatusKind::TypeII;
                self.record_not_found = false;
                self.write_protect_error = false;
                self.intrq = true;
            }
        }
    }

    #[must_use]
    pub fn read_track_reg(&self) -> u8 {
        self.track
    }

    pub fn write_track_reg(&mut self, byte: u8) {
        self.track = byte;
    }

    #[must_use]
    pub fn read_sector_reg(&self) -> u8 {
        self.sector
    }

    pub fn write_sector_reg(&mut self, byte: u8) {
        self.sector = byte;
    }

    /// Last value latched in the data register, without transfer side
    /// effects.
    #[must_use]
    pub fn data_reg(&self) -> u8 {
        self.data
    }

    /// Reads the data register. During a read transfer this consumes
    /// the next buffered byte; otherwise it returns the last latched
    /// value.
    pub fn read_data(&mut self) -> u8 {
        if matches!(self.transfer, Transfer::Reading | Transfer::ReadingAddress)
            && self.buffer_index < self.buffer.len()
        {
            let byte = self.buffer[self.buffer_index];
            self.buffer_index += 1;
            self.data = byte;
            if self.buffer_index == self.buffer.len() {
                match self.transfer {
                    Transfer::Reading if self.multiple => self.advance_multiple_read(),
                    Transfer::ReadingAddress => {
                        // The ID field writes its track number into the
                        // sector register on completion.
                        self.sector = self.head_track[self.drive];
                        self.finish_transfer();
                    }
                    _ => self.finish_transfer(),
                }
            }
        }
        self.data
    }

    /// Writes the data register. During a write transfer the byte joins
    /// the sector being assembled; the sector commits when full.
    pub fn write_data(&mut self, byte: u8) {
        self.data = byte;
        if self.transfer != Transfer::Writing {
            return;
        }
        self.buffer.push(byte);
        if self.buffer.len() < self.transfer_len {
            return;
        }
        self.commit_write();
        if self.multiple {
            self.sector = self.sector.wrapping_add(1);
            let head = self.head_track[self.drive];
            let next_exists = self.disks[self.drive]
                .as_ref()
                .is_some_and(|d| d.read_sector(head, self.side, self.sector).is_some());
            if next_exists {
                self.buffer.clear();
                return;
            }
            self.record_not_found = true;
        }
        self.finish_transfer();
    }

    fn begin_restore(&mut self, byte: u8) {
        let steps = u64::from(self.head_track[self.drive]).max(1);
        self.begin_type_i(0, steps, byte, true);
    }

    fn begin_seek(&mut self, byte: u8) {
        let target = self.data;
        let current = self.head_track[self.drive];
        if target > current {
            self.step_direction = 1;
        } else if target < current {
            self.step_direction = -1;
        }
        let steps = u64::from(current.abs_diff(target)).max(1);
        self.begin_type_i(target, steps, byte, true);
    }

    fn begin_step(&mut self, byte: u8, direction: i8) {
        self.step_direction = direction;
        let target = self.head_track[self.drive].saturating_add_signed(direction);
        let update = byte & 0x10 != 0;
        self.begin_type_i(target, 1, byte, update);
    }

    fn begin_type_i(&mut self, target: u8, steps: u64, byte: u8, update_track_reg: bool) {
        self.status_kind = StatusKind::TypeI;
        self.record_not_found = false;
        self.write_protect_error = false;
        self.busy = true;
        self.seek_target = target;
        self.update_track_reg = update_track_reg;
        let rate = STEP_RATE_MS[usize::from(byte & 0x03)];
        self.busy_cycles = steps * rate * CYCLES_PER_MS;
    }

    fn complete_type_i(&mut self) {
        self.head_track[self.drive] = self.seek_target;
        if self.update_track_reg {
            self.track = self.seek_target;
        }
        self.busy = false;
        self.intrq = true;
    }

    fn begin_read_sector(&mut self, byte: u8) {
        self.status_kind = StatusKind::TypeII;
        self.record_not_found = false;
        self.write_protect_error = false;
        self.multiple = byte & 0x10 != 0;
        let head = self.head_track[self.drive];
        let Some(disk) = self.disks[self.drive].as_ref() else {
            self.intrq = true;
            return;
        };
        if head >= disk.tracks() {
            self.fault = Some(FdcFault {
                drive: self.drive,
                track: head,
            });
            self.record_not_found = true;
            self.intrq = true;
            return;
        }
        match disk.read_sector(head, self.side, self.sector) {
            Some(bytes) => {
                self.buffer.clear();
                self.buffer.extend_from_slice(bytes);
                self.buffer_index = 0;
                self.transfer = Transfer::Reading;
                self.busy = true;
                self.drq = true;
            }
            None => {
                self.record_not_found = true;
                self.intrq = true;
            }
        }
    }

    fn begin_write_sector(&mut self, byte: u8) {
        self.status_kind = StatusKind::TypeII;
        self.record_not_found = false;
        self.write_protect_error = false;
        self.multiple = byte & 0x10 != 0;
        let head = self.head_track[self.drive];
        let Some(disk) = self.disks[self.drive].as_ref() else {
            self.intrq = true;
            return;
        };
        if head >= disk.tracks() {
            self.fault = Some(FdcFault {
                drive: self.drive,
                track: head,
            });
            self.record_not_found = true;
            self.intrq = true;
            return;
        }
        if disk.write_protected() {
            self.write_protect_error = true;
            self.intrq = true;
            return;
        }
        if disk.read_sector(head, self.side, self.sector).is_none() {
            self.record_not_found = true;
            self.intrq = true;
            return;
        }
        self.transfer_len = disk.sector_size();
        self.buffer.clear();
        self.buffer_index = 0;
        self.transfer = Transfer::Writing;
        self.busy = true;
        self.drq = true;
    }

    fn begin_read_address(&mut self) {
        self.status_kind = StatusKind::TypeII;
        self.record_not_found = false;
        self.write_protect_error = false;
        let head = self.head_track[self.drive];
        let Some(disk) = self.disks[self.drive].as_ref() else {
            self.intrq = true;
            return;
        };
        if head >= disk.tracks() {
            self.fault = Some(FdcFault {
                drive: self.drive,
                track: head,
            });
            self.record_not_found = true;
            self.intrq = true;
            return;
        }
        let size_code = match disk.sector_size() {
            128 => 0,
            256 => 1,
            512 => 2,
            _ => 3,
        };
        self.buffer.clear();
        self.buffer
            .extend_from_slice(&[head, self.side, 0, size_code, 0, 0]);
        self.buffer_index = 0;
        self.transfer = Transfer::ReadingAddress;
        self.busy = true;
        self.drq = true;
    }

    fn advance_multiple_read(&mut self) {
        self.sector = self.sector.wrapping_add(1);
        let head = self.head_track[self.drive];
        let next = self.disks[self.drive]
            .as_ref()
            .and_then(|d| d.read_sector(head, self.side, self.sector))
            .map(<[u8]>::to_vec);
        match next {
            Some(bytes) => {
                self.buffer = bytes;
                self.buffer_index = 0;
            }
            None => {
                // Past the last sector on the track, the ID search
                // fails and the command ends with Record Not Found.
                self.record_not_found = true;
                self.finish_transfer();
            }
        }
    }

    fn commit_write(&mut self) {
        let head = self.head_track[self.drive];
        let (side, sector) = (self.side, self.sector);
        if let Some(disk) = self.disks[self.drive].as_mut() {
            disk.write_sector(head, side, sector, &self.buffer);
        }
    }

    fn force_interrupt(&mut self, byte: u8) {
        self.command = byte;
        self.busy = false;
        self.busy_cycles = 0;
        self.drq = false;
        self.transfer = Transfer::None;
        self.buffer.clear();
        self.buffer_index = 0;
        self.status_kind = StatusKind::TypeI;
        // The low nibble selects interrupt conditions; any set bit is
        // treated as an immediate interrupt request, plain D0h only
        // terminates.
        if byte & 0x0F != 0 {
            self.intrq = true;
        }
    }

    fn finish_transfer(&mut self) {
        self.transfer = Transfer::None;
        self.busy = false;
        self.drq = false;
        self.buffer.clear();
        self.buffer_index = 0;
        self.intrq = true;
    }
}

impl Default for Fd1793 {
    fn default() -> Self {
        Self::new()
    }
}
