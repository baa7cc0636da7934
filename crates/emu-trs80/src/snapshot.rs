//! Snapshot capture and restore.
//!
//! A snapshot is a single versioned byte image of the whole machine:
//! CPU registers, interrupt plumbing, the cycle counter, all 64K of
//! memory, and peripheral electronics. Mounted media (disk images, the
//! cassette input tape) is external and travels separately; an FDC
//! transfer in flight at capture time does not survive restore, same
//! as a force interrupt.
//!
//! Layout, all integers little-endian:
//!
//! | Offset | Bytes | Contents                                    |
//! |--------|-------|---------------------------------------------|
//! | 0      | 4     | magic `T80S`                                |
//! | 4      | 1     | layout version                              |
//! | 5      | 1     | model byte                                  |
//! | 6      | 16    | register banks 0 and 1 (A F B C D E H L)    |
//! | 22     | 2     | AF and BC/DE/HL bank indexes                |
//! | 24     | 8     | IX, IY, SP, PC                              |
//! | 32     | 2     | I, R                                        |
//! | 34     | 5     | IFF1, IFF2, IM, halted, EI pending          |
//! | 39     | 3     | INT line, NMI pending, interrupt data bus   |
//! | 42     | 8     | cycle counter                               |
//! | 50     | 65536 | memory                                      |
//! | 65586  | 8     | keyboard rows                               |
//! | 65594  | 2     | cassette motor, output level                |
//! | 65596  | 3     | interrupt mask, NMI mask, drive select      |
//! | 65599  | 9     | heartbeat countdown, heartbeat latch        |
//! | 65608  | 9     | FDC track/sector/data, drive, side, heads   |
//!
//! Every validation failure is reported before anything is applied, so
//! a rejected image leaves the machine exactly as it was.

use thiserror::Error;
use zilog_z80::Bank;

use crate::bus::Trs80Bus;
use crate::config::Trs80Model;
use crate::scheduler::CoreState;

const MAGIC: [u8; 4] = *b"T80S";

/// Layout generation written by [`capture`].
pub const SNAPSHOT_VERSION: u8 = 1;

/// Exact length of a version-1 image.
pub const SNAPSHOT_LEN: usize = 65_617;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// Wrong layout generation or wrong machine.
    #[error("incompatible snapshot: {0}")]
    Incompatible(String),
    /// The image ends before the layout does.
    #[error("truncated snapshot: needs {needed} bytes, got {have}")]
    Truncated { needed: usize, have: usize },
    /// Structurally impossible content.
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Serializes the machine.
#[must_use]
pub fn capture(state: &CoreState) -> Vec<u8> {
    let mut out = Vec::with_capacity(SNAPSHOT_LEN);
    out.extend_from_slice(&MAGIC);
    out.push(SNAPSHOT_VERSION);
    out.push(state.bus.model().snapshot_byte());

    let regs = &state.cpu.regs;
    for index in 0..2 {
        let bank = regs.bank(index);
        out.extend_from_slice(&[
            bank.a, bank.f, bank.b, bank.c, bank.d, bank.e, bank.h, bank.l,
        ]);
    }
    out.push(regs.af_bank_index());
    out.push(regs.gp_bank_index());
    out.extend_from_slice(&regs.ix.to_le_bytes());
    out.extend_from_slice(&regs.iy.to_le_bytes());
    out.extend_from_slice(&regs.sp.to_le_bytes());
    out.extend_from_slice(&regs.pc.to_le_bytes());
    out.push(regs.i);
    out.push(regs.r);
    out.push(u8::from(regs.iff1));
    out.push(u8::from(regs.iff2));
    out.push(regs.im);
    out.push(u8::from(regs.halted));
    out.push(u8::from(state.cpu.ei_pending()));

    out.push(u8::from(state.ints.maskable_pending()));
    out.push(u8::from(state.ints.nonmaskable_pending()));
    out.push(state.ints.data_bus());
    out.extend_from_slice(&state.cycles.to_le_bytes());

    out.extend_from_slice(state.bus.memory());
    out.extend_from_slice(&state.bus.keyboard.rows());
    out.push(u8::from(state.bus.cassette.motor()));
    out.push(state.bus.cassette.output_level());
    out.push(state.bus.int_mask);
    out.push(state.bus.nmi_mask);
    out.push(state.bus.drive_select);
    out.extend_from_slice(&state.bus.rtc.countdown().to_le_bytes());
    out.push(u8::from(state.bus.rtc.pending()));

    let fdc = &state.bus.fdc;
    out.push(fdc.read_track_reg());
    out.push(fdc.read_sector_reg());
    out.push(fdc.data_reg());
    out.push(fdc.selected_drive() as u8);
    out.push(fdc.selected_side());
    for drive in 0..4 {
        out.push(fdc.head_track(drive));
    }
    out
}

/// A fully validated image, ready to apply.
#[derive(Debug)]
pub struct Snapshot {
    banks: [Bank; 2],
    af_bank: u8,
    gp_bank: u8,
    ix: u16,
    iy: u16,
    sp: u16,
    pc: u16,
    i: u8,
    r: u8,
    iff1: bool,
    iff2: bool,
    im: u8,
    halted: bool,
    ei_pending: bool,
    int_line: bool,
    nmi_pending: bool,
    data_bus: u8,
    cycles: u64,
    memory: Box<[u8; 0x10000]>,
    keyboard_rows: [u8; 8],
    cassette_motor: bool,
    cassette_level: u8,
    int_mask: u8,
    nmi_mask: u8,
    drive_select: u8,
    rtc_countdown: u64,
    rtc_latched: bool,
    fdc_track: u8,
    fdc_sector: u8,
    fdc_data: u8,
    fdc_drive: u8,
    fdc_side: u8,
    fdc_heads: [u8; 4],
}

/// Validates an image against the expected version and machine model.
///
/// # Errors
///
/// [`SnapshotError::Incompatible`] for a version or model mismatch,
/// [`SnapshotError::Truncated`] if the image ends early, and
/// [`SnapshotError::Corrupt`] for content no capture could produce.
pub fn parse(data: &[u8], version: u8, model: Trs80Model) -> Result<Snapshot, SnapshotError> {
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Incompatible(format!(
            "version {version} is not supported by this build"
        )));
    }
    let mut r = Reader::new(data);
    if r.take(4)? != MAGIC {
        return Err(SnapshotError::Corrupt("magic bytes missing".into()));
    }
    let file_version = r.u8()?;
    if file_version != version {
        return Err(SnapshotError::Incompatible(format!(
            "snapshot is version {file_version}, expected {version}"
        )));
    }
    let model_byte = r.u8()?;
    match Trs80Model::from_snapshot_byte(model_byte) {
        Some(file_model) if file_model == model => {}
        _ => {
            return Err(SnapshotError::Incompatible(format!(
                "snapshot is for a different machine (model byte {model_byte:#04x})"
            )));
        }
    }

    let mut banks = [Bank::default(); 2];
    for bank in &mut banks {
        let bytes = r.take(8)?;
        *bank = Bank {
            a: bytes[0],
            f: bytes[1],
            b: bytes[2],
            c: bytes[3],
            d: bytes[4],
            e: bytes[5],
            h: bytes[6],
            l: bytes[7],
        };
    }
    let af_bank = r.u8()?;
    let gp_bank = r.u8()?;
    if af_bank > 1 || gp_bank > 1 {
        return Err(SnapshotError::Corrupt("bank index out of range".into()));
    }
    let ix = r.u16()?;
    let iy = r.u16()?;
    let sp = r.u16()?;
    let pc = r.u16()?;
    let i = r.u8()?;
    let reg_r = r.u8()?;
    let iff1 = r.flag()?;
    let iff2 = r.flag()?;
    let im = r.u8()?;
    if im > 2 {
        return Err(SnapshotError::Corrupt(format!("interrupt mode {im}")));
    }
    let halted = r.flag()?;
    let ei_pending = r.flag()?;
    let int_line = r.flag()?;
    let nmi_pending = r.flag()?;
    let data_bus = r.u8()?;
    let cycles = r.u64()?;

    let mut memory = Box::new([0u8; 0x10000]);
    memory.copy_from_slice(r.take(0x10000)?);
    let mut keyboard_rows = [0u8; 8];
    keyboard_rows.copy_from_slice(r.take(8)?);
    let cassette_motor = r.flag()?;
    let cassette_level = r.u8()?;
    if cassette_level > 3 {
        return Err(SnapshotError::Corrupt(format!(
            "cassette level {cassette_level} out of range"
        )));
    }
    let int_mask = r.u8()?;
    let nmi_mask = r.u8()?;
    let drive_select = r.u8()?;
    let rtc_countdown = r.u64()?;
    let rtc_latched = r.flag()?;

    let fdc_track = r.u8()?;
    let fdc_sector = r.u8()?;
    let fdc_data = r.u8()?;
    let fdc_drive = r.u8()?;
    if fdc_drive > 3 {
        return Err(SnapshotError::Corrupt(format!("drive {fdc_drive} out of range")));
    }
    let fdc_side = r.u8()?;
    if fdc_side > 1 {
        return Err(SnapshotError::Corrupt(format!("side {fdc_side} out of range")));
    }
    let mut fdc_heads = [0u8; 4];
    fdc_heads.copy_from_slice(r.take(4)?);

    if r.remaining() != 0 {
        return Err(SnapshotError::Corrupt(format!(
            "{} trailing bytes",
            r.remaining()
        )));
    }

    Ok(Snapshot {
        banks,
        af_bank,
        gp_bank,
        ix,
        iy,
        sp,
        pc,
        i,
        r: reg_r,
        iff1,
        iff2,
        im,
        halted,
        ei_pending,
        int_line,
        nmi_pending,
        data_bus,
        cycles,
        memory,
        keyboard_rows,
        cassette_motor,
        cassette_level,
        int_mask,
        nmi_mask,
        drive_select,
        rtc_countdown,
        rtc_latched,
        fdc_track,
        fdc_sector,
        fdc_data,
        fdc_drive,
        fdc_side,
        fdc_heads,
    })
}

impl Snapshot {
    /// Overwrites the machine with the image.
    pub fn apply(&self, state: &mut CoreState) {
        let regs = &mut state.cpu.regs;
        regs.set_bank(0, self.banks[0]);
        regs.set_bank(1, self.banks[1]);
        regs.set_af_bank_index(self.af_bank);
        regs.set_gp_bank_index(self.gp_bank);
        regs.ix = self.ix;
        regs.iy = self.iy;
        regs.sp = self.sp;
        regs.pc = self.pc;
        regs.i = self.i;
        regs.r = self.r;
        regs.iff1 = self.iff1;
        regs.iff2 = self.iff2;
        regs.im = self.im;
        regs.halted = self.halted;
        state.cpu.set_ei_pending(self.ei_pending);

        state.ints.restore(self.int_line, self.nmi_pending, self.data_bus);
        state.cycles = self.cycles;

        state.bus.restore_memory(&self.memory);
        state.bus.keyboard.set_rows(self.keyboard_rows);
        state.bus.cassette.restore(self.cassette_motor, self.cassette_level);
        state.bus.int_mask = self.int_mask;
        state.bus.nmi_mask = self.nmi_mask;
        state.bus.drive_select = self.drive_select;
        state.bus.rtc.restore(self.rtc_countdown, self.rtc_latched);

        self.apply_fdc(&mut state.bus);
    }

    /// Registers and head positions come back; a transfer in flight at
    /// capture time is terminated, and mounted disks stay as they are.
    fn apply_fdc(&self, bus: &mut Trs80Bus) {
        bus.fdc.reset();
        bus.fdc.write_track_reg(self.fdc_track);
        bus.fdc.write_sector_reg(self.fdc_sector);
        bus.fdc.write_data(self.fdc_data);
        bus.fdc.select_drive(usize::from(self.fdc_drive));
        bus.fdc.select_side(self.fdc_side);
        for (drive, &track) in self.fdc_heads.iter().enumerate() {
            bus.fdc.set_head_track(drive, track);
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(SnapshotError::Truncated {
                needed: end,
                have: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, SnapshotError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u64(&mut self) -> Result<u64, SnapshotError> {
        let bytes = self.take(8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(word))
    }

    fn flag(&mut self) -> Result<bool, SnapshotError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SnapshotError::Corrupt(format!(
                "flag byte {other:#04x} is neither 0 nor 1"
            ))),
        }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}
