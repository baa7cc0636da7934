//! Machine facade.
//!
//! [`Trs80`] owns the machine in one of two homes: stopped, the
//! [`CoreState`] sits here and operations touch it directly; running,
//! the state lives on the scheduler thread and operations travel as
//! commands executed between instructions. Either way nothing observes
//! the machine mid-instruction. `start` hands the state over and
//! returns once the loop is live; `stop` raises the stop flag and
//! joins, and the join is the suspension acknowledgement.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use wd_fd1793::Disk;
use zilog_z80::{InstructionTable, Registers, disasm};

use crate::bus::Trs80Bus;
use crate::config::Trs80Config;
use crate::scheduler::{
    self, ClockMode, Command, CoreState, Scheduler, SchedulerEvent, Shared, TraceRecord,
};
use crate::snapshot::{self, SnapshotError};
use crate::video::{self, VideoFrame};

/// How often the waiting helpers poll their condition.
const WAIT_POLL: Duration = Duration::from_millis(1);

pub struct Trs80 {
    core: Option<CoreState>,
    thread: Option<JoinHandle<CoreState>>,
    shared: Shared,
    commands: Option<Sender<Command>>,
    events: Option<Receiver<SchedulerEvent>>,
    pending: VecDeque<SchedulerEvent>,
    table: InstructionTable,
}

impl Trs80 {
    /// Builds a stopped machine.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is unusable (for now: a ROM image
    /// that does not fit its socket).
    pub fn new(config: &Trs80Config) -> Result<Self, String> {
        let bus = Trs80Bus::new(config)?;
        Ok(Self {
            core: Some(CoreState::new(bus)),
            thread: None,
            shared: Shared::new(),
            commands: None,
            events: None,
            pending: VecDeque::new(),
            table: InstructionTable::new(),
        })
    }

    #[must_use]
    pub fn running(&self) -> bool {
        self.thread.is_some()
    }

    /// Moves the machine onto the scheduler thread. Returns once the
    /// loop is live; a no-op if already running.
    pub fn start(&mut self) {
        if self.thread.is_some() {
            return;
        }
        let Some(state) = self.core.take() else {
            return;
        };
        self.drain_events();
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        self.shared.controls.stop.store(false, Ordering::Relaxed);
        let shared = self.shared.clone();
        let handle = thread::spawn(move || {
            let scheduler = Scheduler::new(state, shared, command_rx, event_tx);
            let _ = ready_tx.send(());
            scheduler.run()
        });
        self.thread = Some(handle);
        self.commands = Some(command_tx);
        self.events = Some(event_rx);
        let _ = ready_rx.recv();
    }

    /// Stops the scheduler thread and takes the machine state back.
    /// Returns only after the loop has fully suspended; a no-op if
    /// already stopped.
    pub fn stop(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        self.shared.controls.stop.store(true, Ordering::Relaxed);
        // Dropping the sender also wakes a paused loop.
        self.commands = None;
        if let Ok(state) = handle.join() {
            self.core = Some(state);
        }
        self.shared.controls.stop.store(false, Ordering::Relaxed);
        self.drain_events();
        self.events = None;
    }

    /// Suspends execution at the next instruction boundary. The
    /// machine stays on its thread; returns once the loop has
    /// acknowledged. A no-op while stopped.
    pub fn pause(&self) {
        if let Some(commands) = &self.commands {
            let (ack_tx, ack_rx) = mpsc::channel();
            if commands.send(Command::Pause(ack_tx)).is_ok() {
                let _ = ack_rx.recv();
            }
        }
    }

    pub fn resume(&self) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(Command::Resume);
        }
    }

    /// Sets or clears the single breakpoint. Effective immediately,
    /// running or stopped.
    pub fn set_breakpoint(&self, address: u16, enabled: bool) {
        self.shared.controls.set_breakpoint(address, enabled);
    }

    pub fn set_trace(&self, enabled: bool) {
        self.shared.controls.trace.store(enabled, Ordering::Relaxed);
    }

    pub fn set_clock_mode(&self, mode: ClockMode) {
        let unlimited = mode == ClockMode::Unlimited;
        self.shared.controls.unlimited.store(unlimited, Ordering::Relaxed);
    }

    /// Cycles executed since power-on or the last restore.
    #[must_use]
    pub fn step_cycles_elapsed(&self) -> u64 {
        if let Some(core) = &self.core {
            return core.cycles;
        }
        self.shared.controls.cycles.load(Ordering::Relaxed)
    }

    /// Traced instructions, oldest first.
    #[must_use]
    pub fn trace_history(&self) -> Vec<TraceRecord> {
        self.shared
            .trace
            .lock()
            .map(|ring| ring.to_vec())
            .unwrap_or_default()
    }

    /// Serializes the machine.
    ///
    /// # Errors
    ///
    /// Fails only if the machine state has been lost to a scheduler
    /// panic.
    pub fn snapshot_save(&self) -> Result<Vec<u8>, SnapshotError> {
        if let Some(core) = &self.core {
            return Ok(snapshot::capture(core));
        }
        if let Some(commands) = &self.commands {
            let (tx, rx) = mpsc::channel();
            if commands.send(Command::SnapshotSave(tx)).is_ok() {
                if let Ok(image) = rx.recv() {
                    return Ok(image);
                }
            }
        }
        Err(SnapshotError::Incompatible(
            "machine state is unavailable".into(),
        ))
    }

    /// Replaces the machine with a snapshot image. A rejected image
    /// leaves the current state untouched.
    ///
    /// # Errors
    ///
    /// Any [`SnapshotError`] from validation.
    pub fn snapshot_restore(&mut self, bytes: &[u8], version: u8) -> Result<(), SnapshotError> {
        if let Some(core) = &mut self.core {
            let snap = snapshot::parse(bytes, version, core.bus.model())?;
            snap.apply(core);
            return Ok(());
        }
        if let Some(commands) = &self.commands {
            let (tx, rx) = mpsc::channel();
            let command = Command::SnapshotRestore {
                bytes: bytes.to_vec(),
                version,
                reply: tx,
            };
            if commands.send(command).is_ok() {
                if let Ok(result) = rx.recv() {
                    return result;
                }
            }
        }
        Err(SnapshotError::Incompatible(
            "machine state is unavailable".into(),
        ))
    }

    /// Asserts the NMI line for one acceptance, as the front-panel
    /// reset button does.
    pub fn request_nonmaskable_interrupt(&mut self) {
        if let Some(core) = &mut self.core {
            core.ints.request_nonmaskable();
            return;
        }
        if let Some(commands) = &self.commands {
            let _ = commands.send(Command::Nmi);
        }
    }

    /// Stores object code, bypassing ROM write protection, and
    /// optionally redirects execution to `entry`.
    ///
    /// # Errors
    ///
    /// Fails if the program runs past the top of memory.
    pub fn load_program(
        &mut self,
        org: u16,
        bytes: &[u8],
        entry: Option<u16>,
    ) -> Result<(), String> {
        if usize::from(org) + bytes.len() > 0x10000 {
            return Err(format!(
                "program of {} bytes at {org:#06x} runs past the top of memory",
                bytes.len()
            ));
        }
        if let Some(core) = &mut self.core {
            scheduler::apply_load_program(core, org, bytes, entry);
            return Ok(());
        }
        if let Some(commands) = &self.commands {
            let (done_tx, done_rx) = mpsc::channel();
            let command = Command::LoadProgram {
                org,
                bytes: bytes.to_vec(),
                entry,
                done: done_tx,
            };
            if commands.send(command).is_ok() {
                let _ = done_rx.recv();
                return Ok(());
            }
        }
        Err("machine state is unavailable".into())
    }

    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.peek_block(address, 1)[0]
    }

    /// Reads a block of memory without side effects. Returns `0xFF`
    /// filler if the machine state has been lost.
    #[must_use]
    pub fn peek_block(&self, start: u16, len: usize) -> Vec<u8> {
        if let Some(core) = &self.core {
            return scheduler::peek_block(&core.bus, start, len);
        }
        if let Some(commands) = &self.commands {
            let (tx, rx) = mpsc::channel();
            if commands.send(Command::Peek { start, len, reply: tx }).is_ok() {
                if let Ok(block) = rx.recv() {
                    return block;
                }
            }
        }
        vec![0xFF; len]
    }

    #[must_use]
    pub fn registers(&self) -> Registers {
        if let Some(core) = &self.core {
            return core.cpu.regs.clone();
        }
        if let Some(commands) = &self.commands {
            let (tx, rx) = mpsc::channel();
            if commands.send(Command::GetRegisters(tx)).is_ok() {
                if let Ok(regs) = rx.recv() {
                    return regs;
                }
            }
        }
        Registers::new()
    }

    /// The video window as text: stopped, straight out of memory;
    /// running, the copy published at the last frame boundary.
    #[must_use]
    pub fn screen_text(&self) -> String {
        if let Some(core) = &self.core {
            return video::screen_text(&core.bus.video_window());
        }
        self.shared
            .frame
            .lock()
            .map(|frame| video::screen_text(&frame.cells))
            .unwrap_or_default()
    }

    /// The published frame counter, for staleness checks.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.shared.frame.lock().map(|frame| frame.frame).unwrap_or(0)
    }

    pub fn press_key(&mut self, row: usize, bit: u8) {
        self.set_key(row, bit, true);
    }

    pub fn release_key(&mut self, row: usize, bit: u8) {
        self.set_key(row, bit, false);
    }

    fn set_key(&mut self, row: usize, bit: u8, pressed: bool) {
        if let Some(core) = &mut self.core {
            core.bus.keyboard.set_key(row, bit, pressed);
            return;
        }
        if let Some(commands) = &self.commands {
            let _ = commands.send(Command::Key { row, bit, pressed });
        }
    }

    /// Mounts a digitised cassette input tape.
    pub fn load_cassette(&mut self, levels: Vec<(u64, bool)>) {
        if let Some(core) = &mut self.core {
            core.bus.cassette.load_levels(levels);
            return;
        }
        if let Some(commands) = &self.commands {
            let _ = commands.send(Command::LoadCassette(levels));
        }
    }

    pub fn insert_disk(&mut self, drive: usize, disk: Disk) {
        if let Some(core) = &mut self.core {
            core.bus.fdc.insert_disk(drive, disk);
            return;
        }
        if let Some(commands) = &self.commands {
            let _ = commands.send(Command::InsertDisk { drive, disk });
        }
    }

    /// Takes the cassette audio drained so far.
    pub fn take_audio(&mut self) -> Vec<f32> {
        self.shared
            .audio
            .lock()
            .map(|mut sink| std::mem::take(&mut *sink))
            .unwrap_or_default()
    }

    /// Next breakpoint or fault notification, if one is waiting.
    pub fn poll_event(&mut self) -> Option<SchedulerEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        self.events.as_ref()?.try_recv().ok()
    }

    /// Polls until the CPU halts or the timeout passes.
    pub fn wait_for_halt(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(core) = &self.core {
                return core.cpu.regs.halted;
            }
            if self.shared.controls.halted.load(Ordering::Relaxed) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(WAIT_POLL);
        }
    }

    /// Waits for the breakpoint to hit, returning the paused PC. Other
    /// events arriving meanwhile stay queued for [`Trs80::poll_event`].
    pub fn wait_for_breakpoint(&mut self, timeout: Duration) -> Option<u16> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(pos) = self
                .pending
                .iter()
                .position(|event| matches!(event, SchedulerEvent::Breakpoint { .. }))
            {
                if let Some(SchedulerEvent::Breakpoint { pc }) = self.pending.remove(pos) {
                    return Some(pc);
                }
            }
            let events = self.events.as_ref()?;
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            match events.recv_timeout(deadline - now) {
                Ok(SchedulerEvent::Breakpoint { pc }) => return Some(pc),
                Ok(other) => self.pending.push_back(other),
                Err(_) => return None,
            }
        }
    }

    /// Power-on reset: Z80 reset state, peripherals reset, cycle
    /// counter and trace cleared. RAM and mounted media survive. Stops
    /// the machine first if it is running.
    pub fn reset(&mut self) {
        if self.running() {
            self.stop();
        }
        if let Some(core) = &mut self.core {
            core.reset();
        }
        self.shared.controls.cycles.store(0, Ordering::Relaxed);
        self.shared.controls.halted.store(false, Ordering::Relaxed);
        if let Ok(mut ring) = self.shared.trace.lock() {
            ring.clear();
        }
        if let Ok(mut sink) = self.shared.audio.lock() {
            sink.clear();
        }
        if let Ok(mut frame) = self.shared.frame.lock() {
            *frame = VideoFrame::new();
        }
        self.pending.clear();
    }

    /// Decodes `count` instructions starting at `start`.
    #[must_use]
    pub fn disassemble(&self, start: u16, count: usize) -> Vec<String> {
        let mut out = Vec::with_capacity(count);
        let mut pc = start;
        for _ in 0..count {
            let block = self.peek_block(pc, 4);
            let raw = [block[0], block[1], block[2], block[3]];
            let instr = self.table.lookup(raw[0], raw[1], raw[3]);
            out.push(disasm::disassemble(instr, pc, &raw));
            pc = pc.wrapping_add(u16::from(instr.size));
        }
        out
    }

    fn drain_events(&mut self) {
        if let Some(events) = &self.events {
            while let Ok(event) = events.try_recv() {
                self.pending.push_back(event);
            }
        }
    }
}

impl Drop for Trs80 {
    fn drop(&mut self) {
        self.stop();
    }
}
