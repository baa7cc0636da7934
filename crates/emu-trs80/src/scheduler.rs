//! Execution thread and pacing.
//!
//! The machine moves its [`CoreState`] into a dedicated thread when it
//! starts and receives it back when the thread joins. Between
//! instructions the loop drains the command queue, resynchronizes the
//! interrupt lines, evaluates the breakpoint, and at every frame
//! boundary publishes the video window, drains cassette samples, and
//! (in [`ClockMode::Normal`]) paces against the wall clock. Pacing
//! sleeps are capped at two milliseconds and re-check the stop flag, so
//! stop and pause take effect promptly even when the loop is far ahead
//! of real time.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use emu_core::{Bus, Cpu, MasterClock, RingHistory};
use wd_fd1793::Disk;
use zilog_z80::{InterruptController, Registers, Z80, disasm};

use crate::bus::{PeripheralFault, Trs80Bus};
use crate::config::{CLOCK_HZ, CYCLES_PER_FRAME};
use crate::snapshot::{self, SnapshotError};
use crate::video::VideoFrame;

/// Instruction records kept by the trace ring.
pub const TRACE_CAPACITY: usize = 128;

/// Upper bound on one pacing sleep.
const MAX_SLEEP: Duration = Duration::from_millis(2);

/// How long a paused loop blocks on the command queue per wait.
const PAUSE_POLL: Duration = Duration::from_millis(5);

/// Enable flag in the packed breakpoint word.
const BREAKPOINT_ENABLED: u32 = 1 << 16;

/// How execution time relates to wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// Real time: cycle counts convert to wall-clock deadlines.
    Normal,
    /// As fast as the host allows.
    Unlimited,
}

/// One traced instruction boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    /// Machine cycle count when the instruction began.
    pub cycles: u64,
    pub pc: u16,
    /// Disassembled text of the instruction.
    pub text: String,
}

/// Requests the machine sends into the running loop.
pub enum Command {
    Pause(Sender<()>),
    Resume,
    Nmi,
    Key { row: usize, bit: u8, pressed: bool },
    LoadCassette(Vec<(u64, bool)>),
    InsertDisk { drive: usize, disk: Disk },
    LoadProgram { org: u16, bytes: Vec<u8>, entry: Option<u16>, done: Sender<()> },
    Peek { start: u16, len: usize, reply: Sender<Vec<u8>> },
    GetRegisters(Sender<Registers>),
    SnapshotSave(Sender<Vec<u8>>),
    SnapshotRestore { bytes: Vec<u8>, version: u8, reply: Sender<Result<(), SnapshotError>> },
}

/// Notifications the loop sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// The program counter reached the breakpoint; the loop is paused.
    Breakpoint { pc: u16 },
    /// A peripheral raised a non-fatal fault; execution continued.
    Fault(PeripheralFault),
}

/// Flags shared between the machine facade and the loop. Everything
/// here is safe to poke while the thread runs; the loop reads them at
/// instruction boundaries.
pub struct Controls {
    pub stop: AtomicBool,
    pub trace: AtomicBool,
    pub unlimited: AtomicBool,
    /// Packed breakpoint: low 16 bits address, bit 16 enable. One
    /// word, so address and enable never tear.
    pub breakpoint: AtomicU32,
    pub cycles: AtomicU64,
    pub halted: AtomicBool,
}

impl Controls {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            trace: AtomicBool::new(false),
            unlimited: AtomicBool::new(false),
            breakpoint: AtomicU32::new(0),
            cycles: AtomicU64::new(0),
            halted: AtomicBool::new(false),
        }
    }

    pub fn set_breakpoint(&self, address: u16, enabled: bool) {
        let word = if enabled {
            u32::from(address) | BREAKPOINT_ENABLED
        } else {
            0
        };
        self.breakpoint.store(word, Ordering::Relaxed);
    }

    fn breakpoint_hit(&self, pc: u16) -> bool {
        let word = self.breakpoint.load(Ordering::Relaxed);
        word & BREAKPOINT_ENABLED != 0 && (word & 0xFFFF) as u16 == pc
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::new()
    }
}

/// Handles to state published by the loop.
#[derive(Clone)]
pub struct Shared {
    pub controls: Arc<Controls>,
    pub frame: Arc<Mutex<VideoFrame>>,
    pub trace: Arc<Mutex<RingHistory<TraceRecord>>>,
    pub audio: Arc<Mutex<Vec<f32>>>,
}

impl Shared {
    #[must_use]
    pub fn new() -> Self {
        Self {
            controls: Arc::new(Controls::new()),
            frame: Arc::new(Mutex::new(VideoFrame::new())),
            trace: Arc::new(Mutex::new(RingHistory::new(TRACE_CAPACITY))),
            audio: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}

/// The complete machine state. Owned by the machine while stopped and
/// by the scheduler thread while running; never shared.
pub struct CoreState {
    pub cpu: Z80,
    pub bus: Trs80Bus,
    pub ints: InterruptController,
    /// Cycles executed since power-on or the last restored snapshot.
    pub cycles: u64,
}

impl CoreState {
    #[must_use]
    pub fn new(bus: Trs80Bus) -> Self {
        Self {
            cpu: Z80::new(),
            bus,
            ints: InterruptController::new(),
            cycles: 0,
        }
    }

    /// Power-on reset. RAM and mounted media survive.
    pub fn reset(&mut self) {
        self.cpu = Z80::new();
        self.bus.reset();
        self.ints = InterruptController::new();
        self.cycles = 0;
    }

    /// One instruction boundary: deliver at most one interrupt, then
    /// execute. Returns the cycles consumed.
    pub fn step_once(&mut self) -> u32 {
        let mut consumed = 0;
        if let Some(cost) = self.ints.service(&mut self.cpu, &mut self.bus) {
            self.bus.tick(cost);
            consumed += cost;
        }
        let cycles = self.cpu.step(&mut self.bus);
        self.bus.tick(cycles);
        consumed += cycles;
        self.cycles += u64::from(consumed);
        consumed
    }
}

/// The loop itself. Constructed on the machine thread, consumed by
/// [`Scheduler::run`] on the scheduler thread.
pub struct Scheduler {
    state: CoreState,
    shared: Shared,
    commands: Receiver<Command>,
    events: Sender<SchedulerEvent>,
    clock: MasterClock,
    paused: bool,
    /// Wall-clock origin for pacing, rebased whenever real time and
    /// machine time diverge on purpose (resume, mode change, restore).
    anchor: Instant,
    anchor_cycles: u64,
    next_frame: u64,
    was_unlimited: bool,
    /// Last observed level of the NMI line, for edge detection.
    nmi_level: bool,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        state: CoreState,
        shared: Shared,
        commands: Receiver<Command>,
        events: Sender<SchedulerEvent>,
    ) -> Self {
        let next_frame = (state.cycles / CYCLES_PER_FRAME + 1) * CYCLES_PER_FRAME;
        let anchor_cycles = state.cycles;
        let nmi_level = state.bus.nmi_line();
        let was_unlimited = shared.controls.unlimited.load(Ordering::Relaxed);
        Self {
            state,
            shared,
            commands,
            events,
            clock: MasterClock::new(CLOCK_HZ),
            paused: false,
            anchor: Instant::now(),
            anchor_cycles,
            next_frame,
            was_unlimited,
            nmi_level,
        }
    }

    /// Runs until the stop flag is raised, then returns the state.
    pub fn run(mut self) -> CoreState {
        self.rebase();
        self.publish_counters();
        loop {
            if self.shared.controls.stop.load(Ordering::Relaxed) {
                break;
            }
            loop {
                match self.commands.try_recv() {
                    Ok(cmd) => self.handle(cmd),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.shared.controls.stop.store(true, Ordering::Relaxed);
                        break;
                    }
                }
            }
            if self.shared.controls.stop.load(Ordering::Relaxed) {
                break;
            }
            if self.paused {
                self.wait_while_paused();
                continue;
            }
            let unlimited = self.shared.controls.unlimited.load(Ordering::Relaxed);
            if unlimited != self.was_unlimited {
                self.was_unlimited = unlimited;
                self.rebase();
            }
            self.execute_one(unlimited);
        }
        self.publish_frame();
        self.drain_audio();
        self.publish_counters();
        self.state
    }

    fn wait_while_paused(&mut self) {
        match self.commands.recv_timeout(PAUSE_POLL) {
            Ok(cmd) => self.handle(cmd),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                self.shared.controls.stop.store(true, Ordering::Relaxed);
            }
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Pause(ack) => {
                self.paused = true;
                let _ = ack.send(());
            }
            Command::Resume => {
                if self.paused {
                    self.paused = false;
                    self.rebase();
                }
            }
            Command::Nmi => self.state.ints.request_nonmaskable(),
            Command::Key { row, bit, pressed } => {
                self.state.bus.keyboard.set_key(row, bit, pressed);
            }
            Command::LoadCassette(levels) => self.state.bus.cassette.load_levels(levels),
            Command::InsertDisk { drive, disk } => self.state.bus.fdc.insert_disk(drive, disk),
            Command::LoadProgram { org, bytes, entry, done } => {
                apply_load_program(&mut self.state, org, &bytes, entry);
                let _ = done.send(());
            }
            Command::Peek { start, len, reply } => {
                let _ = reply.send(peek_block(&self.state.bus, start, len));
            }
            Command::GetRegisters(reply) => {
                let _ = reply.send(self.state.cpu.regs.clone());
            }
            Command::SnapshotSave(reply) => {
                let _ = reply.send(snapshot::capture(&self.state));
            }
            Command::SnapshotRestore { bytes, version, reply } => {
                let model = self.state.bus.model();
                let result = snapshot::parse(&bytes, version, model).map(|snap| {
                    snap.apply(&mut self.state);
                    self.nmi_level = self.state.bus.nmi_line();
                    self.rebase();
                    self.publish_counters();
                    self.publish_frame();
                });
                let _ = reply.send(result);
            }
        }
    }

    /// Resets the pacing origin to "now" and realigns the next frame
    /// boundary with the current cycle count.
    fn rebase(&mut self) {
        self.anchor = Instant::now();
        self.anchor_cycles = self.state.cycles;
        self.next_frame = (self.state.cycles / CYCLES_PER_FRAME + 1) * CYCLES_PER_FRAME;
    }

    fn execute_one(&mut self, unlimited: bool) {
        self.sync_interrupt_lines();

        if let Some(cost) = self.state.ints.service(&mut self.state.cpu, &mut self.state.bus) {
            self.state.bus.tick(cost);
            self.state.cycles += u64::from(cost);
            let pc = self.state.cpu.regs.pc;
            if self.shared.controls.breakpoint_hit(pc) {
                // Paused on the vector itself, before its first
                // instruction runs.
                self.publish_counters();
                self.paused = true;
                let _ = self.events.send(SchedulerEvent::Breakpoint { pc });
                return;
            }
        }

        let tracing = self.shared.controls.trace.load(Ordering::Relaxed);
        let record = if tracing && !self.state.cpu.regs.halted {
            Some(self.make_record())
        } else {
            None
        };

        let cycles = self.state.cpu.step(&mut self.state.bus);
        self.state.bus.tick(cycles);
        self.state.cycles += u64::from(cycles);
        self.publish_counters();

        if let Some(rec) = record {
            if let Ok(mut ring) = self.shared.trace.lock() {
                ring.push(rec);
            }
        }

        if let Some(fault) = self.state.bus.take_fault() {
            let _ = self.events.send(SchedulerEvent::Fault(fault));
        }

        let pc = self.state.cpu.regs.pc;
        if self.shared.controls.breakpoint_hit(pc) {
            self.paused = true;
            let _ = self.events.send(SchedulerEvent::Breakpoint { pc });
        }

        if self.state.cycles >= self.next_frame {
            self.next_frame += CYCLES_PER_FRAME;
            self.publish_frame();
            self.drain_audio();
            if !unlimited {
                self.pace();
            }
        }
    }

    /// Drives the interrupt controller from the bus lines. The
    /// maskable line is level-sensitive; the NMI line is edge-sensitive
    /// so a held INTRQ cannot re-trigger after RETN.
    fn sync_interrupt_lines(&mut self) {
        if self.state.bus.int_line() {
            self.state.ints.request_maskable();
        } else {
            self.state.ints.clear_maskable();
        }
        let level = self.state.bus.nmi_line();
        if level && !self.nmi_level {
            self.state.ints.request_nonmaskable();
        }
        self.nmi_level = level;
    }

    fn make_record(&self) -> TraceRecord {
        let pc = self.state.cpu.regs.pc;
        let raw = [
            self.state.bus.peek(pc),
            self.state.bus.peek(pc.wrapping_add(1)),
            self.state.bus.peek(pc.wrapping_add(2)),
            self.state.bus.peek(pc.wrapping_add(3)),
        ];
        let instr = self.state.cpu.table().lookup(raw[0], raw[1], raw[3]);
        TraceRecord {
            cycles: self.state.cycles,
            pc,
            text: disasm::disassemble(instr, pc, &raw),
        }
    }

    fn publish_counters(&self) {
        let controls = &self.shared.controls;
        controls.cycles.store(self.state.cycles, Ordering::Relaxed);
        controls.halted.store(self.state.cpu.regs.halted, Ordering::Relaxed);
    }

    fn publish_frame(&self) {
        let cells = self.state.bus.video_window();
        if let Ok(mut frame) = self.shared.frame.lock() {
            frame.cells = cells;
            frame.frame = self.state.cycles / CYCLES_PER_FRAME;
        }
    }

    fn drain_audio(&mut self) {
        let samples = self.state.bus.cassette.drain_samples();
        if samples.is_empty() {
            return;
        }
        if let Ok(mut sink) = self.shared.audio.lock() {
            sink.extend_from_slice(&samples);
        }
    }

    /// Sleeps until machine time catches up with wall-clock time, in
    /// bounded slices that keep checking the stop flag.
    fn pace(&self) {
        let ahead = self.state.cycles - self.anchor_cycles;
        let target = self.anchor + Duration::from_nanos(self.clock.nanos_for_cycles(ahead));
        loop {
            if self.shared.controls.stop.load(Ordering::Relaxed) {
                return;
            }
            let now = Instant::now();
            if now >= target {
                return;
            }
            thread::sleep((target - now).min(MAX_SLEEP));
        }
    }
}

/// Reads a block through [`Trs80Bus::peek`], wrapping at the top of
/// the address space.
#[must_use]
pub fn peek_block(bus: &Trs80Bus, start: u16, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| bus.peek(start.wrapping_add(i as u16)))
        .collect()
}

/// Stores object code and optionally redirects execution to it. An
/// explicit entry point also clears the halt latch, so code can be
/// loaded over a machine that halted.
pub fn apply_load_program(state: &mut CoreState, org: u16, bytes: &[u8], entry: Option<u16>) {
    state.bus.load_bytes(org, bytes);
    if let Some(pc) = entry {
        state.cpu.regs.pc = pc;
        state.cpu.regs.halted = false;
    }
}
