//! Integration tests for the TRS-80 Model III emulator.
//!
//! These tests drive the public `Trs80` facade the way a front end
//! would: load a program, start the scheduler thread, wait on the
//! diagnostic signals, stop, and inspect memory and registers. No ROM
//! image is required; every test supplies its own code.

use std::thread;
use std::time::{Duration, Instant};

use emu_trs80::{
    ClockMode, Disk, SNAPSHOT_VERSION, SchedulerEvent, SnapshotError, Trs80, Trs80Config,
};

/// Generous bound for waits that should complete almost instantly.
const LONG_WAIT: Duration = Duration::from_secs(5);

fn make_machine() -> Trs80 {
    Trs80::new(&Trs80Config::model_iii(Vec::new())).expect("empty ROM is always accepted")
}

/// Polls `done` once a millisecond until it returns true or `timeout`
/// expires. Returns the final answer.
fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    done()
}

/// 16x16 shift-add multiply of 12345 x 34567, product stored
/// little-endian at 8100h, HALT at 8020h.
#[rustfmt::skip]
const MULTIPLY: &[u8] = &[
    0x01, 0x39, 0x30,       // 8000  LD BC,3039h   ; 12345
    0x11, 0x07, 0x87,       // 8003  LD DE,8707h   ; 34567
    0x21, 0x00, 0x00,       // 8006  LD HL,0
    0x3E, 0x10,             // 8009  LD A,16
    0x29,                   // 800B  ADD HL,HL     ; loop: shift DEHL left
    0xCB, 0x13,             // 800C  RL E
    0xCB, 0x12,             // 800E  RL D          ; multiplier bit into carry
    0x30, 0x04,             // 8010  JR NC,8016h
    0x09,                   // 8012  ADD HL,BC
    0x30, 0x01,             // 8013  JR NC,8016h
    0x13,                   // 8015  INC DE
    0x3D,                   // 8016  DEC A
    0x20, 0xF2,             // 8017  JR NZ,800Bh
    0x22, 0x00, 0x81,       // 8019  LD (8100h),HL
    0xEB,                   // 801C  EX DE,HL
    0x22, 0x02, 0x81,       // 801D  LD (8102h),HL
    0x76,                   // 8020  HALT
];

/// 12345 x 34567 = 426,729,615 = 196F608Fh, little-endian in memory.
const PRODUCT: [u8; 4] = [0x8F, 0x60, 0x6F, 0x19];

// ---------------------------------------------------------------------------
// Whole-program execution
// ---------------------------------------------------------------------------

#[test]
fn test_multiply_runs_to_halt() {
    let mut machine = make_machine();
    machine.set_clock_mode(ClockMode::Unlimited);
    machine
        .load_program(0x8000, MULTIPLY, Some(0x8000))
        .expect("program fits in RAM");

    machine.start();
    assert!(machine.wait_for_halt(LONG_WAIT), "program never halted");
    machine.stop();

    assert_eq!(machine.peek_block(0x8100, 4), PRODUCT);
    assert_eq!(machine.registers().pc, 0x8020, "PC parks at the HALT");
    assert!(machine.registers().halted);
}

#[test]
fn test_program_redirect_while_running() {
    let mut machine = make_machine();
    machine.set_clock_mode(ClockMode::Unlimited);
    // Endless loop; only a load with an entry point can get out of it.
    machine
        .load_program(0x8000, &[0x18, 0xFE], Some(0x8000))
        .expect("program fits in RAM");
    machine.start();
    assert!(wait_until(LONG_WAIT, || machine.step_cycles_elapsed() > 0));

    machine
        .load_program(0x9000, &[0x76], Some(0x9000))
        .expect("program fits in RAM");

    assert!(machine.wait_for_halt(LONG_WAIT), "redirect never took");
    machine.stop();
    assert_eq!(machine.registers().pc, 0x9000);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_start_stop_restart() {
    let mut machine = make_machine();
    machine.set_clock_mode(ClockMode::Unlimited);
    machine
        .load_program(0x8000, &[0x18, 0xFE], Some(0x8000))
        .expect("program fits in RAM");

    assert!(!machine.running());
    machine.start();
    assert!(machine.running());
    machine.start(); // second start is a no-op
    assert!(machine.running());

    assert!(wait_until(LONG_WAIT, || machine.step_cycles_elapsed() > 0));
    machine.stop();
    assert!(!machine.running());
    machine.stop(); // second stop is a no-op

    let cycles = machine.step_cycles_elapsed();
    assert!(cycles > 0);

    machine.start();
    assert!(wait_until(LONG_WAIT, || machine.step_cycles_elapsed() > cycles));
    machine.stop();
    assert!(
        machine.step_cycles_elapsed() > cycles,
        "restart continued counting"
    );
}

#[test]
fn test_pause_freezes_the_cycle_counter() {
    let mut machine = make_machine();
    machine.set_clock_mode(ClockMode::Unlimited);
    machine
        .load_program(0x8000, &[0x18, 0xFE], Some(0x8000))
        .expect("program fits in RAM");
    machine.start();
    assert!(wait_until(LONG_WAIT, || machine.step_cycles_elapsed() > 0));

    machine.pause();
    let frozen = machine.step_cycles_elapsed();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(
        machine.step_cycles_elapsed(),
        frozen,
        "paused core kept running"
    );

    machine.resume();
    assert!(
        wait_until(LONG_WAIT, || machine.step_cycles_elapsed() > frozen),
        "resume never took"
    );
    machine.stop();
}

// ---------------------------------------------------------------------------
// Breakpoints
// ---------------------------------------------------------------------------

fn run_multiply_to_breakpoint(mode: ClockMode) -> (u16, u64) {
    let mut machine = make_machine();
    machine.set_clock_mode(mode);
    machine
        .load_program(0x8000, MULTIPLY, Some(0x8000))
        .expect("program fits in RAM");
    machine.set_breakpoint(0x8019, true); // first instruction after the loop

    machine.start();
    let pc = machine
        .wait_for_breakpoint(LONG_WAIT)
        .expect("breakpoint never hit");
    let cycles = machine.step_cycles_elapsed();
    machine.stop();
    (pc, cycles)
}

#[test]
fn test_breakpoint_is_deterministic_across_clock_modes() {
    let (fast_pc, fast_cycles) = run_multiply_to_breakpoint(ClockMode::Unlimited);
    let (real_pc, real_cycles) = run_multiply_to_breakpoint(ClockMode::Normal);

    assert_eq!(fast_pc, 0x8019);
    assert_eq!(real_pc, 0x8019);
    assert_eq!(
        fast_cycles, real_cycles,
        "clock mode changed the cycle count at the breakpoint"
    );
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[test]
fn test_snapshot_round_trip_resumes_identically() {
    // Run the multiply up to the store and capture the machine there.
    let mut source = make_machine();
    source.set_clock_mode(ClockMode::Unlimited);
    source
        .load_program(0x8000, MULTIPLY, Some(0x8000))
        .expect("program fits in RAM");
    source.set_breakpoint(0x8019, true);
    source.start();
    source
        .wait_for_breakpoint(LONG_WAIT)
        .expect("breakpoint never hit");
    let image = source
        .snapshot_save()
        .expect("paused machine can be captured");
    source.stop();

    // The product is not in memory yet at the capture point.
    assert_ne!(source.peek_block(0x8100, 4), PRODUCT);

    // A fresh machine picks up from the image and finishes the job.
    let mut target = make_machine();
    target
        .snapshot_restore(&image, SNAPSHOT_VERSION)
        .expect("image restores onto the same model");
    assert_eq!(target.registers().pc, 0x8019);

    target.set_clock_mode(ClockMode::Unlimited);
    target.start();
    assert!(
        target.wait_for_halt(LONG_WAIT),
        "restored program never halted"
    );
    target.stop();

    assert_eq!(target.peek_block(0x8100, 4), PRODUCT);
    assert_eq!(target.registers().pc, 0x8020);
}

#[test]
fn test_rejected_snapshots_leave_state_untouched() {
    let mut machine = make_machine();
    machine
        .load_program(0x8000, &[0x3E, 0x55], Some(0x8000))
        .expect("program fits in RAM");
    let image = machine
        .snapshot_save()
        .expect("stopped machine can be captured");

    let mut wrong_version = image.clone();
    wrong_version[4] = 9;
    let err = machine
        .snapshot_restore(&wrong_version, SNAPSHOT_VERSION)
        .expect_err("version 9 must be rejected");
    assert!(matches!(err, SnapshotError::Incompatible(_)));

    let mut wrong_model = image.clone();
    wrong_model[5] = 0xEE;
    let err = machine
        .snapshot_restore(&wrong_model, SNAPSHOT_VERSION)
        .expect_err("foreign model byte must be rejected");
    assert!(matches!(err, SnapshotError::Incompatible(_)));

    let err = machine
        .snapshot_restore(&image, 7)
        .expect_err("caller asking for an unknown version must be refused");
    assert!(matches!(err, SnapshotError::Incompatible(_)));

    let err = machine
        .snapshot_restore(&image[..200], SNAPSHOT_VERSION)
        .expect_err("truncated image must be rejected");
    assert!(matches!(err, SnapshotError::Truncated { have: 200, .. }));

    let mut trailing = image.clone();
    trailing.push(0xAA);
    let err = machine
        .snapshot_restore(&trailing, SNAPSHOT_VERSION)
        .expect_err("trailing bytes must be rejected");
    assert!(matches!(err, SnapshotError::Corrupt(_)));

    // Five rejections later the machine is exactly as loaded.
    assert_eq!(machine.registers().pc, 0x8000);
    assert_eq!(machine.peek(0x8000), 0x3E);
    assert_eq!(machine.step_cycles_elapsed(), 0);
}

// ---------------------------------------------------------------------------
// Interrupts
// ---------------------------------------------------------------------------

#[test]
fn test_heartbeat_interrupt_vectors_through_0038() {
    let mut machine = make_machine();
    machine.set_clock_mode(ClockMode::Unlimited);

    // Handler: acknowledge the heartbeat, leave a marker, halt.
    #[rustfmt::skip]
    let handler: &[u8] = &[
        0xDB, 0xEC,             // 0038  IN A,(ECh)    ; clears the latch
        0x3E, 0x55,             // 003A  LD A,55h
        0x32, 0x00, 0x81,       // 003C  LD (8100h),A
        0x76,                   // 003F  HALT
    ];
    machine
        .load_program(0x0038, handler, None)
        .expect("handler fits in RAM");

    // Main: select IM 1, unmask the heartbeat, enable, spin.
    #[rustfmt::skip]
    let main: &[u8] = &[
        0xED, 0x56,             // 8000  IM 1
        0x3E, 0x04,             // 8002  LD A,04h
        0xD3, 0xE0,             // 8004  OUT (E0h),A   ; unmask RTC
        0xFB,                   // 8006  EI
        0x18, 0xFE,             // 8007  JR 8007h
    ];
    machine
        .load_program(0x8000, main, Some(0x8000))
        .expect("program fits in RAM");

    machine.start();
    assert!(machine.wait_for_halt(LONG_WAIT), "heartbeat never fired");
    machine.stop();

    assert_eq!(machine.peek(0x8100), 0x55, "handler did not run");
    assert_eq!(machine.registers().pc, 0x003F);
    assert!(!machine.registers().iff1, "acceptance must clear IFF1");
}

#[test]
fn test_nmi_reaches_the_handler_while_running() {
    let mut machine = make_machine();
    machine.set_clock_mode(ClockMode::Unlimited);

    #[rustfmt::skip]
    let handler: &[u8] = &[
        0x3E, 0x99,             // 0066  LD A,99h
        0x32, 0x00, 0x81,       // 0068  LD (8100h),A
        0x76,                   // 006B  HALT
    ];
    machine
        .load_program(0x0066, handler, None)
        .expect("handler fits in RAM");

    // Interrupts never enabled; NMI must get through regardless.
    machine
        .load_program(0x8000, &[0x18, 0xFE], Some(0x8000))
        .expect("program fits in RAM");

    machine.start();
    assert!(wait_until(LONG_WAIT, || machine.step_cycles_elapsed() > 0));
    machine.request_nonmaskable_interrupt();

    assert!(machine.wait_for_halt(LONG_WAIT), "NMI never serviced");
    machine.stop();

    assert_eq!(machine.peek(0x8100), 0x99);
    assert_eq!(machine.registers().pc, 0x006B);
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

#[test]
fn test_trace_records_instructions_in_order() {
    let mut machine = make_machine();
    machine.set_clock_mode(ClockMode::Unlimited);
    machine.set_trace(true);
    #[rustfmt::skip]
    let program: &[u8] = &[
        0x3E, 0x01,             // 8000  LD A,01h
        0x06, 0x02,             // 8002  LD B,02h
        0x76,                   // 8004  HALT
    ];
    machine
        .load_program(0x8000, program, Some(0x8000))
        .expect("program fits in RAM");

    machine.start();
    assert!(machine.wait_for_halt(LONG_WAIT));
    machine.stop();

    let trace = machine.trace_history();
    assert_eq!(trace.len(), 3, "idle cycles after HALT must not be traced");
    assert_eq!(trace[0].pc, 0x8000);
    assert_eq!(trace[0].cycles, 0);
    assert!(trace[0].text.contains("LD A"), "got {:?}", trace[0].text);
    assert_eq!(trace[1].pc, 0x8002);
    assert_eq!(trace[2].pc, 0x8004);
    assert!(trace[2].text.contains("HALT"), "got {:?}", trace[2].text);
    assert!(trace[0].cycles < trace[2].cycles);
}

// ---------------------------------------------------------------------------
// Memory map
// ---------------------------------------------------------------------------

#[test]
fn test_rom_writes_bounce_but_loader_patches() {
    let mut machine =
        Trs80::new(&Trs80Config::model_iii(vec![0x00; 0x100])).expect("small ROM is accepted");
    machine.set_clock_mode(ClockMode::Unlimited);

    // The program pokes into ROM space; the write must bounce.
    #[rustfmt::skip]
    let program: &[u8] = &[
        0x3E, 0x77,             // 8000  LD A,77h
        0x32, 0x50, 0x00,       // 8002  LD (0050h),A
        0x76,                   // 8005  HALT
    ];
    machine
        .load_program(0x8000, program, Some(0x8000))
        .expect("program fits in RAM");

    machine.start();
    assert!(machine.wait_for_halt(LONG_WAIT));
    machine.stop();
    assert_eq!(machine.peek(0x0050), 0x00, "CPU write reached ROM");

    // The loader writes straight to storage and may patch ROM.
    machine
        .load_program(0x0050, &[0x77], None)
        .expect("loader reaches ROM space");
    assert_eq!(machine.peek(0x0050), 0x77);
}

#[test]
fn test_program_output_reaches_screen_text() {
    let mut machine = make_machine();
    machine.set_clock_mode(ClockMode::Unlimited);
    #[rustfmt::skip]
    let program: &[u8] = &[
        0x3E, b'H',             // 8000  LD A,'H'
        0x32, 0x00, 0x3C,       // 8002  LD (3C00h),A
        0x3E, b'I',             // 8005  LD A,'I'
        0x32, 0x01, 0x3C,       // 8007  LD (3C01h),A
        0x76,                   // 800A  HALT
    ];
    machine
        .load_program(0x8000, program, Some(0x8000))
        .expect("program fits in RAM");

    machine.start();
    assert!(machine.wait_for_halt(LONG_WAIT));
    machine.stop();

    let text = machine.screen_text();
    assert!(text.starts_with("HI"), "screen was {:?}", &text[..8]);
    assert_eq!(text.lines().count(), 16);
}

#[test]
fn test_running_machine_publishes_frames() {
    let mut machine = make_machine();
    machine.set_clock_mode(ClockMode::Unlimited);
    #[rustfmt::skip]
    let program: &[u8] = &[
        0x3E, b'H',             // 8000  LD A,'H'
        0x32, 0x00, 0x3C,       // 8002  LD (3C00h),A
        0x18, 0xFE,             // 8005  JR 8005h
    ];
    machine
        .load_program(0x8000, program, Some(0x8000))
        .expect("program fits in RAM");

    machine.start();
    assert!(
        wait_until(LONG_WAIT, || machine.frame_count() >= 1),
        "no frame was ever published"
    );
    let text = machine.screen_text();
    machine.stop();
    assert!(text.starts_with('H'));
}

#[test]
fn test_pressed_key_is_read_through_the_matrix() {
    let mut machine = make_machine();
    machine.set_clock_mode(ClockMode::Unlimited);
    machine.press_key(0, 1); // the 'A' key, row 0 bit 1

    #[rustfmt::skip]
    let program: &[u8] = &[
        0x3A, 0x01, 0x38,       // 8000  LD A,(3801h)  ; row 0 select
        0x32, 0x00, 0x81,       // 8003  LD (8100h),A
        0x76,                   // 8006  HALT
    ];
    machine
        .load_program(0x8000, program, Some(0x8000))
        .expect("program fits in RAM");

    machine.start();
    assert!(machine.wait_for_halt(LONG_WAIT));
    machine.stop();
    assert_eq!(machine.peek(0x8100), 0x02);
}

// ---------------------------------------------------------------------------
// Peripherals
// ---------------------------------------------------------------------------

#[test]
fn test_missing_track_raises_a_controller_fault() {
    let mut machine = make_machine();
    machine.set_clock_mode(ClockMode::Unlimited);
    machine.insert_disk(0, Disk::blank(1, 1, 4, 256));

    // Seek to track 5, then read: the image only holds track 0, so the
    // read completes with Record Not Found and reports a fault.
    #[rustfmt::skip]
    let program: &[u8] = &[
        0x3E, 0x05,             // 8000  LD A,5
        0xD3, 0xF3,             // 8002  OUT (F3h),A   ; data register
        0x3E, 0x10,             // 8004  LD A,10h
        0xD3, 0xF0,             // 8006  OUT (F0h),A   ; seek
        0xDB, 0xF0,             // 8008  IN A,(F0h)    ; busy wait
        0xE6, 0x01,             // 800A  AND 01h
        0x20, 0xFA,             // 800C  JR NZ,8008h
        0xAF,                   // 800E  XOR A
        0xD3, 0xF2,             // 800F  OUT (F2h),A   ; sector 0
        0x3E, 0x80,             // 8011  LD A,80h
        0xD3, 0xF0,             // 8013  OUT (F0h),A   ; read sector
        0xDB, 0xF0,             // 8015  IN A,(F0h)
        0x32, 0x00, 0x81,       // 8017  LD (8100h),A
        0x76,                   // 801A  HALT
    ];
    machine
        .load_program(0x8000, program, Some(0x8000))
        .expect("program fits in RAM");

    machine.start();
    assert!(machine.wait_for_halt(LONG_WAIT), "FDC program never halted");
    machine.stop();

    assert_eq!(
        machine.peek(0x8100),
        0x10,
        "status must show Record Not Found"
    );

    let fault = loop {
        match machine.poll_event() {
            Some(SchedulerEvent::Fault(fault)) => break fault,
            Some(_) => {}
            None => panic!("no fault event was delivered"),
        }
    };
    assert_eq!(fault.device, "fdc");
    assert!(fault.message.contains("track 5"), "got {:?}", fault.message);
}

#[test]
fn test_cassette_output_is_sampled_into_audio() {
    let mut machine = make_machine();
    machine.set_clock_mode(ClockMode::Unlimited);

    // Motor on, write a high then a low with delays long enough for
    // the sampler to catch both.
    #[rustfmt::skip]
    let program: &[u8] = &[
        0x3E, 0x02,             // 8000  LD A,02h
        0xD3, 0xEC,             // 8002  OUT (ECh),A   ; motor on
        0x3E, 0x01,             // 8004  LD A,01h
        0xD3, 0xFF,             // 8006  OUT (FFh),A   ; level high
        0x06, 0x40,             // 8008  LD B,64
        0x10, 0xFE,             // 800A  DJNZ 800Ah
        0x3E, 0x02,             // 800C  LD A,02h
        0xD3, 0xFF,             // 800E  OUT (FFh),A   ; level low
        0x06, 0x40,             // 8010  LD B,64
        0x10, 0xFE,             // 8012  DJNZ 8012h
        0x76,                   // 8014  HALT
    ];
    machine
        .load_program(0x8000, program, Some(0x8000))
        .expect("program fits in RAM");

    machine.start();
    assert!(machine.wait_for_halt(LONG_WAIT));
    machine.stop();

    let audio = machine.take_audio();
    let first_high = audio.iter().position(|&s| s > 0.5);
    let first_low = audio.iter().position(|&s| s < -0.5);
    let high = first_high.expect("no high samples were captured");
    let low = first_low.expect("no low samples were captured");
    assert!(high < low, "high phase must precede low phase");
}
