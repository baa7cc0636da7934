//! TRS-80 Model III emulator binary.
//!
//! Headless batch runner: loads a ROM and/or object code, runs the
//! machine for a number of frames, to a HALT, or to a breakpoint, then
//! reports screen text, trace history, disassembly, memory dumps,
//! snapshots, or cassette audio.

use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use emu_trs80::cassette::SAMPLE_RATE_HZ;
use emu_trs80::{
    CYCLES_PER_FRAME, ClockMode, SNAPSHOT_VERSION, SchedulerEvent, Trs80, Trs80Config,
};

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

struct CliArgs {
    rom_path: Option<PathBuf>,
    load_path: Option<PathBuf>,
    org: u16,
    entry: Option<u16>,
    unlimited: bool,
    frames: u64,
    until_halt: bool,
    timeout_ms: u64,
    breakpoint: Option<u16>,
    trace: bool,
    screen: bool,
    disasm: Option<u16>,
    peek: Option<u16>,
    snapshot_save: Option<PathBuf>,
    snapshot_load: Option<PathBuf>,
    wav_path: Option<PathBuf>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        rom_path: None,
        load_path: None,
        org: 0x8000,
        entry: None,
        unlimited: false,
        frames: 60,
        until_halt: false,
        timeout_ms: 10_000,
        breakpoint: None,
        trace: false,
        screen: false,
        disasm: None,
        peek: None,
        snapshot_save: None,
        snapshot_load: None,
        wav_path: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--rom" => {
                i += 1;
                cli.rom_path = args.get(i).map(PathBuf::from);
            }
            "--load" => {
                i += 1;
                cli.load_path = args.get(i).map(PathBuf::from);
            }
            "--org" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.org = parse_address(s);
                }
            }
            "--entry" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.entry = Some(parse_address(s));
                }
            }
            "--unlimited" => {
                cli.unlimited = true;
            }
            "--frames" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.frames = s.parse().unwrap_or(60);
                }
            }
            "--until-halt" => {
                cli.until_halt = true;
            }
            "--timeout-ms" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.timeout_ms = s.parse().unwrap_or(10_000);
                }
            }
            "--breakpoint" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.breakpoint = Some(parse_address(s));
                }
            }
            "--trace" => {
                cli.trace = true;
            }
            "--screen" => {
                cli.screen = true;
            }
            "--disasm" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.disasm = Some(parse_address(s));
                }
            }
            "--peek" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.peek = Some(parse_address(s));
                }
            }
            "--snapshot-save" => {
                i += 1;
                cli.snapshot_save = args.get(i).map(PathBuf::from);
            }
            "--snapshot-load" => {
                i += 1;
                cli.snapshot_load = args.get(i).map(PathBuf::from);
            }
            "--wav" => {
                i += 1;
                cli.wav_path = args.get(i).map(PathBuf::from);
            }
            "--help" | "-h" => {
                eprintln!("Usage: emu-trs80 [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --rom <file>            Model III ROM image (omit to run bare RAM)");
                eprintln!("  --load <file>           Load raw object code into memory");
                eprintln!("  --org <addr>            Load address for --load [default: 0x8000]");
                eprintln!("  --entry <addr>          Entry point [default: the load address]");
                eprintln!("  --unlimited             Run as fast as the host allows");
                eprintln!("  --frames <n>            Frames to run [default: 60]");
                eprintln!("  --until-halt            Run until the CPU halts instead");
                eprintln!("  --breakpoint <addr>     Pause when PC reaches this address");
                eprintln!("  --timeout-ms <ms>       Give up waiting after this long [default: 10000]");
                eprintln!("  --trace                 Record executed instructions");
                eprintln!("  --screen                Print the screen text after the run");
                eprintln!("  --disasm <addr>         Disassemble 16 instructions after the run");
                eprintln!("  --peek <addr>           Hex dump 64 bytes after the run");
                eprintln!("  --snapshot-save <file>  Save a snapshot after the run");
                eprintln!("  --snapshot-load <file>  Restore a snapshot before the run");
                eprintln!("  --wav <file>            Save cassette output as WAV");
                eprintln!();
                eprintln!("Addresses accept decimal, 0x, or $ prefixes.");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn parse_address(s: &str) -> u16 {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = s.strip_prefix('$') {
        u16::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    };
    parsed.unwrap_or_else(|| {
        eprintln!("Bad address: {s}");
        process::exit(1);
    })
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

fn dump_block(start: u16, bytes: &[u8]) {
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let addr = start.wrapping_add(row as u16 * 16);
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
        println!("{addr:04X}  {}", hex.join(" "));
    }
}

fn save_wav(samples: &[f32], path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE_HZ,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = parse_args();

    let rom = match cli.rom_path {
        Some(ref path) => match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("Failed to read ROM file {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => Vec::new(),
    };

    let config = Trs80Config::model_iii(rom);
    let mut machine = match Trs80::new(&config) {
        Ok(machine) => machine,
        Err(e) => {
            eprintln!("Failed to build machine: {e}");
            process::exit(1);
        }
    };

    if let Some(ref path) = cli.snapshot_load {
        let data = match std::fs::read(path) {
            Ok(d) => d,
            Err(e) => {
                eprintln!("Failed to read snapshot {}: {e}", path.display());
                process::exit(1);
            }
        };
        if let Err(e) = machine.snapshot_restore(&data, SNAPSHOT_VERSION) {
            eprintln!("Failed to restore snapshot: {e}");
            process::exit(1);
        }
        eprintln!("Restored snapshot: {}", path.display());
    }

    if let Some(ref path) = cli.load_path {
        let data = match std::fs::read(path) {
            Ok(d) => d,
            Err(e) => {
                eprintln!("Failed to read object file {}: {e}", path.display());
                process::exit(1);
            }
        };
        let entry = cli.entry.unwrap_or(cli.org);
        if let Err(e) = machine.load_program(cli.org, &data, Some(entry)) {
            eprintln!("Failed to load object code: {e}");
            process::exit(1);
        }
        eprintln!(
            "Loaded {} bytes at {:04X}, entry {:04X}",
            data.len(),
            cli.org,
            entry
        );
    }

    if cli.unlimited {
        machine.set_clock_mode(ClockMode::Unlimited);
    }
    if let Some(addr) = cli.breakpoint {
        machine.set_breakpoint(addr, true);
    }
    if cli.trace {
        machine.set_trace(true);
    }

    machine.start();
    let timeout = Duration::from_millis(cli.timeout_ms);

    if let Some(addr) = cli.breakpoint {
        match machine.wait_for_breakpoint(timeout) {
            Some(pc) => eprintln!("Breakpoint hit at {pc:04X}"),
            None => {
                eprintln!("Timed out waiting for breakpoint {addr:04X}");
                machine.stop();
                process::exit(1);
            }
        }
    } else if cli.until_halt {
        if !machine.wait_for_halt(timeout) {
            eprintln!("Timed out waiting for HALT");
            machine.stop();
            process::exit(1);
        }
    } else {
        let target = cli.frames * CYCLES_PER_FRAME;
        let deadline = Instant::now() + timeout;
        while machine.step_cycles_elapsed() < target && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    machine.stop();

    while let Some(event) = machine.poll_event() {
        match event {
            SchedulerEvent::Fault(fault) => eprintln!("Peripheral fault: {fault}"),
            SchedulerEvent::Breakpoint { .. } => {}
        }
    }

    let regs = machine.registers();
    let halted = if regs.halted { " (halted)" } else { "" };
    eprintln!(
        "Stopped after {} cycles; PC={:04X}{halted}",
        machine.step_cycles_elapsed(),
        regs.pc
    );

    if cli.screen {
        println!("{}", machine.screen_text());
    }

    if cli.trace {
        for record in machine.trace_history() {
            println!("{:>12}  {:04X}  {}", record.cycles, record.pc, record.text);
        }
    }

    if let Some(addr) = cli.disasm {
        for line in machine.disassemble(addr, 16) {
            println!("{line}");
        }
    }

    if let Some(addr) = cli.peek {
        dump_block(addr, &machine.peek_block(addr, 64));
    }

    if let Some(ref path) = cli.snapshot_save {
        let image = match machine.snapshot_save() {
            Ok(image) => image,
            Err(e) => {
                eprintln!("Failed to capture snapshot: {e}");
                process::exit(1);
            }
        };
        if let Err(e) = std::fs::write(path, &image) {
            eprintln!("Failed to write snapshot {}: {e}", path.display());
            process::exit(1);
        }
        eprintln!("Snapshot saved to {}", path.display());
    }

    if let Some(ref path) = cli.wav_path {
        let samples = machine.take_audio();
        if let Err(e) = save_wav(&samples, path) {
            eprintln!("Failed to write WAV {}: {e}", path.display());
            process::exit(1);
        }
        eprintln!("Audio saved to {} ({} samples)", path.display(), samples.len());
    }
}
