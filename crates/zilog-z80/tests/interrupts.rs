//! Interrupt delivery: the three maskable modes, NMI behaviour, the
//! post-EI delay and waking from HALT.

use emu_core::{Bus, Cpu, IoBus};
use zilog_z80::{InterruptController, Z80};

struct TestBus {
    ram: Vec<u8>,
}

impl TestBus {
    fn new() -> Self {
        Self {
            ram: vec![0; 0x10000],
        }
    }

    fn load(&mut self, address: u16, bytes: &[u8]) {
        let start = usize::from(address);
        self.ram[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl Bus for TestBus {
    fn read(&mut self, address: u16) -> u8 {
        self.ram[usize::from(address)]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.ram[usize::from(address)] = value;
    }
}

impl IoBus for TestBus {
    fn read_io(&mut self, _port: u8) -> u8 {
        0xFF
    }

    fn write_io(&mut self, _port: u8, _value: u8) {}
}

const ORG: u16 = 0x8000;

/// Runs `code` at [`ORG`] until the CPU halts.
fn halt_with(code: &[u8]) -> (Z80, TestBus) {
    let mut bus = TestBus::new();
    bus.load(ORG, code);
    let mut cpu = Z80::new();
    cpu.regs.pc = ORG;
    cpu.regs.sp = 0x7F00;
    for _ in 0..10_000 {
        cpu.step(&mut bus);
        if cpu.regs.halted {
            return (cpu, bus);
        }
    }
    panic!("program never reached HALT");
}

#[test]
fn im1_vectors_to_0038_and_clears_enable() {
    let (mut cpu, mut bus) = halt_with(&[
        0xED, 0x56, // IM 1
        0xFB, // EI
        0x76, // HALT at 8003
    ]);
    bus.load(0x0038, &[0x3E, 0x77, 0xFB, 0xED, 0x4D]); // LD A,77H / EI / RETI

    let mut ic = InterruptController::new();
    ic.request_maskable();
    let cost = ic.service(&mut cpu, &mut bus);
    assert_eq!(cost, Some(13));
    assert_eq!(cpu.regs.pc, 0x0038);
    assert!(!cpu.regs.iff1, "acceptance disables further interrupts");
    assert!(!cpu.regs.halted);
    // The stacked return address is the byte after the HALT.
    assert_eq!(cpu.regs.sp, 0x7EFE);
    assert_eq!(bus.read(0x7EFE), 0x04);
    assert_eq!(bus.read(0x7EFF), 0x80);

    ic.clear_maskable();
    for _ in 0..3 {
        cpu.step(&mut bus); // LD A,77H / EI / RETI
    }
    assert_eq!(cpu.regs.a(), 0x77);
    assert_eq!(cpu.regs.pc, 0x8004);
    assert!(cpu.regs.iff1, "ISR re-enabled before returning");
}

#[test]
fn im2_reads_vector_from_table() {
    let (mut cpu, mut bus) = halt_with(&[
        0x3E, 0x90, // LD A,90H
        0xED, 0x47, // LD I,A
        0xED, 0x5E, // IM 2
        0xFB, // EI
        0x76, // HALT
    ]);
    bus.load(0x9024, &[0x00, 0x70]); // vector table entry -> 7000H
    bus.load(0x7000, &[0x76]);

    let mut ic = InterruptController::new();
    ic.set_data_bus(0x24);
    ic.request_maskable();
    assert_eq!(ic.service(&mut cpu, &mut bus), Some(19));
    assert_eq!(cpu.regs.pc, 0x7000);
}

#[test]
fn im2_uses_bus_byte_low_bit_as_is() {
    let (mut cpu, mut bus) = halt_with(&[
        0x3E, 0x90, // LD A,90H
        0xED, 0x47, // LD I,A
        0xED, 0x5E, // IM 2
        0xFB, // EI
        0x76, // HALT
    ]);
    // Odd bus byte: the table entry straddles 9025/9026.
    bus.load(0x9025, &[0x34, 0x12]);

    let mut ic = InterruptController::new();
    ic.set_data_bus(0x25);
    ic.request_maskable();
    ic.service(&mut cpu, &mut bus);
    assert_eq!(cpu.regs.pc, 0x1234);
}

#[test]
fn im0_executes_rst_from_the_bus() {
    let (mut cpu, mut bus) = halt_with(&[
        0xFB, // EI (IM 0 is the reset default)
        0x76, // HALT
    ]);
    let mut ic = InterruptController::new();
    ic.set_data_bus(0xEF); // RST 28H
    ic.request_maskable();
    assert_eq!(ic.service(&mut cpu, &mut bus), Some(13));
    assert_eq!(cpu.regs.pc, 0x0028);
    assert_eq!(cpu.regs.sp, 0x7EFE);
}

#[test]
fn im0_treats_non_rst_bytes_as_nop() {
    let (mut cpu, mut bus) = halt_with(&[0xFB, 0x76]);
    let mut ic = InterruptController::new();
    ic.set_data_bus(0x00);
    ic.request_maskable();
    assert_eq!(ic.service(&mut cpu, &mut bus), Some(13));
    // Woken from HALT but not vectored anywhere.
    assert_eq!(cpu.regs.pc, 0x8002);
    assert_eq!(cpu.regs.sp, 0x7F00);
    assert!(!cpu.regs.iff1);
}

#[test]
fn nmi_ignores_interrupt_disable() {
    let (mut cpu, mut bus) = halt_with(&[
        0xF3, // DI
        0x76, // HALT
    ]);
    bus.load(0x0066, &[0xED, 0x45]); // RETN

    let mut ic = InterruptController::new();
    ic.request_nonmaskable();
    assert_eq!(ic.service(&mut cpu, &mut bus), Some(11));
    assert_eq!(cpu.regs.pc, 0x0066);
    assert!(!ic.nonmaskable_pending(), "NMI latch consumed by delivery");

    cpu.step(&mut bus); // RETN
    assert_eq!(cpu.regs.pc, 0x8002, "returns past the HALT");
    assert!(!cpu.regs.iff1, "RETN restores the pre-NMI enable state");
}

#[test]
fn nmi_preserves_enable_state_for_retn() {
    let (mut cpu, mut bus) = halt_with(&[
        0xFB, // EI
        0x76, // HALT
    ]);
    bus.load(0x0066, &[0xED, 0x45]); // RETN

    let mut ic = InterruptController::new();
    ic.request_nonmaskable();
    ic.service(&mut cpu, &mut bus);
    assert!(!cpu.regs.iff1);
    assert!(cpu.regs.iff2, "IFF2 parks the old enable state");

    cpu.step(&mut bus); // RETN
    assert!(cpu.regs.iff1, "RETN restores interrupts");
}

#[test]
fn nmi_wins_over_maskable() {
    let (mut cpu, mut bus) = halt_with(&[0xFB, 0x76]);
    let mut ic = InterruptController::new();
    ic.request_maskable();
    ic.request_nonmaskable();
    assert_eq!(ic.service(&mut cpu, &mut bus), Some(11));
    assert_eq!(cpu.regs.pc, 0x0066);
    // The maskable line is still up, but acceptance cleared IFF1.
    assert_eq!(ic.service(&mut cpu, &mut bus), None);
    assert!(ic.maskable_pending());
}

#[test]
fn ei_defers_acceptance_by_one_instruction() {
    let mut bus = TestBus::new();
    bus.load(ORG, &[0xF3, 0xFB, 0x00, 0x76]); // DI / EI / NOP / HALT
    let mut cpu = Z80::new();
    cpu.regs.pc = ORG;
    cpu.regs.sp = 0x7F00;

    let mut ic = InterruptController::new();
    cpu.step(&mut bus); // DI
    ic.request_maskable();
    assert_eq!(ic.service(&mut cpu, &mut bus), None);

    cpu.step(&mut bus); // EI
    assert!(cpu.regs.iff1);
    assert!(
        !cpu.interrupt_ready(),
        "the instruction after EI must run first"
    );
    assert_eq!(ic.service(&mut cpu, &mut bus), None);

    cpu.step(&mut bus); // NOP
    assert!(cpu.interrupt_ready());
    assert_eq!(ic.service(&mut cpu, &mut bus), Some(13));
    // IM 0 with a floating 0xFF bus executes RST 38H.
    assert_eq!(cpu.regs.pc, 0x0038);
}

#[test]
fn maskable_line_is_level_sensitive() {
    let (mut cpu, mut bus) = halt_with(&[
        0xF3, // DI
        0x76, // HALT
    ]);
    let mut ic = InterruptController::new();
    ic.request_maskable();
    // Disabled: nothing delivered, line stays up.
    assert_eq!(ic.service(&mut cpu, &mut bus), None);
    assert!(ic.maskable_pending());

    // Re-enable by hand and the same request goes through.
    cpu.regs.iff1 = true;
    assert!(ic.service(&mut cpu, &mut bus).is_some());
}

#[test]
fn interrupt_wakes_halted_core_past_the_halt() {
    let (mut cpu, mut bus) = halt_with(&[0xFB, 0x76]);
    assert_eq!(cpu.regs.pc, 0x8001, "parked on the HALT opcode");
    assert_eq!(cpu.step(&mut bus), 4, "idle while halted");

    let mut ic = InterruptController::new();
    ic.request_maskable();
    cpu.regs.im = 1;
    ic.service(&mut cpu, &mut bus);
    assert!(!cpu.regs.halted);
    // Return address stacked past the HALT, not at it.
    assert_eq!(bus.read(0x7EFE), 0x02);
    assert_eq!(bus.read(0x7EFF), 0x80);
}
