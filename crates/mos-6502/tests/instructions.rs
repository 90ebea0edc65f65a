//! Instruction behaviour and timing.

use emu_core::{Bus, Cpu, InterruptLines, SimpleBus};
use mos_6502::{CpuConfig, InterruptPriority, Mos6502, flags};

/// Load a program at $0200 and point PC at it.
fn setup(program: &[u8]) -> (Mos6502, SimpleBus) {
    let mut bus = SimpleBus::new();
    let mut cpu = Mos6502::new();
    bus.load(0x0200, program);
    cpu.regs.pc = 0x0200;
    cpu.regs.p.set_if(flags::I, false);
    (cpu, bus)
}

/// Run `n` instructions and return the cycles they took.
fn run(cpu: &mut Mos6502, bus: &mut SimpleBus, n: usize) -> u32 {
    (0..n).map(|_| cpu.step(bus)).sum()
}

#[test]
fn test_lda_immediate() {
    let (mut cpu, mut bus) = setup(&[0xA9, 0x80]);
    assert_eq!(cpu.step(&mut bus), 2);
    assert_eq!(cpu.regs.a, 0x80);
    assert!(cpu.regs.p.is_set(flags::N));
    assert!(!cpu.regs.p.is_set(flags::Z));
    assert_eq!(bus.cycles, 2, "step ticks the bus by its cost");
}

#[test]
fn test_lda_absolute_x_page_cross() {
    // LDA $12F0,X with X=$20 crosses into $1310
    let (mut cpu, mut bus) = setup(&[0xBD, 0xF0, 0x12, 0xBD, 0x00, 0x12]);
    bus.poke(0x1310, 0x55);
    bus.poke(0x1220, 0x66);
    cpu.regs.x = 0x20;
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(cpu.regs.a, 0x55);
    assert_eq!(cpu.step(&mut bus), 4);
    assert_eq!(cpu.regs.a, 0x66);
}

#[test]
fn test_sta_absolute_x_has_no_page_penalty() {
    let (mut cpu, mut bus) = setup(&[0x9D, 0xF0, 0x12]);
    cpu.regs.a = 0x42;
    cpu.regs.x = 0x20;
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(bus.peek(0x1310), 0x42);
}

#[test]
fn test_branch_timing() {
    // BEQ +5 taken, same page
    let (mut cpu, mut bus) = setup(&[0xF0, 0x05]);
    cpu.regs.p.set_if(flags::Z, true);
    assert_eq!(cpu.step(&mut bus), 3);
    assert_eq!(cpu.regs.pc, 0x0207);

    // BNE not taken
    let (mut cpu, mut bus) = setup(&[0xD0, 0x05]);
    cpu.regs.p.set_if(flags::Z, true);
    assert_eq!(cpu.step(&mut bus), 2);
    assert_eq!(cpu.regs.pc, 0x0202);

    // BCC backwards across a page
    let (mut cpu, mut bus) = setup(&[0x90, 0xF0]);
    assert_eq!(cpu.step(&mut bus), 4);
    assert_eq!(cpu.regs.pc, 0x01F2);
}

#[test]
fn test_jsr_rts() {
    let (mut cpu, mut bus) = setup(&[0x20, 0x00, 0x03]);
    bus.poke(0x0300, 0x60); // RTS
    cpu.regs.s = 0xFF;

    assert_eq!(cpu.step(&mut bus), 6);
    assert_eq!(cpu.regs.pc, 0x0300);
    assert_eq!(bus.peek(0x01FF), 0x02);
    assert_eq!(bus.peek(0x01FE), 0x02);

    assert_eq!(cpu.step(&mut bus), 6);
    assert_eq!(cpu.regs.pc, 0x0203);
    assert_eq!(cpu.regs.s, 0xFF);
}

#[test]
fn test_jmp_indirect_page_bug() {
    let (mut cpu, mut bus) = setup(&[0x6C, 0xFF, 0x30]);
    bus.poke(0x30FF, 0x34);
    bus.poke(0x3000, 0x12);
    bus.poke(0x3100, 0x99);
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(cpu.regs.pc, 0x1234);
}

#[test]
fn test_adc_binary_overflow() {
    let (mut cpu, mut bus) = setup(&[0x69, 0x50]);
    cpu.regs.a = 0x50;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0xA0);
    assert!(cpu.regs.p.is_set(flags::V));
    assert!(cpu.regs.p.is_set(flags::N));
    assert!(!cpu.regs.p.is_set(flags::C));
}

#[test]
fn test_decimal_adc_and_sbc() {
    // SED; LDA #$15; CLC; ADC #$27; SEC; SBC #$15
    let (mut cpu, mut bus) = setup(&[0xF8, 0xA9, 0x15, 0x18, 0x69, 0x27, 0x38, 0xE9, 0x15]);
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.regs.a, 0x42);
    assert!(!cpu.regs.p.is_set(flags::C));
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.regs.a, 0x27);
    assert!(cpu.regs.p.is_set(flags::C));
}

#[test]
fn test_decimal_sbc_borrow_wraps_to_99() {
    // SED; SEC; LDA #$00; SBC #$01
    let (mut cpu, mut bus) = setup(&[0xF8, 0x38, 0xA9, 0x00, 0xE9, 0x01]);
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.regs.a, 0x99);
    assert!(!cpu.regs.p.is_set(flags::C));
}

#[test]
fn test_brk_pushes_b_and_rti_returns() {
    let (mut cpu, mut bus) = setup(&[0x00, 0xEA, 0xEA]);
    bus.poke(0xFFFE, 0x00);
    bus.poke(0xFFFF, 0x04);
    bus.poke(0x0400, 0x40); // RTI
    cpu.regs.s = 0xFF;

    assert_eq!(cpu.step(&mut bus), 7);
    assert_eq!(cpu.regs.pc, 0x0400);
    assert_eq!(bus.peek(0x01FF), 0x02);
    assert_eq!(bus.peek(0x01FE), 0x02);
    assert_ne!(bus.peek(0x01FD) & flags::B, 0);
    assert!(cpu.regs.p.is_set(flags::I));

    assert_eq!(cpu.step(&mut bus), 6);
    assert_eq!(cpu.regs.pc, 0x0202);
    assert!(!cpu.regs.p.is_set(flags::I));
}

#[test]
fn test_flag_instructions() {
    // SEC; SED; SEI; CLC; CLD; CLV
    let (mut cpu, mut bus) = setup(&[0x38, 0xF8, 0x78, 0x18, 0xD8, 0xB8]);
    run(&mut cpu, &mut bus, 3);
    assert!(cpu.regs.p.is_set(flags::C));
    assert!(cpu.regs.p.is_set(flags::D));
    assert!(cpu.regs.p.is_set(flags::I));
    run(&mut cpu, &mut bus, 3);
    assert!(!cpu.regs.p.is_set(flags::C));
    assert!(!cpu.regs.p.is_set(flags::D));
}

#[test]
fn test_reset_reads_vector() {
    let mut bus = SimpleBus::new();
    bus.poke(0xFFFC, 0x00);
    bus.poke(0xFFFD, 0xE0);
    let mut cpu = Mos6502::new();
    cpu.reset(&mut bus);
    assert_eq!(cpu.pc(), 0xE000);
    assert_eq!(cpu.regs.s, 0xFD);
    assert!(cpu.regs.p.is_set(flags::I));
    assert_eq!(bus.cycles, 7);
}

/// Drives any core through the trait alone, with the bus type chosen per call.
fn reset_and_step<C: Cpu>(cpu: &mut C, bus: &mut SimpleBus) -> (u16, u16) {
    cpu.reset(bus);
    let start = cpu.pc();
    cpu.step(bus);
    (start, cpu.pc())
}

#[test]
fn test_cpu_trait_is_bus_agnostic() {
    let mut bus = SimpleBus::new();
    bus.poke(0xFFFC, 0x00);
    bus.poke(0xFFFD, 0x03);
    bus.load(0x0300, &[0xA9, 0x01]);
    let mut cpu = Mos6502::new();
    assert_eq!(reset_and_step(&mut cpu, &mut bus), (0x0300, 0x0302));
    assert_eq!(Cpu::pc(&cpu), 0x0302);
}

// Undocumented opcodes

#[test]
fn test_lax_and_sax() {
    // LAX $10; LDX #$0F; SAX $11
    let (mut cpu, mut bus) = setup(&[0xA7, 0x10, 0xA2, 0x0F, 0x87, 0x11]);
    bus.poke(0x0010, 0xF3);
    assert_eq!(cpu.step(&mut bus), 3);
    assert_eq!(cpu.regs.a, 0xF3);
    assert_eq!(cpu.regs.x, 0xF3);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(bus.peek(0x0011), 0x03);
}

#[test]
fn test_dcp_and_isc() {
    // DCP $10; ISC $11
    let (mut cpu, mut bus) = setup(&[0xC7, 0x10, 0xE7, 0x11]);
    bus.poke(0x0010, 0x43);
    bus.poke(0x0011, 0x0F);
    cpu.regs.a = 0x42;
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(bus.peek(0x0010), 0x42);
    assert!(cpu.regs.p.is_set(flags::Z));
    assert!(cpu.regs.p.is_set(flags::C));

    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(bus.peek(0x0011), 0x10);
    assert_eq!(cpu.regs.a, 0x32);
}

#[test]
fn test_slo_rla_sre_rra() {
    let (mut cpu, mut bus) = setup(&[0x07, 0x10, 0x27, 0x11, 0x47, 0x12, 0x67, 0x13]);
    bus.poke(0x0010, 0x81);
    bus.poke(0x0011, 0x0F);
    bus.poke(0x0012, 0x03);
    bus.poke(0x0013, 0x04);

    // SLO: $81 << 1 = $02, C=1, A = 0 | 2
    cpu.step(&mut bus);
    assert_eq!(bus.peek(0x0010), 0x02);
    assert_eq!(cpu.regs.a, 0x02);
    assert!(cpu.regs.p.is_set(flags::C));

    // RLA: $0F rol with C=1 = $1F, A = 2 & $1F
    cpu.step(&mut bus);
    assert_eq!(bus.peek(0x0011), 0x1F);
    assert_eq!(cpu.regs.a, 0x02);

    // SRE: $03 >> 1 = $01, C=1, A = 2 ^ 1
    cpu.step(&mut bus);
    assert_eq!(bus.peek(0x0012), 0x01);
    assert_eq!(cpu.regs.a, 0x03);

    // RRA: $04 ror with C=1 = $82, C=0, A = 3 + $82
    cpu.step(&mut bus);
    assert_eq!(bus.peek(0x0013), 0x82);
    assert_eq!(cpu.regs.a, 0x85);
}

#[test]
fn test_immediate_undocumented_ops() {
    // ANC #$80: C mirrors N
    let (mut cpu, mut bus) = setup(&[0x0B, 0x80]);
    cpu.regs.a = 0xFF;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x80);
    assert!(cpu.regs.p.is_set(flags::C));

    // ALR #$03
    let (mut cpu, mut bus) = setup(&[0x4B, 0x03]);
    cpu.regs.a = 0xFF;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x01);
    assert!(cpu.regs.p.is_set(flags::C));

    // ARR #$FF with carry in
    let (mut cpu, mut bus) = setup(&[0x38, 0x6B, 0xFF]);
    cpu.regs.a = 0xFF;
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.regs.a, 0xFF);
    assert!(cpu.regs.p.is_set(flags::C));
    assert!(!cpu.regs.p.is_set(flags::V));
    assert!(cpu.regs.p.is_set(flags::N));

    // SBX #$10
    let (mut cpu, mut bus) = setup(&[0xCB, 0x10]);
    cpu.regs.a = 0xF0;
    cpu.regs.x = 0x3C;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.x, 0x20);
    assert!(cpu.regs.p.is_set(flags::C));
}

#[test]
fn test_ane_and_lxa_use_configured_magic() {
    let (mut cpu, mut bus) = setup(&[0x8B, 0xFF, 0xAB, 0x0F]);
    cpu.regs.a = 0x00;
    cpu.regs.x = 0xFF;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0xEE);

    cpu.regs.a = 0x11;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x0F);
    assert_eq!(cpu.regs.x, 0x0F);

    let (_, mut bus) = setup(&[0x8B, 0xFF]);
    let mut cpu = Mos6502::with_config(CpuConfig {
        ane_magic: 0xFF,
        ..CpuConfig::default()
    });
    cpu.regs.pc = 0x0200;
    cpu.regs.x = 0xFF;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0xFF);
}

#[test]
fn test_las() {
    let (mut cpu, mut bus) = setup(&[0xBB, 0x00, 0x12]);
    bus.poke(0x1200, 0x3F);
    cpu.regs.s = 0xF3;
    assert_eq!(cpu.step(&mut bus), 4);
    assert_eq!(cpu.regs.a, 0x33);
    assert_eq!(cpu.regs.x, 0x33);
    assert_eq!(cpu.regs.s, 0x33);
}

#[test]
fn test_shx_and_tas_and_with_high_byte() {
    // SHX $1200,Y
    let (mut cpu, mut bus) = setup(&[0x9E, 0x00, 0x12, 0x9B, 0x00, 0x12]);
    cpu.regs.x = 0xFF;
    cpu.regs.y = 0x05;
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(bus.peek(0x1205), 0x13);

    // TAS $1200,Y: S = A & X, then store S & $13
    cpu.regs.a = 0xF1;
    cpu.regs.x = 0x3F;
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(cpu.regs.s, 0x31);
    assert_eq!(bus.peek(0x1205), 0x11);
}

#[test]
fn test_unstable_store_page_cross_corrupts_high_byte() {
    // SHX $12F8,Y with Y=$10 targets $1308; the stored X & $13 = $03
    // becomes the high byte.
    let (mut cpu, mut bus) = setup(&[0x9E, 0xF8, 0x12, 0x9C, 0xF8, 0x12]);
    cpu.regs.x = 0x0F;
    cpu.regs.y = 0x10;
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(bus.peek(0x0308), 0x03);
    assert_eq!(bus.peek(0x1308), 0x00);

    // SHY $12F8,X with X=$0F targets $1307; Y & $13 = $01 lands at $0107.
    cpu.regs.y = 0x21;
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(bus.peek(0x0107), 0x01);
    assert_eq!(bus.peek(0x1307), 0x00);
}

#[test]
fn test_nop_variants_consume_operands() {
    // NOP #imm; NOP zp; NOP abs,X crossing a page; NOP implied ($1A)
    let (mut cpu, mut bus) = setup(&[0x80, 0xFF, 0x04, 0x10, 0x1C, 0xFF, 0x12, 0x1A]);
    cpu.regs.x = 0x01;
    assert_eq!(cpu.step(&mut bus), 2);
    assert_eq!(cpu.step(&mut bus), 3);
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(cpu.step(&mut bus), 2);
    assert_eq!(cpu.regs.pc, 0x0208);
}

#[test]
fn test_jam_halts_until_reset() {
    let (mut cpu, mut bus) = setup(&[0x02, 0xEA]);
    bus.poke(0xFFFC, 0x00);
    bus.poke(0xFFFD, 0x02);
    cpu.step(&mut bus);
    assert!(cpu.is_jammed());
    for _ in 0..10 {
        assert_eq!(cpu.step(&mut bus), 1);
    }
    assert_eq!(cpu.regs.pc, 0x0200);

    bus.nmi = true;
    cpu.step(&mut bus);
    assert!(cpu.is_jammed(), "interrupts do not wake a jammed CPU");

    cpu.reset(&mut bus);
    assert!(!cpu.is_jammed());
}

// Interrupts

fn with_vectors(bus: &mut SimpleBus) {
    bus.poke(0xFFFA, 0x00);
    bus.poke(0xFFFB, 0x05); // NMI -> $0500
    bus.poke(0xFFFE, 0x00);
    bus.poke(0xFFFF, 0x06); // IRQ -> $0600
}

#[test]
fn test_irq_taken_when_unmasked() {
    let (mut cpu, mut bus) = setup(&[0xEA, 0xEA]);
    with_vectors(&mut bus);
    cpu.regs.s = 0xFF;
    bus.irq = true;
    assert_eq!(cpu.step(&mut bus), 7);
    assert_eq!(cpu.regs.pc, 0x0600);
    assert_eq!(bus.peek(0x01FD) & flags::B, 0, "IRQ pushes B clear");
    assert!(cpu.regs.p.is_set(flags::I));
}

#[test]
fn test_irq_masked_by_i() {
    let (mut cpu, mut bus) = setup(&[0xEA, 0xEA]);
    with_vectors(&mut bus);
    cpu.regs.p.set_if(flags::I, true);
    cpu.step(&mut bus);
    bus.irq = true;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0202);
}

#[test]
fn test_cli_delays_irq_by_one_instruction() {
    // CLI; NOP; NOP with IRQ already held
    let (mut cpu, mut bus) = setup(&[0x58, 0xEA, 0xEA]);
    with_vectors(&mut bus);
    cpu.regs.p.set_if(flags::I, true);
    bus.irq = true;

    cpu.step(&mut bus); // CLI
    cpu.step(&mut bus); // NOP still runs
    assert_eq!(cpu.regs.pc, 0x0202);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0600);
}

#[test]
fn test_nmi_is_edge_triggered() {
    let (mut cpu, mut bus) = setup(&[0xEA; 16]);
    with_vectors(&mut bus);
    bus.load(0x0500, &[0xEA; 8]);
    bus.nmi = true;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0500);

    // Line still held: no second NMI.
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0502);

    // Release and assert again: one more.
    bus.nmi = false;
    cpu.step(&mut bus);
    bus.nmi = true;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0500);
}

#[test]
fn test_nmi_wins_simultaneous_irq_by_default() {
    let (mut cpu, mut bus) = setup(&[0xEA]);
    with_vectors(&mut bus);
    bus.irq = true;
    bus.nmi = true;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0500);
}

#[test]
fn test_irq_priority_keeps_nmi_latched() {
    let (_, mut bus) = setup(&[0xEA]);
    with_vectors(&mut bus);
    bus.poke(0x0600, 0xEA);
    let mut cpu = Mos6502::with_config(CpuConfig {
        interrupt_priority: InterruptPriority::Irq,
        ..CpuConfig::default()
    });
    cpu.regs.pc = 0x0200;
    cpu.regs.p.set_if(flags::I, false);

    bus.irq = true;
    bus.nmi = true;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0600);
    assert!(cpu.nmi_pending());
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x0500);
}

/// Bus that records every write, for checking read-modify-write traffic.
struct RecordingBus {
    inner: SimpleBus,
    writes: Vec<(u16, u8)>,
}

impl Bus for RecordingBus {
    fn read(&mut self, address: u16) -> u8 {
        self.inner.read(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.writes.push((address, value));
        self.inner.write(address, value);
    }

    fn poll_interrupts(&mut self) -> InterruptLines {
        InterruptLines::default()
    }
}

#[test]
fn test_rmw_writes_old_value_first() {
    let mut bus = RecordingBus {
        inner: SimpleBus::new(),
        writes: Vec::new(),
    };
    bus.inner.load(0x0200, &[0xEE, 0x19, 0xD0]); // INC $D019
    bus.inner.poke(0xD019, 0x81);
    let mut cpu = Mos6502::new();
    cpu.regs.pc = 0x0200;
    assert_eq!(cpu.step(&mut bus), 6);
    assert_eq!(bus.writes, vec![(0xD019, 0x81), (0xD019, 0x82)]);
}
