//! Whole-machine scenarios without ROMs: code and vectors live in RAM.

use dallas_ds1302::{RtcConfig, RtcTime};
use emu_core::{Bus, Observable, Value};
use machine_c64::{C64, ConfigError, InputEvent, JoystickState, MachineConfig};
use raster_cache::{ChannelSink, FrameStatus, NullSink};

const CODE: u16 = 0xC000;
const HANDLER: u16 = 0xC100;

/// Machine with `code` at $C000, `handler` behind the IRQ vector and the
/// CPU about to run $C000.
fn machine_with(config: MachineConfig, code: &[u8], handler: &[u8]) -> C64 {
    let mut c64 = C64::new(config);
    load(&mut c64, CODE, code);
    load(&mut c64, HANDLER, handler);
    load(&mut c64, 0xFFFE, &HANDLER.to_le_bytes());
    load(&mut c64, 0xFFFA, &HANDLER.to_le_bytes());
    c64.cpu_mut().regs.pc = CODE;
    c64
}

fn load(c64: &mut C64, addr: u16, bytes: &[u8]) {
    for (i, &b) in bytes.iter().enumerate() {
        c64.poke(addr + i as u16, b);
    }
}

/// INC $02; LDA $DC0D; RTI
const COUNT_CIA1: [u8; 7] = [0xEE, 0x02, 0x00, 0xAD, 0x0D, 0xDC, 0x40];

#[test]
fn cia1_timer_irq_every_latch_plus_one() {
    #[rustfmt::skip]
    let code = [
        0xA9, 0x64, 0x8D, 0x04, 0xDC, // TA latch = 100
        0xA9, 0x00, 0x8D, 0x05, 0xDC,
        0xA9, 0x81, 0x8D, 0x0D, 0xDC, // enable TA interrupt
        0xA9, 0x11, 0x8D, 0x0E, 0xDC, // start, continuous, force load
        0x58,                         // CLI
        0x4C, 0x15, 0xC0,             // JMP *
    ];
    let mut c64 = machine_with(MachineConfig::default(), &code, &COUNT_CIA1);
    let report = c64.run_frame(&mut NullSink);
    let expected = report.cycles / 101;
    let count = u64::from(c64.peek(0x0002));
    assert!(
        count.abs_diff(expected) <= 1,
        "{count} interrupts in {} cycles",
        report.cycles
    );
    assert_eq!(c64.query("cia1.icr_mask"), Some(Value::U8(0x01)));
}

#[test]
fn raster_irq_once_per_frame() {
    #[rustfmt::skip]
    let code = [
        0xA9, 0x80, 0x8D, 0x12, 0xD0, // compare line $080
        0xA9, 0x1B, 0x8D, 0x11, 0xD0,
        0xA9, 0x01, 0x8D, 0x1A, 0xD0, // enable raster IRQ
        0x58,                         // CLI
        0x4C, 0x10, 0xC0,             // JMP *
    ];
    // INC $02; LDA #$01; STA $D019; RTI
    let handler = [0xEE, 0x02, 0x00, 0xA9, 0x01, 0x8D, 0x19, 0xD0, 0x40];
    let mut c64 = machine_with(MachineConfig::default(), &code, &handler);
    for _ in 0..3 {
        c64.run_frame(&mut NullSink);
    }
    assert_eq!(c64.peek(0x0002), 3);
    assert_eq!(c64.query("frames"), Some(Value::U64(3)));
}

#[test]
fn cia2_timer_raises_nmi() {
    #[rustfmt::skip]
    let code = [
        0xA9, 0xFF, 0x8D, 0x04, 0xDD,
        0xA9, 0x00, 0x8D, 0x05, 0xDD,
        0xA9, 0x81, 0x8D, 0x0D, 0xDD,
        0xA9, 0x11, 0x8D, 0x0E, 0xDD,
        0x4C, 0x14, 0xC0,             // JMP *, I stays set
    ];
    // INC $02; LDA $DD0D; RTI
    let handler = [0xEE, 0x02, 0x00, 0xAD, 0x0D, 0xDD, 0x40];
    let mut c64 = machine_with(MachineConfig::default(), &code, &handler);
    let report = c64.run_frame(&mut NullSink);
    let count = u64::from(c64.peek(0x0002));
    assert!(count.abs_diff(report.cycles / 256) <= 1, "{count} NMIs");
}

/// JMP * at $C000 with a text screen: characters at $1000, code 1 solid.
fn text_machine() -> C64 {
    let mut c64 = machine_with(MachineConfig::default(), &[0x4C, 0x00, 0xC0], &[0x40]);
    load(&mut c64, 0x1008, &[0xFF; 8]);
    let bus = c64.bus_mut();
    bus.write(0xD011, 0x1B);
    bus.write(0xD016, 0x08);
    bus.write(0xD018, 0x14);
    bus.write(0xD020, 0x0E);
    bus.write(0xD021, 0x06);
    c64
}

#[test]
fn unchanged_frames_carry_no_dirty_lines() {
    let mut c64 = text_machine();
    let first = c64.run_frame(&mut NullSink);
    assert_eq!(first.dirty_lines, 284);
    let idle = c64.run_frame(&mut NullSink);
    assert_eq!(idle.dirty_lines, 0);

    c64.poke(0x0400, 0x01);
    c64.bus_mut().write(0xD800, 0x01);
    let one_char = c64.run_frame(&mut NullSink);
    assert_eq!(one_char.dirty_lines, 8);

    let rows = c64.bus().vic.cache();
    let spans: Vec<_> = rows.dirty_lines().collect();
    assert!(spans.is_empty(), "spans cleared on present");
    assert_eq!(c64.run_frame(&mut NullSink).dirty_lines, 0);
}

#[test]
fn channel_sink_hands_frames_to_host_thread() {
    let mut c64 = text_machine();
    let (mut sink, frames) = ChannelSink::channel();
    let host = std::thread::spawn(move || {
        let first = frames.recv().map(|f| f.lines.len());
        let second = frames.recv().map(|f| f.lines.len());
        (first.ok(), second.ok())
    });
    // Frames the host was too slow for are dropped, never waited on.
    let mut presented = 0;
    while presented < 2 {
        if c64.run_frame(&mut sink).status == Some(FrameStatus::Presented) {
            presented += 1;
        }
    }
    let (first, second) = host.join().expect("host thread");
    assert_eq!(first, Some(284));
    assert_eq!(second, Some(0));
}

#[test]
fn keyboard_and_joystick_events_reach_cia1() {
    #[rustfmt::skip]
    let code = [
        0xA9, 0xFF, 0x8D, 0x02, 0xDC, // port A out
        0xA9, 0x00, 0x8D, 0x03, 0xDC, // port B in
        0xA9, 0xFD, 0x8D, 0x00, 0xDC, // select row 1
        0xAD, 0x01, 0xDC,             // LDA $DC01
        0x85, 0x03,                   // STA $03
        0x4C, 0x0F, 0xC0,
    ];
    let mut c64 = machine_with(MachineConfig::default(), &code, &[0x40]);
    let input = c64.input_sender();

    input.send(InputEvent::Key {
        row: 1,
        col: 4,
        pressed: true,
    });
    c64.run_frame(&mut NullSink);
    assert_eq!(c64.peek(0x0003), 0xEF);

    input.send(InputEvent::Joystick {
        port: 1,
        state: JoystickState {
            right: true,
            ..JoystickState::default()
        },
    });
    c64.run_frame(&mut NullSink);
    assert_eq!(c64.peek(0x0003), 0xE7);

    input.send(InputEvent::Key {
        row: 1,
        col: 4,
        pressed: false,
    });
    c64.run_frame(&mut NullSink);
    assert_eq!(c64.peek(0x0003), 0xF7);
}

#[test]
fn joystick_two_reads_on_port_a() {
    // LDA $DC00; STA $03; JMP $C000
    let code = [0xAD, 0x00, 0xDC, 0x85, 0x03, 0x4C, 0x00, 0xC0];
    let mut c64 = machine_with(MachineConfig::default(), &code, &[0x40]);
    c64.input_queue().push(InputEvent::Joystick {
        port: 2,
        state: JoystickState {
            fire: true,
            up: true,
            ..JoystickState::default()
        },
    });
    c64.run_frame(&mut NullSink);
    assert_eq!(c64.peek(0x0003) & 0x1F, 0x0E);
}

/// Host side of the three-wire protocol on $DE00.
fn rtc_read_register(bus: &mut impl Bus, command: u8) -> u8 {
    const CE: u8 = 0x04;
    const SCLK: u8 = 0x02;
    bus.write(0xDE00, CE);
    for bit in 0..8 {
        let io = (command >> bit) & 1;
        bus.write(0xDE00, CE | io);
        bus.write(0xDE00, CE | SCLK | io);
    }
    let mut value = 0;
    for bit in 0..8 {
        bus.write(0xDE00, CE);
        value |= (bus.read(0xDE00) & 1) << bit;
        bus.write(0xDE00, CE | SCLK);
    }
    bus.write(0xDE00, 0);
    value
}

#[test]
fn rtc_registers_through_clock_port() {
    let config = MachineConfig {
        rtc: Some(RtcConfig {
            start: RtcTime {
                hours: 23,
                minutes: 59,
                seconds: 42,
                ..RtcTime::default()
            },
            ..RtcConfig::default()
        }),
        ..MachineConfig::default()
    };
    let mut c64 = machine_with(config, &[0x4C, 0x00, 0xC0], &[0x40]);
    assert_eq!(rtc_read_register(c64.bus_mut(), 0x81), 0x42);
    assert_eq!(rtc_read_register(c64.bus_mut(), 0x83), 0x59);
    assert_eq!(rtc_read_register(c64.bus_mut(), 0x85), 0x23);

    // One emulated second is 985,248 cycles: about 50 PAL frames.
    for _ in 0..51 {
        c64.run_frame(&mut NullSink);
    }
    assert_eq!(rtc_read_register(c64.bus_mut(), 0x81), 0x43);
    assert_eq!(c64.query("rtc.seconds"), Some(Value::U8(43)));
}

#[test]
fn absent_chips_return_open_bus() {
    // LDA $DE00; STA $04; LDA $DF00; STA $05; JMP *
    let code = [
        0xAD, 0x00, 0xDE, 0x85, 0x04, 0xAD, 0x00, 0xDF, 0x85, 0x05, 0x4C, 0x0A, 0xC0,
    ];
    let mut c64 = machine_with(MachineConfig::default(), &code, &[0x40]);
    for _ in 0..5 {
        c64.step();
    }
    // The last byte on the bus was the high byte of the operand.
    assert_eq!(c64.peek(0x0004), 0xDE);
    assert_eq!(c64.peek(0x0005), 0xDF);
}

#[test]
fn expansion_via_drives_irq() {
    #[rustfmt::skip]
    let code = [
        0xA9, 0x40, 0x8D, 0x0B, 0xDF, // ACR: T1 free-run
        0xA9, 0xC0, 0x8D, 0x0E, 0xDF, // IER: T1
        0xA9, 0xFE, 0x8D, 0x04, 0xDF,
        0xA9, 0x00, 0x8D, 0x05, 0xDF, // T1 = 254, starts
        0x58,
        0x4C, 0x15, 0xC0,
    ];
    // INC $02; LDA $DF04; RTI
    let handler = [0xEE, 0x02, 0x00, 0xAD, 0x04, 0xDF, 0x40];
    let config = MachineConfig {
        via: true,
        ..MachineConfig::default()
    };
    let mut c64 = machine_with(config, &code, &handler);
    let report = c64.run_frame(&mut NullSink);
    let count = u64::from(c64.peek(0x0002));
    assert!(count.abs_diff(report.cycles / 256) <= 1, "{count} VIA interrupts");
}

#[test]
fn toml_config_with_bad_rtc_runs_without_it() {
    let config = MachineConfig::from_toml_str(
        r"
        via = true
        [rtc]
        cycles_per_second = 0
        ",
    );
    let Ok(config) = config else {
        panic!("parse failed: {config:?}");
    };
    let mut c64 = machine_with(config, &[0x4C, 0x00, 0xC0], &[0x40]);
    assert!(matches!(c64.config_errors(), [ConfigError::Rtc(_)]));
    assert!(c64.bus().rtc.is_none());
    assert!(c64.bus().via.is_some());
    assert_eq!(
        c64.run_frame(&mut NullSink).status,
        Some(FrameStatus::Presented)
    );
}

#[test]
fn stop_from_another_thread() {
    let mut c64 = machine_with(MachineConfig::default(), &[0x4C, 0x00, 0xC0], &[0x40]);
    let stop = c64.stop_handle();
    std::thread::spawn(move || stop.request_stop())
        .join()
        .expect("stop thread");
    let report = c64.run_frame(&mut NullSink);
    assert_eq!(report.status, None);
    assert_eq!(c64.cpu().regs.pc, CODE);
}

#[test]
fn prg_load_lands_under_roms() {
    let mut c64 = machine_with(MachineConfig::default(), &[0x4C, 0x00, 0xC0], &[0x40]);
    assert_eq!(c64.load_prg(&[0x01, 0x08, 0xAA, 0xBB]), Ok(0x0801));
    assert_eq!(c64.peek(0x0802), 0xBB);
    assert!(c64.load_prg(&[0x01]).is_err());
}
