//! Top-level C64 system.
//!
//! # Step loop
//!
//! Each [`C64::step`]:
//! 1. Apply queued host input to the keyboard matrix and control ports
//! 2. Take a pending reset request
//! 3. CPU: sample IRQ/NMI, execute one instruction (or interrupt entry)
//! 4. Bus: advance the scheduler by the instruction's cycles, firing CIA,
//!    VIA, RTC and raster alarms in trigger order
//!
//! A frame ends with the alarm that closes the last raster line.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use emu_core::{Cpu, Observable, Value};
use mos_6502::Mos6502;
use raster_cache::{FrameSink, FrameStatus};

use crate::bus::C64Bus;
use crate::config::{ConfigError, MachineConfig, Roms};
use crate::input::{InputEvent, InputQueue, InputSender};
use crate::memory::C64Memory;
use crate::prg::{self, LoadError};

/// What one call to [`C64::run_frame`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub cycles: u64,
    /// Lines with changed pixels in the frame.
    pub dirty_lines: usize,
    /// `None` when a stop request ended the run before the frame completed.
    pub status: Option<FrameStatus>,
}

/// Cloneable handle that stops a running machine at the next instruction
/// boundary.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// C64 system.
pub struct C64 {
    cpu: Mos6502,
    bus: C64Bus,
    /// Applied configuration, without the ROM images.
    config: MachineConfig,
    config_errors: Vec<ConfigError>,
    input: InputQueue,
    stop: StopHandle,
    reset_requested: bool,
    jam_reported: bool,
}

impl C64 {
    /// Build and reset a machine.
    ///
    /// Configuration problems never fail construction: each one is logged,
    /// kept in [`config_errors`](Self::config_errors), and the machine runs
    /// without the affected part.
    #[must_use]
    pub fn new(mut config: MachineConfig) -> Self {
        let mut errors = Vec::new();
        let roms = std::mem::take(&mut config.roms).validated(&mut errors);
        let bus = Self::build_bus(C64Memory::new(roms), &config, &mut errors);

        let mut c64 = Self {
            cpu: Mos6502::with_config(config.cpu),
            bus,
            config,
            config_errors: Vec::new(),
            input: InputQueue::new(),
            stop: StopHandle::default(),
            reset_requested: false,
            jam_reported: false,
        };
        c64.report(errors);
        c64.cpu.reset(&mut c64.bus);
        log::debug!(
            "C64: {:?}, reset vector ${:04X}",
            c64.config.standard,
            c64.cpu.regs.pc
        );
        c64
    }

    fn build_bus(memory: C64Memory, config: &MachineConfig, errors: &mut Vec<ConfigError>) -> C64Bus {
        let mut bus = C64Bus::new(memory, config.standard, config.cia(errors));
        if let Some(rtc) = config.rtc {
            if let Err(e) = bus.attach_rtc(rtc) {
                errors.push(e.into());
            }
        }
        if config.via {
            bus.attach_via();
        }
        bus
    }

    fn report(&mut self, errors: Vec<ConfigError>) {
        for error in &errors {
            log::warn!("C64: {error}");
        }
        self.config_errors = errors;
    }

    /// Problems found by the latest construction or reconfiguration.
    #[must_use]
    pub fn config_errors(&self) -> &[ConfigError] {
        &self.config_errors
    }

    #[must_use]
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Apply a new configuration at an instruction boundary. The ROM
    /// images in `config` are ignored; those from construction stay.
    ///
    /// A different video standard or TOD rate rebuilds the chips and
    /// resets the CPU, keeping RAM. CPU options and the optional chips
    /// change in place.
    pub fn reconfigure(&mut self, mut config: MachineConfig) {
        config.roms = Roms::default();
        let mut errors = Vec::new();
        let rebuild =
            config.standard != self.config.standard || config.tod_hz != self.config.tod_hz;

        if rebuild {
            log::debug!("C64: rebuilding for {:?}", config.standard);
            let mut memory = std::mem::replace(&mut self.bus.memory, C64Memory::new(Roms::default()));
            memory.reset();
            self.bus = Self::build_bus(memory, &config, &mut errors);
        } else {
            if config.rtc != self.config.rtc {
                match config.rtc {
                    Some(rtc) => {
                        if let Err(e) = self.bus.attach_rtc(rtc) {
                            errors.push(e.into());
                        }
                    }
                    None => self.bus.detach_rtc(),
                }
            }
            if config.via {
                self.bus.attach_via();
            } else {
                self.bus.detach_via();
            }
        }
        if config.cpu != self.config.cpu {
            self.cpu.reconfigure(config.cpu);
        }

        self.config = config;
        self.report(errors);
        if rebuild {
            self.cpu.reset(&mut self.bus);
            self.jam_reported = false;
        }
    }

    /// Execute one instruction. Returns its cycles.
    pub fn step(&mut self) -> u32 {
        self.apply_input();
        if std::mem::take(&mut self.reset_requested) {
            self.reset();
        }
        let cycles = self.cpu.step(&mut self.bus);
        if self.cpu.is_jammed() && !self.jam_reported {
            log::warn!(
                "C64: CPU jammed by opcode ${:02X} at ${:04X}",
                self.cpu.last_opcode(),
                self.cpu.regs.pc.wrapping_sub(1)
            );
            self.jam_reported = true;
        }
        cycles
    }

    /// Run until the VIC-II completes a frame, then hand it to `sink`.
    ///
    /// A stop request ends the run early at an instruction boundary; the
    /// partial frame is not presented.
    pub fn run_frame(&mut self, sink: &mut dyn FrameSink) -> FrameReport {
        if sink.take_full_refresh_request() {
            self.bus.vic.invalidate_cache();
        }
        let start = self.bus.elapsed();
        loop {
            if self.stop.take() {
                log::debug!("C64: stopped at ${:04X}", self.cpu.regs.pc);
                return FrameReport {
                    cycles: self.bus.elapsed() - start,
                    dirty_lines: self.bus.vic.dirty_line_count(),
                    status: None,
                };
            }
            self.step();
            if self.bus.take_frame_complete() {
                break;
            }
        }

        let dirty_lines = self.bus.vic.dirty_line_count();
        let status = self.bus.vic.present(sink);
        if status == FrameStatus::Dropped {
            log::trace!("C64: frame {} dropped by sink", self.bus.vic.frame_number());
        }
        FrameReport {
            cycles: self.bus.elapsed() - start,
            dirty_lines,
            status: Some(status),
        }
    }

    fn apply_input(&mut self) {
        while let Some(event) = self.input.pop() {
            match event {
                InputEvent::Key { row, col, pressed } => {
                    self.bus.keyboard.set_key(row, col, pressed);
                }
                InputEvent::Joystick { port: 1, state } => self.bus.joysticks[0] = state,
                InputEvent::Joystick { port: 2, state } => self.bus.joysticks[1] = state,
                InputEvent::Joystick { port, .. } => {
                    log::debug!("C64: no control port {port}");
                }
            }
        }
    }

    fn reset(&mut self) {
        log::debug!("C64: reset");
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
        self.jam_reported = false;
    }

    /// Stop [`run_frame`](Self::run_frame) at the next instruction.
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// Handle for stopping the machine from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Reset the machine before the next instruction. RAM and the RTC's
    /// time survive.
    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    #[must_use]
    pub fn input_queue(&self) -> &InputQueue {
        &self.input
    }

    /// Handle for queueing input from another thread.
    #[must_use]
    pub fn input_sender(&self) -> InputSender {
        self.input.sender()
    }

    /// Load a PRG image into RAM.
    ///
    /// # Errors
    ///
    /// [`LoadError`] if the image has no data or runs past $FFFF.
    pub fn load_prg(&mut self, data: &[u8]) -> Result<u16, LoadError> {
        prg::load_prg(&mut self.bus.memory, data)
    }

    #[must_use]
    pub fn cpu(&self) -> &Mos6502 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Mos6502 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &C64Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut C64Bus {
        &mut self.bus
    }

    /// Write to RAM, underneath any ROM or I/O.
    pub fn poke(&mut self, addr: u16, value: u8) {
        self.bus.memory.ram_write(addr, value);
    }

    /// Side-effect-free read as the CPU would see it.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        self.bus.peek(addr)
    }

    /// Cycles since power-on.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.bus.elapsed()
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.bus.vic.frame_number()
    }
}

fn parse_address(text: &str) -> Option<u16> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = text.strip_prefix('$') {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

impl Observable for C64 {
    fn query(&self, path: &str) -> Option<Value> {
        let sched = self.bus.scheduler();
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("vic.") {
            self.bus.vic.query(rest)
        } else if let Some((cia, rest)) = path
            .strip_prefix("cia1.")
            .map(|rest| (&self.bus.cia1, rest))
            .or_else(|| path.strip_prefix("cia2.").map(|rest| (&self.bus.cia2, rest)))
        {
            match rest {
                "timer_a" => Some(cia.timer_a(sched).into()),
                "timer_b" => Some(cia.timer_b(sched).into()),
                "icr_status" => Some(cia.icr_status().into()),
                "icr_mask" => Some(cia.icr_mask().into()),
                "irq" => Some(cia.irq_active().into()),
                "tod" => {
                    let [tenths, seconds, minutes, hours] = cia.tod();
                    Some(
                        format!("{hours:02X}:{minutes:02X}:{seconds:02X}.{tenths:X}")
                            .as_str()
                            .into(),
                    )
                }
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("via.") {
            let via = self.bus.via.as_ref()?;
            match rest {
                "ifr" => Some(via.ifr().into()),
                "ier" => Some(via.ier().into()),
                "acr" => Some(via.acr().into()),
                "timer1" => Some(via.timer1_counter(sched).into()),
                "timer2" => Some(via.timer2_counter(sched).into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("rtc.") {
            let rtc = self.bus.rtc.as_ref()?;
            let time = rtc.time();
            match rest {
                "year" => Some(time.year.into()),
                "month" => Some(time.month.into()),
                "date" => Some(time.date.into()),
                "day" => Some(time.day.into()),
                "hours" => Some(time.hours.into()),
                "minutes" => Some(time.minutes.into()),
                "seconds" => Some(time.seconds.into()),
                "halted" => Some(rtc.is_halted().into()),
                "write_protected" => Some(rtc.is_write_protected().into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_address(rest).map(|addr| Value::U8(self.bus.peek(addr)))
        } else {
            match path {
                "cycles" => Some(self.cycles().into()),
                "frames" => Some(self.frame_count().into()),
                "rebases" => Some(sched.rebase_count().into()),
                "alarms" => Some((sched.pending() as u64).into()),
                _ => self.cpu.query(path),
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<6502_paths>",
            "vic.<vic_paths>",
            "cia{1,2}.timer_a",
            "cia{1,2}.timer_b",
            "cia{1,2}.icr_status",
            "cia{1,2}.icr_mask",
            "cia{1,2}.irq",
            "cia{1,2}.tod",
            "via.ifr",
            "via.ier",
            "via.acr",
            "via.timer1",
            "via.timer2",
            "rtc.year",
            "rtc.month",
            "rtc.date",
            "rtc.day",
            "rtc.hours",
            "rtc.minutes",
            "rtc.seconds",
            "rtc.halted",
            "rtc.write_protected",
            "memory.<address>",
            "cycles",
            "frames",
            "rebases",
            "alarms",
        ]
    }
}
