//! Dallas DS1302 (and DS1202) serial real-time clock.
//!
//! The chip talks over three lines: CE (chip enable), SCLK (serial clock)
//! and a bidirectional IO line. Raising CE starts a transfer. The host then
//! clocks in a command byte LSB first, one bit per rising SCLK edge:
//!
//! | Bit | Meaning                                  |
//! |-----|------------------------------------------|
//! | 7   | Must be 1, otherwise the transfer is ignored |
//! | 6   | 1 = RAM, 0 = clock/calendar              |
//! | 5-1 | Register address (31 = burst)            |
//! | 0   | 1 = read, 0 = write                      |
//!
//! A write is followed by the data byte, clocked in the same way. A read
//! presents the data on IO, one bit per pulse. In burst mode the transfer
//! runs through the eight clock registers or the whole RAM. Dropping CE
//! aborts whatever was in progress.
//!
//! Time keeping is a once-a-second scheduler alarm. Setting the clock halt
//! bit in the seconds register stops the calendar without stopping the
//! alarm.

use std::fmt;
use std::hash::Hash;

use emu_core::{Cycle, Observable, Scheduler, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod clock;

pub use clock::RtcTime;

use clock::{CH, CONTROL, SECONDS, TRICKLE, WP};

/// Number of clock registers moved by a clock burst.
const CLOCK_BURST_LEN: usize = 8;
const BURST: u8 = 31;

/// The one alarm an RTC owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RtcEvent {
    Tick,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RtcModel {
    /// 31 bytes of RAM and a trickle-charge register.
    #[default]
    Ds1302,
    /// 24 bytes of RAM, no trickle charger.
    Ds1202,
}

impl RtcModel {
    #[must_use]
    pub fn ram_size(self) -> usize {
        match self {
            Self::Ds1302 => 31,
            Self::Ds1202 => 24,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtcConfig {
    pub model: RtcModel,
    /// Machine cycles per RTC second.
    pub cycles_per_second: u32,
    pub start: RtcTime,
    /// Start with the clock halt bit set.
    pub halted: bool,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            model: RtcModel::Ds1302,
            cycles_per_second: 985_248,
            start: RtcTime::default(),
            halted: false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RtcError {
    #[error("RTC tick rate must be at least one cycle per second")]
    ZeroRate,
    #[error("RTC start time has {field} = {value}, which is out of range")]
    InvalidTime { field: &'static str, value: u8 },
}

/// Where the current transfer points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Target {
    ram: bool,
    burst: bool,
    /// Register or RAM index. Advances through a burst.
    index: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// CE low.
    Idle,
    ReceivingCommand { shift: u8, bits: u8 },
    ReceivingData { target: Target, shift: u8, bits: u8 },
    TransmittingData { target: Target, bit: u8 },
    /// Command without bit 7, or past the end of a transfer. Pulses do
    /// nothing until CE drops.
    Ignoring,
}

/// Serial real-time clock.
pub struct Ds1302<E> {
    model: RtcModel,
    cycles_per_second: u32,
    event: fn(RtcEvent) -> E,
    state: State,

    /// Seconds, minutes, hours, date, month, day, year, control, trickle.
    clock: [u8; 9],
    ram: [u8; 31],
    /// Clock registers frozen when a burst read starts.
    burst_latch: [u8; CLOCK_BURST_LEN],

    ce: bool,
    sclk: bool,
    /// Level the host last drove onto IO.
    io_in: bool,
    /// Level the chip drives while transmitting.
    io_out: bool,
}

impl<E: Copy + Eq + Hash + fmt::Debug> Ds1302<E> {
    /// Build a powered-up RTC and register its first tick.
    ///
    /// # Errors
    ///
    /// [`RtcError`] if the tick rate is zero or the start time is invalid.
    pub fn new(
        config: RtcConfig,
        event: fn(RtcEvent) -> E,
        sched: &mut Scheduler<E>,
    ) -> Result<Self, RtcError> {
        if config.cycles_per_second == 0 {
            return Err(RtcError::ZeroRate);
        }
        config.start.validate()?;

        let mut clock = [0; 9];
        clock[..7].copy_from_slice(&config.start.to_registers(config.halted));
        log::debug!(
            "RTC: {:?} starting at {:?}{}",
            config.model,
            config.start,
            if config.halted { " (halted)" } else { "" }
        );

        sched.register_in(config.cycles_per_second, event(RtcEvent::Tick));
        Ok(Self {
            model: config.model,
            cycles_per_second: config.cycles_per_second,
            event,
            state: State::Idle,
            clock,
            ram: [0; 31],
            burst_latch: [0; CLOCK_BURST_LEN],
            ce: false,
            sclk: false,
            io_in: false,
            io_out: false,
        })
    }

    #[must_use]
    pub fn model(&self) -> RtcModel {
        self.model
    }

    /// Abort any transfer. Time and RAM are battery-backed and survive.
    pub fn reset_lines(&mut self) {
        self.state = State::Idle;
        self.ce = false;
        self.sclk = false;
        self.io_out = false;
    }

    /// Drive the three lines. A CE edge restarts the protocol; a rising
    /// SCLK edge with CE high is one clock pulse.
    pub fn set_lines(&mut self, ce: bool, sclk: bool, io: bool) {
        self.io_in = io;
        if ce != self.ce {
            self.ce = ce;
            self.sclk = sclk;
            self.io_out = false;
            self.state = if ce {
                State::ReceivingCommand { shift: 0, bits: 0 }
            } else {
                State::Idle
            };
            return;
        }
        let rising = sclk && !self.sclk;
        self.sclk = sclk;
        if ce && rising {
            self.clock_pulse(io);
        }
    }

    /// Level on IO as seen by the host.
    #[must_use]
    pub fn read_data_line(&self) -> bool {
        match self.state {
            State::TransmittingData { .. } => self.io_out,
            _ => self.io_in,
        }
    }

    /// Handle the tick alarm registered for `at`.
    pub fn on_alarm(&mut self, event: RtcEvent, at: Cycle, sched: &mut Scheduler<E>) {
        let RtcEvent::Tick = event;
        if self.clock[SECONDS] & CH == 0 {
            clock::tick_second(&mut self.clock);
        }
        sched.register_alarm(at + self.cycles_per_second, (self.event)(RtcEvent::Tick));
    }

    /// Current calendar time.
    #[must_use]
    pub fn time(&self) -> RtcTime {
        RtcTime::from_registers(&self.clock)
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.clock[SECONDS] & CH != 0
    }

    #[must_use]
    pub fn is_write_protected(&self) -> bool {
        self.clock[CONTROL] & WP != 0
    }

    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram[..self.model.ram_size()]
    }

    /// Raw clock register, for debuggers.
    #[must_use]
    pub fn clock_register(&self, index: usize) -> Option<u8> {
        self.clock.get(index).copied()
    }

    fn clock_pulse(&mut self, io: bool) {
        let state = self.state;
        self.state = match state {
            State::Idle | State::Ignoring => state,
            State::ReceivingCommand { shift, bits } => {
                let shift = shift | (u8::from(io) << bits);
                if bits == 7 {
                    self.decode(shift)
                } else {
                    State::ReceivingCommand {
                        shift,
                        bits: bits + 1,
                    }
                }
            }
            State::ReceivingData {
                target,
                shift,
                bits,
            } => {
                let shift = shift | (u8::from(io) << bits);
                if bits < 7 {
                    State::ReceivingData {
                        target,
                        shift,
                        bits: bits + 1,
                    }
                } else {
                    self.store(target, shift);
                    match self.next_in_burst(target) {
                        Some(target) => State::ReceivingData {
                            target,
                            shift: 0,
                            bits: 0,
                        },
                        None => State::Ignoring,
                    }
                }
            }
            State::TransmittingData { target, bit } => {
                if bit < 7 {
                    self.present(target, bit + 1);
                    State::TransmittingData {
                        target,
                        bit: bit + 1,
                    }
                } else if let Some(target) = self.next_in_burst(target) {
                    self.present(target, 0);
                    State::TransmittingData { target, bit: 0 }
                } else {
                    State::Ignoring
                }
            }
        };
    }

    fn decode(&mut self, command: u8) -> State {
        if command & 0x80 == 0 {
            log::trace!("RTC: command ${command:02X} without bit 7 ignored");
            return State::Ignoring;
        }
        let address = (command >> 1) & 0x1F;
        let burst = address == BURST;
        let target = Target {
            ram: command & 0x40 != 0,
            burst,
            index: if burst { 0 } else { address },
        };
        if command & 0x01 == 0 {
            return State::ReceivingData {
                target,
                shift: 0,
                bits: 0,
            };
        }
        if burst && !target.ram {
            self.burst_latch
                .copy_from_slice(&self.clock[..CLOCK_BURST_LEN]);
        }
        self.present(target, 0);
        State::TransmittingData { target, bit: 0 }
    }

    fn next_in_burst(&self, target: Target) -> Option<Target> {
        if !target.burst {
            return None;
        }
        let len = if target.ram {
            self.model.ram_size()
        } else {
            CLOCK_BURST_LEN
        };
        let index = target.index + 1;
        (usize::from(index) < len).then_some(Target { index, ..target })
    }

    fn load(&self, target: Target) -> u8 {
        let index = usize::from(target.index);
        if target.ram {
            return self.ram().get(index).copied().unwrap_or(0);
        }
        if target.burst {
            return self.burst_latch[index];
        }
        match index {
            TRICKLE if self.model == RtcModel::Ds1202 => 0,
            _ => self.clock.get(index).copied().unwrap_or(0),
        }
    }

    fn store(&mut self, target: Target, value: u8) {
        let index = usize::from(target.index);
        let is_control = !target.ram && index == CONTROL;
        if self.is_write_protected() && !is_control {
            log::trace!("RTC: write-protected store to {target:?} dropped");
            return;
        }
        if target.ram {
            let size = self.model.ram_size();
            if let Some(cell) = self.ram[..size].get_mut(index) {
                *cell = value;
            }
            return;
        }
        match index {
            TRICKLE if target.burst || self.model == RtcModel::Ds1202 => {}
            CONTROL => self.clock[CONTROL] = value & WP,
            _ => {
                if let Some(reg) = self.clock.get_mut(index) {
                    *reg = value;
                }
            }
        }
    }

    fn present(&mut self, target: Target, bit: u8) {
        self.io_out = self.load(target) & (1 << bit) != 0;
    }
}

impl<E: Copy + Eq + Hash + fmt::Debug> Observable for Ds1302<E> {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "halted" => Some(self.is_halted().into()),
            "write_protect" => Some(self.is_write_protected().into()),
            "state" => Some(format!("{:?}", self.state).as_str().into()),
            "time" => {
                let t = self.time();
                Some(
                    format!(
                        "20{:02}-{:02}-{:02} {:02}:{:02}:{:02}",
                        t.year, t.month, t.date, t.hours, t.minutes, t.seconds
                    )
                    .as_str()
                    .into(),
                )
            }
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["halted", "write_protect", "state", "time"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Ev(RtcEvent);

    fn rtc(config: RtcConfig) -> (Ds1302<Ev>, Scheduler<Ev>) {
        let mut sched = Scheduler::new();
        let rtc = Ds1302::new(config, Ev, &mut sched).expect("valid config");
        (rtc, sched)
    }

    fn send(rtc: &mut Ds1302<Ev>, byte: u8) {
        for bit in 0..8 {
            let io = byte & (1 << bit) != 0;
            rtc.set_lines(true, false, io);
            rtc.set_lines(true, true, io);
        }
    }

    fn receive(rtc: &mut Ds1302<Ev>) -> u8 {
        let mut byte = 0;
        for bit in 0..8 {
            rtc.set_lines(true, false, false);
            if rtc.read_data_line() {
                byte |= 1 << bit;
            }
            rtc.set_lines(true, true, false);
        }
        byte
    }

    fn begin(rtc: &mut Ds1302<Ev>) {
        rtc.set_lines(false, false, false);
        rtc.set_lines(true, false, false);
    }

    #[test]
    fn single_ram_write_and_read() {
        let (mut rtc, _) = rtc(RtcConfig::default());
        begin(&mut rtc);
        send(&mut rtc, 0xC0 | (5 << 1));
        send(&mut rtc, 0xA7);
        begin(&mut rtc);
        send(&mut rtc, 0xC1 | (5 << 1));
        assert_eq!(receive(&mut rtc), 0xA7);
        assert_eq!(rtc.ram()[5], 0xA7);
    }

    #[test]
    fn command_without_bit_7_is_ignored() {
        let (mut rtc, _) = rtc(RtcConfig::default());
        begin(&mut rtc);
        send(&mut rtc, 0x40 | (2 << 1));
        assert_eq!(rtc.state, State::Ignoring);
        send(&mut rtc, 0xFF);
        assert_eq!(rtc.ram()[2], 0);
    }

    #[test]
    fn dropping_ce_aborts_transfer() {
        let (mut rtc, _) = rtc(RtcConfig::default());
        begin(&mut rtc);
        send(&mut rtc, 0xC0);
        rtc.set_lines(true, false, true);
        rtc.set_lines(true, true, true);
        rtc.set_lines(false, false, false);
        assert_eq!(rtc.state, State::Idle);
        assert_eq!(rtc.ram()[0], 0);
    }

    #[test]
    fn halted_clock_does_not_advance() {
        let (mut rtc, mut sched) = rtc(RtcConfig {
            cycles_per_second: 100,
            halted: true,
            ..RtcConfig::default()
        });
        sched.advance(1_000, |s, alarm| rtc.on_alarm(alarm.event.0, alarm.at, s));
        assert_eq!(rtc.time().seconds, 0);
        assert!(sched.is_pending(Ev(RtcEvent::Tick)));

        // Clear CH by writing the seconds register.
        begin(&mut rtc);
        send(&mut rtc, 0x80);
        send(&mut rtc, 0x00);
        sched.advance(300, |s, alarm| rtc.on_alarm(alarm.event.0, alarm.at, s));
        assert_eq!(rtc.time().seconds, 3);
    }

    #[test]
    fn write_protect_blocks_everything_but_control() {
        let (mut rtc, _) = rtc(RtcConfig::default());
        begin(&mut rtc);
        send(&mut rtc, 0x8E);
        send(&mut rtc, 0x80);
        assert!(rtc.is_write_protected());

        begin(&mut rtc);
        send(&mut rtc, 0xC0);
        send(&mut rtc, 0x55);
        assert_eq!(rtc.ram()[0], 0);

        begin(&mut rtc);
        send(&mut rtc, 0x8E);
        send(&mut rtc, 0x00);
        assert!(!rtc.is_write_protected());
    }

    #[test]
    fn ds1202_has_smaller_ram_and_no_trickle() {
        let (mut rtc, _) = rtc(RtcConfig {
            model: RtcModel::Ds1202,
            ..RtcConfig::default()
        });
        assert_eq!(rtc.ram().len(), 24);
        begin(&mut rtc);
        send(&mut rtc, 0x90);
        send(&mut rtc, 0xA5);
        begin(&mut rtc);
        send(&mut rtc, 0x91);
        assert_eq!(receive(&mut rtc), 0);
    }

    #[test]
    fn config_validation() {
        let mut sched: Scheduler<Ev> = Scheduler::new();
        let zero = RtcConfig {
            cycles_per_second: 0,
            ..RtcConfig::default()
        };
        assert_eq!(
            Ds1302::new(zero, Ev, &mut sched).err(),
            Some(RtcError::ZeroRate)
        );
        let bad_time = RtcConfig {
            start: RtcTime {
                hours: 24,
                ..RtcTime::default()
            },
            ..RtcConfig::default()
        };
        assert!(matches!(
            Ds1302::new(bad_time, Ev, &mut sched),
            Err(RtcError::InvalidTime { field: "hours", .. })
        ));
        assert_eq!(sched.pending(), 0);
    }
}
