//! MOS 6526 Complex Interface Adapter.
//!
//! Two 8-bit ports, two 16-bit interval timers, a BCD time-of-day clock
//! with alarm, a serial data register and an interrupt controller.
//!
//! # Registers
//!
//! | Reg | Read               | Write                |
//! |-----|--------------------|----------------------|
//! | $0  | Port A data        | Port A data          |
//! | $1  | Port B data        | Port B data          |
//! | $2  | Port A DDR         | Port A DDR           |
//! | $3  | Port B DDR         | Port B DDR           |
//! | $4  | Timer A low        | Timer A latch low    |
//! | $5  | Timer A high       | Timer A latch high   |
//! | $6  | Timer B low        | Timer B latch low    |
//! | $7  | Timer B high       | Timer B latch high   |
//! | $8  | TOD 10ths          | TOD/alarm 10ths      |
//! | $9  | TOD seconds        | TOD/alarm seconds    |
//! | $A  | TOD minutes        | TOD/alarm minutes    |
//! | $B  | TOD hours (PM b7)  | TOD/alarm hours      |
//! | $C  | Serial data        | Serial data          |
//! | $D  | ICR (read clears)  | ICR mask set/clear   |
//! | $E  | Control A          | Control A            |
//! | $F  | Control B          | Control B            |
//!
//! # Timers as alarms
//!
//! A running timer is not decremented every cycle. It owns a scheduler
//! alarm for the cycle it underflows on, and its counter register is worked
//! out from how far away that alarm is. A continuous timer re-registers
//! from the trigger cycle it fired for, so a coarse advance that overshoots
//! several underflows still sees each one at its exact cycle.

use std::fmt;
use std::hash::Hash;

use emu_core::{Cycle, Observable, Scheduler, Value};
use serde::{Deserialize, Serialize};

/// Interrupt source bits in the ICR.
pub mod icr {
    pub const TIMER_A: u8 = 0x01;
    pub const TIMER_B: u8 = 0x02;
    pub const TOD_ALARM: u8 = 0x04;
    pub const SERIAL: u8 = 0x08;
    pub const FLAG: u8 = 0x10;
}

const CR_START: u8 = 0x01;
const CR_ONESHOT: u8 = 0x08;
const CR_FORCE_LOAD: u8 = 0x10;
/// CRA: timer A counts CNT edges instead of cycles.
const CRA_CNT: u8 = 0x20;
/// CRA: serial port is an output.
const CRA_SP_OUT: u8 = 0x40;
/// CRA: TOD input is 50 Hz.
const CRA_TOD_50HZ: u8 = 0x80;
/// CRB: timer B input select, bits 5-6.
const CRB_INMODE: u8 = 0x60;
/// CRB: writes to TOD set the alarm.
const CRB_ALARM: u8 = 0x80;

/// Alarms a CIA owns on the machine scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CiaEvent {
    TimerA,
    TimerB,
    Tod,
}

/// Clock inputs that do not change while the machine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CiaConfig {
    /// Phase 2 clock in Hz.
    pub cpu_hz: u32,
    /// Frequency of the TOD pin (mains).
    pub tod_hz: u32,
}

impl Default for CiaConfig {
    fn default() -> Self {
        Self {
            cpu_hz: 985_248,
            tod_hz: 50,
        }
    }
}

/// One interval timer.
#[derive(Debug, Clone, Copy)]
struct Timer {
    /// Counter while no alarm is pending.
    counter: u16,
    latch: u16,
    control: u8,
}

impl Timer {
    const fn new() -> Self {
        Self {
            counter: 0xFFFF,
            latch: 0xFFFF,
            control: 0,
        }
    }

    fn oneshot(self) -> bool {
        self.control & CR_ONESHOT != 0
    }
}

/// MOS 6526 CIA.
///
/// `E` is the machine's alarm identity. The chip turns its own
/// [`CiaEvent`]s into `E` through the function given at construction.
pub struct Cia6526<E> {
    label: &'static str,
    config: CiaConfig,
    event: fn(CiaEvent) -> E,

    port_a: u8,
    port_b: u8,
    ddr_a: u8,
    ddr_b: u8,
    /// Levels driven onto the port pins from outside. Pulled up when idle.
    input_a: u8,
    input_b: u8,

    timer_a: Timer,
    timer_b: Timer,

    icr_status: u8,
    icr_mask: u8,
    sdr: u8,

    /// Time of day: 10ths, seconds, minutes, hours. BCD, PM in bit 7.
    tod: [u8; 4],
    tod_alarm: [u8; 4],
    /// Snapshot frozen by reading hours, released by reading 10ths.
    tod_latch: Option<[u8; 4]>,
    /// Stopped by writing hours, restarted by writing 10ths.
    tod_stopped: bool,
}

impl<E: Copy + Eq + Hash + fmt::Debug> Cia6526<E> {
    /// Create a CIA in its power-on state and start its TOD clock.
    #[must_use]
    pub fn new(
        label: &'static str,
        config: CiaConfig,
        event: fn(CiaEvent) -> E,
        sched: &mut Scheduler<E>,
    ) -> Self {
        let mut cia = Self {
            label,
            config,
            event,
            port_a: 0,
            port_b: 0,
            ddr_a: 0,
            ddr_b: 0,
            input_a: 0xFF,
            input_b: 0xFF,
            timer_a: Timer::new(),
            timer_b: Timer::new(),
            icr_status: 0,
            icr_mask: 0,
            sdr: 0,
            tod: [0, 0, 0, 0x01],
            tod_alarm: [0; 4],
            tod_latch: None,
            tod_stopped: false,
        };
        cia.schedule_tod(sched);
        cia
    }

    /// Return every register to its power-on value. Pending alarms are
    /// dropped and the TOD clock restarts.
    pub fn reset(&mut self, sched: &mut Scheduler<E>) {
        for ev in [CiaEvent::TimerA, CiaEvent::TimerB, CiaEvent::Tod] {
            sched.cancel_alarm((self.event)(ev));
        }
        let (label, config, event) = (self.label, self.config, self.event);
        *self = Self::new(label, config, event, sched);
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Interrupt output. CIA1 drives IRQ, CIA2 drives NMI.
    #[must_use]
    pub fn irq_active(&self) -> bool {
        self.icr_status & self.icr_mask & 0x1F != 0
    }

    /// Drive the external side of port A.
    pub fn set_port_a_input(&mut self, value: u8) {
        self.input_a = value;
    }

    /// Drive the external side of port B.
    pub fn set_port_b_input(&mut self, value: u8) {
        self.input_b = value;
    }

    /// Level on the port A pins: outputs where the DDR says so, the
    /// external input elsewhere.
    #[must_use]
    pub fn port_a_output(&self) -> u8 {
        (self.port_a & self.ddr_a) | (self.input_a & !self.ddr_a)
    }

    #[must_use]
    pub fn port_b_output(&self) -> u8 {
        (self.port_b & self.ddr_b) | (self.input_b & !self.ddr_b)
    }

    /// Pulse the FLAG input (negative edge).
    pub fn trigger_flag(&mut self) {
        self.icr_status |= icr::FLAG;
    }

    /// Current timer A counter.
    #[must_use]
    pub fn timer_a(&self, sched: &Scheduler<E>) -> u16 {
        self.counter(sched, CiaEvent::TimerA)
    }

    /// Current timer B counter.
    #[must_use]
    pub fn timer_b(&self, sched: &Scheduler<E>) -> u16 {
        self.counter(sched, CiaEvent::TimerB)
    }

    /// ICR flags without the read-clear side effect.
    #[must_use]
    pub fn icr_status(&self) -> u8 {
        self.icr_status
    }

    #[must_use]
    pub fn icr_mask(&self) -> u8 {
        self.icr_mask
    }

    /// Time of day as `[10ths, seconds, minutes, hours]`.
    #[must_use]
    pub fn tod(&self) -> [u8; 4] {
        self.tod
    }

    /// Read a register. Reading the ICR clears it.
    pub fn read(&mut self, reg: u8, sched: &Scheduler<E>) -> u8 {
        match reg & 0x0F {
            0x0 => self.port_a_output(),
            0x1 => self.port_b_output(),
            0x2 => self.ddr_a,
            0x3 => self.ddr_b,
            0x4 => self.timer_a(sched) as u8,
            0x5 => (self.timer_a(sched) >> 8) as u8,
            0x6 => self.timer_b(sched) as u8,
            0x7 => (self.timer_b(sched) >> 8) as u8,
            0x8 => {
                let value = self.tod_latch.unwrap_or(self.tod)[0];
                self.tod_latch = None;
                value
            }
            0x9 => self.tod_latch.unwrap_or(self.tod)[1],
            0xA => self.tod_latch.unwrap_or(self.tod)[2],
            0xB => {
                let latched = *self.tod_latch.get_or_insert(self.tod);
                latched[3]
            }
            0xC => self.sdr,
            0xD => {
                let value = self.peek_icr();
                self.icr_status = 0;
                value
            }
            0xE => self.timer_a.control & !CR_FORCE_LOAD,
            _ => self.timer_b.control & !CR_FORCE_LOAD,
        }
    }

    /// Read a register without side effects, for debuggers.
    #[must_use]
    pub fn peek(&self, reg: u8, sched: &Scheduler<E>) -> u8 {
        match reg & 0x0F {
            0x8..=0xB => self.tod_latch.unwrap_or(self.tod)[usize::from(reg & 0x03)],
            0xD => self.peek_icr(),
            0x4 => self.timer_a(sched) as u8,
            0x5 => (self.timer_a(sched) >> 8) as u8,
            0x6 => self.timer_b(sched) as u8,
            0x7 => (self.timer_b(sched) >> 8) as u8,
            0x0 => self.port_a_output(),
            0x1 => self.port_b_output(),
            0x2 => self.ddr_a,
            0x3 => self.ddr_b,
            0xC => self.sdr,
            0xE => self.timer_a.control & !CR_FORCE_LOAD,
            _ => self.timer_b.control & !CR_FORCE_LOAD,
        }
    }

    fn peek_icr(&self) -> u8 {
        let any = if self.irq_active() { 0x80 } else { 0x00 };
        self.icr_status | any
    }

    /// Write a register.
    pub fn write(&mut self, reg: u8, value: u8, sched: &mut Scheduler<E>) {
        log::trace!("{}: write ${:X} = ${value:02X}", self.label, reg & 0x0F);
        match reg & 0x0F {
            0x0 => self.port_a = value,
            0x1 => self.port_b = value,
            0x2 => self.ddr_a = value,
            0x3 => self.ddr_b = value,
            0x4 => self.timer_a.latch = (self.timer_a.latch & 0xFF00) | u16::from(value),
            0x5 => self.write_latch_high(CiaEvent::TimerA, value),
            0x6 => self.timer_b.latch = (self.timer_b.latch & 0xFF00) | u16::from(value),
            0x7 => self.write_latch_high(CiaEvent::TimerB, value),
            0x8..=0xB => self.write_tod(reg & 0x03, value),
            0xC => {
                self.sdr = value;
                if self.timer_a.control & CRA_SP_OUT != 0 {
                    // Shifting out completes without modelling CNT.
                    self.icr_status |= icr::SERIAL;
                }
            }
            0xD => {
                if value & 0x80 != 0 {
                    self.icr_mask |= value & 0x1F;
                } else {
                    self.icr_mask &= !(value & 0x1F);
                }
            }
            0xE => self.write_control(CiaEvent::TimerA, value, sched),
            _ => self.write_control(CiaEvent::TimerB, value, sched),
        }
    }

    /// Handle one of this chip's alarms. `at` is the cycle it was
    /// registered for.
    pub fn on_alarm(&mut self, event: CiaEvent, at: Cycle, sched: &mut Scheduler<E>) {
        match event {
            CiaEvent::TimerA => {
                self.underflow(CiaEvent::TimerA, at, sched);
                if self.timer_b.control & CR_START != 0
                    && self.timer_b.control & CRB_INMODE == 0x40
                {
                    self.count_timer_b_on_a();
                }
            }
            CiaEvent::TimerB => self.underflow(CiaEvent::TimerB, at, sched),
            CiaEvent::Tod => {
                if !self.tod_stopped {
                    self.advance_tod();
                }
                let interval = self.tod_interval();
                sched.register_alarm(at + interval, (self.event)(CiaEvent::Tod));
            }
        }
    }

    fn timer(&mut self, which: CiaEvent) -> &mut Timer {
        if which == CiaEvent::TimerA {
            &mut self.timer_a
        } else {
            &mut self.timer_b
        }
    }

    /// Whether the timer counts phase 2 cycles and so owns an alarm.
    fn counts_cycles(control: u8, which: CiaEvent) -> bool {
        let source = if which == CiaEvent::TimerA {
            control & CRA_CNT
        } else {
            control & CRB_INMODE
        };
        control & CR_START != 0 && source == 0
    }

    fn counter(&self, sched: &Scheduler<E>, which: CiaEvent) -> u16 {
        let timer = if which == CiaEvent::TimerA {
            self.timer_a
        } else {
            self.timer_b
        };
        match sched.cycles_until((self.event)(which)) {
            Some(remaining) => remaining.saturating_sub(1).min(0xFFFF) as u16,
            None => timer.counter,
        }
    }

    /// Stop the alarm, keeping the counter it had reached.
    fn freeze(&mut self, which: CiaEvent, sched: &mut Scheduler<E>) {
        let counter = self.counter(sched, which);
        self.timer(which).counter = counter;
        sched.cancel_alarm((self.event)(which));
    }

    /// Register the underflow alarm from the current counter.
    fn schedule(&mut self, which: CiaEvent, sched: &mut Scheduler<E>) {
        let counter = self.timer(which).counter;
        sched.register_in(u32::from(counter) + 1, (self.event)(which));
    }

    fn write_latch_high(&mut self, which: CiaEvent, value: u8) {
        let timer = self.timer(which);
        timer.latch = (timer.latch & 0x00FF) | (u16::from(value) << 8);
        if timer.control & CR_START == 0 {
            timer.counter = timer.latch;
        }
    }

    fn write_control(&mut self, which: CiaEvent, value: u8, sched: &mut Scheduler<E>) {
        let tod_rate_changed =
            which == CiaEvent::TimerA && (self.timer_a.control ^ value) & CRA_TOD_50HZ != 0;
        self.freeze(which, sched);
        let timer = self.timer(which);
        timer.control = value;
        if value & CR_FORCE_LOAD != 0 {
            timer.counter = timer.latch;
        }
        if Self::counts_cycles(value, which) {
            self.schedule(which, sched);
        }
        if tod_rate_changed {
            self.schedule_tod(sched);
        }
    }

    fn underflow(&mut self, which: CiaEvent, at: Cycle, sched: &mut Scheduler<E>) {
        self.icr_status |= if which == CiaEvent::TimerA {
            icr::TIMER_A
        } else {
            icr::TIMER_B
        };
        let event = (self.event)(which);
        let timer = self.timer(which);
        timer.counter = timer.latch;
        if timer.oneshot() {
            timer.control &= !CR_START;
        } else {
            sched.register_alarm(at + u32::from(timer.latch) + 1, event);
        }
    }

    /// Timer B in "count timer A underflows" mode.
    fn count_timer_b_on_a(&mut self) {
        let timer = &mut self.timer_b;
        if timer.counter == 0 {
            self.icr_status |= icr::TIMER_B;
            timer.counter = timer.latch;
            if timer.oneshot() {
                timer.control &= !CR_START;
            }
        } else {
            timer.counter -= 1;
        }
    }

    fn tod_interval(&self) -> Cycle {
        let pulses = if self.timer_a.control & CRA_TOD_50HZ != 0 {
            5
        } else {
            6
        };
        (self.config.cpu_hz / self.config.tod_hz.max(1) * pulses).max(1)
    }

    fn schedule_tod(&mut self, sched: &mut Scheduler<E>) {
        let interval = self.tod_interval();
        sched.register_in(interval, (self.event)(CiaEvent::Tod));
    }

    fn write_tod(&mut self, index: u8, value: u8) {
        let index = usize::from(index);
        let value = match index {
            0 => value & 0x0F,
            1 | 2 => value & 0x7F,
            _ => value & 0x9F,
        };
        if self.timer_b.control & CRB_ALARM != 0 {
            self.tod_alarm[index] = value;
            return;
        }
        self.tod[index] = value;
        match index {
            3 => self.tod_stopped = true,
            0 => self.tod_stopped = false,
            _ => {}
        }
    }

    fn advance_tod(&mut self) {
        self.tod[0] = (self.tod[0] + 1) % 10;
        if self.tod[0] == 0 {
            self.tod[1] = bcd_increment(self.tod[1], 0x60);
            if self.tod[1] == 0 {
                self.tod[2] = bcd_increment(self.tod[2], 0x60);
                if self.tod[2] == 0 {
                    self.tod[3] = next_hour(self.tod[3]);
                }
            }
        }
        if self.tod == self.tod_alarm {
            self.icr_status |= icr::TOD_ALARM;
        }
    }
}

/// Increment a BCD value, wrapping to zero at `limit`.
fn bcd_increment(value: u8, limit: u8) -> u8 {
    let mut next = value.wrapping_add(1);
    if next & 0x0F > 9 {
        next = (next & 0xF0) + 0x10;
    }
    if next >= limit { 0 } else { next }
}

/// 12-hour BCD clock with PM in bit 7. 11 -> 12 toggles PM; 12 -> 1.
fn next_hour(hours: u8) -> u8 {
    let pm = hours & 0x80;
    match hours & 0x1F {
        0x11 => 0x12 | (pm ^ 0x80),
        0x12 => 0x01 | pm,
        h => bcd_increment(h, 0x13) | pm,
    }
}

impl<E: Copy + Eq + Hash + fmt::Debug> Observable for Cia6526<E> {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "port_a" => Some(self.port_a_output().into()),
            "port_b" => Some(self.port_b_output().into()),
            "ddr_a" => Some(self.ddr_a.into()),
            "ddr_b" => Some(self.ddr_b.into()),
            "timer_a.latch" => Some(self.timer_a.latch.into()),
            "timer_a.control" => Some(self.timer_a.control.into()),
            "timer_b.latch" => Some(self.timer_b.latch.into()),
            "timer_b.control" => Some(self.timer_b.control.into()),
            "icr.status" => Some(self.icr_status.into()),
            "icr.mask" => Some(self.icr_mask.into()),
            "irq" => Some(self.irq_active().into()),
            "tod" => Some(
                format!(
                    "{:02X}:{:02X}:{:02X}.{:X}{}",
                    self.tod[3] & 0x1F,
                    self.tod[2],
                    self.tod[1],
                    self.tod[0],
                    if self.tod[3] & 0x80 != 0 { " PM" } else { " AM" }
                )
                .as_str()
                .into(),
            ),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "port_a",
            "port_b",
            "ddr_a",
            "ddr_b",
            "timer_a.latch",
            "timer_a.control",
            "timer_b.latch",
            "timer_b.control",
            "icr.status",
            "icr.mask",
            "irq",
            "tod",
        ]
    }
}
