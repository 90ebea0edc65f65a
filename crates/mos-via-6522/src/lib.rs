//! MOS 6522 Versatile Interface Adapter (VIA).
//!
//! The 6522 provides two 8-bit I/O ports, two 16-bit timers, a serial
//! shift register, and an interrupt controller. On the C64 one sits on
//! the expansion port area at $DF00.
//!
//! # Registers ($0-$F)
//!
//! | Reg | Name | Description                         |
//! |-----|------|-------------------------------------|
//! | $0  | ORB  | Port B data (handshake on read)     |
//! | $1  | ORA  | Port A data (handshake on read)     |
//! | $2  | DDRB | Port B data direction (1 = output)  |
//! | $3  | DDRA | Port A data direction (1 = output)  |
//! | $4  | T1CL | Timer 1 counter low (read clears T1 IRQ) |
//! | $5  | T1CH | Timer 1 counter high (write starts T1) |
//! | $6  | T1LL | Timer 1 latch low                   |
//! | $7  | T1LH | Timer 1 latch high                  |
//! | $8  | T2CL | Timer 2 counter low (read clears T2 IRQ) |
//! | $9  | T2CH | Timer 2 counter high (write starts T2) |
//! | $A  | SR   | Shift register                      |
//! | $B  | ACR  | Auxiliary control register           |
//! | $C  | PCR  | Peripheral control register          |
//! | $D  | IFR  | Interrupt flag register              |
//! | $E  | IER  | Interrupt enable register            |
//! | $F  | ORA  | Port A data (no handshake)           |
//!
//! # Timers
//!
//! Both timers keep one scheduler alarm for their next time-out once
//! started. Timer 1 counts N, N-1 .. 0, $FFFF and then reloads, so after
//! the first period of N + 1 cycles it times out every N + 2 cycles. In
//! one-shot mode the counter keeps reloading but only the first time-out
//! raises the interrupt. Timer 2 wraps through $FFFF after its time-out and
//! keeps counting down.

#![allow(clippy::cast_possible_truncation)]

use std::fmt;
use std::hash::Hash;

use emu_core::{Cycle, Observable, Scheduler, Value};

/// Alarms a VIA owns on the machine scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViaEvent {
    Timer1,
    Timer2,
}

/// MOS 6522 Versatile Interface Adapter.
pub struct Via6522<E> {
    event: fn(ViaEvent) -> E,

    /// Port A output register.
    port_a: u8,
    /// Port B output register.
    port_b: u8,
    /// Port A data direction register (1 = output).
    ddr_a: u8,
    /// Port B data direction register (1 = output).
    ddr_b: u8,
    /// External input lines for port A.
    pub external_a: u8,
    /// External input lines for port B.
    pub external_b: u8,

    /// Timer 1 counter before the timer is first started.
    timer1_counter: u16,
    /// Timer 1 latch (16-bit, reloaded into counter on underflow).
    timer1_latch: u16,
    /// The next time-out raises IFR bit 6.
    timer1_armed: bool,

    /// Timer 2 counter when no alarm is pending (stopped or pulse counting).
    timer2_counter: u16,
    /// Timer 2 latch low byte (only low byte is latched).
    timer2_latch_lo: u8,
    timer2_armed: bool,

    shift_register: u8,

    /// Auxiliary control register (ACR).
    /// Bits 7-6: T1 control (x0 = one-shot, x1 = free-run, 1x = PB7 output)
    /// Bit 5: T2 control (0 = timed, 1 = count PB6 pulses)
    /// Bits 4-2: Shift register control
    /// Bit 1: PB latching enable
    /// Bit 0: PA latching enable
    acr: u8,

    /// Peripheral control register (PCR).
    /// Bit 4: CB1 edge (0 = negative, 1 = positive)
    /// Bit 0: CA1 edge (0 = negative, 1 = positive)
    pcr: u8,

    /// Interrupt flag register (IFR), bit 7 computed on read.
    ifr: u8,
    /// Interrupt enable register (IER).
    ier: u8,

    ca1_prev: bool,
    cb1_prev: bool,

    /// PB7 output driven by timer 1.
    pb7_output: bool,
}

impl<E: Copy + Eq + Hash + fmt::Debug> Via6522<E> {
    /// Create a new VIA with all registers in their reset state.
    #[must_use]
    pub fn new(event: fn(ViaEvent) -> E) -> Self {
        Self {
            event,
            port_a: 0,
            port_b: 0,
            ddr_a: 0,
            ddr_b: 0,
            external_a: 0xFF,
            external_b: 0xFF,
            timer1_counter: 0xFFFF,
            timer1_latch: 0xFFFF,
            timer1_armed: false,
            timer2_counter: 0xFFFF,
            timer2_latch_lo: 0xFF,
            timer2_armed: false,
            shift_register: 0,
            acr: 0,
            pcr: 0,
            ifr: 0,
            ier: 0,
            ca1_prev: false,
            cb1_prev: false,
            pb7_output: false,
        }
    }

    /// Return to the reset state, dropping both timer alarms.
    pub fn reset(&mut self, sched: &mut Scheduler<E>) {
        sched.cancel_alarm((self.event)(ViaEvent::Timer1));
        sched.cancel_alarm((self.event)(ViaEvent::Timer2));
        *self = Self::new(self.event);
    }

    /// Check if the VIA has an active (and enabled) interrupt.
    #[must_use]
    pub fn irq_active(&self) -> bool {
        (self.ifr & self.ier & 0x7F) != 0
    }

    /// Read a VIA register.
    pub fn read(&mut self, reg: u8, sched: &Scheduler<E>) -> u8 {
        match reg & 0x0F {
            0x00 => {
                self.ifr &= !(IFR_CB1 | IFR_CB2);
                self.read_port_b()
            }
            0x01 => {
                self.ifr &= !(IFR_CA1 | IFR_CA2);
                self.read_port_a()
            }
            0x04 => {
                self.ifr &= !IFR_T1;
                self.timer1_counter(sched) as u8
            }
            0x08 => {
                self.ifr &= !IFR_T2;
                self.timer2_counter(sched) as u8
            }
            0x0A => {
                self.ifr &= !IFR_SR;
                self.shift_register
            }
            other => self.peek(other, sched),
        }
    }

    /// Read a register without side effects.
    #[must_use]
    pub fn peek(&self, reg: u8, sched: &Scheduler<E>) -> u8 {
        match reg & 0x0F {
            0x00 => self.read_port_b(),
            0x01 | 0x0F => self.read_port_a(),
            0x02 => self.ddr_b,
            0x03 => self.ddr_a,
            0x04 => self.timer1_counter(sched) as u8,
            0x05 => (self.timer1_counter(sched) >> 8) as u8,
            0x06 => self.timer1_latch as u8,
            0x07 => (self.timer1_latch >> 8) as u8,
            0x08 => self.timer2_counter(sched) as u8,
            0x09 => (self.timer2_counter(sched) >> 8) as u8,
            0x0A => self.shift_register,
            0x0B => self.acr,
            0x0C => self.pcr,
            0x0D => {
                let irq_any = if self.irq_active() { 0x80 } else { 0 };
                (self.ifr & 0x7F) | irq_any
            }
            _ => self.ier | 0x80,
        }
    }

    /// Write a VIA register.
    pub fn write(&mut self, reg: u8, value: u8, sched: &mut Scheduler<E>) {
        log::trace!("VIA: write ${:X} = ${value:02X}", reg & 0x0F);
        match reg & 0x0F {
            0x00 => {
                self.ifr &= !(IFR_CB1 | IFR_CB2);
                self.port_b = value;
            }
            0x01 => {
                self.ifr &= !(IFR_CA1 | IFR_CA2);
                self.port_a = value;
            }
            0x02 => self.ddr_b = value,
            0x03 => self.ddr_a = value,
            0x04 | 0x06 => {
                self.timer1_latch = (self.timer1_latch & 0xFF00) | u16::from(value);
            }
            0x05 => {
                // Load counter from latch and start.
                self.timer1_latch = (self.timer1_latch & 0x00FF) | (u16::from(value) << 8);
                self.timer1_counter = self.timer1_latch;
                self.timer1_armed = true;
                self.ifr &= !IFR_T1;
                self.pb7_output = false;
                sched.register_in(
                    u32::from(self.timer1_latch) + 1,
                    (self.event)(ViaEvent::Timer1),
                );
            }
            0x07 => {
                self.timer1_latch = (self.timer1_latch & 0x00FF) | (u16::from(value) << 8);
                self.ifr &= !IFR_T1;
            }
            0x08 => self.timer2_latch_lo = value,
            0x09 => {
                self.timer2_counter = u16::from(self.timer2_latch_lo) | (u16::from(value) << 8);
                self.timer2_armed = true;
                self.ifr &= !IFR_T2;
                if self.acr & ACR_T2_PULSES == 0 {
                    sched.register_in(
                        u32::from(self.timer2_counter) + 1,
                        (self.event)(ViaEvent::Timer2),
                    );
                }
            }
            0x0A => {
                self.shift_register = value;
                self.ifr &= !IFR_SR;
            }
            0x0B => self.write_acr(value, sched),
            0x0C => self.pcr = value,
            0x0D => self.ifr &= !value,
            0x0E => {
                if value & 0x80 != 0 {
                    self.ier |= value & 0x7F;
                } else {
                    self.ier &= !(value & 0x7F);
                }
            }
            _ => self.port_a = value,
        }
    }

    /// Handle one of this chip's alarms. `at` is the cycle it was
    /// registered for.
    pub fn on_alarm(&mut self, event: ViaEvent, at: Cycle, sched: &mut Scheduler<E>) {
        match event {
            ViaEvent::Timer1 => {
                let free_run = self.acr & ACR_T1_FREE_RUN != 0;
                if self.timer1_armed {
                    self.ifr |= IFR_T1;
                    self.timer1_armed = free_run;
                    if self.acr & ACR_T1_PB7 != 0 {
                        self.pb7_output = if free_run { !self.pb7_output } else { true };
                    }
                } else if free_run {
                    // Switched to free-run after a one-shot time-out.
                    self.timer1_armed = true;
                }
                let period = u32::from(self.timer1_latch) + 2;
                sched.register_alarm(at + period, (self.event)(ViaEvent::Timer1));
            }
            ViaEvent::Timer2 => {
                if self.timer2_armed {
                    self.ifr |= IFR_T2;
                    self.timer2_armed = false;
                }
                sched.register_alarm(at + 0x1_0000, (self.event)(ViaEvent::Timer2));
            }
        }
    }

    /// A negative pulse on PB6. Counts timer 2 down in pulse counting mode.
    pub fn pulse_pb6(&mut self) {
        if self.acr & ACR_T2_PULSES == 0 {
            return;
        }
        self.timer2_counter = self.timer2_counter.wrapping_sub(1);
        if self.timer2_counter == 0 && self.timer2_armed {
            self.ifr |= IFR_T2;
            self.timer2_armed = false;
        }
    }

    /// Set the CA1 input line. The active edge is selected by PCR bit 0.
    pub fn set_ca1(&mut self, state: bool) {
        if edge(self.ca1_prev, state, self.pcr & 0x01 != 0) {
            self.ifr |= IFR_CA1;
        }
        self.ca1_prev = state;
    }

    /// Set the CB1 input line. The active edge is selected by PCR bit 4.
    pub fn set_cb1(&mut self, state: bool) {
        if edge(self.cb1_prev, state, self.pcr & 0x10 != 0) {
            self.ifr |= IFR_CB1;
        }
        self.cb1_prev = state;
    }

    /// Set the CA2 flag directly.
    pub fn set_ca2_flag(&mut self) {
        self.ifr |= IFR_CA2;
    }

    /// Set the CB2 flag directly.
    pub fn set_cb2_flag(&mut self) {
        self.ifr |= IFR_CB2;
    }

    #[must_use]
    pub fn port_a_output(&self) -> u8 {
        self.port_a & self.ddr_a
    }

    /// Port B output value. With ACR bit 7 set, bit 7 is the timer 1
    /// output instead of the port register.
    #[must_use]
    pub fn port_b_output(&self) -> u8 {
        self.with_pb7(self.port_b & self.ddr_b)
    }

    #[must_use]
    pub fn ifr(&self) -> u8 {
        self.ifr
    }

    #[must_use]
    pub fn ier(&self) -> u8 {
        self.ier
    }

    #[must_use]
    pub fn acr(&self) -> u8 {
        self.acr
    }

    /// Current timer 1 counter.
    #[must_use]
    pub fn timer1_counter(&self, sched: &Scheduler<E>) -> u16 {
        match sched.cycles_until((self.event)(ViaEvent::Timer1)) {
            Some(remaining) if remaining == u32::from(self.timer1_latch) + 2 => 0xFFFF,
            Some(remaining) => remaining.saturating_sub(1).min(0xFFFF) as u16,
            None => self.timer1_counter,
        }
    }

    /// Current timer 2 counter.
    #[must_use]
    pub fn timer2_counter(&self, sched: &Scheduler<E>) -> u16 {
        match sched.cycles_until((self.event)(ViaEvent::Timer2)) {
            Some(remaining) => remaining.saturating_sub(1).min(0xFFFF) as u16,
            None => self.timer2_counter,
        }
    }

    fn write_acr(&mut self, value: u8, sched: &mut Scheduler<E>) {
        let was_pulses = self.acr & ACR_T2_PULSES != 0;
        let pulses = value & ACR_T2_PULSES != 0;
        if pulses && !was_pulses {
            // Hold the counter where it is and count PB6 from here.
            self.timer2_counter = self.timer2_counter(sched);
            sched.cancel_alarm((self.event)(ViaEvent::Timer2));
        } else if !pulses && was_pulses {
            sched.register_in(
                u32::from(self.timer2_counter) + 1,
                (self.event)(ViaEvent::Timer2),
            );
        }
        self.acr = value;
    }

    fn read_port_a(&self) -> u8 {
        (self.port_a & self.ddr_a) | (self.external_a & !self.ddr_a)
    }

    fn read_port_b(&self) -> u8 {
        self.with_pb7((self.port_b & self.ddr_b) | (self.external_b & !self.ddr_b))
    }

    fn with_pb7(&self, value: u8) -> u8 {
        if self.acr & ACR_T1_PB7 != 0 {
            (value & 0x7F) | if self.pb7_output { 0x80 } else { 0 }
        } else {
            value
        }
    }
}

fn edge(prev: bool, state: bool, positive: bool) -> bool {
    if positive {
        !prev && state
    } else {
        prev && !state
    }
}

impl<E: Copy + Eq + Hash + fmt::Debug> Observable for Via6522<E> {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "port_a" => Some(self.read_port_a().into()),
            "port_b" => Some(self.read_port_b().into()),
            "ddr_a" => Some(self.ddr_a.into()),
            "ddr_b" => Some(self.ddr_b.into()),
            "timer1.latch" => Some(self.timer1_latch.into()),
            "acr" => Some(self.acr.into()),
            "pcr" => Some(self.pcr.into()),
            "ifr" => Some(self.ifr.into()),
            "ier" => Some(self.ier.into()),
            "irq" => Some(self.irq_active().into()),
            "pb7" => Some(self.pb7_output.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "port_a",
            "port_b",
            "ddr_a",
            "ddr_b",
            "timer1.latch",
            "acr",
            "pcr",
            "ifr",
            "ier",
            "irq",
            "pb7",
        ]
    }
}

// IFR/IER bit masks
const IFR_CA2: u8 = 0x01;
const IFR_CA1: u8 = 0x02;
const IFR_SR: u8 = 0x04;
const IFR_CB2: u8 = 0x08;
const IFR_CB1: u8 = 0x10;
const IFR_T2: u8 = 0x20;
const IFR_T1: u8 = 0x40;

const ACR_T2_PULSES: u8 = 0x20;
const ACR_T1_FREE_RUN: u8 = 0x40;
const ACR_T1_PB7: u8 = 0x80;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Ev(ViaEvent);

    fn via() -> (Via6522<Ev>, Scheduler<Ev>) {
        (Via6522::new(Ev), Scheduler::new())
    }

    fn run(via: &mut Via6522<Ev>, sched: &mut Scheduler<Ev>, cycles: u32) -> Vec<Cycle> {
        let mut timeouts = Vec::new();
        sched.advance(cycles, |s, alarm| {
            if alarm.event.0 == ViaEvent::Timer1 {
                timeouts.push(alarm.at);
            }
            via.on_alarm(alarm.event.0, alarm.at, s);
        });
        timeouts
    }

    #[test]
    fn timer1_countdown_and_underflow() {
        let (mut via, mut sched) = via();
        via.write(0x04, 3, &mut sched);
        via.write(0x05, 0, &mut sched);

        assert_eq!(via.timer1_counter(&sched), 3);
        assert_eq!(via.ifr & IFR_T1, 0);

        run(&mut via, &mut sched, 1);
        assert_eq!(via.timer1_counter(&sched), 2);
        run(&mut via, &mut sched, 2);
        assert_eq!(via.timer1_counter(&sched), 0);
        assert_eq!(via.ifr & IFR_T1, 0);
        run(&mut via, &mut sched, 1);
        assert_ne!(via.ifr & IFR_T1, 0);
        assert_eq!(via.timer1_counter(&sched), 0xFFFF);
    }

    #[test]
    fn timer1_one_shot_interrupts_once() {
        let (mut via, mut sched) = via();
        via.write(0x04, 2, &mut sched);
        via.write(0x05, 0, &mut sched);

        run(&mut via, &mut sched, 3);
        assert_ne!(via.ifr & IFR_T1, 0);
        via.ifr = 0;
        run(&mut via, &mut sched, 100);
        assert_eq!(via.ifr & IFR_T1, 0);
    }

    #[test]
    fn timer1_free_run_period_is_latch_plus_two() {
        let (mut via, mut sched) = via();
        via.write(0x0B, 0x40, &mut sched);
        via.write(0x04, 10, &mut sched);
        via.write(0x05, 0, &mut sched);

        let timeouts = run(&mut via, &mut sched, 50);
        assert_eq!(timeouts, vec![11, 23, 35, 47]);
        assert_ne!(via.ifr & IFR_T1, 0);
    }

    #[test]
    fn timer1_reload_reads_latch_after_ffff() {
        let (mut via, mut sched) = via();
        via.write(0x0B, 0x40, &mut sched);
        via.write(0x04, 2, &mut sched);
        via.write(0x05, 0, &mut sched);

        run(&mut via, &mut sched, 3);
        assert_eq!(via.timer1_counter(&sched), 0xFFFF);
        run(&mut via, &mut sched, 1);
        assert_eq!(via.timer1_counter(&sched), 2);
    }

    #[test]
    fn timer1_write_high_starts_and_clears_irq() {
        let (mut via, mut sched) = via();
        via.ifr = IFR_T1;
        via.write(0x04, 10, &mut sched);
        via.write(0x05, 0, &mut sched);
        assert!(sched.is_pending(Ev(ViaEvent::Timer1)));
        assert_eq!(via.ifr & IFR_T1, 0);
        assert_eq!(via.timer1_counter(&sched), 10);
    }

    #[test]
    fn timer1_read_low_clears_irq() {
        let (mut via, sched) = via();
        via.ifr = IFR_T1;
        let _ = via.read(0x04, &sched);
        assert_eq!(via.ifr & IFR_T1, 0);
    }

    #[test]
    fn timer2_one_shot_then_wraps() {
        let (mut via, mut sched) = via();
        via.write(0x08, 3, &mut sched);
        via.write(0x09, 0, &mut sched);

        run(&mut via, &mut sched, 3);
        assert_eq!(via.ifr & IFR_T2, 0);
        run(&mut via, &mut sched, 1);
        assert_ne!(via.ifr & IFR_T2, 0);
        assert_eq!(via.timer2_counter(&sched), 0xFFFF);

        via.ifr = 0;
        run(&mut via, &mut sched, 0x1_0000);
        assert_eq!(via.ifr & IFR_T2, 0, "no second interrupt");
    }

    #[test]
    fn timer2_counts_pb6_pulses() {
        let (mut via, mut sched) = via();
        via.write(0x0B, 0x20, &mut sched);
        via.write(0x08, 3, &mut sched);
        via.write(0x09, 0, &mut sched);
        assert!(!sched.is_pending(Ev(ViaEvent::Timer2)));

        via.pulse_pb6();
        via.pulse_pb6();
        assert_eq!(via.ifr & IFR_T2, 0);
        via.pulse_pb6();
        assert_ne!(via.ifr & IFR_T2, 0);
        assert_eq!(via.timer2_counter(&sched), 0);
    }

    #[test]
    fn timer2_read_low_clears_irq() {
        let (mut via, sched) = via();
        via.ifr = IFR_T2;
        let _ = via.read(0x08, &sched);
        assert_eq!(via.ifr & IFR_T2, 0);
    }

    #[test]
    fn ifr_write_clears_flags() {
        let (mut via, mut sched) = via();
        via.ifr = IFR_T1 | IFR_T2 | IFR_CA1;
        via.write(0x0D, IFR_T1 | IFR_CA1, &mut sched);
        assert_eq!(via.ifr, IFR_T2);
    }

    #[test]
    fn ier_set_clear_mode() {
        let (mut via, mut sched) = via();
        via.write(0x0E, 0x80 | IFR_T1 | IFR_CB1, &mut sched);
        assert_eq!(via.ier & IFR_T1, IFR_T1);
        assert_eq!(via.ier & IFR_CB1, IFR_CB1);

        via.write(0x0E, IFR_T1, &mut sched);
        assert_eq!(via.ier & IFR_T1, 0);
        assert_eq!(via.ier & IFR_CB1, IFR_CB1);
    }

    #[test]
    fn ier_reads_with_bit7_set() {
        let (mut via, sched) = via();
        via.ier = 0x42;
        assert_eq!(via.read(0x0E, &sched), 0xC2);
    }

    #[test]
    fn cb1_edges() {
        let (mut via, _) = via();
        via.pcr = 0x10;
        via.set_cb1(true);
        assert_ne!(via.ifr & IFR_CB1, 0);

        via.ifr = 0;
        via.pcr = 0x00;
        via.set_cb1(false);
        assert_ne!(via.ifr & IFR_CB1, 0);
    }

    #[test]
    fn ca1_edge_sets_flag() {
        let (mut via, _) = via();
        via.pcr = 0x01;
        via.set_ca1(true);
        assert_ne!(via.ifr & IFR_CA1, 0);
    }

    #[test]
    fn external_port_reads() {
        let (mut via, sched) = via();
        via.ddr_a = 0x0F;
        via.port_a = 0xAB;
        via.external_a = 0xC0;
        assert_eq!(via.read(0x0F, &sched), 0xCB);
    }

    #[test]
    fn pb7_toggles_in_free_run() {
        let (mut via, mut sched) = via();
        via.write(0x0B, 0xC0, &mut sched);
        via.ddr_b = 0x80;
        via.write(0x04, 1, &mut sched);
        via.write(0x05, 0, &mut sched);

        assert!(!via.pb7_output);
        run(&mut via, &mut sched, 2);
        assert!(via.pb7_output);
        assert_eq!(via.port_b_output() & 0x80, 0x80);
        run(&mut via, &mut sched, 3);
        assert!(!via.pb7_output);
    }

    #[test]
    fn irq_active_requires_both_flag_and_enable() {
        let (mut via, _) = via();
        via.ifr = IFR_T1;
        assert!(!via.irq_active());
        via.ier = IFR_T1;
        assert!(via.irq_active());
        via.ifr = 0;
        assert!(!via.irq_active());
    }

    #[test]
    fn handshake_reads_clear_port_flags() {
        let (mut via, sched) = via();
        via.ifr = IFR_CB1 | IFR_CB2 | IFR_CA1 | IFR_CA2 | IFR_T1;
        let _ = via.read(0x00, &sched);
        assert_eq!(via.ifr & (IFR_CB1 | IFR_CB2), 0);
        let _ = via.read(0x0F, &sched);
        assert_ne!(via.ifr & (IFR_CA1 | IFR_CA2), 0);
        let _ = via.read(0x01, &sched);
        assert_eq!(via.ifr & (IFR_CA1 | IFR_CA2), 0);
        assert_ne!(via.ifr & IFR_T1, 0);
    }

    #[test]
    fn timer1_latch_write_does_not_start() {
        let (mut via, mut sched) = via();
        via.write(0x06, 0x10, &mut sched);
        via.write(0x07, 0x00, &mut sched);
        assert!(!sched.is_pending(Ev(ViaEvent::Timer1)));
        via.ifr = IFR_T1;
        via.write(0x07, 0x00, &mut sched);
        assert_eq!(via.ifr & IFR_T1, 0);
    }

    #[test]
    fn reset_cancels_alarms() {
        let (mut via, mut sched) = via();
        via.write(0x05, 0, &mut sched);
        via.write(0x09, 0, &mut sched);
        via.reset(&mut sched);
        assert_eq!(sched.pending(), 0);
    }
}
