//! C64 bus: memory and I/O routing, and the machine clock.
//!
//! Implements `emu_core::Bus` for the C64. CPU addresses go through the
//! banking logic in [`C64Memory`]; with I/O visible, $D000-$DFFF reaches
//! the chips instead:
//!
//! | Range       | Device                            |
//! |-------------|-----------------------------------|
//! | $D000-$D3FF | VIC-II, 64 registers mirrored     |
//! | $D400-$D7FF | SID (not emulated, open bus)      |
//! | $D800-$DBFF | Colour RAM, high nybble open bus  |
//! | $DC00-$DCFF | CIA1: keyboard, joysticks, IRQ    |
//! | $DD00-$DDFF | CIA2: VIC bank, NMI               |
//! | $DE00-$DEFF | DS1302 clock port (optional)      |
//! | $DF00-$DFFF | Expansion VIA (optional)          |
//!
//! Every timed device keeps its deadlines on one [`Scheduler`]. The CPU
//! calls [`Bus::tick`] after each instruction and the bus fires whatever
//! fell due, in trigger order.

#![allow(clippy::cast_possible_truncation)]

use dallas_ds1302::{Ds1302, RtcConfig, RtcError, RtcEvent};
use emu_core::{Alarm, Bus, InterruptLines, Scheduler};
use mos_cia_6526::{Cia6526, CiaConfig, CiaEvent};
use mos_via_6522::{Via6522, ViaEvent};
use mos_vic_ii::{VicII, VideoStandard};

use crate::input::JoystickState;
use crate::keyboard::KeyboardMatrix;
use crate::memory::C64Memory;

/// $DE00 bits: IO on 0, SCLK on 1, CE on 2.
const RTC_IO: u8 = 0x01;
const RTC_SCLK: u8 = 0x02;
const RTC_CE: u8 = 0x04;

/// Every alarm on the machine scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineEvent {
    Cia1(CiaEvent),
    Cia2(CiaEvent),
    Via(ViaEvent),
    Rtc(RtcEvent),
    /// End of the current raster line.
    RasterLine,
}

/// The C64 bus, implementing `emu_core::Bus`.
///
/// Owns every chip and the scheduler they share.
pub struct C64Bus {
    pub memory: C64Memory,
    pub vic: VicII,
    pub cia1: Cia6526<MachineEvent>,
    pub cia2: Cia6526<MachineEvent>,
    pub via: Option<Via6522<MachineEvent>>,
    pub rtc: Option<Ds1302<MachineEvent>>,
    pub keyboard: KeyboardMatrix,
    /// Control ports 1 and 2.
    pub joysticks: [JoystickState; 2],
    sched: Scheduler<MachineEvent>,
    /// Last byte seen on the data bus, returned by unmapped reads.
    last_value: u8,
    /// Lines last written to $DE00.
    rtc_port: u8,
    frame_complete: bool,
}

impl C64Bus {
    #[must_use]
    pub fn new(memory: C64Memory, standard: VideoStandard, cia: CiaConfig) -> Self {
        let mut sched = Scheduler::new();
        let cia1 = Cia6526::new("CIA1", cia, MachineEvent::Cia1, &mut sched);
        let cia2 = Cia6526::new("CIA2", cia, MachineEvent::Cia2, &mut sched);
        sched.register_in(standard.cycles_per_line(), MachineEvent::RasterLine);
        Self {
            memory,
            vic: VicII::new(standard),
            cia1,
            cia2,
            via: None,
            rtc: None,
            keyboard: KeyboardMatrix::new(),
            joysticks: [JoystickState::default(); 2],
            sched,
            last_value: 0xFF,
            rtc_port: 0,
            frame_complete: false,
        }
    }

    /// Plug a clock into the $DE00 port, replacing any already there.
    ///
    /// # Errors
    ///
    /// [`RtcError`] if `config` is unusable. The port stays empty.
    pub fn attach_rtc(&mut self, config: RtcConfig) -> Result<(), RtcError> {
        self.detach_rtc();
        self.rtc = Some(Ds1302::new(config, MachineEvent::Rtc, &mut self.sched)?);
        self.rtc_port = 0;
        Ok(())
    }

    pub fn detach_rtc(&mut self) {
        if self.rtc.take().is_some() {
            self.sched.cancel_alarm(MachineEvent::Rtc(RtcEvent::Tick));
        }
    }

    pub fn attach_via(&mut self) {
        if self.via.is_none() {
            self.via = Some(Via6522::new(MachineEvent::Via));
        }
    }

    pub fn detach_via(&mut self) {
        if let Some(mut via) = self.via.take() {
            via.reset(&mut self.sched);
        }
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler<MachineEvent> {
        &self.sched
    }

    /// Cycles since power-on.
    #[must_use]
    pub fn elapsed(&self) -> u64 {
        self.sched.elapsed()
    }

    /// VIC-II bank from CIA2 port A bits 0-1, inverted.
    #[must_use]
    pub fn vic_bank(&self) -> u8 {
        !self.cia2.port_a_output() & 0x03
    }

    /// Reset every chip. RAM and the RTC's time survive.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.vic.reset();
        self.cia1.reset(&mut self.sched);
        self.cia2.reset(&mut self.sched);
        if let Some(via) = &mut self.via {
            via.reset(&mut self.sched);
        }
        if let Some(rtc) = &mut self.rtc {
            rtc.reset_lines();
        }
        self.rtc_port = 0;
        self.sched
            .register_in(self.vic.standard().cycles_per_line(), MachineEvent::RasterLine);
        self.frame_complete = false;
    }

    /// True once after the VIC-II wraps to a new frame.
    pub fn take_frame_complete(&mut self) -> bool {
        std::mem::take(&mut self.frame_complete)
    }

    /// Read without side effects, for debuggers.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        if !(0xD000..=0xDFFF).contains(&addr) || !self.memory.is_io_visible() {
            return self.memory.cpu_read(addr);
        }
        let reg = (addr & 0xFF) as u8;
        match addr {
            0xD000..=0xD3FF => self.vic.peek(reg),
            0xD800..=0xDBFF => {
                (self.last_value & 0xF0) | self.memory.colour_ram_read(addr - 0xD800)
            }
            0xDC00..=0xDCFF => self.cia1.peek(reg, &self.sched),
            0xDD00..=0xDDFF => self.cia2.peek(reg, &self.sched),
            0xDE00..=0xDEFF if self.rtc.is_some() => self.rtc_port_read(),
            0xDF00..=0xDFFF => self
                .via
                .as_ref()
                .map_or(self.last_value, |via| via.peek(reg, &self.sched)),
            _ => self.last_value,
        }
    }

    /// Put the keyboard and joysticks onto the CIA1 ports.
    ///
    /// Joystick 2 shares port A with the row select and joystick 1 shares
    /// port B with the columns. Both are wired-AND.
    fn update_cia1_inputs(&mut self) {
        let joy1 = self.joysticks[0].lines();
        let joy2 = self.joysticks[1].lines();
        self.cia1.set_port_a_input(joy2);
        let rows = self.cia1.port_a_output() & joy2;
        self.cia1.set_port_b_input(self.keyboard.scan(rows) & joy1);
    }

    fn rtc_port_read(&self) -> u8 {
        let io = self
            .rtc
            .as_ref()
            .is_some_and(Ds1302::read_data_line);
        (self.last_value & 0xF8) | (self.rtc_port & (RTC_SCLK | RTC_CE)) | u8::from(io)
    }

    fn io_read(&mut self, addr: u16) -> u8 {
        let reg = (addr & 0xFF) as u8;
        match addr {
            0xD000..=0xD3FF => self.vic.read(reg),
            0xD800..=0xDBFF => {
                (self.last_value & 0xF0) | self.memory.colour_ram_read(addr - 0xD800)
            }
            0xDC00..=0xDCFF => {
                self.update_cia1_inputs();
                let value = self.cia1.read(reg, &self.sched);
                if reg & 0x0F == 0 {
                    value & self.joysticks[1].lines()
                } else {
                    value
                }
            }
            0xDD00..=0xDDFF => self.cia2.read(reg, &self.sched),
            0xDE00..=0xDEFF if self.rtc.is_some() => self.rtc_port_read(),
            0xDF00..=0xDFFF => match &mut self.via {
                Some(via) => via.read(reg, &self.sched),
                None => self.last_value,
            },
            _ => self.last_value,
        }
    }

    fn io_write(&mut self, addr: u16, value: u8) {
        let reg = (addr & 0xFF) as u8;
        match addr {
            0xD000..=0xD3FF => self.vic.write(reg, value),
            0xD800..=0xDBFF => self.memory.colour_ram_write(addr - 0xD800, value),
            0xDC00..=0xDCFF => self.cia1.write(reg, value, &mut self.sched),
            0xDD00..=0xDDFF => self.cia2.write(reg, value, &mut self.sched),
            0xDE00..=0xDEFF => {
                if let Some(rtc) = &mut self.rtc {
                    self.rtc_port = value & (RTC_IO | RTC_SCLK | RTC_CE);
                    rtc.set_lines(value & RTC_CE != 0, value & RTC_SCLK != 0, value & RTC_IO != 0);
                }
            }
            0xDF00..=0xDFFF => {
                if let Some(via) = &mut self.via {
                    via.write(reg, value, &mut self.sched);
                }
            }
            // SID
            _ => {}
        }
    }
}

impl Bus for C64Bus {
    fn read(&mut self, addr: u16) -> u8 {
        let value = if (0xD000..=0xDFFF).contains(&addr) && self.memory.is_io_visible() {
            self.io_read(addr)
        } else {
            self.memory.cpu_read(addr)
        };
        self.last_value = value;
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.last_value = value;
        if (0xD000..=0xDFFF).contains(&addr) && self.memory.is_io_visible() {
            self.io_write(addr, value);
        } else {
            self.memory.cpu_write(addr, value);
        }
    }

    fn tick(&mut self, cycles: u32) {
        let Self {
            memory,
            vic,
            cia1,
            cia2,
            via,
            rtc,
            sched,
            frame_complete,
            ..
        } = self;
        let bank = !cia2.port_a_output() & 0x03;
        sched.advance(cycles, |sched, Alarm { at, event }| match event {
            MachineEvent::Cia1(e) => cia1.on_alarm(e, at, sched),
            MachineEvent::Cia2(e) => cia2.on_alarm(e, at, sched),
            MachineEvent::Via(e) => {
                if let Some(via) = via {
                    via.on_alarm(e, at, sched);
                }
            }
            MachineEvent::Rtc(e) => {
                if let Some(rtc) = rtc {
                    rtc.on_alarm(e, at, sched);
                }
            }
            MachineEvent::RasterLine => {
                sched.register_alarm(
                    at + vic.standard().cycles_per_line(),
                    MachineEvent::RasterLine,
                );
                if vic.end_of_line(&memory.vic_view(bank)) {
                    *frame_complete = true;
                }
            }
        });
    }

    fn poll_interrupts(&mut self) -> InterruptLines {
        let via_irq = self.via.as_ref().is_some_and(Via6522::irq_active);
        InterruptLines {
            irq: self.cia1.irq_active() || self.vic.irq_active() || via_irq,
            nmi: self.cia2.irq_active(),
        }
    }
}
