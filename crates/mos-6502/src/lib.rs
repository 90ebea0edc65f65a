//! MOS 6502/6510 CPU.
//!
//! Executes one whole instruction per [`Cpu::step`]. Every one of the 256
//! opcodes is implemented, including the undocumented ones that behave
//! reproducibly on NMOS parts (LAX, SAX, DCP, ISC, SLO, RLA, SRE, RRA, ANC,
//! ALR, ARR, SBX, LAS, the SHA/SHX/SHY/TAS family, ANE, LXA, the NOP
//! variants and the JAM opcodes).
//!
//! The 6510 I/O port at $00/$01 belongs to the machine's memory map, not
//! to the CPU.
//!
//! # Interrupts
//!
//! Lines are sampled through [`Bus::poll_interrupts`] at the start of each
//! step, so an interrupt raised by a chip during an instruction is taken
//! before the next opcode fetch. IRQ is level-sensitive and masked by I.
//! NMI is edge-triggered: a low-to-high transition on the line latches a
//! request that stays pending until it is serviced. CLI, SEI and PLP
//! change I after the poll, so the instruction that follows them still sees
//! the old mask.

use emu_core::{Bus, Cpu, Observable, Value};
use serde::{Deserialize, Serialize};

mod addressing;
mod alu;
mod execute;
pub mod flags;
mod opcodes;
mod registers;

pub use flags::Status;
pub use opcodes::{Mnemonic, Mode, OPCODES, Opcode};
pub use registers::Registers;

const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

/// Cycles taken by the interrupt and reset sequences.
pub const INTERRUPT_CYCLES: u32 = 7;

/// Which interrupt wins when IRQ and NMI are both pending at a boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptPriority {
    /// NMI is serviced first. The IRQ is taken after the handler's first
    /// instruction if the line is still held and I is clear.
    #[default]
    Nmi,
    /// IRQ is serviced first and the NMI stays latched.
    Irq,
}

/// CPU variant. Both share the NMOS core; the 6510 adds the I/O port,
/// which the machine models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuVariant {
    Nmos6502,
    #[default]
    Mos6510,
}

/// Per-CPU constants for behaviour that varies between chips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub variant: CpuVariant,
    pub interrupt_priority: InterruptPriority,
    /// Constant ORed into A by ANE ($8B).
    pub ane_magic: u8,
    /// Constant ORed into A by LXA ($AB).
    pub lxa_magic: u8,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            variant: CpuVariant::Mos6510,
            interrupt_priority: InterruptPriority::Nmi,
            ane_magic: 0xEE,
            lxa_magic: 0xEE,
        }
    }
}

/// The 6502 processor state.
pub struct Mos6502 {
    pub regs: Registers,
    config: CpuConfig,
    /// NMI line level seen at the previous poll, for edge detection.
    nmi_line: bool,
    nmi_pending: bool,
    /// I flag as it was before a CLI, SEI or PLP, for the one poll that
    /// still sees the old mask.
    delayed_i: Option<bool>,
    jammed: bool,
    /// Opcode of the last instruction executed.
    last_opcode: u8,
    total_cycles: u64,
}

impl Mos6502 {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CpuConfig::default())
    }

    #[must_use]
    pub fn with_config(config: CpuConfig) -> Self {
        Self {
            regs: Registers::new(),
            config,
            nmi_line: false,
            nmi_pending: false,
            delayed_i: None,
            jammed: false,
            last_opcode: 0,
            total_cycles: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CpuConfig {
        &self.config
    }

    /// Replace the per-CPU constants. Takes effect from the next step.
    pub fn reconfigure(&mut self, config: CpuConfig) {
        self.config = config;
    }

    /// Whether a JAM opcode has halted the processor.
    #[must_use]
    pub fn is_jammed(&self) -> bool {
        self.jammed
    }

    /// Whether an NMI edge has been latched but not yet serviced.
    #[must_use]
    pub fn nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    #[must_use]
    pub fn last_opcode(&self) -> u8 {
        self.last_opcode
    }

    /// Cycles consumed since construction.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    fn poll(&mut self, bus: &mut impl Bus) -> Option<u16> {
        let lines = bus.poll_interrupts();
        if lines.nmi && !self.nmi_line {
            self.nmi_pending = true;
        }
        self.nmi_line = lines.nmi;

        let masked = self
            .delayed_i
            .take()
            .unwrap_or_else(|| self.regs.p.is_set(flags::I));
        let irq = lines.irq && !masked;
        match (self.nmi_pending, irq) {
            (true, true) => Some(match self.config.interrupt_priority {
                InterruptPriority::Nmi => NMI_VECTOR,
                InterruptPriority::Irq => IRQ_VECTOR,
            }),
            (true, false) => Some(NMI_VECTOR),
            (false, true) => Some(IRQ_VECTOR),
            (false, false) => None,
        }
    }

    /// Push PC and P, set I and jump through `vector`.
    fn interrupt(&mut self, bus: &mut impl Bus, vector: u16) -> u32 {
        if vector == NMI_VECTOR {
            self.nmi_pending = false;
        }
        // The two dummy fetches of the opcode and its successor.
        bus.read(self.regs.pc);
        bus.read(self.regs.pc);
        self.push_word(bus, self.regs.pc);
        self.push(bus, self.regs.p.to_byte_irq());
        self.regs.p.set_if(flags::I, true);
        self.regs.pc = self.read_word(bus, vector);
        log::trace!("6502: interrupt via ${vector:04X} to ${:04X}", self.regs.pc);
        INTERRUPT_CYCLES
    }
}

impl Default for Mos6502 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu for Mos6502 {
    fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let cycles = if self.jammed {
            // The bus keeps running while the CPU is stuck.
            1
        } else if let Some(vector) = self.poll(bus) {
            self.interrupt(bus, vector)
        } else {
            let opcode = self.fetch(bus);
            self.last_opcode = opcode;
            self.execute(bus, opcode)
        };
        self.total_cycles += u64::from(cycles);
        bus.tick(cycles);
        cycles
    }

    fn reset<B: Bus>(&mut self, bus: &mut B) {
        self.regs = Registers::new();
        self.regs.pc = self.read_word(bus, RESET_VECTOR);
        self.nmi_line = false;
        self.nmi_pending = false;
        self.delayed_i = None;
        self.jammed = false;
        self.total_cycles += u64::from(INTERRUPT_CYCLES);
        bus.tick(INTERRUPT_CYCLES);
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }
}

impl Observable for Mos6502 {
    fn query(&self, path: &str) -> Option<Value> {
        let p = self.regs.p;
        match path {
            "a" => Some(self.regs.a.into()),
            "x" => Some(self.regs.x.into()),
            "y" => Some(self.regs.y.into()),
            "s" => Some(self.regs.s.into()),
            "pc" => Some(self.regs.pc.into()),
            "p" => Some(p.0.into()),
            "flags.n" => Some(p.is_set(flags::N).into()),
            "flags.v" => Some(p.is_set(flags::V).into()),
            "flags.d" => Some(p.is_set(flags::D).into()),
            "flags.i" => Some(p.is_set(flags::I).into()),
            "flags.z" => Some(p.is_set(flags::Z).into()),
            "flags.c" => Some(p.is_set(flags::C).into()),
            "jammed" => Some(self.jammed.into()),
            "nmi_pending" => Some(self.nmi_pending.into()),
            "cycles" => Some(self.total_cycles.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "a",
            "x",
            "y",
            "s",
            "pc",
            "p",
            "flags.n",
            "flags.v",
            "flags.d",
            "flags.i",
            "flags.z",
            "flags.c",
            "jammed",
            "nmi_pending",
            "cycles",
        ]
    }
}
