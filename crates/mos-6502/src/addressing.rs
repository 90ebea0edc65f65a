//! Operand fetch and effective-address calculation.
//!
//! Indexed modes also perform the dummy read the real chip issues before
//! the high byte is fixed up. Those reads matter when they land on an I/O
//! register with read side effects, such as a CIA interrupt control
//! register.

use emu_core::Bus;

use crate::Mos6502;
use crate::opcodes::Mode;

/// An effective address produced by an addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Effective {
    pub addr: u16,
    /// Address before the page carry was applied, for indexed modes.
    pub unfixed: Option<u16>,
}

impl Effective {
    const fn direct(addr: u16) -> Self {
        Self {
            addr,
            unfixed: None,
        }
    }

    const fn indexed(base: u16, index: u8) -> Self {
        let addr = base.wrapping_add(index as u16);
        Self {
            addr,
            unfixed: Some((base & 0xFF00) | (addr & 0x00FF)),
        }
    }

    /// Whether indexing carried into the high byte.
    pub fn page_crossed(self) -> bool {
        self.unfixed.is_some_and(|u| u != self.addr)
    }
}

impl Mos6502 {
    /// Fetch the byte at PC and advance PC.
    pub(crate) fn fetch(&mut self, bus: &mut impl Bus) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    pub(crate) fn fetch_word(&mut self, bus: &mut impl Bus) -> u16 {
        let low = self.fetch(bus);
        let high = self.fetch(bus);
        u16::from_le_bytes([low, high])
    }

    pub(crate) fn read_word(&self, bus: &mut impl Bus, addr: u16) -> u16 {
        let low = bus.read(addr);
        let high = bus.read(addr.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }

    /// Read a pointer whose high byte does not carry out of its page. Used
    /// by JMP ($xxFF) and by zero-page pointers.
    pub(crate) fn read_word_in_page(&self, bus: &mut impl Bus, addr: u16) -> u16 {
        let low = bus.read(addr);
        let high = bus.read((addr & 0xFF00) | (addr.wrapping_add(1) & 0x00FF));
        u16::from_le_bytes([low, high])
    }

    pub(crate) fn push(&mut self, bus: &mut impl Bus, value: u8) {
        let addr = self.regs.push();
        bus.write(addr, value);
    }

    pub(crate) fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        let addr = self.regs.pull();
        bus.read(addr)
    }

    /// Push high byte first.
    pub(crate) fn push_word(&mut self, bus: &mut impl Bus, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.push(bus, high);
        self.push(bus, low);
    }

    pub(crate) fn pull_word(&mut self, bus: &mut impl Bus) -> u16 {
        let low = self.pull(bus);
        let high = self.pull(bus);
        u16::from_le_bytes([low, high])
    }

    /// Consume the operand bytes for `mode` and compute the address they
    /// name. Not used for implied, accumulator, immediate or relative.
    pub(crate) fn effective(&mut self, bus: &mut impl Bus, mode: Mode) -> Effective {
        match mode {
            Mode::Zp => Effective::direct(u16::from(self.fetch(bus))),
            Mode::Zpx | Mode::Zpy => {
                let base = self.fetch(bus);
                bus.read(u16::from(base));
                let index = if mode == Mode::Zpx {
                    self.regs.x
                } else {
                    self.regs.y
                };
                Effective::direct(u16::from(base.wrapping_add(index)))
            }
            Mode::Abs => Effective::direct(self.fetch_word(bus)),
            Mode::Abx => {
                let base = self.fetch_word(bus);
                Effective::indexed(base, self.regs.x)
            }
            Mode::Aby => {
                let base = self.fetch_word(bus);
                Effective::indexed(base, self.regs.y)
            }
            Mode::Ind => {
                let ptr = self.fetch_word(bus);
                Effective::direct(self.read_word_in_page(bus, ptr))
            }
            Mode::Izx => {
                let zp = self.fetch(bus);
                bus.read(u16::from(zp));
                let ptr = u16::from(zp.wrapping_add(self.regs.x));
                Effective::direct(self.read_word_in_page(bus, ptr))
            }
            Mode::Izy => {
                let zp = u16::from(self.fetch(bus));
                let base = self.read_word_in_page(bus, zp);
                Effective::indexed(base, self.regs.y)
            }
            Mode::Imp | Mode::Acc | Mode::Imm | Mode::Rel => {
                unreachable!("{mode:?} has no effective address")
            }
        }
    }

    /// Operand value for a read instruction. Adds the page-crossing
    /// penalty to `cycles` when the opcode pays it.
    pub(crate) fn read_operand(
        &mut self,
        bus: &mut impl Bus,
        mode: Mode,
        page_penalty: bool,
        cycles: &mut u32,
    ) -> u8 {
        if mode == Mode::Imm {
            return self.fetch(bus);
        }
        let ea = self.effective(bus, mode);
        if ea.page_crossed() {
            if let Some(unfixed) = ea.unfixed {
                bus.read(unfixed);
            }
            if page_penalty {
                *cycles += 1;
            }
        }
        bus.read(ea.addr)
    }

    /// Address for a store or read-modify-write. Indexed modes always take
    /// the fix-up cycle, so the dummy read always happens.
    pub(crate) fn write_address(&mut self, bus: &mut impl Bus, mode: Mode) -> Effective {
        let ea = self.effective(bus, mode);
        if let Some(unfixed) = ea.unfixed {
            bus.read(unfixed);
        }
        ea
    }
}
