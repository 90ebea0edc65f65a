//! C64 memory: 64K RAM under optional ROMs, colour RAM and the 6510 port.
//!
//! The CPU port at $01 bits 0-2 control which ROMs and I/O are visible:
//!
//! | CHAREN(2) | HIRAM(1) | LORAM(0) | $A000-$BFFF | $D000-$DFFF | $E000-$FFFF |
//! |-----------|----------|----------|-------------|-------------|-------------|
//! | 1         | 1        | 1        | BASIC       | I/O         | Kernal      |
//! | 1         | 1        | 0        | RAM         | I/O         | Kernal      |
//! | 1         | 0        | 1        | RAM         | I/O         | RAM         |
//! | 0         | 1        | 1        | BASIC       | Char ROM    | Kernal      |
//! | 0         | 1        | 0        | RAM         | Char ROM    | Kernal      |
//! | 0         | 0        | 1        | RAM         | Char ROM    | RAM         |
//! | x         | 0        | 0        | RAM         | RAM         | RAM         |
//!
//! A ROM that was not supplied leaves the RAM underneath visible.

use mos_vic_ii::VideoMemory;

use crate::config::Roms;

/// Pull-ups on the six port lines present on the 6510.
const PORT_PULLUPS: u8 = 0x37;

pub struct C64Memory {
    ram: Box<[u8; 0x10000]>,
    kernal: Option<Vec<u8>>,
    basic: Option<Vec<u8>>,
    chargen: Option<Vec<u8>>,
    /// Colour RAM, one nybble per cell.
    colour_ram: [u8; 0x400],
    port_ddr: u8,
    port_data: u8,
}

impl C64Memory {
    /// ROM images must already have the right sizes; see
    /// [`Roms::validated`](crate::Roms).
    #[must_use]
    pub fn new(roms: Roms) -> Self {
        Self {
            ram: Box::new([0; 0x10000]),
            kernal: roms.kernal,
            basic: roms.basic,
            chargen: roms.chargen,
            colour_ram: [0; 0x400],
            port_ddr: 0x2F,
            port_data: 0x37,
        }
    }

    /// Power-on port state. RAM keeps its contents.
    pub fn reset(&mut self) {
        self.port_ddr = 0x2F;
        self.port_data = 0x37;
    }

    /// Undriven port lines float high.
    fn effective_port(&self) -> u8 {
        (self.port_data & self.port_ddr) | (PORT_PULLUPS & !self.port_ddr)
    }

    fn loram(&self) -> bool {
        self.effective_port() & 0x01 != 0
    }

    fn hiram(&self) -> bool {
        self.effective_port() & 0x02 != 0
    }

    fn charen(&self) -> bool {
        self.effective_port() & 0x04 != 0
    }

    /// Whether $D000-$DFFF holds the I/O chips for the CPU.
    #[must_use]
    pub fn is_io_visible(&self) -> bool {
        self.charen() && (self.hiram() || self.loram())
    }

    fn char_rom_visible(&self) -> bool {
        !self.charen() && (self.hiram() || self.loram())
    }

    /// CPU read of anything but I/O, which the bus handles first.
    #[must_use]
    pub fn cpu_read(&self, addr: u16) -> u8 {
        let rom = |rom: Option<&[u8]>, base: u16| rom.and_then(|r| r.get(usize::from(addr - base)).copied());
        let mapped = match addr {
            0x0000 => Some(self.port_ddr),
            0x0001 => Some(self.effective_port()),
            0xA000..=0xBFFF if self.hiram() && self.loram() => rom(self.basic.as_deref(), 0xA000),
            0xD000..=0xDFFF if self.char_rom_visible() => rom(self.chargen.as_deref(), 0xD000),
            0xE000..=0xFFFF if self.hiram() => rom(self.kernal.as_deref(), 0xE000),
            _ => None,
        };
        mapped.unwrap_or(self.ram[usize::from(addr)])
    }

    /// CPU writes always land in RAM, except the port registers.
    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000 => self.port_ddr = value,
            0x0001 => self.port_data = value,
            _ => self.ram[usize::from(addr)] = value,
        }
    }

    /// VIC-II read through `bank` (0-3). The character ROM shows at
    /// $1000-$1FFF of banks 0 and 2.
    #[must_use]
    pub fn vic_read(&self, bank: u8, bank_addr: u16) -> u8 {
        let bank_addr = bank_addr & 0x3FFF;
        if bank & 1 == 0 && (0x1000..0x2000).contains(&bank_addr) {
            if let Some(byte) = self
                .chargen
                .as_ref()
                .and_then(|r| r.get(usize::from(bank_addr - 0x1000)))
            {
                return *byte;
            }
        }
        self.ram[usize::from(bank) * 0x4000 + usize::from(bank_addr)]
    }

    #[must_use]
    pub fn has_kernal(&self) -> bool {
        self.kernal.is_some()
    }

    /// Direct RAM write, for loaders.
    pub fn ram_write(&mut self, addr: u16, value: u8) {
        self.ram[usize::from(addr)] = value;
    }

    #[must_use]
    pub fn ram_read(&self, addr: u16) -> u8 {
        self.ram[usize::from(addr)]
    }

    #[must_use]
    pub fn colour_ram_read(&self, offset: u16) -> u8 {
        self.colour_ram[usize::from(offset & 0x3FF)] & 0x0F
    }

    pub fn colour_ram_write(&mut self, offset: u16, value: u8) {
        self.colour_ram[usize::from(offset & 0x3FF)] = value & 0x0F;
    }

    /// The VIC-II's view through one bank.
    #[must_use]
    pub fn vic_view(&self, bank: u8) -> VicView<'_> {
        VicView { memory: self, bank }
    }
}

/// [`C64Memory`] seen through the bank CIA2 selects.
pub struct VicView<'a> {
    memory: &'a C64Memory,
    bank: u8,
}

impl VideoMemory for VicView<'_> {
    fn vic_read(&self, addr: u16) -> u8 {
        self.memory.vic_read(self.bank, addr)
    }

    fn colour_read(&self, offset: u16) -> u8 {
        self.memory.colour_ram_read(offset)
    }
}
