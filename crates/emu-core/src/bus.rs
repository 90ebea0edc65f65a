//! Memory and I/O bus interface.

/// Interrupt inputs as seen by the CPU at an instruction boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterruptLines {
    /// IRQ is level-sensitive: asserted for as long as any source holds it.
    pub irq: bool,
    /// Current NMI line level. The CPU detects the edge itself.
    pub nmi: bool,
}

/// Memory and I/O bus interface.
///
/// The CPU reaches memory and peripherals only through this trait. The bus
/// decodes addresses and routes each access. Reads never fail: a region
/// with nothing mapped returns whatever value was last on the bus.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8);

    /// Advance the machine clock by `cycles` after an instruction.
    ///
    /// Machines forward this to their scheduler so that alarms falling due
    /// during the instruction fire before the next one starts.
    fn tick(&mut self, cycles: u32) {
        let _ = cycles;
    }

    /// Sample the interrupt inputs.
    fn poll_interrupts(&mut self) -> InterruptLines {
        InterruptLines::default()
    }
}

/// Flat 64 KiB RAM bus with externally driven interrupt lines.
///
/// Used by CPU tests and anywhere a bare processor needs memory.
pub struct SimpleBus {
    ram: Vec<u8>,
    /// Cycles ticked so far.
    pub cycles: u64,
    pub irq: bool,
    pub nmi: bool,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: vec![0; 0x1_0000],
            cycles: 0,
            irq: false,
            nmi: false,
        }
    }

    /// Copy `data` into RAM starting at `address`, wrapping at $FFFF.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            self.ram[usize::from(address.wrapping_add(i as u16))] = byte;
        }
    }

    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.ram[usize::from(address)]
    }

    pub fn poke(&mut self, address: u16, value: u8) {
        self.ram[usize::from(address)] = value;
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16) -> u8 {
        self.ram[usize::from(address)]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.ram[usize::from(address)] = value;
    }

    fn tick(&mut self, cycles: u32) {
        self.cycles += u64::from(cycles);
    }

    fn poll_interrupts(&mut self) -> InterruptLines {
        InterruptLines {
            irq: self.irq,
            nmi: self.nmi,
        }
    }
}
