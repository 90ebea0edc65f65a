//! Instruction execution.

use emu_core::Bus;

use crate::flags::{C, D, I, N, V, Z};
use crate::opcodes::{Mnemonic, Mode, OPCODES};
use crate::{IRQ_VECTOR, Mos6502, Registers, Status};

impl Mos6502 {
    /// Execute `opcode`, whose byte has already been fetched. Returns the
    /// cycles taken.
    pub(crate) fn execute(&mut self, bus: &mut impl Bus, opcode: u8) -> u32 {
        let op = OPCODES[usize::from(opcode)];
        let mut cycles = u32::from(op.cycles);
        let i_before = self.regs.p.is_set(I);

        match op.mnemonic {
            // Loads and stores
            Mnemonic::Lda => {
                self.regs.a = self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                self.set_nz(self.regs.a);
            }
            Mnemonic::Ldx => {
                self.regs.x = self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                self.set_nz(self.regs.x);
            }
            Mnemonic::Ldy => {
                self.regs.y = self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                self.set_nz(self.regs.y);
            }
            Mnemonic::Sta => self.store(bus, op.mode, self.regs.a),
            Mnemonic::Stx => self.store(bus, op.mode, self.regs.x),
            Mnemonic::Sty => self.store(bus, op.mode, self.regs.y),

            // Logic and arithmetic
            Mnemonic::And => {
                self.regs.a &= self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                self.set_nz(self.regs.a);
            }
            Mnemonic::Ora => {
                self.regs.a |= self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                self.set_nz(self.regs.a);
            }
            Mnemonic::Eor => {
                self.regs.a ^= self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                self.set_nz(self.regs.a);
            }
            Mnemonic::Adc => {
                let value = self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                self.adc(value);
            }
            Mnemonic::Sbc => {
                let value = self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                self.sbc(value);
            }
            Mnemonic::Cmp => {
                let value = self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                self.compare(self.regs.a, value);
            }
            Mnemonic::Cpx => {
                let value = self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                self.compare(self.regs.x, value);
            }
            Mnemonic::Cpy => {
                let value = self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                self.compare(self.regs.y, value);
            }
            Mnemonic::Bit => {
                let value = self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                self.bit(value);
            }

            // Read-modify-write
            Mnemonic::Asl => {
                self.modify(bus, op.mode, Self::asl);
            }
            Mnemonic::Lsr => {
                self.modify(bus, op.mode, Self::lsr);
            }
            Mnemonic::Rol => {
                self.modify(bus, op.mode, Self::rol);
            }
            Mnemonic::Ror => {
                self.modify(bus, op.mode, Self::ror);
            }
            Mnemonic::Inc => {
                self.modify(bus, op.mode, Self::inc);
            }
            Mnemonic::Dec => {
                self.modify(bus, op.mode, Self::dec);
            }

            // Register transfers and increments
            Mnemonic::Tax => self.transfer(self.regs.a, |r, v| r.x = v),
            Mnemonic::Tay => self.transfer(self.regs.a, |r, v| r.y = v),
            Mnemonic::Txa => self.transfer(self.regs.x, |r, v| r.a = v),
            Mnemonic::Tya => self.transfer(self.regs.y, |r, v| r.a = v),
            Mnemonic::Tsx => self.transfer(self.regs.s, |r, v| r.x = v),
            Mnemonic::Txs => {
                self.implied_read(bus);
                self.regs.s = self.regs.x;
            }
            Mnemonic::Inx => self.transfer(self.regs.x.wrapping_add(1), |r, v| r.x = v),
            Mnemonic::Iny => self.transfer(self.regs.y.wrapping_add(1), |r, v| r.y = v),
            Mnemonic::Dex => self.transfer(self.regs.x.wrapping_sub(1), |r, v| r.x = v),
            Mnemonic::Dey => self.transfer(self.regs.y.wrapping_sub(1), |r, v| r.y = v),

            // Flags
            Mnemonic::Clc => self.set_flag(bus, C, false),
            Mnemonic::Sec => self.set_flag(bus, C, true),
            Mnemonic::Cli => self.set_flag(bus, I, false),
            Mnemonic::Sei => self.set_flag(bus, I, true),
            Mnemonic::Cld => self.set_flag(bus, D, false),
            Mnemonic::Sed => self.set_flag(bus, D, true),
            Mnemonic::Clv => self.set_flag(bus, V, false),

            // Stack
            Mnemonic::Pha => {
                self.implied_read(bus);
                self.push(bus, self.regs.a);
            }
            Mnemonic::Php => {
                self.implied_read(bus);
                self.push(bus, self.regs.p.to_byte_brk());
            }
            Mnemonic::Pla => {
                self.implied_read(bus);
                self.regs.a = self.pull(bus);
                self.set_nz(self.regs.a);
            }
            Mnemonic::Plp => {
                self.implied_read(bus);
                let value = self.pull(bus);
                self.regs.p = Status::from_byte(value);
            }

            // Control flow
            Mnemonic::Jmp => {
                self.regs.pc = self.effective(bus, op.mode).addr;
            }
            Mnemonic::Jsr => {
                let target = self.fetch_word(bus);
                self.push_word(bus, self.regs.pc.wrapping_sub(1));
                self.regs.pc = target;
            }
            Mnemonic::Rts => {
                self.implied_read(bus);
                self.regs.pc = self.pull_word(bus).wrapping_add(1);
            }
            Mnemonic::Rti => {
                self.implied_read(bus);
                let value = self.pull(bus);
                self.regs.p = Status::from_byte(value);
                self.regs.pc = self.pull_word(bus);
            }
            Mnemonic::Brk => {
                // BRK skips the byte after the opcode.
                self.fetch(bus);
                self.push_word(bus, self.regs.pc);
                self.push(bus, self.regs.p.to_byte_brk());
                self.regs.p.set_if(I, true);
                self.regs.pc = self.read_word(bus, IRQ_VECTOR);
            }
            Mnemonic::Bcc => cycles += self.branch(bus, !self.regs.p.is_set(C)),
            Mnemonic::Bcs => cycles += self.branch(bus, self.regs.p.is_set(C)),
            Mnemonic::Bne => cycles += self.branch(bus, !self.regs.p.is_set(Z)),
            Mnemonic::Beq => cycles += self.branch(bus, self.regs.p.is_set(Z)),
            Mnemonic::Bpl => cycles += self.branch(bus, !self.regs.p.is_set(N)),
            Mnemonic::Bmi => cycles += self.branch(bus, self.regs.p.is_set(N)),
            Mnemonic::Bvc => cycles += self.branch(bus, !self.regs.p.is_set(V)),
            Mnemonic::Bvs => cycles += self.branch(bus, self.regs.p.is_set(V)),

            Mnemonic::Nop => {
                if op.mode == Mode::Imp {
                    self.implied_read(bus);
                } else {
                    self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                }
            }

            // Undocumented: combined read-modify-write and ALU
            Mnemonic::Slo => {
                let value = self.modify(bus, op.mode, Self::asl);
                self.regs.a |= value;
                self.set_nz(self.regs.a);
            }
            Mnemonic::Rla => {
                let value = self.modify(bus, op.mode, Self::rol);
                self.regs.a &= value;
                self.set_nz(self.regs.a);
            }
            Mnemonic::Sre => {
                let value = self.modify(bus, op.mode, Self::lsr);
                self.regs.a ^= value;
                self.set_nz(self.regs.a);
            }
            Mnemonic::Rra => {
                let value = self.modify(bus, op.mode, Self::ror);
                self.adc(value);
            }
            Mnemonic::Dcp => {
                let value = self.modify(bus, op.mode, |_, v| v.wrapping_sub(1));
                self.compare(self.regs.a, value);
            }
            Mnemonic::Isc => {
                let value = self.modify(bus, op.mode, |_, v| v.wrapping_add(1));
                self.sbc(value);
            }

            // Undocumented: loads and stores
            Mnemonic::Lax => {
                let value = self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                self.regs.a = value;
                self.regs.x = value;
                self.set_nz(value);
            }
            Mnemonic::Sax => self.store(bus, op.mode, self.regs.a & self.regs.x),
            Mnemonic::Las => {
                let value = self.read_operand(bus, op.mode, op.page_penalty, &mut cycles);
                let result = self.regs.s & value;
                self.regs.a = result;
                self.regs.x = result;
                self.regs.s = result;
                self.set_nz(result);
            }
            Mnemonic::Sha => self.store_high_and(bus, op.mode, self.regs.a & self.regs.x),
            Mnemonic::Shx => self.store_high_and(bus, op.mode, self.regs.x),
            Mnemonic::Shy => self.store_high_and(bus, op.mode, self.regs.y),
            Mnemonic::Tas => {
                self.regs.s = self.regs.a & self.regs.x;
                self.store_high_and(bus, op.mode, self.regs.s);
            }

            // Undocumented: immediate ALU
            Mnemonic::Anc => {
                self.regs.a &= self.fetch(bus);
                self.set_nz(self.regs.a);
                self.regs.p.set_if(C, self.regs.a & 0x80 != 0);
            }
            Mnemonic::Alr => {
                let value = self.regs.a & self.fetch(bus);
                self.regs.a = self.lsr(value);
            }
            Mnemonic::Arr => {
                let value = self.fetch(bus);
                self.arr(value);
            }
            Mnemonic::Sbx => {
                let value = self.fetch(bus);
                let and = self.regs.a & self.regs.x;
                self.regs.p.set_if(C, and >= value);
                self.regs.x = and.wrapping_sub(value);
                self.set_nz(self.regs.x);
            }
            Mnemonic::Ane => {
                let value = self.fetch(bus);
                self.regs.a = (self.regs.a | self.config.ane_magic) & self.regs.x & value;
                self.set_nz(self.regs.a);
            }
            Mnemonic::Lxa => {
                let value = self.fetch(bus);
                let result = (self.regs.a | self.config.lxa_magic) & value;
                self.regs.a = result;
                self.regs.x = result;
                self.set_nz(result);
            }
            Mnemonic::Jam => {
                self.regs.pc = self.regs.pc.wrapping_sub(1);
                self.jammed = true;
                log::warn!(
                    "6502: JAM opcode ${opcode:02X} at ${:04X}, CPU halted until reset",
                    self.regs.pc
                );
            }
        }

        if matches!(op.mnemonic, Mnemonic::Cli | Mnemonic::Sei | Mnemonic::Plp) {
            self.delayed_i = Some(i_before);
        }
        cycles
    }

    /// The second cycle of a one-byte instruction reads the next byte and
    /// throws it away.
    fn implied_read(&mut self, bus: &mut impl Bus) {
        bus.read(self.regs.pc);
    }

    fn transfer(&mut self, value: u8, dest: fn(&mut Registers, u8)) {
        dest(&mut self.regs, value);
        self.set_nz(value);
    }

    fn set_flag(&mut self, bus: &mut impl Bus, flag: u8, on: bool) {
        self.implied_read(bus);
        self.regs.p.set_if(flag, on);
    }

    fn store(&mut self, bus: &mut impl Bus, mode: Mode, value: u8) {
        let ea = self.write_address(bus, mode);
        bus.write(ea.addr, value);
    }

    /// SHA/SHX/SHY/TAS store `value & (H + 1)`, where H is the high byte
    /// of the base address. When indexing crosses a page the stored byte
    /// also replaces the high byte of the target.
    fn store_high_and(&mut self, bus: &mut impl Bus, mode: Mode, value: u8) {
        let ea = self.write_address(bus, mode);
        let base_high = (ea.unfixed.unwrap_or(ea.addr) >> 8) as u8;
        let stored = value & base_high.wrapping_add(1);
        let addr = if ea.page_crossed() {
            (u16::from(stored) << 8) | (ea.addr & 0x00FF)
        } else {
            ea.addr
        };
        bus.write(addr, stored);
    }

    /// Read-modify-write. Memory operands see the unmodified value written
    /// back before the result, as the NMOS part does. Returns the result.
    fn modify(&mut self, bus: &mut impl Bus, mode: Mode, f: fn(&mut Self, u8) -> u8) -> u8 {
        if mode == Mode::Acc {
            self.implied_read(bus);
            let result = f(self, self.regs.a);
            self.regs.a = result;
            return result;
        }
        let ea = self.write_address(bus, mode);
        let value = bus.read(ea.addr);
        bus.write(ea.addr, value);
        let result = f(self, value);
        bus.write(ea.addr, result);
        result
    }

    /// Conditional branch. Returns the extra cycles: one if taken, two if
    /// the target is on another page.
    fn branch(&mut self, bus: &mut impl Bus, condition: bool) -> u32 {
        let offset = self.fetch(bus) as i8;
        if !condition {
            return 0;
        }
        let old = self.regs.pc;
        let target = old.wrapping_add_signed(i16::from(offset));
        self.regs.pc = target;
        if (old & 0xFF00) == (target & 0xFF00) {
            1
        } else {
            2
        }
    }
}
