//! Arithmetic and logic, with NMOS flag behaviour.

use crate::Mos6502;
use crate::flags::{C, D, N, V, Z};

impl Mos6502 {
    fn carry(&self) -> u8 {
        u8::from(self.regs.p.is_set(C))
    }

    pub(crate) fn set_nz(&mut self, value: u8) {
        self.regs.p.update_nz(value);
    }

    pub(crate) fn adc(&mut self, value: u8) {
        if self.regs.p.is_set(D) {
            self.adc_decimal(value);
        } else {
            self.adc_binary(value);
        }
    }

    fn adc_binary(&mut self, value: u8) {
        let a = self.regs.a;
        let sum = u16::from(a) + u16::from(value) + u16::from(self.carry());
        let result = sum as u8;
        self.regs.p.set_if(C, sum > 0xFF);
        self.regs.p.set_if(V, (a ^ result) & (value ^ result) & 0x80 != 0);
        self.set_nz(result);
        self.regs.a = result;
    }

    /// Decimal ADC. Z comes from the binary sum; N and V from the sum after
    /// the low-nibble adjust, before the high adjust.
    fn adc_decimal(&mut self, value: u8) {
        let a = u16::from(self.regs.a);
        let v = u16::from(value);
        let c = u16::from(self.carry());

        let mut low = (a & 0x0F) + (v & 0x0F) + c;
        if low > 9 {
            low += 6;
        }
        let mut high = (a >> 4) + (v >> 4) + u16::from(low > 0x0F);

        let binary = (a + v + c) as u8;
        let partial = ((high << 4) | (low & 0x0F)) as u8;
        self.regs.p.set_if(Z, binary == 0);
        self.regs.p.set_if(N, partial & 0x80 != 0);
        self.regs
            .p
            .set_if(V, (self.regs.a ^ partial) & (value ^ partial) & 0x80 != 0);

        if high > 9 {
            high += 6;
        }
        self.regs.p.set_if(C, high > 0x0F);
        self.regs.a = ((high << 4) | (low & 0x0F)) as u8;
    }

    pub(crate) fn sbc(&mut self, value: u8) {
        if self.regs.p.is_set(D) {
            self.sbc_decimal(value);
        } else {
            // Binary SBC is ADC of the complement.
            self.adc_binary(!value);
        }
    }

    /// Decimal SBC. All flags come from the binary difference.
    fn sbc_decimal(&mut self, value: u8) {
        let a = i16::from(self.regs.a);
        let v = i16::from(value);
        let borrow = i16::from(1 - self.carry());

        let mut low = (a & 0x0F) - (v & 0x0F) - borrow;
        let mut high = (a >> 4) - (v >> 4);
        if low < 0 {
            low -= 6;
            high -= 1;
        }
        if high < 0 {
            high -= 6;
        }

        let binary = a - v - borrow;
        let result8 = binary as u8;
        self.regs.p.set_if(C, binary >= 0);
        self.regs.p.set_if(
            V,
            (self.regs.a ^ value) & (self.regs.a ^ result8) & 0x80 != 0,
        );
        self.set_nz(result8);
        self.regs.a = (((high & 0x0F) << 4) | (low & 0x0F)) as u8;
    }

    pub(crate) fn compare(&mut self, register: u8, value: u8) {
        self.regs.p.set_if(C, register >= value);
        self.set_nz(register.wrapping_sub(value));
    }

    pub(crate) fn asl(&mut self, value: u8) -> u8 {
        self.regs.p.set_if(C, value & 0x80 != 0);
        let result = value << 1;
        self.set_nz(result);
        result
    }

    pub(crate) fn lsr(&mut self, value: u8) -> u8 {
        self.regs.p.set_if(C, value & 0x01 != 0);
        let result = value >> 1;
        self.set_nz(result);
        result
    }

    pub(crate) fn rol(&mut self, value: u8) -> u8 {
        let carry_in = self.carry();
        self.regs.p.set_if(C, value & 0x80 != 0);
        let result = (value << 1) | carry_in;
        self.set_nz(result);
        result
    }

    pub(crate) fn ror(&mut self, value: u8) -> u8 {
        let carry_in = self.carry() << 7;
        self.regs.p.set_if(C, value & 0x01 != 0);
        let result = (value >> 1) | carry_in;
        self.set_nz(result);
        result
    }

    pub(crate) fn inc(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.set_nz(result);
        result
    }

    pub(crate) fn dec(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.set_nz(result);
        result
    }

    pub(crate) fn bit(&mut self, value: u8) {
        self.regs.p.set_if(Z, self.regs.a & value == 0);
        self.regs.p.set_if(N, value & 0x80 != 0);
        self.regs.p.set_if(V, value & 0x40 != 0);
    }

    /// ARR: AND with the operand, then rotate right through carry. Flags
    /// and, in decimal mode, the result follow the adder's BCD fix-up logic
    /// rather than ROR.
    pub(crate) fn arr(&mut self, value: u8) {
        let and = self.regs.a & value;
        let rotated = (and >> 1) | (self.carry() << 7);

        if self.regs.p.is_set(D) {
            let mut result = rotated;
            self.regs.p.set_if(N, self.carry() != 0);
            self.regs.p.set_if(Z, rotated == 0);
            self.regs.p.set_if(V, (rotated ^ and) & 0x40 != 0);
            if (and & 0x0F) + (and & 0x01) > 0x05 {
                result = (result & 0xF0) | (result.wrapping_add(0x06) & 0x0F);
            }
            if u16::from(and & 0xF0) + u16::from(and & 0x10) > 0x50 {
                result = (result & 0x0F) | (result.wrapping_add(0x60) & 0xF0);
                self.regs.p.set_if(C, true);
            } else {
                self.regs.p.set_if(C, false);
            }
            self.regs.a = result;
        } else {
            self.set_nz(rotated);
            self.regs.p.set_if(C, rotated & 0x40 != 0);
            self.regs
                .p
                .set_if(V, ((rotated & 0x40) ^ ((rotated & 0x20) << 1)) != 0);
            self.regs.a = rotated;
        }
    }
}
