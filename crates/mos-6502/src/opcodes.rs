//! Opcode decode table.
//!
//! All 256 opcodes decode through one table built at compile time. Each
//! entry names the operation, its addressing mode and the base cycle count.
//! The executor adds the page-crossing and branch penalties.

/// Addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No operand.
    Imp,
    /// Operates on A.
    Acc,
    /// `#$nn`
    Imm,
    /// `$nn`
    Zp,
    /// `$nn,X`
    Zpx,
    /// `$nn,Y`
    Zpy,
    /// `$nnnn`
    Abs,
    /// `$nnnn,X`
    Abx,
    /// `$nnnn,Y`
    Aby,
    /// `($nnnn)`, JMP only.
    Ind,
    /// `($nn,X)`
    Izx,
    /// `($nn),Y`
    Izy,
    /// Branch offset.
    Rel,
}

impl Mode {
    /// Operand bytes following the opcode.
    #[must_use]
    pub const fn operand_len(self) -> u16 {
        match self {
            Mode::Imp | Mode::Acc => 0,
            Mode::Abs | Mode::Abx | Mode::Aby | Mode::Ind => 2,
            _ => 1,
        }
    }
}

/// Operation, documented and undocumented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Pla,
    Plp,
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sta,
    Stx,
    Sty,
    Tax,
    Tay,
    Tsx,
    Txa,
    Txs,
    Tya,
    // Undocumented.
    /// A & #imm, C = N.
    Anc,
    /// A & #imm, then LSR A. Also known as ASR.
    Alr,
    /// A & #imm, then ROR A with odd flag rules.
    Arr,
    /// A = (A | magic) & X & #imm. Unstable on real silicon.
    Ane,
    /// A = X = (A | magic) & #imm.
    Lxa,
    /// X = (A & X) - #imm without borrow. Also known as AXS.
    Sbx,
    /// A = X = S = S & mem.
    Las,
    /// A = X = mem.
    Lax,
    /// mem = A & X.
    Sax,
    /// ASL mem, then ORA.
    Slo,
    /// ROL mem, then AND.
    Rla,
    /// LSR mem, then EOR.
    Sre,
    /// ROR mem, then ADC.
    Rra,
    /// DEC mem, then CMP.
    Dcp,
    /// INC mem, then SBC.
    Isc,
    /// mem = A & X & (H + 1).
    Sha,
    /// mem = X & (H + 1).
    Shx,
    /// mem = Y & (H + 1).
    Shy,
    /// S = A & X, mem = S & (H + 1). Also known as SHS.
    Tas,
    /// Halts the processor until reset. Also known as KIL.
    Jam,
}

impl Mnemonic {
    /// Whether the operation only reads its operand, and so pays the extra
    /// cycle on a page crossing.
    #[must_use]
    pub const fn takes_page_penalty(self) -> bool {
        matches!(
            self,
            Mnemonic::Adc
                | Mnemonic::And
                | Mnemonic::Cmp
                | Mnemonic::Eor
                | Mnemonic::Lda
                | Mnemonic::Ldx
                | Mnemonic::Ldy
                | Mnemonic::Ora
                | Mnemonic::Sbc
                | Mnemonic::Nop
                | Mnemonic::Lax
                | Mnemonic::Las
        )
    }

    /// Whether the operation is missing from the MOS datasheet.
    #[must_use]
    pub const fn is_undocumented(self) -> bool {
        matches!(
            self,
            Mnemonic::Anc
                | Mnemonic::Alr
                | Mnemonic::Arr
                | Mnemonic::Ane
                | Mnemonic::Lxa
                | Mnemonic::Sbx
                | Mnemonic::Las
                | Mnemonic::Lax
                | Mnemonic::Sax
                | Mnemonic::Slo
                | Mnemonic::Rla
                | Mnemonic::Sre
                | Mnemonic::Rra
                | Mnemonic::Dcp
                | Mnemonic::Isc
                | Mnemonic::Sha
                | Mnemonic::Shx
                | Mnemonic::Shy
                | Mnemonic::Tas
                | Mnemonic::Jam
        )
    }
}

/// One decoded opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub mnemonic: Mnemonic,
    pub mode: Mode,
    /// Cycles with no page crossing and branch not taken.
    pub cycles: u8,
    /// Whether a page crossing while indexing costs one more cycle.
    pub page_penalty: bool,
}

const fn op(mnemonic: Mnemonic, mode: Mode, cycles: u8) -> Opcode {
    Opcode {
        mnemonic,
        mode,
        cycles,
        page_penalty: mnemonic.takes_page_penalty()
            && matches!(mode, Mode::Abx | Mode::Aby | Mode::Izy),
    }
}

use Mnemonic::{
    Adc, Alr, Anc, And, Ane, Arr, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cpx, Cpy, Dcp, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Isc, Jam, Jmp, Jsr,
    Las, Lax, Lda, Ldx, Ldy, Lsr, Lxa, Nop, Ora, Pha, Php, Pla, Plp, Rla, Rol, Ror, Rra, Rti,
    Rts, Sax, Sbc, Sbx, Sec, Sed, Sei, Sha, Shx, Shy, Slo, Sre, Sta, Stx, Sty, Tas, Tax, Tay,
    Tsx, Txa, Txs, Tya,
};
use Mode::{Abs, Abx, Aby, Acc, Imm, Imp, Ind, Izx, Izy, Rel, Zp, Zpx, Zpy};

/// NMOS 6502 decode table, indexed by opcode byte.
#[rustfmt::skip]
pub static OPCODES: [Opcode; 256] = [
    // $00
    op(Brk, Imp, 7), op(Ora, Izx, 6), op(Jam, Imp, 2), op(Slo, Izx, 8),
    op(Nop, Zp, 3),  op(Ora, Zp, 3),  op(Asl, Zp, 5),  op(Slo, Zp, 5),
    op(Php, Imp, 3), op(Ora, Imm, 2), op(Asl, Acc, 2), op(Anc, Imm, 2),
    op(Nop, Abs, 4), op(Ora, Abs, 4), op(Asl, Abs, 6), op(Slo, Abs, 6),
    // $10
    op(Bpl, Rel, 2), op(Ora, Izy, 5), op(Jam, Imp, 2), op(Slo, Izy, 8),
    op(Nop, Zpx, 4), op(Ora, Zpx, 4), op(Asl, Zpx, 6), op(Slo, Zpx, 6),
    op(Clc, Imp, 2), op(Ora, Aby, 4), op(Nop, Imp, 2), op(Slo, Aby, 7),
    op(Nop, Abx, 4), op(Ora, Abx, 4), op(Asl, Abx, 7), op(Slo, Abx, 7),
    // $20
    op(Jsr, Abs, 6), op(And, Izx, 6), op(Jam, Imp, 2), op(Rla, Izx, 8),
    op(Bit, Zp, 3),  op(And, Zp, 3),  op(Rol, Zp, 5),  op(Rla, Zp, 5),
    op(Plp, Imp, 4), op(And, Imm, 2), op(Rol, Acc, 2), op(Anc, Imm, 2),
    op(Bit, Abs, 4), op(And, Abs, 4), op(Rol, Abs, 6), op(Rla, Abs, 6),
    // $30
    op(Bmi, Rel, 2), op(And, Izy, 5), op(Jam, Imp, 2), op(Rla, Izy, 8),
    op(Nop, Zpx, 4), op(And, Zpx, 4), op(Rol, Zpx, 6), op(Rla, Zpx, 6),
    op(Sec, Imp, 2), op(And, Aby, 4), op(Nop, Imp, 2), op(Rla, Aby, 7),
    op(Nop, Abx, 4), op(And, Abx, 4), op(Rol, Abx, 7), op(Rla, Abx, 7),
    // $40
    op(Rti, Imp, 6), op(Eor, Izx, 6), op(Jam, Imp, 2), op(Sre, Izx, 8),
    op(Nop, Zp, 3),  op(Eor, Zp, 3),  op(Lsr, Zp, 5),  op(Sre, Zp, 5),
    op(Pha, Imp, 3), op(Eor, Imm, 2), op(Lsr, Acc, 2), op(Alr, Imm, 2),
    op(Jmp, Abs, 3), op(Eor, Abs, 4), op(Lsr, Abs, 6), op(Sre, Abs, 6),
    // $50
    op(Bvc, Rel, 2), op(Eor, Izy, 5), op(Jam, Imp, 2), op(Sre, Izy, 8),
    op(Nop, Zpx, 4), op(Eor, Zpx, 4), op(Lsr, Zpx, 6), op(Sre, Zpx, 6),
    op(Cli, Imp, 2), op(Eor, Aby, 4), op(Nop, Imp, 2), op(Sre, Aby, 7),
    op(Nop, Abx, 4), op(Eor, Abx, 4), op(Lsr, Abx, 7), op(Sre, Abx, 7),
    // $60
    op(Rts, Imp, 6), op(Adc, Izx, 6), op(Jam, Imp, 2), op(Rra, Izx, 8),
    op(Nop, Zp, 3),  op(Adc, Zp, 3),  op(Ror, Zp, 5),  op(Rra, Zp, 5),
    op(Pla, Imp, 4), op(Adc, Imm, 2), op(Ror, Acc, 2), op(Arr, Imm, 2),
    op(Jmp, Ind, 5), op(Adc, Abs, 4), op(Ror, Abs, 6), op(Rra, Abs, 6),
    // $70
    op(Bvs, Rel, 2), op(Adc, Izy, 5), op(Jam, Imp, 2), op(Rra, Izy, 8),
    op(Nop, Zpx, 4), op(Adc, Zpx, 4), op(Ror, Zpx, 6), op(Rra, Zpx, 6),
    op(Sei, Imp, 2), op(Adc, Aby, 4), op(Nop, Imp, 2), op(Rra, Aby, 7),
    op(Nop, Abx, 4), op(Adc, Abx, 4), op(Ror, Abx, 7), op(Rra, Abx, 7),
    // $80
    op(Nop, Imm, 2), op(Sta, Izx, 6), op(Nop, Imm, 2), op(Sax, Izx, 6),
    op(Sty, Zp, 3),  op(Sta, Zp, 3),  op(Stx, Zp, 3),  op(Sax, Zp, 3),
    op(Dey, Imp, 2), op(Nop, Imm, 2), op(Txa, Imp, 2), op(Ane, Imm, 2),
    op(Sty, Abs, 4), op(Sta, Abs, 4), op(Stx, Abs, 4), op(Sax, Abs, 4),
    // $90
    op(Bcc, Rel, 2), op(Sta, Izy, 6), op(Jam, Imp, 2), op(Sha, Izy, 6),
    op(Sty, Zpx, 4), op(Sta, Zpx, 4), op(Stx, Zpy, 4), op(Sax, Zpy, 4),
    op(Tya, Imp, 2), op(Sta, Aby, 5), op(Txs, Imp, 2), op(Tas, Aby, 5),
    op(Shy, Abx, 5), op(Sta, Abx, 5), op(Shx, Aby, 5), op(Sha, Aby, 5),
    // $A0
    op(Ldy, Imm, 2), op(Lda, Izx, 6), op(Ldx, Imm, 2), op(Lax, Izx, 6),
    op(Ldy, Zp, 3),  op(Lda, Zp, 3),  op(Ldx, Zp, 3),  op(Lax, Zp, 3),
    op(Tay, Imp, 2), op(Lda, Imm, 2), op(Tax, Imp, 2), op(Lxa, Imm, 2),
    op(Ldy, Abs, 4), op(Lda, Abs, 4), op(Ldx, Abs, 4), op(Lax, Abs, 4),
    // $B0
    op(Bcs, Rel, 2), op(Lda, Izy, 5), op(Jam, Imp, 2), op(Lax, Izy, 5),
    op(Ldy, Zpx, 4), op(Lda, Zpx, 4), op(Ldx, Zpy, 4), op(Lax, Zpy, 4),
    op(Clv, Imp, 2), op(Lda, Aby, 4), op(Tsx, Imp, 2), op(Las, Aby, 4),
    op(Ldy, Abx, 4), op(Lda, Abx, 4), op(Ldx, Aby, 4), op(Lax, Aby, 4),
    // $C0
    op(Cpy, Imm, 2), op(Cmp, Izx, 6), op(Nop, Imm, 2), op(Dcp, Izx, 8),
    op(Cpy, Zp, 3),  op(Cmp, Zp, 3),  op(Dec, Zp, 5),  op(Dcp, Zp, 5),
    op(Iny, Imp, 2), op(Cmp, Imm, 2), op(Dex, Imp, 2), op(Sbx, Imm, 2),
    op(Cpy, Abs, 4), op(Cmp, Abs, 4), op(Dec, Abs, 6), op(Dcp, Abs, 6),
    // $D0
    op(Bne, Rel, 2), op(Cmp, Izy, 5), op(Jam, Imp, 2), op(Dcp, Izy, 8),
    op(Nop, Zpx, 4), op(Cmp, Zpx, 4), op(Dec, Zpx, 6), op(Dcp, Zpx, 6),
    op(Cld, Imp, 2), op(Cmp, Aby, 4), op(Nop, Imp, 2), op(Dcp, Aby, 7),
    op(Nop, Abx, 4), op(Cmp, Abx, 4), op(Dec, Abx, 7), op(Dcp, Abx, 7),
    // $E0
    op(Cpx, Imm, 2), op(Sbc, Izx, 6), op(Nop, Imm, 2), op(Isc, Izx, 8),
    op(Cpx, Zp, 3),  op(Sbc, Zp, 3),  op(Inc, Zp, 5),  op(Isc, Zp, 5),
    op(Inx, Imp, 2), op(Sbc, Imm, 2), op(Nop, Imp, 2), op(Sbc, Imm, 2),
    op(Cpx, Abs, 4), op(Sbc, Abs, 4), op(Inc, Abs, 6), op(Isc, Abs, 6),
    // $F0
    op(Beq, Rel, 2), op(Sbc, Izy, 5), op(Jam, Imp, 2), op(Isc, Izy, 8),
    op(Nop, Zpx, 4), op(Sbc, Zpx, 4), op(Inc, Zpx, 6), op(Isc, Zpx, 6),
    op(Sed, Imp, 2), op(Sbc, Aby, 4), op(Nop, Imp, 2), op(Isc, Aby, 7),
    op(Nop, Abx, 4), op(Sbc, Abx, 4), op(Inc, Abx, 7), op(Isc, Abx, 7),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twelve_jam_opcodes() {
        let jams: Vec<usize> = (0..256)
            .filter(|&i| OPCODES[i].mnemonic == Mnemonic::Jam)
            .collect();
        assert_eq!(
            jams,
            vec![0x02, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2]
        );
    }

    #[test]
    fn documented_opcode_count() {
        let documented = OPCODES
            .iter()
            .filter(|o| !o.mnemonic.is_undocumented())
            .filter(|o| !matches!(o.mnemonic, Mnemonic::Nop) || o.mode == Mode::Imp)
            .count();
        // 151 datasheet opcodes, plus the six undocumented implied NOPs and
        // SBC $EB which share a documented mnemonic.
        assert_eq!(documented, 151 + 6 + 1);
    }

    #[test]
    fn page_penalty_only_on_indexed_reads() {
        assert!(OPCODES[0xBD].page_penalty); // LDA abs,X
        assert!(OPCODES[0xB1].page_penalty); // LDA (zp),Y
        assert!(OPCODES[0x1C].page_penalty); // NOP abs,X
        assert!(!OPCODES[0x9D].page_penalty); // STA abs,X
        assert!(!OPCODES[0xFE].page_penalty); // INC abs,X
        assert!(!OPCODES[0xB5].page_penalty); // LDA zp,X
    }
}
