use std::fmt;

use crate::register::Register;

/// A decoded LC3 instruction.
///
/// Decoding is total: every 16-bit word maps to exactly one variant. The two opcodes without
/// defined behaviour (`RTI` and the reserved `0b1101`) decode to [`Instr::Reserved`], which the
/// runtime treats as fatal.
///
/// Offsets and immediates are stored already sign-extended to 16 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instr {
    Br { nzp: u16, offset: u16 },
    Add { dr: Register, sr1: Register, operand: Operand },
    Ld { dr: Register, offset: u16 },
    St { sr: Register, offset: u16 },
    Jsr { target: JsrTarget },
    And { dr: Register, sr1: Register, operand: Operand },
    Ldr { dr: Register, base: Register, offset: u16 },
    Str { sr: Register, base: Register, offset: u16 },
    Not { dr: Register, sr: Register },
    Ldi { dr: Register, offset: u16 },
    Sti { sr: Register, offset: u16 },
    /// `JMP R7` is the conventional `RET`.
    Jmp { base: Register },
    Lea { dr: Register, offset: u16 },
    Trap { vector: u8 },
    Reserved(ReservedOp),
}

/// Second operand of `ADD` and `AND`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg(Register),
    Imm(u16),
}

/// `JSR` jumps relative to PC, `JSRR` jumps to a base register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JsrTarget {
    Offset(u16),
    Base(Register),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservedOp {
    Rti,
    Res,
}

impl fmt::Display for ReservedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservedOp::Rti => write!(f, "RTI"),
            ReservedOp::Res => write!(f, "RES"),
        }
    }
}

/// Service routines reachable through `TRAP`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapVector {
    Getc = 0x20,
    Out = 0x21,
    Puts = 0x22,
    In = 0x23,
    Putsp = 0x24,
    Halt = 0x25,
}

impl TryFrom<u8> for TrapVector {
    type Error = ();
    fn try_from(vector: u8) -> Result<Self, Self::Error> {
        Ok(match vector {
            0x20 => TrapVector::Getc,
            0x21 => TrapVector::Out,
            0x22 => TrapVector::Puts,
            0x23 => TrapVector::In,
            0x24 => TrapVector::Putsp,
            0x25 => TrapVector::Halt,
            _ => return Err(()),
        })
    }
}

impl From<u16> for Instr {
    fn from(word: u16) -> Self {
        let dr = Register::from_field(word >> 9);
        let sr1 = Register::from_field(word >> 6);
        let off9 = sign_extend(word, 9);
        let off6 = sign_extend(word, 6);

        match word >> 12 {
            0x0 => Instr::Br {
                nzp: (word >> 9) & 0b111,
                offset: off9,
            },
            0x1 => Instr::Add {
                dr,
                sr1,
                operand: Operand::from_word(word),
            },
            0x2 => Instr::Ld { dr, offset: off9 },
            0x3 => Instr::St { sr: dr, offset: off9 },
            0x4 => {
                let target = if word & 0x0800 != 0 {
                    JsrTarget::Offset(sign_extend(word, 11))
                } else {
                    JsrTarget::Base(sr1)
                };
                Instr::Jsr { target }
            }
            0x5 => Instr::And {
                dr,
                sr1,
                operand: Operand::from_word(word),
            },
            0x6 => Instr::Ldr {
                dr,
                base: sr1,
                offset: off6,
            },
            0x7 => Instr::Str {
                sr: dr,
                base: sr1,
                offset: off6,
            },
            0x8 => Instr::Reserved(ReservedOp::Rti),
            0x9 => Instr::Not { dr, sr: sr1 },
            0xA => Instr::Ldi { dr, offset: off9 },
            0xB => Instr::Sti { sr: dr, offset: off9 },
            0xC => Instr::Jmp { base: sr1 },
            0xD => Instr::Reserved(ReservedOp::Res),
            0xE => Instr::Lea { dr, offset: off9 },
            // Only 4 bits remain after the shift
            _ => Instr::Trap {
                vector: (word & 0xFF) as u8,
            },
        }
    }
}

impl Operand {
    fn from_word(word: u16) -> Self {
        if word & 0b10_0000 == 0 {
            Operand::Reg(Register::from_field(word))
        } else {
            Operand::Imm(sign_extend(word, 5))
        }
    }
}

/// Sign-extend the lowest `bits` bits of `val` to 16 bits.
///
/// Any bits above the field are discarded first, so callers may pass a whole instruction word.
#[inline]
pub fn sign_extend(val: u16, bits: u32) -> u16 {
    debug_assert!(bits > 0 && bits <= 16);
    let shift = 16 - bits;
    (((val << shift) as i16) >> shift) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::Register::*;

    /// Reference extension through a wider signed type.
    fn reference_extend(val: u16, bits: u32) -> u16 {
        let field = (val as i32) & ((1 << bits) - 1);
        let signed = if field & (1 << (bits - 1)) != 0 {
            field - (1 << bits)
        } else {
            field
        };
        signed as i16 as u16
    }

    #[test]
    fn sign_extend_matches_twos_complement() {
        for bits in [5, 6, 9, 11] {
            for val in 0..(1u16 << bits) {
                assert_eq!(
                    sign_extend(val, bits),
                    reference_extend(val, bits),
                    "sign_extend(0x{val:04x}, {bits})"
                );
            }
        }
    }

    #[test]
    fn sign_extend_known_values() {
        assert_eq!(sign_extend(0b10000, 5), 0xFFF0);
        assert_eq!(sign_extend(0b01111, 5), 0x000F);
        assert_eq!(sign_extend(0x1FF, 9), 0xFFFF);
        assert_eq!(sign_extend(0x0FF, 9), 0x00FF);
        assert_eq!(sign_extend(0x400, 11), 0xFC00);
        // Upper bits of the word are ignored
        assert_eq!(sign_extend(0xF03F, 6), 0xFFFF);
        assert_eq!(sign_extend(0xF01F, 6), 0x001F);
    }

    #[test]
    fn decode_add_modes() {
        // ADD R1, R2, R3
        assert_eq!(
            Instr::from(0x1283),
            Instr::Add {
                dr: R1,
                sr1: R2,
                operand: Operand::Reg(R3)
            }
        );
        // ADD R1, R2, #-1
        assert_eq!(
            Instr::from(0x12BF),
            Instr::Add {
                dr: R1,
                sr1: R2,
                operand: Operand::Imm(0xFFFF)
            }
        );
        // AND R0, R0, #0
        assert_eq!(
            Instr::from(0x5020),
            Instr::And {
                dr: R0,
                sr1: R0,
                operand: Operand::Imm(0)
            }
        );
    }

    #[test]
    fn decode_control_flow() {
        // BRnzp #-1
        assert_eq!(
            Instr::from(0x0FFF),
            Instr::Br {
                nzp: 0b111,
                offset: 0xFFFF
            }
        );
        // RET
        assert_eq!(Instr::from(0xC1C0), Instr::Jmp { base: R7 });
        // JSR #2
        assert_eq!(
            Instr::from(0x4802),
            Instr::Jsr {
                target: JsrTarget::Offset(2)
            }
        );
        // JSRR R3
        assert_eq!(
            Instr::from(0x40C0),
            Instr::Jsr {
                target: JsrTarget::Base(R3)
            }
        );
        assert_eq!(Instr::from(0xF025), Instr::Trap { vector: 0x25 });
    }

    #[test]
    fn decode_memory_access() {
        // LDR R4, R5, #-2
        assert_eq!(
            Instr::from(0x697E),
            Instr::Ldr {
                dr: R4,
                base: R5,
                offset: 0xFFFE
            }
        );
        // STI R6, #4
        assert_eq!(Instr::from(0xBC04), Instr::Sti { sr: R6, offset: 4 });
        // LEA R0, #16
        assert_eq!(Instr::from(0xE010), Instr::Lea { dr: R0, offset: 16 });
    }

    #[test]
    fn decode_reserved() {
        for low in [0x000, 0x123, 0xFFF] {
            assert_eq!(Instr::from(0x8000 | low), Instr::Reserved(ReservedOp::Rti));
            assert_eq!(Instr::from(0xD000 | low), Instr::Reserved(ReservedOp::Res));
        }
    }

    #[test]
    fn trap_vectors() {
        assert_eq!(TrapVector::try_from(0x22), Ok(TrapVector::Puts));
        assert_eq!(TrapVector::try_from(0x25), Ok(TrapVector::Halt));
        assert!(TrapVector::try_from(0x26).is_err());
        assert!(TrapVector::try_from(0x00).is_err());
    }
}
