use std::fmt;

/// Program counter value before any image overrides it.
pub const PC_START: u16 = 0x3000;

/// Addressable registers. R7 doubles as the link register for `JSR`, `JSRR` and `TRAP`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    PC,
}

impl Register {
    /// General purpose register named by the lowest 3 bits of `field`.
    pub fn from_field(field: u16) -> Self {
        match field & 0b111 {
            0 => Register::R0,
            1 => Register::R1,
            2 => Register::R2,
            3 => Register::R3,
            4 => Register::R4,
            5 => Register::R5,
            6 => Register::R6,
            _ => Register::R7,
        }
    }

    pub fn is_general(self) -> bool {
        self != Register::PC
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::PC => write!(f, "PC"),
            reg => write!(f, "R{}", *reg as u8),
        }
    }
}

/// Condition code. Exactly one is set at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    N = 0b100,
    Z = 0b010,
    P = 0b001,
}

impl Flag {
    pub fn of(val: u16) -> Self {
        match val as i16 {
            0 => Flag::Z,
            v if v < 0 => Flag::N,
            _ => Flag::P,
        }
    }

    /// Whether a `BR` condition mask selects this flag.
    pub fn matches(self, nzp: u16) -> bool {
        self as u16 & nzp != 0
    }
}

/// 8 general purpose registers, program counter and condition code.
#[derive(Clone, Debug)]
pub struct Registers {
    gp: [u16; 8],
    pc: u16,
    flag: Flag,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new(PC_START)
    }
}

impl Registers {
    pub fn new(pc: u16) -> Self {
        Self {
            gp: [0; 8],
            pc,
            flag: Flag::Z,
        }
    }

    pub fn read(&self, reg: Register) -> u16 {
        match reg {
            Register::PC => self.pc,
            gp => self.gp[gp as usize],
        }
    }

    /// Store without touching the condition code.
    pub fn write(&mut self, reg: Register, val: u16) {
        match reg {
            Register::PC => self.pc = val,
            gp => self.gp[gp as usize] = val,
        }
    }

    /// Store and recompute the condition code from the stored value.
    ///
    /// Writes to `PC` never affect the condition code.
    pub fn write_flagged(&mut self, reg: Register, val: u16) {
        self.write(reg, val);
        if reg.is_general() {
            self.flag = Flag::of(val);
        }
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Return the current PC and advance it by one word.
    pub fn fetch_incr(&mut self) -> u16 {
        let pc = self.pc;
        self.pc = pc.wrapping_add(1);
        pc
    }

    pub fn flag(&self) -> Flag {
        self.flag
    }
}
