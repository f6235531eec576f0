use std::io;

use miette::Result;

use crate::console::Console;
use crate::error;
use crate::image::Image;
use crate::instr::{Instr, JsrTarget, Operand, TrapVector};
use crate::memory::Memory;
use crate::register::{Flag, Register, Registers};

/// Prompt printed by the `IN` service routine.
pub const IN_PROMPT: &str = "Enter a character: ";
/// Notice printed by the `HALT` service routine.
pub const HALT_NOTICE: &str = "HALT\n";
/// Value stored in R0 when `GETC`/`IN` hit the end of input.
pub const EOF_WORD: u16 = 0xFFFF;

/// Represents complete program state during runtime.
pub struct RunState {
    /// System memory - 128KB in size.
    mem: Memory,
    /// General purpose registers, program counter and condition code.
    reg: Registers,
}

/// Outcome of a single instruction cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Continue,
    Halt,
}

/// Why the run loop stopped without an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exit {
    Halted,
    Interrupted,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new(crate::register::PC_START)
    }
}

impl RunState {
    /// Empty memory, with execution starting at `pc`.
    pub fn new(pc: u16) -> Self {
        Self {
            mem: Memory::new(),
            reg: Registers::new(pc),
        }
    }

    /// Place an image in memory. Later images overwrite earlier ones where they overlap.
    pub fn load_image(&mut self, image: &Image) -> usize {
        self.mem.load(image)
    }

    pub fn pc(&self) -> u16 {
        self.reg.pc()
    }

    pub fn reg(&self, reg: Register) -> u16 {
        self.reg.read(reg)
    }

    pub fn set_reg(&mut self, reg: Register, val: u16) {
        self.reg.write(reg, val);
    }

    pub fn flag(&self) -> Flag {
        self.reg.flag()
    }

    pub fn mem(&self) -> &Memory {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    /// Fetch, decode and execute one instruction.
    ///
    /// PC is incremented before the instruction is performed, so all PC-relative offsets are
    /// taken from the address after the instruction.
    pub fn step(&mut self, console: &mut impl Console) -> Result<Step> {
        let addr = self.reg.fetch_incr();
        let word = self.mem_read(addr, console);

        match Instr::from(word) {
            Instr::Add { dr, sr1, operand } => {
                let val = self.reg.read(sr1).wrapping_add(self.operand(operand));
                self.reg.write_flagged(dr, val);
            }
            Instr::And { dr, sr1, operand } => {
                let val = self.reg.read(sr1) & self.operand(operand);
                self.reg.write_flagged(dr, val);
            }
            Instr::Not { dr, sr } => {
                let val = !self.reg.read(sr);
                self.reg.write_flagged(dr, val);
            }
            Instr::Br { nzp, offset } => {
                if self.reg.flag().matches(nzp) {
                    self.reg.write(Register::PC, self.pc_relative(offset));
                }
            }
            Instr::Jmp { base } => {
                self.reg.write(Register::PC, self.reg.read(base));
            }
            Instr::Jsr { target } => {
                // Resolve first: `JSRR R7` jumps to the old link value
                let dest = match target {
                    JsrTarget::Offset(offset) => self.pc_relative(offset),
                    JsrTarget::Base(base) => self.reg.read(base),
                };
                self.reg.write(Register::R7, self.reg.pc());
                self.reg.write(Register::PC, dest);
            }
            Instr::Ld { dr, offset } => {
                let val = self.mem_read(self.pc_relative(offset), console);
                self.reg.write_flagged(dr, val);
            }
            Instr::Ldi { dr, offset } => {
                let ptr = self.mem_read(self.pc_relative(offset), console);
                let val = self.mem_read(ptr, console);
                self.reg.write_flagged(dr, val);
            }
            Instr::Ldr { dr, base, offset } => {
                let addr = self.reg.read(base).wrapping_add(offset);
                let val = self.mem_read(addr, console);
                self.reg.write_flagged(dr, val);
            }
            Instr::Lea { dr, offset } => {
                let val = self.pc_relative(offset);
                self.reg.write_flagged(dr, val);
            }
            Instr::St { sr, offset } => {
                self.mem_write(self.pc_relative(offset), self.reg.read(sr));
            }
            Instr::Sti { sr, offset } => {
                let ptr = self.mem_read(self.pc_relative(offset), console);
                self.mem_write(ptr, self.reg.read(sr));
            }
            Instr::Str { sr, base, offset } => {
                let addr = self.reg.read(base).wrapping_add(offset);
                self.mem_write(addr, self.reg.read(sr));
            }
            Instr::Trap { vector } => {
                self.reg.write(Register::R7, self.reg.pc());
                return self.trap(vector, console);
            }
            Instr::Reserved(op) => {
                return Err(error::run_reserved_opcode(op, word, addr));
            }
        }
        Ok(Step::Continue)
    }

    #[inline]
    fn operand(&self, operand: Operand) -> u16 {
        match operand {
            Operand::Reg(reg) => self.reg.read(reg),
            Operand::Imm(imm) => imm,
        }
    }

    #[inline]
    fn pc_relative(&self, offset: u16) -> u16 {
        self.reg.pc().wrapping_add(offset)
    }

    #[inline]
    fn mem_read(&mut self, addr: u16, console: &mut impl Console) -> u16 {
        self.mem.read(addr as usize, console)
    }

    #[inline]
    fn mem_write(&mut self, addr: u16, val: u16) {
        self.mem.write(addr as usize, val);
    }

    /// Unknown vectors are ignored.
    fn trap(&mut self, vector: u8, console: &mut impl Console) -> Result<Step> {
        let Ok(vector) = TrapVector::try_from(vector) else {
            return Ok(Step::Continue);
        };
        self.service(vector, console).map_err(error::run_console)
    }

    fn service(&mut self, vector: TrapVector, console: &mut impl Console) -> io::Result<Step> {
        let r0 = self.reg.read(Register::R0);
        match vector {
            TrapVector::Getc => {
                let ch = read_input(console)?;
                self.reg.write_flagged(Register::R0, ch);
            }
            TrapVector::Out => {
                console.write_char(r0 as u8)?;
            }
            TrapVector::Puts => {
                for word in self.mem.string_at(r0) {
                    console.write_char(word as u8)?;
                }
            }
            TrapVector::In => {
                console.write_str(IN_PROMPT)?;
                console.flush()?;
                let ch = read_input(console)?;
                if ch != EOF_WORD {
                    console.write_char(ch as u8)?;
                }
                self.reg.write_flagged(Register::R0, ch);
            }
            TrapVector::Putsp => {
                for word in self.mem.string_at(r0) {
                    let [high, low] = word.to_be_bytes();
                    console.write_char(low)?;
                    if high != 0 {
                        console.write_char(high)?;
                    }
                }
            }
            TrapVector::Halt => {
                console.write_str(HALT_NOTICE)?;
                console.flush()?;
                return Ok(Step::Halt);
            }
        }
        console.flush()?;
        Ok(Step::Continue)
    }
}

fn read_input(console: &mut impl Console) -> io::Result<u16> {
    Ok(console.read_char()?.map_or(EOF_WORD, u16::from))
}

/// A loaded program together with the console it talks to.
pub struct RunEnvironment<C> {
    state: RunState,
    console: C,
}

impl<C: Console> RunEnvironment<C> {
    pub fn new(state: RunState, console: C) -> Self {
        Self { state, console }
    }

    /// Run until `HALT`, an interrupt from the console, or a fatal error.
    pub fn run(&mut self) -> Result<Exit> {
        loop {
            if self.console.is_interrupted() {
                return Ok(Exit::Interrupted);
            }
            if self.state.step(&mut self.console)? == Step::Halt {
                return Ok(Exit::Halted);
            }
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn into_parts(self) -> (RunState, C) {
        (self.state, self.console)
    }
}
