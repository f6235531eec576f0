// Machine
mod instr;
pub use instr::{sign_extend, Instr, JsrTarget, Operand, ReservedOp, TrapVector};
mod register;
pub use register::{Flag, Register, Registers, PC_START};
pub mod memory;
pub use memory::Memory;
mod image;
pub use image::Image;

// Running
mod runtime;
pub use runtime::{Exit, RunEnvironment, RunState, Step};
pub mod console;
pub use console::{BufferConsole, Console, StreamConsole};
mod term;
pub use term::{RawModeGuard, TerminalConsole};

pub mod output;
mod error;
