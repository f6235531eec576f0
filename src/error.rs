use std::io;
use std::path::Path;

use miette::{miette, Report, Severity};

use crate::instr::ReservedOp;

// Image errors

pub fn image_open(path: &Path, e: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::open",
        help = "check that the path exists and is readable.",
        "Could not open image file {}: {e}",
        path.display(),
    )
}

pub fn image_no_origin() -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::no_origin",
        help = "an image starts with a big-endian origin word, eg. `30 00` for x3000.",
        "Could not read origin",
    )
}

pub fn image_empty(origin: u16) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::empty",
        help = "the image has an origin but no instructions to load.",
        "Image contains no program words after origin x{origin:04X}",
    )
}

pub fn image_failed(path: &Path, cause: Report) -> Report {
    cause.wrap_err(format!("Failed to load image: {}", path.display()))
}

// Runtime errors

pub fn run_reserved_opcode(op: ReservedOp, instr: u16, pc: u16) -> Report {
    miette!(
        severity = Severity::Error,
        code = "run::reserved_opcode",
        help = "this opcode is never produced by a well-formed program; check the image origin.",
        "Invalid opcode {op} (0x{instr:04X}) at PC: 0x{pc:04X}",
    )
}

pub fn run_console(e: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "run::console",
        help = "the program's input or output stream was closed.",
        "Console I/O failed: {e}",
    )
}
