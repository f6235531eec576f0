use std::io::{stdin, IsTerminal};
use std::path::{Path, PathBuf};

use clap::builder::BoolishValueParser;
use clap::Parser;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};

use lace_vm::dprintln;
use lace_vm::output::Output;
use lace_vm::{Console, Exit, Image, RunEnvironment, RunState, StreamConsole, TerminalConsole};

/// Lace VM runs binary LC3 images, such as those emitted by `lace compile`.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Binary `.lc3` or `.obj` images, loaded in order into a single address space
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// Produce minimal output, suited for blackbox tests
    #[arg(short, long, env = "LACE_VM_MINIMAL", value_parser = BoolishValueParser::new())]
    minimal: bool,
    /// Never put the terminal into raw mode; read stdin as a plain stream
    #[arg(long, env = "LACE_VM_NO_RAW", value_parser = BoolishValueParser::new())]
    no_raw: bool,
    /// Address of the first instruction to execute, eg. `0x3000`, `x3000` or `12288`
    #[arg(long, value_parser = parse_address, default_value = "0x3000")]
    start: u16,
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();

    miette::set_hook(Box::new(|_| {
        Box::new(miette::MietteHandlerOpts::new().build())
    }))?;

    Output::set_minimal(args.minimal);

    let mut state = RunState::new(args.start);
    for path in &args.images {
        file_message(Green, "Loading", path);
        let image = Image::open(path)?;
        let written = state.load_image(&image);
        if written < image.words().len() {
            dprintln!(
                Sometimes,
                Warning,
                "Image does not fit in memory, dropped {} words",
                image.words().len() - written
            );
        }
    }

    message(Green, "Running", &format!("from x{:04X}", args.start));
    let exit = if stdin().is_terminal() && !args.no_raw {
        run(state, TerminalConsole::new().into_diagnostic()?)?
    } else {
        run(state, StreamConsole::stdio())?
    };

    match exit {
        Exit::Halted => message(Cyan, "Halted", "program finished"),
        Exit::Interrupted => {
            println!();
            message(Red, "Stopped", "interrupted by user");
            std::process::exit(130);
        }
    }
    Ok(())
}

/// Terminal mode is restored when `console` is dropped, before any error is reported.
fn run(state: RunState, console: impl Console) -> Result<Exit> {
    let mut env = RunEnvironment::new(state, console);
    env.run()
}

fn parse_address(src: &str) -> Result<u16, String> {
    let hex = src
        .strip_prefix("0x")
        .or_else(|| src.strip_prefix('x'))
        .or_else(|| src.strip_prefix('X'));
    let parsed = match hex {
        Some(digits) => u16::from_str_radix(digits, 16),
        None => src.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid address '{src}': {e}"))
}

enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    Output::Status.print_status(left, right);
}
