use std::collections::VecDeque;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyEvent},
    terminal,
};

use crate::console::Console;
use crate::dprintln;
use crate::output::Output;

/// Instruction cycles between checks of the terminal event queue for `Ctrl+C`.
const INTERRUPT_CHECK_INTERVAL: u32 = 1024;

/// Similar to [`crossterm::event::KeyCode`] but only contains what a running program can see.
#[derive(Debug, PartialEq, Eq)]
enum Key {
    /// `Ctrl+C`: stop the program.
    Interrupt,
    Byte(u8),
    Char(char),
}

/// Terminal in raw mode for as long as this value is alive.
///
/// Dropping the guard restores the terminal, which also happens while unwinding from a panic.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    /// Must only be called if terminal is NOT in raw mode.
    pub fn enable() -> io::Result<Self> {
        debug_assert!(
            !terminal::is_raw_mode_enabled().is_ok_and(|is| is),
            "terminal should not be in raw mode to enable raw mode",
        );
        terminal::enable_raw_mode()?;
        // Diagnostics redirected to a file keep plain line feeds
        Output::set_raw(io::stderr().is_terminal());
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        Output::set_raw(false);
        if let Err(e) = terminal::disable_raw_mode() {
            dprintln!(Always, Error, "Failed to restore terminal: {}", e);
        }
    }
}

/// Console on an interactive terminal.
///
/// Keystrokes are delivered unbuffered and unechoed. Multi-byte characters are encoded as
/// UTF-8 and queued, one byte per read.
pub struct TerminalConsole {
    pending: VecDeque<u8>,
    interrupted: bool,
    checks: u32,
    /// Stdout is the raw terminal, rather than a redirected file.
    raw_output: bool,
    _raw: RawModeGuard,
}

impl TerminalConsole {
    /// Put the terminal into raw mode. It is restored when the console is dropped.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            pending: VecDeque::new(),
            interrupted: false,
            checks: 0,
            raw_output: io::stdout().is_terminal(),
            _raw: RawModeGuard::enable()?,
        })
    }

    /// Consume every event which is ready without blocking.
    fn pump(&mut self) -> io::Result<()> {
        while event::poll(Duration::ZERO)? {
            let event = event::read()?;
            self.accept(event);
        }
        Ok(())
    }

    fn accept(&mut self, event: Event) {
        let Ok(key) = Key::try_from(event) else {
            return;
        };
        match key {
            Key::Interrupt => self.interrupted = true,
            Key::Byte(byte) => self.pending.push_back(byte),
            Key::Char(ch) => {
                let mut bytes = [0; 4];
                self.pending.extend(ch.encode_utf8(&mut bytes).bytes());
            }
        }
    }
}

impl Console for TerminalConsole {
    fn poll_key(&mut self) -> io::Result<bool> {
        self.pump()?;
        Ok(!self.pending.is_empty())
    }

    fn read_char(&mut self) -> io::Result<Option<u8>> {
        loop {
            if let Some(byte) = self.pending.pop_front() {
                return Ok(Some(byte));
            }
            // Run loop notices the interrupt before the next instruction
            if self.interrupted {
                return Ok(None);
            }
            let event = event::read()?;
            self.accept(event);
        }
    }

    fn write_char(&mut self, ch: u8) -> io::Result<()> {
        io::stdout()
            .lock()
            .write_all(output_bytes(&ch, self.raw_output))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }

    fn is_interrupted(&mut self) -> bool {
        self.checks += 1;
        if self.checks >= INTERRUPT_CHECK_INTERVAL {
            self.checks = 0;
            if let Err(e) = self.pump() {
                dprintln!(Always, Warning, "Failed to read terminal events: {}", e);
            }
        }
        self.interrupted
    }
}

impl TryFrom<Event> for Key {
    type Error = ();
    fn try_from(event: Event) -> Result<Self, Self::Error> {
        if let Event::Key(event) = event {
            if let Ok(key) = event.try_into() {
                return Ok(key);
            }
        }
        Err(())
    }
}

impl TryFrom<KeyEvent> for Key {
    type Error = ();
    fn try_from(event: KeyEvent) -> Result<Self, Self::Error> {
        use event::{KeyCode, KeyEventKind, KeyModifiers as Mod};

        if matches!(event.kind, KeyEventKind::Release) {
            return Err(());
        }

        let key = match (event.modifiers, event.code) {
            (Mod::CONTROL, KeyCode::Char('c')) => Key::Interrupt,
            // Ctrl+A..Ctrl+Z as ASCII control codes
            (Mod::CONTROL, KeyCode::Char(ch)) if ch.is_ascii_alphabetic() => {
                Key::Byte(ch.to_ascii_lowercase() as u8 - b'a' + 1)
            }

            (_, KeyCode::Enter) => Key::Byte(b'\n'),
            (_, KeyCode::Tab) => Key::Byte(b'\t'),
            (_, KeyCode::Backspace) => Key::Byte(0x7F),
            (_, KeyCode::Esc) => Key::Byte(0x1B),

            (Mod::NONE | Mod::SHIFT, KeyCode::Char(ch)) => Key::Char(ch),

            _ => return Err(()),
        };

        Ok(key)
    }
}

/// Raw mode turns off output processing, so a line feed needs its carriage return.
fn output_bytes(ch: &u8, raw: bool) -> &[u8] {
    match *ch {
        b'\n' if raw => b"\r\n",
        _ => std::slice::from_ref(ch),
    }
}
