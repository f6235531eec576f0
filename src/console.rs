use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// Character device seen by the running program.
///
/// The runtime only ever talks to the outside world through this trait: the keyboard status
/// register polls it, and the `TRAP` service routines read and write single bytes.
pub trait Console {
    /// Non-blocking. Whether a key can be read without waiting.
    fn poll_key(&mut self) -> io::Result<bool>;

    /// Blocking read of one byte. `None` means input is exhausted.
    fn read_char(&mut self) -> io::Result<Option<u8>>;

    fn write_char(&mut self, ch: u8) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Whether the user asked to stop the program.
    ///
    /// Checked once per instruction cycle.
    fn is_interrupted(&mut self) -> bool {
        false
    }

    fn write_str(&mut self, string: &str) -> io::Result<()> {
        for byte in string.bytes() {
            self.write_char(byte)?;
        }
        Ok(())
    }
}

/// Console over plain byte streams, used when stdin is not an interactive terminal.
///
/// A background thread reads `input` one byte at a time and hands the bytes over a channel, so
/// `poll_key` can drain it with `try_recv` and never waits on an idle pipe.
pub struct StreamConsole<W> {
    input: Receiver<u8>,
    pending: Option<u8>,
    output: W,
    at_eof: bool,
}

impl StreamConsole<io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin(), io::stdout())
    }
}

impl<W: Write> StreamConsole<W> {
    pub fn new<R>(input: R, output: W) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            input: spawn_reader(input),
            pending: None,
            output,
            at_eof: false,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

/// Forward bytes from `input` until it ends, fails or the console is dropped.
fn spawn_reader<R>(mut input: R) -> Receiver<u8>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = [0; 1];
        loop {
            match input.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(buf[0]).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });
    rx
}

impl<W: Write> Console for StreamConsole<W> {
    fn poll_key(&mut self) -> io::Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        if self.at_eof {
            return Ok(false);
        }
        match self.input.try_recv() {
            Ok(byte) => {
                self.pending = Some(byte);
                Ok(true)
            }
            Err(TryRecvError::Empty) => Ok(false),
            Err(TryRecvError::Disconnected) => {
                self.at_eof = true;
                Ok(false)
            }
        }
    }

    fn read_char(&mut self) -> io::Result<Option<u8>> {
        if let Some(byte) = self.pending.take() {
            return Ok(Some(byte));
        }
        if self.at_eof {
            return Ok(None);
        }
        match self.input.recv() {
            Ok(byte) => Ok(Some(byte)),
            Err(_) => {
                self.at_eof = true;
                Ok(None)
            }
        }
    }

    fn write_char(&mut self, ch: u8) -> io::Result<()> {
        self.output.write_all(&[ch])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}

/// In-memory console with scripted input and captured output.
#[derive(Debug, Default)]
pub struct BufferConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
    flushes: usize,
    interrupt_after: Option<usize>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: impl AsRef<[u8]>) -> Self {
        Self {
            input: input.as_ref().iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Report an interrupt once `checks` cycles have passed.
    pub fn interrupt_after(mut self, checks: usize) -> Self {
        self.interrupt_after = Some(checks);
        self
    }

    pub fn push_input(&mut self, input: impl AsRef<[u8]>) {
        self.input.extend(input.as_ref());
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl Console for BufferConsole {
    fn poll_key(&mut self) -> io::Result<bool> {
        Ok(!self.input.is_empty())
    }

    fn read_char(&mut self) -> io::Result<Option<u8>> {
        Ok(self.input.pop_front())
    }

    fn write_char(&mut self, ch: u8) -> io::Result<()> {
        self.output.push(ch);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn is_interrupted(&mut self) -> bool {
        match &mut self.interrupt_after {
            Some(0) => true,
            Some(count) => {
                *count -= 1;
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    /// Reader which blocks until bytes are sent, like a pipe whose writer stays open.
    struct HeldOpen(Receiver<u8>);

    impl Read for HeldOpen {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv() {
                Ok(byte) => {
                    buf[0] = byte;
                    Ok(1)
                }
                Err(_) => Ok(0),
            }
        }
    }

    fn wait_for_key(console: &mut impl Console) -> bool {
        for _ in 0..200 {
            if console.poll_key().unwrap() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn stream_console_reads_until_eof() {
        let mut console = StreamConsole::new(&b"ab"[..], Vec::new());
        assert_eq!(console.read_char().unwrap(), Some(b'a'));
        assert_eq!(console.read_char().unwrap(), Some(b'b'));
        assert_eq!(console.read_char().unwrap(), None);
        assert!(!console.poll_key().unwrap());
        assert_eq!(console.read_char().unwrap(), None);
    }

    #[test]
    fn idle_stream_has_no_key() {
        let (tx, rx) = mpsc::channel();
        let mut console = StreamConsole::new(HeldOpen(rx), Vec::new());
        assert!(!console.poll_key().unwrap());
        assert!(!console.poll_key().unwrap());

        tx.send(b'k').unwrap();
        assert!(wait_for_key(&mut console));
        // Polling again keeps the same key
        assert!(console.poll_key().unwrap());
        assert_eq!(console.read_char().unwrap(), Some(b'k'));
        assert!(!console.poll_key().unwrap());

        drop(tx);
        assert_eq!(console.read_char().unwrap(), None);
        assert!(!console.poll_key().unwrap());
    }

    #[test]
    fn stream_console_writes() {
        let mut console = StreamConsole::new(io::empty(), Vec::new());
        console.write_str("HI").unwrap();
        console.flush().unwrap();
        assert_eq!(console.into_output(), b"HI");
    }

    #[test]
    fn buffer_console_interrupt() {
        let mut console = BufferConsole::new().interrupt_after(2);
        assert!(!console.is_interrupted());
        assert!(!console.is_interrupted());
        assert!(console.is_interrupted());
        assert!(console.is_interrupted());
    }

    #[test]
    fn buffer_console_input() {
        let mut console = BufferConsole::with_input("x");
        assert!(console.poll_key().unwrap());
        assert_eq!(console.read_char().unwrap(), Some(b'x'));
        assert!(!console.poll_key().unwrap());
        console.push_input("y");
        assert_eq!(console.read_char().unwrap(), Some(b'y'));
    }
}
