use crate::console::Console;
use crate::dprintln;
use crate::image::Image;

/// LC3 can address 128KB of memory: 65,536 words.
pub const MEMORY_MAX: usize = 0x10000;

/// Keyboard status register. Bit 15 is set when a key is available.
pub const KBSR: u16 = 0xFE00;
/// Keyboard data register. Holds the last polled character.
pub const KBDR: u16 = 0xFE02;

/// Complete address space, including the memory-mapped keyboard registers.
pub struct Memory {
    cells: Box<[u16]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_MAX].into_boxed_slice(),
        }
    }

    /// Read a word as the CPU does.
    ///
    /// Reading [`KBSR`] polls the console, and latches a pending key into [`KBDR`].
    /// Out of range addresses are reported and read as 0.
    pub fn read(&mut self, addr: usize, console: &mut impl Console) -> u16 {
        if addr >= MEMORY_MAX {
            dprintln!(Always, Error, "Memory read out of bounds: 0x{:04X}", addr);
            return 0;
        }
        if addr == KBSR as usize {
            self.poll_keyboard(console);
        }
        self.cells[addr]
    }

    /// Out of range addresses are reported and the write is dropped.
    pub fn write(&mut self, addr: usize, val: u16) {
        if addr >= MEMORY_MAX {
            dprintln!(Always, Error, "Memory write out of bounds: 0x{:04X}", addr);
            return;
        }
        self.cells[addr] = val;
    }

    /// Read a word without device side effects.
    pub fn peek(&self, addr: u16) -> u16 {
        self.cells[addr as usize]
    }

    fn poll_keyboard(&mut self, console: &mut impl Console) {
        let key = match console.poll_key() {
            Ok(true) => console.read_char(),
            Ok(false) => Ok(None),
            Err(e) => Err(e),
        };
        match key {
            Ok(Some(ch)) => {
                self.cells[KBSR as usize] = 1 << 15;
                self.cells[KBDR as usize] = ch as u16;
            }
            Ok(None) => self.cells[KBSR as usize] = 0,
            Err(e) => {
                dprintln!(Always, Warning, "Failed to poll keyboard: {}", e);
                self.cells[KBSR as usize] = 0;
            }
        }
    }

    /// Copy an image to its origin. Words which would not fit in the address space are
    /// discarded.
    ///
    /// Returns the amount of words written.
    pub fn load(&mut self, image: &Image) -> usize {
        let orig = image.origin() as usize;
        let len = image.words().len().min(MEMORY_MAX - orig);
        self.cells[orig..orig + len].copy_from_slice(&image.words()[..len]);
        len
    }

    /// Words of a zero-terminated string starting at `base`, not including the terminator.
    ///
    /// Scanning wraps around the address space and gives up after [`MEMORY_MAX`] words.
    pub fn string_at(&self, base: u16) -> impl Iterator<Item = u16> + '_ {
        (0..MEMORY_MAX)
            .map(move |i| self.peek(base.wrapping_add(i as u16)))
            .take_while(|&word| word != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::BufferConsole;

    #[test]
    fn read_write() {
        let mut console = BufferConsole::new();
        let mut mem = Memory::new();
        mem.write(0x3000, 0x1234);
        mem.write(0xFFFF, 0xBEEF);
        assert_eq!(mem.read(0x3000, &mut console), 0x1234);
        assert_eq!(mem.read(0xFFFF, &mut console), 0xBEEF);
        assert_eq!(mem.read(0x0000, &mut console), 0);
    }

    #[test]
    fn out_of_bounds_is_soft() {
        let mut console = BufferConsole::new();
        let mut mem = Memory::new();
        mem.write(0x10000, 0xAAAA);
        assert_eq!(mem.read(0x10000, &mut console), 0);
        assert_eq!(mem.read(usize::MAX, &mut console), 0);
        // Nothing wrapped into low memory
        assert_eq!(mem.peek(0x0000), 0);
    }

    #[test]
    fn keyboard_status_polls_console() {
        let mut console = BufferConsole::with_input("k");
        let mut mem = Memory::new();

        assert_eq!(mem.read(KBSR as usize, &mut console), 0x8000);
        assert_eq!(mem.read(KBDR as usize, &mut console), b'k' as u16);

        // No more input: status clears, data keeps last character
        assert_eq!(mem.read(KBSR as usize, &mut console), 0);
        assert_eq!(mem.read(KBDR as usize, &mut console), b'k' as u16);
    }

    #[test]
    fn keyboard_data_has_no_side_effect() {
        let mut console = BufferConsole::with_input("k");
        let mut mem = Memory::new();
        assert_eq!(mem.read(KBDR as usize, &mut console), 0);
        assert!(console.poll_key().unwrap());
    }

    #[test]
    fn load_truncates_at_end_of_memory() {
        let mut mem = Memory::new();
        let image = Image::new(0xFFFE, vec![1, 2, 3, 4]);
        assert_eq!(mem.load(&image), 2);
        assert_eq!(mem.peek(0xFFFE), 1);
        assert_eq!(mem.peek(0xFFFF), 2);
        assert_eq!(mem.peek(0x0000), 0);
    }

    #[test]
    fn string_scan() {
        let mut mem = Memory::new();
        mem.load(&Image::new(0x4000, vec![0x48, 0x49, 0x00, 0x50]));
        let words: Vec<u16> = mem.string_at(0x4000).collect();
        assert_eq!(words, [0x48, 0x49]);
        assert_eq!(mem.string_at(0x4002).count(), 0);
    }

    #[test]
    fn string_scan_is_bounded() {
        let mut mem = Memory::new();
        mem.load(&Image::new(0, vec![0x41; MEMORY_MAX]));
        assert_eq!(mem.string_at(0x1234).count(), MEMORY_MAX);
    }

    #[test]
    fn string_scan_wraps() {
        let mut mem = Memory::new();
        mem.write(0xFFFF, 0x41);
        mem.write(0x0000, 0x42);
        let words: Vec<u16> = mem.string_at(0xFFFF).collect();
        assert_eq!(words, [0x41, 0x42]);
    }
}
