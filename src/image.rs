use std::fs;
use std::path::Path;

use miette::Result;

use crate::dprintln;
use crate::error;

/// Flat program image: a load origin and the words placed contiguously from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    origin: u16,
    words: Vec<u16>,
}

impl Image {
    pub fn new(origin: u16, words: Vec<u16>) -> Self {
        Self { origin, words }
    }

    /// Read an image file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| error::image_open(path, e))?;
        Self::from_bytes(&bytes).map_err(|e| error::image_failed(path, e))
    }

    /// Parse big-endian words: first the origin, then the program.
    ///
    /// A trailing odd byte is ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut words = bytes
            .chunks_exact(2)
            .map(|word| u16::from_be_bytes([word[0], word[1]]));

        let Some(origin) = words.next() else {
            return Err(error::image_no_origin());
        };
        let words: Vec<u16> = words.collect();
        if words.is_empty() {
            return Err(error::image_empty(origin));
        }
        if bytes.len() % 2 != 0 {
            dprintln!(Sometimes, Warning, "Image is not aligned to 16 bits, ignoring last byte");
        }

        Ok(Self { origin, words })
    }

    /// Serialize back to the on-disk format.
    pub fn to_bytes(&self) -> Vec<u8> {
        std::iter::once(self.origin)
            .chain(self.words.iter().copied())
            .flat_map(u16::to_be_bytes)
            .collect()
    }

    pub fn origin(&self) -> u16 {
        self.origin
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_big_endian() {
        let image = Image::from_bytes(&[0x30, 0x00, 0xF0, 0x25, 0x12, 0x34]).unwrap();
        assert_eq!(image.origin(), 0x3000);
        assert_eq!(image.words(), &[0xF025, 0x1234]);
    }

    #[test]
    fn ignores_trailing_byte() {
        let image = Image::from_bytes(&[0x30, 0x00, 0xF0, 0x25, 0xAA]).unwrap();
        assert_eq!(image.words(), &[0xF025]);
    }

    #[test]
    fn missing_origin() {
        for bytes in [&[][..], &[0x30][..]] {
            let err = Image::from_bytes(bytes).unwrap_err();
            assert_eq!(err.code().unwrap().to_string(), "image::no_origin");
        }
    }

    #[test]
    fn no_program_words() {
        let err = Image::from_bytes(&[0x30, 0x00, 0x01]).unwrap_err();
        assert_eq!(err.code().unwrap().to_string(), "image::empty");
    }

    #[test]
    fn missing_file() {
        let err = Image::open(Path::new("this/does/not/exist.obj")).unwrap_err();
        assert_eq!(err.code().unwrap().to_string(), "image::open");
    }

    #[test]
    fn serializes() {
        let image = Image::new(0x3000, vec![0xF025]);
        assert_eq!(image.to_bytes(), [0x30, 0x00, 0xF0, 0x25]);
        assert_eq!(Image::from_bytes(&image.to_bytes()).unwrap(), image);
    }
}
