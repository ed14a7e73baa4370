//! Persistent store backends: a RAM image shaped like an AVR EEPROM and a
//! file-backed image that commits atomically.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use stewart_traits::{HwResult, PersistentStore};

use crate::error::HwError;

/// Size of the ATmega2560 EEPROM.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Value of an erased EEPROM cell.
pub const ERASED: u8 = 0xFF;

fn check_range(offset: usize, width: usize, capacity: usize) -> Result<(), HwError> {
    match offset.checked_add(width) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(HwError::OutOfRange { offset, capacity }),
    }
}

fn read_word_le(image: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&image[offset..offset + 4]);
    u32::from_le_bytes(word)
}

/// Volatile store; starts fully erased.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    image: Vec<u8>,
    writes: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            image: vec![ERASED; capacity],
            writes: 0,
        }
    }

    /// Raw view of the whole image.
    pub fn bytes(&self) -> &[u8] {
        &self.image
    }

    /// Number of byte cells written so far (a word write counts four).
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// Invert every bit of one cell, bypassing the write counter.
    pub fn flip_byte(&mut self, offset: usize) {
        if let Some(b) = self.image.get_mut(offset) {
            *b = !*b;
        }
    }
}

impl PersistentStore for MemoryStore {
    fn capacity(&self) -> usize {
        self.image.len()
    }

    fn read_byte(&mut self, offset: usize) -> HwResult<u8> {
        check_range(offset, 1, self.image.len())?;
        Ok(self.image[offset])
    }

    fn write_byte(&mut self, offset: usize, value: u8) -> HwResult<()> {
        check_range(offset, 1, self.image.len())?;
        self.image[offset] = value;
        self.writes += 1;
        Ok(())
    }

    fn read_word(&mut self, offset: usize) -> HwResult<u32> {
        check_range(offset, 4, self.image.len())?;
        Ok(read_word_le(&self.image, offset))
    }

    fn write_word(&mut self, offset: usize, value: u32) -> HwResult<()> {
        check_range(offset, 4, self.image.len())?;
        self.image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        self.writes += 4;
        Ok(())
    }
}

/// Store backed by a file holding the raw image. Writes stay in memory until
/// `commit`, which replaces the file atomically.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    image: Vec<u8>,
    dirty: bool,
}

impl FileStore {
    /// Open `path`, or start from an erased image when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, HwError> {
        let path = path.into();
        let mut image = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(HwError::Io(e)),
        };
        image.resize(capacity, ERASED);
        tracing::debug!(path = %path.display(), capacity, "store opened");
        Ok(Self {
            path,
            image,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Erase the image in memory; takes effect on the next commit.
    pub fn erase(&mut self) {
        self.image.fill(ERASED);
        self.dirty = true;
    }
}

impl PersistentStore for FileStore {
    fn capacity(&self) -> usize {
        self.image.len()
    }

    fn read_byte(&mut self, offset: usize) -> HwResult<u8> {
        check_range(offset, 1, self.image.len())?;
        Ok(self.image[offset])
    }

    fn write_byte(&mut self, offset: usize, value: u8) -> HwResult<()> {
        check_range(offset, 1, self.image.len())?;
        self.image[offset] = value;
        self.dirty = true;
        Ok(())
    }

    fn read_word(&mut self, offset: usize) -> HwResult<u32> {
        check_range(offset, 4, self.image.len())?;
        Ok(read_word_le(&self.image, offset))
    }

    fn write_word(&mut self, offset: usize, value: u32) -> HwResult<()> {
        check_range(offset, 4, self.image.len())?;
        self.image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        self.dirty = true;
        Ok(())
    }

    fn commit(&mut self) -> HwResult<()> {
        if !self.dirty {
            return Ok(());
        }
        write_atomic(&self.path, &self.image).map_err(HwError::Io)?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), "store committed");
        Ok(())
    }
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}
