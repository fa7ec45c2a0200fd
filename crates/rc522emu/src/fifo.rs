//! 64 byte FIFO buffer shared by the host interface and the card side.
//!
//! # References
//! - NXP MFRC522 datasheet, section 8.3 "FIFO buffer"

use rc522_hw::specs::pcd::FIFO_SIZE;
use std::collections::VecDeque;
use tracing::trace;

#[derive(Debug, Default)]
pub struct Fifo {
    data: VecDeque<u8>,
}

impl Fifo {
    pub fn new() -> Self {
        Self {
            data: VecDeque::with_capacity(FIFO_SIZE),
        }
    }

    /// Append a byte. Returns false if the FIFO is full and the byte was dropped.
    pub fn push(&mut self, value: u8) -> bool {
        if self.data.len() >= FIFO_SIZE {
            trace!("FIFO overflow, dropping {:#04X}", value);
            return false;
        }
        self.data.push_back(value);
        true
    }

    /// Append as many bytes of `values` as fit. Returns the number of bytes dropped.
    pub fn extend(&mut self, values: &[u8]) -> usize {
        values.iter().filter(|&&value| !self.push(value)).count()
    }

    pub fn pop(&mut self) -> Option<u8> {
        self.data.pop_front()
    }

    /// Remove up to `max` bytes from the front
    pub fn drain(&mut self, max: usize) -> Vec<u8> {
        let count = max.min(self.data.len());
        self.data.drain(..count).collect()
    }

    /// Remove and return everything
    pub fn take(&mut self) -> Vec<u8> {
        self.data.drain(..).collect()
    }

    /// Copy of the contents, leaving the FIFO untouched
    pub fn contents(&self) -> Vec<u8> {
        self.data.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
