//! SPI slave framing for the MFRC522 host interface.
//!
//! Within one chip-select session the first byte is an address byte:
//! bit 7 selects read (1) or write (0), bits 1-6 hold the register
//! address, bit 0 is reserved. Reads answer in the byte slot that follows
//! the address. A write consumes exactly one data byte, except for
//! FIFODataReg where every remaining byte of the session is FIFO data.
//!
//! The framer works in exchanges: it hands the transport a buffer to clock
//! out on MISO and gets back what arrived on MOSI in the same slots.
//!
//! # References
//! - NXP MFRC522 datasheet, section 8.1.2 "SPI bus interface"

use crate::pcd::Mfrc522;
use rc522_hw::registers::addr;
use tracing::{trace, warn};

/// Address byte: read flag
const READ_FLAG: u8 = 0x80;
/// Address byte: register address field
const ADDRESS_MASK: u8 = 0x7E;

/// Chip-select line level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// One transport exchange: the bytes to clock out on MISO. Its length is
/// the number of bytes the transport should clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub miso: Vec<u8>,
}

impl Exchange {
    /// Single byte slot with a dummy output
    fn dummy() -> Self {
        Self { miso: vec![0] }
    }

    pub fn len(&self) -> usize {
        self.miso.len()
    }

    pub fn is_empty(&self) -> bool {
        self.miso.is_empty()
    }
}

/// Decode an address byte into (register, is_read)
pub fn decode_address(byte: u8) -> (u8, bool) {
    ((byte & ADDRESS_MASK) >> 1, byte & READ_FLAG != 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    /// Chip-select inactive
    Idle,
    /// Next byte is an address byte
    AwaitAddress,
    /// Next byte is the data byte of a register write
    AwaitWriteData { reg: u8 },
    /// Every byte is appended to the FIFO until chip-select goes high
    StreamFifo,
}

#[derive(Debug)]
pub struct SpiFramer {
    state: FramerState,
    /// Largest FIFO burst handed out in a single exchange
    fifo_read_chunk: usize,
}

impl SpiFramer {
    pub fn new(fifo_read_chunk: usize) -> Self {
        Self {
            state: FramerState::Idle,
            fifo_read_chunk: fifo_read_chunk.max(1),
        }
    }

    pub fn is_selected(&self) -> bool {
        self.state != FramerState::Idle
    }

    /// Chip-select asserted: a new session starts with an address byte
    pub fn begin(&mut self) -> Exchange {
        if self.is_selected() {
            trace!("Chip-select asserted mid-session, restarting");
        }
        self.state = FramerState::AwaitAddress;
        Exchange::dummy()
    }

    /// Chip-select released. A write still waiting for its data byte is dropped.
    pub fn end(&mut self) {
        if let FramerState::AwaitWriteData { reg } = self.state {
            trace!("Session ended before data byte for reg {:#04X}", reg);
        }
        self.state = FramerState::Idle;
    }

    /// The transport clocked the last exchange; `mosi` is what the host sent.
    /// Returns the next exchange, or `None` outside a session.
    pub fn exchange_done(&mut self, mosi: &[u8], chip: &mut Mfrc522) -> Option<Exchange> {
        trace!("SPI exchange done: state={:?}, mosi={:02X?}", self.state, mosi);

        match self.state {
            FramerState::Idle => {
                warn!("SPI bytes with chip-select inactive: {:02X?}", mosi);
                None
            }
            FramerState::AwaitAddress => {
                // Earlier bytes of a read burst are filler; the last one
                // addresses the next access
                let Some(&byte) = mosi.last() else {
                    return Some(Exchange::dummy());
                };
                Some(self.address_byte(byte, chip))
            }
            FramerState::AwaitWriteData { reg } => {
                let Some((&data, rest)) = mosi.split_first() else {
                    return Some(Exchange::dummy());
                };
                chip.write(reg, data);

                if reg == addr::FIFO_DATA {
                    self.state = FramerState::StreamFifo;
                    for &byte in rest {
                        chip.write(addr::FIFO_DATA, byte);
                    }
                    return Some(Exchange::dummy());
                }

                self.state = FramerState::AwaitAddress;
                match rest.last() {
                    Some(&byte) => Some(self.address_byte(byte, chip)),
                    None => Some(Exchange::dummy()),
                }
            }
            FramerState::StreamFifo => {
                for &byte in mosi {
                    chip.write(addr::FIFO_DATA, byte);
                }
                Some(Exchange::dummy())
            }
        }
    }

    fn address_byte(&mut self, byte: u8, chip: &mut Mfrc522) -> Exchange {
        let (reg, is_read) = decode_address(byte);

        if !is_read {
            self.state = FramerState::AwaitWriteData { reg };
            return Exchange::dummy();
        }

        // Chained reads: stay in AwaitAddress
        self.state = FramerState::AwaitAddress;
        if reg == addr::FIFO_DATA {
            let mut miso = chip.read_fifo(self.fifo_read_chunk);
            if miso.is_empty() {
                miso.push(0);
            }
            Exchange { miso }
        } else {
            Exchange {
                miso: vec![chip.read(reg)],
            }
        }
    }
}
