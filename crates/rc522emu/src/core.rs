//! Core emulator API for the MFRC522 reader.
//!
//! This module provides the transport boundary a host SPI bus talks to,
//! usable both from tests and from the replay CLI.

use crate::card::CardMemory;
use crate::pcd::Mfrc522;
use crate::script::ScriptSession;
use crate::spi::{Exchange, Level, SpiFramer};
use rc522_hw::specs::mifare_1k::UID_SIZE;
use std::path::PathBuf;
use tracing::{info, instrument, trace, warn};

/// UID of the emulated card when no image is loaded
pub const DEFAULT_UID: [u8; UID_SIZE] = [0x50, 0x92, 0x9D, 0x39];

/// Default number of bytes handed out per FIFODataReg read burst
pub const DEFAULT_FIFO_READ_CHUNK: usize = 18;

/// Configuration for the emulator
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// UID of a factory fresh card. Ignored when `card_image` is set.
    pub uid: [u8; UID_SIZE],
    /// Optional raw 1024 byte card dump loaded at start-up
    pub card_image: Option<PathBuf>,
    /// Largest FIFO read burst served in one exchange
    pub fifo_read_chunk: usize,
    /// Seed of the GenerateRandomID generator, must be non-zero
    pub rng_seed: u32,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            uid: DEFAULT_UID,
            card_image: None,
            fifo_read_chunk: DEFAULT_FIFO_READ_CHUNK,
            rng_seed: 1,
        }
    }
}

/// Result of replaying a script
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// Every session ran and matched its expectation
    Completed,
    /// Number of sessions whose MISO differed from the expected bytes
    Mismatch(usize),
}

/// Core emulator: one SPI framer in front of one reader with one card
#[derive(Debug)]
pub struct EmulatorCore {
    framer: SpiFramer,
    chip: Mfrc522,

    // Byte-level transport bookkeeping
    exchange: Option<Exchange>,
    clocked: Vec<u8>,

    sessions: usize,
}

impl EmulatorCore {
    /// Create a new emulator
    pub fn new(config: EmulatorConfig) -> Result<Self, String> {
        if config.fifo_read_chunk == 0 {
            return Err("FIFO read chunk must be at least 1 byte".to_string());
        }
        if config.rng_seed == 0 {
            return Err("RNG seed must be non-zero".to_string());
        }

        let card = match &config.card_image {
            Some(path) => {
                let image = std::fs::read(path)
                    .map_err(|e| format!("Failed to read card image {:?}: {}", path, e))?;
                let card = CardMemory::from_image(&image)
                    .map_err(|e| format!("Failed to load card image {:?}: {}", path, e))?;
                info!("Loaded card image {:?}", path);
                card
            }
            None => CardMemory::new(config.uid),
        };
        info!("Card UID: {:02X?}", card.uid());

        Ok(Self::with_card(card, &config))
    }

    /// Create an emulator around an already built card
    pub fn with_card(card: CardMemory, config: &EmulatorConfig) -> Self {
        Self {
            framer: SpiFramer::new(config.fifo_read_chunk),
            chip: Mfrc522::new(card, config.rng_seed),
            exchange: None,
            clocked: Vec::new(),
            sessions: 0,
        }
    }

    pub fn chip(&self) -> &Mfrc522 {
        &self.chip
    }

    pub fn card(&self) -> &CardMemory {
        self.chip.card()
    }

    /// Number of chip-select sessions started so far
    pub fn sessions(&self) -> usize {
        self.sessions
    }

    // ========================================================================
    // Transport boundary
    // ========================================================================

    /// Chip-select edge. Asserting (low) starts a session and returns the
    /// first exchange; releasing (high) ends it.
    #[instrument(level = "trace", skip(self))]
    pub fn chip_select(&mut self, level: Level) -> Option<Exchange> {
        match level {
            Level::Low => {
                self.clocked.clear();
                self.sessions += 1;
                let exchange = self.framer.begin();
                self.exchange = Some(exchange.clone());
                Some(exchange)
            }
            Level::High => {
                if !self.clocked.is_empty() {
                    trace!("Dropping partially clocked exchange");
                    self.clocked.clear();
                }
                self.framer.end();
                self.exchange = None;
                None
            }
        }
    }

    /// The transport finished clocking an exchange. Returns the next one
    /// while chip-select stays asserted.
    #[instrument(level = "trace", skip(self))]
    pub fn exchange_done(&mut self, mosi: &[u8]) -> Option<Exchange> {
        self.clocked.clear();
        self.exchange = self.framer.exchange_done(mosi, &mut self.chip);
        self.exchange.clone()
    }

    /// Clock a single byte: returns the MISO byte for this slot. Must be
    /// called inside a chip-select session.
    pub fn transfer(&mut self, mosi: u8) -> u8 {
        let Some(exchange) = &self.exchange else {
            warn!("SPI transfer {:#04X} without chip-select", mosi);
            return 0;
        };

        let miso = exchange.miso.get(self.clocked.len()).copied().unwrap_or(0);
        let len = exchange.len();
        self.clocked.push(mosi);
        trace!("SPI byte: mosi={:#04X}, miso={:#04X}", mosi, miso);

        if self.clocked.len() >= len {
            let clocked = std::mem::take(&mut self.clocked);
            self.exchange = self.framer.exchange_done(&clocked, &mut self.chip);
        }
        miso
    }

    /// Run one complete chip-select session and return the MISO bytes
    pub fn run_session(&mut self, mosi: &[u8]) -> Vec<u8> {
        self.chip_select(Level::Low);
        let miso = mosi.iter().map(|&byte| self.transfer(byte)).collect();
        self.chip_select(Level::High);
        miso
    }

    /// Replay scripted sessions, comparing against the expected MISO where given
    pub fn run_script(&mut self, script: &[ScriptSession]) -> StopReason {
        let mut mismatches = 0;

        for session in script {
            let miso = self.run_session(&session.mosi);
            info!(
                "line {}: MOSI {:02X?} MISO {:02X?}",
                session.line, session.mosi, miso
            );

            if !session.matches(&miso) {
                warn!(
                    "line {}: MISO mismatch, expected {}",
                    session.line,
                    session.expected_display()
                );
                mismatches += 1;
            }
        }

        if mismatches == 0 {
            StopReason::Completed
        } else {
            StopReason::Mismatch(mismatches)
        }
    }
}
