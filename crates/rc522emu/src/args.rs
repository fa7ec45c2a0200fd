use crate::EmulatorConfig;
use crate::core::{DEFAULT_FIFO_READ_CHUNK, DEFAULT_UID};
use crate::script::{ScriptSession, parse_script};
use clap::Parser;
use rc522_hw::specs::mifare_1k::UID_SIZE;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct Args {
    /// Path to a session script: one SPI session of hex MOSI bytes per line,
    /// optionally followed by `=> <expected MISO>`
    pub script: PathBuf,

    /// UID of the emulated card (4 hex bytes, e.g. 50929D39 or 50:92:9D:39)
    #[arg(long, value_parser = parse_uid)]
    pub uid: Option<[u8; UID_SIZE]>,

    /// Raw 1024 byte MIFARE Classic 1K dump to start from
    #[arg(long)]
    pub card_image: Option<PathBuf>,

    /// Largest FIFO read burst served per SPI exchange
    #[arg(long, default_value_t = DEFAULT_FIFO_READ_CHUNK)]
    pub read_chunk: usize,

    /// Seed for GenerateRandomID (hex: 0x1234 or decimal: 1234)
    #[arg(long, value_parser = parse_hex_or_dec)]
    pub rng_seed: Option<u64>,

    /// Log the card memory after the script has run
    #[arg(long)]
    pub dump_card: bool,
}

impl Args {
    /// Validate that the arguments are consistent
    pub fn validate(&self) -> Result<(), String> {
        if self.uid.is_some() && self.card_image.is_some() {
            return Err("--uid and --card-image are mutually exclusive".to_string());
        }
        if self.read_chunk == 0 {
            return Err("--read-chunk must be at least 1".to_string());
        }
        if let Some(seed) = self.rng_seed {
            if seed == 0 || seed > u32::MAX as u64 {
                return Err("--rng-seed must be a non-zero 32 bit value".to_string());
            }
        }
        Ok(())
    }

    /// Convert Args to EmulatorConfig
    pub fn to_emulator_config(&self) -> EmulatorConfig {
        EmulatorConfig {
            uid: self.uid.unwrap_or(DEFAULT_UID),
            card_image: self.card_image.clone(),
            fifo_read_chunk: self.read_chunk,
            rng_seed: self.rng_seed.map(|v| v as u32).unwrap_or(1),
        }
    }
}

pub fn parse_hex_or_dec(s: &str) -> Result<u64, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

/// Parse a 4 byte UID written as hex, with optional `:`, `-` or space separators
pub fn parse_uid(s: &str) -> Result<[u8; UID_SIZE], String> {
    let digits: String = s
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | ' '))
        .collect();
    if digits.len() != UID_SIZE * 2 || !digits.is_ascii() {
        return Err(format!("UID must be {} hex bytes, got {:?}", UID_SIZE, s));
    }

    let mut uid = [0u8; UID_SIZE];
    for (i, byte) in uid.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
            .map_err(|e| format!("Invalid UID {:?}: {}", s, e))?;
    }
    Ok(uid)
}

/// Load and parse the session script
pub fn load_script(args: &Args) -> Result<Vec<ScriptSession>, Box<dyn std::error::Error>> {
    use tracing::info;

    info!("Loading script: {:?}", args.script);
    let text = std::fs::read_to_string(&args.script)?;
    let sessions = parse_script(&text)?;
    info!("Loaded {} sessions", sessions.len());
    Ok(sessions)
}
