pub mod args;
pub mod card;
pub mod core;
pub mod crc;
pub mod fifo;
pub mod pcd;
pub mod picc;
pub mod script;
pub mod spi;

// Re-export commonly used types
pub use args::{Args, load_script};
pub use card::{CardImageError, CardMemory, ValueBlock};
pub use core::{EmulatorConfig, EmulatorCore, StopReason};
pub use pcd::{Mfrc522, PcdCommand};
pub use picc::{Picc, PiccCommand, Response};
pub use script::{ScriptError, ScriptSession, parse_script};
pub use spi::{Exchange, Level, SpiFramer};
