//! Emulated MIFARE Classic 1K card memory.
//!
//! 16 sectors of 4 blocks of 16 bytes. Block 0 is the manufacturer block
//! holding the UID and its check byte, the last block of every sector is a
//! sector trailer holding the keys and access bits.
//!
//! # References
//! - NXP MF1S50YYX, section 8.6 "Memory organization"
//! - NXP MF1S50YYX, section 8.6.2.1 "Value blocks"

use rc522_hw::specs::mifare_1k::{
    BLOCK_SIZE, BLOCKS, BLOCKS_PER_SECTOR, DEFAULT_ACCESS_BITS, DEFAULT_GPB, DEFAULT_KEY, KEY_SIZE,
    SIZE, UID_SIZE,
};
use rc522_hw::specs::ultralight::PAGE_SIZE;
use rc522_hw::picc::response::{ATQA, SAK};
use tracing::{debug, warn};

/// One 16 byte memory block
pub type Block = [u8; BLOCK_SIZE];

/// Manufacturer data following UID, BCC, SAK and ATQA in block 0
const MANUFACTURER_DATA: [u8; 8] = [0x62, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69];

/// Errors that can occur while loading a card image
#[derive(Debug)]
pub enum CardImageError {
    /// Image is not exactly 1024 bytes long
    WrongSize { expected: usize, actual: usize },
}

impl std::fmt::Display for CardImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardImageError::WrongSize { expected, actual } => write!(
                f,
                "card image must be {} bytes, got {}",
                expected, actual
            ),
        }
    }
}

impl std::error::Error for CardImageError {}

/// UID check byte: XOR of the UID bytes
pub fn bcc(uid: &[u8]) -> u8 {
    uid.iter().fold(0, |acc, b| acc ^ b)
}

/// True if `block` is the trailer of its sector
pub fn is_sector_trailer(block: u8) -> bool {
    (block as usize) % BLOCKS_PER_SECTOR == BLOCKS_PER_SECTOR - 1
}

/// Card memory plus the UID reported during anticollision
#[derive(Debug, Clone)]
pub struct CardMemory {
    blocks: [Block; BLOCKS],
    uid: [u8; UID_SIZE],
    /// Internal transfer buffer of the value operations, zeroed at power-on
    scratch: Block,
}

impl CardMemory {
    /// Create a card in its factory state with the given UID
    pub fn new(uid: [u8; UID_SIZE]) -> Self {
        let mut blocks = [[0u8; BLOCK_SIZE]; BLOCKS];

        let block0 = &mut blocks[0];
        block0[..UID_SIZE].copy_from_slice(&uid);
        block0[4] = bcc(&uid);
        block0[5] = SAK;
        block0[6..8].copy_from_slice(&ATQA);
        block0[8..].copy_from_slice(&MANUFACTURER_DATA);

        for (index, block) in blocks.iter_mut().enumerate() {
            if is_sector_trailer(index as u8) {
                *block = default_trailer();
            }
        }

        Self {
            blocks,
            uid,
            scratch: [0; BLOCK_SIZE],
        }
    }

    /// Create a card from a raw 1024 byte dump. The UID is taken from block 0.
    pub fn from_image(image: &[u8]) -> Result<Self, CardImageError> {
        if image.len() != SIZE {
            return Err(CardImageError::WrongSize {
                expected: SIZE,
                actual: image.len(),
            });
        }

        let mut blocks = [[0u8; BLOCK_SIZE]; BLOCKS];
        for (block, chunk) in blocks.iter_mut().zip(image.chunks_exact(BLOCK_SIZE)) {
            block.copy_from_slice(chunk);
        }

        let mut card = Self {
            blocks,
            uid: [0; UID_SIZE],
            scratch: [0; BLOCK_SIZE],
        };
        card.refresh_uid();

        if bcc(&card.uid) != card.blocks[0][4] {
            warn!(
                "Card image BCC {:#04X} does not match UID {:02X?}",
                card.blocks[0][4], card.uid
            );
        }

        Ok(card)
    }

    /// The 4 byte UID
    pub fn uid(&self) -> [u8; UID_SIZE] {
        self.uid
    }

    /// Copy of a block, `None` if `block` is out of range
    pub fn block(&self, block: u8) -> Option<Block> {
        self.blocks.get(block as usize).copied()
    }

    /// Overwrite a block. Writing block 0 also updates the UID.
    ///
    /// Returns false if `block` is out of range.
    pub fn write_block(&mut self, block: u8, data: &Block) -> bool {
        let Some(target) = self.blocks.get_mut(block as usize) else {
            return false;
        };
        *target = *data;

        if block == 0 {
            self.refresh_uid();
            debug!("Block 0 rewritten, UID now {:02X?}", self.uid);
        }
        true
    }

    /// Overwrite a 4 byte Ultralight page. Page `n` maps onto bytes
    /// `4n..4n+4` of the memory.
    pub fn write_page(&mut self, page: u8, data: &[u8; PAGE_SIZE]) -> bool {
        let offset = page as usize * PAGE_SIZE;
        let block = offset / BLOCK_SIZE;
        let start = offset % BLOCK_SIZE;

        let Some(target) = self.blocks.get_mut(block) else {
            return false;
        };
        target[start..start + PAGE_SIZE].copy_from_slice(data);

        if block == 0 {
            self.refresh_uid();
        }
        true
    }

    pub fn scratch(&self) -> Block {
        self.scratch
    }

    pub fn set_scratch(&mut self, data: Block) {
        self.scratch = data;
    }

    /// Raw 1024 byte image of the whole memory
    pub fn image(&self) -> Vec<u8> {
        self.blocks.concat()
    }

    fn refresh_uid(&mut self) {
        self.uid.copy_from_slice(&self.blocks[0][..UID_SIZE]);
    }
}

fn default_trailer() -> Block {
    let mut trailer = [0u8; BLOCK_SIZE];
    trailer[..KEY_SIZE].copy_from_slice(&DEFAULT_KEY);
    trailer[6..9].copy_from_slice(&DEFAULT_ACCESS_BITS);
    trailer[9] = DEFAULT_GPB;
    trailer[10..].copy_from_slice(&DEFAULT_KEY);
    trailer
}

/// Decoded value block: a signed 32 bit value plus a one byte address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueBlock {
    pub value: i32,
    pub addr: u8,
}

impl ValueBlock {
    pub fn new(value: i32, addr: u8) -> Self {
        Self { value, addr }
    }

    /// Encode as value, ~value, value, addr, ~addr, addr, ~addr
    pub fn encode(&self) -> Block {
        let value = self.value.to_le_bytes();
        let inverted = (!self.value).to_le_bytes();

        let mut block = [0u8; BLOCK_SIZE];
        block[0..4].copy_from_slice(&value);
        block[4..8].copy_from_slice(&inverted);
        block[8..12].copy_from_slice(&value);
        block[12] = self.addr;
        block[13] = !self.addr;
        block[14] = self.addr;
        block[15] = !self.addr;
        block
    }

    /// Decode a block from its first value copy and first address byte.
    /// The redundant copies are not required to agree, see `is_consistent`.
    pub fn decode(block: &Block) -> Self {
        Self {
            value: i32::from_le_bytes([block[0], block[1], block[2], block[3]]),
            addr: block[12],
        }
    }

    /// True if every redundant copy in `block` agrees with the first one
    pub fn is_consistent(block: &Block) -> bool {
        let decoded = Self::decode(block);
        decoded.encode() == *block
    }
}
