/// MFRC522 controller specifications
pub mod pcd {
    /// FIFO buffer depth in bytes
    pub const FIFO_SIZE: usize = 64;

    /// Internal buffer size used by the Mem and GenerateRandomID commands
    pub const INTERNAL_BUFFER_SIZE: usize = 25;

    /// Number of bytes produced by GenerateRandomID
    pub const RANDOM_ID_SIZE: usize = 10;

    /// Preset value of the CRC coprocessor for ISO14443A (ModeReg CRCPreset = 01b)
    pub const CRC_A_PRESET: u16 = 0x6363;

    /// Number of bytes the digital self-test leaves in the FIFO
    pub const SELF_TEST_SIZE: usize = 64;
}

/// MIFARE Classic 1K memory geometry
///
/// Reference: NXP MF1S50YYX, section 8.6 "Memory organization"
pub mod mifare_1k {
    /// Number of sectors
    pub const SECTORS: usize = 16;

    /// Blocks per sector
    pub const BLOCKS_PER_SECTOR: usize = 4;

    /// Bytes per block
    pub const BLOCK_SIZE: usize = 16;

    /// Total number of blocks
    pub const BLOCKS: usize = SECTORS * BLOCKS_PER_SECTOR;

    /// Total memory size in bytes
    pub const SIZE: usize = BLOCKS * BLOCK_SIZE;

    /// Length of a single size UID
    pub const UID_SIZE: usize = 4;

    /// Key A and key B length
    pub const KEY_SIZE: usize = 6;

    /// Factory default key A / key B
    pub const DEFAULT_KEY: [u8; KEY_SIZE] = [0xFF; KEY_SIZE];

    /// Factory default access bits (transport configuration)
    pub const DEFAULT_ACCESS_BITS: [u8; 3] = [0xFF, 0x07, 0x80];

    /// Factory default general purpose byte
    pub const DEFAULT_GPB: u8 = 0x69;
}

/// MIFARE Ultralight page addressing, as emulated on top of the 1K memory
pub mod ultralight {
    /// Page size in bytes
    pub const PAGE_SIZE: usize = 4;

    /// First user-writable page (pages 0-1 hold the serial number)
    pub const FIRST_WRITABLE_PAGE: u8 = 2;

    /// One past the last page accepted by WRITE
    pub const PAGE_LIMIT: u8 = 16;
}
