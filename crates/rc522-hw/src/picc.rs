//! # References
//! - ISO/IEC 14443-3 Type A initialization and anticollision
//! - NXP MF1S50YYX "MIFARE Classic EV1 1K", section 9 "Command overview"
//! - NXP MF0ICU1 "MIFARE Ultralight", WRITE command

/// Card-protocol opcodes (first byte of a transceived frame)
pub mod opcode {
    /// REQuest command, Type A (sent as a 7 bit short frame)
    pub const REQA: u8 = 0x26;
    /// Wake-UP command, Type A (sent as a 7 bit short frame)
    pub const WUPA: u8 = 0x52;
    /// Anticollision / select, cascade level 1
    pub const SEL_CL1: u8 = 0x93;
    /// Anticollision / select, cascade level 2
    pub const SEL_CL2: u8 = 0x95;
    /// Anticollision / select, cascade level 3
    pub const SEL_CL3: u8 = 0x97;
    /// HaLT command, Type A
    pub const HLTA: u8 = 0x50;
    /// Perform authentication with key A
    pub const MF_AUTH_KEY_A: u8 = 0x60;
    /// Perform authentication with key B
    pub const MF_AUTH_KEY_B: u8 = 0x61;
    /// Read one 16 byte block
    pub const MF_READ: u8 = 0x30;
    /// Write one 16 byte block (two phases)
    pub const MF_WRITE: u8 = 0xA0;
    /// Decrement a value block into the internal register
    pub const MF_DECREMENT: u8 = 0xC0;
    /// Increment a value block into the internal register
    pub const MF_INCREMENT: u8 = 0xC1;
    /// Load a value block into the internal register
    pub const MF_RESTORE: u8 = 0xC2;
    /// Write the internal register to a block
    pub const MF_TRANSFER: u8 = 0xB0;
    /// Write one 4 byte page (MIFARE Ultralight)
    pub const UL_WRITE: u8 = 0xA2;
    /// First step of the "magic card" block 0 unlock (7 bit frame)
    pub const BACKDOOR_UNLOCK_1: u8 = 0x40;
    /// Second step of the "magic card" block 0 unlock
    pub const BACKDOOR_UNLOCK_2: u8 = 0x43;
}

/// NVB (number of valid bits) values following a SEL code
pub mod nvb {
    /// Two bytes sent, request for the complete UID CLn
    pub const ANTICOLLISION: u8 = 0x20;
    /// UID request variant accepted alongside ANTICOLLISION
    pub const ANTICOLLISION_ALT: u8 = 0x26;
    /// Seven bytes sent, complete UID CLn plus BCC: SELECT
    pub const SELECT: u8 = 0x70;
}

/// Fixed card responses
pub mod response {
    /// Answer To reQuest, Type A, for a single size UID MIFARE Classic 1K
    pub const ATQA: [u8; 2] = [0x04, 0x00];
    /// Select AcKnowledge for MIFARE Classic 1K, UID complete
    pub const SAK: u8 = 0x08;
    /// 4 bit acknowledge
    pub const ACK: u8 = 0x0A;
    /// Number of valid bits in an ACK/NAK frame
    pub const ACK_BITS: u8 = 4;
}
