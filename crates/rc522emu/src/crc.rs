//! ISO14443A CRC_A, as computed by the MFRC522 CRC coprocessor.
//!
//! Reflected CRC-16 with polynomial 0x8408 (0x1021 unreflected) and preset
//! 0x6363. The result is transmitted least significant byte first.
//!
//! # References
//! - ISO/IEC 14443-3, Annex B "CRC_A and CRC_B encoding"

use crc::{CRC_16_ISO_IEC_14443_3_A, Crc};

const CRC_A: Crc<u16> = Crc::<u16>::new(&CRC_16_ISO_IEC_14443_3_A);

/// Compute CRC_A over `data`. An empty slice yields the preset, 0x6363.
pub fn crc_a(data: &[u8]) -> u16 {
    CRC_A.checksum(data)
}

/// CRC_A in transmission order: `[low, high]`
pub fn crc_a_bytes(data: &[u8]) -> [u8; 2] {
    crc_a(data).to_le_bytes()
}

/// True if the last two bytes of `frame` are the CRC_A of the rest.
///
/// Running the CRC over a frame including its own CRC leaves a zero residue.
pub fn crc_a_is_valid(frame: &[u8]) -> bool {
    frame.len() >= 2 && crc_a(frame) == 0
}

/// Append the CRC_A of `data` to `data`
pub fn append_crc_a(data: &mut Vec<u8>) {
    let crc = crc_a_bytes(data);
    data.extend_from_slice(&crc);
}
