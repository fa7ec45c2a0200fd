//! Hardware description of the MFRC522 reader controller and the MIFARE
//! Classic card it talks to: register map, command codes, opcodes and
//! memory geometry. Nothing in here has behavior.

pub mod picc;
pub mod registers;
pub mod specs;
