//! MFRC522 proximity coupling device: register file, FIFO and the command
//! state machine driven through CommandReg.
//!
//! # References
//! - NXP MFRC522 datasheet, section 9 "MFRC522 registers"
//! - NXP MFRC522 datasheet, section 10 "MFRC522 command set"
//! - NXP MFRC522 datasheet, section 16.1.1 "Self test"

use crate::card::CardMemory;
use crate::crc::crc_a;
use crate::fifo::Fifo;
use crate::picc::{Picc, Response};
use rc522_hw::picc::response;
use rc522_hw::registers::{
    self, addr, auto_test, com_irq, command, control, div_irq, error, fifo_level, pcd_command,
    status2, t_mode, version,
};
use rc522_hw::specs::pcd::{INTERNAL_BUFFER_SIZE, RANDOM_ID_SIZE};
use tracing::{debug, trace, warn};

/// FIFO contents after the digital self-test of a version 2.0 chip
pub const SELF_TEST_PATTERN_V2: [u8; 64] = [
    0x00, 0xEB, 0x66, 0xBA, 0x57, 0xBF, 0x23, 0x95, 0xD0, 0xE3, 0x0D, 0x3D, 0x27, 0x89, 0x5C, 0xDE,
    0x9D, 0x3B, 0xA7, 0x00, 0x21, 0x5B, 0x89, 0x82, 0x51, 0x3A, 0xEB, 0x02, 0x0C, 0xA5, 0x00, 0x49,
    0x7C, 0x84, 0x4D, 0xB3, 0xCC, 0xD2, 0x1B, 0x81, 0x5D, 0x48, 0x76, 0xD5, 0x71, 0x61, 0x21, 0xA9,
    0x86, 0x96, 0x83, 0x38, 0xCF, 0x9D, 0x5B, 0x6D, 0xDC, 0x15, 0xBA, 0x3E, 0x7D, 0x95, 0x3B, 0x2F,
];

/// Commands written to bits 0-3 of CommandReg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcdCommand {
    Idle,
    Mem,
    GenerateRandomId,
    CalcCrc,
    Transmit,
    NoCmdChange,
    Receive,
    Transceive,
    MfAuthent,
    SoftReset,
    Unknown(u8),
}

impl From<u8> for PcdCommand {
    fn from(value: u8) -> Self {
        match value & command::CODE_MASK {
            pcd_command::IDLE => PcdCommand::Idle,
            pcd_command::MEM => PcdCommand::Mem,
            pcd_command::GENERATE_RANDOM_ID => PcdCommand::GenerateRandomId,
            pcd_command::CALC_CRC => PcdCommand::CalcCrc,
            pcd_command::TRANSMIT => PcdCommand::Transmit,
            pcd_command::NO_CMD_CHANGE => PcdCommand::NoCmdChange,
            pcd_command::RECEIVE => PcdCommand::Receive,
            pcd_command::TRANSCEIVE => PcdCommand::Transceive,
            pcd_command::MF_AUTHENT => PcdCommand::MfAuthent,
            pcd_command::SOFT_RESET => PcdCommand::SoftReset,
            other => PcdCommand::Unknown(other),
        }
    }
}

impl PcdCommand {
    pub fn code(self) -> u8 {
        match self {
            PcdCommand::Idle => pcd_command::IDLE,
            PcdCommand::Mem => pcd_command::MEM,
            PcdCommand::GenerateRandomId => pcd_command::GENERATE_RANDOM_ID,
            PcdCommand::CalcCrc => pcd_command::CALC_CRC,
            PcdCommand::Transmit => pcd_command::TRANSMIT,
            PcdCommand::NoCmdChange => pcd_command::NO_CMD_CHANGE,
            PcdCommand::Receive => pcd_command::RECEIVE,
            PcdCommand::Transceive => pcd_command::TRANSCEIVE,
            PcdCommand::MfAuthent => pcd_command::MF_AUTHENT,
            PcdCommand::SoftReset => pcd_command::SOFT_RESET,
            PcdCommand::Unknown(code) => code,
        }
    }
}

/// XorShift generator backing GenerateRandomID. Deterministic for a given
/// seed and never yields 0.
#[derive(Debug)]
struct XorShift {
    state: u32,
}

impl XorShift {
    fn new(seed: u32) -> Self {
        // A zero state would stay zero forever
        Self { state: seed.max(1) }
    }

    fn next(&mut self) -> u32 {
        self.state ^= self.state << 6;
        self.state ^= self.state >> 1;
        self.state ^= self.state << 11;
        self.state
    }
}

/// The reader controller plus the card in its field
#[derive(Debug)]
pub struct Mfrc522 {
    // ========================================================================
    // REGISTER STATE
    // ========================================================================
    /// Plain register storage. Live registers are computed on read.
    regs: [u8; registers::COUNT],
    fifo: Fifo,

    // ========================================================================
    // INTERNAL STATE
    // ========================================================================
    /// Command currently executing
    command: PcdCommand,
    /// Soft power-down mode (CommandReg bit 4)
    powered_down: bool,
    /// 25 byte buffer used by Mem and GenerateRandomID
    internal_buffer: [u8; INTERNAL_BUFFER_SIZE],
    rng: XorShift,
    picc: Picc,
}

impl Mfrc522 {
    pub fn new(card: CardMemory, rng_seed: u32) -> Self {
        let mut chip = Self {
            regs: [0; registers::COUNT],
            fifo: Fifo::new(),
            command: PcdCommand::Idle,
            powered_down: false,
            internal_buffer: [0; INTERNAL_BUFFER_SIZE],
            rng: XorShift::new(rng_seed),
            picc: Picc::new(card),
        };
        chip.reset_registers();
        chip
    }

    pub fn picc(&self) -> &Picc {
        &self.picc
    }

    pub fn card(&self) -> &CardMemory {
        self.picc.card()
    }

    pub fn is_powered_down(&self) -> bool {
        self.powered_down
    }

    pub fn fifo_len(&self) -> usize {
        self.fifo.len()
    }

    fn reset_registers(&mut self) {
        self.regs = [0; registers::COUNT];
        for &(reg, value) in registers::RESET_VALUES {
            self.regs[reg as usize] = value;
        }
    }

    fn set_com_irq(&mut self, bits: u8) {
        self.regs[addr::COM_IRQ as usize] |= bits;
    }

    fn clear_com_irq(&mut self, bits: u8) {
        self.regs[addr::COM_IRQ as usize] &= !bits;
    }

    fn set_rx_last_bits(&mut self, bits: u8) {
        let reg = &mut self.regs[addr::CONTROL as usize];
        *reg = (*reg & !control::RX_LAST_BITS_MASK) | (bits & control::RX_LAST_BITS_MASK);
    }

    fn after_fifo_read(&mut self) {
        if self.fifo.is_empty() {
            self.clear_com_irq(com_irq::RX);
        }
    }

    // ========================================================================
    // Register interface
    // ========================================================================

    /// Handle a register read. Reading FIFODataReg pops one byte.
    pub fn read(&mut self, reg: u8) -> u8 {
        let value = match reg {
            addr::COMMAND => {
                let mut value = self.command.code();
                if self.powered_down {
                    value |= command::POWER_DOWN;
                }
                value
            }
            addr::STATUS2 => {
                let mut value = self.regs[reg as usize];
                if self.picc.is_authenticated() {
                    value |= status2::MF_CRYPTO1_ON;
                }
                value
            }
            addr::FIFO_DATA => {
                let value = self.fifo.pop().unwrap_or(0);
                self.after_fifo_read();
                value
            }
            addr::FIFO_LEVEL => self.fifo.len() as u8,
            addr::VERSION => version::V2_0,
            _ if (reg as usize) < registers::COUNT => self.regs[reg as usize],
            _ => {
                warn!("Read of unknown register {:#04X}", reg);
                0
            }
        };

        trace!("Register read: reg={:#04X}, value={:#04X}", reg, value);
        value
    }

    /// Drain up to `max` bytes from the FIFO in one go
    pub fn read_fifo(&mut self, max: usize) -> Vec<u8> {
        let bytes = self.fifo.drain(max);
        self.after_fifo_read();
        trace!("FIFO burst read: {:02X?}", bytes);
        bytes
    }

    /// Handle a register write
    pub fn write(&mut self, reg: u8, value: u8) {
        trace!("Register write: reg={:#04X}, value={:#04X}", reg, value);

        match reg {
            addr::COMMAND => self.write_command(value),
            addr::COM_IRQ => {
                if value == com_irq::ALL {
                    self.regs[reg as usize] = 0;
                } else {
                    self.regs[reg as usize] = value;
                }
            }
            addr::DIV_IRQ => {
                let bits = value & !div_irq::SET2;
                if value & div_irq::SET2 != 0 {
                    self.regs[reg as usize] |= bits;
                } else {
                    self.regs[reg as usize] &= !bits;
                }
            }
            addr::STATUS2 => {
                self.regs[reg as usize] = value & !status2::MF_CRYPTO1_ON;
                if value & status2::MF_CRYPTO1_ON == 0 {
                    self.picc.deauthenticate();
                }
            }
            addr::FIFO_DATA => {
                if !self.fifo.push(value) {
                    self.regs[addr::ERROR as usize] |= error::BUFFER_OVFL;
                }
            }
            addr::FIFO_LEVEL => {
                if value & fifo_level::FLUSH_BUFFER != 0 {
                    trace!("FIFO flush");
                    self.fifo.clear();
                    self.regs[addr::ERROR as usize] &= !error::BUFFER_OVFL;
                }
            }
            addr::VERSION => {
                debug!("Ignoring write to VersionReg: {:#04X}", value);
            }
            _ if (reg as usize) < registers::COUNT => self.regs[reg as usize] = value,
            _ => warn!("Write to unknown register {:#04X}: {:#04X}", reg, value),
        }
    }

    // ========================================================================
    // Command execution
    // ========================================================================

    fn write_command(&mut self, value: u8) {
        if value & command::POWER_DOWN != 0 {
            debug!("Soft power-down");
            self.powered_down = true;
            self.set_com_irq(com_irq::IDLE);
            self.clear_com_irq(com_irq::RX | com_irq::TX);
            return;
        }

        if self.powered_down {
            debug!("Soft power-up");
            self.powered_down = false;
            self.clear_com_irq(com_irq::IDLE);
        }

        self.execute_cmd(PcdCommand::from(value));
    }

    /// Execute a PCD command
    fn execute_cmd(&mut self, cmd: PcdCommand) {
        debug!("PCD command {:?}", cmd);

        match cmd {
            PcdCommand::Idle => self.command = PcdCommand::Idle,
            PcdCommand::Mem => self.cmd_mem(),
            PcdCommand::GenerateRandomId => self.cmd_generate_random_id(),
            PcdCommand::CalcCrc => self.cmd_calc_crc(),
            PcdCommand::Transmit => self.cmd_transmit(),
            PcdCommand::NoCmdChange => {}
            PcdCommand::Receive => self.command = PcdCommand::Receive,
            PcdCommand::Transceive => self.cmd_transceive(),
            PcdCommand::MfAuthent => self.cmd_mf_authent(),
            PcdCommand::SoftReset => self.cmd_soft_reset(),
            PcdCommand::Unknown(code) => {
                warn!("Unknown PCD command {:#04X}", code);
            }
        }
    }

    fn cmd_mem(&mut self) {
        if self.fifo.is_empty() {
            self.fifo.extend(&self.internal_buffer);
        } else {
            let bytes = self.fifo.drain(INTERNAL_BUFFER_SIZE);
            self.internal_buffer[..bytes.len()].copy_from_slice(&bytes);
        }
        self.command = PcdCommand::Idle;
        self.set_com_irq(com_irq::IDLE);
    }

    fn cmd_generate_random_id(&mut self) {
        for byte in self.internal_buffer[..RANDOM_ID_SIZE].iter_mut() {
            *byte = self.rng.next() as u8;
        }
        trace!(
            "Random ID: {:02X?}",
            &self.internal_buffer[..RANDOM_ID_SIZE]
        );
        self.command = PcdCommand::Idle;
        self.set_com_irq(com_irq::IDLE);
    }

    fn cmd_calc_crc(&mut self) {
        if self.regs[addr::AUTO_TEST as usize] & 0x0F == auto_test::SELF_TEST {
            debug!("Digital self-test");
            self.fifo.clear();
            self.fifo.extend(&SELF_TEST_PATTERN_V2);
        } else {
            let crc = crc_a(&self.fifo.contents());
            trace!("CRC_A over FIFO: {:#06X}", crc);
            self.regs[addr::CRC_RESULT_L as usize] = crc as u8;
            self.regs[addr::CRC_RESULT_H as usize] = (crc >> 8) as u8;
            self.regs[addr::DIV_IRQ as usize] |= div_irq::CRC;
        }
        self.command = PcdCommand::Idle;
    }

    fn cmd_transmit(&mut self) {
        // Nothing in the field answers a bare transmission
        self.fifo.clear();
        self.set_com_irq(com_irq::TX | com_irq::IDLE);
        self.command = PcdCommand::Idle;
    }

    fn cmd_transceive(&mut self) {
        if self.fifo.is_empty() {
            self.command = PcdCommand::Transceive;
            return;
        }

        let frame = self.fifo.take();
        let reply = self.picc.transceive(&frame);
        debug!("Card response: {:02X?}", reply);
        self.complete(reply);
        self.command = PcdCommand::Idle;
    }

    fn cmd_mf_authent(&mut self) {
        let frame = self.fifo.take();
        if self.picc.authenticate(&frame) {
            self.set_com_irq(com_irq::IDLE);
        }
        self.command = PcdCommand::Idle;
    }

    fn cmd_soft_reset(&mut self) {
        debug!("Soft reset");
        self.reset_registers();
        self.fifo.clear();
        self.picc.reset();
        self.powered_down = false;
        self.command = PcdCommand::Idle;
    }

    /// Put the card's answer into the FIFO and raise the matching interrupts
    fn complete(&mut self, reply: Response) {
        match reply {
            Response::Frame(bytes) => {
                self.fifo.extend(&bytes);
                self.set_rx_last_bits(0);
                self.set_com_irq(com_irq::TX | com_irq::RX | com_irq::IDLE);
            }
            Response::Ack => {
                self.fifo.push(response::ACK);
                self.set_rx_last_bits(response::ACK_BITS);
                self.set_com_irq(com_irq::TX | com_irq::RX | com_irq::IDLE);
            }
            Response::Done => self.set_com_irq(com_irq::IDLE),
            Response::Silent => {
                self.set_com_irq(com_irq::TX);
                if self.regs[addr::T_MODE as usize] & t_mode::T_AUTO != 0 {
                    self.set_com_irq(com_irq::TIMER);
                }
            }
        }
    }
}
