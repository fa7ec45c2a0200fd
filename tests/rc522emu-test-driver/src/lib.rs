//! Host-side MFRC522 driver for exercising the emulator end to end.
//!
//! Every register access goes through the byte-level SPI transport with
//! the same call sequences a typical MFRC522 host library uses: address
//! bytes repeated during FIFO reads, read-modify-write on bit masks,
//! polling ComIrqReg for completion and a CRC coprocessor round trip for
//! every MIFARE command.

use rc522_hw::picc::{nvb, opcode, response};
use rc522_hw::registers::{addr, com_irq, command, div_irq, fifo_level, pcd_command, status2};
use rc522_hw::specs::mifare_1k::{BLOCK_SIZE, KEY_SIZE, UID_SIZE};
use rc522emu::pcd::SELF_TEST_PATTERN_V2;
use rc522emu::{CardMemory, EmulatorConfig, EmulatorCore, Level};
use tracing::{debug, trace};

/// Iterations before a polling loop gives up
const POLL_LIMIT: usize = 2000;

/// ComIrqReg bits the host waits for after a Transceive
const WAIT_IRQ_TRANSCEIVE: u8 = com_irq::RX | com_irq::IDLE;
/// ComIrqReg bits the host waits for after MFAuthent
const WAIT_IRQ_AUTHENT: u8 = com_irq::IDLE;
/// ErrorReg bits that abort a transfer: BufferOvfl, ParityErr, ProtocolErr
const ERROR_MASK: u8 = 0x13;

/// Failure codes, as reported by host libraries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Error,
    Collision,
    Timeout,
    NoRoom,
    CrcWrong,
    MifareNack,
}

/// Bytes read back from the FIFO after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub data: Vec<u8>,
    /// Valid bits in the last byte, 0 for whole bytes
    pub valid_bits: u8,
}

/// UID and SAK of a selected card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uid {
    pub bytes: [u8; UID_SIZE],
    pub sak: u8,
}

pub struct Driver {
    emu: EmulatorCore,
}

impl Driver {
    pub fn new(emu: EmulatorCore) -> Self {
        Self { emu }
    }

    /// Driver around an emulator with the default configuration
    pub fn with_default_card() -> Self {
        let config = EmulatorConfig::default();
        Self::new(EmulatorCore::with_card(CardMemory::new(config.uid), &config))
    }

    pub fn emulator(&self) -> &EmulatorCore {
        &self.emu
    }

    pub fn emulator_mut(&mut self) -> &mut EmulatorCore {
        &mut self.emu
    }

    // ========================================================================
    // Register access over SPI
    // ========================================================================

    pub fn write_register(&mut self, reg: u8, value: u8) {
        self.write_registers(reg, &[value]);
    }

    pub fn write_registers(&mut self, reg: u8, values: &[u8]) {
        self.emu.chip_select(Level::Low);
        self.emu.transfer((reg << 1) & 0x7E);
        for &value in values {
            self.emu.transfer(value);
        }
        self.emu.chip_select(Level::High);
    }

    pub fn read_register(&mut self, reg: u8) -> u8 {
        self.read_registers(reg, 1)[0]
    }

    /// Read `count` bytes from one register, re-sending the address for
    /// every byte but the last
    pub fn read_registers(&mut self, reg: u8, count: usize) -> Vec<u8> {
        if count == 0 {
            return Vec::new();
        }
        let address = 0x80 | ((reg << 1) & 0x7E);

        self.emu.chip_select(Level::Low);
        self.emu.transfer(address);
        let mut values = Vec::with_capacity(count);
        for _ in 1..count {
            values.push(self.emu.transfer(address));
        }
        values.push(self.emu.transfer(0));
        self.emu.chip_select(Level::High);

        trace!("Read {:#04X} x{}: {:02X?}", reg, count, values);
        values
    }

    pub fn set_register_bits(&mut self, reg: u8, mask: u8) {
        let value = self.read_register(reg);
        self.write_register(reg, value | mask);
    }

    pub fn clear_register_bits(&mut self, reg: u8, mask: u8) {
        let value = self.read_register(reg);
        self.write_register(reg, value & !mask);
    }

    // ========================================================================
    // Controller functions
    // ========================================================================

    pub fn reset(&mut self) -> Result<(), StatusCode> {
        self.write_register(addr::COMMAND, pcd_command::SOFT_RESET);
        for _ in 0..3 {
            if self.read_register(addr::COMMAND) & command::POWER_DOWN == 0 {
                return Ok(());
            }
        }
        Err(StatusCode::Timeout)
    }

    pub fn init(&mut self) -> Result<(), StatusCode> {
        self.reset()?;

        self.write_register(addr::TX_MODE, 0x00);
        self.write_register(addr::RX_MODE, 0x00);
        self.write_register(addr::MOD_WIDTH, 0x26);

        // Timer: TAuto, 25 ms timeout
        self.write_register(addr::T_MODE, 0x80);
        self.write_register(addr::T_PRESCALER, 0xA9);
        self.write_register(addr::T_RELOAD_H, 0x03);
        self.write_register(addr::T_RELOAD_L, 0xE8);

        self.write_register(addr::TX_ASK, 0x40);
        self.write_register(addr::MODE, 0x3D);
        self.antenna_on();
        Ok(())
    }

    pub fn antenna_on(&mut self) {
        let value = self.read_register(addr::TX_CONTROL);
        if value & 0x03 != 0x03 {
            self.write_register(addr::TX_CONTROL, value | 0x03);
        }
    }

    pub fn version(&mut self) -> u8 {
        self.read_register(addr::VERSION)
    }

    pub fn calculate_crc(&mut self, data: &[u8]) -> Result<[u8; 2], StatusCode> {
        self.write_register(addr::COMMAND, pcd_command::IDLE);
        self.write_register(addr::DIV_IRQ, div_irq::CRC);
        self.write_register(addr::FIFO_LEVEL, fifo_level::FLUSH_BUFFER);
        self.write_registers(addr::FIFO_DATA, data);
        self.write_register(addr::COMMAND, pcd_command::CALC_CRC);

        for _ in 0..POLL_LIMIT {
            if self.read_register(addr::DIV_IRQ) & div_irq::CRC != 0 {
                self.write_register(addr::COMMAND, pcd_command::IDLE);
                return Ok([
                    self.read_register(addr::CRC_RESULT_L),
                    self.read_register(addr::CRC_RESULT_H),
                ]);
            }
        }
        Err(StatusCode::Timeout)
    }

    /// Digital self-test: true if the FIFO holds the reference pattern
    pub fn self_test(&mut self) -> Result<bool, StatusCode> {
        self.reset()?;

        self.write_register(addr::FIFO_LEVEL, fifo_level::FLUSH_BUFFER);
        self.write_registers(addr::FIFO_DATA, &[0; 25]);
        self.write_register(addr::COMMAND, pcd_command::MEM);

        self.write_register(addr::AUTO_TEST, 0x09);
        self.write_register(addr::FIFO_DATA, 0x00);
        self.write_register(addr::COMMAND, pcd_command::CALC_CRC);

        for _ in 0..0xFF {
            if self.read_register(addr::FIFO_LEVEL) >= 64 {
                break;
            }
        }
        self.write_register(addr::COMMAND, pcd_command::IDLE);

        let result = self.read_registers(addr::FIFO_DATA, 64);
        self.write_register(addr::AUTO_TEST, 0x00);

        let passed = self.version() == 0x92 && result == SELF_TEST_PATTERN_V2;
        self.init()?;
        Ok(passed)
    }

    pub fn soft_power_down(&mut self) {
        self.set_register_bits(addr::COMMAND, command::POWER_DOWN);
    }

    pub fn soft_power_up(&mut self) -> Result<(), StatusCode> {
        self.clear_register_bits(addr::COMMAND, command::POWER_DOWN);
        for _ in 0..POLL_LIMIT {
            if self.read_register(addr::COMMAND) & command::POWER_DOWN == 0 {
                return Ok(());
            }
        }
        Err(StatusCode::Timeout)
    }

    // ========================================================================
    // Card communication
    // ========================================================================

    /// Run `cmd` on `send`, wait for `wait_irq` and collect up to
    /// `back_capacity` reply bytes (`None` when no reply is expected)
    pub fn communicate(
        &mut self,
        cmd: u8,
        wait_irq: u8,
        send: &[u8],
        back_capacity: Option<usize>,
        tx_last_bits: u8,
        check_crc: bool,
    ) -> Result<Reply, StatusCode> {
        self.write_register(addr::COMMAND, pcd_command::IDLE);
        self.write_register(addr::COM_IRQ, com_irq::ALL);
        self.write_register(addr::FIFO_LEVEL, fifo_level::FLUSH_BUFFER);
        self.write_registers(addr::FIFO_DATA, send);
        self.write_register(addr::BIT_FRAMING, tx_last_bits);
        self.write_register(addr::COMMAND, cmd);
        if cmd == pcd_command::TRANSCEIVE {
            // StartSend
            self.set_register_bits(addr::BIT_FRAMING, 0x80);
        }

        let mut completed = false;
        for _ in 0..POLL_LIMIT {
            let irq = self.read_register(addr::COM_IRQ);
            if irq & wait_irq != 0 {
                completed = true;
                break;
            }
            if irq & com_irq::TIMER != 0 {
                return Err(StatusCode::Timeout);
            }
        }
        if !completed {
            return Err(StatusCode::Timeout);
        }

        let error = self.read_register(addr::ERROR);
        if error & ERROR_MASK != 0 {
            return Err(StatusCode::Error);
        }

        let mut reply = Reply {
            data: Vec::new(),
            valid_bits: 0,
        };
        if let Some(capacity) = back_capacity {
            let level = (self.read_register(addr::FIFO_LEVEL) & fifo_level::LEVEL_MASK) as usize;
            if level > capacity {
                return Err(StatusCode::NoRoom);
            }
            reply.data = self.read_registers(addr::FIFO_DATA, level);
            reply.valid_bits = self.read_register(addr::CONTROL) & 0x07;
        }

        if error & 0x08 != 0 {
            return Err(StatusCode::Collision);
        }

        if back_capacity.is_some() && check_crc {
            if reply.data.len() == 1 && reply.valid_bits == 4 {
                return Err(StatusCode::MifareNack);
            }
            if reply.data.len() < 2 || reply.valid_bits != 0 {
                return Err(StatusCode::CrcWrong);
            }
            let split = reply.data.len() - 2;
            let crc = self.calculate_crc(&reply.data[..split])?;
            if reply.data[split..] != crc {
                return Err(StatusCode::CrcWrong);
            }
        }

        debug!("Communicate {:#04X} {:02X?} -> {:02X?}", cmd, send, reply);
        Ok(reply)
    }

    pub fn transceive(
        &mut self,
        send: &[u8],
        back_capacity: Option<usize>,
        tx_last_bits: u8,
        check_crc: bool,
    ) -> Result<Reply, StatusCode> {
        self.communicate(
            pcd_command::TRANSCEIVE,
            WAIT_IRQ_TRANSCEIVE,
            send,
            back_capacity,
            tx_last_bits,
            check_crc,
        )
    }

    /// Send a MIFARE command with CRC_A appended and expect a 4 bit ACK
    pub fn mifare_transceive(&mut self, send: &[u8], accept_timeout: bool) -> Result<(), StatusCode> {
        let mut frame = send.to_vec();
        let crc = self.calculate_crc(send)?;
        frame.extend_from_slice(&crc);

        let reply = match self.transceive(&frame, Some(18), 0, false) {
            Err(StatusCode::Timeout) if accept_timeout => return Ok(()),
            other => other?,
        };
        if reply.data.len() != 1 || reply.valid_bits != 4 {
            return Err(StatusCode::Error);
        }
        if reply.data[0] != response::ACK {
            return Err(StatusCode::MifareNack);
        }
        Ok(())
    }

    // ========================================================================
    // ISO14443A activation
    // ========================================================================

    fn request_or_wakeup(&mut self, cmd: u8) -> Result<[u8; 2], StatusCode> {
        self.clear_register_bits(addr::COLL, 0x80);
        let reply = self.transceive(&[cmd], Some(2), 7, false)?;
        if reply.data.len() != 2 || reply.valid_bits != 0 {
            return Err(StatusCode::Error);
        }
        Ok([reply.data[0], reply.data[1]])
    }

    pub fn request_a(&mut self) -> Result<[u8; 2], StatusCode> {
        self.request_or_wakeup(opcode::REQA)
    }

    pub fn wakeup_a(&mut self) -> Result<[u8; 2], StatusCode> {
        self.request_or_wakeup(opcode::WUPA)
    }

    pub fn is_new_card_present(&mut self) -> bool {
        self.write_register(addr::TX_MODE, 0x00);
        self.write_register(addr::RX_MODE, 0x00);
        self.write_register(addr::MOD_WIDTH, 0x26);
        matches!(self.request_a(), Ok(_) | Err(StatusCode::Collision))
    }

    /// Anticollision and select for a single size UID
    pub fn select(&mut self) -> Result<Uid, StatusCode> {
        self.clear_register_bits(addr::COLL, 0x80);

        let reply = self.transceive(&[opcode::SEL_CL1, nvb::ANTICOLLISION], Some(5), 0, false)?;
        if reply.data.len() != 5 {
            return Err(StatusCode::Error);
        }
        let bytes = [reply.data[0], reply.data[1], reply.data[2], reply.data[3]];
        if bytes.iter().fold(0, |acc, b| acc ^ b) != reply.data[4] {
            return Err(StatusCode::Error);
        }

        let mut frame = vec![opcode::SEL_CL1, nvb::SELECT];
        frame.extend_from_slice(&reply.data);
        let crc = self.calculate_crc(&frame)?;
        frame.extend_from_slice(&crc);

        let reply = self.transceive(&frame, Some(3), 0, false)?;
        if reply.data.len() != 3 || reply.valid_bits != 0 {
            return Err(StatusCode::Error);
        }
        let crc = self.calculate_crc(&reply.data[..1])?;
        if reply.data[1..] != crc {
            return Err(StatusCode::CrcWrong);
        }

        Ok(Uid {
            bytes,
            sak: reply.data[0],
        })
    }

    /// HLTA: the card must not answer
    pub fn halt_a(&mut self) -> Result<(), StatusCode> {
        let mut frame = vec![opcode::HLTA, 0x00];
        let crc = self.calculate_crc(&frame)?;
        frame.extend_from_slice(&crc);

        match self.transceive(&frame, None, 0, false) {
            Err(StatusCode::Timeout) => Ok(()),
            Ok(_) => Err(StatusCode::Error),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // MIFARE Classic
    // ========================================================================

    pub fn authenticate(
        &mut self,
        key_cmd: u8,
        block: u8,
        key: &[u8; KEY_SIZE],
        uid: &Uid,
    ) -> Result<(), StatusCode> {
        let mut frame = vec![key_cmd, block];
        frame.extend_from_slice(key);
        frame.extend_from_slice(&uid.bytes);
        self.communicate(
            pcd_command::MF_AUTHENT,
            WAIT_IRQ_AUTHENT,
            &frame,
            None,
            0,
            false,
        )
        .map(|_| ())
    }

    pub fn stop_crypto1(&mut self) {
        self.clear_register_bits(addr::STATUS2, status2::MF_CRYPTO1_ON);
    }

    pub fn is_crypto1_on(&mut self) -> bool {
        self.read_register(addr::STATUS2) & status2::MF_CRYPTO1_ON != 0
    }

    pub fn mifare_read(&mut self, block: u8) -> Result<[u8; BLOCK_SIZE], StatusCode> {
        let mut frame = vec![opcode::MF_READ, block];
        let crc = self.calculate_crc(&frame)?;
        frame.extend_from_slice(&crc);

        let reply = self.transceive(&frame, Some(BLOCK_SIZE + 2), 0, true)?;
        if reply.data.len() != BLOCK_SIZE + 2 {
            return Err(StatusCode::Error);
        }
        let mut data = [0u8; BLOCK_SIZE];
        data.copy_from_slice(&reply.data[..BLOCK_SIZE]);
        Ok(data)
    }

    pub fn mifare_write(&mut self, block: u8, data: &[u8; BLOCK_SIZE]) -> Result<(), StatusCode> {
        self.mifare_transceive(&[opcode::MF_WRITE, block], false)?;
        self.mifare_transceive(data, false)
    }

    pub fn ultralight_write(&mut self, page: u8, data: &[u8; 4]) -> Result<(), StatusCode> {
        let mut frame = vec![opcode::UL_WRITE, page];
        frame.extend_from_slice(data);
        self.mifare_transceive(&frame, false)
    }

    fn two_step(&mut self, cmd: u8, block: u8, operand: i32) -> Result<(), StatusCode> {
        self.mifare_transceive(&[cmd, block], false)?;
        self.mifare_transceive(&operand.to_le_bytes(), true)
    }

    pub fn mifare_increment(&mut self, block: u8, delta: i32) -> Result<(), StatusCode> {
        self.two_step(opcode::MF_INCREMENT, block, delta)
    }

    pub fn mifare_decrement(&mut self, block: u8, delta: i32) -> Result<(), StatusCode> {
        self.two_step(opcode::MF_DECREMENT, block, delta)
    }

    pub fn mifare_restore(&mut self, block: u8) -> Result<(), StatusCode> {
        self.two_step(opcode::MF_RESTORE, block, 0)
    }

    /// TRANSFER followed by a dummy operand that completes the pending
    /// two-step state on the card
    pub fn mifare_transfer(&mut self, block: u8) -> Result<(), StatusCode> {
        self.two_step(opcode::MF_TRANSFER, block, 0)
    }

    /// TRANSFER as a single command, leaving the card's pending state open
    pub fn mifare_transfer_single(&mut self, block: u8) -> Result<(), StatusCode> {
        self.mifare_transceive(&[opcode::MF_TRANSFER, block], false)
    }

    pub fn mifare_set_value(&mut self, block: u8, value: i32) -> Result<(), StatusCode> {
        let encoded = rc522emu::ValueBlock::new(value, block).encode();
        self.mifare_write(block, &encoded)
    }

    pub fn mifare_get_value(&mut self, block: u8) -> Result<i32, StatusCode> {
        let data = self.mifare_read(block)?;
        Ok(i32::from_le_bytes([data[0], data[1], data[2], data[3]]))
    }

    // ========================================================================
    // Magic card
    // ========================================================================

    pub fn open_uid_backdoor(&mut self) -> Result<(), StatusCode> {
        self.halt_a()?;

        for (cmd, bits) in [
            (opcode::BACKDOOR_UNLOCK_1, 7),
            (opcode::BACKDOOR_UNLOCK_2, 8),
        ] {
            let reply = self.transceive(&[cmd], Some(32), bits, false)?;
            if reply.data.len() != 1 || reply.data[0] != response::ACK {
                return Err(StatusCode::Error);
            }
        }
        Ok(())
    }

    /// Rewrite the UID of a selected "magic" card through the block 0 backdoor
    pub fn set_uid(&mut self, uid: &Uid, new_uid: &[u8; UID_SIZE]) -> Result<(), StatusCode> {
        self.authenticate(opcode::MF_AUTH_KEY_A, 1, &[0xFF; KEY_SIZE], uid)?;
        let mut block0 = self.mifare_read(0)?;

        block0[..UID_SIZE].copy_from_slice(new_uid);
        block0[UID_SIZE] = new_uid.iter().fold(0, |acc, b| acc ^ b);

        self.open_uid_backdoor()?;
        self.mifare_write(0, &block0)?;
        self.wakeup_a()?;
        Ok(())
    }
}
