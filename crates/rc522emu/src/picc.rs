//! The card in the reader's field: ISO14443A activation and the MIFARE
//! Classic command set.
//!
//! A frame is whatever the controller clocked out of its FIFO during a
//! Transceive. Multi-phase commands (WRITE and the value operations) leave
//! a pending record that the next frame of the matching length completes.
//!
//! # References
//! - ISO/IEC 14443-3, section 6 "Type A initialization and anticollision"
//! - NXP MF1S50YYX, section 9 "Command overview"
//! - NXP MF0ICU1, section 9.3 "WRITE"

use crate::card::{Block, CardMemory, ValueBlock};
use crate::crc::{append_crc_a, crc_a_is_valid};
use rc522_hw::picc::{nvb, opcode, response};
use rc522_hw::specs::mifare_1k::{BLOCK_SIZE, BLOCKS};
use rc522_hw::specs::ultralight::{FIRST_WRITABLE_PAGE, PAGE_LIMIT, PAGE_SIZE};
use tracing::{debug, warn};

/// Length of a WRITE data frame: 16 data bytes plus CRC_A
const WRITE_DATA_FRAME_LEN: usize = BLOCK_SIZE + 2;
/// Operand of a value operation's second phase
const OPERAND_LEN: usize = 4;

/// What the card sends back for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// No modulation at all: the reader sees a timeout
    Silent,
    /// Accepted without a radio answer (authentication)
    Done,
    /// 4 bit ACK
    Ack,
    /// Full bytes
    Frame(Vec<u8>),
}

/// Decoded first byte of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiccCommand {
    Request,
    Select(u8),
    Authenticate,
    Read,
    Write,
    Value(ValueOp),
    UltralightWrite,
    Halt,
    BackdoorUnlock1,
    BackdoorUnlock2,
    Unknown(u8),
}

impl From<u8> for PiccCommand {
    fn from(value: u8) -> Self {
        match value {
            opcode::REQA | opcode::WUPA => PiccCommand::Request,
            opcode::SEL_CL1 | opcode::SEL_CL2 | opcode::SEL_CL3 => PiccCommand::Select(value),
            opcode::MF_AUTH_KEY_A | opcode::MF_AUTH_KEY_B => PiccCommand::Authenticate,
            opcode::MF_READ => PiccCommand::Read,
            opcode::MF_WRITE => PiccCommand::Write,
            opcode::MF_DECREMENT => PiccCommand::Value(ValueOp::Decrement),
            opcode::MF_INCREMENT => PiccCommand::Value(ValueOp::Increment),
            opcode::MF_RESTORE => PiccCommand::Value(ValueOp::Restore),
            opcode::MF_TRANSFER => PiccCommand::Value(ValueOp::Transfer),
            opcode::UL_WRITE => PiccCommand::UltralightWrite,
            opcode::HLTA => PiccCommand::Halt,
            opcode::BACKDOOR_UNLOCK_1 => PiccCommand::BackdoorUnlock1,
            opcode::BACKDOOR_UNLOCK_2 => PiccCommand::BackdoorUnlock2,
            other => PiccCommand::Unknown(other),
        }
    }
}

/// Value block operations. Each one is acknowledged twice: once for the
/// block number and once for the 4 byte operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOp {
    Decrement,
    Increment,
    Restore,
    Transfer,
}

/// Progress through the HALT, 0x40, 0x43 sequence that opens block 0 of
/// a "magic" card for writing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Backdoor {
    #[default]
    Idle,
    Armed,
    FirstStep,
}

#[derive(Debug, Default)]
struct Session {
    selected: bool,
    authenticated: bool,
    /// 0: waiting for the UID request, 1: UID sent, waiting for SELECT
    anticollision_step: u8,
    pending_write: Option<u8>,
    pending_two_step: Option<(ValueOp, u8)>,
    backdoor: Backdoor,
    backdoor_unlocked: bool,
}

/// One MIFARE Classic 1K card
#[derive(Debug)]
pub struct Picc {
    card: CardMemory,
    session: Session,
}

impl Picc {
    pub fn new(card: CardMemory) -> Self {
        Self {
            card,
            session: Session::default(),
        }
    }

    pub fn card(&self) -> &CardMemory {
        &self.card
    }

    pub fn is_selected(&self) -> bool {
        self.session.selected
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.authenticated
    }

    /// Crypto1 switched off by the reader
    pub fn deauthenticate(&mut self) {
        if self.session.authenticated {
            debug!("Authenticated session ended");
        }
        self.session.authenticated = false;
    }

    /// Forget all protocol state: selection, authentication, anticollision
    /// progress, pending operations and the backdoor.
    pub fn reset(&mut self) {
        debug!("Card session reset");
        self.session = Session::default();
    }

    /// MFAuthent on the controller: the FIFO holds the auth opcode, block
    /// number, key and UID. Any key is accepted.
    pub fn authenticate(&mut self, frame: &[u8]) -> bool {
        match frame.first().copied().map(PiccCommand::from) {
            Some(PiccCommand::Authenticate) => {
                debug!(
                    "Authenticated with key {} for block {:?}",
                    if frame[0] == opcode::MF_AUTH_KEY_A { "A" } else { "B" },
                    frame.get(1)
                );
                self.session.authenticated = true;
                true
            }
            _ => {
                debug!("MFAuthent with unexpected frame {:02X?}", frame);
                false
            }
        }
    }

    /// Process one frame received over the air
    pub fn transceive(&mut self, frame: &[u8]) -> Response {
        if let Some(block) = self.session.pending_write {
            if frame.len() == WRITE_DATA_FRAME_LEN {
                self.session.pending_write = None;
                return self.write_data(block, frame);
            }
        }

        if let Some((op, block)) = self.session.pending_two_step {
            if frame.len() == OPERAND_LEN || frame.len() == OPERAND_LEN + 2 {
                self.session.pending_two_step = None;
                return self.value_operand(op, block, frame);
            }
        }

        let Some(&first) = frame.first() else {
            return Response::Silent;
        };
        let command = PiccCommand::from(first);
        debug!("PICC command {:?}, frame {:02X?}", command, frame);

        // Only an uninterrupted HALT, 0x40, 0x43 sequence opens the backdoor
        if !matches!(
            command,
            PiccCommand::Halt | PiccCommand::BackdoorUnlock1 | PiccCommand::BackdoorUnlock2
        ) {
            self.session.backdoor = Backdoor::Idle;
        }

        match command {
            PiccCommand::Request => self.cmd_request(),
            PiccCommand::Select(level) => self.cmd_select(level, frame),
            PiccCommand::Authenticate => {
                self.authenticate(frame);
                Response::Done
            }
            PiccCommand::Read => self.cmd_read(frame),
            PiccCommand::Write => self.cmd_write(frame),
            PiccCommand::Value(op) => self.cmd_value(op, frame),
            PiccCommand::UltralightWrite => self.cmd_ultralight_write(frame),
            PiccCommand::Halt => self.cmd_halt(),
            PiccCommand::BackdoorUnlock1 => self.cmd_backdoor_unlock_1(),
            PiccCommand::BackdoorUnlock2 => self.cmd_backdoor_unlock_2(),
            PiccCommand::Unknown(op) => {
                warn!("Unknown PICC command {:#04X}", op);
                Response::Silent
            }
        }
    }

    // ========================================================================
    // Activation
    // ========================================================================

    fn cmd_request(&mut self) -> Response {
        self.session.anticollision_step = 0;
        Response::Frame(response::ATQA.to_vec())
    }

    fn cmd_select(&mut self, level: u8, frame: &[u8]) -> Response {
        if level != opcode::SEL_CL1 {
            // Single size UID: cascade levels 2 and 3 never occur
            debug!("Ignoring cascade level {:#04X}", level);
            return Response::Silent;
        }

        let step = self.session.anticollision_step;
        match (frame.get(1).copied(), frame.len()) {
            (None, 1) | (Some(nvb::ANTICOLLISION | nvb::ANTICOLLISION_ALT), 2) if step == 0 => {
                let uid = self.card.uid();
                let mut reply = uid.to_vec();
                reply.push(crate::card::bcc(&uid));
                self.session.anticollision_step = 1;
                debug!("Anticollision, sending UID {:02X?}", reply);
                Response::Frame(reply)
            }
            (Some(nvb::SELECT), 9) if step == 1 => {
                let uid = self.card.uid();
                if frame[2..6] != uid {
                    warn!(
                        "SELECT UID mismatch: got {:02X?}, card has {:02X?}",
                        &frame[2..6],
                        uid
                    );
                    return Response::Silent;
                }
                if !crc_a_is_valid(frame) {
                    debug!("SELECT frame CRC_A does not check out, accepting anyway");
                }

                self.session.selected = true;
                self.session.authenticated = false;
                self.session.anticollision_step = 0;
                debug!("Card selected");

                let mut reply = vec![response::SAK];
                append_crc_a(&mut reply);
                Response::Frame(reply)
            }
            _ => {
                debug!(
                    "Anticollision/select frame {:02X?} not expected at step {}",
                    frame, step
                );
                Response::Silent
            }
        }
    }

    fn cmd_halt(&mut self) -> Response {
        debug!("HALT");
        self.session = Session {
            backdoor: Backdoor::Armed,
            ..Session::default()
        };
        Response::Silent
    }

    // ========================================================================
    // Memory access
    // ========================================================================

    /// Block number of a block-addressed command, if the frame is long
    /// enough and the session authenticated
    fn authenticated_block(&self, frame: &[u8]) -> Option<u8> {
        let block = *frame.get(1)?;
        if !self.session.authenticated {
            debug!("Block {} access without authentication", block);
            return None;
        }
        if block as usize >= BLOCKS {
            debug!("Block {} out of range", block);
            return None;
        }
        Some(block)
    }

    fn cmd_read(&mut self, frame: &[u8]) -> Response {
        let Some(data) = self
            .authenticated_block(frame)
            .and_then(|block| self.card.block(block))
        else {
            return Response::Silent;
        };

        let mut reply = data.to_vec();
        append_crc_a(&mut reply);
        Response::Frame(reply)
    }

    fn cmd_write(&mut self, frame: &[u8]) -> Response {
        let Some(&block) = frame.get(1) else {
            return Response::Silent;
        };

        if block == 0 && self.session.backdoor_unlocked {
            debug!("Backdoor write to block 0");
            self.session.backdoor_unlocked = false;
            self.session.pending_write = Some(block);
            return Response::Ack;
        }

        match self.authenticated_block(frame) {
            Some(block) => {
                self.session.pending_write = Some(block);
                Response::Ack
            }
            None => Response::Silent,
        }
    }

    fn write_data(&mut self, block: u8, frame: &[u8]) -> Response {
        let mut data: Block = [0; BLOCK_SIZE];
        data.copy_from_slice(&frame[..BLOCK_SIZE]);
        debug!("WRITE block {}: {:02X?}", block, data);

        if self.card.write_block(block, &data) {
            Response::Ack
        } else {
            Response::Silent
        }
    }

    fn cmd_ultralight_write(&mut self, frame: &[u8]) -> Response {
        if frame.len() < 2 + PAGE_SIZE {
            return Response::Silent;
        }
        let page = frame[1];
        if !(FIRST_WRITABLE_PAGE..PAGE_LIMIT).contains(&page) {
            debug!("Ultralight WRITE to protected page {}", page);
            return Response::Silent;
        }

        let mut data = [0u8; PAGE_SIZE];
        data.copy_from_slice(&frame[2..2 + PAGE_SIZE]);
        debug!("Ultralight WRITE page {}: {:02X?}", page, data);
        self.card.write_page(page, &data);
        Response::Ack
    }

    // ========================================================================
    // Value blocks
    // ========================================================================

    fn cmd_value(&mut self, op: ValueOp, frame: &[u8]) -> Response {
        let Some(block) = self.authenticated_block(frame) else {
            return Response::Silent;
        };

        match op {
            ValueOp::Restore => {
                if let Some(data) = self.card.block(block) {
                    self.card.set_scratch(data);
                }
            }
            ValueOp::Transfer => {
                debug!("TRANSFER into block {}", block);
                let data = self.card.scratch();
                self.card.write_block(block, &data);
            }
            ValueOp::Increment | ValueOp::Decrement => {}
        }

        self.session.pending_two_step = Some((op, block));
        Response::Ack
    }

    fn value_operand(&mut self, op: ValueOp, block: u8, frame: &[u8]) -> Response {
        let delta = i32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        debug!("{:?} block {} operand {}", op, block, delta);

        let result = match op {
            ValueOp::Increment | ValueOp::Decrement => {
                let Some(data) = self.card.block(block) else {
                    return Response::Silent;
                };
                if !ValueBlock::is_consistent(&data) {
                    warn!(
                        "Block {} is not a well formed value block: {:02X?}",
                        block, data
                    );
                }
                let current = ValueBlock::decode(&data);
                let value = if op == ValueOp::Increment {
                    current.value.wrapping_add(delta)
                } else {
                    current.value.wrapping_sub(delta)
                };
                ValueBlock::new(value, block)
            }
            ValueOp::Restore | ValueOp::Transfer => return Response::Ack,
        };

        let encoded = result.encode();
        self.card.set_scratch(encoded);
        self.card.write_block(block, &encoded);
        Response::Ack
    }

    // ========================================================================
    // Magic card backdoor
    // ========================================================================

    fn cmd_backdoor_unlock_1(&mut self) -> Response {
        if self.session.backdoor != Backdoor::Armed {
            self.session.backdoor = Backdoor::Idle;
            return Response::Silent;
        }
        self.session.backdoor = Backdoor::FirstStep;
        Response::Ack
    }

    fn cmd_backdoor_unlock_2(&mut self) -> Response {
        if self.session.backdoor != Backdoor::FirstStep {
            self.session.backdoor = Backdoor::Idle;
            return Response::Silent;
        }
        debug!("Block 0 unlocked");
        self.session.backdoor = Backdoor::Idle;
        self.session.backdoor_unlocked = true;
        Response::Ack
    }
}
