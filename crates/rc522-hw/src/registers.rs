//! # References
//! - NXP MFRC522 datasheet, section 9 "MFRC522 registers"

/// Number of addressable registers (6-bit address space)
pub const COUNT: usize = 64;

/// Register addresses
pub mod addr {
    /// Starts and stops command execution
    pub const COMMAND: u8 = 0x01;
    /// Enable and disable interrupt request control bits
    pub const COM_IEN: u8 = 0x02;
    /// Enable and disable interrupt request control bits
    pub const DIV_IEN: u8 = 0x03;
    /// Interrupt request bits
    pub const COM_IRQ: u8 = 0x04;
    /// Interrupt request bits (CRC, MFIN)
    pub const DIV_IRQ: u8 = 0x05;
    /// Error bits showing the error status of the last command executed
    pub const ERROR: u8 = 0x06;
    /// Communication status bits
    pub const STATUS1: u8 = 0x07;
    /// Receiver and transmitter status bits
    pub const STATUS2: u8 = 0x08;
    /// Input and output of the 64 byte FIFO buffer
    pub const FIFO_DATA: u8 = 0x09;
    /// Number of bytes stored in the FIFO buffer
    pub const FIFO_LEVEL: u8 = 0x0A;
    /// Level for FIFO underflow and overflow warning
    pub const WATER_LEVEL: u8 = 0x0B;
    /// Miscellaneous control registers
    pub const CONTROL: u8 = 0x0C;
    /// Adjustments for bit-oriented frames
    pub const BIT_FRAMING: u8 = 0x0D;
    /// Bit position of the first bit-collision detected on the RF interface
    pub const COLL: u8 = 0x0E;

    /// Defines general modes for transmitting and receiving
    pub const MODE: u8 = 0x11;
    /// Defines transmission data rate and framing
    pub const TX_MODE: u8 = 0x12;
    /// Defines reception data rate and framing
    pub const RX_MODE: u8 = 0x13;
    /// Controls the logical behavior of the antenna driver pins
    pub const TX_CONTROL: u8 = 0x14;
    /// Controls the setting of the transmission modulation
    pub const TX_ASK: u8 = 0x15;
    /// Controls the MIFARE communication transmit and receive speed
    pub const MF_RX: u8 = 0x1C;

    /// CRC calculation result, MSB
    pub const CRC_RESULT_H: u8 = 0x21;
    /// CRC calculation result, LSB
    pub const CRC_RESULT_L: u8 = 0x22;
    /// Controls the ModWidth setting
    pub const MOD_WIDTH: u8 = 0x24;
    /// Configures the receiver gain
    pub const RF_CFG: u8 = 0x26;
    /// Defines settings for the internal timer
    pub const T_MODE: u8 = 0x2A;
    /// Timer prescaler, lower 8 bits
    pub const T_PRESCALER: u8 = 0x2B;
    /// Timer reload value, higher 8 bits
    pub const T_RELOAD_H: u8 = 0x2C;
    /// Timer reload value, lower 8 bits
    pub const T_RELOAD_L: u8 = 0x2D;

    /// Controls the digital self-test
    pub const AUTO_TEST: u8 = 0x36;
    /// Shows the software version
    pub const VERSION: u8 = 0x37;
}

/// Values of VersionReg
pub mod version {
    /// MFRC522 version 2.0
    pub const V2_0: u8 = 0x92;
}

/// CommandReg bits
pub mod command {
    /// Mask of the command code field
    pub const CODE_MASK: u8 = 0x0F;
    /// Soft power-down mode entered
    pub const POWER_DOWN: u8 = 0x10;
    /// Analog part of the receiver is switched off
    pub const RCV_OFF: u8 = 0x20;
}

/// PCD command codes written to CommandReg bits 0-3
///
/// Reference: datasheet section 10.3 "MFRC522 command overview"
pub mod pcd_command {
    pub const IDLE: u8 = 0x00;
    pub const MEM: u8 = 0x01;
    pub const GENERATE_RANDOM_ID: u8 = 0x02;
    pub const CALC_CRC: u8 = 0x03;
    pub const TRANSMIT: u8 = 0x04;
    pub const NO_CMD_CHANGE: u8 = 0x07;
    pub const RECEIVE: u8 = 0x08;
    pub const TRANSCEIVE: u8 = 0x0C;
    pub const MF_AUTHENT: u8 = 0x0E;
    pub const SOFT_RESET: u8 = 0x0F;
}

/// ComIrqReg bits
pub mod com_irq {
    /// Write: bits set in the value are set (1) or cleared (0)
    pub const SET1: u8 = 0x80;
    pub const TX: u8 = 0x40;
    pub const RX: u8 = 0x20;
    pub const IDLE: u8 = 0x10;
    pub const HI_ALERT: u8 = 0x08;
    pub const LO_ALERT: u8 = 0x04;
    pub const ERR: u8 = 0x02;
    pub const TIMER: u8 = 0x01;
    /// Mask written by drivers to clear every request bit
    pub const ALL: u8 = 0x7F;
}

/// DivIrqReg bits
pub mod div_irq {
    /// Write: bits set in the value are set (1) or cleared (0)
    pub const SET2: u8 = 0x80;
    pub const MFIN_ACT: u8 = 0x10;
    pub const CRC: u8 = 0x04;
}

/// ErrorReg bits
pub mod error {
    pub const WR_ERR: u8 = 0x80;
    pub const TEMP_ERR: u8 = 0x40;
    pub const BUFFER_OVFL: u8 = 0x10;
    pub const COLL_ERR: u8 = 0x08;
    pub const CRC_ERR: u8 = 0x04;
    pub const PARITY_ERR: u8 = 0x02;
    pub const PROTOCOL_ERR: u8 = 0x01;
}

/// Status2Reg bits
pub mod status2 {
    /// MIFARE Crypto1 unit is switched on (authenticated session)
    pub const MF_CRYPTO1_ON: u8 = 0x08;
}

/// FIFOLevelReg bits
pub mod fifo_level {
    /// Write: immediately clears the internal FIFO buffer
    pub const FLUSH_BUFFER: u8 = 0x80;
    /// Mask of the level field
    pub const LEVEL_MASK: u8 = 0x7F;
}

/// ControlReg bits
pub mod control {
    /// Number of valid bits in the last received byte (0 = whole byte)
    pub const RX_LAST_BITS_MASK: u8 = 0x07;
}

/// TModeReg bits
pub mod t_mode {
    /// Timer starts automatically at the end of the transmission
    pub const T_AUTO: u8 = 0x80;
}

/// AutoTestReg values
pub mod auto_test {
    /// Enables the digital self-test when written to AutoTestReg
    pub const SELF_TEST: u8 = 0x09;
}

/// Power-on values of registers with a non-zero reset value
///
/// Reference: datasheet section 9.3, reset values column
pub const RESET_VALUES: &[(u8, u8)] = &[
    (addr::COM_IEN, 0x80),
    (addr::WATER_LEVEL, 0x08),
    (addr::CONTROL, 0x10),
    (addr::MODE, 0x3F),
    (addr::TX_CONTROL, 0x80),
    (addr::CRC_RESULT_H, 0xFF),
    (addr::CRC_RESULT_L, 0xFF),
    (addr::MOD_WIDTH, 0x26),
    (addr::RF_CFG, 0x48),
    (addr::AUTO_TEST, 0x40),
];
