//! MFRC522 register map and command codes.

/// PCD registers touched by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    Command = 0x01,
    CommIEn = 0x02,
    DivIEn = 0x03,
    CommIrq = 0x04,
    DivIrq = 0x05,
    Error = 0x06,
    Status1 = 0x07,
    Status2 = 0x08,
    FifoData = 0x09,
    FifoLevel = 0x0A,
    Control = 0x0C,
    BitFraming = 0x0D,
    Mode = 0x11,
    TxControl = 0x14,
    TxAuto = 0x15,
    CrcResultH = 0x21,
    CrcResultL = 0x22,
    TMode = 0x2A,
    TPrescaler = 0x2B,
    TReloadH = 0x2C,
    TReloadL = 0x2D,
    Version = 0x37,
}

impl Register {
    #[inline]
    #[must_use]
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

/// Commands written to `CommandReg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PcdCommand {
    Idle = 0x00,
    CalcCrc = 0x03,
    Transmit = 0x04,
    Receive = 0x08,
    Transceive = 0x0C,
    MfAuthent = 0x0E,
    SoftReset = 0x0F,
}

impl PcdCommand {
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode the low nibble of `CommandReg`.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code & 0x0F {
            0x00 => Some(Self::Idle),
            0x03 => Some(Self::CalcCrc),
            0x04 => Some(Self::Transmit),
            0x08 => Some(Self::Receive),
            0x0C => Some(Self::Transceive),
            0x0E => Some(Self::MfAuthent),
            0x0F => Some(Self::SoftReset),
            _ => None,
        }
    }
}

/// Commands sent over the air to the card (PICC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PiccCommand {
    /// REQA: wake cards in IDLE state.
    ReqIdl = 0x26,
    /// WUPA: wake all cards, including HALTed ones.
    ReqAll = 0x52,
    /// Cascade level 1 anti-collision / select.
    AntiColl = 0x93,
    Auth1A = 0x60,
    Auth1B = 0x61,
    Read = 0x30,
    Write = 0xA0,
    Decrement = 0xC0,
    Increment = 0xC1,
    Restore = 0xC2,
    Transfer = 0xB0,
    Halt = 0x50,
}

impl PiccCommand {
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x26 => Some(Self::ReqIdl),
            0x52 => Some(Self::ReqAll),
            0x93 => Some(Self::AntiColl),
            0x60 => Some(Self::Auth1A),
            0x61 => Some(Self::Auth1B),
            0x30 => Some(Self::Read),
            0xA0 => Some(Self::Write),
            0xC0 => Some(Self::Decrement),
            0xC1 => Some(Self::Increment),
            0xC2 => Some(Self::Restore),
            0xB0 => Some(Self::Transfer),
            0x50 => Some(Self::Halt),
            _ => None,
        }
    }
}

/// Wake-up mode for [`Mfrc522::request`](crate::Mfrc522::request).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    #[default]
    Idle,
    All,
}

impl RequestMode {
    #[must_use]
    pub const fn command(self) -> PiccCommand {
        match self {
            RequestMode::Idle => PiccCommand::ReqIdl,
            RequestMode::All => PiccCommand::ReqAll,
        }
    }
}

/// Which sector key to authenticate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    KeyA,
    KeyB,
}

impl AuthMode {
    #[must_use]
    pub const fn command(self) -> PiccCommand {
        match self {
            AuthMode::KeyA => PiccCommand::Auth1A,
            AuthMode::KeyB => PiccCommand::Auth1B,
        }
    }
}

// Register bits.
pub(crate) const COMM_IRQ_SET1: u8 = 0x80;
pub(crate) const COMM_IRQ_TIMER: u8 = 0x01;
pub(crate) const COMM_IRQ_IDLE: u8 = 0x10;
pub(crate) const COMM_IRQ_RX: u8 = 0x20;
pub(crate) const COMM_IRQ_TX: u8 = 0x40;
pub(crate) const DIV_IRQ_CRC: u8 = 0x04;
pub(crate) const FIFO_FLUSH: u8 = 0x80;
pub(crate) const BIT_FRAMING_START_SEND: u8 = 0x80;
pub(crate) const STATUS2_CRYPTO1_ON: u8 = 0x08;
pub(crate) const CONTROL_RX_LAST_BITS: u8 = 0x07;
pub(crate) const TX_CONTROL_ANTENNA: u8 = 0x03;

/// `ErrorReg` bits that abort an exchange: BufferOvfl, ParityErr,
/// ProtocolErr and CollErr.
pub(crate) const ERROR_MASK: u8 = 0x1B;

/// MIFARE 4-bit ACK.
pub(crate) const MIFARE_ACK: u8 = 0x0A;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcd_command_decode() {
        assert_eq!(PcdCommand::from_code(0x0C), Some(PcdCommand::Transceive));
        assert_eq!(PcdCommand::from_code(0x2E), Some(PcdCommand::MfAuthent));
        assert_eq!(PcdCommand::from_code(0x01), None);
    }

    #[test]
    fn test_picc_command_roundtrip() {
        for cmd in [
            PiccCommand::ReqIdl,
            PiccCommand::AntiColl,
            PiccCommand::Auth1B,
            PiccCommand::Halt,
        ] {
            assert_eq!(PiccCommand::from_code(cmd.code()), Some(cmd));
        }
    }

    #[test]
    fn test_modes_map_to_commands() {
        assert_eq!(RequestMode::default().command(), PiccCommand::ReqIdl);
        assert_eq!(RequestMode::All.command(), PiccCommand::ReqAll);
        assert_eq!(AuthMode::KeyB.command().code(), 0x61);
    }
}
