//! Frame construction for PICC commands and SPI register access.

use crate::crc;
use crate::error::FrameError;
use crate::registers::{PiccCommand, Register};
use bytes::{BufMut, Bytes, BytesMut};

/// Payload length of a MIFARE data block.
pub const BLOCK_SIZE: usize = 16;

/// Number of bytes in a MIFARE Classic sector key.
pub const KEY_SIZE: usize = 6;

/// NVB byte of a cascade-level-1 anti-collision request (2 valid bytes).
pub const NVB_ANTICOLL: u8 = 0x20;

/// NVB byte of a cascade-level-1 SELECT (7 valid bytes).
pub const NVB_SELECT: u8 = 0x70;

/// An over-the-air frame ready to be loaded into the FIFO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Payload layout each command accepts: the length and whether CRC_A
/// follows it.
fn layouts(command: PiccCommand) -> &'static [(usize, bool)] {
    match command {
        PiccCommand::ReqIdl | PiccCommand::ReqAll => &[(0, false)],
        // NVB only for anti-collision, NVB + UID + BCC for SELECT.
        PiccCommand::AntiColl => &[(1, false), (6, true)],
        // block address + key + 4 UID bytes
        PiccCommand::Auth1A | PiccCommand::Auth1B => &[(1 + KEY_SIZE + 4, false)],
        PiccCommand::Read
        | PiccCommand::Write
        | PiccCommand::Decrement
        | PiccCommand::Increment
        | PiccCommand::Restore
        | PiccCommand::Transfer
        | PiccCommand::Halt => &[(1, true)],
    }
}

/// Build `command + payload`, appending CRC_A where the command requires it.
///
/// # Errors
/// Returns [`FrameError::InvalidFrame`] when the payload length does not
/// match any layout the command accepts.
///
/// # Examples
///
/// ```
/// use roomwatch_rfid::{PiccCommand, frame};
///
/// let halt = frame::build_frame(PiccCommand::Halt, &[0x00]).unwrap();
/// assert_eq!(halt.as_bytes(), &[0x50, 0x00, 0x57, 0xCD]);
///
/// let request = frame::build_frame(PiccCommand::ReqIdl, &[]).unwrap();
/// assert_eq!(request.as_bytes(), &[0x26]);
///
/// assert!(frame::build_frame(PiccCommand::Read, &[0x04, 0x05]).is_err());
/// ```
pub fn build_frame(command: PiccCommand, payload: &[u8]) -> Result<Frame, FrameError> {
    let accepted = layouts(command);
    let Some(&(_, with_crc)) = accepted.iter().find(|(len, _)| *len == payload.len()) else {
        return Err(FrameError::InvalidFrame {
            command: command.code(),
            expected: accepted[0].0,
            actual: payload.len(),
        });
    };

    let mut buf = BytesMut::with_capacity(1 + payload.len() + 2);
    buf.put_u8(command.code());
    buf.put_slice(payload);
    if with_crc {
        let checksum = crc::compute(&buf);
        buf.put_slice(&checksum);
    }
    Ok(Frame {
        bytes: buf.freeze(),
    })
}

/// Second phase of a WRITE: the 16 data bytes followed by their CRC.
///
/// # Errors
/// Returns [`FrameError::InvalidFrame`] unless `block` is exactly 16 bytes.
pub fn build_data_frame(block: &[u8]) -> Result<Frame, FrameError> {
    if block.len() != BLOCK_SIZE {
        return Err(FrameError::InvalidFrame {
            command: PiccCommand::Write.code(),
            expected: BLOCK_SIZE,
            actual: block.len(),
        });
    }
    Ok(Frame {
        bytes: Bytes::from(crc::append(block)),
    })
}

/// SPI address byte for `reg`.
#[inline]
#[must_use]
pub fn address_byte(reg: Register, read: bool) -> u8 {
    let addr = (reg.addr() << 1) & 0x7E;
    if read { addr | 0x80 } else { addr }
}

/// Two-byte SPI frame writing `value` to `reg`.
#[must_use]
pub fn register_write(reg: Register, value: u8) -> [u8; 2] {
    [address_byte(reg, false), value]
}

/// Two-byte SPI frame reading `reg`; the value is clocked out in byte 1.
#[must_use]
pub fn register_read(reg: Register) -> [u8; 2] {
    [address_byte(reg, true), 0x00]
}
