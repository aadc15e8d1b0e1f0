//! Error and status types for the card reader.
//!
//! Two layers are kept apart here. [`Fault`] is the status code carried by
//! [`Status::Error`](crate::Status::Error) on the low-level operations; most
//! faults (bad CRC, NACK, failed authentication) are expected outcomes of
//! talking to a card over the air. [`ReaderError`] is what actually
//! propagates out of [`read_card`](crate::Mfrc522::read_card), and only for
//! hardware problems.

use std::fmt;

/// Failure on the SPI transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("SPI transfer failed: {message}")]
    Transfer { message: String },

    #[error("SPI device not available: {device}")]
    Unavailable { device: String },
}

impl embedded_hal::spi::Error for BusError {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}

#[cfg(target_os = "linux")]
impl From<linux_embedded_hal::SPIError> for BusError {
    fn from(err: linux_embedded_hal::SPIError) -> Self {
        BusError::transfer(format!("{err:?}"))
    }
}

impl BusError {
    pub fn transfer(message: impl Into<String>) -> Self {
        Self::Transfer {
            message: message.into(),
        }
    }

    pub fn unavailable(device: impl Into<String>) -> Self {
        Self::Unavailable {
            device: device.into(),
        }
    }
}

/// Frame could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Invalid frame for {command:#04x}: expected {expected} payload bytes, got {actual}")]
    InvalidFrame {
        command: u8,
        expected: usize,
        actual: usize,
    },
}

/// Outcome code of a failed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The SPI transfer itself failed.
    Bus(BusError),
    /// An IRQ or CRC poll hit its iteration ceiling.
    Timeout,
    /// `ErrorReg` reported a protocol, parity, collision or overflow error.
    Protocol(u8),
    /// Reply length differs from what the command requires.
    BadLength { expected: usize, actual: usize },
    /// Reply CRC did not verify.
    Crc,
    /// Card answered with a NACK nibble.
    Nack(u8),
    /// Crypto1 did not come up after MFAuthent.
    AuthFailed,
}

impl Fault {
    /// Faults that indicate the reader hardware itself is unhealthy.
    #[must_use]
    pub fn is_hardware(&self) -> bool {
        matches!(self, Fault::Bus(_) | Fault::Timeout)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Bus(err) => write!(f, "bus: {err}"),
            Fault::Timeout => f.write_str("timeout"),
            Fault::Protocol(bits) => write!(f, "protocol error (ErrorReg={bits:#04x})"),
            Fault::BadLength { expected, actual } => {
                write!(f, "bad length (expected {expected}, got {actual})")
            }
            Fault::Crc => f.write_str("CRC mismatch"),
            Fault::Nack(code) => write!(f, "NACK {code:#03x}"),
            Fault::AuthFailed => f.write_str("authentication failed"),
        }
    }
}

impl From<BusError> for Fault {
    fn from(err: BusError) -> Self {
        Fault::Bus(err)
    }
}

/// Hardware failure surfaced by [`read_card`](crate::Mfrc522::read_card).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReaderError {
    #[error("Card reader bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Card reader did not complete a command before the poll ceiling")]
    Timeout,

    #[error("Unexpected card reader version: {0:#04x}")]
    UnexpectedVersion(u8),

    #[error("Card reader self-test failed: {0}")]
    SelfTest(String),
}

impl ReaderError {
    /// Convert a status fault into an error if it is a hardware fault.
    #[must_use]
    pub fn from_fault(fault: &Fault) -> Option<Self> {
        match fault {
            Fault::Bus(err) => Some(ReaderError::Bus(err.clone())),
            Fault::Timeout => Some(ReaderError::Timeout),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_display() {
        let error = BusError::transfer("EIO");
        assert_eq!(error.to_string(), "SPI transfer failed: EIO");
    }

    #[test]
    fn test_frame_error_display() {
        let error = FrameError::InvalidFrame {
            command: 0x30,
            expected: 1,
            actual: 3,
        };
        assert_eq!(
            error.to_string(),
            "Invalid frame for 0x30: expected 1 payload bytes, got 3"
        );
    }

    #[test]
    fn test_fault_classification() {
        assert!(Fault::Timeout.is_hardware());
        assert!(Fault::Bus(BusError::transfer("x")).is_hardware());
        assert!(!Fault::AuthFailed.is_hardware());
        assert!(!Fault::Nack(0x04).is_hardware());
        assert!(!Fault::Crc.is_hardware());
    }

    #[test]
    fn test_reader_error_from_fault() {
        assert_eq!(ReaderError::from_fault(&Fault::Timeout), Some(ReaderError::Timeout));
        assert_eq!(ReaderError::from_fault(&Fault::Crc), None);
    }

    #[test]
    fn test_reader_error_from_bus() {
        let error: ReaderError = BusError::unavailable("/dev/spidev0.0").into();
        assert_eq!(
            error.to_string(),
            "Card reader bus error: SPI device not available: /dev/spidev0.0"
        );
    }
}
