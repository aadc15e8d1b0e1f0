//! MFRC522 contactless card reader support.
//!
//! This crate contains the wire-level pieces of the card reader:
//!
//! - [`crc`]: ISO 14443-A CRC_A
//! - [`frame`]: PICC command frames and SPI register frames
//! - [`bus`]: the [`SpiBus`] transport, provided by any `embedded-hal`
//!   `SpiDevice`
//! - [`driver`]: the [`Mfrc522`] state machine
//! - [`mock`]: a simulated chip with a controllable card field
//! - `spidev`: the chip on a Linux spidev node (Linux only)
//!
//! The driver is synchronous. Async callers move it onto the blocking pool
//! for each poll.

pub mod bus;
pub mod crc;
pub mod driver;
pub mod error;
pub mod frame;
pub mod mock;
pub mod registers;
#[cfg(target_os = "linux")]
pub mod spidev;

pub use bus::SpiBus;
pub use driver::{
    MAX_CRC_POLLS, MAX_IRQ_POLLS, Mfrc522, ReaderSession, ReaderState, Response, Status,
};
pub use error::{BusError, Fault, FrameError, ReaderError, Result};
pub use frame::{Frame, build_data_frame, build_frame};
pub use registers::{AuthMode, PcdCommand, PiccCommand, Register, RequestMode};
