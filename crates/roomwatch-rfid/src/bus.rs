//! Synchronous serial bus abstraction.
//!
//! The driver talks to the chip through [`SpiBus`], which every
//! `embedded-hal` [`SpiDevice`] provides: each register frame is one
//! chip-select-framed in-place transfer. On Linux that device is a spidev
//! node (see [`spidev`](crate::spidev)); in tests it is the
//! [`SimulatedMfrc522`](crate::mock::SimulatedMfrc522).

use crate::error::BusError;
use embedded_hal::spi::SpiDevice;

/// Full-duplex SPI transport to the reader chip.
///
/// `transfer` clocks `buf` out and replaces it in place with the bytes
/// clocked in. Implementations block for the duration of the transfer, so
/// async callers must run the driver on a blocking thread.
pub trait SpiBus: Send {
    /// Exchange `buf` with the device.
    ///
    /// # Errors
    /// Returns [`BusError`] if the transfer could not be completed.
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), BusError>;
}

impl<D> SpiBus for D
where
    D: SpiDevice + Send,
    D::Error: Into<BusError>,
{
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        self.transfer_in_place(buf).map_err(Into::into)
    }
}
