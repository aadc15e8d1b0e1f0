//! Card reader on a Linux spidev node.

use crate::driver::Mfrc522;
use crate::error::{BusError, Result};
use linux_embedded_hal::SpidevDevice;
use linux_embedded_hal::spidev::{SpiModeFlags, Spidev, SpidevOptions};
use roomwatch_core::config::RfidConfig;
use tracing::info;

/// Open `/dev/spidevB.D` as configured, set mode 0 at the configured clock
/// and bring the chip up.
///
/// # Errors
///
/// Returns [`ReaderError::Bus`](crate::ReaderError::Bus) if the node cannot
/// be opened or configured, and the [`Mfrc522::init`] error if the chip does
/// not answer.
pub fn open(config: &RfidConfig) -> Result<Mfrc522<SpidevDevice>> {
    let path = config.spidev_path();
    let mut spi =
        Spidev::open(&path).map_err(|err| BusError::unavailable(format!("{path}: {err}")))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(config.speed_hz)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.configure(&options)
        .map_err(|err| BusError::unavailable(format!("{path}: {err}")))?;

    let mut reader = Mfrc522::new(SpidevDevice(spi));
    reader.init()?;
    info!(device = %path, speed_hz = config.speed_hz, "Card reader opened");
    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReaderError;

    #[test]
    fn test_missing_node_is_unavailable() {
        let config = RfidConfig {
            spi_bus: 250,
            spi_device: 7,
            ..RfidConfig::default()
        };
        let Err(err) = open(&config) else {
            panic!("no spidev node should exist for bus 250");
        };
        assert!(matches!(err, ReaderError::Bus(BusError::Unavailable { .. })));
        assert!(err.to_string().contains("/dev/spidev250.7"));
    }
}
