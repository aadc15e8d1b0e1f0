//! GPIO lines through the Linux character device (`/dev/gpiochipN`).
//!
//! Each line is requested once with `roomwatch` as consumer and held until
//! the handle is dropped, at which point the kernel releases it. Reading or
//! writing a requested line is a single ioctl that does not wait on the
//! line, so sensor workers call it inline.

use crate::error::{HardwareError, Result};
use crate::traits::{DigitalInput, Indicator};
use crate::types::Level;
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use std::fmt;
use tracing::debug;

const CONSUMER: &str = "roomwatch";

fn request(chip_path: &str, pin: u32, flags: LineRequestFlags, default: u8) -> Result<LineHandle> {
    let mut chip = Chip::new(chip_path)
        .map_err(|err| HardwareError::configuration(format!("{chip_path}: {err}")))?;
    let line = chip
        .get_line(pin)
        .map_err(|err| HardwareError::configuration(format!("{chip_path} line {pin}: {err}")))?;
    let handle = line
        .request(flags, default, CONSUMER)
        .map_err(|err| HardwareError::communication(format!("request line {pin}: {err}")))?;
    debug!(chip = chip_path, pin, "Requested GPIO line");
    Ok(handle)
}

/// Input line read through the character device.
pub struct CdevInput {
    pin: u32,
    handle: LineHandle,
}

impl CdevInput {
    /// Request `pin` on `chip_path` as an input.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the chip or line does not exist, and
    /// a communication error if the line is held by another consumer.
    pub fn open(chip_path: &str, pin: u32) -> Result<Self> {
        Ok(Self {
            pin,
            handle: request(chip_path, pin, LineRequestFlags::INPUT, 0)?,
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }
}

impl fmt::Debug for CdevInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdevInput").field("pin", &self.pin).finish()
    }
}

impl DigitalInput for CdevInput {
    fn read_level(&mut self) -> Result<Level> {
        match self.handle.get_value() {
            Ok(0) => Ok(Level::Low),
            Ok(1) => Ok(Level::High),
            Ok(other) => Err(HardwareError::invalid_data(format!(
                "GPIO {} returned {other}",
                self.pin
            ))),
            Err(err) => Err(HardwareError::communication(format!(
                "read GPIO {}: {err}",
                self.pin
            ))),
        }
    }
}

/// Output line driven through the character device.
pub struct CdevOutput {
    pin: u32,
    handle: LineHandle,
}

impl CdevOutput {
    /// Request `pin` on `chip_path` as an output starting at `initial`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the chip or line does not exist, and
    /// a communication error if the line is held by another consumer.
    pub fn open(chip_path: &str, pin: u32, initial: Level) -> Result<Self> {
        let default = u8::from(initial.is_high());
        Ok(Self {
            pin,
            handle: request(chip_path, pin, LineRequestFlags::OUTPUT, default)?,
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// Drive the line to `level`.
    ///
    /// # Errors
    ///
    /// Returns a communication error if the kernel rejects the write.
    pub fn write(&mut self, level: Level) -> Result<()> {
        self.handle
            .set_value(u8::from(level.is_high()))
            .map_err(|err| HardwareError::communication(format!("write GPIO {}: {err}", self.pin)))
    }
}

impl fmt::Debug for CdevOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdevOutput").field("pin", &self.pin).finish()
    }
}

impl Indicator for CdevOutput {
    fn set(&mut self, on: bool) -> Result<()> {
        self.write(Level::from(on))
    }
}
