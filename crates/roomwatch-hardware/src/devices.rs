//! Enum wrappers for device dispatch.
//!
//! Each channel worker owns exactly one concrete sensor. The enums here let
//! the orchestrator store mock and GPIO-chip-backed devices side by side without
//! boxing, and keep the set of supported backends explicit.
//!
//! # Examples
//!
//! ```
//! use roomwatch_hardware::devices::{AnyInput, AnySensor};
//! use roomwatch_hardware::mock::MockInput;
//! use roomwatch_hardware::sensors::ContactSensor;
//! use roomwatch_hardware::traits::SensorHandle;
//!
//! let (input, handle) = MockInput::new();
//! let mut door = AnySensor::Contact(ContactSensor::door(AnyInput::Mock(input), None));
//!
//! handle.set_active(true);
//! assert!(door.check_state().unwrap());
//! ```

use crate::error::Result;
use crate::mock::{MockIndicator, MockInput};
use crate::sensors::{ContactSensor, MotionSensor};
#[cfg(target_os = "linux")]
use crate::cdev::{CdevInput, CdevOutput};
use crate::traits::{DigitalInput, Indicator, SensorHandle};
use crate::types::{DeviceInfo, Level};
use roomwatch_core::ChannelKind;
use roomwatch_core::config::InputConfig;

/// Enum wrapper for input line dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyInput {
    /// Mock input for development and testing.
    Mock(MockInput),
    /// Line requested from a GPIO character device.
    #[cfg(target_os = "linux")]
    Cdev(CdevInput),
}

impl DigitalInput for AnyInput {
    fn read_level(&mut self) -> Result<Level> {
        match self {
            Self::Mock(device) => device.read_level(),
            #[cfg(target_os = "linux")]
            Self::Cdev(device) => device.read_level(),
        }
    }
}

/// Enum wrapper for indicator dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyIndicator {
    Mock(MockIndicator),
    #[cfg(target_os = "linux")]
    Cdev(CdevOutput),
}

impl Indicator for AnyIndicator {
    fn set(&mut self, on: bool) -> Result<()> {
        match self {
            Self::Mock(device) => device.set(on),
            #[cfg(target_os = "linux")]
            Self::Cdev(device) => device.set(on),
        }
    }
}

/// Enum wrapper for sensor dispatch.
#[derive(Debug)]
pub enum AnySensor {
    Motion(MotionSensor),
    Contact(ContactSensor),
}

impl AnySensor {
    /// Open a sensor for `kind` on the GPIO chip at `chip_path`, wired as in
    /// `config`. The indicator LED starts off.
    ///
    /// # Errors
    ///
    /// Returns an error if a line cannot be requested, or if `kind` is the
    /// card reader.
    #[cfg(target_os = "linux")]
    pub fn open_cdev(chip_path: &str, kind: ChannelKind, config: &InputConfig) -> Result<Self> {
        let input = AnyInput::Cdev(CdevInput::open(chip_path, config.pin)?);
        let led = config
            .led_pin
            .map(|pin| CdevOutput::open(chip_path, pin, Level::Low).map(AnyIndicator::Cdev))
            .transpose()?;
        Self::assemble(kind, config, input, led)
    }

    /// Build a sensor for `kind` from already opened lines.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `kind` is the card reader.
    pub fn assemble(
        kind: ChannelKind,
        config: &InputConfig,
        input: AnyInput,
        led: Option<AnyIndicator>,
    ) -> Result<Self> {
        let sensor = match kind {
            ChannelKind::Motion => {
                let sensor = MotionSensor::new(input, led).with_active_low(config.active_low);
                let info = sensor.info().with_pin(config.pin).with_led_pin(config.led_pin);
                AnySensor::Motion(sensor.with_info(info))
            }
            _ => {
                let sensor = ContactSensor::new(kind, input, led)?.with_active_low(config.active_low);
                let info = sensor.info().with_pin(config.pin).with_led_pin(config.led_pin);
                AnySensor::Contact(sensor.with_info(info))
            }
        };
        Ok(sensor)
    }
}

impl SensorHandle for AnySensor {
    fn kind(&self) -> ChannelKind {
        match self {
            Self::Motion(sensor) => sensor.kind(),
            Self::Contact(sensor) => sensor.kind(),
        }
    }

    fn info(&self) -> DeviceInfo {
        match self {
            Self::Motion(sensor) => sensor.info(),
            Self::Contact(sensor) => sensor.info(),
        }
    }

    fn check_state(&mut self) -> Result<bool> {
        match self {
            Self::Motion(sensor) => sensor.check_state(),
            Self::Contact(sensor) => sensor.check_state(),
        }
    }

    fn self_test(&mut self) -> Result<()> {
        match self {
            Self::Motion(sensor) => sensor.self_test(),
            Self::Contact(sensor) => sensor.self_test(),
        }
    }
}
