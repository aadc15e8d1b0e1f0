//! Hardware device trait definitions.
//!
//! These traits are the seam between the polling loops and the physical
//! lines. Each one has a mock implementation in [`mock`](crate::mock) and a
//! GPIO character device implementation in `cdev` on Linux; the enum
//! wrappers in [`devices`](crate::devices) select between them at runtime.
//!
//! All operations are synchronous. Implementations must not wait on the
//! line: a read returns the current level from one non-blocking syscall, so
//! async workers call it inline rather than through the blocking pool.

use crate::error::Result;
use crate::types::{DeviceInfo, Level};
use roomwatch_core::ChannelKind;

/// A digital input line.
pub trait DigitalInput: Send {
    /// Sample the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be read, e.g. the pin is not
    /// exported or the device is gone.
    fn read_level(&mut self) -> Result<Level>;
}

/// An on/off indicator such as a status LED.
pub trait Indicator: Send {
    /// Switch the indicator.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be driven.
    fn set(&mut self, on: bool) -> Result<()>;
}

/// A sensor polled by one channel worker.
///
/// # Examples
///
/// ```
/// use roomwatch_hardware::devices::{AnyIndicator, AnyInput};
/// use roomwatch_hardware::mock::{MockIndicator, MockInput};
/// use roomwatch_hardware::sensors::MotionSensor;
/// use roomwatch_hardware::traits::SensorHandle;
///
/// let (input, handle) = MockInput::new();
/// let (led, led_handle) = MockIndicator::new();
/// let mut sensor = MotionSensor::new(AnyInput::Mock(input), Some(AnyIndicator::Mock(led)));
///
/// handle.set_active(true);
/// assert!(sensor.check_state().unwrap());
/// assert!(led_handle.is_on());
/// ```
pub trait SensorHandle: Send {
    /// Channel kind this sensor feeds.
    fn kind(&self) -> ChannelKind;

    /// Static metadata.
    fn info(&self) -> DeviceInfo;

    /// Read the logical state: motion present, or door/window open.
    ///
    /// # Errors
    ///
    /// Returns an error if the input could not be read. Indicator failures
    /// are logged and never returned.
    fn check_state(&mut self) -> Result<bool>;

    /// Exercise the input and indicator once.
    ///
    /// # Errors
    ///
    /// Returns an error if the input could not be read.
    fn self_test(&mut self) -> Result<()>;
}
