//! Sensor and indicator abstraction layer for the roomwatch node.
//!
//! This crate provides the physical side of the motion, door and window
//! channels:
//!
//! - [`traits`]: [`DigitalInput`], [`Indicator`] and [`SensorHandle`]
//! - [`sensors`]: [`MotionSensor`] and [`ContactSensor`], each with an
//!   optional indicator LED that follows the sensor state
//! - [`mock`]: programmable inputs and LEDs for tests and simulation
//! - `cdev`: lines requested from `/dev/gpiochipN` (Linux only)
//! - [`devices`]: enum wrappers selecting a backend at runtime
//!
//! # Example
//!
//! ```
//! use roomwatch_hardware::devices::{AnyInput, AnySensor};
//! use roomwatch_hardware::mock::MockInput;
//! use roomwatch_hardware::sensors::MotionSensor;
//! use roomwatch_hardware::{Result, SensorHandle};
//!
//! fn poll<S: SensorHandle>(sensor: &mut S) -> Result<bool> {
//!     sensor.check_state()
//! }
//!
//! let (input, handle) = MockInput::new();
//! let mut pir = AnySensor::Motion(MotionSensor::new(AnyInput::Mock(input), None));
//! assert!(!poll(&mut pir).unwrap());
//! handle.set_active(true);
//! assert!(poll(&mut pir).unwrap());
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] using
//! [`HardwareError`]. Indicator failures inside a sensor are logged and
//! swallowed; only input failures reach the caller.

#[cfg(target_os = "linux")]
pub mod cdev;
pub mod devices;
pub mod error;
pub mod mock;
pub mod sensors;
pub mod traits;
pub mod types;

pub use devices::{AnyIndicator, AnyInput, AnySensor};
pub use error::{HardwareError, Result};
pub use sensors::{ContactSensor, MotionSensor};
pub use traits::{DigitalInput, Indicator, SensorHandle};
pub use types::{DeviceInfo, Level};
