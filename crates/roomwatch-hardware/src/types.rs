//! Common types shared across input and indicator implementations.

use roomwatch_core::ChannelKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logic level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[inline]
    #[must_use]
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    /// Level for a logical state, honoring active-low wiring.
    #[must_use]
    pub fn for_state(active: bool, active_low: bool) -> Self {
        if active != active_low {
            Level::High
        } else {
            Level::Low
        }
    }

    /// Logical state of this level, honoring active-low wiring.
    #[inline]
    #[must_use]
    pub fn is_active(self, active_low: bool) -> bool {
        self.is_high() != active_low
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Level::Low => f.write_str("0"),
            Level::High => f.write_str("1"),
        }
    }
}

/// Metadata about a sensor and its wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "PIR motion sensor").
    pub name: String,

    pub kind: ChannelKind,

    /// Input pin, if the sensor is GPIO-backed.
    pub pin: Option<u32>,

    /// Indicator LED pin.
    pub led_pin: Option<u32>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            pin: None,
            led_pin: None,
        }
    }

    /// Set the input pin.
    pub fn with_pin(mut self, pin: u32) -> Self {
        self.pin = Some(pin);
        self
    }

    /// Set the indicator LED pin.
    pub fn with_led_pin(mut self, led_pin: Option<u32>) -> Self {
        self.led_pin = led_pin;
        self
    }
}
