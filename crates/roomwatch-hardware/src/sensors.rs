//! Motion and contact sensor handles.
//!
//! A sensor pairs an input line with an optional indicator LED that follows
//! the sensor state: lit while motion is present, or while the door or
//! window is open. Indicator failures are logged and otherwise ignored so a
//! broken LED never takes a channel down.

use crate::devices::{AnyIndicator, AnyInput};
use crate::error::{HardwareError, Result};
use crate::traits::{DigitalInput, Indicator, SensorHandle};
use crate::types::DeviceInfo;
use roomwatch_core::ChannelKind;
use tracing::warn;

fn drive_led(led: Option<&mut AnyIndicator>, on: bool, name: &str) {
    if let Some(led) = led
        && let Err(err) = led.set(on)
    {
        warn!(sensor = name, error = %err, "Failed to drive indicator LED");
    }
}

fn blink(led: Option<&mut AnyIndicator>, name: &str) {
    if let Some(led) = led {
        drive_led(Some(&mut *led), true, name);
        drive_led(Some(led), false, name);
    }
}

/// PIR motion sensor.
#[derive(Debug)]
pub struct MotionSensor {
    input: AnyInput,
    led: Option<AnyIndicator>,
    active_low: bool,
    info: DeviceInfo,
}

impl MotionSensor {
    pub fn new(input: AnyInput, led: Option<AnyIndicator>) -> Self {
        Self {
            input,
            led,
            active_low: false,
            info: DeviceInfo::new("PIR motion sensor", ChannelKind::Motion),
        }
    }

    /// Treat a low level as motion.
    #[must_use]
    pub fn with_active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    #[must_use]
    pub fn with_info(mut self, info: DeviceInfo) -> Self {
        self.info = info;
        self
    }
}

impl SensorHandle for MotionSensor {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Motion
    }

    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn check_state(&mut self) -> Result<bool> {
        let motion = self.input.read_level()?.is_active(self.active_low);
        drive_led(self.led.as_mut(), motion, &self.info.name);
        Ok(motion)
    }

    fn self_test(&mut self) -> Result<()> {
        self.input.read_level()?;
        blink(self.led.as_mut(), &self.info.name);
        Ok(())
    }
}

/// Magnetic reed switch on a door or window.
///
/// With the usual pull-up wiring the line reads high while the magnet is
/// away, i.e. while the door or window is open.
#[derive(Debug)]
pub struct ContactSensor {
    kind: ChannelKind,
    input: AnyInput,
    led: Option<AnyIndicator>,
    active_low: bool,
    info: DeviceInfo,
}

impl ContactSensor {
    /// Create a contact sensor for a door or window channel.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for non-contact channel kinds.
    pub fn new(kind: ChannelKind, input: AnyInput, led: Option<AnyIndicator>) -> Result<Self> {
        if !kind.is_contact() {
            return Err(HardwareError::configuration(format!(
                "{kind} is not a contact channel"
            )));
        }
        Ok(Self::build(kind, input, led))
    }

    pub fn door(input: AnyInput, led: Option<AnyIndicator>) -> Self {
        Self::build(ChannelKind::Door, input, led)
    }

    pub fn window(input: AnyInput, led: Option<AnyIndicator>) -> Self {
        Self::build(ChannelKind::Window, input, led)
    }

    fn build(kind: ChannelKind, input: AnyInput, led: Option<AnyIndicator>) -> Self {
        let name = if kind == ChannelKind::Door {
            "Door reed switch"
        } else {
            "Window reed switch"
        };
        Self {
            kind,
            input,
            led,
            active_low: false,
            info: DeviceInfo::new(name, kind),
        }
    }

    /// Treat a low level as open.
    #[must_use]
    pub fn with_active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    #[must_use]
    pub fn with_info(mut self, info: DeviceInfo) -> Self {
        self.info = info;
        self
    }
}

impl SensorHandle for ContactSensor {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn check_state(&mut self) -> Result<bool> {
        let open = self.input.read_level()?.is_active(self.active_low);
        drive_led(self.led.as_mut(), open, &self.info.name);
        Ok(open)
    }

    fn self_test(&mut self) -> Result<()> {
        self.input.read_level()?;
        blink(self.led.as_mut(), &self.info.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockIndicator, MockIndicatorHandle, MockInput, MockInputHandle};

    fn wired() -> (AnyInput, MockInputHandle, AnyIndicator, MockIndicatorHandle) {
        let (input, input_handle) = MockInput::new();
        let (led, led_handle) = MockIndicator::new();
        (
            AnyInput::Mock(input),
            input_handle,
            AnyIndicator::Mock(led),
            led_handle,
        )
    }

    #[test]
    fn test_motion_led_follows_state() {
        let (input, line, led, lamp) = wired();
        let mut sensor = MotionSensor::new(input, Some(led));

        assert!(!sensor.check_state().unwrap());
        assert!(!lamp.is_on());

        line.set_active(true);
        assert!(sensor.check_state().unwrap());
        assert!(lamp.is_on());

        line.set_active(false);
        assert!(!sensor.check_state().unwrap());
        assert!(!lamp.is_on());
    }

    #[test]
    fn test_active_low_contact() {
        let (input, line, led, lamp) = wired();
        let mut door = ContactSensor::door(input, Some(led)).with_active_low(true);

        // Low level means open with active-low wiring.
        assert!(door.check_state().unwrap());
        assert!(lamp.is_on());

        line.set_active(true);
        assert!(!door.check_state().unwrap());
        assert!(!lamp.is_on());
    }

    #[test]
    fn test_led_failure_is_ignored() {
        let (input, line, led, lamp) = wired();
        let mut window = ContactSensor::window(input, Some(led));
        lamp.set_failing(true);
        line.set_active(true);
        assert!(window.check_state().unwrap());
    }

    #[test]
    fn test_read_failure_propagates() {
        let (input, line, _led, _lamp) = wired();
        let mut sensor = MotionSensor::new(input, None);
        line.inject_failures(1);
        assert!(sensor.check_state().is_err());
        assert!(sensor.check_state().is_ok());
    }

    #[test]
    fn test_contact_kind_validation() {
        let (input, _line, _led, _lamp) = wired();
        assert!(ContactSensor::new(ChannelKind::Motion, input, None).is_err());

        let (input, _line, _led, _lamp) = wired();
        let sensor = ContactSensor::new(ChannelKind::Window, input, None).unwrap();
        assert_eq!(sensor.kind(), ChannelKind::Window);
        assert_eq!(sensor.info().name, "Window reed switch");
    }

    #[test]
    fn test_self_test_blinks_led() {
        let (input, _line, led, lamp) = wired();
        let mut sensor = MotionSensor::new(input, Some(led));
        sensor.self_test().unwrap();
        assert_eq!(lamp.switch_count(), 2);
        assert!(!lamp.is_on());
    }
}
