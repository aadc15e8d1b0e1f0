//! Mock indicator output.

use crate::error::{HardwareError, Result};
use crate::traits::Indicator;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct OutputState {
    on: bool,
    switches: u64,
    failing: bool,
}

/// Mock LED that records its state.
#[derive(Debug)]
pub struct MockIndicator {
    state: Arc<Mutex<OutputState>>,
}

impl MockIndicator {
    /// Create an indicator that starts off.
    pub fn new() -> (Self, MockIndicatorHandle) {
        let state = Arc::new(Mutex::new(OutputState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockIndicatorHandle { state },
        )
    }
}

impl Indicator for MockIndicator {
    fn set(&mut self, on: bool) -> Result<()> {
        let mut state = self.state.lock();
        if state.failing {
            return Err(HardwareError::communication("indicator output stuck"));
        }
        if state.on != on {
            state.switches += 1;
        }
        state.on = on;
        Ok(())
    }
}

/// Handle for observing a [`MockIndicator`].
#[derive(Debug, Clone)]
pub struct MockIndicatorHandle {
    state: Arc<Mutex<OutputState>>,
}

impl MockIndicatorHandle {
    pub fn is_on(&self) -> bool {
        self.state.lock().on
    }

    /// Number of on/off transitions.
    pub fn switch_count(&self) -> u64 {
        self.state.lock().switches
    }

    /// Make every `set` call fail.
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_counts_transitions() {
        let (mut led, handle) = MockIndicator::new();
        led.set(true).unwrap();
        led.set(true).unwrap();
        led.set(false).unwrap();
        assert!(!handle.is_on());
        assert_eq!(handle.switch_count(), 2);
    }

    #[test]
    fn test_failing_indicator() {
        let (mut led, handle) = MockIndicator::new();
        handle.set_failing(true);
        assert!(led.set(true).is_err());
        assert!(!handle.is_on());
    }
}
