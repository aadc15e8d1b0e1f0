//! Mock digital input.

use crate::error::{HardwareError, Result};
use crate::traits::DigitalInput;
use crate::types::Level;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
struct LineState {
    level: Level,
    pending_failures: u32,
    disconnected: bool,
    reads: u64,
}

/// Mock input line.
///
/// # Examples
///
/// ```
/// use roomwatch_hardware::mock::MockInput;
/// use roomwatch_hardware::traits::DigitalInput;
/// use roomwatch_hardware::Level;
///
/// let (mut input, handle) = MockInput::new();
/// assert_eq!(input.read_level().unwrap(), Level::Low);
///
/// handle.set_level(Level::High);
/// assert_eq!(input.read_level().unwrap(), Level::High);
///
/// handle.inject_failures(1);
/// assert!(input.read_level().is_err());
/// assert!(input.read_level().is_ok());
/// ```
#[derive(Debug)]
pub struct MockInput {
    state: Arc<Mutex<LineState>>,
    name: String,
}

impl MockInput {
    /// Create a low input and its control handle.
    pub fn new() -> (Self, MockInputHandle) {
        Self::with_name("mock-input")
    }

    pub fn with_name(name: impl Into<String>) -> (Self, MockInputHandle) {
        let state = Arc::new(Mutex::new(LineState {
            level: Level::Low,
            pending_failures: 0,
            disconnected: false,
            reads: 0,
        }));
        let input = Self {
            state: Arc::clone(&state),
            name: name.into(),
        };
        (input, MockInputHandle { state })
    }
}

impl DigitalInput for MockInput {
    fn read_level(&mut self) -> Result<Level> {
        let mut state = self.state.lock();
        state.reads += 1;
        if state.disconnected {
            return Err(HardwareError::disconnected(self.name.clone()));
        }
        if state.pending_failures > 0 {
            state.pending_failures -= 1;
            return Err(HardwareError::communication(format!(
                "{}: injected read failure",
                self.name
            )));
        }
        Ok(state.level)
    }
}

/// Handle for driving a [`MockInput`].
#[derive(Debug, Clone)]
pub struct MockInputHandle {
    state: Arc<Mutex<LineState>>,
}

impl MockInputHandle {
    pub fn set_level(&self, level: Level) {
        self.state.lock().level = level;
    }

    /// Drive the line high (`true`) or low (`false`).
    pub fn set_active(&self, high: bool) {
        self.set_level(Level::from(high));
    }

    pub fn level(&self) -> Level {
        self.state.lock().level
    }

    /// Fail the next `count` reads.
    pub fn inject_failures(&self, count: u32) {
        self.state.lock().pending_failures = count;
    }

    /// Fail every read until reconnected.
    pub fn set_disconnected(&self, disconnected: bool) {
        self.state.lock().disconnected = disconnected;
    }

    /// Number of reads attempted so far.
    pub fn read_count(&self) -> u64 {
        self.state.lock().reads
    }
}
