//! Per-channel status table.
//!
//! One entry per physical input behind a single table-wide lock. Every
//! multi-field update happens inside one critical section, so a snapshot
//! never shows a half-applied reading. The lock is never held across an
//! `.await`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use roomwatch_core::ChannelKind;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;

/// Status of one sensor channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorChannel {
    #[serde(skip)]
    pub id: String,
    pub kind: ChannelKind,
    pub location: String,
    pub active: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub last_change: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub data: serde_json::Value,
    pub last_event_time: Option<DateTime<Utc>>,
    pub event_count: u64,
    #[serde(skip)]
    state: Option<bool>,
}

impl SensorChannel {
    fn new(id: &str, kind: ChannelKind, location: String) -> Self {
        Self {
            id: id.to_string(),
            kind,
            location,
            active: false,
            last_check: None,
            last_change: None,
            error: None,
            data: serde_json::Value::Null,
            last_event_time: None,
            event_count: 0,
            state: None,
        }
    }

    /// Last logical state read from the device.
    pub fn state(&self) -> Option<bool> {
        self.state
    }
}

fn advance(slot: &mut Option<DateTime<Utc>>, at: DateTime<Utc>) {
    if slot.is_none_or(|current| current < at) {
        *slot = Some(at);
    }
}

/// Channel id → status, shared between workers and status queries.
#[derive(Debug, Default)]
pub struct SensorStatusTable {
    channels: Mutex<BTreeMap<String, SensorChannel>>,
}

impl SensorStatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel, replacing any previous entry with the same id.
    pub fn register(&self, id: &str, kind: ChannelKind, location: impl Into<String>) {
        self.channels
            .lock()
            .insert(id.to_string(), SensorChannel::new(id, kind, location.into()));
    }

    fn update<R>(
        &self,
        id: &str,
        kind: ChannelKind,
        apply: impl FnOnce(&mut SensorChannel) -> R,
    ) -> R {
        let mut channels = self.channels.lock();
        let channel = channels.entry(id.to_string()).or_insert_with(|| {
            error!(channel = id, %kind, "Status update for unregistered channel");
            SensorChannel::new(id, kind, format!("unregistered:{id}"))
        });
        apply(channel)
    }

    /// Record a successful read of `state` at `at`.
    ///
    /// Clears any previous error and returns the prior state, `None` for the
    /// first reading.
    pub fn record_reading(
        &self,
        id: &str,
        kind: ChannelKind,
        state: bool,
        data: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Option<bool> {
        self.update(id, kind, |channel| {
            let previous = channel.state.replace(state);
            if previous != Some(state) {
                advance(&mut channel.last_change, at);
            }
            advance(&mut channel.last_check, at);
            channel.active = true;
            channel.error = None;
            channel.data = data;
            previous
        })
    }

    /// Record a failed read.
    pub fn record_error(&self, id: &str, kind: ChannelKind, message: impl Into<String>, at: DateTime<Utc>) {
        let message = message.into();
        self.update(id, kind, |channel| {
            advance(&mut channel.last_check, at);
            channel.active = false;
            channel.error = Some(message);
        });
    }

    /// Count an event raised on the channel.
    pub fn record_event(&self, id: &str, kind: ChannelKind, at: DateTime<Utc>) {
        self.update(id, kind, |channel| {
            channel.event_count += 1;
            advance(&mut channel.last_event_time, at);
        });
    }

    pub fn channel(&self, id: &str) -> Option<SensorChannel> {
        self.channels.lock().get(id).cloned()
    }

    /// Consistent copy of every channel.
    pub fn snapshot(&self) -> BTreeMap<String, SensorChannel> {
        self.channels.lock().clone()
    }

    pub fn channel_ids(&self) -> Vec<String> {
        self.channels.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }
}
