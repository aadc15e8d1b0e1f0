//! Dispatch cooldown shared by all channels.

use std::time::Duration;
use tokio::time::Instant;

/// Gate deciding whether a critical event may trigger capture and notify.
///
/// The window is measured from the instant a dispatch was admitted, and is
/// only armed once that dispatch has been attempted, whether it succeeded or
/// not. Admission is not exclusive: channels whose events arrive while
/// another channel's capture is still running are admitted too. Events of a
/// single channel are already serialized by its worker.
#[derive(Debug, Clone)]
pub struct CooldownWindow {
    duration: Duration,
    last_dispatch: Option<Instant>,
}

impl CooldownWindow {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            last_dispatch: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Admit a dispatch at `now`.
    ///
    /// Returns the admission instant to hand back to [`complete`](Self::complete),
    /// or `None` if less than the window has passed since the last dispatch.
    pub fn try_begin(&mut self, now: Instant) -> Option<Instant> {
        self.remaining(now).is_zero().then_some(now)
    }

    /// Arm the window for a dispatch admitted at `admitted`.
    ///
    /// Out of order completions never move the window backwards.
    pub fn complete(&mut self, admitted: Instant) {
        if self.last_dispatch.is_none_or(|last| last < admitted) {
            self.last_dispatch = Some(admitted);
        }
    }

    /// Time left before the next dispatch may be admitted.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.last_dispatch.map_or(Duration::ZERO, |last| {
            self.duration.saturating_sub(now.saturating_duration_since(last))
        })
    }

    pub fn last_dispatch(&self) -> Option<Instant> {
        self.last_dispatch
    }
}
