//! Security events raised by the channel workers.
//!
//! Events are immutable once built. The outcome of a dispatch (media
//! references or capture failures, then per-channel delivery) is attached by
//! constructing a new value with [`Event::with_media`] and
//! [`Event::with_delivery`].

use crate::collaborators::{AlertChannel, CaptureError, DeliveryReport, MediaCapture};
use chrono::{DateTime, Utc};
use roomwatch_core::{AccessDecision, ChannelKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What happened on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    MotionDetected,
    DoorOpened,
    WindowOpened,
    UnauthorizedAccess,
    AccessGranted,
}

impl EventType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::MotionDetected => "motion_detected",
            EventType::DoorOpened => "door_opened",
            EventType::WindowOpened => "window_opened",
            EventType::UnauthorizedAccess => "unauthorized_access",
            EventType::AccessGranted => "access_granted",
        }
    }

    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            EventType::AccessGranted => Severity::Informational,
            _ => Severity::Critical,
        }
    }

    /// Human readable summary used in alert messages.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            EventType::MotionDetected => "Motion detected",
            EventType::DoorOpened => "Door opened",
            EventType::WindowOpened => "Window opened",
            EventType::UnauthorizedAccess => "Unauthorized access attempt",
            EventType::AccessGranted => "Access granted",
        }
    }

    /// Kind of channel that raises this event.
    #[must_use]
    pub fn channel_kind(self) -> ChannelKind {
        match self {
            EventType::MotionDetected => ChannelKind::Motion,
            EventType::DoorOpened => ChannelKind::Door,
            EventType::WindowOpened => ChannelKind::Window,
            EventType::UnauthorizedAccess | EventType::AccessGranted => ChannelKind::Rfid,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How urgently an event must reach people.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Informational,
    Critical,
}

impl Severity {
    /// Alert channels an event of this severity is delivered on.
    #[must_use]
    pub fn alert_channels(self) -> &'static [AlertChannel] {
        match self {
            Severity::Critical => &[AlertChannel::Sms, AlertChannel::Email, AlertChannel::Push],
            Severity::Informational => &[AlertChannel::Push],
        }
    }

    #[inline]
    #[must_use]
    pub fn is_critical(self) -> bool {
        self == Severity::Critical
    }
}

/// Capture outcome of a dispatched event.
///
/// A failed capture leaves its reference empty and keeps the error text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMedia {
    pub image: Option<MediaCapture>,
    pub video: Option<MediaCapture>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_error: Option<String>,
}

impl EventMedia {
    pub fn from_results(
        image: Result<MediaCapture, CaptureError>,
        video: Result<MediaCapture, CaptureError>,
    ) -> Self {
        let (image, image_error) = split(image);
        let (video, video_error) = split(video);
        Self {
            image,
            video,
            image_error,
            video_error,
        }
    }

    /// No media reference attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.video.is_none()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.image_error.is_some() || self.video_error.is_some()
    }

    /// Capture failures joined into one line, `None` if both captures worked.
    #[must_use]
    pub fn error_summary(&self) -> Option<String> {
        match (&self.image_error, &self.video_error) {
            (None, None) => None,
            (Some(image), None) => Some(format!("image: {image}")),
            (None, Some(video)) => Some(format!("video: {video}")),
            (Some(image), Some(video)) => Some(format!("image: {image}; video: {video}")),
        }
    }

    fn is_unset(&self) -> bool {
        self.is_empty() && !self.has_errors()
    }
}

fn split(result: Result<MediaCapture, CaptureError>) -> (Option<MediaCapture>, Option<String>) {
    match result {
        Ok(media) => (Some(media), None),
        Err(err) => (None, Some(err.to_string())),
    }
}

/// A classified security event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub channel_id: String,
    pub message: String,
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "EventMedia::is_unset")]
    pub media: EventMedia,
    /// Per-channel result once the event has been handed to the notifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryReport>,
}

impl Event {
    /// Build an event stamped with a fresh id and the current time.
    pub fn new(
        event_type: EventType,
        channel_id: impl Into<String>,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            severity: event_type.severity(),
            timestamp: Utc::now(),
            channel_id: channel_id.into(),
            message: message.into(),
            data,
            media: EventMedia::default(),
            delivery: None,
        }
    }

    /// Same event with `media` attached.
    #[must_use]
    pub fn with_media(self, media: EventMedia) -> Self {
        Self { media, ..self }
    }

    /// Same event with the notifier's report attached.
    #[must_use]
    pub fn with_delivery(self, delivery: DeliveryReport) -> Self {
        Self {
            delivery: Some(delivery),
            ..self
        }
    }

    /// `true` if the notifier reported every channel as sent.
    #[must_use]
    pub fn fully_delivered(&self) -> bool {
        self.delivery
            .as_ref()
            .is_some_and(|report| report.values().all(|outcome| outcome.is_sent()))
    }
}

/// Classify a motion or contact reading against the previous state.
///
/// Only rising edges qualify: motion that was not present before, or a door
/// or window that was closed before.
#[must_use]
pub fn classify_transition(kind: ChannelKind, previous: bool, current: bool) -> Option<EventType> {
    if previous || !current {
        return None;
    }
    match kind {
        ChannelKind::Motion => Some(EventType::MotionDetected),
        ChannelKind::Door => Some(EventType::DoorOpened),
        ChannelKind::Window => Some(EventType::WindowOpened),
        ChannelKind::Rfid | ChannelKind::Camera => None,
    }
}

/// Classify a card read by its access decision.
#[must_use]
pub fn classify_card(decision: &AccessDecision) -> EventType {
    if decision.granted {
        EventType::AccessGranted
    } else {
        EventType::UnauthorizedAccess
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::DeliveryOutcome;
    use roomwatch_core::AccessRole;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(ChannelKind::Motion, false, true, Some(EventType::MotionDetected))]
    #[case(ChannelKind::Door, false, true, Some(EventType::DoorOpened))]
    #[case(ChannelKind::Window, false, true, Some(EventType::WindowOpened))]
    #[case(ChannelKind::Door, true, true, None)]
    #[case(ChannelKind::Window, true, false, None)]
    #[case(ChannelKind::Motion, false, false, None)]
    #[case(ChannelKind::Rfid, false, true, None)]
    fn test_classify_transition(
        #[case] kind: ChannelKind,
        #[case] previous: bool,
        #[case] current: bool,
        #[case] expected: Option<EventType>,
    ) {
        assert_eq!(classify_transition(kind, previous, current), expected);
    }

    #[test]
    fn test_classify_card() {
        let granted = AccessDecision {
            granted: true,
            role: Some(AccessRole::ItStaff),
        };
        assert_eq!(classify_card(&granted), EventType::AccessGranted);
        assert_eq!(classify_card(&AccessDecision::DENIED), EventType::UnauthorizedAccess);
    }

    #[test]
    fn test_severity_channels() {
        assert_eq!(EventType::DoorOpened.severity(), Severity::Critical);
        assert_eq!(EventType::AccessGranted.severity(), Severity::Informational);
        assert_eq!(Severity::Critical.alert_channels().len(), 3);
        assert_eq!(Severity::Informational.alert_channels(), &[AlertChannel::Push]);
    }

    #[test]
    fn test_with_media_keeps_identity() {
        let event = Event::new(EventType::MotionDetected, "motion", "Motion", json!({"motion": true}));
        let media = EventMedia {
            image: Some(MediaCapture::new("/tmp/a.jpg")),
            ..EventMedia::default()
        };
        let with_media = event.clone().with_media(media.clone());

        assert_eq!(with_media.id, event.id);
        assert_eq!(with_media.timestamp, event.timestamp);
        assert_eq!(with_media.media, media);
        assert!(event.media.is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::new(
            EventType::UnauthorizedAccess,
            "rfid",
            "Unauthorized card",
            json!({"uid": "1-2-3-4-4"}),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "unauthorized_access");
        assert_eq!(value["severity"], "critical");
        assert_eq!(value["channel_id"], "rfid");
        assert!(value.get("media").is_none());
        assert!(value.get("delivery").is_none());
    }

    #[test]
    fn test_capture_failures_kept_on_media() {
        let media = EventMedia::from_results(
            Ok(MediaCapture::new("/tmp/a.jpg")),
            Err(CaptureError::Unavailable("no camera".to_string())),
        );
        assert!(!media.is_empty());
        assert!(media.has_errors());
        assert_eq!(media.video_error.as_deref(), Some("Camera unavailable: no camera"));
        assert_eq!(
            media.error_summary().as_deref(),
            Some("video: Camera unavailable: no camera")
        );

        let event = Event::new(EventType::DoorOpened, "door", "Door", json!({})).with_media(media);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["media"]["video_error"], "Camera unavailable: no camera");
        assert!(value["media"].get("image_error").is_none());
    }

    #[test]
    fn test_failed_captures_still_serialized() {
        let media = EventMedia::from_results(Err(CaptureError::Timeout), Err(CaptureError::Timeout));
        assert!(media.is_empty());
        assert_eq!(
            media.error_summary().as_deref(),
            Some("image: Capture timed out; video: Capture timed out")
        );

        let event = Event::new(EventType::MotionDetected, "motion", "Motion", json!({})).with_media(media);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["media"]["image_error"], "Capture timed out");
    }

    #[test]
    fn test_delivery_recorded_on_event() {
        let event = Event::new(EventType::WindowOpened, "window", "Window", json!({}));
        assert!(!event.fully_delivered());

        let report = DeliveryReport::from([
            (AlertChannel::Sms, DeliveryOutcome::Failed("gateway down".to_string())),
            (AlertChannel::Push, DeliveryOutcome::Sent),
        ]);
        let event = event.with_delivery(report);
        assert!(!event.fully_delivered());

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["delivery"]["push"], "sent");
        assert_eq!(value["delivery"]["sms"]["failed"], "gateway down");
    }
}
