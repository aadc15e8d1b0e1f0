//! Seams to the camera and the alerting service.
//!
//! Both are injected into the orchestrator. Their futures must be `Send`
//! because event handling runs inside the spawned channel workers.

use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Reference to a captured image or video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCapture {
    pub path: PathBuf,
    /// Remote location once uploaded, if the device uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl MediaCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            url: None,
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Camera unavailable: {0}")]
    Unavailable(String),

    #[error("Capture failed: {0}")]
    Failed(String),

    #[error("Capture timed out")]
    Timeout,
}

/// Camera attached to the node.
pub trait CaptureDevice: Send + Sync + 'static {
    fn capture_image(&self) -> impl Future<Output = Result<MediaCapture, CaptureError>> + Send;

    fn record_video(
        &self,
        duration: Duration,
    ) -> impl Future<Output = Result<MediaCapture, CaptureError>> + Send;
}

impl<T: CaptureDevice> CaptureDevice for Arc<T> {
    fn capture_image(&self) -> impl Future<Output = Result<MediaCapture, CaptureError>> + Send {
        (**self).capture_image()
    }

    fn record_video(
        &self,
        duration: Duration,
    ) -> impl Future<Output = Result<MediaCapture, CaptureError>> + Send {
        (**self).record_video(duration)
    }
}

/// Delivery route for an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertChannel {
    Sms,
    Email,
    Push,
}

impl fmt::Display for AlertChannel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            AlertChannel::Sms => "sms",
            AlertChannel::Email => "email",
            AlertChannel::Push => "push",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed(String),
}

impl DeliveryOutcome {
    #[inline]
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent)
    }
}

/// Per-channel result of one notification.
pub type DeliveryReport = BTreeMap<AlertChannel, DeliveryOutcome>;

/// Alerting service.
///
/// Delivery failures are reported per channel rather than as an error: a
/// failed SMS must not hide a successful push.
pub trait Notifier: Send + Sync + 'static {
    fn send(
        &self,
        event: &Event,
        channels: &[AlertChannel],
    ) -> impl Future<Output = DeliveryReport> + Send;
}

impl<T: Notifier> Notifier for Arc<T> {
    fn send(
        &self,
        event: &Event,
        channels: &[AlertChannel],
    ) -> impl Future<Output = DeliveryReport> + Send {
        (**self).send(event, channels)
    }
}
