//! In-process capture device and notifier.
//!
//! Both record every call, can be switched into failure, and can add a fixed
//! latency to each call so tests can observe overlapping dispatches. The CLI
//! uses them in simulated mode.

use crate::collaborators::{
    AlertChannel, CaptureDevice, CaptureError, DeliveryOutcome, DeliveryReport, MediaCapture,
    Notifier,
};
use crate::event::Event;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

async fn delay(latency: Option<Duration>) {
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
}

/// Capture device that hands out numbered file names.
#[derive(Debug)]
pub struct RecordingCapture {
    media_dir: PathBuf,
    latency: Option<Duration>,
    failing: AtomicBool,
    images: AtomicU64,
    videos: Mutex<Vec<Duration>>,
}

impl RecordingCapture {
    pub fn new() -> Self {
        Self {
            media_dir: PathBuf::from("media"),
            latency: None,
            failing: AtomicBool::new(false),
            images: AtomicU64::new(0),
            videos: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    #[must_use]
    pub fn with_media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.media_dir = dir.into();
        self
    }

    /// Make every following capture fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn image_count(&self) -> u64 {
        self.images.load(Ordering::SeqCst)
    }

    pub fn video_count(&self) -> usize {
        self.videos.lock().len()
    }

    /// Durations requested for each recorded video, in call order.
    pub fn video_durations(&self) -> Vec<Duration> {
        self.videos.lock().clone()
    }

    fn check_failing(&self) -> Result<(), CaptureError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CaptureError::Unavailable("simulated camera failure".to_string()));
        }
        Ok(())
    }
}

impl Default for RecordingCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for RecordingCapture {
    async fn capture_image(&self) -> Result<MediaCapture, CaptureError> {
        let n = self.images.fetch_add(1, Ordering::SeqCst) + 1;
        delay(self.latency).await;
        self.check_failing()?;
        let path = self.media_dir.join(format!("image_{n:04}.jpg"));
        info!(path = %path.display(), "Captured image");
        Ok(MediaCapture::new(path))
    }

    async fn record_video(&self, duration: Duration) -> Result<MediaCapture, CaptureError> {
        let n = {
            let mut videos = self.videos.lock();
            videos.push(duration);
            videos.len()
        };
        delay(self.latency).await;
        self.check_failing()?;
        let path = self.media_dir.join(format!("video_{n:04}.mp4"));
        info!(path = %path.display(), secs = duration.as_secs(), "Recorded video");
        Ok(MediaCapture::new(path))
    }
}

/// Notifier that keeps every delivered event.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    latency: Option<Duration>,
    failing: Mutex<BTreeSet<AlertChannel>>,
    sent: Mutex<Vec<(Event, Vec<AlertChannel>)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make deliveries on `channel` fail until switched back.
    pub fn set_failing(&self, channel: AlertChannel, failing: bool) {
        let mut set = self.failing.lock();
        if failing {
            set.insert(channel);
        } else {
            set.remove(&channel);
        }
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Every `send` call with the channels it was asked to use.
    pub fn sent(&self) -> Vec<(Event, Vec<AlertChannel>)> {
        self.sent.lock().clone()
    }

    pub fn last_event(&self) -> Option<Event> {
        self.sent.lock().last().map(|(event, _)| event.clone())
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, event: &Event, channels: &[AlertChannel]) -> DeliveryReport {
        delay(self.latency).await;

        let failing = self.failing.lock().clone();
        let report = channels
            .iter()
            .map(|&channel| {
                let outcome = if failing.contains(&channel) {
                    DeliveryOutcome::Failed(format!("{channel} gateway unavailable"))
                } else {
                    DeliveryOutcome::Sent
                };
                (channel, outcome)
            })
            .collect();

        info!(event_id = %event.id, event_type = %event.event_type, ?channels, "Alert sent");
        self.sent.lock().push((event.clone(), channels.to_vec()));
        report
    }
}
