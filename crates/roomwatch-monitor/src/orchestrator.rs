//! Sensor event orchestrator.
//!
//! The orchestrator owns one worker task per sensor channel, the shared
//! status table and the dispatch cooldown. Each worker polls its device at
//! its own cadence, records the reading and, on a qualifying transition,
//! runs the event handler inline.
//!
//! ```text
//! ┌──────────┐
//! │ motion   │──┐
//! │ worker   │  │   ┌──────────────┐     ┌───────────┐
//! └──────────┘  ├──►│ status table │     │ cooldown  │
//! ┌──────────┐  │   └──────────────┘     └─────┬─────┘
//! │ door     │──┤                              │ admits
//! │ worker   │  │   ┌──────────────┐           ▼
//! └──────────┘  └──►│ handle_event │──► capture ──► notify
//! ┌──────────┐  ┌──►│              │
//! │ rfid     │──┘   └──────────────┘
//! │ worker   │  (blocking pool for bus work)
//! └──────────┘
//! ```
//!
//! # Lifecycle
//!
//! 1. Create the orchestrator with settings, the access table and the
//!    capture/notify collaborators
//! 2. Register channels with `register_sensor` and `register_card_reader`
//! 3. `start()` spawns one task per channel
//! 4. `stop()` cancels every worker and joins each with a bounded timeout
//!
//! An orchestrator cannot be restarted once stopped: the devices are owned
//! by the workers and go away with them.
//!
//! Besides the registered channels the status table carries a `camera`
//! entry. It has no worker; every dispatch attempt records the capture
//! references or the capture failure there.

use crate::collaborators::{CaptureDevice, DeliveryOutcome, MediaCapture, Notifier};
use crate::cooldown::CooldownWindow;
use crate::error::{MonitorError, Result};
use crate::event::{Event, EventMedia, EventType, classify_card, classify_transition};
use crate::status::{SensorChannel, SensorStatusTable};
use chrono::Utc;
use parking_lot::Mutex;
use roomwatch_core::{AccessTable, CardUid, ChannelKind, MonitorConfig, constants};
use roomwatch_hardware::{AnySensor, SensorHandle};
use roomwatch_rfid::{Mfrc522, SpiBus};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{self, JoinError, JoinHandle};
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pending probe requests per worker.
const PROBE_QUEUE: usize = 4;

/// Status table id of the capture device.
pub const CAMERA_CHANNEL: &str = "camera";

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A card reader a worker can poll from the blocking pool.
pub trait CardSource: Send + 'static {
    /// Poll the field once. `Ok(None)` means no valid card.
    fn poll_card(&mut self) -> roomwatch_rfid::Result<Option<CardUid>>;

    fn self_test(&mut self) -> roomwatch_rfid::Result<()>;
}

impl<B: SpiBus + 'static> CardSource for Mfrc522<B> {
    fn poll_card(&mut self) -> roomwatch_rfid::Result<Option<CardUid>> {
        self.read_card()
    }

    fn self_test(&mut self) -> roomwatch_rfid::Result<()> {
        Mfrc522::self_test(self).map(|_| ())
    }
}

/// Timing knobs for the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub event_cooldown: Duration,
    pub error_backoff: Duration,
    pub join_timeout: Duration,
    pub intrusion_video: Duration,
    pub unauthorized_video: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            event_cooldown: Duration::from_secs(constants::DEFAULT_EVENT_COOLDOWN_SECS),
            error_backoff: Duration::from_millis(constants::DEFAULT_ERROR_BACKOFF_MS),
            join_timeout: Duration::from_millis(constants::DEFAULT_JOIN_TIMEOUT_MS),
            intrusion_video: Duration::from_secs(constants::DEFAULT_INTRUSION_VIDEO_SECS),
            unauthorized_video: Duration::from_secs(constants::DEFAULT_UNAUTHORIZED_VIDEO_SECS),
        }
    }
}

impl From<&MonitorConfig> for OrchestratorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            event_cooldown: config.event_cooldown(),
            error_backoff: config.error_backoff(),
            join_timeout: config.join_timeout(),
            intrusion_video: Duration::from_secs(config.video.intrusion_secs),
            unauthorized_video: Duration::from_secs(config.video.unauthorized_secs),
        }
    }
}

/// What `handle_event` did with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Counted and logged only.
    Informational,
    /// Critical, but the cooldown did not admit it.
    Suppressed,
    /// Capture and notify were attempted. The event carries the capture
    /// references or failures and the per-channel delivery report.
    Dispatched(Box<Event>),
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Informational => "informational",
            DispatchOutcome::Suppressed => "suppressed",
            DispatchOutcome::Dispatched(_) => "dispatched",
        }
    }

    /// The dispatched event, if capture and notify were attempted.
    pub fn event(&self) -> Option<&Event> {
        match self {
            DispatchOutcome::Dispatched(event) => Some(event),
            _ => None,
        }
    }
}

/// Event counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventStats {
    pub raised: u64,
    pub informational: u64,
    pub dispatched: u64,
    pub suppressed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    raised: AtomicU64,
    informational: AtomicU64,
    dispatched: AtomicU64,
    suppressed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> EventStats {
        EventStats {
            raised: self.raised.load(Ordering::Relaxed),
            informational: self.informational.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

/// Static description of a channel.
#[derive(Debug, Clone)]
struct ChannelInfo {
    id: String,
    kind: ChannelKind,
    location: String,
    interval: Duration,
}

enum ChannelDevice {
    Sensor(AnySensor),
    Reader(Box<dyn CardSource>),
}

struct PendingChannel {
    channel: ChannelInfo,
    device: ChannelDevice,
}

type ProbeRequest = oneshot::Sender<bool>;

struct Worker {
    id: String,
    handle: JoinHandle<()>,
    probes: mpsc::Sender<ProbeRequest>,
}

/// Task termination classification for shutdown handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskTermination {
    Completed,
    Cancelled,
    Panicked,
}

fn classify_task_result(result: std::result::Result<(), JoinError>) -> TaskTermination {
    match result {
        Ok(()) => TaskTermination::Completed,
        Err(e) if e.is_cancelled() => TaskTermination::Cancelled,
        Err(_) => TaskTermination::Panicked,
    }
}

fn self_test_passed(channel: &str, result: std::result::Result<(), impl Display>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            warn!(channel, error = %err, "Self-test failed");
            false
        }
    }
}

/// Arms the cooldown with the admission instant when the dispatch ends,
/// even if the dispatching future is dropped half way.
struct DispatchGuard<'a> {
    cooldown: &'a Mutex<CooldownWindow>,
    admitted: Instant,
}

impl<'a> DispatchGuard<'a> {
    fn begin(cooldown: &'a Mutex<CooldownWindow>) -> Option<Self> {
        let admitted = cooldown.lock().try_begin(Instant::now())?;
        Some(Self { cooldown, admitted })
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.cooldown.lock().complete(self.admitted);
    }
}

/// State shared between the orchestrator and its workers.
struct Shared<C, N> {
    status: SensorStatusTable,
    cooldown: Mutex<CooldownWindow>,
    access: Arc<AccessTable>,
    capture: C,
    notifier: N,
    settings: OrchestratorSettings,
    counters: Counters,
}

impl<C: CaptureDevice, N: Notifier> Shared<C, N> {
    async fn handle_event(&self, event: Event) -> DispatchOutcome {
        self.status
            .record_event(&event.channel_id, event.event_type.channel_kind(), event.timestamp);
        Counters::bump(&self.counters.raised);

        if !event.severity.is_critical() {
            info!(
                event_id = %event.id,
                channel = %event.channel_id,
                event_type = %event.event_type,
                "{}",
                event.message
            );
            Counters::bump(&self.counters.informational);
            return DispatchOutcome::Informational;
        }

        let Some(_dispatch) = DispatchGuard::begin(&self.cooldown) else {
            debug!(
                event_id = %event.id,
                channel = %event.channel_id,
                event_type = %event.event_type,
                "Event inside cooldown window, not dispatched"
            );
            Counters::bump(&self.counters.suppressed);
            return DispatchOutcome::Suppressed;
        };

        warn!(
            event_id = %event.id,
            channel = %event.channel_id,
            event_type = %event.event_type,
            "{}",
            event.message
        );

        let media = self.capture_media(&event).await;
        self.record_camera(&event, &media);
        let event = event.with_media(media);
        let delivery = self
            .notifier
            .send(&event, event.severity.alert_channels())
            .await;

        for (channel, outcome) in &delivery {
            if let DeliveryOutcome::Failed(reason) = outcome {
                warn!(event_id = %event.id, %channel, reason = %reason, "Alert delivery failed");
            }
        }
        Counters::bump(&self.counters.dispatched);
        DispatchOutcome::Dispatched(Box::new(event.with_delivery(delivery)))
    }

    async fn capture_media(&self, event: &Event) -> EventMedia {
        let video_length = match event.event_type {
            EventType::UnauthorizedAccess => self.settings.unauthorized_video,
            _ => self.settings.intrusion_video,
        };

        let image = self.capture.capture_image().await;
        if let Err(err) = &image {
            warn!(event_id = %event.id, error = %err, "Image capture failed, continuing without it");
        }
        let video = self.capture.record_video(video_length).await;
        if let Err(err) = &video {
            warn!(event_id = %event.id, error = %err, "Video capture failed, continuing without it");
        }
        EventMedia::from_results(image, video)
    }

    fn record_camera(&self, event: &Event, media: &EventMedia) {
        let now = Utc::now();
        if let Some(summary) = media.error_summary() {
            self.status
                .record_error(CAMERA_CHANNEL, ChannelKind::Camera, summary, now);
            return;
        }
        let path = |capture: &Option<MediaCapture>| {
            capture.as_ref().map(|capture| capture.path.display().to_string())
        };
        let url = |capture: &Option<MediaCapture>| capture.as_ref().and_then(|capture| capture.url.clone());
        let data = json!({
            "last_image": path(&media.image),
            "last_image_url": url(&media.image),
            "last_video": path(&media.video),
            "last_video_url": url(&media.video),
            "trigger_event": event.event_type,
        });
        self.status
            .record_reading(CAMERA_CHANNEL, ChannelKind::Camera, true, data, now);
        self.status
            .record_event(CAMERA_CHANNEL, ChannelKind::Camera, now);
    }

    async fn sensor_reading(&self, channel: &ChannelInfo, state: bool) {
        let data = match channel.kind {
            ChannelKind::Motion => json!({ "motion": state }),
            _ => json!({ "open": state }),
        };
        let previous =
            self.status
                .record_reading(&channel.id, channel.kind, state, data.clone(), Utc::now());

        if let Some(event_type) = classify_transition(channel.kind, previous.unwrap_or(false), state) {
            let message = format!("{} at {}", event_type.title(), channel.location);
            let outcome = self
                .handle_event(Event::new(event_type, &channel.id, message, data))
                .await;
            debug!(channel = %channel.id, %event_type, outcome = outcome.as_str(), "Event handled");
        }
    }

    async fn card_reading(&self, channel: &ChannelInfo, uid: Option<CardUid>) {
        let Some(uid) = uid else {
            self.status.record_reading(
                &channel.id,
                channel.kind,
                false,
                json!({ "card_present": false }),
                Utc::now(),
            );
            return;
        };

        let decision = self.access.authenticate_card(&uid);
        let holder = self.access.record(&uid).map(|record| record.name.clone());
        let data = json!({
            "card_present": true,
            "uid": uid.to_string(),
            "granted": decision.granted,
            "role": decision.role,
            "name": holder,
        });
        self.status
            .record_reading(&channel.id, channel.kind, true, data.clone(), Utc::now());

        let event_type = classify_card(&decision);
        let message = match &holder {
            Some(name) => format!("{} at {} for {name}", event_type.title(), channel.location),
            None => format!("{} at {} with card {uid}", event_type.title(), channel.location),
        };
        let outcome = self
            .handle_event(Event::new(event_type, &channel.id, message, data))
            .await;
        debug!(channel = %channel.id, %event_type, outcome = outcome.as_str(), "Event handled");
    }
}

enum Wake {
    Elapsed,
    Cancelled,
    Probe(ProbeRequest),
}

/// Wait for the sleep to elapse, cancellation, or a probe request,
/// whichever comes first.
async fn next_wake(
    sleep: Pin<&mut Sleep>,
    cancel: &CancellationToken,
    probes: &mut mpsc::Receiver<ProbeRequest>,
) -> Wake {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Wake::Cancelled,
        () = sleep => Wake::Elapsed,
        Some(reply) = probes.recv() => Wake::Probe(reply),
    }
}

async fn run_sensor<C: CaptureDevice, N: Notifier>(
    shared: Arc<Shared<C, N>>,
    channel: ChannelInfo,
    mut sensor: AnySensor,
    cancel: CancellationToken,
    mut probes: mpsc::Receiver<ProbeRequest>,
) {
    info!(channel = %channel.id, location = %channel.location, "Channel worker started");

    'worker: loop {
        if cancel.is_cancelled() {
            break;
        }

        let delay = match sensor.check_state() {
            Ok(state) => {
                shared.sensor_reading(&channel, state).await;
                channel.interval
            }
            Err(err) => {
                warn!(channel = %channel.id, error = %err, "Sensor read failed");
                shared
                    .status
                    .record_error(&channel.id, channel.kind, err.to_string(), Utc::now());
                shared.settings.error_backoff
            }
        };

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            match next_wake(sleep.as_mut(), &cancel, &mut probes).await {
                Wake::Elapsed => break,
                Wake::Cancelled => break 'worker,
                Wake::Probe(reply) => {
                    let passed = self_test_passed(&channel.id, sensor.self_test());
                    let _ = reply.send(passed);
                }
            }
        }
    }

    info!(channel = %channel.id, "Channel worker stopped");
}

async fn run_reader<C: CaptureDevice, N: Notifier>(
    shared: Arc<Shared<C, N>>,
    channel: ChannelInfo,
    mut reader: Box<dyn CardSource>,
    cancel: CancellationToken,
    mut probes: mpsc::Receiver<ProbeRequest>,
) {
    info!(channel = %channel.id, location = %channel.location, "Card reader worker started");

    'worker: loop {
        if cancel.is_cancelled() {
            break;
        }

        let polled = task::spawn_blocking(move || {
            let result = reader.poll_card();
            (reader, result)
        })
        .await;
        let result = match polled {
            Ok((returned, result)) => {
                reader = returned;
                result
            }
            Err(err) => {
                error!(channel = %channel.id, error = %err, "Card reader poll panicked, worker exiting");
                return;
            }
        };

        let delay = match result {
            Ok(uid) => {
                shared.card_reading(&channel, uid).await;
                channel.interval
            }
            Err(err) => {
                warn!(channel = %channel.id, error = %err, "Card reader poll failed");
                shared
                    .status
                    .record_error(&channel.id, channel.kind, err.to_string(), Utc::now());
                shared.settings.error_backoff
            }
        };

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            match next_wake(sleep.as_mut(), &cancel, &mut probes).await {
                Wake::Elapsed => break,
                Wake::Cancelled => break 'worker,
                Wake::Probe(reply) => {
                    let tested = task::spawn_blocking(move || {
                        let result = reader.self_test();
                        (reader, result)
                    })
                    .await;
                    match tested {
                        Ok((returned, result)) => {
                            reader = returned;
                            let _ = reply.send(self_test_passed(&channel.id, result));
                        }
                        Err(err) => {
                            error!(channel = %channel.id, error = %err, "Card reader self-test panicked, worker exiting");
                            return;
                        }
                    }
                }
            }
        }
    }

    info!(channel = %channel.id, "Card reader worker stopped");
}

/// Probe a device that is not owned by a worker yet. Returns `None` in
/// place of the device if the probe panicked.
async fn probe_device(id: &str, device: ChannelDevice) -> (Option<ChannelDevice>, bool) {
    match device {
        ChannelDevice::Sensor(mut sensor) => {
            let passed = self_test_passed(id, sensor.self_test());
            (Some(ChannelDevice::Sensor(sensor)), passed)
        }
        ChannelDevice::Reader(mut reader) => {
            let tested = task::spawn_blocking(move || {
                let result = reader.self_test();
                (reader, result)
            })
            .await;
            match tested {
                Ok((reader, result)) => (
                    Some(ChannelDevice::Reader(reader)),
                    self_test_passed(id, result),
                ),
                Err(err) => {
                    error!(channel = id, error = %err, "Card reader self-test panicked");
                    (None, false)
                }
            }
        }
    }
}

/// Coordinates the sensor channels of one node.
///
/// # Examples
///
/// ```no_run
/// use roomwatch_core::AccessTable;
/// use roomwatch_hardware::{AnyInput, AnySensor, ContactSensor};
/// use roomwatch_hardware::mock::MockInput;
/// use roomwatch_monitor::mock::{RecordingCapture, RecordingNotifier};
/// use roomwatch_monitor::{OrchestratorSettings, SensorOrchestrator};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> roomwatch_monitor::Result<()> {
///     let mut orchestrator = SensorOrchestrator::new(
///         OrchestratorSettings::default(),
///         Arc::new(AccessTable::default()),
///         RecordingCapture::new(),
///         RecordingNotifier::new(),
///     );
///
///     let (input, _line) = MockInput::new();
///     let door = AnySensor::Contact(ContactSensor::door(AnyInput::Mock(input), None));
///     orchestrator.register_sensor(door, "front door", Duration::from_secs(1))?;
///
///     orchestrator.start()?;
///     assert!(orchestrator.is_healthy());
///     orchestrator.stop().await;
///     Ok(())
/// }
/// ```
pub struct SensorOrchestrator<C, N> {
    shared: Arc<Shared<C, N>>,
    channel_ids: Vec<String>,
    pending: Vec<PendingChannel>,
    workers: Vec<Worker>,
    cancel: CancellationToken,
    lifecycle: Lifecycle,
}

impl<C: CaptureDevice, N: Notifier> SensorOrchestrator<C, N> {
    pub fn new(
        settings: OrchestratorSettings,
        access: Arc<AccessTable>,
        capture: C,
        notifier: N,
    ) -> Self {
        let status = SensorStatusTable::new();
        status.register(CAMERA_CHANNEL, ChannelKind::Camera, CAMERA_CHANNEL);
        Self {
            shared: Arc::new(Shared {
                status,
                cooldown: Mutex::new(CooldownWindow::new(settings.event_cooldown)),
                access,
                capture,
                notifier,
                settings,
                counters: Counters::default(),
            }),
            channel_ids: Vec::new(),
            pending: Vec::new(),
            workers: Vec::new(),
            cancel: CancellationToken::new(),
            lifecycle: Lifecycle::Idle,
        }
    }

    /// Build an orchestrator with settings and access table from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Config`] if the configured card table is
    /// invalid.
    pub fn from_config(config: &MonitorConfig, capture: C, notifier: N) -> Result<Self> {
        let access = Arc::new(config.access_table()?);
        Ok(Self::new(OrchestratorSettings::from(config), access, capture, notifier))
    }

    /// Register a motion or contact sensor under its kind's channel id.
    ///
    /// # Errors
    ///
    /// Fails once started, for a duplicate channel, or for a zero interval.
    pub fn register_sensor(
        &mut self,
        sensor: AnySensor,
        location: impl Into<String>,
        interval: Duration,
    ) -> Result<()> {
        let channel = ChannelInfo {
            id: sensor.kind().as_str().to_string(),
            kind: sensor.kind(),
            location: location.into(),
            interval,
        };
        self.register(channel, ChannelDevice::Sensor(sensor))
    }

    /// Register the card reader channel.
    ///
    /// # Errors
    ///
    /// Fails once started, for a duplicate channel, or for a zero interval.
    pub fn register_card_reader(
        &mut self,
        reader: impl CardSource,
        location: impl Into<String>,
        interval: Duration,
    ) -> Result<()> {
        let channel = ChannelInfo {
            id: ChannelKind::Rfid.as_str().to_string(),
            kind: ChannelKind::Rfid,
            location: location.into(),
            interval,
        };
        self.register(channel, ChannelDevice::Reader(Box::new(reader)))
    }

    fn register(&mut self, channel: ChannelInfo, device: ChannelDevice) -> Result<()> {
        if self.lifecycle != Lifecycle::Idle {
            return Err(MonitorError::RegistrationClosed);
        }
        if channel.interval.is_zero() {
            return Err(MonitorError::ZeroInterval(channel.id));
        }
        if self.pending.iter().any(|pending| pending.channel.id == channel.id) {
            return Err(MonitorError::DuplicateChannel(channel.id));
        }

        self.shared
            .status
            .register(&channel.id, channel.kind, channel.location.clone());
        info!(
            channel = %channel.id,
            location = %channel.location,
            interval_ms = millis(channel.interval),
            "Channel registered"
        );
        self.channel_ids.push(channel.id.clone());
        self.pending.push(PendingChannel { channel, device });
        Ok(())
    }

    /// Spawn one worker per registered channel.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::AlreadyRunning`] or [`MonitorError::Stopped`].
    pub fn start(&mut self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Running => return Err(MonitorError::AlreadyRunning),
            Lifecycle::Stopped => return Err(MonitorError::Stopped),
            Lifecycle::Idle => {}
        }

        for PendingChannel { channel, device } in std::mem::take(&mut self.pending) {
            let (probes, probe_rx) = mpsc::channel(PROBE_QUEUE);
            let shared = Arc::clone(&self.shared);
            let cancel = self.cancel.clone();
            let id = channel.id.clone();

            let handle = match device {
                ChannelDevice::Sensor(sensor) => {
                    tokio::spawn(run_sensor(shared, channel, sensor, cancel, probe_rx))
                }
                ChannelDevice::Reader(reader) => {
                    tokio::spawn(run_reader(shared, channel, reader, cancel, probe_rx))
                }
            };
            self.workers.push(Worker { id, handle, probes });
        }

        self.lifecycle = Lifecycle::Running;
        info!(channels = self.workers.len(), "Orchestrator started");
        Ok(())
    }

    /// Cancel every worker and wait for each up to the join timeout.
    ///
    /// Workers that do not finish in time are aborted and logged. Calling
    /// this on an orchestrator that is not running does nothing.
    pub async fn stop(&mut self) {
        if self.lifecycle != Lifecycle::Running {
            return;
        }
        info!("Stopping orchestrator");
        self.cancel.cancel();

        let join_timeout = self.shared.settings.join_timeout;
        for mut worker in self.workers.drain(..) {
            match tokio::time::timeout(join_timeout, &mut worker.handle).await {
                Ok(result) => match classify_task_result(result) {
                    TaskTermination::Completed | TaskTermination::Cancelled => {
                        debug!(channel = %worker.id, "Worker joined");
                    }
                    TaskTermination::Panicked => {
                        error!(channel = %worker.id, "Worker had panicked");
                    }
                },
                Err(_) => {
                    warn!(
                        channel = %worker.id,
                        timeout_ms = millis(join_timeout),
                        "Worker did not stop in time, aborting"
                    );
                    worker.handle.abort();
                }
            }
        }

        self.lifecycle = Lifecycle::Stopped;
        info!("Orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    /// `false` if not running or if any worker has finished.
    pub fn is_healthy(&self) -> bool {
        self.is_running() && self.workers.iter().all(|worker| !worker.handle.is_finished())
    }

    /// Snapshot of every channel, keyed by channel id.
    pub fn get_status(&self) -> BTreeMap<String, SensorChannel> {
        self.shared.status.snapshot()
    }

    pub fn status_table(&self) -> &SensorStatusTable {
        &self.shared.status
    }

    pub fn stats(&self) -> EventStats {
        self.shared.counters.snapshot()
    }

    pub fn access_table(&self) -> &AccessTable {
        &self.shared.access
    }

    pub fn capture(&self) -> &C {
        &self.shared.capture
    }

    pub fn notifier(&self) -> &N {
        &self.shared.notifier
    }

    /// Self-test every channel and report pass/fail per channel id.
    ///
    /// Before start the devices are probed directly. While running each
    /// worker runs the probe between polls. After stop every channel fails.
    pub async fn test_all(&mut self) -> BTreeMap<String, bool> {
        let results = match self.lifecycle {
            Lifecycle::Idle => self.probe_pending().await,
            Lifecycle::Running => self.probe_workers().await,
            Lifecycle::Stopped => self
                .channel_ids
                .iter()
                .map(|id| (id.clone(), false))
                .collect(),
        };
        let passed = results.values().filter(|&&ok| ok).count();
        info!(passed, total = results.len(), "Self-test finished");
        results
    }

    async fn probe_pending(&mut self) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for PendingChannel { channel, device } in std::mem::take(&mut self.pending) {
            let (device, passed) = probe_device(&channel.id, device).await;
            results.insert(channel.id.clone(), passed);
            match device {
                Some(device) => self.pending.push(PendingChannel { channel, device }),
                None => error!(channel = %channel.id, "Device lost during self-test, channel dropped"),
            }
        }
        results
    }

    async fn probe_workers(&self) -> BTreeMap<String, bool> {
        let limit = self.shared.settings.join_timeout;
        let mut results = BTreeMap::new();
        for worker in &self.workers {
            let probe = async {
                let (reply, answer) = oneshot::channel();
                worker.probes.send(reply).await.ok()?;
                answer.await.ok()
            };
            let passed = matches!(tokio::time::timeout(limit, probe).await, Ok(Some(true)));
            if !passed {
                warn!(channel = %worker.id, "Channel failed self-test");
            }
            results.insert(worker.id.clone(), passed);
        }
        results
    }

    /// Classify, count and, if admitted, dispatch an event.
    ///
    /// Critical events go through the cooldown. An admitted event gets an
    /// image and a video attached (whatever the camera manages to deliver,
    /// with the error text for what it could not) and is sent on every alert
    /// channel of its severity. Once the attempt ends the cooldown is armed
    /// from the instant the event was admitted.
    pub async fn handle_event(&self, event: Event) -> DispatchOutcome {
        self.shared.handle_event(event).await
    }
}

impl<C, N> Drop for SensorOrchestrator<C, N> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
