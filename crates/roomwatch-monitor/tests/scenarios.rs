//! End-to-end scenarios against mock inputs and the simulated card reader.

use roomwatch_core::{AccessTable, CardUid, ChannelKind};
use roomwatch_hardware::mock::{MockInput, MockInputHandle};
use roomwatch_hardware::{AnyInput, AnySensor, ContactSensor, MotionSensor};
use roomwatch_monitor::mock::{RecordingCapture, RecordingNotifier};
use roomwatch_monitor::{
    AlertChannel, CAMERA_CHANNEL, CardSource, EventType, OrchestratorSettings, SensorOrchestrator,
    Severity,
};
use roomwatch_rfid::Mfrc522;
use roomwatch_rfid::mock::{SimulatedFieldHandle, SimulatedMfrc522};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};

type Orchestrator = SensorOrchestrator<Arc<RecordingCapture>, Arc<RecordingNotifier>>;

const POLL: Duration = Duration::from_millis(10);

struct Node {
    orchestrator: Orchestrator,
    capture: Arc<RecordingCapture>,
    notifier: Arc<RecordingNotifier>,
}

fn node() -> Node {
    node_with_cooldown(OrchestratorSettings::default().event_cooldown)
}

fn node_with_cooldown(event_cooldown: Duration) -> Node {
    let capture = Arc::new(RecordingCapture::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let settings = OrchestratorSettings {
        event_cooldown,
        error_backoff: Duration::from_millis(20),
        join_timeout: Duration::from_millis(500),
        ..OrchestratorSettings::default()
    };
    let orchestrator = SensorOrchestrator::new(
        settings,
        Arc::new(AccessTable::default()),
        Arc::clone(&capture),
        Arc::clone(&notifier),
    );
    Node {
        orchestrator,
        capture,
        notifier,
    }
}

fn door() -> (AnySensor, MockInputHandle) {
    let (input, line) = MockInput::new();
    (
        AnySensor::Contact(ContactSensor::door(AnyInput::Mock(input), None)),
        line,
    )
}

fn motion() -> (AnySensor, MockInputHandle) {
    let (input, line) = MockInput::new();
    (
        AnySensor::Motion(MotionSensor::new(AnyInput::Mock(input), None)),
        line,
    )
}

fn reader() -> (Mfrc522<SimulatedMfrc522>, SimulatedFieldHandle) {
    let (chip, field) = SimulatedMfrc522::new();
    let mut reader = Mfrc522::new(chip);
    reader.init().unwrap();
    (reader, field)
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_door_opening_dispatches_alert_with_media() {
    let mut node = node();
    let (sensor, line) = door();
    node.orchestrator.register_sensor(sensor, "front door", POLL).unwrap();
    node.orchestrator.start().unwrap();

    let status = node.orchestrator.status_table();
    wait_until("first door reading", || {
        status.channel("door").is_some_and(|door| door.last_check.is_some())
    })
    .await;
    line.set_active(true);
    wait_until("alert", || node.notifier.send_count() == 1).await;

    let (event, channels) = node.notifier.sent().remove(0);
    assert_eq!(event.event_type, EventType::DoorOpened);
    assert_eq!(event.severity, Severity::Critical);
    assert_eq!(event.channel_id, "door");
    assert_eq!(event.message, "Door opened at front door");
    assert!(event.media.image.is_some());
    assert!(event.media.video.is_some());
    assert_eq!(
        channels,
        vec![AlertChannel::Sms, AlertChannel::Email, AlertChannel::Push]
    );
    assert_eq!(node.capture.image_count(), 1);
    assert_eq!(node.capture.video_durations(), vec![Duration::from_secs(10)]);

    let camera = node.orchestrator.status_table().channel(CAMERA_CHANNEL).unwrap();
    assert!(camera.active);
    assert_eq!(camera.data["trigger_event"], "door_opened");

    let door = node.orchestrator.get_status().remove("door").unwrap();
    assert_eq!(door.kind, ChannelKind::Door);
    assert_eq!(door.event_count, 1);
    assert_eq!(door.data["open"], true);
    assert!(door.last_event_time.is_some());

    node.orchestrator.stop().await;
}

#[tokio::test]
async fn test_repeat_intrusion_within_cooldown_is_counted_not_sent() {
    let mut node = node();
    let (sensor, line) = motion();
    node.orchestrator.register_sensor(sensor, "hall", POLL).unwrap();
    node.orchestrator.start().unwrap();

    line.set_active(true);
    wait_until("first alert", || node.notifier.send_count() == 1).await;

    line.set_active(false);
    let status = node.orchestrator.status_table();
    wait_until("motion cleared", || {
        status.channel("motion").is_some_and(|m| m.state() == Some(false))
    })
    .await;
    line.set_active(true);
    wait_until("second event", || {
        status.channel("motion").is_some_and(|m| m.event_count == 2)
    })
    .await;

    assert_eq!(node.notifier.send_count(), 1);
    assert_eq!(node.capture.image_count(), 1);
    let stats = node.orchestrator.stats();
    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.suppressed, 1);

    node.orchestrator.stop().await;
}

#[tokio::test]
async fn test_steady_open_door_raises_single_event() {
    let mut node = node();
    let (sensor, line) = door();
    line.set_active(true);
    node.orchestrator.register_sensor(sensor, "front door", POLL).unwrap();
    node.orchestrator.start().unwrap();

    wait_until("alert", || node.notifier.send_count() == 1).await;
    sleep(Duration::from_millis(100)).await;

    let door = node.orchestrator.status_table().channel("door").unwrap();
    assert_eq!(door.event_count, 1);
    node.orchestrator.stop().await;
}

#[tokio::test]
async fn test_unauthorized_card_records_longer_video() {
    let mut node = node();
    let (reader, field) = reader();
    node.orchestrator
        .register_card_reader(reader, "main_reader", POLL)
        .unwrap();
    node.orchestrator.start().unwrap();

    let stranger = CardUid::from_serial([1, 2, 3, 4]);
    field.present_card(stranger);
    wait_until("alert", || node.notifier.send_count() == 1).await;

    let event = node.notifier.last_event().unwrap();
    assert_eq!(event.event_type, EventType::UnauthorizedAccess);
    assert_eq!(event.channel_id, "rfid");
    assert_eq!(event.data["uid"], "1-2-3-4-4");
    assert_eq!(event.data["granted"], false);
    assert_eq!(node.capture.video_durations(), vec![Duration::from_secs(30)]);

    let status = node.orchestrator.status_table();
    wait_until("repeated denied reads", || {
        status.channel("rfid").is_some_and(|rfid| rfid.event_count >= 4)
    })
    .await;

    let rfid = status.channel("rfid").unwrap();
    assert!(rfid.active);
    assert_eq!(node.notifier.send_count(), 1);
    assert_eq!(node.capture.video_count(), 1);
    let stats = node.orchestrator.stats();
    assert_eq!(stats.dispatched, 1);
    assert!(stats.suppressed >= 3);

    node.orchestrator.stop().await;
}

#[tokio::test]
async fn test_authorized_card_is_informational() {
    let mut node = node();
    let (reader, field) = reader();
    node.orchestrator
        .register_card_reader(reader, "main_reader", POLL)
        .unwrap();
    node.orchestrator.start().unwrap();

    field.present_card(CardUid::new([5, 74, 28, 185, 234]));
    let status = node.orchestrator.status_table();
    wait_until("granted read", || {
        status.channel("rfid").is_some_and(|rfid| rfid.event_count >= 2)
    })
    .await;

    let rfid = status.channel("rfid").unwrap();
    assert_eq!(rfid.data["granted"], true);
    assert_eq!(rfid.data["role"], "admin");
    assert_eq!(node.notifier.send_count(), 0);
    assert_eq!(node.capture.image_count(), 0);
    assert_eq!(node.orchestrator.stats().dispatched, 0);

    node.orchestrator.stop().await;
}

#[tokio::test]
async fn test_read_failures_back_off_and_recover() {
    let mut node = node();
    let (sensor, line) = door();
    line.set_disconnected(true);
    node.orchestrator.register_sensor(sensor, "front door", POLL).unwrap();
    node.orchestrator.start().unwrap();

    let status = node.orchestrator.status_table();
    wait_until("error recorded", || {
        status.channel("door").is_some_and(|door| door.error.is_some())
    })
    .await;
    let door = status.channel("door").unwrap();
    assert!(!door.active);
    assert!(node.orchestrator.is_healthy());

    line.set_disconnected(false);
    wait_until("recovery", || {
        status
            .channel("door")
            .is_some_and(|door| door.active && door.error.is_none())
    })
    .await;
    assert!(node.orchestrator.is_healthy());

    node.orchestrator.stop().await;
}

#[tokio::test]
async fn test_reader_bus_failure_is_recorded() {
    let mut node = node();
    let (reader, field) = reader();
    field.inject_bus_failures(u32::MAX);
    node.orchestrator
        .register_card_reader(reader, "main_reader", POLL)
        .unwrap();
    node.orchestrator.start().unwrap();

    let status = node.orchestrator.status_table();
    wait_until("bus error", || {
        status.channel("rfid").is_some_and(|rfid| rfid.error.is_some())
    })
    .await;
    assert!(node.orchestrator.is_healthy());

    field.inject_bus_failures(0);
    wait_until("reader recovered", || {
        status.channel("rfid").is_some_and(|rfid| rfid.active)
    })
    .await;
    assert!(node.orchestrator.is_healthy());

    node.orchestrator.stop().await;
}

#[tokio::test]
async fn test_unresponsive_reader_times_out_and_recovers() {
    let mut node = node();
    let (reader, field) = reader();
    node.orchestrator
        .register_card_reader(reader, "main_reader", POLL)
        .unwrap();
    node.orchestrator.start().unwrap();

    let status = node.orchestrator.status_table();
    wait_until("first poll", || {
        status.channel("rfid").is_some_and(|rfid| rfid.active)
    })
    .await;

    field.set_unresponsive(true);
    wait_until("timeout recorded", || {
        status.channel("rfid").is_some_and(|rfid| rfid.error.is_some())
    })
    .await;
    let rfid = status.channel("rfid").unwrap();
    assert!(!rfid.active);
    assert!(rfid.error.unwrap().contains("poll ceiling"));
    assert!(node.orchestrator.is_healthy());

    field.set_unresponsive(false);
    field.present_card(CardUid::new([5, 74, 28, 185, 234]));
    wait_until("reads resumed", || {
        status
            .channel("rfid")
            .is_some_and(|rfid| rfid.active && rfid.error.is_none() && rfid.data["granted"] == true)
    })
    .await;
    assert!(node.orchestrator.is_healthy());
    assert_eq!(node.notifier.send_count(), 0);

    node.orchestrator.stop().await;
}

#[tokio::test]
async fn test_intrusion_after_cooldown_alerts_again() {
    let mut node = node_with_cooldown(Duration::from_millis(300));
    let (sensor, line) = motion();
    node.orchestrator.register_sensor(sensor, "hall", POLL).unwrap();
    node.orchestrator.start().unwrap();
    let status = node.orchestrator.status_table();

    let pulse = |count: u64| {
        let line = line.clone();
        async move {
            line.set_active(true);
            wait_until("motion event", || {
                status.channel("motion").is_some_and(|m| m.event_count == count)
            })
            .await;
            line.set_active(false);
            wait_until("motion cleared", || {
                status.channel("motion").is_some_and(|m| m.state() == Some(false))
            })
            .await;
        }
    };

    pulse(1).await;
    pulse(2).await;
    assert_eq!(node.notifier.send_count(), 1);

    sleep(Duration::from_millis(350)).await;
    pulse(3).await;
    assert_eq!(node.notifier.send_count(), 2);
    let stats = node.orchestrator.stats();
    assert_eq!(stats.dispatched, 2);
    assert_eq!(stats.suppressed, 1);

    node.orchestrator.stop().await;
}

#[tokio::test]
async fn test_self_test_before_during_and_after_run() {
    let mut node = node();
    let (sensor, _door_line) = door();
    let (broken, broken_line) = motion();
    let (reader, _field) = reader();
    broken_line.set_disconnected(true);

    node.orchestrator.register_sensor(sensor, "front door", POLL).unwrap();
    node.orchestrator.register_sensor(broken, "hall", POLL).unwrap();
    node.orchestrator
        .register_card_reader(reader, "main_reader", POLL)
        .unwrap();

    let before = node.orchestrator.test_all().await;
    assert_eq!(before["door"], true);
    assert_eq!(before["motion"], false);
    assert_eq!(before["rfid"], true);

    node.orchestrator.start().unwrap();
    let during = node.orchestrator.test_all().await;
    assert_eq!(during, before);

    node.orchestrator.stop().await;
    let after = node.orchestrator.test_all().await;
    assert_eq!(after.len(), 3);
    assert!(after.values().all(|&passed| !passed));
}

struct PanickingReader;

impl CardSource for PanickingReader {
    fn poll_card(&mut self) -> roomwatch_rfid::Result<Option<CardUid>> {
        panic!("reader wiring fault");
    }

    fn self_test(&mut self) -> roomwatch_rfid::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_dead_worker_makes_node_unhealthy() {
    let mut node = node();
    let (sensor, _line) = door();
    node.orchestrator.register_sensor(sensor, "front door", POLL).unwrap();
    node.orchestrator
        .register_card_reader(PanickingReader, "main_reader", POLL)
        .unwrap();
    assert!(!node.orchestrator.is_healthy());

    node.orchestrator.start().unwrap();
    wait_until("worker exit", || !node.orchestrator.is_healthy()).await;

    node.orchestrator.stop().await;
    assert!(!node.orchestrator.is_healthy());
}

struct StuckReader;

impl CardSource for StuckReader {
    fn poll_card(&mut self) -> roomwatch_rfid::Result<Option<CardUid>> {
        std::thread::sleep(Duration::from_millis(1_000));
        Ok(None)
    }

    fn self_test(&mut self) -> roomwatch_rfid::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_stop_bounds_join_time() {
    let mut node = node();
    node.orchestrator
        .register_card_reader(StuckReader, "main_reader", POLL)
        .unwrap();
    node.orchestrator.start().unwrap();
    sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    node.orchestrator.stop().await;
    assert!(started.elapsed() < Duration::from_millis(900));
    assert!(!node.orchestrator.is_running());
}
