//! Simulated wiring for running the node without GPIO or SPI.
//!
//! Every input is a [`MockInput`] and the card reader is a
//! [`SimulatedMfrc522`]. A scripted driver then walks through a fixed round
//! of activity so the full event path can be watched in the logs.

use anyhow::{Context, Result};
use roomwatch_core::{CardUid, ChannelKind, MonitorConfig};
use roomwatch_hardware::mock::{MockIndicator, MockInput, MockInputHandle};
use roomwatch_hardware::{AnyIndicator, AnyInput, AnySensor};
use roomwatch_rfid::Mfrc522;
use roomwatch_rfid::mock::{SimulatedFieldHandle, SimulatedMfrc522};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Handles that drive the simulated devices.
pub struct SimulatedField {
    lines: Vec<(ChannelKind, MockInputHandle)>,
    reader: SimulatedFieldHandle,
}

pub struct SimulatedDevices {
    pub sensors: Vec<(AnySensor, String, Duration)>,
    pub reader: Mfrc522<SimulatedMfrc522>,
    pub field: SimulatedField,
}

/// Build mock sensors and a simulated reader wired as in `config`.
pub fn build(config: &MonitorConfig) -> Result<SimulatedDevices> {
    let mut sensors = Vec::new();
    let mut lines = Vec::new();
    for (kind, input_config) in config.inputs() {
        let (input, line) = MockInput::with_name(format!("sim-{kind}"));
        let led = input_config
            .led_pin
            .map(|_| AnyIndicator::Mock(MockIndicator::new().0));
        let sensor = AnySensor::assemble(kind, input_config, AnyInput::Mock(input), led)
            .with_context(|| format!("assembling simulated {kind} sensor"))?;
        sensors.push((sensor, input_config.location(), input_config.poll_interval()));
        lines.push((kind, line));
    }

    let (chip, reader_field) = SimulatedMfrc522::new();
    let mut reader = Mfrc522::new(chip);
    reader.init().context("initializing simulated card reader")?;

    Ok(SimulatedDevices {
        sensors,
        reader,
        field: SimulatedField {
            lines,
            reader: reader_field,
        },
    })
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Line(ChannelKind, bool),
    Card(Option<CardUid>),
}

/// One round of activity: motion, door, window, a known card, an unknown card.
fn script(known: Option<CardUid>) -> Vec<Step> {
    let stranger = CardUid::from_serial([0xDE, 0xAD, 0xBE, 0xEF]);
    vec![
        Step::Line(ChannelKind::Motion, true),
        Step::Line(ChannelKind::Motion, false),
        Step::Line(ChannelKind::Door, true),
        Step::Line(ChannelKind::Door, false),
        Step::Card(known),
        Step::Card(None),
        Step::Line(ChannelKind::Window, true),
        Step::Line(ChannelKind::Window, false),
        Step::Card(Some(stranger)),
        Step::Card(None),
    ]
}

impl SimulatedField {
    fn apply(&self, step: Step) {
        match step {
            Step::Line(kind, active) => {
                if let Some((_, line)) = self.lines.iter().find(|(k, _)| *k == kind) {
                    info!(channel = %kind, active, "Simulation: drive input");
                    line.set_active(active);
                }
            }
            Step::Card(Some(uid)) => {
                info!(%uid, "Simulation: present card");
                self.reader.present_card(uid);
            }
            Step::Card(None) => {
                info!("Simulation: remove card");
                self.reader.remove_card();
            }
        }
    }

    /// Replay the script every `step` until cancelled.
    pub async fn drive(self, known: Option<CardUid>, step: Duration, cancel: CancellationToken) {
        let script = script(known);
        for next in script.iter().cycle() {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(step) => self.apply(*next),
            }
        }
    }
}
