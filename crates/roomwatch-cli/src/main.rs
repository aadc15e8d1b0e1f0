//! roomwatch node.
//!
//! Polls the motion, door and window inputs and the card reader, raises
//! security events and dispatches alerts. Runs until Ctrl-C, or exits with a
//! failure status as soon as a channel worker dies.

mod simulation;

use anyhow::{Context, Result, bail};
use clap::Parser;
use roomwatch_core::{AccessTable, MonitorConfig};
use roomwatch_monitor::SensorOrchestrator;
use roomwatch_monitor::mock::{RecordingCapture, RecordingNotifier};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Delay between steps of the simulated activity script.
const SIMULATION_STEP: Duration = Duration::from_secs(3);

/// Room security monitoring node
#[derive(Parser, Debug)]
#[command(name = "roomwatch", version, about)]
struct Args {
    /// Path to TOML configuration file; built-in defaults when omitted
    #[arg(short, long, env = "ROOMWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Use mock inputs and the simulated card reader instead of GPIO and SPI
    #[arg(long)]
    simulate: bool,

    /// Self-test every channel, print the results as JSON and exit
    #[arg(long)]
    self_test: bool,

    /// GPIO character device the inputs, LEDs and reader reset line are on
    #[arg(long, default_value = "/dev/gpiochip0")]
    gpio_chip: String,

    /// Directory where captured media is written
    #[arg(long, default_value = "media")]
    media_dir: PathBuf,
}

type Node = SensorOrchestrator<RecordingCapture, RecordingNotifier>;

fn load_config(path: Option<&PathBuf>) -> Result<MonitorConfig> {
    match path {
        Some(path) => MonitorConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => {
            let config = MonitorConfig::default();
            config.validate().context("validating built-in configuration")?;
            Ok(config)
        }
    }
}

/// Open the GPIO inputs and the card reader and register them.
///
/// The returned line holds the reader's reset pin high and must outlive the
/// node.
#[cfg(target_os = "linux")]
fn register_hardware(
    node: &mut Node,
    config: &MonitorConfig,
    gpio_chip: &str,
) -> Result<Option<roomwatch_hardware::cdev::CdevOutput>> {
    use roomwatch_hardware::cdev::CdevOutput;
    use roomwatch_hardware::{AnySensor, Level};

    for (kind, input) in config.inputs() {
        let sensor = AnySensor::open_cdev(gpio_chip, kind, input)
            .with_context(|| format!("opening {kind} sensor on GPIO {}", input.pin))?;
        node.register_sensor(sensor, input.location(), input.poll_interval())?;
    }

    let rfid = &config.rfid;
    let reset = rfid
        .reset_pin
        .map(|pin| {
            CdevOutput::open(gpio_chip, pin, Level::High)
                .with_context(|| format!("driving card reader reset on GPIO {pin}"))
        })
        .transpose()?;
    let reader = roomwatch_rfid::spidev::open(rfid)
        .with_context(|| format!("opening card reader on {}", rfid.spidev_path()))?;
    node.register_card_reader(reader, rfid.location.clone(), rfid.poll_interval())?;
    Ok(reset)
}

#[cfg(not(target_os = "linux"))]
fn register_hardware(_node: &mut Node, _config: &MonitorConfig, _gpio_chip: &str) -> Result<Option<()>> {
    bail!("GPIO and SPI access needs Linux; run with --simulate")
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;
    info!(
        config = ?args.config,
        simulate = args.simulate,
        cooldown_secs = config.event_cooldown_secs,
        "roomwatch starting"
    );

    let capture = RecordingCapture::new().with_media_dir(&args.media_dir);
    let mut node = SensorOrchestrator::from_config(&config, capture, RecordingNotifier::new())?;
    info!(cards = node.access_table().len(), "Access table loaded");

    let cancel = CancellationToken::new();
    let mut simulation = None;
    let _reset_line = if args.simulate {
        let devices = simulation::build(&config)?;
        for (sensor, location, interval) in devices.sensors {
            node.register_sensor(sensor, location, interval)?;
        }
        node.register_card_reader(devices.reader, config.rfid.location.clone(), config.rfid.poll_interval())?;
        simulation = Some(devices.field);
        None
    } else {
        register_hardware(&mut node, &config, &args.gpio_chip)?
    };

    if args.self_test {
        let results = node.test_all().await;
        println!("{}", serde_json::to_string_pretty(&results)?);
        if results.values().any(|passed| !passed) {
            bail!("self-test failed");
        }
        return Ok(());
    }

    node.start()?;

    let driver = simulation.map(|field| {
        let known = config
            .authorized_cards
            .clone()
            .unwrap_or_else(AccessTable::default_records)
            .first()
            .map(|record| record.uid);
        tokio::spawn(field.drive(known, SIMULATION_STEP, cancel.clone()))
    });

    let mut health = tokio::time::interval(config.health_check_interval());
    health.tick().await;
    let outcome = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("Shutdown requested"),
                    Err(err) => error!(error = %err, "Failed to listen for Ctrl-C, shutting down"),
                }
                break Ok(());
            }
            _ = health.tick() => {
                if !node.is_healthy() {
                    error!("A channel worker has stopped, shutting down");
                    break Err(anyhow::anyhow!("channel worker stopped unexpectedly"));
                }
                let stats = node.stats();
                info!(
                    raised = stats.raised,
                    dispatched = stats.dispatched,
                    suppressed = stats.suppressed,
                    status = %serde_json::to_string(&node.get_status())?,
                    "Health check passed"
                );
            }
        }
    };

    cancel.cancel();
    if let Some(driver) = driver
        && let Err(err) = driver.await
    {
        warn!(error = %err, "Simulation driver ended abnormally");
    }
    node.stop().await;
    info!("roomwatch stopped");
    outcome
}
