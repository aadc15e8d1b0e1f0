//! Sensor channel orchestration for a roomwatch node.
//!
//! One tokio task per sensor channel polls its device, records the reading
//! in a shared [`SensorStatusTable`] and turns qualifying transitions into
//! [`Event`]s. Critical events pass through a shared [`CooldownWindow`]
//! before the [`CaptureDevice`] and [`Notifier`] are invoked.
//!
//! The camera and alerting service are traits so the node can run against
//! the in-process implementations in [`mock`].

pub mod collaborators;
pub mod cooldown;
pub mod error;
pub mod event;
pub mod mock;
pub mod orchestrator;
pub mod status;

pub use collaborators::{
    AlertChannel, CaptureDevice, CaptureError, DeliveryOutcome, DeliveryReport, MediaCapture,
    Notifier,
};
pub use cooldown::CooldownWindow;
pub use error::{MonitorError, Result};
pub use event::{Event, EventMedia, EventType, Severity};
pub use orchestrator::{
    CAMERA_CHANNEL, CardSource, DispatchOutcome, EventStats, OrchestratorSettings,
    SensorOrchestrator,
};
pub use status::{SensorChannel, SensorStatusTable};
