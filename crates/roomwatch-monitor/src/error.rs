//! Error types for the orchestrator.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Orchestrator is already running")]
    AlreadyRunning,

    #[error("Orchestrator has been stopped and cannot be restarted")]
    Stopped,

    #[error("Channels can only be registered before start")]
    RegistrationClosed,

    #[error("Channel {0} is already registered")]
    DuplicateChannel(String),

    #[error("Channel {0} has a zero poll interval")]
    ZeroInterval(String),

    #[error("Configuration error: {0}")]
    Config(#[from] roomwatch_core::Error),
}
