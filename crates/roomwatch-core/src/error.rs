use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Card errors
    #[error("Invalid card UID: expected {expected} bytes, got {actual}")]
    InvalidUid { expected: usize, actual: usize },

    #[error("Unknown access role: {0}")]
    UnknownRole(String),

    #[error("Unknown channel kind: {0}")]
    UnknownChannelKind(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
