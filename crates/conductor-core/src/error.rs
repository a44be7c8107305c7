//! Error types for conductor-core

use thiserror::Error;

/// Result type alias for conductor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in conductor-core
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An OSC message that does not match the parameter protocol
    #[error("Decode error: {0}")]
    Decode(String),

    /// OSC wire encoding/decoding error
    #[error("OSC error: {0}")]
    Osc(#[from] rosc::OscError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
