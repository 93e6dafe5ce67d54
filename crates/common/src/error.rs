//! Error types for Watchshot

use thiserror::Error;

/// Result type alias using Watchshot Error
pub type Result<T> = std::result::Result<T, Error>;

/// Watchshot error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown target variant: {0}")]
    UnknownVariant(String),

    #[error("No running emulator found for {0}")]
    EmulatorNotRunning(String),
}
