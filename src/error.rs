//! Error types for the NTRIP relay

use thiserror::Error;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to resolve supplied address: {0}")]
    Resolve(String),

    #[error("Invalid status string: {0}")]
    InvalidStatus(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Invalid chunk length: {0}")]
    InvalidChunkLength(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Failure on the relay's source (client) leg
    #[error("source: {0}")]
    Source(Box<Error>),

    /// Failure on the relay's destination (server) leg
    #[error("destination: {0}")]
    Destination(Box<Error>),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
