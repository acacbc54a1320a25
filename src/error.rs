//! Error types for the bot.

use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistent-store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Store returned status {status} for {path}")]
    UnexpectedStatus { path: String, status: u16 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Chat-platform client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: String },

    #[error("API returned status {status} for {what}")]
    UnexpectedStatus { what: String, status: u16 },

    #[error("Failed to send message to {channel_id}: {reason}")]
    SendFailed { channel_id: String, reason: String },

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Command handler errors.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command {name} failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("Command returned neither content nor embed")]
    EmptyResult,
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
