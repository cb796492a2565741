use thiserror::Error;

use crate::handler::Method;

/// Fault raised by a handler while servicing one call.
///
/// The fan-out logs these and moves on; they never reach the host as a failed request.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler does not implement `{0}`")]
    Unsupported(Method),
    #[error("{0}")]
    Failed(String),
    #[error("handler panicked")]
    Panicked,
    #[error(transparent)]
    Host(#[from] HostError),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;

/// Failure of a host-service round trip.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("host connection closed before replying")]
    Disconnected,
    #[error("host reported: {0}")]
    Remote(String),
    #[error("malformed host reply: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("handler not found: {0}")]
    NotFound(String),
    #[error("handler `{id}` failed to load: {reason}")]
    Load { id: String, reason: String },
    #[error("handler `{0}` is already registered")]
    AlreadyRegistered(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("row {row} is past the end of the document ({rows} rows)")]
    RowOutOfRange { row: u32, rows: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("minDelayMs must be greater than zero")]
    ZeroMinDelay,
    #[error("maxDelayMs ({max}) must not be below minDelayMs ({min})")]
    DelayBounds { min: u64, max: u64 },
}
