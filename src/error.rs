//! Typed errors for anything the relay itself needs to branch on (HTTP
//! status, WebSocket close code). Process-boundary failures (config load,
//! listener bind) are reported with `anyhow::Context` instead — see
//! `main.rs`.

use thiserror::Error;

/// The relay's own fallible operations, mapped onto the taxonomy in spec §7.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid or missing token")]
    InvalidToken,

    #[error("session not found")]
    SessionNotFound,

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to bind listener: {0}")]
    BindFailed(String),
}

impl RelayError {
    /// WebSocket close code to use when this error ends an upgrade attempt.
    pub fn close_code(&self) -> u16 {
        match self {
            RelayError::SessionNotFound => 4004,
            RelayError::InvalidToken => 4001,
            _ => 1011,
        }
    }

    /// Human-readable close reason sent alongside [`RelayError::close_code`].
    pub fn close_reason(&self) -> &'static str {
        match self {
            RelayError::SessionNotFound => "Session not found",
            RelayError::InvalidToken => "Invalid token",
            _ => "Internal error",
        }
    }
}
