use std::time::Duration;
use thiserror::Error;

/// Protocol-level failures of an RCON session.
///
/// The polling worker treats every variant the same way (log, back off,
/// redo the full handshake), but keeping them distinct makes the log lines
/// say what actually went wrong.
#[derive(Debug, Error)]
pub enum RconError {
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("authentication rejected by server")]
    AuthRejected,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RconError>;
