//! Error taxonomy
//!
//! Nothing here is fatal to the process. Clock misuse and bad tunables are
//! programming/configuration errors; transport errors only ever change the
//! session's connection status.

use thiserror::Error;

/// Misuse of a [`MatchClock`](crate::sim::MatchClock)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClockError {
    #[error("match clock has not been started")]
    NotStarted,
    #[error("match clock was already started; clocks are single-use")]
    AlreadyStarted,
}

/// Rejected per-match tunables
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TunablesError {
    #[error("fall duration must be positive, got {0} ms")]
    NonPositiveFallDuration(f64),
    #[error("{0} must be a finite number of milliseconds")]
    NonFinite(&'static str),
}

/// Failure somewhere in the match-start handshake
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("backend health check failed: {0}")]
    HealthCheck(String),
    #[error("websocket error: {0}")]
    Socket(String),
    #[error("start-match request failed: {0}")]
    StartRequest(String),
    #[error("could not decode backend response: {0}")]
    Decode(String),
}

/// Malformed frame on the wire
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a match could not be started from a start payload
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StartError {
    #[error("start payload arrived before the socket was acknowledged open")]
    SocketNotReady,
    #[error(transparent)]
    Tunables(#[from] TunablesError),
    #[error(transparent)]
    Clock(#[from] ClockError),
}
