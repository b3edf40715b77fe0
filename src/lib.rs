//! Bongaloons - client timing core for a bongo-cat rhythm game
//!
//! Core modules:
//! - `sim`: Pausable match clock, note schedule, note animation, input routing
//! - `protocol`: Wire types exchanged with the game backend
//! - `settings`: Player configuration (backend URL, key bindings, volumes)
//! - `platform`: Browser glue (handshake, driver tick, keyboard listeners)
//! - `error`: Error taxonomy

pub mod error;
pub mod platform;
pub mod protocol;
pub mod settings;
pub mod sim;

pub use error::{ClockError, ProtocolError, StartError, TransportError, TunablesError};
pub use settings::Settings;
pub use sim::{MatchClock, Session, Snapshot};

/// Milliseconds, as reported by `performance.now()` and used on the wire.
pub type Millis = f64;

/// Game configuration constants
pub mod consts {
    use crate::Millis;

    /// Driver tick cadence (20 Hz)
    pub const TICK_INTERVAL_MS: Millis = 50.0;

    /// Time for a note to travel from spawn to the hit line
    pub const DEFAULT_FALL_DURATION_MS: Millis = 2000.0;
    /// Offset between schedule receipt and the spawn baseline
    pub const DEFAULT_LEAD_DELAY_MS: Millis = 0.0;
    /// Extra lead added to target time when computing spawn time
    pub const DEFAULT_REACTION_TIME_MS: Millis = 0.0;

    /// Default lane bindings
    pub const DEFAULT_LEFT_KEY: &str = "a";
    pub const DEFAULT_RIGHT_KEY: &str = "l";
    pub const DEFAULT_PAUSE_KEY: &str = "Escape";

    /// Default backend base URL
    pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
    /// Default song requested from `/game/start`
    pub const DEFAULT_MIDI_FILE: &str = "test.mid";
}

/// Clamp a ratio to [0, 1]
#[inline]
pub fn unit_clamp(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}
