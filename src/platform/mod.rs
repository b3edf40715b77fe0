//! Platform abstraction layer
//!
//! Browser glue for:
//! - Time (`performance.now()`)
//! - The match-start handshake (health check, socket, start request)
//! - The single per-match driver tick
//! - Keyboard and focus events
//!
//! Natively there is no platform layer; the sim core is driven directly.

#[cfg(target_arch = "wasm32")]
pub mod web;

/// Identifies one match within a driver. Async handshake steps and socket
/// callbacks capture the value current when they were created and bail out
/// once a restart has moved it on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchGeneration(u64);

impl MatchGeneration {
    /// Move to the next match and return its generation
    pub fn advance(&mut self) -> MatchGeneration {
        self.0 = self.0.wrapping_add(1);
        *self
    }

    pub fn is(&self, other: MatchGeneration) -> bool {
        *self == other
    }
}
