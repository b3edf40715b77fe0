//! Timing core
//!
//! Everything that decides when a note spawns, where it is drawn and when it
//! reaches the hit line lives here. This module must stay pure:
//! - Wall time is always passed in (`now`), never read
//! - No browser or platform dependencies
//! - One clock per match, owned by the session

pub mod animator;
pub mod clock;
pub mod input;
pub mod schedule;
pub mod session;
pub mod tunables;

pub use animator::{CrossingLatch, NoteVisualState, visual_state, visual_state_at};
pub use clock::MatchClock;
pub use input::{InputOutcome, InputRouter, KeyBindings, KeyEdge, LaneKey, Pose, PressedSet, RoutedKey};
pub use schedule::{Note, NoteId, NoteSchedule, Track};
pub use session::{
    Applied, ConnectionStatus, HandshakeStage, MatchInfo, NoteView, Scoreboard, Session, Snapshot,
};
pub use tunables::Tunables;
