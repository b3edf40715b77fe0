//! Keyboard routing
//!
//! Maps raw key edges to the pressed-lane set, the bongo cat's pose and the
//! outbound key messages. Down-edges are swallowed while paused; up-edges are
//! always processed so a lane can never get stuck down.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::protocol::OutboundMessage;

/// One of the two playable lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaneKey {
    Left,
    Right,
}

impl LaneKey {
    /// Key name the backend expects for this lane
    pub fn wire_key(&self) -> &'static str {
        match self {
            LaneKey::Left => "a",
            LaneKey::Right => "l",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Down,
    Up,
}

/// Bongo cat animation frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pose {
    #[default]
    Idle,
    Left,
    Right,
    Both,
}

impl Pose {
    /// Pose for a set of held lanes
    pub fn from_pressed(pressed: PressedSet) -> Self {
        match (pressed.left, pressed.right) {
            (false, false) => Pose::Idle,
            (true, false) => Pose::Left,
            (false, true) => Pose::Right,
            (true, true) => Pose::Both,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Pose::Idle => "idle",
            Pose::Left => "left",
            Pose::Right => "right",
            Pose::Both => "both",
        }
    }
}

/// Lanes currently held down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PressedSet {
    left: bool,
    right: bool,
}

impl PressedSet {
    pub fn contains(&self, lane: LaneKey) -> bool {
        match lane {
            LaneKey::Left => self.left,
            LaneKey::Right => self.right,
        }
    }

    /// Returns true if the lane was not already held
    fn insert(&mut self, lane: LaneKey) -> bool {
        let slot = self.slot(lane);
        !std::mem::replace(slot, true)
    }

    fn remove(&mut self, lane: LaneKey) -> bool {
        let slot = self.slot(lane);
        std::mem::replace(slot, false)
    }

    fn slot(&mut self, lane: LaneKey) -> &mut bool {
        match lane {
            LaneKey::Left => &mut self.left,
            LaneKey::Right => &mut self.right,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.left && !self.right
    }
}

/// Physical key names (as in `KeyboardEvent.key`) for each action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub left: String,
    pub right: String,
    pub pause: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            left: DEFAULT_LEFT_KEY.to_string(),
            right: DEFAULT_RIGHT_KEY.to_string(),
            pause: DEFAULT_PAUSE_KEY.to_string(),
        }
    }
}

/// What a physical key means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutedKey {
    Lane(LaneKey),
    Pause,
}

impl KeyBindings {
    pub fn route(&self, key: &str) -> Option<RoutedKey> {
        if key.eq_ignore_ascii_case(&self.left) {
            Some(RoutedKey::Lane(LaneKey::Left))
        } else if key.eq_ignore_ascii_case(&self.right) {
            Some(RoutedKey::Lane(LaneKey::Right))
        } else if key.eq_ignore_ascii_case(&self.pause) {
            Some(RoutedKey::Pause)
        } else {
            None
        }
    }
}

/// Result of routing one lane edge
#[derive(Debug, Clone, PartialEq)]
pub struct InputOutcome {
    /// Pose after the edge (emitted on every edge)
    pub pose: Pose,
    /// Message to forward to the backend, if any
    pub outbound: Option<OutboundMessage>,
}

/// Owns the pressed-lane set and the pause key latch
#[derive(Debug, Clone, Default)]
pub struct InputRouter {
    bindings: KeyBindings,
    pressed: PressedSet,
    pause_held: bool,
}

impl InputRouter {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            pressed: PressedSet::default(),
            pause_held: false,
        }
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    pub fn pressed(&self) -> PressedSet {
        self.pressed
    }

    pub fn pose(&self) -> Pose {
        Pose::from_pressed(self.pressed)
    }

    /// Route a lane edge. A down-edge while paused is dropped outright;
    /// auto-repeat downs for a held lane update nothing and send nothing.
    pub fn on_lane(&mut self, lane: LaneKey, edge: KeyEdge, paused_now: bool) -> InputOutcome {
        let outbound = match edge {
            KeyEdge::Down if paused_now => None,
            KeyEdge::Down => self
                .pressed
                .insert(lane)
                .then(|| OutboundMessage::key(lane)),
            KeyEdge::Up => {
                self.pressed.remove(lane);
                None
            }
        };
        InputOutcome {
            pose: self.pose(),
            outbound,
        }
    }

    /// Route a pause key edge. Returns true only on the press that starts
    /// a hold; auto-repeat downs are ignored until the key comes back up.
    pub fn on_pause(&mut self, edge: KeyEdge) -> bool {
        match edge {
            KeyEdge::Down => !std::mem::replace(&mut self.pause_held, true),
            KeyEdge::Up => {
                self.pause_held = false;
                false
            }
        }
    }

    /// Release everything (window blur, match end)
    pub fn release_all(&mut self) -> Pose {
        self.pressed = PressedSet::default();
        self.pause_held = false;
        self.pose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_from_pressed() {
        let mut router = InputRouter::default();
        assert_eq!(router.pose(), Pose::Idle);
        assert_eq!(router.on_lane(LaneKey::Left, KeyEdge::Down, false).pose, Pose::Left);
        assert_eq!(router.on_lane(LaneKey::Right, KeyEdge::Down, false).pose, Pose::Both);
        assert_eq!(router.on_lane(LaneKey::Left, KeyEdge::Up, false).pose, Pose::Right);
        assert_eq!(router.on_lane(LaneKey::Right, KeyEdge::Up, false).pose, Pose::Idle);
    }

    #[test]
    fn test_down_forwards_key_message() {
        let mut router = InputRouter::default();
        let out = router.on_lane(LaneKey::Right, KeyEdge::Down, false);
        assert_eq!(out.outbound, Some(OutboundMessage::key(LaneKey::Right)));
        // Auto-repeat
        let out = router.on_lane(LaneKey::Right, KeyEdge::Down, false);
        assert_eq!(out.outbound, None);
        assert_eq!(out.pose, Pose::Right);
    }

    #[test]
    fn test_down_swallowed_while_paused() {
        let mut router = InputRouter::default();
        let out = router.on_lane(LaneKey::Left, KeyEdge::Down, true);
        assert_eq!(out.outbound, None);
        assert_eq!(out.pose, Pose::Idle);
        assert!(router.pressed().is_empty());
    }

    #[test]
    fn test_up_processed_while_paused() {
        let mut router = InputRouter::default();
        router.on_lane(LaneKey::Left, KeyEdge::Down, false);
        let out = router.on_lane(LaneKey::Left, KeyEdge::Up, true);
        assert_eq!(out.pose, Pose::Idle);
        assert!(!router.pressed().contains(LaneKey::Left));
    }

    #[test]
    fn test_bindings_route() {
        let bindings = KeyBindings::default();
        assert_eq!(bindings.route("A"), Some(RoutedKey::Lane(LaneKey::Left)));
        assert_eq!(bindings.route("l"), Some(RoutedKey::Lane(LaneKey::Right)));
        assert_eq!(bindings.route("Escape"), Some(RoutedKey::Pause));
        assert_eq!(bindings.route("q"), None);
    }

    #[test]
    fn test_release_all() {
        let mut router = InputRouter::default();
        router.on_lane(LaneKey::Left, KeyEdge::Down, false);
        router.on_lane(LaneKey::Right, KeyEdge::Down, false);
        assert_eq!(router.release_all(), Pose::Idle);
    }

    #[test]
    fn test_pause_key_fires_once_per_hold() {
        let mut router = InputRouter::default();
        assert!(router.on_pause(KeyEdge::Down));
        // Auto-repeat
        assert!(!router.on_pause(KeyEdge::Down));
        assert!(!router.on_pause(KeyEdge::Down));
        assert!(!router.on_pause(KeyEdge::Up));
        assert!(router.on_pause(KeyEdge::Down));

        // A blur drops the hold, so the next press counts
        router.release_all();
        assert!(router.on_pause(KeyEdge::Down));
    }
}
