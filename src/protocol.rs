//! Wire protocol shared with the game backend
//!
//! The backend owns these formats; the types here mirror what it sends and
//! accepts. Inbound messages are tagged by `type`. Outbound key presses are a
//! bare `{"key": ...}` object, everything else is tagged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Millis;
use crate::error::ProtocolError;
use crate::sim::input::LaneKey;
use crate::sim::schedule::{Note, NoteSchedule, Track};

/// Timing judgement assigned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Judgement {
    Perfect,
    PerfectEarly,
    PerfectLate,
    GoodEarly,
    GoodLate,
    MehEarly,
    MehLate,
    BadEarly,
    BadLate,
    Miss,
    Oops,
    /// Anything the client doesn't recognize, kept verbatim
    Other(String),
}

impl Judgement {
    pub fn as_wire(&self) -> &str {
        match self {
            Judgement::Perfect => "perfect",
            Judgement::PerfectEarly => "perfect early",
            Judgement::PerfectLate => "perfect late",
            Judgement::GoodEarly => "good early",
            Judgement::GoodLate => "good late",
            Judgement::MehEarly => "meh early",
            Judgement::MehLate => "meh late",
            Judgement::BadEarly => "bad early",
            Judgement::BadLate => "bad late",
            Judgement::Miss => "MISS",
            Judgement::Oops => "OOPS",
            Judgement::Other(s) => s,
        }
    }

    /// Points the backend awards for this judgement
    pub fn score(&self) -> i32 {
        match self {
            Judgement::Perfect => 1000,
            Judgement::PerfectEarly | Judgement::PerfectLate => 900,
            Judgement::GoodEarly | Judgement::GoodLate => 500,
            Judgement::MehEarly | Judgement::MehLate => 200,
            Judgement::BadEarly | Judgement::BadLate => 50,
            Judgement::Miss => -100,
            Judgement::Oops => -50,
            Judgement::Other(_) => 0,
        }
    }

    /// Big on-screen label
    pub fn label(&self) -> &str {
        match self {
            Judgement::Perfect | Judgement::PerfectEarly | Judgement::PerfectLate => "PERFECT",
            Judgement::GoodEarly | Judgement::GoodLate => "GOOD",
            Judgement::MehEarly | Judgement::MehLate => "MEH",
            Judgement::BadEarly | Judgement::BadLate => "BAD",
            Judgement::Miss => "MISS",
            Judgement::Oops => "OOPS",
            Judgement::Other(s) => s,
        }
    }

    /// True for judgements that connect with a note
    pub fn is_hit(&self) -> bool {
        !matches!(self, Judgement::Miss | Judgement::Oops | Judgement::Other(_))
    }
}

impl From<String> for Judgement {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "perfect" => Judgement::Perfect,
            "perfect early" => Judgement::PerfectEarly,
            "perfect late" => Judgement::PerfectLate,
            "good early" => Judgement::GoodEarly,
            "good late" => Judgement::GoodLate,
            "meh early" => Judgement::MehEarly,
            "meh late" => Judgement::MehLate,
            "bad early" => Judgement::BadEarly,
            "bad late" => Judgement::BadLate,
            "miss" => Judgement::Miss,
            "oops" => Judgement::Oops,
            _ => Judgement::Other(s),
        }
    }
}

impl From<Judgement> for String {
    fn from(j: Judgement) -> Self {
        match j {
            Judgement::Other(s) => s,
            other => other.as_wire().to_string(),
        }
    }
}

/// One falling dot as sent by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallingDot {
    pub target_time: Millis,
    pub track: String,
}

/// Response body of the start-match request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStartPayload {
    #[serde(rename = "falling_dots")]
    pub falling_dots: Vec<FallingDot>,
    #[serde(default)]
    pub fall_duration: Option<Millis>,
    #[serde(default)]
    pub delay: Option<Millis>,
    #[serde(default)]
    pub reaction_time: Option<Millis>,
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default)]
    pub song_name: Option<String>,
    #[serde(default)]
    pub song_path: Option<String>,
    /// Match length in backend units, when provided
    #[serde(default)]
    pub duration: Option<f64>,
}

impl MatchStartPayload {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build the note schedule, dropping dots on unknown tracks
    pub fn schedule(&self) -> NoteSchedule {
        NoteSchedule::new(self.falling_dots.iter().filter_map(|dot| {
            match Track::from_str(&dot.track) {
                Some(track) => Some(Note {
                    target_time: dot.target_time,
                    track,
                }),
                None => {
                    log::warn!("Ignoring dot on unknown track {:?}", dot.track);
                    None
                }
            }
        }))
    }
}

/// One row of the end-of-match breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub truth_time: Option<f64>,
    pub hit_time: Option<f64>,
    pub difference: Option<f64>,
    pub judgement: Option<Judgement>,
}

/// Per-track results, keyed by track name
pub type ScoreTable = BTreeMap<String, Vec<ScoreRow>>;

/// Messages streamed from the backend over the socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    HitRegistered {
        #[serde(default, rename = "lastJudgement", alias = "last_judgement")]
        last_judgement: Option<Judgement>,
        #[serde(default, rename = "totalScore", alias = "total_score")]
        total_score: Option<f64>,
        #[serde(default, rename = "currentStreak", alias = "current_streak")]
        current_streak: Option<u32>,
        #[serde(default, rename = "maxStreak", alias = "max_streak")]
        max_streak: Option<u32>,
    },
    NoteMissed {
        #[serde(default)]
        judgement: Option<Judgement>,
        #[serde(default, rename = "totalScore", alias = "total_score")]
        total_score: Option<f64>,
    },
    GameOver {
        #[serde(default)]
        scores: Option<ScoreTable>,
        #[serde(default, rename = "lastJudgement", alias = "last_judgement")]
        last_judgement: Option<Judgement>,
        #[serde(default, rename = "totalScore", alias = "total_score")]
        total_score: Option<f64>,
        #[serde(default, rename = "maxStreak", alias = "max_streak")]
        max_streak: Option<u32>,
    },
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Control messages sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    TogglePause,
    EndGame,
    SuperDetected {
        #[serde(rename = "noteTargetTime")]
        note_target_time: Millis,
    },
}

/// Anything the client sends over the socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Key { key: String },
    Control(ControlMessage),
}

impl OutboundMessage {
    pub fn key(lane: LaneKey) -> Self {
        OutboundMessage::Key {
            key: lane.wire_key().to_string(),
        }
    }

    pub fn toggle_pause() -> Self {
        OutboundMessage::Control(ControlMessage::TogglePause)
    }

    pub fn end_game() -> Self {
        OutboundMessage::Control(ControlMessage::EndGame)
    }

    pub fn super_detected(note_target_time: Millis) -> Self {
        OutboundMessage::Control(ControlMessage::SuperDetected { note_target_time })
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Final results of a match
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameOverReport {
    pub scores: ScoreTable,
    pub last_judgement: Option<Judgement>,
    pub total_score: Option<f64>,
    pub max_streak: Option<u32>,
}

impl GameOverReport {
    /// How many times each judgement occurred, across all tracks
    pub fn tally(&self) -> BTreeMap<Judgement, usize> {
        let mut counts = BTreeMap::new();
        for row in self.scores.values().flatten() {
            if let Some(j) = &row.judgement {
                *counts.entry(j.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_judgement_strings() {
        assert_eq!(Judgement::from("perfect early".to_string()), Judgement::PerfectEarly);
        assert_eq!(Judgement::from("MISS".to_string()), Judgement::Miss);
        assert_eq!(Judgement::from("Perfect".to_string()), Judgement::Perfect);
        assert_eq!(
            Judgement::from("Good".to_string()),
            Judgement::Other("Good".to_string())
        );
        assert_eq!(Judgement::GoodLate.label(), "GOOD");
        assert_eq!(Judgement::Oops.score(), -50);
        assert!(!Judgement::Miss.is_hit());
    }

    #[test]
    fn test_decode_start_payload() {
        let json = r#"{
            "status": "started",
            "falling_dots": [
                {"move": "left", "target_time": 3000, "track": "left"},
                {"target_time": 1500, "track": "super"},
                {"target_time": 2000, "track": "middle"}
            ],
            "fallDuration": 1800,
            "bpm": 120,
            "songName": "Test Song",
            "songPath": "/songs/test.mp3"
        }"#;
        let payload = MatchStartPayload::decode(json).unwrap();
        assert_eq!(payload.fall_duration, Some(1800.0));
        assert_eq!(payload.delay, None);
        assert_eq!(payload.song_name.as_deref(), Some("Test Song"));

        let schedule = payload.schedule();
        assert_eq!(schedule.len(), 2);
        let first = schedule.iter().next().map(|(_, n)| *n);
        assert_eq!(first, Some(Note { target_time: 1500.0, track: Track::Super }));
    }

    #[test]
    fn test_decode_server_messages() {
        let msg = ServerMessage::decode(
            r#"{"type":"hit_registered","lastJudgement":"good late","totalScore":1500,"currentStreak":3,"maxStreak":5}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ServerMessage::HitRegistered {
                last_judgement: Some(Judgement::GoodLate),
                total_score: Some(1500.0),
                current_streak: Some(3),
                max_streak: Some(5),
            }
        );

        // snake_case spellings are accepted too
        let msg = ServerMessage::decode(
            r#"{"type":"game_over","scores":{"left":[{"truth_time":1.0,"hit_time":null,"difference":null,"judgement":"MISS"}]},"total_score":2,"last_judgement":"MISS"}"#,
        )
        .unwrap();
        match msg {
            ServerMessage::GameOver { scores, total_score, last_judgement, .. } => {
                assert_eq!(total_score, Some(2.0));
                assert_eq!(last_judgement, Some(Judgement::Miss));
                assert_eq!(scores.map(|s| s["left"].len()), Some(1));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            ServerMessage::decode(r#"{"type":"heartbeat"}"#).unwrap(),
            ServerMessage::Unknown
        );
        assert!(ServerMessage::decode("not json").is_err());
    }

    #[test]
    fn test_encode_outbound() {
        assert_eq!(OutboundMessage::key(LaneKey::Left).encode().unwrap(), r#"{"key":"a"}"#);
        assert_eq!(
            OutboundMessage::toggle_pause().encode().unwrap(),
            r#"{"type":"toggle_pause"}"#
        );
        assert_eq!(OutboundMessage::end_game().encode().unwrap(), r#"{"type":"end_game"}"#);
        assert_eq!(
            OutboundMessage::super_detected(4000.0).encode().unwrap(),
            r#"{"type":"super_detected","noteTargetTime":4000.0}"#
        );
    }

    #[test]
    fn test_report_tally() {
        let mut scores = ScoreTable::new();
        let row = |j: Judgement| ScoreRow {
            truth_time: Some(1.0),
            hit_time: None,
            difference: None,
            judgement: Some(j),
        };
        scores.insert("left".into(), vec![row(Judgement::Miss), row(Judgement::Perfect)]);
        scores.insert("right".into(), vec![row(Judgement::Miss)]);
        let report = GameOverReport { scores, ..Default::default() };
        let tally = report.tally();
        assert_eq!(tally[&Judgement::Miss], 2);
        assert_eq!(tally[&Judgement::Perfect], 1);
    }
}
