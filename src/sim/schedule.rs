//! Note schedule
//!
//! The immutable list of notes for one match, received once at match start.

use serde::{Deserialize, Serialize};

use crate::Millis;

/// Input track a note lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Left,
    Right,
    /// Special note, hit by pressing both lanes
    Super,
}

impl Track {
    pub fn as_str(&self) -> &'static str {
        match self {
            Track::Left => "left",
            Track::Right => "right",
            Track::Super => "super",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "left" => Some(Track::Left),
            "right" => Some(Track::Right),
            "super" => Some(Track::Super),
            _ => None,
        }
    }
}

/// A timed target on one track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Milliseconds after match start at which the note must be hit
    pub target_time: Millis,
    pub track: Track,
}

/// Index of a note within its schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(pub usize);

/// Notes for one match, ordered by target time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteSchedule {
    notes: Vec<Note>,
}

impl NoteSchedule {
    /// Build a schedule. Notes are sorted by target time (stable, so ties
    /// keep server order) and non-finite target times are dropped.
    pub fn new(notes: impl IntoIterator<Item = Note>) -> Self {
        let mut notes: Vec<Note> = notes
            .into_iter()
            .filter(|n| {
                let ok = n.target_time.is_finite();
                if !ok {
                    log::warn!("Dropping note with non-finite target time on {} track", n.track.as_str());
                }
                ok
            })
            .collect();
        notes.sort_by(|a, b| a.target_time.total_cmp(&b.target_time));
        Self { notes }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NoteId, &Note)> {
        self.notes.iter().enumerate().map(|(i, n)| (NoteId(i), n))
    }

    /// Notes on one track
    pub fn on_track(&self, track: Track) -> impl Iterator<Item = (NoteId, &Note)> {
        self.iter().filter(move |(_, n)| n.track == track)
    }

    /// Target time of the last note (0 for an empty schedule)
    pub fn last_target_time(&self) -> Millis {
        self.notes.last().map(|n| n.target_time).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(t: Millis, track: Track) -> Note {
        Note { target_time: t, track }
    }

    #[test]
    fn test_sorted_by_target_time() {
        let schedule = NoteSchedule::new([
            note(3000.0, Track::Left),
            note(1000.0, Track::Right),
            note(2000.0, Track::Super),
        ]);
        let times: Vec<_> = schedule.iter().map(|(_, n)| n.target_time).collect();
        assert_eq!(times, vec![1000.0, 2000.0, 3000.0]);
        assert_eq!(schedule.last_target_time(), 3000.0);
    }

    #[test]
    fn test_ties_keep_server_order() {
        let schedule = NoteSchedule::new([note(500.0, Track::Right), note(500.0, Track::Left)]);
        assert_eq!(schedule.get(NoteId(0)).map(|n| n.track), Some(Track::Right));
        assert_eq!(schedule.get(NoteId(1)).map(|n| n.track), Some(Track::Left));
    }

    #[test]
    fn test_non_finite_dropped() {
        let schedule = NoteSchedule::new([note(f64::NAN, Track::Left), note(10.0, Track::Left)]);
        assert_eq!(schedule.len(), 1);
    }

    #[test]
    fn test_on_track() {
        let schedule = NoteSchedule::new([
            note(1.0, Track::Left),
            note(2.0, Track::Right),
            note(3.0, Track::Left),
        ]);
        assert_eq!(schedule.on_track(Track::Left).count(), 2);
        assert_eq!(schedule.on_track(Track::Super).count(), 0);
    }

    #[test]
    fn test_track_parse() {
        assert_eq!(Track::from_str("SUPER"), Some(Track::Super));
        assert_eq!(Track::from_str("middle"), None);
        assert_eq!(Track::Left.as_str(), "left");
    }
}
