//! Per-match timing tunables
//!
//! Validated once at load so the per-tick math never sees a non-positive
//! fall duration.

use serde::Serialize;

use crate::Millis;
use crate::consts::*;
use crate::error::TunablesError;
use crate::sim::schedule::Note;

/// Timing parameters for one match
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tunables {
    fall_duration: Millis,
    lead_delay: Millis,
    reaction_time: Millis,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            fall_duration: DEFAULT_FALL_DURATION_MS,
            lead_delay: DEFAULT_LEAD_DELAY_MS,
            reaction_time: DEFAULT_REACTION_TIME_MS,
        }
    }
}

impl Tunables {
    pub fn new(
        fall_duration: Millis,
        lead_delay: Millis,
        reaction_time: Millis,
    ) -> Result<Self, TunablesError> {
        if !fall_duration.is_finite() {
            return Err(TunablesError::NonFinite("fall duration"));
        }
        if !lead_delay.is_finite() {
            return Err(TunablesError::NonFinite("lead delay"));
        }
        if !reaction_time.is_finite() {
            return Err(TunablesError::NonFinite("reaction time"));
        }
        if fall_duration <= 0.0 {
            return Err(TunablesError::NonPositiveFallDuration(fall_duration));
        }
        Ok(Self {
            fall_duration,
            lead_delay,
            reaction_time,
        })
    }

    /// Resolve each value from the first source that sets it, falling back
    /// to the crate defaults.
    pub fn resolve(
        fall_duration: &[Option<Millis>],
        lead_delay: &[Option<Millis>],
        reaction_time: &[Option<Millis>],
    ) -> Result<Self, TunablesError> {
        let first = |vals: &[Option<Millis>], default| vals.iter().flatten().copied().next().unwrap_or(default);
        Self::new(
            first(fall_duration, DEFAULT_FALL_DURATION_MS),
            first(lead_delay, DEFAULT_LEAD_DELAY_MS),
            first(reaction_time, DEFAULT_REACTION_TIME_MS),
        )
    }

    pub fn fall_duration(&self) -> Millis {
        self.fall_duration
    }

    pub fn lead_delay(&self) -> Millis {
        self.lead_delay
    }

    pub fn reaction_time(&self) -> Millis {
        self.reaction_time
    }

    /// Effective elapsed time at which `note` appears
    #[inline]
    pub fn spawn_time(&self, note: &Note) -> Millis {
        note.target_time - self.fall_duration + self.lead_delay + self.reaction_time
    }

    /// Effective elapsed time at which `note` reaches the hit line
    #[inline]
    pub fn arrival_time(&self, note: &Note) -> Millis {
        self.spawn_time(note) + self.fall_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::schedule::Track;

    #[test]
    fn test_rejects_non_positive_fall_duration() {
        assert_eq!(
            Tunables::new(0.0, 0.0, 0.0),
            Err(TunablesError::NonPositiveFallDuration(0.0))
        );
        assert!(Tunables::new(-5.0, 0.0, 0.0).is_err());
        assert!(Tunables::new(f64::INFINITY, 0.0, 0.0).is_err());
        assert!(Tunables::new(100.0, f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_spawn_time() {
        let t = Tunables::new(2000.0, 250.0, 100.0).unwrap();
        let note = Note { target_time: 3000.0, track: Track::Left };
        assert_eq!(t.spawn_time(&note), 1350.0);
        assert_eq!(t.arrival_time(&note), 3350.0);
    }

    #[test]
    fn test_resolve_precedence() {
        let t = Tunables::resolve(&[None, Some(1500.0)], &[Some(10.0), Some(20.0)], &[]).unwrap();
        assert_eq!(t.fall_duration(), 1500.0);
        assert_eq!(t.lead_delay(), 10.0);
        assert_eq!(t.reaction_time(), DEFAULT_REACTION_TIME_MS);

        assert!(Tunables::resolve(&[Some(0.0), Some(1500.0)], &[], &[]).is_err());
    }
}
