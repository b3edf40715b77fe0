//! Pausable match clock
//!
//! The single source of truth for "wall time since start minus time spent
//! paused". Pause time is finalized exactly once, on resume; while a pause is
//! in progress it is derived lazily from `pause_started_at`.

use serde::{Deserialize, Serialize};

use crate::Millis;
use crate::error::ClockError;

/// Match clock with pause accounting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchClock {
    /// Wall time the match began (None before start)
    start_time: Option<Millis>,
    /// Sum of all completed pause intervals
    total_paused: Millis,
    /// Wall time the current pause began (Some exactly while paused)
    pause_started_at: Option<Millis>,
}

impl MatchClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock. A clock is single-use.
    pub fn start(&mut self, now: Millis) -> Result<(), ClockError> {
        if self.start_time.is_some() {
            log::warn!("MatchClock::start called twice");
            return Err(ClockError::AlreadyStarted);
        }
        self.start_time = Some(now);
        self.total_paused = 0.0;
        self.pause_started_at = None;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.pause_started_at.is_some()
    }

    pub fn start_time(&self) -> Option<Millis> {
        self.start_time
    }

    /// Completed pause time only (excludes a pause in progress)
    pub fn total_paused(&self) -> Millis {
        self.total_paused
    }

    /// Begin a pause. Returns `Ok(false)` if already paused.
    pub fn pause(&mut self, now: Millis) -> Result<bool, ClockError> {
        if self.start_time.is_none() {
            return Err(ClockError::NotStarted);
        }
        if self.is_paused() {
            return Ok(false);
        }
        self.pause_started_at = Some(now);
        Ok(true)
    }

    /// End the current pause, folding its length into `total_paused`.
    /// Returns `Ok(false)` if not paused.
    pub fn resume(&mut self, now: Millis) -> Result<bool, ClockError> {
        if self.start_time.is_none() {
            return Err(ClockError::NotStarted);
        }
        let Some(paused_at) = self.pause_started_at.take() else {
            return Ok(false);
        };
        self.total_paused += (now - paused_at).max(0.0);
        Ok(true)
    }

    /// Length of the pause in progress (0 when running)
    pub fn current_pause(&self, now: Millis) -> Millis {
        self.pause_started_at
            .map(|at| (now - at).max(0.0))
            .unwrap_or(0.0)
    }

    /// Wall time since start minus all paused time, including a pause in
    /// progress. Constant while paused, never negative.
    pub fn effective_elapsed(&self, now: Millis) -> Result<Millis, ClockError> {
        let start = self.start_time.ok_or(ClockError::NotStarted)?;
        // While paused, time stops at the instant the pause began
        let reference = match self.pause_started_at {
            Some(at) => at.min(now),
            None => now,
        };
        Ok((reference - start - self.total_paused).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_not_started() {
        let clock = MatchClock::new();
        assert_eq!(clock.effective_elapsed(10.0), Err(ClockError::NotStarted));

        let mut clock = MatchClock::new();
        assert_eq!(clock.pause(10.0), Err(ClockError::NotStarted));
        assert_eq!(clock.resume(10.0), Err(ClockError::NotStarted));
    }

    #[test]
    fn test_start_is_single_use() {
        let mut clock = MatchClock::new();
        clock.start(100.0).unwrap();
        assert_eq!(clock.start(200.0), Err(ClockError::AlreadyStarted));
        assert_eq!(clock.start_time(), Some(100.0));
    }

    #[test]
    fn test_resume_folds_exact_pause_interval() {
        let mut clock = MatchClock::new();
        clock.start(0.0).unwrap();
        assert_eq!(clock.pause(100.0), Ok(true));
        assert_eq!(clock.resume(600.0), Ok(true));
        assert_eq!(clock.total_paused(), 500.0);
        assert_eq!(clock.effective_elapsed(700.0), Ok(200.0));
    }

    #[test]
    fn test_pause_and_resume_are_idempotent() {
        let mut clock = MatchClock::new();
        clock.start(0.0).unwrap();
        assert_eq!(clock.resume(50.0), Ok(false));
        assert_eq!(clock.pause(100.0), Ok(true));
        assert_eq!(clock.pause(300.0), Ok(false));
        assert_eq!(clock.resume(600.0), Ok(true));
        assert_eq!(clock.resume(900.0), Ok(false));
        // Second pause() must not have moved the pause origin
        assert_eq!(clock.total_paused(), 500.0);
    }

    #[test]
    fn test_sampling_during_pause_does_not_accumulate() {
        let mut clock = MatchClock::new();
        clock.start(0.0).unwrap();
        clock.pause(1000.0).unwrap();
        // A 50ms sampler reading the clock during the pause
        let mut t = 1000.0;
        while t < 3000.0 {
            assert_eq!(clock.effective_elapsed(t), Ok(1000.0));
            assert_eq!(clock.total_paused(), 0.0);
            t += 50.0;
        }
        assert!((clock.current_pause(2500.0) - 1500.0).abs() < 1e-9);
        clock.resume(3000.0).unwrap();
        assert_eq!(clock.total_paused(), 2000.0);
        assert_eq!(clock.effective_elapsed(3000.0), Ok(1000.0));
    }

    #[test]
    fn test_time_before_start_clamps_to_zero() {
        let mut clock = MatchClock::new();
        clock.start(500.0).unwrap();
        assert_eq!(clock.effective_elapsed(100.0), Ok(0.0));
    }

    proptest! {
        #[test]
        fn prop_monotonic_without_pause(start in 0.0f64..1e6, a in 0.0f64..1e6, b in 0.0f64..1e6) {
            let mut clock = MatchClock::new();
            clock.start(start).unwrap();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let e1 = clock.effective_elapsed(start + lo).unwrap();
            let e2 = clock.effective_elapsed(start + hi).unwrap();
            prop_assert!(e2 >= e1);
        }

        #[test]
        fn prop_constant_while_paused(pause_at in 0.0f64..1e5, d1 in 0.0f64..1e5, d2 in 0.0f64..1e5) {
            let mut clock = MatchClock::new();
            clock.start(0.0).unwrap();
            clock.pause(pause_at).unwrap();
            let e1 = clock.effective_elapsed(pause_at + d1).unwrap();
            let e2 = clock.effective_elapsed(pause_at + d2).unwrap();
            prop_assert_eq!(e1, e2);
        }

        #[test]
        fn prop_total_paused_is_sum_of_intervals(intervals in prop::collection::vec((1.0f64..500.0, 1.0f64..500.0), 1..10)) {
            let mut clock = MatchClock::new();
            clock.start(0.0).unwrap();
            let mut now = 0.0;
            let mut expected = 0.0;
            for (run, paused) in intervals {
                now += run;
                clock.pause(now).unwrap();
                now += paused;
                clock.resume(now).unwrap();
                expected += paused;
            }
            prop_assert!((clock.total_paused() - expected).abs() < 1e-6);
            prop_assert!((clock.effective_elapsed(now).unwrap() - (now - expected)).abs() < 1e-6);
        }
    }
}
