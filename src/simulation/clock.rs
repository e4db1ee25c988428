//! Simulated match clock
//!
//! Time only moves forward while the match is not paused. Wall time spent
//! paused is counted separately and never reaches the simulation, so beat
//! alignment survives a pause.

use serde::{Deserialize, Serialize};

use crate::core::types::TimeMs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchClock {
    elapsed_ms: TimeMs,
    paused: bool,
    paused_ms: TimeMs,
    pauses: u32,
}

impl MatchClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated time since the match started
    pub fn now(&self) -> TimeMs {
        self.elapsed_ms
    }

    /// Feed `dt_ms` of wall time into the clock
    pub fn advance(&mut self, dt_ms: TimeMs) -> TimeMs {
        if self.paused {
            self.paused_ms += dt_ms;
        } else {
            self.elapsed_ms += dt_ms;
        }
        self.elapsed_ms
    }

    /// Returns false if already paused
    pub fn pause(&mut self) -> bool {
        if self.paused {
            return false;
        }
        self.paused = true;
        self.pauses += 1;
        true
    }

    /// Returns false if not paused
    pub fn resume(&mut self) -> bool {
        std::mem::replace(&mut self.paused, false)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Total wall time spent paused
    pub fn paused_ms(&self) -> TimeMs {
        self.paused_ms
    }

    pub fn pauses(&self) -> u32 {
        self.pauses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_freezes_simulated_time() {
        let mut clock = MatchClock::new();
        clock.advance(500);
        assert!(clock.pause());
        assert!(!clock.pause());
        clock.advance(2000);
        assert_eq!(clock.now(), 500);
        assert_eq!(clock.paused_ms(), 2000);
        assert!(clock.resume());
        assert!(!clock.resume());
        assert_eq!(clock.advance(250), 750);
        assert_eq!(clock.pauses(), 1);
    }
}
