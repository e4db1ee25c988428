//! Potentials - mobile units walking a precomputed path

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::core::error::{DissonanceError, Result};
use crate::core::types::{PlayerId, Position, PotentialId, TimeMs, UnitKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PotentialKind {
    Epsp,
    Ipsp,
    Macro,
}

impl PotentialKind {
    pub fn unit_kind(&self) -> UnitKind {
        match self {
            PotentialKind::Epsp => UnitKind::Epsp,
            PotentialKind::Ipsp => UnitKind::Ipsp,
            PotentialKind::Macro => UnitKind::Macro,
        }
    }
}

impl TryFrom<UnitKind> for PotentialKind {
    type Error = DissonanceError;

    fn try_from(kind: UnitKind) -> Result<Self> {
        match kind {
            UnitKind::Epsp => Ok(PotentialKind::Epsp),
            UnitKind::Ipsp => Ok(PotentialKind::Ipsp),
            UnitKind::Macro => Ok(PotentialKind::Macro),
            other => Err(DissonanceError::InvalidTarget(format!("{} is not a potential", other))),
        }
    }
}

/// Result of one movement step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Not launched yet or still on cooldown
    Waiting,
    Moved(Position),
    Arrived(Position),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Potential {
    pub id: PotentialId,
    pub owner: PlayerId,
    pub kind: PotentialKind,
    pub position: Position,
    pub target: Position,
    way: VecDeque<Position>,
    magnitude: u32,
    speed_ms: TimeMs,
    last_move: TimeMs,
    /// How long an Ipsp blocks its target
    pub block_duration_ms: TimeMs,
    /// Set once an Ipsp sits on a blocked neuron; despawns at that time
    #[serde(default)]
    parked_until: Option<TimeMs>,
}

impl Potential {
    /// `way` is the full route as returned by routing, starting at the spawn cell
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PotentialId,
        owner: PlayerId,
        kind: PotentialKind,
        way: Vec<Position>,
        magnitude: u32,
        speed_ms: TimeMs,
        launch_at: TimeMs,
        block_duration_ms: TimeMs,
    ) -> Self {
        let mut way: VecDeque<Position> = way.into();
        let position = way.pop_front().unwrap_or_default();
        let target = way.back().copied().unwrap_or(position);
        Self {
            id,
            owner,
            kind,
            position,
            target,
            way,
            magnitude,
            speed_ms,
            last_move: launch_at,
            block_duration_ms,
            parked_until: None,
        }
    }

    pub fn magnitude(&self) -> u32 {
        self.magnitude
    }

    pub fn speed_ms(&self) -> TimeMs {
        self.speed_ms
    }

    /// Cells still to walk, excluding the current one
    pub fn remaining(&self) -> impl Iterator<Item = &Position> {
        self.way.iter()
    }

    pub fn remaining_len(&self) -> usize {
        self.way.len()
    }

    /// Time until arrival at the current speed
    pub fn eta_ms(&self, now: TimeMs) -> TimeMs {
        let pending = self.last_move.saturating_sub(now);
        pending + self.way.len() as TimeMs * self.speed_ms
    }

    /// Advance one cell if the movement cooldown has elapsed
    pub fn step(&mut self, now: TimeMs) -> Step {
        if now < self.last_move + self.speed_ms && !self.way.is_empty() {
            return Step::Waiting;
        }
        if now < self.last_move {
            return Step::Waiting;
        }
        match self.way.pop_front() {
            Some(next) => {
                self.position = next;
                self.last_move = now;
                if self.way.is_empty() {
                    Step::Arrived(next)
                } else {
                    Step::Moved(next)
                }
            }
            None => Step::Arrived(self.position),
        }
    }

    /// Continue from `position` along a new route (used by loophole jumps)
    pub(crate) fn reroute(&mut self, position: Position, way: Vec<Position>) {
        let mut way: VecDeque<Position> = way.into();
        if way.front() == Some(&position) {
            way.pop_front();
        }
        self.position = position;
        self.way = way;
    }

    /// Stop moving and hold the current cell until `until`
    pub fn park(&mut self, until: TimeMs) {
        self.way.clear();
        self.parked_until = Some(until);
    }

    pub fn is_parked(&self) -> bool {
        self.parked_until.is_some()
    }

    pub fn parked_until(&self) -> Option<TimeMs> {
        self.parked_until
    }

    /// Lower the magnitude, clamping at 0. Returns true once neutralised.
    pub fn reduce(&mut self, amount: u32) -> bool {
        self.magnitude = self.magnitude.saturating_sub(amount);
        self.magnitude == 0
    }

    pub fn gain(&mut self, amount: u32) {
        self.magnitude += amount;
    }

    pub fn is_neutralised(&self) -> bool {
        self.magnitude == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(len: i32) -> Vec<Position> {
        (0..len).map(|c| Position::new(0, c)).collect()
    }

    fn epsp(way: Vec<Position>, launch_at: TimeMs) -> Potential {
        Potential::new(PotentialId(1), PlayerId(0), PotentialKind::Epsp, way, 2, 100, launch_at, 0)
    }

    #[test]
    fn test_walks_one_cell_per_interval() {
        let mut pot = epsp(line(3), 0);
        assert_eq!(pot.position, Position::new(0, 0));
        assert_eq!(pot.target, Position::new(0, 2));
        assert_eq!(pot.step(50), Step::Waiting);
        assert_eq!(pot.step(100), Step::Moved(Position::new(0, 1)));
        assert_eq!(pot.step(150), Step::Waiting);
        assert_eq!(pot.step(200), Step::Arrived(Position::new(0, 2)));
    }

    #[test]
    fn test_delayed_launch() {
        let mut pot = epsp(line(2), 1000);
        assert_eq!(pot.step(500), Step::Waiting);
        assert_eq!(pot.step(1050), Step::Waiting);
        assert_eq!(pot.step(1100), Step::Arrived(Position::new(0, 1)));
        assert_eq!(epsp(line(4), 1000).eta_ms(400), 600 + 300);
    }

    #[test]
    fn test_single_cell_way_arrives_immediately() {
        let mut pot = epsp(line(1), 0);
        assert_eq!(pot.step(0), Step::Arrived(Position::new(0, 0)));
    }

    #[test]
    fn test_reduce_and_gain() {
        let mut pot = epsp(line(2), 0);
        assert!(!pot.reduce(1));
        pot.gain(2);
        assert_eq!(pot.magnitude(), 3);
        assert!(pot.reduce(5));
        assert!(pot.is_neutralised());
    }

    #[test]
    fn test_reroute_drops_current_cell() {
        let mut pot = epsp(line(5), 0);
        pot.reroute(Position::new(3, 3), vec![Position::new(3, 3), Position::new(3, 4)]);
        assert_eq!(pot.position, Position::new(3, 3));
        assert_eq!(pot.remaining_len(), 1);
    }

    #[test]
    fn test_park_holds_cell() {
        let mut pot = epsp(line(3), 0);
        pot.park(900);
        assert!(pot.is_parked());
        assert_eq!(pot.parked_until(), Some(900));
        assert_eq!(pot.remaining_len(), 0);
    }

    #[test]
    fn test_kind_conversion() {
        assert_eq!(PotentialKind::try_from(UnitKind::Ipsp).unwrap(), PotentialKind::Ipsp);
        assert!(PotentialKind::try_from(UnitKind::Synapse).is_err());
    }
}
