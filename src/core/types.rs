//! Core type definitions used throughout the codebase

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Simulated time in milliseconds since match start (pause time excluded)
pub type TimeMs = u64;

/// A cell on the field, addressed as (row, col)
#[derive(
    Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[display(fmt = "({}, {})", row, col)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Euclidean distance between two cells
    pub fn distance(&self, other: &Self) -> f64 {
        let dr = (self.row - other.row) as f64;
        let dc = (self.col - other.col) as f64;
        (dr * dr + dc * dc).sqrt()
    }

    /// True when `other` is one of the 8 surrounding cells
    pub fn is_adjacent(&self, other: &Self) -> bool {
        self != other && (self.row - other.row).abs() <= 1 && (self.col - other.col).abs() <= 1
    }
}

impl From<(i32, i32)> for Position {
    fn from((row, col): (i32, i32)) -> Self {
        Self { row, col }
    }
}

/// Index of a player inside a match (stable for the whole match)
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[display(fmt = "player-{}", _0)]
pub struct PlayerId(pub usize);

/// Stable identifier of a potential in flight, unique per player
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[display(fmt = "potential-{}", _0)]
pub struct PotentialId(pub u64);

/// Unique identifier for a match
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display(fmt = "{}", _0)]
pub struct MatchId(pub Uuid);

impl MatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

/// Every buildable unit: stationary neurons and mobile potentials
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    ActivatedNeuron,
    Synapse,
    Nucleus,
    ResourceNeuron,
    Loophole,
    Epsp,
    Ipsp,
    Macro,
}

impl UnitKind {
    pub const NEURONS: [UnitKind; 5] = [
        UnitKind::ActivatedNeuron,
        UnitKind::Synapse,
        UnitKind::Nucleus,
        UnitKind::ResourceNeuron,
        UnitKind::Loophole,
    ];
    pub const POTENTIALS: [UnitKind; 3] = [UnitKind::Epsp, UnitKind::Ipsp, UnitKind::Macro];

    pub fn is_neuron(&self) -> bool {
        !self.is_potential()
    }

    pub fn is_potential(&self) -> bool {
        matches!(self, UnitKind::Epsp | UnitKind::Ipsp | UnitKind::Macro)
    }
}

/// Researchable technologies
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TechnologyKind {
    Way,
    Swarm,
    TotalOxygen,
    TotalResource,
    Curve,
    AtkPotential,
    AtkSpeed,
    AtkDuration,
    DefPotential,
    DefSpeed,
    NucleusRange,
}

impl TechnologyKind {
    pub const ALL: [TechnologyKind; 11] = [
        TechnologyKind::Way,
        TechnologyKind::Swarm,
        TechnologyKind::TotalOxygen,
        TechnologyKind::TotalResource,
        TechnologyKind::Curve,
        TechnologyKind::AtkPotential,
        TechnologyKind::AtkSpeed,
        TechnologyKind::AtkDuration,
        TechnologyKind::DefPotential,
        TechnologyKind::DefSpeed,
        TechnologyKind::NucleusRange,
    ];
}
