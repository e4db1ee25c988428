//! Tactics engine - the audio-driven AI opponent
//!
//! Strategies are voted from the harmonic content of each interval, the
//! economy follows a precomputed queue and attacks are timed to level bursts.

pub mod ballot;
pub mod context;
pub mod engine;
pub mod planner;
pub mod strategy;

pub use ballot::Ballot;
pub use context::DecisionContext;
pub use engine::{apply_actions, Action, TacticsEngine};
pub use planner::EconomyPlan;
pub use strategy::{Lean, Strategies, TargetStrategy};
