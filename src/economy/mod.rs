//! Per-player resource economy
//!
//! Seven resources: iron is earned on the beat and invested into the other
//! six, which grow once enough iron backs them.

pub mod costs;
pub mod pool;
pub mod resource;

pub use costs::{binds_cost, technology_cost, unit_cost, Cost};
pub use pool::{format_missing, Economy, IronEffect, ResourceSummary};
pub use resource::{Resource, ResourceKind};
