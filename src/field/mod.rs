//! Spatial model - terrain grid, connectivity graph, range queries and routing
//!
//! The field is generated once per match and is read-only afterwards.

pub mod generation;
pub mod graph;
pub mod grid;
pub mod map;

pub use generation::{add_hills, generate_field, RESOURCE_SLOTS};
pub use graph::SpatialGraph;
pub use grid::{Grid, Terrain};
pub use map::{Field, FieldSnapshot, RangeFilter};
