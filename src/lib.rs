//! Dissonance - audio-driven real-time strategy simulation
//!
//! Two or more players grow an economy of typed resources, build neurons and
//! launch potentials at each other's nucleus. Terrain and the AI's tactics are
//! derived from an analysed audio track.

pub mod audio;
pub mod core;
pub mod economy;
pub mod entity;
pub mod field;
pub mod simulation;
pub mod tactics;
