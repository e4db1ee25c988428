//! Entity model - neurons, potentials, technologies and the players owning them

pub mod combat;
pub mod neuron;
pub mod player;
pub mod potential;
pub mod stats;
pub mod technology;

pub use combat::{movement_pass, DestroyedNeuron, PassReport, ScoutReport};
pub use neuron::{Neuron, NeuronKind, SynapseState};
pub use player::{occupied_cells, MacroMode, NeuronHit, Player};
pub use potential::{Potential, PotentialKind, Step};
pub use stats::{PlayerStats, StatsSample};
pub use technology::{Technologies, TechnologySummary, MAX_TECHNOLOGY_LEVEL};
