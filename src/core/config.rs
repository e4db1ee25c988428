//! Match configuration with documented constants
//!
//! Every tunable number of the simulation lives here. Each section can be
//! overridden from a TOML file; missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::{DissonanceError, Result};

/// Map generation and placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub rows: i32,
    pub cols: i32,

    /// Chance that a single cell becomes a hill on the first attempt
    pub hill_density: f64,

    /// Chance that a cell seeds a large (radius 1-2) hill on the first attempt
    pub large_hill_density: f64,

    /// Both densities are multiplied by this after every failed attempt
    pub density_decay: f64,

    /// Map generation gives up after this many attempts
    pub max_map_attempts: u32,

    /// Initial influence radius of a nucleus
    pub nucleus_range: f64,

    /// Resource slots are placed at this distance band around the nucleus
    pub resource_slot_min: f64,
    pub resource_slot_max: f64,

    /// Distance of a nucleus from the map border
    pub edge_margin: i32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            rows: 40,
            cols: 80,
            hill_density: 0.12,
            large_hill_density: 0.015,
            density_decay: 0.5,
            max_map_attempts: 5,
            nucleus_range: 4.0,
            resource_slot_min: 2.0,
            resource_slot_max: 3.0,
            edge_margin: 5,
        }
    }
}

/// Resource pools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub iron_start: f64,
    pub iron_limit: f64,
    pub oxygen_start: f64,
    pub resource_start: f64,
    pub resource_limit: f64,

    /// Divisor of every growth step. CURVE lowers it by `curve_step` per level.
    pub slowdown: f64,
    pub curve_step: f64,

    /// Added to the limit multiplier per TOTAL_OXYGEN / TOTAL_RESOURCE level
    pub limit_step: f64,

    /// Iron units needed before a resource starts growing
    pub activation_threshold: u32,

    /// Iron gained per eligible tick by AI players (humans gain 1)
    pub ai_iron_rate: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            iron_start: 3.0,
            iron_limit: 22.0,
            oxygen_start: 5.5,
            resource_start: 0.0,
            resource_limit: 100.0,
            slowdown: 3.0,
            curve_step: 0.5,
            limit_step: 0.2,
            activation_threshold: 2,
            ai_iron_rate: 2.0,
        }
    }
}

/// Neuron and potential parameters before technology scaling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    pub nucleus_voltage: u32,
    pub synapse_voltage: u32,
    pub activated_neuron_voltage: u32,
    pub resource_neuron_voltage: u32,
    pub loophole_voltage: u32,

    pub epsp_magnitude: u32,
    pub epsp_speed_ms: u64,
    pub ipsp_magnitude: u32,
    pub ipsp_speed_ms: u64,
    pub macro_magnitude: u32,
    pub macro_speed_ms: u64,

    /// Movement cooldown removed per ATK_SPEED level
    pub atk_speed_step_ms: u64,

    /// How long an Ipsp keeps its target blocked (+1s per ATK_DURATION level)
    pub ipsp_duration_ms: u64,
    pub atk_duration_step_ms: u64,

    pub defence_radius: f64,
    pub defence_cooldown_ms: u64,
    pub def_speed_step_ms: u64,
    pub defence_potential: u32,

    /// Swarm threshold is `swarm_base + SWARM level`
    pub swarm_base: u32,

    pub scout_radius: f64,
    pub macro_area_radius: f64,
    pub max_loopholes: usize,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            nucleus_voltage: 9,
            synapse_voltage: 5,
            activated_neuron_voltage: 12,
            resource_neuron_voltage: 6,
            loophole_voltage: 6,
            epsp_magnitude: 2,
            epsp_speed_ms: 350,
            ipsp_magnitude: 2,
            ipsp_speed_ms: 420,
            macro_magnitude: 4,
            macro_speed_ms: 600,
            atk_speed_step_ms: 40,
            ipsp_duration_ms: 3000,
            atk_duration_step_ms: 1000,
            defence_radius: 3.0,
            defence_cooldown_ms: 1200,
            def_speed_step_ms: 200,
            defence_potential: 2,
            swarm_base: 2,
            scout_radius: 5.0,
            macro_area_radius: 2.0,
            max_loopholes: 2,
        }
    }
}

/// Loop cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Movement passes per beat; the pass interval follows the current tempo
    pub movement_passes_per_beat: u32,

    /// Lower bound of the movement pass interval
    pub min_pass_ms: u64,

    /// Defence (activated neurons) runs every n-th movement pass
    pub defence_every: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            movement_passes_per_beat: 4,
            min_pass_ms: 20,
            defence_every: 3,
        }
    }
}

/// Audio-driven AI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    pub max_synapses: usize,
    pub max_activated_neurons: usize,

    /// Number of time points in the rolling level average
    pub level_window: usize,

    pub min_epsps: u32,
    pub max_epsps: u32,

    /// Epsps added per unit of relative level excess over the average
    pub excess_scale: f64,

    /// An attack may spend at most this fraction of the potassium limit
    pub potassium_budget: f64,

    /// An attack is launched only if this fraction of the desired count is affordable
    pub commit_fraction: f64,

    pub max_ipsp_targets: usize,
}

impl Default for TacticsConfig {
    fn default() -> Self {
        Self {
            max_synapses: 3,
            max_activated_neurons: 6,
            level_window: 16,
            min_epsps: 2,
            max_epsps: 12,
            excess_scale: 10.0,
            potassium_budget: 0.6,
            commit_fraction: 0.75,
            max_ipsp_targets: 2,
        }
    }
}

/// Complete configuration of a match
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub field: FieldConfig,
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub units: UnitConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub tactics: TacticsConfig,
}

impl GameConfig {
    /// Load a configuration from a TOML file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: GameConfig = toml::from_str(contents)
            .map_err(|e| DissonanceError::ConfigError(format!("failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let field = &self.field;
        if field.rows < 2 * field.edge_margin + 1 || field.cols < 2 * field.edge_margin + 1 {
            return Err(DissonanceError::ConfigError(format!(
                "field {}x{} too small for edge margin {}",
                field.rows, field.cols, field.edge_margin
            )));
        }
        if !(0.0..1.0).contains(&field.density_decay) {
            return Err(DissonanceError::ConfigError(
                "density_decay must be in [0, 1)".into(),
            ));
        }
        if field.max_map_attempts == 0 {
            return Err(DissonanceError::ConfigError(
                "max_map_attempts must be positive".into(),
            ));
        }
        if field.resource_slot_min > field.resource_slot_max
            || field.resource_slot_max > field.nucleus_range
        {
            return Err(DissonanceError::ConfigError(format!(
                "resource slots [{}, {}] must lie within nucleus range {}",
                field.resource_slot_min, field.resource_slot_max, field.nucleus_range
            )));
        }
        if self.economy.slowdown < 1.0 {
            return Err(DissonanceError::ConfigError("slowdown must be >= 1".into()));
        }
        if self.economy.iron_start > self.economy.iron_limit {
            return Err(DissonanceError::ConfigError(
                "iron_start exceeds iron_limit".into(),
            ));
        }
        if self.timing.movement_passes_per_beat == 0 || self.timing.defence_every == 0 {
            return Err(DissonanceError::ConfigError(
                "timing cadences must be positive".into(),
            ));
        }
        if self.tactics.min_epsps > self.tactics.max_epsps {
            return Err(DissonanceError::ConfigError(
                "min_epsps exceeds max_epsps".into(),
            ));
        }
        Ok(())
    }
}
