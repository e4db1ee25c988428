//! Technology effects on a player's units and new potentials

use tracing::info;

use crate::core::error::{DissonanceError, Result};
use crate::core::types::{TechnologyKind, TimeMs};
use crate::economy::technology_cost;
use crate::entity::neuron::{Neuron, NeuronKind};
use crate::entity::player::Player;
use crate::entity::potential::PotentialKind;

/// Potentials never move faster than this
const MIN_POTENTIAL_SPEED_MS: TimeMs = 50;

/// Activated neurons never fire faster than this
const MIN_DEFENCE_COOLDOWN_MS: TimeMs = 200;

impl Player {
    /// Research the next level of a technology
    pub fn add_technology(&mut self, kind: TechnologyKind) -> Result<u32> {
        if self.technologies.is_maxed(kind) {
            return Err(DissonanceError::TechnologyMaxed(kind.to_string()));
        }
        let factor = self.technologies.next_cost_factor(kind);
        self.economy.take_resources(technology_cost(kind), false, factor)?;
        let level = self.technologies.research(kind)?;

        match kind {
            TechnologyKind::Way => {
                for state in self.neurons.values_mut().filter_map(Neuron::synapse_mut) {
                    state.max_waypoints = level as usize;
                }
            }
            TechnologyKind::Swarm => {
                let threshold = self.config.units.swarm_base + level;
                for state in self.neurons.values_mut().filter_map(Neuron::synapse_mut) {
                    state.swarm_threshold = threshold;
                }
            }
            TechnologyKind::NucleusRange => {
                let new_range = self.nucleus_range();
                for neuron in self.neurons.values_mut() {
                    if let NeuronKind::Nucleus { range } = &mut neuron.kind {
                        *range = new_range;
                    }
                }
            }
            TechnologyKind::DefPotential | TechnologyKind::DefSpeed => {
                let (new_cooldown, new_potential) = (self.defence_cooldown(), self.defence_potential());
                for neuron in self.neurons.values_mut() {
                    if let NeuronKind::ActivatedNeuron {
                        cooldown_ms,
                        potential,
                        ..
                    } = &mut neuron.kind
                    {
                        *cooldown_ms = new_cooldown;
                        *potential = new_potential;
                    }
                }
            }
            TechnologyKind::TotalOxygen | TechnologyKind::TotalResource | TechnologyKind::Curve => {
                self.economy.apply_technology(kind, level);
            }
            TechnologyKind::AtkPotential | TechnologyKind::AtkSpeed | TechnologyKind::AtkDuration => {}
        }

        info!(player = %self.id, technology = %kind, level, "technology researched");
        Ok(level)
    }

    pub(super) fn defence_cooldown(&self) -> TimeMs {
        let units = &self.config.units;
        let reduction = self.technologies.level(TechnologyKind::DefSpeed) as TimeMs * units.def_speed_step_ms;
        units
            .defence_cooldown_ms
            .saturating_sub(reduction)
            .max(MIN_DEFENCE_COOLDOWN_MS)
    }

    pub(super) fn defence_potential(&self) -> u32 {
        self.config.units.defence_potential + self.technologies.level(TechnologyKind::DefPotential)
    }

    /// Magnitude, movement cooldown and block duration of a new potential
    pub(super) fn potential_profile(&self, kind: PotentialKind) -> (u32, TimeMs, TimeMs) {
        let units = &self.config.units;
        let atk = self.technologies.level(TechnologyKind::AtkPotential);
        let faster = self.technologies.level(TechnologyKind::AtkSpeed) as TimeMs * units.atk_speed_step_ms;
        let (magnitude, speed) = match kind {
            PotentialKind::Epsp => (units.epsp_magnitude, units.epsp_speed_ms),
            PotentialKind::Ipsp => (units.ipsp_magnitude, units.ipsp_speed_ms),
            PotentialKind::Macro => (units.macro_magnitude, units.macro_speed_ms),
        };
        let duration = units.ipsp_duration_ms
            + self.technologies.level(TechnologyKind::AtkDuration) as TimeMs * units.atk_duration_step_ms;
        (
            magnitude + atk,
            speed.saturating_sub(faster).max(MIN_POTENTIAL_SPEED_MS),
            duration,
        )
    }

    /// Movement cooldown a new potential of `kind` would get
    pub fn potential_speed(&self, kind: PotentialKind) -> TimeMs {
        self.potential_profile(kind).1
    }
}
