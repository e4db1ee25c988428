//! Economy queues and attack sizing

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::core::config::TacticsConfig;
use crate::core::types::{TechnologyKind, TimeMs};
use crate::economy::ResourceKind;
use crate::tactics::strategy::{Lean, Strategies, TargetStrategy};

use ResourceKind::*;

/// Ordered investment and research queues, built once at setup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EconomyPlan {
    resources: VecDeque<ResourceKind>,
    technologies: VecDeque<TechnologyKind>,
}

impl EconomyPlan {
    /// Derive both queues from the current ballots
    ///
    /// The technology queue repeats the lean's priority list once per level,
    /// so every technology reaches level n before any reaches n + 1.
    pub fn set_economy_tactics(strategies: &Strategies, max_level: u32) -> Self {
        let lean = strategies.lean();
        let mut resources: Vec<ResourceKind> = match lean {
            Lean::Attack => vec![Potassium, Potassium, Oxygen, Oxygen, Glutamate, Glutamate],
            Lean::Defence => vec![Glutamate, Glutamate, Oxygen, Oxygen, Potassium, Potassium],
        };
        resources.extend([Chloride, Chloride, Dopamine, Dopamine, Serotonin, Serotonin]);
        let boost_round: [ResourceKind; 6] = match lean {
            Lean::Attack => [Potassium, Oxygen, Chloride, Glutamate, Dopamine, Serotonin],
            Lean::Defence => [Glutamate, Oxygen, Potassium, Chloride, Serotonin, Dopamine],
        };
        for _ in 0..2 {
            resources.extend(boost_round);
        }

        let mut priorities: Vec<TechnologyKind> = match lean {
            Lean::Attack => vec![
                TechnologyKind::AtkPotential,
                TechnologyKind::AtkSpeed,
                TechnologyKind::Curve,
                TechnologyKind::TotalResource,
            ],
            Lean::Defence => vec![
                TechnologyKind::DefPotential,
                TechnologyKind::DefSpeed,
                TechnologyKind::Curve,
                TechnologyKind::TotalOxygen,
            ],
        };
        if strategies.block_strategy() != TargetStrategy::AimNucleus {
            priorities.push(TechnologyKind::AtkDuration);
        }
        if strategies.attack_strategy() == TargetStrategy::AimNucleus {
            priorities.push(TechnologyKind::NucleusRange);
        }

        let technologies = (0..max_level).flat_map(|_| priorities.iter().copied()).collect();
        Self {
            resources: resources.into(),
            technologies,
        }
    }

    pub fn next_resource(&self) -> Option<ResourceKind> {
        self.resources.front().copied()
    }

    pub fn pop_resource(&mut self) -> Option<ResourceKind> {
        self.resources.pop_front()
    }

    /// Put a resource back at the head of the queue
    pub fn retry_resource(&mut self, kind: ResourceKind) {
        self.resources.push_front(kind);
    }

    pub fn next_technology(&self) -> Option<TechnologyKind> {
        self.technologies.front().copied()
    }

    pub fn pop_technology(&mut self) -> Option<TechnologyKind> {
        self.technologies.pop_front()
    }

    pub fn retry_technology(&mut self, kind: TechnologyKind) {
        self.technologies.push_front(kind);
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceKind> {
        self.resources.iter()
    }

    pub fn technologies(&self) -> impl Iterator<Item = &TechnologyKind> {
        self.technologies.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.technologies.is_empty()
    }
}

/// Epsps wanted for a burst whose peak exceeded the average by `excess`
/// (relative, 0.25 = 25% louder)
pub fn desired_epsps(excess: f64, config: &TacticsConfig) -> u32 {
    let extra = (excess.max(0.0) * config.excess_scale).round() as u32;
    (config.min_epsps + extra).min(config.max_epsps)
}

/// Most epsps an attack may spend potassium on
pub fn potassium_cap(potassium_limit: f64, epsp_cost: f64, config: &TacticsConfig) -> u32 {
    if epsp_cost <= 0.0 {
        return u32::MAX;
    }
    (potassium_limit * config.potassium_budget / epsp_cost).floor() as u32
}

/// Number of epsps to launch, or `None` when too few are affordable
pub fn commit(desired: u32, affordable: u32, config: &TacticsConfig) -> Option<u32> {
    if desired == 0 {
        return None;
    }
    let needed = (desired as f64 * config.commit_fraction).ceil() as u32;
    (affordable >= needed).then(|| desired.min(affordable))
}

/// Launch delays `(epsp, ipsp)` so that both groups arrive together
pub fn arrival_delays(epsp_eta: TimeMs, ipsp_eta: TimeMs) -> (TimeMs, TimeMs) {
    if ipsp_eta > epsp_eta {
        (ipsp_eta - epsp_eta, 0)
    } else {
        (0, epsp_eta - ipsp_eta)
    }
}
