//! Match statistics collected per player

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::{TimeMs, UnitKind};

/// One point of the post-game graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSample {
    pub beat: u64,
    pub time_ms: TimeMs,
    pub iron: f64,
    pub resources: f64,
    pub neurons: usize,
    pub potentials: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub neurons_built: BTreeMap<UnitKind, u32>,
    pub neurons_lost: BTreeMap<UnitKind, u32>,
    pub potentials_built: BTreeMap<UnitKind, u32>,
    /// Enemy potentials this player neutralised
    pub potentials_killed: BTreeMap<UnitKind, u32>,
    pub potentials_lost: BTreeMap<UnitKind, u32>,
    /// Enemy epsp magnitude swallowed by this player's ipsps
    pub epsp_swallowed: u32,
    pub timeline: Vec<StatsSample>,
}

impl PlayerStats {
    pub fn neuron_built(&mut self, kind: UnitKind) {
        *self.neurons_built.entry(kind).or_default() += 1;
    }

    pub fn neuron_lost(&mut self, kind: UnitKind) {
        *self.neurons_lost.entry(kind).or_default() += 1;
    }

    pub fn potential_built(&mut self, kind: UnitKind, count: u32) {
        *self.potentials_built.entry(kind).or_default() += count;
    }

    pub fn potential_killed(&mut self, kind: UnitKind) {
        *self.potentials_killed.entry(kind).or_default() += 1;
    }

    pub fn potential_lost(&mut self, kind: UnitKind) {
        *self.potentials_lost.entry(kind).or_default() += 1;
    }

    pub fn swallowed(&mut self) {
        self.epsp_swallowed += 1;
    }

    pub fn sample(&mut self, sample: StatsSample) {
        self.timeline.push(sample);
    }

    pub fn total_neurons_built(&self) -> u32 {
        self.neurons_built.values().sum()
    }

    pub fn total_potentials_built(&self) -> u32 {
        self.potentials_built.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut stats = PlayerStats::default();
        stats.neuron_built(UnitKind::Synapse);
        stats.neuron_built(UnitKind::Synapse);
        stats.potential_built(UnitKind::Epsp, 3);
        stats.potential_killed(UnitKind::Epsp);
        assert_eq!(stats.neurons_built[&UnitKind::Synapse], 2);
        assert_eq!(stats.total_potentials_built(), 3);
        assert_eq!(stats.potentials_killed[&UnitKind::Epsp], 1);
    }

    #[test]
    fn test_serializes_with_kind_keys() {
        let mut stats = PlayerStats::default();
        stats.neuron_built(UnitKind::ActivatedNeuron);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["neurons_built"]["activated_neuron"], 1);
    }
}
