//! Battle strategies voted from the harmonic content of each interval

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::audio::{Interval, Signature};
use crate::core::types::UnitKind;
use crate::tactics::ballot::Ballot;

/// What an attack (or a block) aims at
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStrategy {
    AimNucleus,
    DestroyActivatedNeurons,
    DestroySynapses,
    DestroyResources,
}

impl TargetStrategy {
    pub const ALL: [TargetStrategy; 4] = [
        TargetStrategy::AimNucleus,
        TargetStrategy::DestroyActivatedNeurons,
        TargetStrategy::DestroySynapses,
        TargetStrategy::DestroyResources,
    ];

    /// Neuron kind this strategy goes after
    pub fn unit_kind(&self) -> UnitKind {
        match self {
            TargetStrategy::AimNucleus => UnitKind::Nucleus,
            TargetStrategy::DestroyActivatedNeurons => UnitKind::ActivatedNeuron,
            TargetStrategy::DestroySynapses => UnitKind::Synapse,
            TargetStrategy::DestroyResources => UnitKind::ResourceNeuron,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lean {
    Attack,
    Defence,
}

/// The three ballots driving the AI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategies {
    pub attack: Ballot<TargetStrategy>,
    pub block: Ballot<TargetStrategy>,
    pub lean: Ballot<Lean>,
}

impl Default for Strategies {
    fn default() -> Self {
        Self {
            attack: Ballot::new(&TargetStrategy::ALL),
            block: Ballot::new(&TargetStrategy::ALL),
            lean: Ballot::new(&[Lean::Attack, Lean::Defence]),
        }
    }
}

impl Strategies {
    pub fn attack_strategy(&self) -> TargetStrategy {
        self.attack.winner().unwrap_or(TargetStrategy::AimNucleus)
    }

    pub fn block_strategy(&self) -> TargetStrategy {
        self.block.winner().unwrap_or(TargetStrategy::DestroyActivatedNeurons)
    }

    pub fn lean(&self) -> Lean {
        self.lean.winner().unwrap_or(Lean::Attack)
    }

    /// Add the votes of a new interval
    ///
    /// Mode and signature each add fixed votes; key note, darkness and the
    /// out-of-key count each add one vote to a derived candidate.
    pub fn set_battle_tactics(&mut self, interval: &Interval) {
        if interval.major {
            self.attack.add(TargetStrategy::AimNucleus, 2);
            self.block.add(TargetStrategy::DestroySynapses, 1);
            self.lean.add(Lean::Attack, 2);
        } else {
            self.attack.add(TargetStrategy::DestroySynapses, 1);
            self.attack.add(TargetStrategy::DestroyActivatedNeurons, 1);
            self.block.add(TargetStrategy::DestroyActivatedNeurons, 2);
            self.lean.add(Lean::Defence, 2);
        }

        match interval.signature {
            Signature::Sharp => {
                self.attack.add(TargetStrategy::DestroyActivatedNeurons, 2);
                self.block.add(TargetStrategy::AimNucleus, 1);
                self.lean.add(Lean::Attack, 1);
            }
            Signature::Flat => {
                self.attack.add(TargetStrategy::DestroyResources, 2);
                self.block.add(TargetStrategy::DestroyResources, 1);
                self.lean.add(Lean::Defence, 1);
            }
            Signature::Unsigned => {
                self.attack.add(TargetStrategy::AimNucleus, 1);
                self.block.add(TargetStrategy::DestroyActivatedNeurons, 1);
            }
        }

        self.attack.add_nth(interval.key_note as usize, 1);
        self.block.add_nth(interval.darkness as usize, 1);
        self.lean.add_nth(interval.notes_out_of_key as usize, 1);
    }
}
