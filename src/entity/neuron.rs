//! Neurons - stationary structures that own one cell

use serde::{Deserialize, Serialize};

use crate::core::types::{Position, TimeMs, UnitKind};
use crate::economy::ResourceKind;

/// Spawn configuration of a synapse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseState {
    /// Intermediate cells every potential passes before its target
    pub waypoints: Vec<Position>,
    /// Way-point budget (WAY technology level)
    pub max_waypoints: usize,
    pub epsp_target: Position,
    pub ipsp_target: Option<Position>,
    pub macro_target: Option<Position>,
    pub swarm: bool,
    /// Epsps released together once this many are stored
    pub swarm_threshold: u32,
    /// Epsps paid for but not yet released
    pub stored: u32,
}

impl SynapseState {
    pub fn new(epsp_target: Position, max_waypoints: usize, swarm_threshold: u32) -> Self {
        Self {
            waypoints: Vec::new(),
            max_waypoints,
            epsp_target,
            ipsp_target: None,
            macro_target: None,
            swarm: false,
            swarm_threshold,
            stored: 0,
        }
    }

    /// Final destination for potentials of `kind`
    pub fn target(&self, kind: UnitKind) -> Option<Position> {
        match kind {
            UnitKind::Epsp => Some(self.epsp_target),
            UnitKind::Ipsp => self.ipsp_target,
            UnitKind::Macro => self.macro_target.or(Some(self.epsp_target)),
            _ => None,
        }
    }

    pub fn set_target(&mut self, kind: UnitKind, pos: Position) -> bool {
        match kind {
            UnitKind::Epsp => self.epsp_target = pos,
            UnitKind::Ipsp => self.ipsp_target = Some(pos),
            UnitKind::Macro => self.macro_target = Some(pos),
            _ => return false,
        }
        true
    }

    /// Way-points followed by the target of `kind`
    pub fn route(&self, kind: UnitKind) -> Option<Vec<Position>> {
        let target = self.target(kind)?;
        let mut route = self.waypoints.clone();
        route.push(target);
        Some(route)
    }
}

/// Variant-specific data of a neuron
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NeuronKind {
    Nucleus { range: f64 },
    Synapse(SynapseState),
    ActivatedNeuron {
        cooldown_ms: TimeMs,
        last_fired: TimeMs,
        potential: u32,
    },
    ResourceNeuron { resource: ResourceKind },
    Loophole { partner: Option<Position> },
}

impl NeuronKind {
    pub fn unit_kind(&self) -> UnitKind {
        match self {
            NeuronKind::Nucleus { .. } => UnitKind::Nucleus,
            NeuronKind::Synapse(_) => UnitKind::Synapse,
            NeuronKind::ActivatedNeuron { .. } => UnitKind::ActivatedNeuron,
            NeuronKind::ResourceNeuron { .. } => UnitKind::ResourceNeuron,
            NeuronKind::Loophole { .. } => UnitKind::Loophole,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neuron {
    pub position: Position,
    pub kind: NeuronKind,
    voltage: u32,
    max_voltage: u32,
    blocked_until: Option<TimeMs>,
    created_at: TimeMs,
    /// Build cost is held as bound resources while the neuron lives
    binds_cost: bool,
}

impl Neuron {
    pub fn new(position: Position, kind: NeuronKind, max_voltage: u32, now: TimeMs) -> Self {
        Self {
            position,
            kind,
            voltage: max_voltage,
            max_voltage,
            blocked_until: None,
            created_at: now,
            binds_cost: false,
        }
    }

    pub fn with_bound_cost(mut self) -> Self {
        self.binds_cost = true;
        self
    }

    pub fn binds_cost(&self) -> bool {
        self.binds_cost
    }

    pub fn unit_kind(&self) -> UnitKind {
        self.kind.unit_kind()
    }

    pub fn voltage(&self) -> u32 {
        self.voltage
    }

    pub fn max_voltage(&self) -> u32 {
        self.max_voltage
    }

    pub fn created_at(&self) -> TimeMs {
        self.created_at
    }

    pub fn is_destroyed(&self) -> bool {
        self.voltage == 0
    }

    /// Lower the voltage, clamping at 0. Returns true once destroyed.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        self.voltage = self.voltage.saturating_sub(amount);
        self.is_destroyed()
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked_until.is_some()
    }

    pub fn blocked_until(&self) -> Option<TimeMs> {
        self.blocked_until
    }

    /// Block until `until`; an existing longer block is kept
    pub fn block(&mut self, until: TimeMs) {
        self.blocked_until = Some(self.blocked_until.map_or(until, |t| t.max(until)));
    }

    /// Clear an expired block. Returns true if the neuron was unblocked.
    pub fn unblock_if_expired(&mut self, now: TimeMs) -> bool {
        match self.blocked_until {
            Some(until) if until <= now => {
                self.blocked_until = None;
                true
            }
            _ => false,
        }
    }

    pub fn synapse(&self) -> Option<&SynapseState> {
        match &self.kind {
            NeuronKind::Synapse(state) => Some(state),
            _ => None,
        }
    }

    pub fn synapse_mut(&mut self) -> Option<&mut SynapseState> {
        match &mut self.kind {
            NeuronKind::Synapse(state) => Some(state),
            _ => None,
        }
    }

    /// Influence radius if this is a nucleus
    pub fn range(&self) -> Option<f64> {
        match self.kind {
            NeuronKind::Nucleus { range } => Some(range),
            _ => None,
        }
    }

    /// An activated neuron that is unblocked and off cooldown
    pub fn defence_ready(&self, now: TimeMs) -> Option<u32> {
        match self.kind {
            NeuronKind::ActivatedNeuron {
                cooldown_ms,
                last_fired,
                potential,
            } if !self.is_blocked() && now >= last_fired + cooldown_ms => Some(potential),
            _ => None,
        }
    }

    pub(crate) fn reset_cooldown(&mut self, now: TimeMs) {
        if let NeuronKind::ActivatedNeuron { last_fired, .. } = &mut self.kind {
            *last_fired = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synapse() -> Neuron {
        Neuron::new(
            Position::new(1, 1),
            NeuronKind::Synapse(SynapseState::new(Position::new(9, 9), 1, 3)),
            5,
            0,
        )
    }

    #[test]
    fn test_damage_clamps_at_zero() {
        let mut neuron = synapse();
        assert!(!neuron.take_damage(3));
        assert_eq!(neuron.voltage(), 2);
        assert!(neuron.take_damage(10));
        assert_eq!(neuron.voltage(), 0);
    }

    #[test]
    fn test_block_and_expire() {
        let mut neuron = synapse();
        neuron.block(1000);
        neuron.block(500);
        assert_eq!(neuron.blocked_until(), Some(1000));
        assert!(!neuron.unblock_if_expired(999));
        assert!(neuron.unblock_if_expired(1000));
        assert!(!neuron.is_blocked());
    }

    #[test]
    fn test_synapse_routes() {
        let mut neuron = synapse();
        let state = neuron.synapse_mut().unwrap();
        state.waypoints.push(Position::new(4, 4));
        assert_eq!(
            state.route(UnitKind::Epsp),
            Some(vec![Position::new(4, 4), Position::new(9, 9)])
        );
        assert_eq!(state.route(UnitKind::Ipsp), None);
        assert_eq!(state.target(UnitKind::Macro), Some(Position::new(9, 9)));
        assert!(!state.set_target(UnitKind::Synapse, Position::new(0, 0)));
    }

    #[test]
    fn test_defence_cooldown() {
        let mut neuron = Neuron::new(
            Position::new(0, 0),
            NeuronKind::ActivatedNeuron {
                cooldown_ms: 1000,
                last_fired: 0,
                potential: 2,
            },
            12,
            0,
        );
        assert_eq!(neuron.defence_ready(500), None);
        assert_eq!(neuron.defence_ready(1000), Some(2));
        neuron.reset_cooldown(1000);
        assert_eq!(neuron.defence_ready(1500), None);
        neuron.block(5000);
        assert_eq!(neuron.defence_ready(4000), None);
    }
}
