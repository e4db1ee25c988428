//! Synapse routing: targets, way-points and swarm release

use crate::core::error::{DissonanceError, Result};
use crate::core::types::{Position, PotentialId, TechnologyKind, TimeMs, UnitKind};
use crate::entity::neuron::{Neuron, SynapseState};
use crate::entity::player::Player;
use crate::entity::potential::PotentialKind;
use crate::field::Field;

impl Player {
    pub(super) fn synapse_mut(&mut self, pos: Position) -> Result<&mut SynapseState> {
        self.neurons
            .get_mut(&pos)
            .and_then(Neuron::synapse_mut)
            .ok_or_else(|| DissonanceError::NotFound(format!("synapse at {}", pos)))
    }

    pub fn set_waypoint(&mut self, field: &Field, synapse: Position, pos: Position) -> Result<usize> {
        if !field.in_graph(pos) {
            return Err(DissonanceError::InvalidPosition(pos, "not on the playable field".into()));
        }
        let state = self.synapse_mut(synapse)?;
        if state.waypoints.len() >= state.max_waypoints {
            return Err(DissonanceError::InvalidState(format!(
                "way-point budget of {} reached",
                state.max_waypoints
            )));
        }
        state.waypoints.push(pos);
        Ok(state.waypoints.len())
    }

    pub fn clear_waypoints(&mut self, synapse: Position) -> Result<()> {
        self.synapse_mut(synapse)?.waypoints.clear();
        Ok(())
    }

    pub fn set_target(&mut self, field: &Field, synapse: Position, kind: UnitKind, pos: Position) -> Result<()> {
        if !kind.is_potential() {
            return Err(DissonanceError::InvalidTarget(format!("{} is not a potential", kind)));
        }
        if field.graph().shortest_path(synapse, pos).is_none() {
            return Err(DissonanceError::InvalidTarget(format!("{} is not reachable", pos)));
        }
        self.synapse_mut(synapse)?.set_target(kind, pos);
        Ok(())
    }

    /// Toggle swarm mode; switching it off releases stored epsps
    pub fn toggle_swarm(&mut self, field: &Field, synapse: Position, now: TimeMs) -> Result<(bool, Vec<PotentialId>)> {
        if self.technologies.level(TechnologyKind::Swarm) == 0 {
            return Err(DissonanceError::InvalidState("SWARM not researched".into()));
        }
        let state = self.synapse_mut(synapse)?;
        state.swarm = !state.swarm;
        let swarm = state.swarm;
        let released = if swarm { 0 } else { std::mem::take(&mut state.stored) };
        let mut ids = Vec::new();
        if released > 0 {
            if let Some(way) = self.route_for(field, synapse, UnitKind::Epsp) {
                for _ in 0..released {
                    ids.push(self.spawn_potential(PotentialKind::Epsp, way.clone(), now));
                }
            }
        }
        Ok((swarm, ids))
    }

    /// Full route from a synapse to its target for `kind`, if reachable
    pub(super) fn route_for(&self, field: &Field, synapse: Position, kind: UnitKind) -> Option<Vec<Position>> {
        let route = self.synapse(synapse)?.route(kind)?;
        let target = *route.last()?;
        let way = field.get_way(synapse, &route);
        (way.last() == Some(&target)).then_some(way)
    }
}
