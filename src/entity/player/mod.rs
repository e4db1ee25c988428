//! Player state - one economy, its neurons, potentials in flight and technologies
//!
//! Cross-player effects never touch another player's maps directly; combat
//! goes through the setters at the bottom of this file. Technology effects
//! live in `upgrades`, synapse routing in `routing`.

mod routing;
mod upgrades;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::config::GameConfig;
use crate::core::error::{DissonanceError, Result};
use crate::core::types::{PlayerId, Position, PotentialId, TechnologyKind, TimeMs, UnitKind};
use crate::economy::{unit_cost, Economy, IronEffect, ResourceKind};
use crate::entity::neuron::{Neuron, NeuronKind, SynapseState};
use crate::entity::potential::{Potential, PotentialKind, Step};
use crate::entity::stats::{PlayerStats, StatsSample};
use crate::entity::technology::Technologies;
use crate::field::{Field, RangeFilter};

/// What a macro does on arrival, fixed per player at match start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroMode {
    /// Damage every enemy neuron around the arrival cell
    Area,
    /// Open a free loophole at the arrival cell
    Teleport,
}

/// Outcome of a potential hitting a neuron
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NeuronHit {
    Missed,
    Damaged { voltage: u32 },
    /// Every neuron removed in this resolution, the hit one first
    Destroyed(Vec<(Position, UnitKind)>),
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub ai: bool,
    config: Arc<GameConfig>,
    economy: Economy,
    neurons: BTreeMap<Position, Neuron>,
    potentials: BTreeMap<PotentialId, Potential>,
    technologies: Technologies,
    enemies: Vec<PlayerId>,
    macro_mode: MacroMode,
    next_potential: u64,
    resigned: bool,
    scouted: AHashSet<(PlayerId, Position)>,
    stats: PlayerStats,
}

impl Player {
    /// Create a player with its starting nucleus at its field spawn
    pub fn new(
        id: PlayerId,
        config: Arc<GameConfig>,
        field: &Field,
        enemies: Vec<PlayerId>,
        macro_mode: MacroMode,
        ai: bool,
    ) -> Result<Self> {
        let nucleus = field
            .nuclei()
            .get(id.0)
            .copied()
            .ok_or_else(|| DissonanceError::NotFound(format!("spawn of {}", id)))?;
        let economy = Economy::new(&config.economy, field.resource_slots(id.0));
        let mut neurons = BTreeMap::new();
        neurons.insert(
            nucleus,
            Neuron::new(
                nucleus,
                NeuronKind::Nucleus {
                    range: config.field.nucleus_range,
                },
                config.units.nucleus_voltage,
                0,
            ),
        );

        Ok(Self {
            id,
            ai,
            config,
            economy,
            neurons,
            potentials: BTreeMap::new(),
            technologies: Technologies::default(),
            enemies,
            macro_mode,
            next_potential: 0,
            resigned: false,
            scouted: AHashSet::new(),
            stats: PlayerStats::default(),
        })
    }

    pub fn economy(&self) -> &Economy {
        &self.economy
    }

    pub fn technologies(&self) -> &Technologies {
        &self.technologies
    }

    pub fn stats(&self) -> &PlayerStats {
        &self.stats
    }

    pub fn macro_mode(&self) -> MacroMode {
        self.macro_mode
    }

    pub fn enemies(&self) -> &[PlayerId] {
        &self.enemies
    }

    pub fn is_enemy(&self, other: PlayerId) -> bool {
        self.enemies.contains(&other)
    }

    pub fn neurons(&self) -> impl Iterator<Item = &Neuron> {
        self.neurons.values()
    }

    pub fn neuron(&self, pos: Position) -> Option<&Neuron> {
        self.neurons.get(&pos)
    }

    pub fn neuron_count(&self) -> usize {
        self.neurons.len()
    }

    /// Positions of own neurons, optionally of one kind, in row-major order
    pub fn neuron_positions(&self, kind: Option<UnitKind>) -> Vec<Position> {
        self.neurons
            .values()
            .filter(|n| kind.map_or(true, |k| n.unit_kind() == k))
            .map(|n| n.position)
            .collect()
    }

    pub fn nuclei(&self) -> Vec<Position> {
        self.neuron_positions(Some(UnitKind::Nucleus))
    }

    pub fn synapse(&self, pos: Position) -> Option<&SynapseState> {
        self.neurons.get(&pos).and_then(Neuron::synapse)
    }

    pub fn potentials(&self) -> impl Iterator<Item = &Potential> {
        self.potentials.values()
    }

    pub fn potential(&self, id: PotentialId) -> Option<&Potential> {
        self.potentials.get(&id)
    }

    pub fn potential_count(&self) -> usize {
        self.potentials.len()
    }

    /// Current influence radius of this player's nuclei
    pub fn nucleus_range(&self) -> f64 {
        self.config.field.nucleus_range + self.technologies.level(TechnologyKind::NucleusRange) as f64
    }

    pub fn loophole_count(&self) -> usize {
        self.neurons
            .values()
            .filter(|n| n.unit_kind() == UnitKind::Loophole)
            .count()
    }

    pub fn has_lost(&self) -> bool {
        self.resigned || !self.neurons.values().any(|n| n.unit_kind() == UnitKind::Nucleus)
    }

    /// Leave the match; state stays for the final statistics
    pub fn resign(&mut self) {
        if !self.resigned {
            info!(player = %self.id, "player resigned");
        }
        self.resigned = true;
    }

    pub fn has_resigned(&self) -> bool {
        self.resigned
    }

    // ---- economy ----------------------------------------------------------

    /// One beat of growth; AI players earn iron at their own rate
    pub fn increase_resources(&mut self, iron_eligible: bool) {
        let rate = if self.ai {
            self.config.economy.ai_iron_rate
        } else {
            1.0
        };
        self.economy.increase_resources(iron_eligible, rate);
    }

    pub fn distribute_iron(&mut self, kind: ResourceKind, now: TimeMs) -> Result<IronEffect> {
        let effect = self.economy.distribute_iron(kind)?;
        self.apply_iron_effect(kind, effect, now);
        Ok(effect)
    }

    pub fn remove_iron(&mut self, kind: ResourceKind, now: TimeMs) -> Result<IronEffect> {
        let effect = self.economy.remove_iron(kind)?;
        self.apply_iron_effect(kind, effect, now);
        Ok(effect)
    }

    fn apply_iron_effect(&mut self, kind: ResourceKind, effect: IronEffect, now: TimeMs) {
        match effect {
            IronEffect::Activated(Some(pos)) => {
                if let Some(neuron) = self.neurons.get(&pos) {
                    warn!(
                        player = %self.id,
                        resource = %kind,
                        %pos,
                        occupant = %neuron.unit_kind(),
                        "resource slot occupied, no resource neuron created"
                    );
                    return;
                }
                let neuron = Neuron::new(
                    pos,
                    NeuronKind::ResourceNeuron { resource: kind },
                    self.config.units.resource_neuron_voltage,
                    now,
                );
                self.neurons.insert(pos, neuron);
                self.stats.neuron_built(UnitKind::ResourceNeuron);
                debug!(player = %self.id, resource = %kind, %pos, "resource neuron created");
            }
            IronEffect::Deactivated(Some(pos)) => {
                let is_resource = matches!(
                    self.neurons.get(&pos).map(|n| &n.kind),
                    Some(NeuronKind::ResourceNeuron { .. })
                );
                if is_resource {
                    self.neurons.remove(&pos);
                    debug!(player = %self.id, resource = %kind, %pos, "resource neuron removed");
                }
            }
            _ => {}
        }
    }

    // ---- building ---------------------------------------------------------

    fn in_influence(&self, pos: Position, kind: UnitKind) -> bool {
        let reach = if kind == UnitKind::Nucleus { 2.0 } else { 1.0 };
        self.neurons
            .values()
            .filter_map(|n| n.range().map(|range| (n.position, range)))
            .any(|(nucleus, range)| nucleus.distance(&pos) <= range * reach)
    }

    fn check_buildable(&self, kind: UnitKind) -> Result<()> {
        match kind {
            UnitKind::ResourceNeuron => Err(DissonanceError::InvalidTarget(
                "resource neurons grow from invested iron".into(),
            )),
            k if k.is_potential() => Err(DissonanceError::InvalidTarget(format!("{} is not a neuron", k))),
            UnitKind::Loophole if self.loophole_count() >= self.config.units.max_loopholes => {
                Err(DissonanceError::InvalidState(format!(
                    "at most {} loopholes",
                    self.config.units.max_loopholes
                )))
            }
            _ => Ok(()),
        }
    }

    /// Free cells a neuron of `kind` may be placed on, in row-major order
    pub fn candidate_positions(&self, field: &Field, occupied: &AHashSet<Position>, kind: UnitKind) -> Vec<Position> {
        let reach = if kind == UnitKind::Nucleus { 2.0 } else { 1.0 };
        let mut cells: Vec<Position> = self
            .neurons
            .values()
            .filter_map(|n| n.range().map(|range| (n.position, range)))
            .flat_map(|(nucleus, range)| {
                field.get_all_in_range(nucleus, range * reach, 0.0, RangeFilter::Free(occupied))
            })
            .filter(|pos| !self.neurons.contains_key(pos) && self.economy.resource_at(*pos).is_none())
            .collect();
        cells.sort();
        cells.dedup();
        cells
    }

    /// Affordability and placement check; returns the valid positions
    pub fn check_build_neuron(
        &self,
        field: &Field,
        occupied: &AHashSet<Position>,
        kind: UnitKind,
    ) -> Result<Vec<Position>> {
        self.check_buildable(kind)?;
        let missing = self.economy.missing_resources(unit_cost(kind), 1.0);
        if !missing.is_empty() {
            return Err(DissonanceError::InsufficientResources(crate::economy::format_missing(
                &missing,
            )));
        }
        let cells = self.candidate_positions(field, occupied, kind);
        if cells.is_empty() {
            return Err(DissonanceError::InvalidState(format!("no free cell for {}", kind)));
        }
        Ok(cells)
    }

    fn validate_placement(
        &self,
        field: &Field,
        occupied: &AHashSet<Position>,
        pos: Position,
        kind: UnitKind,
    ) -> Result<()> {
        if !field.in_graph(pos) {
            return Err(DissonanceError::InvalidPosition(pos, "not on the playable field".into()));
        }
        if occupied.contains(&pos) || self.neurons.contains_key(&pos) {
            return Err(DissonanceError::InvalidPosition(pos, "occupied".into()));
        }
        if self.economy.resource_at(pos).is_some() {
            return Err(DissonanceError::InvalidPosition(pos, "reserved for a resource".into()));
        }
        if !self.in_influence(pos, kind) {
            return Err(DissonanceError::InvalidPosition(pos, "out of nucleus range".into()));
        }
        Ok(())
    }

    /// Build a neuron; the cost is debited and bound until it is destroyed
    ///
    /// A synapse needs `epsp_target`, which must be reachable from `pos`.
    pub fn add_neuron(
        &mut self,
        field: &Field,
        occupied: &AHashSet<Position>,
        pos: Position,
        kind: UnitKind,
        epsp_target: Option<Position>,
        now: TimeMs,
    ) -> Result<()> {
        self.check_buildable(kind)?;
        self.validate_placement(field, occupied, pos, kind)?;

        let neuron_kind = match kind {
            UnitKind::Nucleus => NeuronKind::Nucleus {
                range: self.nucleus_range(),
            },
            UnitKind::Synapse => {
                let target = epsp_target
                    .ok_or_else(|| DissonanceError::InvalidTarget("synapse needs an epsp target".into()))?;
                if field.graph().shortest_path(pos, target).is_none() {
                    return Err(DissonanceError::InvalidTarget(format!("{} is not reachable", target)));
                }
                NeuronKind::Synapse(SynapseState::new(
                    target,
                    self.technologies.level(TechnologyKind::Way) as usize,
                    self.config.units.swarm_base + self.technologies.level(TechnologyKind::Swarm),
                ))
            }
            UnitKind::ActivatedNeuron => NeuronKind::ActivatedNeuron {
                cooldown_ms: self.defence_cooldown(),
                last_fired: now,
                potential: self.defence_potential(),
            },
            _ => NeuronKind::Loophole { partner: None },
        };

        self.economy.take_resources(unit_cost(kind), true, 1.0)?;
        let neuron = Neuron::new(pos, neuron_kind, self.max_voltage(kind), now).with_bound_cost();
        self.neurons.insert(pos, neuron);
        if kind == UnitKind::Loophole {
            self.pair_loophole(pos);
        }
        self.stats.neuron_built(kind);
        debug!(player = %self.id, %kind, %pos, "neuron built");
        Ok(())
    }

    fn max_voltage(&self, kind: UnitKind) -> u32 {
        let units = &self.config.units;
        match kind {
            UnitKind::Nucleus => units.nucleus_voltage,
            UnitKind::Synapse => units.synapse_voltage,
            UnitKind::ActivatedNeuron => units.activated_neuron_voltage,
            UnitKind::ResourceNeuron => units.resource_neuron_voltage,
            _ => units.loophole_voltage,
        }
    }

    fn pair_loophole(&mut self, pos: Position) {
        let open = self.neurons.values().find_map(|n| match n.kind {
            NeuronKind::Loophole { partner: None } if n.position != pos => Some(n.position),
            _ => None,
        });
        let Some(other) = open else {
            return;
        };
        for (at, partner_pos) in [(pos, other), (other, pos)] {
            if let Some(NeuronKind::Loophole { partner }) = self.neurons.get_mut(&at).map(|n| &mut n.kind) {
                *partner = Some(partner_pos);
            }
        }
    }

    /// Open a loophole for free (macro teleport). Returns false if not possible.
    pub fn place_free_loophole(
        &mut self,
        field: &Field,
        occupied: &AHashSet<Position>,
        pos: Position,
        now: TimeMs,
    ) -> bool {
        if self.loophole_count() >= self.config.units.max_loopholes
            || occupied.contains(&pos)
            || self.neurons.contains_key(&pos)
            || self.economy.resource_at(pos).is_some()
            || !field.in_graph(pos)
        {
            return false;
        }
        let neuron = Neuron::new(
            pos,
            NeuronKind::Loophole { partner: None },
            self.config.units.loophole_voltage,
            now,
        );
        self.neurons.insert(pos, neuron);
        self.pair_loophole(pos);
        self.stats.neuron_built(UnitKind::Loophole);
        debug!(player = %self.id, %pos, "loophole opened by macro");
        true
    }

    // ---- potentials ------------------------------------------------------

    pub fn add_potential(&mut self, field: &Field, synapse: Position, kind: UnitKind, now: TimeMs) -> Result<Vec<PotentialId>> {
        self.add_potential_at(field, synapse, kind, now, now)
    }

    /// Launch potentials from a synapse, starting to move at `launch_at`
    ///
    /// A missing or blocked synapse is a successful no-op. With swarm mode on,
    /// epsps are paid now and released together once enough are stored.
    pub fn add_potential_at(
        &mut self,
        field: &Field,
        synapse: Position,
        kind: UnitKind,
        now: TimeMs,
        launch_at: TimeMs,
    ) -> Result<Vec<PotentialId>> {
        let potential_kind = PotentialKind::try_from(kind)?;
        let Some(neuron) = self.neurons.get(&synapse) else {
            return Ok(Vec::new());
        };
        let Some(state) = neuron.synapse() else {
            return Ok(Vec::new());
        };
        if neuron.is_blocked() {
            return Ok(Vec::new());
        }
        if state.target(kind).is_none() {
            return Err(DissonanceError::InvalidTarget(format!("no {} target set", kind)));
        }
        let way = self
            .route_for(field, synapse, kind)
            .ok_or_else(|| DissonanceError::InvalidTarget(format!("{} target unreachable", kind)))?;

        self.economy.take_resources(unit_cost(kind), false, 1.0)?;
        self.stats.potential_built(kind, 1);

        let state = self.synapse_mut(synapse)?;
        let count = if potential_kind == PotentialKind::Epsp && state.swarm {
            state.stored += 1;
            if state.stored >= state.swarm_threshold {
                std::mem::take(&mut state.stored)
            } else {
                0
            }
        } else {
            1
        };

        let ids: Vec<PotentialId> = (0..count)
            .map(|_| self.spawn_potential(potential_kind, way.clone(), launch_at))
            .collect();
        if !ids.is_empty() {
            debug!(player = %self.id, %kind, %synapse, count = ids.len(), "potentials launched");
        }
        Ok(ids)
    }

    /// Put a potential on `way` without charging for it
    pub fn spawn_potential(&mut self, kind: PotentialKind, way: Vec<Position>, launch_at: TimeMs) -> PotentialId {
        let (magnitude, speed, duration) = self.potential_profile(kind);
        let id = PotentialId(self.next_potential);
        self.next_potential += 1;
        let potential = Potential::new(id, self.id, kind, way, magnitude, speed, launch_at, duration);
        self.potentials.insert(id, potential);
        id
    }

    /// Advance every potential; returns the ids that reached their target
    ///
    /// Arrived potentials stay in place until `take_potential` so that swallow
    /// checks still see them this pass.
    pub fn move_potentials(&mut self, field: &Field, now: TimeMs) -> Vec<PotentialId> {
        self.potentials
            .retain(|_, p| p.parked_until().map_or(true, |until| now < until));
        let neurons = &self.neurons;
        let mut arrived = Vec::new();
        for potential in self.potentials.values_mut().filter(|p| !p.is_parked()) {
            match potential.step(now) {
                Step::Waiting => {}
                Step::Arrived(_) => arrived.push(potential.id),
                Step::Moved(cell) => {
                    let partner = match neurons.get(&cell) {
                        Some(n) if !n.is_blocked() => match n.kind {
                            NeuronKind::Loophole { partner } => partner,
                            _ => None,
                        },
                        _ => None,
                    };
                    let Some(exit) = partner else {
                        continue;
                    };
                    if exit.distance(&potential.target) >= cell.distance(&potential.target) {
                        continue;
                    }
                    let way = field.get_way(exit, &[potential.target]);
                    if way.last() != Some(&potential.target) {
                        continue;
                    }
                    potential.reroute(exit, way);
                    debug!(id = %potential.id, from = %cell, to = %exit, "loophole jump");
                    if potential.remaining_len() == 0 {
                        arrived.push(potential.id);
                    }
                }
            }
        }
        arrived
    }

    pub fn take_potential(&mut self, id: PotentialId) -> Option<Potential> {
        self.potentials.remove(&id)
    }

    /// Keep a resolved ipsp on its cell for the duration of its block
    pub fn park_potential(&mut self, mut potential: Potential, until: TimeMs) {
        potential.park(until);
        self.potentials.insert(potential.id, potential);
    }

    /// Enemy effect on one of this player's potentials.
    /// Returns `Some(true)` if it was neutralised and removed.
    pub fn drain_potential(&mut self, id: PotentialId, amount: u32) -> Option<bool> {
        let potential = self.potentials.get_mut(&id)?;
        if !potential.reduce(amount) {
            return Some(false);
        }
        let kind = potential.kind.unit_kind();
        self.potentials.remove(&id);
        self.stats.potential_lost(kind);
        Some(true)
    }

    pub fn boost_potential(&mut self, id: PotentialId, amount: u32) {
        if let Some(potential) = self.potentials.get_mut(&id) {
            potential.gain(amount);
        }
    }

    /// Potentials within `radius` of `center`, by id
    pub fn potentials_within(&self, center: Position, radius: f64) -> Vec<PotentialId> {
        self.potentials
            .values()
            .filter(|p| !p.is_parked() && p.position.distance(&center) <= radius)
            .map(|p| p.id)
            .collect()
    }

    // ---- defence ------------------------------------------------------------

    /// Activated neurons able to fire now, with their potential
    pub fn ready_defenders(&self, now: TimeMs) -> Vec<(Position, u32)> {
        self.neurons
            .values()
            .filter_map(|n| n.defence_ready(now).map(|potential| (n.position, potential)))
            .collect()
    }

    pub fn fire_defender(&mut self, pos: Position, now: TimeMs) {
        if let Some(neuron) = self.neurons.get_mut(&pos) {
            neuron.reset_cooldown(now);
        }
    }

    pub fn record_kill(&mut self, kind: UnitKind) {
        self.stats.potential_killed(kind);
    }

    pub fn record_swallow(&mut self) {
        self.stats.swallowed();
    }

    // ---- damage -----------------------------------------------------------

    /// Deliver `amount` to the neuron at `pos`
    ///
    /// A destroyed neuron frees its bound cost. Losing a nucleus also removes
    /// every neuron no longer inside the range of a surviving nucleus.
    pub fn add_potential_to_neuron(&mut self, pos: Position, amount: u32) -> NeuronHit {
        let Some(neuron) = self.neurons.get_mut(&pos) else {
            return NeuronHit::Missed;
        };
        if !neuron.take_damage(amount) {
            return NeuronHit::Damaged {
                voltage: neuron.voltage(),
            };
        }

        let mut destroyed = Vec::new();
        let was_nucleus = neuron.unit_kind() == UnitKind::Nucleus;
        self.destroy_neuron(pos, &mut destroyed);
        if was_nucleus {
            let nuclei: Vec<(Position, f64)> = self
                .neurons
                .values()
                .filter_map(|n| n.range().map(|range| (n.position, range)))
                .collect();
            let orphans: Vec<Position> = self
                .neurons
                .values()
                .filter(|n| !nuclei.iter().any(|(at, range)| at.distance(&n.position) <= *range))
                .map(|n| n.position)
                .collect();
            for orphan in orphans {
                self.destroy_neuron(orphan, &mut destroyed);
            }
            info!(player = %self.id, %pos, removed = destroyed.len(), "nucleus destroyed");
        }
        NeuronHit::Destroyed(destroyed)
    }

    fn destroy_neuron(&mut self, pos: Position, destroyed: &mut Vec<(Position, UnitKind)>) {
        let Some(neuron) = self.neurons.remove(&pos) else {
            return;
        };
        let kind = neuron.unit_kind();
        match neuron.kind {
            NeuronKind::ResourceNeuron { resource } => self.economy.deactivate(resource),
            NeuronKind::Loophole { partner: Some(partner) } => {
                if let Some(NeuronKind::Loophole { partner }) = self.neurons.get_mut(&partner).map(|n| &mut n.kind) {
                    *partner = None;
                }
            }
            _ => {}
        }
        if neuron.binds_cost() {
            self.economy.free_bound(unit_cost(kind));
        }
        self.stats.neuron_lost(kind);
        debug!(player = %self.id, %kind, %pos, "neuron destroyed");
        destroyed.push((pos, kind));
    }

    /// Block the neuron at `pos` until `until`; a blocked resource stops growing
    pub fn block_neuron(&mut self, pos: Position, until: TimeMs) -> bool {
        let Some(neuron) = self.neurons.get_mut(&pos) else {
            return false;
        };
        neuron.block(until);
        if let NeuronKind::ResourceNeuron { resource } = neuron.kind {
            self.economy.set_blocked(resource, true);
        }
        true
    }

    /// Lift expired blocks
    pub fn refresh_blocks(&mut self, now: TimeMs) {
        for neuron in self.neurons.values_mut() {
            if neuron.unblock_if_expired(now) {
                if let NeuronKind::ResourceNeuron { resource } = neuron.kind {
                    self.economy.set_blocked(resource, false);
                }
            }
        }
    }

    // ---- scouting ---------------------------------------------------------

    /// Enemy neurons visible to this player's potentials
    ///
    /// A potential within scout radius of an enemy nucleus reveals every
    /// neuron of that enemy inside the nucleus range.
    pub fn visible_enemy_neurons(&self, enemy: &Player) -> Vec<(Position, UnitKind)> {
        let radius = self.config.units.scout_radius;
        let mut seen = Vec::new();
        for nucleus in enemy.neurons.values().filter(|n| n.unit_kind() == UnitKind::Nucleus) {
            let watched = self
                .potentials
                .values()
                .any(|p| p.position.distance(&nucleus.position) <= radius);
            if !watched {
                continue;
            }
            let range = nucleus.range().unwrap_or_default();
            for neuron in enemy.neurons.values() {
                if neuron.position.distance(&nucleus.position) <= range {
                    seen.push((neuron.position, neuron.unit_kind()));
                }
            }
        }
        seen.sort();
        seen.dedup();
        seen
    }

    /// Keep only cells not reported before and remember them
    pub fn mark_scouted(&mut self, enemy: PlayerId, cells: Vec<(Position, UnitKind)>) -> Vec<(Position, UnitKind)> {
        cells
            .into_iter()
            .filter(|(pos, _)| self.scouted.insert((enemy, *pos)))
            .collect()
    }

    /// Cells of `enemy` this player has seen so far, in row-major order
    pub fn scouted_cells(&self, enemy: PlayerId) -> Vec<Position> {
        let mut cells: Vec<Position> = self
            .scouted
            .iter()
            .filter(|(owner, _)| *owner == enemy)
            .map(|(_, pos)| *pos)
            .collect();
        cells.sort();
        cells
    }

    // ---- statistics -------------------------------------------------------

    pub fn sample_stats(&mut self, beat: u64, now: TimeMs) {
        let sample = StatsSample {
            beat,
            time_ms: now,
            iron: self.economy.iron(),
            resources: self.economy.total_current(),
            neurons: self.neurons.len(),
            potentials: self.potentials.len(),
        };
        self.stats.sample(sample);
    }
}

/// Cells occupied by any neuron of any player
pub fn occupied_cells(players: &[Player]) -> AHashSet<Position> {
    players
        .iter()
        .flat_map(|p| p.neurons.keys().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EconomyConfig;
    use crate::field::{Grid, SpatialGraph, Terrain};

    pub(super) const NUCLEUS: Position = Position::new(5, 5);
    pub(super) const ENEMY: Position = Position::new(5, 25);

    pub(super) fn open_field() -> Field {
        let grid = Grid::new(12, 32);
        let graph = SpatialGraph::build(&grid, &[NUCLEUS, ENEMY]).unwrap();
        let slots = |c: Position| (0..6).map(|i| Position::new(c.row - 3, c.col - 3 + i)).collect::<Vec<_>>();
        Field::new(grid, graph, vec![NUCLEUS, ENEMY], vec![slots(NUCLEUS), slots(ENEMY)])
    }

    /// Field with an island the graph pruned away
    fn field_with_island() -> Field {
        let mut grid = Grid::new(12, 32);
        for row in 8..12 {
            grid.set_terrain(Position::new(row, 2), Terrain::Hill);
        }
        for col in 0..3 {
            grid.set_terrain(Position::new(8, col), Terrain::Hill);
        }
        let graph = SpatialGraph::build(&grid, &[NUCLEUS, ENEMY]).unwrap();
        Field::new(grid, graph, vec![NUCLEUS, ENEMY], vec![vec![], vec![]])
    }

    /// Open field where row 5 is walled in between columns 6 and 12
    fn corridor_field() -> Field {
        let mut grid = Grid::new(12, 32);
        for col in 6..=12 {
            grid.set_terrain(Position::new(4, col), Terrain::Hill);
            grid.set_terrain(Position::new(6, col), Terrain::Hill);
        }
        let graph = SpatialGraph::build(&grid, &[NUCLEUS, ENEMY]).unwrap();
        Field::new(grid, graph, vec![NUCLEUS, ENEMY], vec![vec![], vec![]])
    }

    pub(super) fn rich_config() -> Arc<GameConfig> {
        Arc::new(GameConfig {
            economy: EconomyConfig {
                oxygen_start: 100.0,
                resource_start: 100.0,
                resource_limit: 200.0,
                ..Default::default()
            },
            ..Default::default()
        })
    }

    pub(super) fn player(field: &Field, id: usize, config: Arc<GameConfig>) -> Player {
        let enemies = (0..2).filter(|i| *i != id).map(PlayerId).collect();
        Player::new(PlayerId(id), config, field, enemies, MacroMode::Area, false).unwrap()
    }

    #[test]
    fn test_starts_with_nucleus() {
        let field = open_field();
        let p = player(&field, 0, Arc::new(GameConfig::default()));
        assert_eq!(p.nuclei(), vec![NUCLEUS]);
        assert!(!p.has_lost());
        assert!(p.is_enemy(PlayerId(1)));
    }

    #[test]
    fn test_occupied_resource_slot_is_left_alone() {
        let field = open_field();
        let mut p = player(&field, 0, Arc::new(GameConfig::default()));
        let slot = field.resource_slots(0)[0];
        // a teleport cannot open a loophole on a resource cell
        assert!(!p.place_free_loophole(&field, &AHashSet::new(), slot, 0));

        let squatter = Neuron::new(slot, NeuronKind::Loophole { partner: None }, 6, 0);
        p.neurons.insert(slot, squatter);
        p.distribute_iron(ResourceKind::Oxygen, 0).unwrap();
        let effect = p.distribute_iron(ResourceKind::Oxygen, 0).unwrap();
        assert_eq!(effect, IronEffect::Activated(Some(slot)));
        assert_eq!(p.neuron(slot).map(|n| n.unit_kind()), Some(UnitKind::Loophole));
        assert!(p.stats().neurons_built.get(&UnitKind::ResourceNeuron).is_none());

        // deactivation does not remove the occupant either
        p.remove_iron(ResourceKind::Oxygen, 0).unwrap();
        p.remove_iron(ResourceKind::Oxygen, 0).unwrap();
        assert_eq!(p.neuron(slot).map(|n| n.unit_kind()), Some(UnitKind::Loophole));
    }

    #[test]
    fn test_iron_creates_resource_neuron() {
        let field = open_field();
        let mut p = player(&field, 0, Arc::new(GameConfig::default()));
        let slot = field.resource_slots(0)[0];
        p.distribute_iron(ResourceKind::Oxygen, 0).unwrap();
        assert!(p.neuron(slot).is_none());
        p.distribute_iron(ResourceKind::Oxygen, 0).unwrap();
        assert_eq!(p.neuron(slot).unwrap().unit_kind(), UnitKind::ResourceNeuron);
        p.remove_iron(ResourceKind::Oxygen, 0).unwrap();
        assert!(p.neuron(slot).is_some());
        p.remove_iron(ResourceKind::Oxygen, 0).unwrap();
        assert!(p.neuron(slot).is_none());
    }

    #[test]
    fn test_build_synapse_binds_cost() {
        let field = open_field();
        let mut p = player(&field, 0, rich_config());
        let occupied = AHashSet::new();
        p.add_neuron(&field, &occupied, Position::new(5, 8), UnitKind::Synapse, Some(ENEMY), 0)
            .unwrap();
        assert_eq!(p.economy().get(ResourceKind::Oxygen).bound(), 10.0);
        assert_eq!(p.economy().get(ResourceKind::Potassium).current(), 95.0);
        assert_eq!(p.stats().neurons_built[&UnitKind::Synapse], 1);
    }

    #[test]
    fn test_synapse_with_unreachable_target_debits_nothing() {
        let field = field_with_island();
        let mut p = player(&field, 0, rich_config());
        let before = p.economy().summary();
        let err = p
            .add_neuron(&field, &AHashSet::new(), Position::new(5, 8), UnitKind::Synapse, Some(Position::new(10, 0)), 0)
            .unwrap_err();
        assert!(matches!(err, DissonanceError::InvalidTarget(_)));
        assert_eq!(p.economy().summary(), before);
    }

    #[test]
    fn test_placement_rules() {
        let field = open_field();
        let mut p = player(&field, 0, rich_config());
        let occupied: AHashSet<Position> = [Position::new(5, 7)].into_iter().collect();
        let far = p.add_neuron(&field, &occupied, Position::new(5, 15), UnitKind::ActivatedNeuron, None, 0);
        assert!(matches!(far, Err(DissonanceError::InvalidPosition(..))));
        let taken = p.add_neuron(&field, &occupied, Position::new(5, 7), UnitKind::ActivatedNeuron, None, 0);
        assert!(matches!(taken, Err(DissonanceError::InvalidPosition(..))));
        let slot = field.resource_slots(0)[2];
        let reserved = p.add_neuron(&field, &occupied, slot, UnitKind::ActivatedNeuron, None, 0);
        assert!(matches!(reserved, Err(DissonanceError::InvalidPosition(..))));
        // a nucleus reaches twice as far
        p.add_neuron(&field, &occupied, Position::new(5, 12), UnitKind::Nucleus, None, 0)
            .unwrap();
        let cells = p.check_build_neuron(&field, &occupied, UnitKind::Synapse).unwrap();
        assert!(cells.contains(&Position::new(5, 15)));
        assert!(!cells.contains(&Position::new(5, 7)));
    }

    #[test]
    fn test_resource_neuron_not_buildable() {
        let field = open_field();
        let mut p = player(&field, 0, rich_config());
        let res = p.add_neuron(&field, &AHashSet::new(), Position::new(6, 6), UnitKind::ResourceNeuron, None, 0);
        assert!(res.is_err());
    }

    #[test]
    fn test_nucleus_death_cascades() {
        let field = open_field();
        let mut p = player(&field, 0, rich_config());
        let occupied = AHashSet::new();
        p.add_neuron(&field, &occupied, Position::new(5, 8), UnitKind::Synapse, Some(ENEMY), 0)
            .unwrap();
        let bound_before = p.economy().get(ResourceKind::Oxygen).bound();
        assert_eq!(bound_before, 10.0);

        assert_eq!(
            p.add_potential_to_neuron(NUCLEUS, 4),
            NeuronHit::Damaged { voltage: 5 }
        );
        match p.add_potential_to_neuron(NUCLEUS, 5) {
            NeuronHit::Destroyed(removed) => {
                assert_eq!(removed[0], (NUCLEUS, UnitKind::Nucleus));
                assert!(removed.contains(&(Position::new(5, 8), UnitKind::Synapse)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(p.has_lost());
        assert_eq!(p.neuron_count(), 0);
        assert_eq!(p.economy().get(ResourceKind::Oxygen).bound(), 0.0);
    }

    #[test]
    fn test_hit_on_empty_cell_misses() {
        let field = open_field();
        let mut p = player(&field, 0, rich_config());
        assert_eq!(p.add_potential_to_neuron(Position::new(0, 0), 3), NeuronHit::Missed);
    }

    #[test]
    fn test_missing_or_blocked_synapse_is_noop() {
        let field = open_field();
        let mut p = player(&field, 0, rich_config());
        assert!(p.add_potential(&field, Position::new(1, 1), UnitKind::Epsp, 0).unwrap().is_empty());
        let syn = Position::new(5, 8);
        p.add_neuron(&field, &AHashSet::new(), syn, UnitKind::Synapse, Some(ENEMY), 0)
            .unwrap();
        p.block_neuron(syn, 1000);
        let before = p.economy().summary();
        assert!(p.add_potential(&field, syn, UnitKind::Epsp, 10).unwrap().is_empty());
        assert_eq!(p.economy().summary(), before);
        p.refresh_blocks(1000);
        assert_eq!(p.add_potential(&field, syn, UnitKind::Epsp, 1000).unwrap().len(), 1);
    }

    #[test]
    fn test_potentials_reach_target() {
        let field = open_field();
        let mut p = player(&field, 0, rich_config());
        let syn = Position::new(5, 8);
        p.add_neuron(&field, &AHashSet::new(), syn, UnitKind::Synapse, Some(ENEMY), 0)
            .unwrap();
        let id = p.add_potential(&field, syn, UnitKind::Epsp, 0).unwrap()[0];
        let mut now = 0;
        let mut arrived = Vec::new();
        while arrived.is_empty() && now < 100_000 {
            now += 50;
            arrived = p.move_potentials(&field, now);
        }
        assert_eq!(arrived, vec![id]);
        assert_eq!(p.take_potential(id).unwrap().position, ENEMY);
    }

    #[test]
    fn test_loophole_jump_shortens_route() {
        let field = corridor_field();
        let mut p = player(&field, 0, rich_config());
        let occupied = AHashSet::new();
        let syn = Position::new(5, 7);
        p.add_neuron(&field, &occupied, syn, UnitKind::Synapse, Some(ENEMY), 0)
            .unwrap();
        p.add_neuron(&field, &occupied, Position::new(5, 8), UnitKind::Loophole, None, 0)
            .unwrap();
        p.add_neuron(&field, &occupied, Position::new(5, 13), UnitKind::Nucleus, None, 0)
            .unwrap();
        p.add_neuron(&field, &occupied, Position::new(5, 16), UnitKind::Loophole, None, 0)
            .unwrap();
        assert!(p
            .add_neuron(&field, &occupied, Position::new(6, 16), UnitKind::Loophole, None, 0)
            .is_err());

        let id = p.add_potential(&field, syn, UnitKind::Epsp, 0).unwrap()[0];
        p.move_potentials(&field, 1000);
        let pot = p.potential(id).unwrap();
        assert_eq!(pot.position, Position::new(5, 16));
        assert_eq!(pot.remaining_len(), 9);
    }

    #[test]
    fn test_drain_potential_records_loss() {
        let field = open_field();
        let mut p = player(&field, 0, rich_config());
        let syn = Position::new(5, 8);
        p.add_neuron(&field, &AHashSet::new(), syn, UnitKind::Synapse, Some(ENEMY), 0)
            .unwrap();
        let id = p.add_potential(&field, syn, UnitKind::Epsp, 0).unwrap()[0];
        assert_eq!(p.drain_potential(id, 1), Some(false));
        assert_eq!(p.drain_potential(id, 1), Some(true));
        assert_eq!(p.drain_potential(id, 1), None);
        assert_eq!(p.stats().potentials_lost[&UnitKind::Epsp], 1);
    }

    #[test]
    fn test_blocked_resource_stops_growth() {
        let field = open_field();
        let mut p = player(&field, 0, Arc::new(GameConfig::default()));
        p.distribute_iron(ResourceKind::Potassium, 0).unwrap();
        p.distribute_iron(ResourceKind::Potassium, 0).unwrap();
        let slot = field.resource_slots(0)[1];
        assert!(p.block_neuron(slot, 500));
        p.increase_resources(false);
        assert_eq!(p.economy().get(ResourceKind::Potassium).current(), 0.0);
        p.refresh_blocks(500);
        p.increase_resources(false);
        assert!(p.economy().get(ResourceKind::Potassium).current() > 0.0);
    }

    #[test]
    fn test_destroyed_resource_neuron_zeroes_iron() {
        let field = open_field();
        let mut p = player(&field, 0, Arc::new(GameConfig::default()));
        p.distribute_iron(ResourceKind::Serotonin, 0).unwrap();
        p.distribute_iron(ResourceKind::Serotonin, 0).unwrap();
        let slot = field.resource_slots(0)[5];
        assert!(matches!(p.add_potential_to_neuron(slot, 99), NeuronHit::Destroyed(_)));
        assert_eq!(p.economy().get(ResourceKind::Serotonin).distributed_iron(), 0);
        assert!(!p.economy().get(ResourceKind::Serotonin).is_active());
    }

    #[test]
    fn test_scouting_reports_once() {
        let field = open_field();
        let config = rich_config();
        let mut a = player(&field, 0, config.clone());
        let mut b = player(&field, 1, config);
        b.add_neuron(&field, &AHashSet::new(), Position::new(5, 22), UnitKind::ActivatedNeuron, None, 0)
            .unwrap();
        let syn = Position::new(5, 8);
        a.add_neuron(&field, &AHashSet::new(), syn, UnitKind::Synapse, Some(Position::new(5, 21)), 0)
            .unwrap();
        a.add_potential(&field, syn, UnitKind::Epsp, 0).unwrap();
        assert!(a.visible_enemy_neurons(&b).is_empty());

        let mut now = 0;
        while a.visible_enemy_neurons(&b).is_empty() && now < 100_000 {
            now += 50;
            a.move_potentials(&field, now);
        }
        let seen = a.visible_enemy_neurons(&b);
        assert!(seen.contains(&(ENEMY, UnitKind::Nucleus)));
        assert!(seen.contains(&(Position::new(5, 22), UnitKind::ActivatedNeuron)));
        let first = a.mark_scouted(PlayerId(1), seen.clone());
        assert_eq!(first.len(), seen.len());
        assert!(a.mark_scouted(PlayerId(1), seen).is_empty());
    }

    #[test]
    fn test_occupied_cells() {
        let field = open_field();
        let config = rich_config();
        let players = vec![player(&field, 0, config.clone()), player(&field, 1, config)];
        let occupied = occupied_cells(&players);
        assert!(occupied.contains(&NUCLEUS));
        assert!(occupied.contains(&ENEMY));
        assert_eq!(occupied.len(), 2);
    }
}
