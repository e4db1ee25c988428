//! Audio-driven AI player
//!
//! Each tick the engine reads the next feature point, updates its ballots on
//! interval changes and produces `Action`s from a read-only `DecisionContext`.
//! The orchestrator applies them through `apply_actions` and reports the
//! results back so failed queue entries are retried.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::{AudioFeed, AudioTimePoint, FeatureCursor, FeatureSequence};
use crate::core::config::{GameConfig, TacticsConfig};
use crate::core::error::{DissonanceError, Result};
use crate::core::types::{PlayerId, Position, PotentialId, TechnologyKind, TimeMs, UnitKind};
use crate::economy::{technology_cost, unit_cost, ResourceKind};
use crate::entity::{Player, Potential, PotentialKind, MAX_TECHNOLOGY_LEVEL};
use crate::field::Field;
use crate::tactics::context::DecisionContext;
use crate::tactics::planner::{arrival_delays, commit, desired_epsps, potassium_cap, EconomyPlan};
use crate::tactics::strategy::Strategies;

/// Candidate cells considered when choosing a build position
const PLACEMENT_SHORTLIST: usize = 4;

/// One decision of the AI, applied through the player's public operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    BuildNeuron {
        kind: UnitKind,
        position: Position,
        epsp_target: Option<Position>,
    },
    DistributeIron(ResourceKind),
    Research(TechnologyKind),
    SetTarget {
        synapse: Position,
        kind: UnitKind,
        target: Position,
    },
    Launch {
        synapse: Position,
        kind: UnitKind,
        count: u32,
        launch_at: TimeMs,
    },
}

/// Level excursion above the rolling average
#[derive(Debug, Clone, Copy, Default)]
struct Burst {
    peak: f64,
    points: u32,
}

/// Planned ipsp launch towards a cell on an enemy epsp's way
#[derive(Debug, Clone, Copy, PartialEq)]
struct Intercept {
    synapse: Position,
    meet: Position,
    launch_at: TimeMs,
}

impl Intercept {
    /// Append the launch, merging with the previous one when identical
    fn push_to(self, actions: &mut Vec<Action>) {
        if let [.., Action::SetTarget {
            synapse,
            kind: UnitKind::Ipsp,
            target,
        }, Action::Launch {
            synapse: from,
            kind: UnitKind::Ipsp,
            count,
            launch_at,
        }] = actions.as_mut_slice()
        {
            if *synapse == self.synapse && *from == self.synapse && *target == self.meet && *launch_at == self.launch_at {
                *count += 1;
                return;
            }
        }
        actions.push(Action::SetTarget {
            synapse: self.synapse,
            kind: UnitKind::Ipsp,
            target: self.meet,
        });
        actions.push(Action::Launch {
            synapse: self.synapse,
            kind: UnitKind::Ipsp,
            count: 1,
            launch_at: self.launch_at,
        });
    }
}

pub struct TacticsEngine {
    player: PlayerId,
    config: TacticsConfig,
    defence_radius: f64,
    strategies: Strategies,
    plan: EconomyPlan,
    cursor: FeatureCursor,
    sequence: Box<dyn FeatureSequence>,
    levels: VecDeque<f64>,
    burst: Option<Burst>,
    last_interval: Option<usize>,
    answered: AHashSet<(PlayerId, PotentialId)>,
}

impl TacticsEngine {
    pub fn new(
        player: PlayerId,
        config: &GameConfig,
        feed: Arc<AudioFeed>,
        sequence: Box<dyn FeatureSequence>,
    ) -> Self {
        let mut engine = Self {
            player,
            config: config.tactics.clone(),
            defence_radius: config.units.defence_radius,
            strategies: Strategies::default(),
            plan: EconomyPlan::default(),
            cursor: FeatureCursor::new(feed),
            sequence,
            levels: VecDeque::new(),
            burst: None,
            last_interval: None,
            answered: AHashSet::new(),
        };
        engine.setup();
        engine
    }

    /// Vote on the opening interval and build the economy queues from it
    fn setup(&mut self) {
        let first = self.cursor.peek().map(|p| p.interval).unwrap_or(0);
        if let Some(interval) = self.cursor.feed().interval(first).cloned() {
            self.strategies.set_battle_tactics(&interval);
            self.last_interval = Some(first);
        }
        self.plan = EconomyPlan::set_economy_tactics(&self.strategies, MAX_TECHNOLOGY_LEVEL);
        info!(
            player = %self.player,
            lean = %self.strategies.lean(),
            attack = %self.strategies.attack_strategy(),
            block = %self.strategies.block_strategy(),
            "ai set up"
        );
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn strategies(&self) -> &Strategies {
        &self.strategies
    }

    pub fn plan(&self) -> &EconomyPlan {
        &self.plan
    }

    pub fn in_burst(&self) -> bool {
        self.burst.is_some()
    }

    /// Consume the next feature point and decide
    pub fn tick(&mut self, ctx: &DecisionContext) -> Vec<Action> {
        let point = self.cursor.next_looping();
        self.decide(ctx, &point)
    }

    /// Decisions for one feature point
    pub fn decide(&mut self, ctx: &DecisionContext, point: &AudioTimePoint) -> Vec<Action> {
        let mut actions = Vec::new();
        if ctx.player().has_lost() {
            return actions;
        }
        self.follow_interval(point.interval);

        let average = self.rolling_average();
        self.push_level(point.level);
        let excess = average
            .filter(|avg| *avg > 0.0)
            .map_or(0.0, |avg| (point.level - avg) / avg);
        let rising = average.is_some_and(|avg| point.level > avg);

        match (self.burst.take(), rising) {
            (None, true) => {
                self.burst = Some(Burst {
                    peak: excess,
                    points: 1,
                });
                actions.extend(self.build_synapse(ctx));
            }
            (Some(mut burst), true) => {
                burst.peak = burst.peak.max(excess);
                burst.points += 1;
                self.burst = Some(burst);
            }
            (Some(burst), false) => {
                debug!(player = %self.player, peak = burst.peak, points = burst.points, "burst ended");
                actions.extend(self.attack(ctx, burst));
                actions.extend(self.build_activated_neuron(ctx));
            }
            (None, false) => {}
        }

        actions.extend(self.economy_step(ctx));
        actions.extend(self.defence_check(ctx));
        actions
    }

    fn follow_interval(&mut self, interval: usize) {
        if self.last_interval == Some(interval) {
            return;
        }
        self.last_interval = Some(interval);
        if let Some(interval) = self.cursor.feed().interval(interval).cloned() {
            self.strategies.set_battle_tactics(&interval);
            debug!(
                player = %self.player,
                interval = interval.id,
                attack = %self.strategies.attack_strategy(),
                block = %self.strategies.block_strategy(),
                "strategies updated"
            );
        }
    }

    fn rolling_average(&self) -> Option<f64> {
        if self.levels.is_empty() {
            return None;
        }
        Some(self.levels.iter().sum::<f64>() / self.levels.len() as f64)
    }

    fn push_level(&mut self, level: f64) {
        self.levels.push_back(level);
        while self.levels.len() > self.config.level_window.max(1) {
            self.levels.pop_front();
        }
    }

    /// Shortlist of free cells for `kind`, nearest to `towards` first
    fn placement(&self, ctx: &DecisionContext, kind: UnitKind, towards: Position) -> Vec<Position> {
        let mut cells = ctx.player().candidate_positions(ctx.field, ctx.occupied, kind);
        cells.sort_by(|a, b| a.distance(&towards).total_cmp(&b.distance(&towards)).then(a.cmp(b)));
        cells.truncate(PLACEMENT_SHORTLIST);
        cells
    }

    fn build_synapse(&mut self, ctx: &DecisionContext) -> Option<Action> {
        let player = ctx.player();
        if ctx.count(UnitKind::Synapse) >= self.config.max_synapses
            || !player.economy().can_afford(unit_cost(UnitKind::Synapse), 1.0)
        {
            return None;
        }
        let target = ctx.enemy_nucleus()?;
        let position = self
            .placement(ctx, UnitKind::Synapse, target)
            .into_iter()
            .find(|cell| ctx.field.graph().shortest_path(*cell, target).is_some())?;
        Some(Action::BuildNeuron {
            kind: UnitKind::Synapse,
            position,
            epsp_target: Some(target),
        })
    }

    /// An activated neuron on the side facing the enemy
    fn build_activated_neuron(&mut self, ctx: &DecisionContext) -> Option<Action> {
        let player = ctx.player();
        if ctx.count(UnitKind::ActivatedNeuron) >= self.config.max_activated_neurons
            || !player.economy().can_afford(unit_cost(UnitKind::ActivatedNeuron), 1.0)
        {
            return None;
        }
        let towards = ctx.enemy_nucleus()?;
        let cells = self.placement(ctx, UnitKind::ActivatedNeuron, towards);
        let index = self.sequence.pick(cells.len())?;
        Some(Action::BuildNeuron {
            kind: UnitKind::ActivatedNeuron,
            position: cells[index],
            epsp_target: None,
        })
    }

    /// Attack for a finished burst
    ///
    /// Epsps leave from the synapse farthest from the enemy nucleus. Ipsps
    /// block neurons picked by the block strategy; the epsp target comes from
    /// the attack strategy and avoids cells already blocked.
    fn attack(&mut self, ctx: &DecisionContext, burst: Burst) -> Vec<Action> {
        let mut actions = Vec::new();
        let player = ctx.player();
        let Some(enemy) = ctx.primary_enemy() else {
            return actions;
        };
        let Some(enemy_nucleus) = enemy.nuclei().first().copied() else {
            return actions;
        };
        let synapses: Vec<Position> = player
            .neuron_positions(Some(UnitKind::Synapse))
            .into_iter()
            .filter(|pos| player.neuron(*pos).is_some_and(|n| !n.is_blocked()))
            .collect();
        let Some(epsp_synapse) = synapses.iter().copied().reduce(|best, pos| {
            if pos.distance(&enemy_nucleus) > best.distance(&enemy_nucleus) {
                pos
            } else {
                best
            }
        }) else {
            return actions;
        };

        let economy = player.economy();
        let potassium = economy.get(ResourceKind::Potassium);
        let chloride = economy.get(ResourceKind::Chloride).current();
        let cost_of = |kind: UnitKind, res: ResourceKind| {
            unit_cost(kind)
                .iter()
                .find(|(r, _)| *r == res)
                .map_or(0.0, |(_, amount)| *amount)
        };
        let epsp_k = cost_of(UnitKind::Epsp, ResourceKind::Potassium);
        let ipsp_k = cost_of(UnitKind::Ipsp, ResourceKind::Potassium);
        let ipsp_cl = cost_of(UnitKind::Ipsp, ResourceKind::Chloride);

        let block_kind = self.strategies.block_strategy().unit_kind();
        let affordable_ipsps = if ipsp_k > 0.0 && ipsp_cl > 0.0 {
            ((potassium.current() / ipsp_k).min(chloride / ipsp_cl)).floor() as usize
        } else {
            0
        };
        let ipsp_targets: Vec<Position> = enemy
            .neuron_positions(Some(block_kind))
            .into_iter()
            .filter(|pos| ctx.field.graph().contains(*pos))
            .take(self.config.max_ipsp_targets.min(affordable_ipsps))
            .collect();

        let attack_kind = self.strategies.attack_strategy().unit_kind();
        let candidates = enemy.neuron_positions(Some(attack_kind));
        let epsp_target = candidates
            .iter()
            .find(|pos| !ipsp_targets.contains(pos))
            .or(candidates.first())
            .copied()
            .unwrap_or(enemy_nucleus);

        let desired = desired_epsps(burst.peak, &self.config).min(potassium_cap(potassium.limit(), epsp_k, &self.config));
        let potassium_left = potassium.current() - ipsp_targets.len() as f64 * ipsp_k;
        let affordable = if epsp_k > 0.0 {
            (potassium_left / epsp_k).floor().max(0.0) as u32
        } else {
            desired
        };
        let Some(count) = commit(desired, affordable, &self.config) else {
            debug!(player = %self.player, desired, affordable, "attack skipped");
            return actions;
        };

        let epsp_speed = player.potential_speed(PotentialKind::Epsp);
        let ipsp_speed = player.potential_speed(PotentialKind::Ipsp);
        let eta = |from: Position, to: Position, speed: TimeMs| {
            ctx.field.get_way(from, &[to]).len().saturating_sub(1) as TimeMs * speed
        };
        let ipsp_synapses: Vec<Position> = {
            let others: Vec<Position> = synapses.iter().copied().filter(|s| *s != epsp_synapse).collect();
            if others.is_empty() {
                vec![epsp_synapse]
            } else {
                others
            }
        };
        let ipsps: Vec<(Position, Position)> = ipsp_targets
            .iter()
            .enumerate()
            .map(|(i, target)| (ipsp_synapses[i % ipsp_synapses.len()], *target))
            .collect();
        let epsp_eta = eta(epsp_synapse, epsp_target, epsp_speed);
        let ipsp_eta = ipsps
            .iter()
            .map(|(synapse, target)| eta(*synapse, *target, ipsp_speed))
            .max()
            .unwrap_or(epsp_eta);
        let (epsp_delay, ipsp_delay) = arrival_delays(epsp_eta, ipsp_eta);

        for (synapse, target) in &ipsps {
            actions.push(Action::SetTarget {
                synapse: *synapse,
                kind: UnitKind::Ipsp,
                target: *target,
            });
            actions.push(Action::Launch {
                synapse: *synapse,
                kind: UnitKind::Ipsp,
                count: 1,
                launch_at: ctx.now + ipsp_delay,
            });
        }
        actions.push(Action::SetTarget {
            synapse: epsp_synapse,
            kind: UnitKind::Epsp,
            target: epsp_target,
        });
        actions.push(Action::Launch {
            synapse: epsp_synapse,
            kind: UnitKind::Epsp,
            count,
            launch_at: ctx.now + epsp_delay,
        });
        info!(
            player = %self.player,
            epsps = count,
            ipsps = ipsps.len(),
            target = %epsp_target,
            "attack launched"
        );
        actions
    }

    /// Next queued investment and research, when affordable
    fn economy_step(&mut self, ctx: &DecisionContext) -> Vec<Action> {
        let mut actions = Vec::new();
        let player = ctx.player();
        if let Some(resource) = self.plan.next_resource() {
            if player.economy().iron() >= 1.0 {
                self.plan.pop_resource();
                actions.push(Action::DistributeIron(resource));
            }
        }
        while let Some(technology) = self.plan.next_technology() {
            let technologies = player.technologies();
            if technologies.is_maxed(technology) {
                self.plan.pop_technology();
                continue;
            }
            let factor = technologies.next_cost_factor(technology);
            if player.economy().can_afford(technology_cost(technology), factor) {
                self.plan.pop_technology();
                actions.push(Action::Research(technology));
            }
            break;
        }
        actions
    }

    /// Answer incoming epsps that outnumber their defenders
    ///
    /// Epsps are grouped by target. Every activated neuron in reach of a
    /// group's paths covers one epsp, as does every epsp already met by an
    /// ipsp. Each remaining epsp gets an ipsp timed to meet it on its way;
    /// those that cannot be intercepted get an activated neuron next to the
    /// target instead.
    fn defence_check(&mut self, ctx: &DecisionContext) -> Vec<Action> {
        let incoming = ctx.incoming_epsps();
        self.answered
            .retain(|key| incoming.iter().any(|p| (p.owner, p.id) == *key));

        let mut groups: Vec<(Position, Vec<&Potential>)> = Vec::new();
        for threat in incoming {
            match groups.iter_mut().find(|(target, _)| *target == threat.target) {
                Some((_, group)) => group.push(threat),
                None => groups.push((threat.target, vec![threat])),
            }
        }
        for (_, group) in groups.iter_mut() {
            group.sort_by_key(|p| (p.eta_ms(ctx.now), p.owner, p.id));
        }
        groups.sort_by_key(|(target, group)| (group.first().map(|p| p.eta_ms(ctx.now)), *target));

        let mut actions = Vec::new();
        let mut ipsps = 0;
        let mut placed = Vec::new();
        for (target, group) in &groups {
            let (met, open): (Vec<&Potential>, Vec<&Potential>) = group
                .iter()
                .copied()
                .partition(|p| self.answered.contains(&(p.owner, p.id)));
            let defenders = ctx.defenders_on(group, self.defence_radius);
            let deficit = group.len().saturating_sub(defenders + met.len());
            if deficit == 0 {
                continue;
            }
            debug!(
                player = %self.player,
                target = %target,
                incoming = group.len(),
                defenders,
                deficit,
                "defence deficit"
            );

            let mut unmet = Vec::new();
            for threat in open.into_iter().take(deficit) {
                match self.intercept(ctx, threat, ipsps + 1) {
                    Some(intercept) => {
                        ipsps += 1;
                        intercept.push_to(&mut actions);
                        self.answered.insert((threat.owner, threat.id));
                    }
                    None => unmet.push(threat),
                }
            }
            // activated neurons count as defenders once built, so they are not marked
            for position in self.defence_cells(ctx, *target, unmet.len(), &mut placed) {
                actions.push(Action::BuildNeuron {
                    kind: UnitKind::ActivatedNeuron,
                    position,
                    epsp_target: None,
                });
            }
        }
        actions
    }

    /// Ipsp launch that meets `threat` on a cell of its remaining way
    ///
    /// Picks the first cell some synapse can reach no later than the epsp and
    /// delays the launch so both arrive in the same pass. `nth` is the number
    /// of ipsps paid for this tick, this one included. The target cell itself
    /// is never chosen.
    fn intercept(&self, ctx: &DecisionContext, threat: &Potential, nth: u32) -> Option<Intercept> {
        let player = ctx.player();
        if !player.economy().can_afford(unit_cost(UnitKind::Ipsp), nth as f64) {
            return None;
        }
        let synapses: Vec<Position> = player
            .neuron_positions(Some(UnitKind::Synapse))
            .into_iter()
            .filter(|pos| player.neuron(*pos).is_some_and(|n| !n.is_blocked()))
            .collect();
        let ipsp_speed = player.potential_speed(PotentialKind::Ipsp);
        let eta = threat.eta_ms(ctx.now);
        let steps = threat.remaining_len();

        threat
            .remaining()
            .take(steps.saturating_sub(1))
            .enumerate()
            .find_map(|(k, cell)| {
                let epsp_at = eta.saturating_sub((steps - 1 - k) as TimeMs * threat.speed_ms());
                synapses
                    .iter()
                    .filter(|synapse| *synapse != cell)
                    .filter_map(|synapse| {
                        let path = ctx.field.graph().shortest_path(*synapse, *cell)?;
                        let travel = path.len().saturating_sub(1) as TimeMs * ipsp_speed;
                        (travel <= epsp_at).then_some((travel, *synapse))
                    })
                    .min()
                    .map(|(travel, synapse)| Intercept {
                        synapse,
                        meet: *cell,
                        launch_at: ctx.now + (epsp_at - travel),
                    })
            })
    }

    /// Up to `wanted` free cells next to `target` for defending activated
    /// neurons; cells handed out this tick are collected in `placed`
    fn defence_cells(
        &self,
        ctx: &DecisionContext,
        target: Position,
        wanted: usize,
        placed: &mut Vec<Position>,
    ) -> Vec<Position> {
        let room = self
            .config
            .max_activated_neurons
            .saturating_sub(ctx.count(UnitKind::ActivatedNeuron) + placed.len());
        let wanted = wanted.min(room);
        let mut cells = Vec::new();
        for cell in self.placement(ctx, UnitKind::ActivatedNeuron, target) {
            if cells.len() >= wanted {
                break;
            }
            if placed.contains(&cell) {
                continue;
            }
            let factor = (placed.len() + 1) as f64;
            if !ctx.player().economy().can_afford(unit_cost(UnitKind::ActivatedNeuron), factor) {
                break;
            }
            placed.push(cell);
            cells.push(cell);
        }
        cells
    }

    /// Requeue investments and research that could not be carried out
    pub fn feedback(&mut self, results: &[(Action, Result<()>)]) {
        for (action, result) in results.iter().rev() {
            let Err(err) = result else {
                continue;
            };
            debug!(player = %self.player, ?action, error = %err, "ai action failed");
            match action {
                Action::DistributeIron(kind) if matches!(err, DissonanceError::InsufficientResources(_)) => self.plan.retry_resource(*kind),
                Action::Research(kind) if !matches!(err, DissonanceError::TechnologyMaxed(_)) => {
                    self.plan.retry_technology(*kind)
                }
                _ => {}
            }
        }
    }
}

/// Carry out `actions` for `player`, in order
///
/// Failures do not stop the remaining actions. Cells of neurons built here
/// are added to `occupied`.
pub fn apply_actions(
    player: &mut Player,
    field: &Field,
    occupied: &mut AHashSet<Position>,
    actions: Vec<Action>,
    now: TimeMs,
) -> Vec<(Action, Result<()>)> {
    actions
        .into_iter()
        .map(|action| {
            let result = apply_action(player, field, occupied, &action, now);
            if let (Action::BuildNeuron { position, .. }, Ok(())) = (&action, &result) {
                occupied.insert(*position);
            }
            (action, result)
        })
        .collect()
}

fn apply_action(
    player: &mut Player,
    field: &Field,
    occupied: &AHashSet<Position>,
    action: &Action,
    now: TimeMs,
) -> Result<()> {
    match action {
        Action::BuildNeuron {
            kind,
            position,
            epsp_target,
        } => player.add_neuron(field, occupied, *position, *kind, *epsp_target, now),
        Action::DistributeIron(kind) => player.distribute_iron(*kind, now).map(|_| ()),
        Action::Research(kind) => player.add_technology(*kind).map(|_| ()),
        Action::SetTarget { synapse, kind, target } => player.set_target(field, *synapse, *kind, *target),
        Action::Launch {
            synapse,
            kind,
            count,
            launch_at,
        } => {
            for _ in 0..*count {
                player.add_potential_at(field, *synapse, *kind, now, *launch_at)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ConstantSequence, Interval, Signature};
    use crate::core::config::EconomyConfig;
    use crate::entity::MacroMode;
    use crate::field::{Grid, SpatialGraph};
    use crate::tactics::strategy::Lean;

    const A: Position = Position::new(5, 5);
    const B: Position = Position::new(5, 25);

    fn field() -> Field {
        let grid = Grid::new(12, 32);
        let graph = SpatialGraph::build(&grid, &[A, B]).unwrap();
        let slots = |c: Position| (0..6).map(|i| Position::new(c.row - 3, c.col - 3 + i)).collect::<Vec<_>>();
        Field::new(grid, graph, vec![A, B], vec![slots(A), slots(B)])
    }

    fn config() -> GameConfig {
        GameConfig {
            economy: EconomyConfig {
                iron_start: 10.0,
                oxygen_start: 100.0,
                resource_start: 100.0,
                resource_limit: 200.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn players(field: &Field, config: &GameConfig) -> Vec<Player> {
        let config = Arc::new(config.clone());
        vec![
            Player::new(PlayerId(0), config.clone(), field, vec![PlayerId(1)], MacroMode::Area, true).unwrap(),
            Player::new(PlayerId(1), config, field, vec![PlayerId(0)], MacroMode::Area, false).unwrap(),
        ]
    }

    fn feed(levels: &[f64], major: bool) -> Arc<AudioFeed> {
        let points = levels
            .iter()
            .enumerate()
            .map(|(i, level)| AudioTimePoint {
                offset_ms: i as TimeMs * 500,
                bpm: 120.0,
                level: *level,
                notes: Vec::new(),
                interval: 0,
            })
            .collect();
        let interval = Interval {
            id: 0,
            start_ms: 0,
            key_note: 0,
            major,
            signature: Signature::Unsigned,
            darkness: 1,
            notes_out_of_key: 0,
        };
        Arc::new(AudioFeed::new(points, vec![interval]).unwrap())
    }

    fn engine(config: &GameConfig, levels: &[f64]) -> TacticsEngine {
        TacticsEngine::new(PlayerId(0), config, feed(levels, true), Box::new(ConstantSequence(0)))
    }

    /// Run one tick for player 0 and apply the result
    fn step(engine: &mut TacticsEngine, players: &mut [Player], field: &Field, now: TimeMs) -> Vec<Action> {
        let mut occupied = crate::entity::occupied_cells(players);
        let actions = {
            let ctx = DecisionContext::new(players, PlayerId(0), field, &occupied, now).unwrap();
            engine.tick(&ctx)
        };
        let results = apply_actions(&mut players[0], field, &mut occupied, actions.clone(), now);
        engine.feedback(&results);
        actions
    }

    #[test]
    fn test_setup_votes_opening_interval() {
        let engine = engine(&config(), &[1.0]);
        assert_eq!(engine.strategies().lean(), Lean::Attack);
        assert_eq!(engine.plan().next_resource(), Some(ResourceKind::Potassium));
    }

    #[test]
    fn test_rising_level_builds_synapse() {
        let config = config();
        let field = field();
        let mut ps = players(&field, &config);
        let mut engine = engine(&config, &[1.0, 1.0, 3.0]);
        step(&mut engine, &mut ps, &field, 0);
        step(&mut engine, &mut ps, &field, 500);
        assert!(!engine.in_burst());
        let actions = step(&mut engine, &mut ps, &field, 1000);
        assert!(engine.in_burst());
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::BuildNeuron { kind: UnitKind::Synapse, epsp_target: Some(t), .. } if *t == B)));
        assert_eq!(ps[0].neuron_positions(Some(UnitKind::Synapse)).len(), 1);
    }

    #[test]
    fn test_burst_end_launches_attack() {
        let config = config();
        let field = field();
        let mut ps = players(&field, &config);
        let mut engine = engine(&config, &[1.0, 1.0, 3.0, 0.5]);
        for now in [0, 500, 1000] {
            step(&mut engine, &mut ps, &field, now);
        }
        let actions = step(&mut engine, &mut ps, &field, 1500);
        let launched: u32 = actions
            .iter()
            .filter_map(|a| match a {
                Action::Launch {
                    kind: UnitKind::Epsp,
                    count,
                    ..
                } => Some(*count),
                _ => None,
            })
            .sum();
        assert!(launched >= config.tactics.min_epsps);
        assert!(launched <= config.tactics.max_epsps);
        assert!(ps[0].potentials().any(|p| p.kind == PotentialKind::Epsp));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::BuildNeuron { kind: UnitKind::ActivatedNeuron, .. })));
    }

    #[test]
    fn test_economy_queue_invests_iron() {
        let config = config();
        let field = field();
        let mut ps = players(&field, &config);
        let mut engine = engine(&config, &[1.0]);
        let actions = step(&mut engine, &mut ps, &field, 0);
        assert!(actions.contains(&Action::DistributeIron(ResourceKind::Potassium)));
        assert_eq!(ps[0].economy().get(ResourceKind::Potassium).distributed_iron(), 1);
    }

    #[test]
    fn test_failed_research_is_retried() {
        let config = config();
        let mut engine = engine(&config, &[1.0]);
        let before = engine.plan().next_technology();
        let tech = engine.plan.pop_technology().unwrap();
        engine.feedback(&[(
            Action::Research(tech),
            Err(DissonanceError::InsufficientResources("Dopamine: 5.0".into())),
        )]);
        assert_eq!(engine.plan().next_technology(), before);
    }

    #[test]
    fn test_incoming_epsp_is_answered_once() {
        let config = config();
        let field = field();
        let mut ps = players(&field, &config);
        ps[0].add_neuron(&field, &AHashSet::new(), Position::new(5, 8), UnitKind::Synapse, Some(B), 0)
            .unwrap();
        let epsp = ps[1].spawn_potential(PotentialKind::Epsp, field.get_way(Position::new(5, 20), &[A]), 0);
        let mut engine = engine(&config, &[1.0, 1.0, 1.0]);
        let actions = step(&mut engine, &mut ps, &field, 0);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Launch { kind: UnitKind::Ipsp, .. })));
        assert!(ps[0].potentials().any(|p| p.kind == PotentialKind::Ipsp));
        let again = step(&mut engine, &mut ps, &field, 500);
        assert!(!again
            .iter()
            .any(|a| matches!(a, Action::Launch { kind: UnitKind::Ipsp, .. })));
        assert_eq!(engine.answered.len(), 1);

        // gone epsps are forgotten
        ps[1].take_potential(epsp).unwrap();
        step(&mut engine, &mut ps, &field, 1000);
        assert!(engine.answered.is_empty());
    }

    fn ipsps_launched(actions: &[Action]) -> u32 {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Launch {
                    kind: UnitKind::Ipsp,
                    count,
                    ..
                } => Some(*count),
                _ => None,
            })
            .sum()
    }

    #[test]
    fn test_intercept_meets_epsp_ahead_of_its_position() {
        let config = config();
        let field = field();
        let mut ps = players(&field, &config);
        let synapse = Position::new(5, 8);
        ps[0].add_neuron(&field, &AHashSet::new(), synapse, UnitKind::Synapse, Some(B), 0)
            .unwrap();
        let start = Position::new(5, 20);
        ps[1].spawn_potential(PotentialKind::Epsp, field.get_way(start, &[A]), 0);
        let mut engine = engine(&config, &[1.0]);
        let actions = step(&mut engine, &mut ps, &field, 0);

        let meet = actions.iter().find_map(|a| match a {
            Action::SetTarget {
                kind: UnitKind::Ipsp,
                target,
                ..
            } => Some(*target),
            _ => None,
        });
        let meet = meet.unwrap();
        assert_ne!(meet, start);
        assert_ne!(meet, A);
        let epsp = ps[1].potentials().next().unwrap();
        assert!(epsp.remaining().any(|cell| *cell == meet));

        // the ipsp is held back so both reach the cell together
        let launch_at = actions.iter().find_map(|a| match a {
            Action::Launch {
                kind: UnitKind::Ipsp,
                launch_at,
                ..
            } => Some(*launch_at),
            _ => None,
        });
        let ipsp_steps = field.graph().shortest_path(synapse, meet).unwrap().len() as TimeMs - 1;
        let epsp_steps = epsp.remaining().position(|cell| *cell == meet).unwrap() as TimeMs + 1;
        let arrival = launch_at.unwrap() + ipsp_steps * config.units.ipsp_speed_ms;
        assert!(arrival >= (epsp_steps - 1) * config.units.epsp_speed_ms);
        assert!(arrival <= epsp_steps * config.units.epsp_speed_ms);
    }

    #[test]
    fn test_outnumbered_defender_gets_ipsp_support() {
        let config = config();
        let field = field();
        let mut ps = players(&field, &config);
        ps[0].add_neuron(&field, &AHashSet::new(), Position::new(5, 8), UnitKind::Synapse, Some(B), 0)
            .unwrap();
        ps[0].add_neuron(&field, &AHashSet::new(), Position::new(6, 8), UnitKind::ActivatedNeuron, None, 0)
            .unwrap();
        for _ in 0..8 {
            ps[1].spawn_potential(PotentialKind::Epsp, field.get_way(Position::new(5, 20), &[A]), 0);
        }
        let mut engine = engine(&config, &[1.0, 1.0]);
        let actions = step(&mut engine, &mut ps, &field, 0);

        // one epsp is left to the activated neuron
        assert_eq!(ipsps_launched(&actions), 7);
        assert_eq!(ps[0].potentials().filter(|p| p.kind == PotentialKind::Ipsp).count(), 7);
        assert_eq!(engine.answered.len(), 7);

        let again = step(&mut engine, &mut ps, &field, 500);
        assert_eq!(ipsps_launched(&again), 0);
    }

    #[test]
    fn test_deficit_without_synapse_builds_defenders() {
        let config = config();
        let field = field();
        let mut ps = players(&field, &config);
        ps[0].add_neuron(&field, &AHashSet::new(), Position::new(6, 8), UnitKind::ActivatedNeuron, None, 0)
            .unwrap();
        for _ in 0..3 {
            ps[1].spawn_potential(PotentialKind::Epsp, field.get_way(Position::new(5, 20), &[A]), 0);
        }
        let mut engine = engine(&config, &[1.0]);
        let actions = step(&mut engine, &mut ps, &field, 0);

        let cells: Vec<Position> = actions
            .iter()
            .filter_map(|a| match a {
                Action::BuildNeuron {
                    kind: UnitKind::ActivatedNeuron,
                    position,
                    ..
                } => Some(*position),
                _ => None,
            })
            .collect();
        assert_eq!(cells.len(), 2);
        assert_ne!(cells[0], cells[1]);
        assert_eq!(ps[0].neuron_positions(Some(UnitKind::ActivatedNeuron)).len(), 3);
        assert!(engine.answered.is_empty());
    }

    #[test]
    fn test_lost_player_does_nothing() {
        let config = config();
        let field = field();
        let mut ps = players(&field, &config);
        ps[0].resign();
        let mut engine = engine(&config, &[1.0, 5.0]);
        assert!(step(&mut engine, &mut ps, &field, 0).is_empty());
    }
}
