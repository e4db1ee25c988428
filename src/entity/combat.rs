//! Cross-player resolution of one movement pass
//!
//! Order inside a pass: blocks expire, potentials move, ipsps swallow enemy
//! epsps on shared cells, arrivals are delivered, activated neurons fire,
//! scouting is evaluated. An ipsp that blocks a neuron stays parked on it
//! until the block ends. Every effect on a player goes through that
//! player's own setters.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::config::GameConfig;
use crate::core::types::{PlayerId, Position, PotentialId, TimeMs, UnitKind};
use crate::entity::player::{occupied_cells, MacroMode, NeuronHit, Player};
use crate::entity::potential::{Potential, PotentialKind};
use crate::field::Field;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyedNeuron {
    pub owner: PlayerId,
    pub position: Position,
    pub kind: UnitKind,
}

/// Enemy neurons newly revealed to `observer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoutReport {
    pub observer: PlayerId,
    pub enemy: PlayerId,
    pub neurons: Vec<(Position, UnitKind)>,
}

#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub destroyed: Vec<DestroyedNeuron>,
    pub swallows: u32,
    pub neutralised: u32,
    pub blocked: Vec<(PlayerId, Position)>,
    pub scouted: Vec<ScoutReport>,
}

/// Run one movement pass over all players
pub fn movement_pass(
    players: &mut [Player],
    field: &Field,
    config: &GameConfig,
    now: TimeMs,
    run_defence: bool,
) -> PassReport {
    let mut report = PassReport::default();

    for player in players.iter_mut() {
        player.refresh_blocks(now);
    }

    let arrivals: Vec<(usize, Vec<PotentialId>)> = players
        .iter_mut()
        .enumerate()
        .filter(|(_, p)| !p.has_lost())
        .map(|(i, p)| (i, p.move_potentials(field, now)))
        .collect();

    report.swallows = resolve_swallows(players);

    for (owner, ids) in arrivals {
        for id in ids {
            if let Some(potential) = players[owner].take_potential(id) {
                deliver(players, field, config, owner, potential, now, &mut report);
            }
        }
    }

    if run_defence {
        report.neutralised = handle_def(players, config, now);
    }

    report.scouted = scout(players);
    report
}

/// Enemies of `owner` that are still in the match
fn live_enemies(players: &[Player], owner: usize) -> Vec<usize> {
    players[owner]
        .enemies()
        .iter()
        .map(|id| id.0)
        .filter(|&j| j < players.len() && !players[j].has_lost())
        .collect()
}

/// Every ipsp sharing a cell with an enemy epsp takes one magnitude unit from
/// it. Each pair interacts at most once per pass.
pub fn resolve_swallows(players: &mut [Player]) -> u32 {
    let mut pairs = Vec::new();
    for (i, player) in players.iter().enumerate() {
        if player.has_lost() {
            continue;
        }
        for ipsp in player
            .potentials()
            .filter(|p| p.kind == PotentialKind::Ipsp && !p.is_parked())
        {
            for j in live_enemies(players, i) {
                for epsp in players[j]
                    .potentials()
                    .filter(|p| p.kind == PotentialKind::Epsp && p.position == ipsp.position)
                {
                    pairs.push((i, ipsp.id, j, epsp.id));
                }
            }
        }
    }

    let mut swallows = 0;
    for (i, ipsp, j, epsp) in pairs {
        let alive = players[j].potential(epsp).is_some_and(|p| p.magnitude() > 0);
        if !alive || players[i].potential(ipsp).is_none() {
            continue;
        }
        if let Some(neutralised) = players[j].drain_potential(epsp, 1) {
            players[i].boost_potential(ipsp, 1);
            players[i].record_swallow();
            if neutralised {
                players[i].record_kill(UnitKind::Epsp);
            }
            swallows += 1;
        }
    }
    swallows
}

fn record_hit(report: &mut PassReport, owner: PlayerId, hit: NeuronHit) {
    if let NeuronHit::Destroyed(removed) = hit {
        report
            .destroyed
            .extend(removed.into_iter().map(|(position, kind)| DestroyedNeuron { owner, position, kind }));
    }
}

/// Resolve a potential that reached its final cell
fn deliver(
    players: &mut [Player],
    field: &Field,
    config: &GameConfig,
    owner: usize,
    potential: Potential,
    now: TimeMs,
    report: &mut PassReport,
) {
    let cell = potential.position;
    let enemies = live_enemies(players, owner);
    match potential.kind {
        PotentialKind::Epsp => {
            if let Some(&j) = enemies.iter().find(|&&j| players[j].neuron(cell).is_some()) {
                let hit = players[j].add_potential_to_neuron(cell, potential.magnitude());
                debug!(attacker = %players[owner].id, target = %cell, ?hit, "epsp delivered");
                record_hit(report, PlayerId(j), hit);
            }
        }
        PotentialKind::Ipsp => {
            if let Some(&j) = enemies.iter().find(|&&j| players[j].neuron(cell).is_some()) {
                let until = now + potential.block_duration_ms;
                players[j].block_neuron(cell, until);
                report.blocked.push((PlayerId(j), cell));
                players[owner].park_potential(potential, until);
            }
        }
        PotentialKind::Macro => match players[owner].macro_mode() {
            MacroMode::Area => {
                let radius = config.units.macro_area_radius;
                for j in enemies {
                    let targets: Vec<Position> = players[j]
                        .neurons()
                        .filter(|n| n.position.distance(&cell) <= radius)
                        .map(|n| n.position)
                        .collect();
                    for pos in targets {
                        let hit = players[j].add_potential_to_neuron(pos, potential.magnitude());
                        record_hit(report, PlayerId(j), hit);
                    }
                }
            }
            MacroMode::Teleport => {
                let occupied = occupied_cells(players);
                players[owner].place_free_loophole(field, &occupied, cell, now);
            }
        },
    }
}

/// Activated neurons reduce the first enemy potential within the defence
/// radius by their own potential. Returns the number neutralised.
pub fn handle_def(players: &mut [Player], config: &GameConfig, now: TimeMs) -> u32 {
    let radius = config.units.defence_radius;
    let mut neutralised = 0;
    for i in 0..players.len() {
        if players[i].has_lost() {
            continue;
        }
        for (pos, power) in players[i].ready_defenders(now) {
            let target = live_enemies(players, i).into_iter().find_map(|j| {
                players[j]
                    .potentials_within(pos, radius)
                    .first()
                    .map(|&id| (j, id))
            });
            let Some((j, id)) = target else {
                continue;
            };
            let kind = players[j].potential(id).map(|p| p.kind.unit_kind());
            if let (Some(true), Some(kind)) = (players[j].drain_potential(id, power), kind) {
                players[i].record_kill(kind);
                neutralised += 1;
            }
            players[i].fire_defender(pos, now);
        }
    }
    neutralised
}

/// Newly visible enemy neurons for every observer
pub fn scout(players: &mut [Player]) -> Vec<ScoutReport> {
    let mut reports = Vec::new();
    for i in 0..players.len() {
        if players[i].has_lost() {
            continue;
        }
        for j in live_enemies(players, i) {
            let seen = players[i].visible_enemy_neurons(&players[j]);
            if seen.is_empty() {
                continue;
            }
            let fresh = players[i].mark_scouted(PlayerId(j), seen);
            if !fresh.is_empty() {
                reports.push(ScoutReport {
                    observer: PlayerId(i),
                    enemy: PlayerId(j),
                    neurons: fresh,
                });
            }
        }
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EconomyConfig;
    use crate::economy::ResourceKind;
    use crate::field::{Grid, SpatialGraph};
    use ahash::AHashSet;
    use std::sync::Arc;

    const A: Position = Position::new(5, 5);
    const B: Position = Position::new(5, 25);

    fn field() -> Field {
        let grid = Grid::new(12, 32);
        let graph = SpatialGraph::build(&grid, &[A, B]).unwrap();
        let slots = |c: Position| (0..6).map(|i| Position::new(c.row - 3, c.col - 3 + i)).collect::<Vec<_>>();
        Field::new(grid, graph, vec![A, B], vec![slots(A), slots(B)])
    }

    fn config() -> Arc<GameConfig> {
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

    fn players(field: &Field, modes: [MacroMode; 2]) -> Vec<Player> {
        let config = config();
        vec![
            Player::new(PlayerId(0), config.clone(), field, vec![PlayerId(1)], modes[0], false).unwrap(),
            Player::new(PlayerId(1), config, field, vec![PlayerId(0)], modes[1], false).unwrap(),
        ]
    }

    fn line(from: Position, to_col: i32) -> Vec<Position> {
        let step = if to_col >= from.col { 1 } else { -1 };
        let mut cells = vec![from];
        let mut col = from.col;
        while col != to_col {
            col += step;
            cells.push(Position::new(from.row, col));
        }
        cells
    }

    #[test]
    fn test_swallow_transfers_one_unit() {
        let field = field();
        let mut ps = players(&field, [MacroMode::Area; 2]);
        let cell = Position::new(8, 15);
        let ipsp = ps[0].spawn_potential(PotentialKind::Ipsp, line(cell, 20), 10_000);
        let epsp = ps[1].spawn_potential(PotentialKind::Epsp, line(cell, 10), 10_000);
        ps[1].boost_potential(epsp, 3);

        assert_eq!(resolve_swallows(&mut ps), 1);
        assert_eq!(ps[1].potential(epsp).unwrap().magnitude(), 4);
        assert_eq!(ps[0].potential(ipsp).unwrap().magnitude(), 3);
        assert_eq!(ps[0].stats().epsp_swallowed, 1);
    }

    #[test]
    fn test_swallow_neutralises_last_unit() {
        let field = field();
        let mut ps = players(&field, [MacroMode::Area; 2]);
        let cell = Position::new(8, 15);
        ps[0].spawn_potential(PotentialKind::Ipsp, line(cell, 20), 10_000);
        let epsp = ps[1].spawn_potential(PotentialKind::Epsp, line(cell, 10), 10_000);
        ps[1].drain_potential(epsp, 1);
        assert_eq!(resolve_swallows(&mut ps), 1);
        assert!(ps[1].potential(epsp).is_none());
        assert_eq!(ps[0].stats().potentials_killed[&UnitKind::Epsp], 1);
        assert_eq!(resolve_swallows(&mut ps), 0);
    }

    #[test]
    fn test_own_potentials_do_not_swallow() {
        let field = field();
        let mut ps = players(&field, [MacroMode::Area; 2]);
        let cell = Position::new(8, 15);
        ps[0].spawn_potential(PotentialKind::Ipsp, line(cell, 20), 10_000);
        ps[0].spawn_potential(PotentialKind::Epsp, line(cell, 10), 10_000);
        assert_eq!(resolve_swallows(&mut ps), 0);
    }

    #[test]
    fn test_epsp_arrival_damages_enemy() {
        let field = field();
        let mut ps = players(&field, [MacroMode::Area; 2]);
        let from = Position::new(5, 23);
        ps[0].spawn_potential(PotentialKind::Epsp, line(from, 25), 0);
        let cfg = config();
        movement_pass(&mut ps, &field, &cfg, 350, false);
        let report = movement_pass(&mut ps, &field, &cfg, 700, false);
        assert!(report.destroyed.is_empty());
        assert_eq!(ps[1].neuron(B).unwrap().voltage(), 7);
        assert_eq!(ps[0].potential_count(), 0);
    }

    #[test]
    fn test_epsp_destroys_nucleus() {
        let field = field();
        let mut ps = players(&field, [MacroMode::Area; 2]);
        let id = ps[0].spawn_potential(PotentialKind::Epsp, line(Position::new(5, 24), 25), 0);
        ps[0].boost_potential(id, 7);
        let report = movement_pass(&mut ps, &field, &config(), 350, false);
        assert_eq!(report.destroyed[0], DestroyedNeuron { owner: PlayerId(1), position: B, kind: UnitKind::Nucleus });
        assert!(ps[1].has_lost());
    }

    #[test]
    fn test_ipsp_blocks_target() {
        let field = field();
        let mut ps = players(&field, [MacroMode::Area; 2]);
        ps[1].distribute_iron(ResourceKind::Potassium, 0).unwrap();
        ps[1].distribute_iron(ResourceKind::Potassium, 0).unwrap();
        let slot = field.resource_slots(1)[1];
        ps[0].spawn_potential(PotentialKind::Ipsp, vec![Position::new(slot.row, slot.col - 1), slot], 0);
        let report = movement_pass(&mut ps, &field, &config(), 420, false);
        assert_eq!(report.blocked, vec![(PlayerId(1), slot)]);
        assert!(ps[1].neuron(slot).unwrap().is_blocked());
        assert!(ps[1].economy().get(ResourceKind::Potassium).is_blocked());
        assert_eq!(ps[0].potential_count(), 1);
        movement_pass(&mut ps, &field, &config(), 420 + 3000, false);
        assert!(!ps[1].neuron(slot).unwrap().is_blocked());
        assert_eq!(ps[0].potential_count(), 0);
    }

    #[test]
    fn test_macro_area_hits_neighbours() {
        let field = field();
        let mut ps = players(&field, [MacroMode::Area; 2]);
        ps[1].add_neuron(&field, &AHashSet::new(), Position::new(6, 24), UnitKind::ActivatedNeuron, None, 0)
            .unwrap();
        ps[0].spawn_potential(PotentialKind::Macro, line(Position::new(5, 23), 24), 0);
        movement_pass(&mut ps, &field, &config(), 600, false);
        assert_eq!(ps[1].neuron(B).unwrap().voltage(), 9 - 4);
        assert_eq!(ps[1].neuron(Position::new(6, 24)).unwrap().voltage(), 12 - 4);
    }

    #[test]
    fn test_macro_teleport_opens_loophole() {
        let field = field();
        let mut ps = players(&field, [MacroMode::Teleport, MacroMode::Area]);
        let cell = Position::new(9, 15);
        ps[0].spawn_potential(PotentialKind::Macro, line(Position::new(9, 14), 15), 0);
        movement_pass(&mut ps, &field, &config(), 600, false);
        assert_eq!(ps[0].neuron(cell).unwrap().unit_kind(), UnitKind::Loophole);
    }

    #[test]
    fn test_defence_neutralises_incoming() {
        let field = field();
        let mut ps = players(&field, [MacroMode::Area; 2]);
        ps[1].add_neuron(&field, &AHashSet::new(), Position::new(5, 22), UnitKind::ActivatedNeuron, None, 0)
            .unwrap();
        let id = ps[0].spawn_potential(PotentialKind::Epsp, line(Position::new(5, 20), 25), 100_000);
        let cfg = config();
        let neutralised = handle_def(&mut ps, &cfg, 1200);
        assert_eq!(neutralised, 1);
        assert!(ps[0].potential(id).is_none());
        assert_eq!(ps[1].stats().potentials_killed[&UnitKind::Epsp], 1);
        // cooldown
        ps[0].spawn_potential(PotentialKind::Epsp, line(Position::new(5, 20), 25), 100_000);
        assert_eq!(handle_def(&mut ps, &cfg, 1300), 0);
    }

    #[test]
    fn test_scout_reports_once() {
        let field = field();
        let mut ps = players(&field, [MacroMode::Area; 2]);
        ps[0].spawn_potential(PotentialKind::Epsp, line(Position::new(5, 21), 22), 100_000);
        let reports = scout(&mut ps);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].observer, PlayerId(0));
        assert_eq!(reports[0].neurons, vec![(B, UnitKind::Nucleus)]);
        assert!(scout(&mut ps).is_empty());
    }
}
