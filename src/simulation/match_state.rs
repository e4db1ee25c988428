//! Match state machine
//!
//! `WAITING → WAITING_FOR_PLAYERS → SETTING_UP → RUNNING → CLOSING → CLOSED`.
//! The state owns the field, every player and the simulated clock. Time
//! moves only through `advance`, which interleaves movement passes and beats
//! in timestamp order, so the same inputs always replay the same match.

use ahash::AHashSet;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audio::{beat_ms, AudioFeed, AudioSequence, FeatureCursor, FeatureSequence, SeededSequence};
use crate::core::config::GameConfig;
use crate::core::error::{DissonanceError, Result};
use crate::core::types::{MatchId, PlayerId, Position, TimeMs, UnitKind};
use crate::economy::unit_cost;
use crate::entity::{movement_pass, occupied_cells, MacroMode, Player};
use crate::field::{generate_field, Field, RangeFilter};
use crate::simulation::clock::MatchClock;
use crate::simulation::messages::{
    GameEndReport, Outbound, PlayerReport, PlayerUpdate, PositionQuery, PotentialView,
};
use crate::simulation::roster::{GameMode, Roster};
use crate::tactics::{apply_actions, DecisionContext, TacticsEngine};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    #[display(fmt = "WAITING")]
    Waiting,
    #[display(fmt = "WAITING_FOR_PLAYERS")]
    WaitingForPlayers,
    #[display(fmt = "SETTING_UP")]
    SettingUp,
    #[display(fmt = "RUNNING")]
    Running,
    #[display(fmt = "CLOSING")]
    Closing,
    #[display(fmt = "CLOSED")]
    Closed,
}

/// Mutable borrow of one player together with what its operations need
pub struct PlayerContext<'a> {
    pub player: &'a mut Player,
    pub field: Arc<Field>,
    pub occupied: AHashSet<Position>,
    pub now: TimeMs,
}

pub struct MatchState {
    id: MatchId,
    status: MatchStatus,
    config: Arc<GameConfig>,
    feed: Arc<AudioFeed>,
    sequence: Box<dyn FeatureSequence>,
    seed: u64,
    roster: Option<Roster>,
    field: Option<Arc<Field>>,
    players: Vec<Player>,
    clock: MatchClock,
    tempo: FeatureCursor,
    bpm: f64,
    beat: u64,
    next_beat_at: TimeMs,
    next_pass_at: TimeMs,
    passes: u64,
    report: Option<GameEndReport>,
}

impl MatchState {
    /// Terrain and macro modes are drawn from the track itself
    pub fn new(config: Arc<GameConfig>, feed: Arc<AudioFeed>) -> Self {
        let sequence = Box::new(AudioSequence::new(feed.clone()));
        Self {
            id: MatchId::new(),
            status: MatchStatus::Waiting,
            bpm: feed.average_bpm(),
            tempo: FeatureCursor::new(feed.clone()),
            config,
            feed,
            sequence,
            seed: 0,
            roster: None,
            field: None,
            players: Vec::new(),
            clock: MatchClock::new(),
            beat: 0,
            next_beat_at: 0,
            next_pass_at: 0,
            passes: 0,
            report: None,
        }
    }

    /// Replace the generator used for terrain and macro modes
    pub fn with_sequence(mut self, sequence: Box<dyn FeatureSequence>) -> Self {
        self.sequence = sequence;
        self
    }

    /// Seed of the AI players' own generators
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == MatchStatus::Running
    }

    pub fn config(&self) -> &Arc<GameConfig> {
        &self.config
    }

    pub fn roster(&self) -> Option<&Roster> {
        self.roster.as_ref()
    }

    pub fn field(&self) -> Option<&Arc<Field>> {
        self.field.as_ref()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player> {
        self.players.get(id.0).ok_or(DissonanceError::UnknownPlayer(id))
    }

    pub fn clock(&self) -> &MatchClock {
        &self.clock
    }

    pub fn now(&self) -> TimeMs {
        self.clock.now()
    }

    pub fn beat(&self) -> u64 {
        self.beat
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn report(&self) -> Option<&GameEndReport> {
        self.report.as_ref()
    }

    pub fn beat_ms(&self) -> TimeMs {
        beat_ms(self.bpm)
    }

    /// Movement pass interval at the current tempo
    pub fn pass_interval_ms(&self) -> TimeMs {
        let timing = &self.config.timing;
        (self.beat_ms() / timing.movement_passes_per_beat as TimeMs).max(timing.min_pass_ms)
    }

    // ---- lobby ------------------------------------------------------------

    pub fn request_new_game(&mut self, mode: GameMode, players: usize) -> Result<Vec<Outbound>> {
        if self.status != MatchStatus::Waiting {
            return Err(DissonanceError::InvalidState(format!(
                "cannot start a new game while {}",
                self.status
            )));
        }
        let roster = Roster::new(mode, players)?;
        info!(match_id = %self.id, %mode, players, "new game requested");
        let mut out = vec![Outbound::Lobby(roster.snapshot())];
        let complete = roster.is_complete();
        self.roster = Some(roster);
        self.status = MatchStatus::WaitingForPlayers;
        if complete {
            out.extend(self.setup());
        }
        Ok(out)
    }

    pub fn join(&mut self, player: PlayerId) -> Result<Vec<Outbound>> {
        if self.status != MatchStatus::WaitingForPlayers {
            return Err(DissonanceError::InvalidState(format!("cannot join while {}", self.status)));
        }
        let roster = self
            .roster
            .as_mut()
            .ok_or_else(|| DissonanceError::InvalidState("no lobby open".into()))?;
        let complete = roster.join(player)?;
        info!(match_id = %self.id, %player, "player joined");
        let mut out = vec![Outbound::Lobby(roster.snapshot())];
        if complete {
            out.extend(self.setup());
        }
        Ok(out)
    }

    /// Generate the field and create every player
    ///
    /// An unplayable map closes the match; the notice goes to everyone.
    fn setup(&mut self) -> Vec<Outbound> {
        self.status = MatchStatus::SettingUp;
        let Some(roster) = self.roster.clone() else {
            return self.abort(DissonanceError::InvalidState("no lobby open".into()));
        };
        let count = roster.len();

        let field = match generate_field(&self.config.field, count, self.sequence.as_mut()) {
            Ok(field) => Arc::new(field),
            Err(e) => return self.abort(e),
        };

        let mut players = Vec::with_capacity(count);
        for seat in roster.seats() {
            let enemies = (0..count).filter(|i| *i != seat.player.0).map(PlayerId).collect();
            let macro_mode = if self.sequence.next_below(2) == 0 {
                MacroMode::Area
            } else {
                MacroMode::Teleport
            };
            match Player::new(seat.player, self.config.clone(), &field, enemies, macro_mode, seat.ai) {
                Ok(player) => players.push(player),
                Err(e) => return self.abort(e),
            }
        }

        let first = self.tempo.next_looping();
        self.bpm = first.bpm;
        self.beat = 0;
        self.next_beat_at = self.beat_ms();
        self.next_pass_at = self.pass_interval_ms();
        self.players = players;
        self.field = Some(field.clone());
        self.status = MatchStatus::Running;
        info!(
            match_id = %self.id,
            players = count,
            attempts = field.attempts(),
            bpm = self.bpm,
            "match running"
        );

        let mut out = vec![
            Outbound::FieldSnapshot(field.snapshot()),
            Outbound::info(None, format!("match {} started", self.id)),
        ];
        out.extend(self.state_updates());
        out
    }

    fn abort(&mut self, err: DissonanceError) -> Vec<Outbound> {
        warn!(match_id = %self.id, "setup aborted: {}", err);
        self.status = MatchStatus::Closed;
        let mut out = Vec::new();
        if let DissonanceError::MapUnplayable { attempts } = err {
            out.push(Outbound::MapUnplayable { attempts });
        }
        out.push(Outbound::error(None, &err));
        out
    }

    // ---- running ----------------------------------------------------------

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(DissonanceError::InvalidState(format!("match is {}", self.status)))
        }
    }

    /// Pause or resume; returns whether the flag changed
    pub fn set_paused(&mut self, paused: bool) -> Result<bool> {
        self.ensure_running()?;
        let changed = if paused { self.clock.pause() } else { self.clock.resume() };
        if changed {
            info!(match_id = %self.id, paused, at = self.clock.now(), "pause toggled");
        }
        Ok(changed)
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    /// Borrow a player still in the match for a command
    pub fn player_context(&mut self, id: PlayerId) -> Result<PlayerContext<'_>> {
        self.ensure_running()?;
        let field = self
            .field
            .clone()
            .ok_or_else(|| DissonanceError::InvalidState("field not generated".into()))?;
        let occupied = occupied_cells(&self.players);
        let now = self.clock.now();
        let player = self
            .players
            .get_mut(id.0)
            .ok_or(DissonanceError::UnknownPlayer(id))?;
        if player.has_lost() {
            return Err(DissonanceError::InvalidState(format!("{} is out of the match", id)));
        }
        Ok(PlayerContext {
            player,
            field,
            occupied,
            now,
        })
    }

    /// Feed `dt_ms` of wall time and run every pass and beat that fell due
    pub fn advance(&mut self, dt_ms: TimeMs) -> Vec<Outbound> {
        let until = self.clock.advance(dt_ms);
        let mut out = Vec::new();
        if !self.is_running() || self.clock.is_paused() {
            return out;
        }
        while self.is_running() {
            let pass_due = self.next_pass_at <= until;
            let beat_due = self.next_beat_at <= until;
            if pass_due && (!beat_due || self.next_pass_at <= self.next_beat_at) {
                let at = self.next_pass_at;
                out.extend(self.run_pass(at));
            } else if beat_due {
                let at = self.next_beat_at;
                out.extend(self.run_beat(at));
            } else {
                break;
            }
            out.extend(self.check_end());
        }
        out
    }

    fn run_pass(&mut self, now: TimeMs) -> Vec<Outbound> {
        self.passes += 1;
        self.next_pass_at = now + self.pass_interval_ms();
        let Some(field) = self.field.clone() else {
            return Vec::new();
        };
        let run_defence = self.passes % self.config.timing.defence_every as u64 == 0;
        let report = movement_pass(&mut self.players, &field, &self.config, now, run_defence);
        for lost in report.destroyed.iter().filter(|d| d.kind == UnitKind::Nucleus) {
            info!(owner = %lost.owner, position = %lost.position, "nucleus lost");
        }
        if report.swallows > 0 || report.neutralised > 0 {
            debug!(swallows = report.swallows, neutralised = report.neutralised, now, "pass resolved");
        }
        report.scouted.into_iter().map(Outbound::Scouted).collect()
    }

    fn run_beat(&mut self, now: TimeMs) -> Vec<Outbound> {
        self.beat += 1;
        let point = self.tempo.next_looping();
        self.bpm = point.bpm;
        self.next_beat_at = now + self.beat_ms();
        // humans earn iron on every other beat
        let odd = self.beat % 2 == 1;
        for player in self.players.iter_mut().filter(|p| !p.has_lost()) {
            let eligible = player.ai || odd;
            player.increase_resources(eligible);
            player.sample_stats(self.beat, now);
        }
        self.state_updates()
    }

    /// Let one AI player decide and act; returns the number of applied actions
    pub fn ai_tick(&mut self, engine: &mut TacticsEngine) -> usize {
        if !self.is_running() || self.clock.is_paused() {
            return 0;
        }
        let Some(field) = self.field.clone() else {
            return 0;
        };
        let id = engine.player();
        let now = self.clock.now();
        let mut occupied = occupied_cells(&self.players);
        let actions = match DecisionContext::new(&self.players, id, &field, &occupied, now) {
            Some(ctx) => engine.tick(&ctx),
            None => return 0,
        };
        if actions.is_empty() {
            return 0;
        }
        let Some(player) = self.players.get_mut(id.0) else {
            return 0;
        };
        let results = apply_actions(player, &field, &mut occupied, actions, now);
        for (action, result) in &results {
            if let Err(e) = result {
                debug!(player = %id, ?action, "ai action failed: {}", e);
            }
        }
        engine.feedback(&results);
        results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    /// One engine per AI seat, each with its own cursor and generator
    pub fn ai_engines(&self) -> Vec<TacticsEngine> {
        self.players
            .iter()
            .filter(|p| p.ai)
            .map(|p| {
                let sequence = Box::new(SeededSequence::new(self.seed.wrapping_add(p.id.0 as u64)));
                TacticsEngine::new(p.id, &self.config, self.feed.clone(), sequence)
            })
            .collect()
    }

    // ---- leaving ----------------------------------------------------------

    pub fn resign(&mut self, player: PlayerId) -> Result<Vec<Outbound>> {
        self.leave(player, "resigned")
    }

    /// Transport fault: the player loses at once, the match goes on
    pub fn kill(&mut self, player: PlayerId) -> Result<Vec<Outbound>> {
        warn!(match_id = %self.id, %player, "connection lost");
        self.leave(player, "disconnected")
    }

    fn leave(&mut self, id: PlayerId, reason: &str) -> Result<Vec<Outbound>> {
        self.ensure_running()?;
        let player = self
            .players
            .get_mut(id.0)
            .ok_or(DissonanceError::UnknownPlayer(id))?;
        player.resign();
        let mut out = vec![Outbound::info(None, format!("{} {}", id, reason))];
        out.extend(self.check_end());
        Ok(out)
    }

    /// End the match once at most one player is left
    pub fn check_end(&mut self) -> Vec<Outbound> {
        if !self.is_running() {
            return Vec::new();
        }
        let mut alive = self.players.iter().filter(|p| !p.has_lost());
        let first = alive.next().map(|p| p.id);
        if alive.next().is_some() {
            return Vec::new();
        }
        self.finish(first)
    }

    /// End a running match without a winner (time limit)
    pub fn close(&mut self) -> Vec<Outbound> {
        if !self.is_running() {
            return Vec::new();
        }
        self.finish(None)
    }

    fn finish(&mut self, winner: Option<PlayerId>) -> Vec<Outbound> {
        self.status = MatchStatus::Closing;
        let report = GameEndReport {
            winner,
            duration_ms: self.clock.now(),
            beats: self.beat,
            players: self
                .players
                .iter()
                .map(|p| PlayerReport {
                    player: p.id,
                    ai: p.ai,
                    lost: p.has_lost(),
                    resigned: p.has_resigned(),
                    stats: p.stats().clone(),
                    resources: p.economy().summary(),
                    technologies: p.technologies().summary(),
                })
                .collect(),
        };
        info!(
            match_id = %self.id,
            winner = ?winner,
            duration_ms = report.duration_ms,
            beats = report.beats,
            "match over"
        );
        self.report = Some(report.clone());
        self.status = MatchStatus::Closed;
        vec![Outbound::GameEnd(report)]
    }

    /// Drop the field and every player once the match is closed
    pub fn teardown(&mut self) {
        if self.status == MatchStatus::Closed {
            self.field = None;
            self.players.clear();
        }
    }

    // ---- views ------------------------------------------------------------

    fn state_updates(&self) -> Vec<Outbound> {
        self.players
            .iter()
            .map(|p| Outbound::StateUpdate(self.player_update(p)))
            .collect()
    }

    pub fn player_update(&self, player: &Player) -> PlayerUpdate {
        let synapses: Vec<Position> = player
            .neuron_positions(Some(UnitKind::Synapse))
            .into_iter()
            .filter(|pos| player.neuron(*pos).map_or(false, |n| !n.is_blocked()))
            .collect();
        let economy = player.economy();
        let buildable = UnitKind::NEURONS
            .iter()
            .chain(UnitKind::POTENTIALS.iter())
            .copied()
            .filter(|kind| *kind != UnitKind::ResourceNeuron)
            .filter(|kind| kind.is_neuron() || !synapses.is_empty())
            .filter(|kind| economy.can_afford(unit_cost(*kind), 1.0))
            .collect();
        let potentials = self
            .players
            .iter()
            .flat_map(|p| p.potentials())
            .map(|p| PotentialView {
                id: p.id,
                owner: p.owner,
                kind: p.kind,
                position: p.position,
                magnitude: p.magnitude(),
            })
            .collect();
        let nucleus_voltage = player
            .nuclei()
            .iter()
            .filter_map(|pos| player.neuron(*pos))
            .map(|n| n.voltage())
            .sum();
        PlayerUpdate {
            player: player.id,
            beat: self.beat,
            time_ms: self.clock.now(),
            resources: economy.summary(),
            buildable,
            synapses,
            potentials,
            nucleus_voltage,
            neurons: player.neuron_count(),
            lost: player.has_lost(),
        }
    }

    /// Cells matching `query`, as seen by `id`
    pub fn positions(&self, id: PlayerId, query: &PositionQuery) -> Result<Vec<Position>> {
        self.ensure_running()?;
        let field = self
            .field
            .as_ref()
            .ok_or_else(|| DissonanceError::InvalidState("field not generated".into()))?;
        let player = self.player(id)?;
        let mut cells = match query {
            PositionQuery::Player { unit } => player.neuron_positions(*unit),
            PositionQuery::Enemy { unit } => player
                .enemies()
                .iter()
                .filter_map(|e| self.players.get(e.0))
                .flat_map(|enemy| {
                    let mut known = enemy.nuclei();
                    known.extend(player.scouted_cells(enemy.id));
                    known
                        .into_iter()
                        .filter(|pos| {
                            enemy
                                .neuron(*pos)
                                .map_or(false, |n| unit.map_or(true, |k| n.unit_kind() == k))
                        })
                        .collect::<Vec<_>>()
                })
                .collect(),
            PositionQuery::Center { center, range } => {
                let occupied = occupied_cells(&self.players);
                field.sorted_in_range(*center, *range, 0.0, RangeFilter::Free(&occupied))
            }
            PositionQuery::CurrentTarget { synapse, unit } => {
                let state = player
                    .synapse(*synapse)
                    .ok_or_else(|| DissonanceError::NotFound(format!("synapse at {}", synapse)))?;
                state.target(*unit).into_iter().collect()
            }
            PositionQuery::CurrentWaypoints { synapse } => player
                .synapse(*synapse)
                .ok_or_else(|| DissonanceError::NotFound(format!("synapse at {}", synapse)))?
                .waypoints
                .clone(),
        };
        if !matches!(query, PositionQuery::CurrentWaypoints { .. }) {
            cells.sort();
            cells.dedup();
        }
        Ok(cells)
    }
}
