//! Headless runner: the full match on a virtual clock
//!
//! Steps the match one pass interval at a time and lets every AI decide once
//! per beat, without tasks or wall time. Used by the binary and by the
//! end-to-end tests.

use std::sync::Arc;
use tracing::info;

use crate::audio::{AudioFeed, SeededSequence};
use crate::core::config::GameConfig;
use crate::core::error::{DissonanceError, Result};
use crate::core::types::TimeMs;
use crate::simulation::dispatch::CommandTable;
use crate::simulation::match_state::MatchState;
use crate::simulation::messages::{GameEndReport, Message, Outbound};
use crate::simulation::roster::GameMode;
use crate::tactics::TacticsEngine;

pub struct HeadlessRunner {
    state: MatchState,
    engines: Vec<TacticsEngine>,
    table: CommandTable,
    outbox: Vec<Outbound>,
}

impl HeadlessRunner {
    /// AI-only match of `players` seats, reproducible from `seed`
    pub fn new(config: Arc<GameConfig>, feed: Arc<AudioFeed>, seed: u64, players: usize) -> Result<Self> {
        let mut state = MatchState::new(config, feed)
            .with_sequence(Box::new(SeededSequence::new(seed)))
            .with_seed(seed);
        let outbox = state.request_new_game(GameMode::Observer, players)?;
        if !state.is_running() {
            let attempts = outbox.iter().find_map(|o| match o {
                Outbound::MapUnplayable { attempts } => Some(*attempts),
                _ => None,
            });
            return Err(match attempts {
                Some(attempts) => DissonanceError::MapUnplayable { attempts },
                None => DissonanceError::InvalidState(format!("match is {}", state.status())),
            });
        }
        let mut runner = Self::from_state(state);
        runner.outbox = outbox;
        Ok(runner)
    }

    /// Drive an already prepared match; AI engines are created if it runs
    pub fn from_state(state: MatchState) -> Self {
        let engines = if state.is_running() {
            state.ai_engines()
        } else {
            Vec::new()
        };
        Self {
            state,
            engines,
            table: CommandTable::new(),
            outbox: Vec::new(),
        }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }

    /// Dispatch a command as if it arrived on the bus
    pub fn send(&mut self, message: &Message) -> Vec<Outbound> {
        let was_running = self.state.is_running();
        let out = self.table.dispatch(&mut self.state, message);
        if !was_running && self.state.is_running() {
            self.engines = self.state.ai_engines();
        }
        out
    }

    /// Everything emitted so far, oldest first
    pub fn take_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// Advance simulated time by up to `duration_ms`; does nothing while paused
    pub fn step(&mut self, duration_ms: TimeMs) {
        let until = self.state.now() + duration_ms;
        while self.state.is_running() && !self.state.is_paused() && self.state.now() < until {
            let dt = self.state.pass_interval_ms().min(until - self.state.now()).max(1);
            let beat = self.state.beat();
            let out = self.state.advance(dt);
            self.outbox.extend(out);
            if self.state.beat() != beat {
                for engine in self.engines.iter_mut() {
                    self.state.ai_tick(engine);
                }
                let out = self.state.check_end();
                self.outbox.extend(out);
            }
        }
    }

    /// Play until one player is left or `duration_ms` of simulated time passed
    pub fn run(&mut self, duration_ms: TimeMs) -> Result<GameEndReport> {
        let remaining = duration_ms.saturating_sub(self.state.now());
        self.step(remaining);
        let out = self.state.close();
        self.outbox.extend(out);
        let report = self
            .state
            .report()
            .cloned()
            .ok_or_else(|| DissonanceError::InvalidState(format!("match is {}", self.state.status())))?;
        info!(
            winner = ?report.winner,
            duration_ms = report.duration_ms,
            beats = report.beats,
            "headless match finished"
        );
        Ok(report)
    }
}
