//! Real-time match session on tokio
//!
//! One task advances the match (movement passes, beats, broadcasts) at the
//! current pass interval and one task per AI player ticks on the beat. All of
//! them and every inbound command take the same coarse lock over the match
//! state; the lock is never held across an await.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::core::error::{DissonanceError, Result};
use crate::core::types::TimeMs;
use crate::simulation::dispatch::CommandTable;
use crate::simulation::match_state::{MatchState, MatchStatus};
use crate::simulation::messages::{Message, Outbound};
use crate::tactics::TacticsEngine;

/// Lock the match state, recovering from a panicked holder
fn lock(state: &Mutex<MatchState>) -> MutexGuard<'_, MatchState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!("match state lock poisoned, continuing with last state");
            poisoned.into_inner()
        }
    }
}

fn publish(outbound: &UnboundedSender<Outbound>, messages: Vec<Outbound>) {
    for message in messages {
        if outbound.send(message).is_err() {
            debug!("outbound bus closed, dropping message");
            return;
        }
    }
}

pub struct Session {
    state: Arc<Mutex<MatchState>>,
    table: Arc<CommandTable>,
    outbound: UnboundedSender<Outbound>,
    runtime: Handle,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Must be created inside a tokio runtime
    pub fn new(state: MatchState, outbound: UnboundedSender<Outbound>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| DissonanceError::InvalidState(format!("no tokio runtime: {}", e)))?;
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            table: Arc::new(CommandTable::new()),
            outbound,
            runtime,
            tasks: Vec::new(),
        })
    }

    pub fn state(&self) -> Arc<Mutex<MatchState>> {
        self.state.clone()
    }

    pub fn status(&self) -> MatchStatus {
        lock(&self.state).status()
    }

    /// Dispatch one inbound message; starts the loops once the match runs
    pub fn handle(&mut self, message: &Message) {
        let (out, engines) = {
            let mut state = lock(&self.state);
            let was_running = state.is_running();
            let out = self.table.dispatch(&mut state, message);
            let engines = (!was_running && state.is_running()).then(|| state.ai_engines());
            (out, engines)
        };
        publish(&self.outbound, out);
        if let Some(engines) = engines {
            self.start(engines);
        }
    }

    /// Parse and dispatch a raw JSON message
    pub fn handle_raw(&mut self, raw: &str) {
        match Message::parse(raw) {
            Ok(message) => self.handle(&message),
            Err(e) => {
                debug!("undecodable message: {}", e);
                publish(&self.outbound, vec![Outbound::error(None, &e)]);
            }
        }
    }

    fn start(&mut self, engines: Vec<TacticsEngine>) {
        info!(ai_players = engines.len(), "starting match loops");
        let state = self.state.clone();
        let outbound = self.outbound.clone();
        self.tasks
            .push(self.runtime.spawn(run_match_loop(state, outbound)));
        for engine in engines {
            let state = self.state.clone();
            self.tasks.push(self.runtime.spawn(run_ai_loop(state, engine)));
        }
    }

    /// Wait until every loop has stopped (the match closed)
    pub async fn wait(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("match task ended abnormally: {}", e);
            }
        }
    }

    /// Stop the loops, end the match if still running and drop its state
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        let out = {
            let mut state = lock(&self.state);
            let out = state.close();
            state.teardown();
            out
        };
        publish(&self.outbound, out);
    }
}

async fn run_match_loop(state: Arc<Mutex<MatchState>>, outbound: UnboundedSender<Outbound>) {
    let mut period = lock(&state).pass_interval_ms();
    let mut ticker = tokio::time::interval(Duration::from_millis(period));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    loop {
        ticker.tick().await;
        let elapsed = last.elapsed().as_millis() as TimeMs;
        last += Duration::from_millis(elapsed);

        let (out, running, interval) = {
            let mut state = lock(&state);
            let out = state.advance(elapsed);
            (out, state.is_running(), state.pass_interval_ms())
        };
        publish(&outbound, out);
        if !running {
            break;
        }
        // follow the tempo
        if interval != period {
            period = interval;
            ticker = tokio::time::interval_at(
                Instant::now() + Duration::from_millis(period),
                Duration::from_millis(period),
            );
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }
    }
    debug!("match loop stopped");
}

async fn run_ai_loop(state: Arc<Mutex<MatchState>>, mut engine: TacticsEngine) {
    let player = engine.player();
    loop {
        let (running, delay) = {
            let mut state = lock(&state);
            state.ai_tick(&mut engine);
            (state.is_running(), state.beat_ms())
        };
        if !running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    debug!(%player, "ai loop stopped");
}
