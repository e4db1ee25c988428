//! Command dispatch
//!
//! A fixed table maps each command name to its handler. The table is built
//! once and shared read-only; handlers mutate exactly one player through the
//! match state and reply with outbound messages.

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::core::error::{DissonanceError, Result};
use crate::core::types::{Position, UnitKind};
use crate::economy::{format_missing, unit_cost};
use crate::simulation::match_state::MatchState;
use crate::simulation::messages::{
    BuildNeuronPayload, BuildPotentialPayload, Message, NewGamePayload, Outbound, PositionQuery,
    ResourcePayload, SynapsePayload, TargetPayload, TechnologyPayload, UnitPayload, WaypointPayload,
};

pub type Handler = fn(&mut MatchState, &Message) -> Result<Vec<Outbound>>;

pub struct CommandTable {
    handlers: AHashMap<&'static str, Handler>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    pub fn new() -> Self {
        let entries: [(&'static str, Handler); 17] = [
            ("request_new_game", request_new_game),
            ("join", join),
            ("distribute_iron", distribute_iron),
            ("remove_iron", remove_iron),
            ("add_technology", add_technology),
            ("check_build_neuron", check_build_neuron),
            ("build_neuron", build_neuron),
            ("check_build_potential", check_build_potential),
            ("build_potential", build_potential),
            ("get_positions", get_positions),
            ("toggle_swarm", toggle_swarm),
            ("set_waypoint", set_waypoint),
            ("set_target", set_target),
            ("pause_on", pause_on),
            ("pause_off", pause_off),
            ("resign", resign),
            ("kill", kill),
        ];
        Self {
            handlers: entries.into_iter().collect(),
        }
    }

    pub fn contains(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    pub fn commands(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Run the handler for `message`; failures become an error notice for the sender
    pub fn dispatch(&self, state: &mut MatchState, message: &Message) -> Vec<Outbound> {
        let result = match self.handlers.get(message.command.as_str()) {
            Some(handler) => handler(state, message),
            None => Err(DissonanceError::UnknownCommand(message.command.clone())),
        };
        match result {
            Ok(out) => out,
            Err(e) => {
                if e.is_recoverable() {
                    debug!(command = %message.command, player = ?message.player, "command rejected: {}", e);
                } else {
                    warn!(command = %message.command, player = ?message.player, "command failed: {}", e);
                }
                vec![Outbound::error(message.player, &e)]
            }
        }
    }
}

/// Reply with a pick-list when several options exist and none was chosen
fn pick_or<F>(
    message: &Message,
    unit: Option<UnitKind>,
    options: Vec<Position>,
    chosen: Option<Position>,
    commit: F,
) -> Result<Vec<Outbound>>
where
    F: FnOnce(Position) -> Result<Vec<Outbound>>,
{
    let player = message.sender()?;
    match (chosen, options.as_slice()) {
        (Some(pos), _) => commit(pos),
        (None, [only]) => commit(*only),
        (None, []) => Err(DissonanceError::NotFound("no valid option".into())),
        (None, _) => Ok(vec![Outbound::PickList {
            player,
            command: message.command.clone(),
            unit,
            options,
        }]),
    }
}

fn request_new_game(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let payload: NewGamePayload = message.payload()?;
    state.request_new_game(payload.mode, payload.players)
}

fn join(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    state.join(message.sender()?)
}

fn distribute_iron(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let id = message.sender()?;
    let payload: ResourcePayload = message.payload()?;
    let ctx = state.player_context(id)?;
    let effect = ctx.player.distribute_iron(payload.resource, ctx.now)?;
    Ok(vec![Outbound::info(
        Some(id),
        format!("iron invested in {} ({:?})", payload.resource, effect),
    )])
}

fn remove_iron(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let id = message.sender()?;
    let payload: ResourcePayload = message.payload()?;
    let ctx = state.player_context(id)?;
    let effect = ctx.player.remove_iron(payload.resource, ctx.now)?;
    Ok(vec![Outbound::info(
        Some(id),
        format!("iron removed from {} ({:?})", payload.resource, effect),
    )])
}

fn add_technology(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let id = message.sender()?;
    let payload: TechnologyPayload = message.payload()?;
    let ctx = state.player_context(id)?;
    let level = ctx.player.add_technology(payload.technology)?;
    Ok(vec![Outbound::info(
        Some(id),
        format!("{} researched to level {}", payload.technology, level),
    )])
}

fn check_build_neuron(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let id = message.sender()?;
    let payload: UnitPayload = message.payload()?;
    let ctx = state.player_context(id)?;
    let options = ctx.player.check_build_neuron(&ctx.field, &ctx.occupied, payload.unit)?;
    Ok(vec![Outbound::PickList {
        player: id,
        command: "build_neuron".into(),
        unit: Some(payload.unit),
        options,
    }])
}

fn build_neuron(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let id = message.sender()?;
    let payload: BuildNeuronPayload = message.payload()?;
    let ctx = state.player_context(id)?;
    let options = match payload.position {
        Some(_) => Vec::new(),
        None => ctx.player.check_build_neuron(&ctx.field, &ctx.occupied, payload.unit)?,
    };
    let unit = payload.unit;
    pick_or(message, Some(unit), options, payload.position, |pos| {
        ctx.player
            .add_neuron(&ctx.field, &ctx.occupied, pos, unit, payload.epsp_target, ctx.now)?;
        Ok(vec![Outbound::info(Some(id), format!("{} built at {}", unit, pos))])
    })
}

/// Synapses able to launch `unit` right now
fn launch_options(state: &mut MatchState, message: &Message, unit: UnitKind) -> Result<Vec<Position>> {
    if !unit.is_potential() {
        return Err(DissonanceError::InvalidTarget(format!("{} is not a potential", unit)));
    }
    let ctx = state.player_context(message.sender()?)?;
    let player = &*ctx.player;
    let missing = player.economy().missing_resources(unit_cost(unit), 1.0);
    if !missing.is_empty() {
        return Err(DissonanceError::InsufficientResources(format_missing(&missing)));
    }
    let synapses: Vec<Position> = player
        .neuron_positions(Some(UnitKind::Synapse))
        .into_iter()
        .filter(|pos| player.neuron(*pos).map_or(false, |n| !n.is_blocked()))
        .filter(|pos| player.synapse(*pos).map_or(false, |s| s.target(unit).is_some()))
        .collect();
    if synapses.is_empty() {
        return Err(DissonanceError::NotFound(format!("no synapse ready for {}", unit)));
    }
    Ok(synapses)
}

fn check_build_potential(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let id = message.sender()?;
    let payload: UnitPayload = message.payload()?;
    let options = launch_options(state, message, payload.unit)?;
    Ok(vec![Outbound::PickList {
        player: id,
        command: "build_potential".into(),
        unit: Some(payload.unit),
        options,
    }])
}

fn build_potential(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let id = message.sender()?;
    let payload: BuildPotentialPayload = message.payload()?;
    let unit = payload.unit;
    let options = match payload.synapse {
        Some(_) => Vec::new(),
        None => launch_options(state, message, unit)?,
    };
    pick_or(message, Some(unit), options, payload.synapse, |synapse| {
        let ctx = state.player_context(id)?;
        let requested = payload.count.max(1);
        let mut paid = 0;
        let mut launched = 0;
        for _ in 0..requested {
            match ctx.player.add_potential(&ctx.field, synapse, unit, ctx.now) {
                Ok(ids) => {
                    paid += 1;
                    launched += ids.len();
                }
                // what was paid for stays launched
                Err(DissonanceError::InsufficientResources(missing)) if paid > 0 => {
                    debug!(player = %id, %unit, %synapse, paid, requested, "launch cut short");
                    return Ok(vec![Outbound::info(
                        Some(id),
                        format!(
                            "{} of {} {} paid at {}, {} launched; missing {}",
                            paid, requested, unit, synapse, launched, missing
                        ),
                    )]);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(vec![Outbound::info(
            Some(id),
            format!("{} {} launched from {}", launched, unit, synapse),
        )])
    })
}

fn get_positions(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let id = message.sender()?;
    let query: PositionQuery = message.payload()?;
    let unit = match &query {
        PositionQuery::Player { unit } | PositionQuery::Enemy { unit } => *unit,
        PositionQuery::CurrentTarget { unit, .. } => Some(*unit),
        _ => None,
    };
    let options = state.positions(id, &query)?;
    Ok(vec![Outbound::PickList {
        player: id,
        command: message.command.clone(),
        unit,
        options,
    }])
}

fn toggle_swarm(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let id = message.sender()?;
    let payload: SynapsePayload = message.payload()?;
    let ctx = state.player_context(id)?;
    let (swarm, released) = ctx.player.toggle_swarm(&ctx.field, payload.synapse, ctx.now)?;
    let text = if swarm {
        format!("swarm on at {}", payload.synapse)
    } else {
        format!("swarm off at {}, {} epsps released", payload.synapse, released.len())
    };
    Ok(vec![Outbound::info(Some(id), text)])
}

fn set_waypoint(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let id = message.sender()?;
    let payload: WaypointPayload = message.payload()?;
    let ctx = state.player_context(id)?;
    let count = ctx.player.set_waypoint(&ctx.field, payload.synapse, payload.position)?;
    Ok(vec![Outbound::info(
        Some(id),
        format!("way-point {} set to {}", count, payload.position),
    )])
}

fn set_target(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let id = message.sender()?;
    let payload: TargetPayload = message.payload()?;
    let ctx = state.player_context(id)?;
    ctx.player
        .set_target(&ctx.field, payload.synapse, payload.unit, payload.position)?;
    Ok(vec![Outbound::info(
        Some(id),
        format!("{} target set to {}", payload.unit, payload.position),
    )])
}

fn pause_on(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let id = message.sender()?;
    let changed = state.set_paused(true)?;
    Ok(if changed {
        vec![Outbound::info(None, format!("paused by {}", id))]
    } else {
        Vec::new()
    })
}

fn pause_off(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    let id = message.sender()?;
    let changed = state.set_paused(false)?;
    Ok(if changed {
        vec![Outbound::info(None, format!("resumed by {}", id))]
    } else {
        Vec::new()
    })
}

fn resign(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    state.resign(message.sender()?)
}

fn kill(state: &mut MatchState, message: &Message) -> Result<Vec<Outbound>> {
    state.kill(message.sender()?)
}
