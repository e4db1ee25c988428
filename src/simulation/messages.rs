//! Message-bus contract
//!
//! Inbound messages carry a command name, the sending player and a
//! command-specific JSON payload. Outbound messages are adjacently tagged
//! (`{"type": ..., "payload": ...}`) so any transport can forward them as is.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::core::error::{DissonanceError, Result};
use crate::core::types::{PlayerId, Position, PotentialId, TechnologyKind, TimeMs, UnitKind};
use crate::economy::{ResourceKind, ResourceSummary};
use crate::entity::{PlayerStats, PotentialKind, ScoutReport, TechnologySummary};
use crate::field::FieldSnapshot;
use crate::simulation::roster::{GameMode, LobbySnapshot};

/// One inbound command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub command: String,
    #[serde(default)]
    pub player: Option<PlayerId>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Message {
    pub fn new(command: impl Into<String>, player: Option<PlayerId>, payload: serde_json::Value) -> Self {
        Self {
            command: command.into(),
            player,
            payload,
        }
    }

    /// A message without payload
    pub fn bare(command: impl Into<String>, player: PlayerId) -> Self {
        Self::new(command, Some(player), serde_json::Value::Null)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    pub fn sender(&self) -> Result<PlayerId> {
        self.player
            .ok_or_else(|| DissonanceError::InvalidState(format!("{} needs a player", self.command)))
    }
}

// ---- inbound payloads ------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGamePayload {
    pub mode: GameMode,
    #[serde(default = "default_players")]
    pub players: usize,
}

fn default_players() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePayload {
    pub resource: ResourceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnologyPayload {
    pub technology: TechnologyKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPayload {
    pub unit: UnitKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildNeuronPayload {
    pub unit: UnitKind,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub epsp_target: Option<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPotentialPayload {
    pub unit: UnitKind,
    #[serde(default)]
    pub synapse: Option<Position>,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynapsePayload {
    pub synapse: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaypointPayload {
    pub synapse: Position,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetPayload {
    pub synapse: Position,
    pub unit: UnitKind,
    pub position: Position,
}

/// Filtered cell lists for the client's pickers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum PositionQuery {
    /// Own neurons, optionally of one kind
    Player {
        #[serde(default)]
        unit: Option<UnitKind>,
    },
    /// Enemy neurons seen so far (nuclei are always known)
    Enemy {
        #[serde(default)]
        unit: Option<UnitKind>,
    },
    /// Free playable cells around a center
    Center { center: Position, range: f64 },
    CurrentTarget { synapse: Position, unit: UnitKind },
    CurrentWaypoints { synapse: Position },
}

// ---- outbound ----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialView {
    pub id: PotentialId,
    pub owner: PlayerId,
    pub kind: PotentialKind,
    pub position: Position,
    pub magnitude: u32,
}

/// Per-player state delta sent every beat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    pub player: PlayerId,
    pub beat: u64,
    pub time_ms: TimeMs,
    pub resources: Vec<ResourceSummary>,
    /// Neuron kinds currently affordable
    pub buildable: Vec<UnitKind>,
    /// Unblocked synapses able to launch
    pub synapses: Vec<Position>,
    /// Every potential on the field
    pub potentials: Vec<PotentialView>,
    /// Headline health: summed nucleus voltage
    pub nucleus_voltage: u32,
    pub neurons: usize,
    pub lost: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerReport {
    pub player: PlayerId,
    pub ai: bool,
    pub lost: bool,
    pub resigned: bool,
    pub stats: PlayerStats,
    pub resources: Vec<ResourceSummary>,
    pub technologies: Vec<TechnologySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEndReport {
    pub winner: Option<PlayerId>,
    pub duration_ms: TimeMs,
    pub beats: u64,
    pub players: Vec<PlayerReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Outbound {
    Info {
        player: Option<PlayerId>,
        message: String,
    },
    Error {
        player: Option<PlayerId>,
        message: String,
    },
    StateUpdate(PlayerUpdate),
    FieldSnapshot(FieldSnapshot),
    Lobby(LobbySnapshot),
    Scouted(ScoutReport),
    /// The client has to choose one of `options` and resend `command`
    PickList {
        player: PlayerId,
        command: String,
        unit: Option<UnitKind>,
        options: Vec<Position>,
    },
    MapUnplayable {
        attempts: u32,
    },
    GameEnd(GameEndReport),
}

impl Outbound {
    pub fn info(player: Option<PlayerId>, message: impl Into<String>) -> Self {
        Outbound::Info {
            player,
            message: message.into(),
        }
    }

    pub fn error(player: Option<PlayerId>, err: &DissonanceError) -> Self {
        Outbound::Error {
            player,
            message: err.to_string(),
        }
    }

    /// Player this message is addressed to; `None` means broadcast
    pub fn recipient(&self) -> Option<PlayerId> {
        match self {
            Outbound::Info { player, .. } | Outbound::Error { player, .. } => *player,
            Outbound::StateUpdate(update) => Some(update.player),
            Outbound::Scouted(report) => Some(report.observer),
            Outbound::PickList { player, .. } => Some(*player),
            Outbound::FieldSnapshot(_) | Outbound::Lobby(_) | Outbound::MapUnplayable { .. } | Outbound::GameEnd(_) => {
                None
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
