//! Lobby: which seats exist, who controls them and who has joined

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::core::error::{DissonanceError, Result};
use crate::core::types::PlayerId;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// One human against AI players
    Single,
    /// Humans only; the match starts once every seat has joined
    Multi,
    /// AI players only
    Observer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub player: PlayerId,
    pub ai: bool,
    pub joined: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub mode: GameMode,
    pub seats: Vec<Seat>,
    pub missing: usize,
}

#[derive(Debug, Clone)]
pub struct Roster {
    mode: GameMode,
    seats: Vec<Seat>,
}

impl Roster {
    pub fn new(mode: GameMode, players: usize) -> Result<Self> {
        if players < 2 {
            return Err(DissonanceError::InvalidState(format!(
                "a match needs at least 2 players, got {}",
                players
            )));
        }
        let seats = (0..players)
            .map(|i| {
                let ai = match mode {
                    GameMode::Single => i != 0,
                    GameMode::Multi => false,
                    GameMode::Observer => true,
                };
                // AI seats and the requesting player are present from the start
                Seat {
                    player: PlayerId(i),
                    ai,
                    joined: ai || i == 0,
                }
            })
            .collect();
        Ok(Self { mode, seats })
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn is_ai(&self, player: PlayerId) -> bool {
        self.seats.get(player.0).map_or(false, |s| s.ai)
    }

    /// Take the seat of `player`; returns whether the lobby is now complete
    pub fn join(&mut self, player: PlayerId) -> Result<bool> {
        let seat = self
            .seats
            .get_mut(player.0)
            .ok_or(DissonanceError::UnknownPlayer(player))?;
        if seat.ai {
            return Err(DissonanceError::InvalidState(format!("{} is an AI seat", player)));
        }
        if seat.joined {
            return Err(DissonanceError::InvalidState(format!("{} already joined", player)));
        }
        seat.joined = true;
        Ok(self.is_complete())
    }

    pub fn missing(&self) -> usize {
        self.seats.iter().filter(|s| !s.joined).count()
    }

    pub fn is_complete(&self) -> bool {
        self.missing() == 0
    }

    pub fn snapshot(&self) -> LobbySnapshot {
        LobbySnapshot {
            mode: self.mode,
            seats: self.seats.clone(),
            missing: self.missing(),
        }
    }
}
