use thiserror::Error;

use crate::core::types::{PlayerId, Position};

#[derive(Error, Debug)]
pub enum DissonanceError {
    #[error("Not enough resources: missing {0}")]
    InsufficientResources(String),

    #[error("Invalid position {0}: {1}")]
    InvalidPosition(Position, String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Technology {0} already at max level")]
    TechnologyMaxed(String),

    #[error("Map unplayable after {attempts} attempts")]
    MapUnplayable { attempts: u32 },

    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl DissonanceError {
    /// Recoverable game-rule errors are reported to the requesting player;
    /// everything else ends the request (or the match) in the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientResources(_)
                | Self::InvalidPosition(..)
                | Self::InvalidTarget(_)
                | Self::NotFound(_)
                | Self::TechnologyMaxed(_)
                | Self::UnknownCommand(_)
                | Self::InvalidPayload(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DissonanceError>;
