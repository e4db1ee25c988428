pub mod config;
pub mod error;
pub mod types;

pub use config::GameConfig;
pub use error::{DissonanceError, Result};
pub use types::{MatchId, PlayerId, Position, PotentialId, TechnologyKind, TimeMs, UnitKind};
