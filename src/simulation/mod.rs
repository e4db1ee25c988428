//! Simulation orchestrator - lobby, match state machine, command bus and loops

pub mod clock;
pub mod dispatch;
pub mod headless;
pub mod match_state;
pub mod messages;
pub mod roster;
pub mod session;

pub use clock::MatchClock;
pub use dispatch::{CommandTable, Handler};
pub use headless::HeadlessRunner;
pub use match_state::{MatchState, MatchStatus, PlayerContext};
pub use messages::{GameEndReport, Message, Outbound, PlayerReport, PlayerUpdate, PositionQuery};
pub use roster::{GameMode, LobbySnapshot, Roster, Seat};
pub use session::Session;
