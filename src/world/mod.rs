//! Shared world: player registry, movement rules and fan-out

pub mod coordinator;
pub mod model;
pub mod movement;
pub mod outbox;

pub use coordinator::{WorldCoordinator, WorldHandle};
pub use model::{
    truncate_chars, ConnectionId, Player, WorldParams, DEFAULT_PLAYER_NAME, MAX_NAME_CHARS,
};
