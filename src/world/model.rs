//! World and player records shared with the wire protocol

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to a WebSocket connection for its whole lifetime
pub type ConnectionId = Uuid;

/// Authoritative map of connection id to player
pub type PlayerRegistry = HashMap<ConnectionId, Player>;

pub const MAX_NAME_CHARS: usize = 20;
pub const MAX_CHAT_CHARS: usize = 200;

/// Name every player starts with until they pick one
pub const DEFAULT_PLAYER_NAME: &str = "שחקן";

/// Fixed world bounds and the per-event movement limit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldParams {
    pub width: f64,
    pub height: f64,
    /// Maximum distance a player advances per move event
    pub speed: f64,
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            width: 2000.0,
            height: 2000.0,
            speed: 4.0,
        }
    }
}

/// Per-connection avatar state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: ConnectionId,
    pub x: f64,
    pub y: f64,
    pub name: String,
    /// CSS color string, fixed at spawn
    pub color: String,
}

impl Player {
    /// Spawn a player at a random integer position with a random hue
    pub fn spawn<R: Rng>(id: ConnectionId, world: &WorldParams, name: &str, rng: &mut R) -> Self {
        let x = (rng.gen::<f64>() * world.width).floor();
        let y = (rng.gen::<f64>() * world.height).floor();
        let hue: u32 = rng.gen_range(0..360);

        Self {
            id,
            x,
            y,
            name: name.to_string(),
            color: format!("hsl({}, 80%, 60%)", hue),
        }
    }
}

/// Keep at most `max` characters (Unicode scalar values) of `s`
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => s[..cut].to_string(),
        None => s.to_string(),
    }
}
