//! WebSocket protocol message definitions
//! These are the wire types for client-server communication
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::world::{ConnectionId, Player, WorldParams};

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMsg {
    /// First message on a connection: own id, every player, world bounds
    #[serde(rename = "init")]
    Init {
        id: ConnectionId,
        players: HashMap<ConnectionId, Player>,
        world: WorldParams,
    },

    /// Another player connected
    #[serde(rename = "player:join")]
    PlayerJoin(Player),

    /// A player moved or renamed
    #[serde(rename = "player:update")]
    PlayerUpdate(Player),

    #[serde(rename = "chat:message")]
    Chat(ChatMessage),

    /// A player disconnected; carries only the id
    #[serde(rename = "player:leave")]
    PlayerLeave(ConnectionId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: ConnectionId,
    pub name: String,
    pub text: String,
    /// Unix milliseconds
    #[serde(rename = "ts")]
    pub timestamp: u64,
}

/// Raw inbound frame before validation
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Validated client event. Anything that fails validation never gets this far.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    UpdateName(String),
    MoveTo { x: f64, y: f64 },
    Chat(String),
}

impl ClientEvent {
    /// Parse a text frame. `Ok(None)` means well-formed JSON carrying an
    /// unknown event or a payload that must be ignored.
    pub fn parse(text: &str) -> Result<Option<Self>, serde_json::Error> {
        let frame: ClientFrame = serde_json::from_str(text)?;
        Ok(Self::from_frame(frame))
    }

    pub fn from_frame(frame: ClientFrame) -> Option<Self> {
        match frame.event.as_str() {
            "player:updateName" => match frame.data {
                Value::String(name) => Some(Self::UpdateName(name)),
                _ => None,
            },
            "player:moveTo" => {
                let x = frame.data.get("x")?.as_f64()?;
                let y = frame.data.get("y")?.as_f64()?;
                Some(Self::MoveTo { x, y })
            }
            "chat:message" => Some(Self::Chat(coerce_chat_text(&frame.data))),
            _ => None,
        }
    }
}

/// Stringify an arbitrary chat payload; falsy values become empty
pub fn coerce_chat_text(value: &Value) -> String {
    if is_falsy(value) {
        String::new()
    } else {
        display_value(value)
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => display_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => display_value(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

// Number-to-string the way JavaScript prints it: integral floats lose the
// fraction (42.0 -> "42") and very large or small magnitudes use an exponent
// with an explicit sign (1e21 -> "1e+21", 1e-7 -> "1e-7").
fn display_number(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    let Some(f) = n.as_f64() else {
        return n.to_string();
    };
    if f != 0.0 && (f.abs() >= 1e21 || f.abs() < 1e-6) {
        let formatted = format!("{:e}", f);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if exp.starts_with('-') => format!("{}e{}", mantissa, exp),
            Some((mantissa, exp)) => format!("{}e+{}", mantissa, exp),
            None => formatted,
        };
    }
    f.to_string()
}
