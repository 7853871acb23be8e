//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::world::WorldParams;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS ("*" for any)
    pub client_origin: String,
    /// Directory served for every path not claimed by a route
    pub static_dir: String,

    /// World bounds and per-event speed limit
    pub world: WorldParams,
    /// Name given to freshly connected players
    pub default_player_name: String,

    /// Max inbound frames per second per connection (0 disables limiting)
    pub input_rate_limit: u32,
    /// Capacity of each connection's outgoing queue
    pub outbox_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        };

        let world = WorldParams {
            width: parse_positive("WORLD_WIDTH", 2000.0)?,
            height: parse_positive("WORLD_HEIGHT", 2000.0)?,
            speed: parse_positive("WORLD_SPEED", 4.0)?,
        };

        let default_player_name = env::var("DEFAULT_PLAYER_NAME")
            .map(|name| crate::world::truncate_chars(&name, crate::world::MAX_NAME_CHARS))
            .unwrap_or_else(|_| crate::world::DEFAULT_PLAYER_NAME.to_string());

        let outbox_capacity: usize = parse_or("OUTBOX_CAPACITY", 1024)?;
        if outbox_capacity == 0 {
            return Err(ConfigError::Invalid("OUTBOX_CAPACITY"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "public".to_string()),

            world,
            default_player_name,

            input_rate_limit: parse_or("INPUT_RATE_LIMIT", 0)?,
            outbox_capacity,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            log_level: "info".to_string(),
            client_origin: "*".to_string(),
            static_dir: "public".to_string(),
            world: WorldParams::default(),
            default_player_name: crate::world::DEFAULT_PLAYER_NAME.to_string(),
            input_rate_limit: 0,
            outbox_capacity: 1024,
        }
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// World dimensions must be finite and strictly positive or clamping breaks down
fn parse_positive(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    let value: f64 = parse_or(key, default)?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Invalid(key))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
