//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::world::{WorldCoordinator, WorldHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub world: WorldHandle,
}

impl AppState {
    /// Build the state plus the coordinator task the caller must spawn
    pub fn new(config: Config) -> (Self, WorldCoordinator) {
        let config = Arc::new(config);

        let (coordinator, world) = WorldCoordinator::new(
            config.world,
            config.default_player_name.clone(),
            config.outbox_capacity,
        );

        (Self { config, world }, coordinator)
    }
}
