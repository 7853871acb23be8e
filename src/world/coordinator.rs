//! World state coordinator: owns the player registry and applies events one at a time

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::util::time::unix_millis;
use crate::ws::protocol::{ChatMessage, ClientEvent, ServerMsg};

use super::model::{
    truncate_chars, ConnectionId, Player, PlayerRegistry, WorldParams, MAX_CHAT_CHARS,
    MAX_NAME_CHARS,
};
use super::movement::step_toward;
use super::outbox::{ConnectionOutbox, Outbox, Payload};

const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Commands fed to the coordinator by connection tasks
#[derive(Debug)]
pub enum WorldCommand {
    /// Carries the queue the connection's writer drains
    Connect {
        conn_id: ConnectionId,
        outgoing: mpsc::Sender<Payload>,
    },
    Event {
        conn_id: ConnectionId,
        event: ClientEvent,
    },
    Disconnect {
        conn_id: ConnectionId,
    },
}

/// Coordinator is gone; the server is shutting down
#[derive(Debug, thiserror::Error)]
#[error("World coordinator is not running")]
pub struct WorldClosed;

/// Player registry plus the rules that mutate it.
///
/// Every handler runs to completion, including its emits, before the next one
/// starts. Malformed or stale input is dropped without a reply.
pub struct World<O: Outbox> {
    params: WorldParams,
    default_name: String,
    players: PlayerRegistry,
    rng: ChaCha8Rng,
    outbox: O,
}

impl<O: Outbox> World<O> {
    pub fn new(params: WorldParams, default_name: impl Into<String>, seed: u64, outbox: O) -> Self {
        Self {
            params,
            default_name: default_name.into(),
            players: PlayerRegistry::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            outbox,
        }
    }

    pub fn params(&self) -> &WorldParams {
        &self.params
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn outbox_mut(&mut self) -> &mut O {
        &mut self.outbox
    }

    pub fn handle_connect(&mut self, conn_id: ConnectionId) {
        let player = Player::spawn(conn_id, &self.params, &self.default_name, &mut self.rng);
        self.players.insert(conn_id, player.clone());

        info!(
            conn_id = %conn_id,
            x = player.x,
            y = player.y,
            player_count = self.players.len(),
            "Player joined world"
        );

        self.outbox.emit_to(
            conn_id,
            ServerMsg::Init {
                id: conn_id,
                players: self.players.clone(),
                world: self.params,
            },
        );
        self.outbox.emit_others(conn_id, ServerMsg::PlayerJoin(player));
    }

    pub fn handle_event(&mut self, conn_id: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::UpdateName(name) => self.update_name(conn_id, &name),
            ClientEvent::MoveTo { x, y } => self.move_to(conn_id, x, y),
            ClientEvent::Chat(text) => self.chat(conn_id, &text),
        }
    }

    pub fn handle_disconnect(&mut self, conn_id: ConnectionId) {
        self.players.remove(&conn_id);
        self.outbox.emit_others(conn_id, ServerMsg::PlayerLeave(conn_id));

        info!(
            conn_id = %conn_id,
            player_count = self.players.len(),
            "Player left world"
        );
    }

    fn update_name(&mut self, conn_id: ConnectionId, name: &str) {
        let Some(player) = self.players.get_mut(&conn_id) else {
            debug!(conn_id = %conn_id, "Name update for unknown player");
            return;
        };

        player.name = truncate_chars(name, MAX_NAME_CHARS);
        self.outbox.emit_all(ServerMsg::PlayerUpdate(player.clone()));
    }

    fn move_to(&mut self, conn_id: ConnectionId, x: f64, y: f64) {
        let Some(player) = self.players.get_mut(&conn_id) else {
            debug!(conn_id = %conn_id, "Move for unknown player");
            return;
        };

        let Some((nx, ny)) = step_toward(&self.params, (player.x, player.y), (x, y)) else {
            return;
        };

        player.x = nx;
        player.y = ny;
        self.outbox.emit_all(ServerMsg::PlayerUpdate(player.clone()));
    }

    fn chat(&mut self, conn_id: ConnectionId, text: &str) {
        let Some(player) = self.players.get(&conn_id) else {
            debug!(conn_id = %conn_id, "Chat from unknown player");
            return;
        };

        let text = truncate_chars(text, MAX_CHAT_CHARS);
        if text.trim().is_empty() {
            return;
        }

        let msg = ServerMsg::Chat(ChatMessage {
            id: conn_id,
            name: player.name.clone(),
            text,
            timestamp: unix_millis(),
        });
        self.outbox.emit_all(msg);
    }
}

/// Cloneable handle used by connections to reach the coordinator task
#[derive(Clone)]
pub struct WorldHandle {
    command_tx: mpsc::Sender<WorldCommand>,
    outgoing_capacity: usize,
    player_count: Arc<AtomicUsize>,
}

impl WorldHandle {
    /// Join the world. The returned queue yields `init` first, then every
    /// message addressed to this connection; it closes if the connection
    /// falls too far behind.
    pub async fn connect(&self, conn_id: ConnectionId) -> Result<mpsc::Receiver<Payload>, WorldClosed> {
        let (outgoing, incoming) = mpsc::channel(self.outgoing_capacity);
        self.send(WorldCommand::Connect { conn_id, outgoing }).await?;
        Ok(incoming)
    }

    pub async fn send_event(&self, conn_id: ConnectionId, event: ClientEvent) -> Result<(), WorldClosed> {
        self.send(WorldCommand::Event { conn_id, event }).await
    }

    pub async fn disconnect(&self, conn_id: ConnectionId) -> Result<(), WorldClosed> {
        self.send(WorldCommand::Disconnect { conn_id }).await
    }

    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    async fn send(&self, command: WorldCommand) -> Result<(), WorldClosed> {
        self.command_tx.send(command).await.map_err(|_| WorldClosed)
    }
}

/// The single task that owns the world
pub struct WorldCoordinator {
    world: World<ConnectionOutbox>,
    command_rx: mpsc::Receiver<WorldCommand>,
    player_count: Arc<AtomicUsize>,
}

impl WorldCoordinator {
    pub fn new(
        params: WorldParams,
        default_name: impl Into<String>,
        outgoing_capacity: usize,
    ) -> (Self, WorldHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = WorldHandle {
            command_tx,
            outgoing_capacity,
            player_count: player_count.clone(),
        };

        let coordinator = Self {
            world: World::new(params, default_name, rand::random::<u64>(), ConnectionOutbox::new()),
            command_rx,
            player_count,
        };

        (coordinator, handle)
    }

    /// Drain commands until every handle is dropped
    pub async fn run(mut self) {
        info!(
            width = self.world.params().width,
            height = self.world.params().height,
            speed = self.world.params().speed,
            "World coordinator started"
        );

        while let Some(command) = self.command_rx.recv().await {
            self.apply(command);
            self.player_count
                .store(self.world.player_count(), Ordering::Relaxed);
        }

        info!("World coordinator stopped");
    }

    fn apply(&mut self, command: WorldCommand) {
        match command {
            WorldCommand::Connect { conn_id, outgoing } => {
                // Attached only now, so nothing reaches the queue before init
                self.world.outbox_mut().attach(conn_id, outgoing);
                self.world.handle_connect(conn_id);
            }
            WorldCommand::Event { conn_id, event } => self.world.handle_event(conn_id, event),
            WorldCommand::Disconnect { conn_id } => {
                self.world.outbox_mut().detach(conn_id);
                self.world.handle_disconnect(conn_id);
            }
        }
    }
}
