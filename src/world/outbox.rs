//! Fan-out of server messages to connections

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

use crate::ws::protocol::ServerMsg;

use super::model::ConnectionId;

/// Serialized frame queued for one connection's writer
pub type Payload = Arc<str>;

/// Which connections a message is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    AllExcept(ConnectionId),
    Only(ConnectionId),
}

impl Audience {
    pub fn includes(&self, conn_id: ConnectionId) -> bool {
        match *self {
            Audience::All => true,
            Audience::AllExcept(excluded) => excluded != conn_id,
            Audience::Only(target) => target == conn_id,
        }
    }
}

/// Sink the world emits through. Event logic never knows the transport.
pub trait Outbox {
    fn deliver(&mut self, audience: Audience, msg: ServerMsg);

    fn emit_to(&mut self, conn_id: ConnectionId, msg: ServerMsg) {
        self.deliver(Audience::Only(conn_id), msg);
    }

    fn emit_others(&mut self, sender: ConnectionId, msg: ServerMsg) {
        self.deliver(Audience::AllExcept(sender), msg);
    }

    fn emit_all(&mut self, msg: ServerMsg) {
        self.deliver(Audience::All, msg);
    }
}

/// One bounded queue per attached connection.
///
/// Messages are serialized once and pushed to every matching queue. A
/// connection whose queue is full is detached: its writer drains what is left,
/// sees the queue close and shuts the socket, so the client never keeps a
/// state with silently missing events.
#[derive(Default)]
pub struct ConnectionOutbox {
    connections: HashMap<ConnectionId, mpsc::Sender<Payload>>,
}

impl ConnectionOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, conn_id: ConnectionId, sender: mpsc::Sender<Payload>) {
        self.connections.insert(conn_id, sender);
    }

    pub fn detach(&mut self, conn_id: ConnectionId) {
        self.connections.remove(&conn_id);
    }

    pub fn is_attached(&self, conn_id: ConnectionId) -> bool {
        self.connections.contains_key(&conn_id)
    }
}

impl Outbox for ConnectionOutbox {
    fn deliver(&mut self, audience: Audience, msg: ServerMsg) {
        let payload: Payload = match serde_json::to_string(&msg) {
            Ok(json) => json.into(),
            Err(e) => {
                error!(error = %e, "Failed to serialize server message");
                return;
            }
        };

        let mut dropped = Vec::new();
        for (conn_id, sender) in &self.connections {
            if !audience.includes(*conn_id) {
                continue;
            }
            match sender.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(conn_id = %conn_id, "Outgoing queue full, dropping connection");
                    dropped.push(*conn_id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(conn_id = %conn_id, "Outgoing queue closed");
                    dropped.push(*conn_id);
                }
            }
        }

        for conn_id in dropped {
            self.connections.remove(&conn_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn audience_filters() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(Audience::All.includes(a));
        assert!(!Audience::AllExcept(a).includes(a));
        assert!(Audience::AllExcept(a).includes(b));
        assert!(Audience::Only(a).includes(a));
        assert!(!Audience::Only(a).includes(b));
    }

    #[test]
    fn payload_is_serialized_once_and_filtered() {
        let mut outbox = ConnectionOutbox::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        outbox.attach(a, tx_a);
        outbox.attach(b, tx_b);

        outbox.emit_others(a, ServerMsg::PlayerLeave(a));
        outbox.emit_all(ServerMsg::PlayerLeave(b));

        assert!(rx_b.try_recv().unwrap().contains("player:leave"));
        let to_a = rx_a.try_recv().unwrap();
        let to_b = rx_b.try_recv().unwrap();
        assert!(Arc::ptr_eq(&to_a, &to_b));
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn full_queue_detaches_instead_of_skipping() {
        let mut outbox = ConnectionOutbox::new();
        let (slow, fast) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_slow, mut rx_slow) = mpsc::channel(2);
        let (tx_fast, mut rx_fast) = mpsc::channel(64);
        outbox.attach(slow, tx_slow);
        outbox.attach(fast, tx_fast);

        for _ in 0..5 {
            outbox.emit_all(ServerMsg::PlayerLeave(Uuid::new_v4()));
        }

        assert!(!outbox.is_attached(slow));
        assert!(outbox.is_attached(fast));

        // The slow queue keeps what it had and then reports closed
        assert!(rx_slow.try_recv().is_ok());
        assert!(rx_slow.try_recv().is_ok());
        assert!(matches!(
            rx_slow.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));

        let mut received = 0;
        while rx_fast.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 5);
    }

    #[test]
    fn closed_receiver_is_detached() {
        let mut outbox = ConnectionOutbox::new();
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(4);
        outbox.attach(id, tx);
        drop(rx);

        outbox.emit_all(ServerMsg::PlayerLeave(id));
        assert!(!outbox.is_attached(id));
    }

    #[test]
    fn deliver_without_connections_does_not_panic() {
        let mut outbox = ConnectionOutbox::new();
        outbox.emit_all(ServerMsg::PlayerLeave(Uuid::new_v4()));
    }
}
