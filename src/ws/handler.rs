//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::world::outbox::Payload;
use crate::world::{ConnectionId, WorldHandle};
use crate::ws::protocol::ClientEvent;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let conn_id = Uuid::new_v4();
    debug!(conn_id = %conn_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, conn_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, conn_id: ConnectionId, state: AppState) {
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    let outgoing = match state.world.connect(conn_id).await {
        Ok(outgoing) => outgoing,
        Err(e) => {
            error!(conn_id = %conn_id, error = %e, "World coordinator unavailable");
            return;
        }
    };

    run_session(
        conn_id,
        ws_sink,
        ws_stream,
        outgoing,
        &state.world,
        state.config.input_rate_limit,
    )
    .await;

    if state.world.disconnect(conn_id).await.is_err() {
        debug!(conn_id = %conn_id, "World coordinator gone before disconnect");
    }

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split.
/// Ends when either the client goes away or the outgoing queue is closed.
async fn run_session(
    conn_id: ConnectionId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    ws_stream: SplitStream<WebSocket>,
    mut outgoing: mpsc::Receiver<Payload>,
    world: &WorldHandle,
    input_rate_limit: u32,
) {
    // Writer task: this connection's queue -> WebSocket
    let mut writer_handle = tokio::spawn(async move {
        while let Some(payload) = outgoing.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(payload.to_string())).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                return;
            }
        }

        // Queue closed: the connection fell behind and must resync with a fresh init
        warn!(conn_id = %conn_id, "Outgoing queue closed, closing socket");
        let _ = ws_sink.send(Message::Close(None)).await;
    });

    tokio::select! {
        _ = read_frames(conn_id, ws_stream, world, input_rate_limit) => {}
        _ = &mut writer_handle => {
            debug!(conn_id = %conn_id, "Writer finished");
        }
    }

    writer_handle.abort();
}

/// Reader loop: WebSocket -> coordinator
async fn read_frames(
    conn_id: ConnectionId,
    mut ws_stream: SplitStream<WebSocket>,
    world: &WorldHandle,
    input_rate_limit: u32,
) {
    let rate_limiter = ConnectionRateLimiter::new(input_rate_limit);

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    debug!(conn_id = %conn_id, "Rate limited inbound frame");
                    continue;
                }

                match ClientEvent::parse(&text) {
                    Ok(Some(event)) => {
                        if world.send_event(conn_id, event).await.is_err() {
                            debug!(conn_id = %conn_id, "World coordinator gone");
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(conn_id = %conn_id, "Ignoring unknown or invalid event");
                    }
                    Err(e) => {
                        debug!(conn_id = %conn_id, error = %e, "Failed to parse client frame");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                debug!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}
