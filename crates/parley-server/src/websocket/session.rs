//! WebSocket session lifecycle — handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use parley_core::ConnectionId;

use crate::metrics::{
    HEARTBEAT_TIMEOUTS_TOTAL, WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE,
    WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::protocol::{self, OutboundEvent};

use super::connection::ClientConnection;
use super::handler::{DispatchContext, dispatch};
use super::heartbeat::{HeartbeatResult, run_heartbeat};

/// Capacity of the per-connection outbound channel.
const SEND_QUEUE_CAPACITY: usize = 1024;

/// Run a WebSocket session for a connected client.
///
/// 1. Sends a `CONNECTION_ESTABLISHED` event with the connection ID
/// 2. Dispatches incoming text (and UTF-8 binary) frames
/// 3. Forwards outbound events/responses via the send channel
/// 4. Sends periodic Ping frames and disconnects unresponsive clients
/// 5. Cleans up registry and session membership on disconnect
#[instrument(skip_all, fields(conn_id = %conn_id, room = %room))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: ConnectionId,
    room: String,
    ctx: Arc<DispatchContext>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(SEND_QUEUE_CAPACITY);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), room.clone(), send_tx));

    let connection_start = Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    ctx.registry.add_connection(Arc::clone(&connection));

    // Acknowledge the upgrade before anything else.
    let established = OutboundEvent::new(
        protocol::CONNECTION_ESTABLISHED,
        serde_json::json!({
            "connectionId": conn_id,
            "room": room,
            "status": "connected",
        }),
    );
    if let Ok(json) = serde_json::to_string(&established) {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }

    let ping_interval = Duration::from_secs(ctx.config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(ctx.config.heartbeat_timeout_secs);

    // Outbound forwarder with periodic Ping frames.
    let outbound = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Liveness watcher; the inbound loop exits when it fires.
    let hb_cancel = CancellationToken::new();
    let mut heartbeat = tokio::spawn(run_heartbeat(
        Arc::clone(&connection),
        ping_interval,
        pong_timeout,
        hb_cancel.clone(),
    ));

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else { break };

                // Accept text and UTF-8 binary frames alike.
                let text = match msg {
                    Message::Text(ref t) => Some(t.to_string()),
                    Message::Binary(ref data) => match std::str::from_utf8(data) {
                        Ok(s) => Some(s.to_owned()),
                        Err(_) => {
                            info!(len = data.len(), "received non-UTF8 binary frame");
                            None
                        }
                    },
                    Message::Close(_) => {
                        info!("client sent close frame");
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => {
                        connection.mark_alive();
                        None
                    }
                };
                let Some(text) = text else { continue };
                connection.mark_alive();

                if let Some(envelope) = dispatch(&text, &connection, &ctx).await {
                    if !connection.send(Arc::new(envelope.to_json())) {
                        info!("failed to enqueue response (channel full or closed)");
                    }
                }
            }
            result = &mut heartbeat => {
                if matches!(result, Ok(HeartbeatResult::TimedOut)) {
                    counter!(HEARTBEAT_TIMEOUTS_TOTAL).increment(1);
                    warn!(timeout_secs = pong_timeout.as_secs(), "client unresponsive, disconnecting");
                }
                break;
            }
        }
    }

    // Clean up
    info!("client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection_start.elapsed().as_secs_f64());

    if let (Some(pid), Some(sid)) = (connection.participant_id(), connection.session_id()) {
        ctx.engine.directory.leave(&sid, &pid).await;
    }
    ctx.registry.remove_connection(&connection.id);
    hb_cancel.cancel();
    outbound.abort();
}

#[cfg(test)]
mod tests {
    // Session lifecycle needs a live WebSocket and is covered by the
    // integration tests. Unit tests here validate the ack shape.

    use crate::protocol::{self, OutboundEvent};

    #[test]
    fn established_event_has_required_fields() {
        let event = OutboundEvent::new(
            protocol::CONNECTION_ESTABLISHED,
            serde_json::json!({"connectionId": "c1", "room": "default", "status": "connected"}),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CONNECTION_ESTABLISHED");
        assert_eq!(json["data"]["connectionId"], "c1");
        assert_eq!(json["data"]["room"], "default");
        assert_eq!(json["data"]["status"], "connected");
        assert!(json["timestamp"].is_string());
    }
}
