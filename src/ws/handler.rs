//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::store::MemoryRelay;
use crate::sync::transport::{Subscription, Transport};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{is_valid_path, ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Session id chosen by the client; a fresh one is assigned when absent
    pub session: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let session_id = query
        .session
        .filter(|s| is_valid_path(s) && !s.contains('/'))
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    info!(session_id = %session_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, session_id: String, state: AppState) {
    info!(session_id = %session_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        session_id: session_id.clone(),
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(session_id = %session_id, error = %e, "Failed to send welcome");
        return;
    }

    run_session(&session_id, &state, ws_sink, ws_stream).await;

    // Runs on every close, graceful or not
    let removed = state.relay.disconnect(&session_id);
    info!(session_id = %session_id, removed, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    session_id: &str,
    state: &AppState,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
) {
    let rate_limiter = ConnectionRateLimiter::new();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMsg>(state.config.tuning.sync.max_inbound_events.max(1));
    let mut forwarders: Vec<JoinHandle<()>> = Vec::new();

    // Spawn writer task: replies and subscribed changes -> WebSocket
    let writer_session = session_id.to_string();
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(session_id = %writer_session, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> relay
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(session_id = %session_id, "Rate limited relay message");
                    continue;
                }

                let reply = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Subscribe { prefix }) if is_valid_path(&prefix) => {
                        let subscription = state.relay.subscribe(&prefix);
                        forwarders.push(tokio::spawn(forward_changes(subscription, out_tx.clone())));
                        debug!(session_id = %session_id, prefix = %prefix, "Subscribed");
                        None
                    }
                    Ok(msg) => apply_client_msg(&state.relay, session_id, msg),
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                        Some(ServerMsg::error("bad_message", e.to_string()))
                    }
                };

                if let Some(reply) = reply {
                    if out_tx.send(reply).await.is_err() {
                        debug!(session_id = %session_id, "Writer closed");
                        break;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(session_id = %session_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(session_id = %session_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    for forwarder in forwarders {
        forwarder.abort();
    }
    writer_handle.abort();
}

/// Apply one non-subscription request to the relay, returning the reply if any
pub fn apply_client_msg(relay: &MemoryRelay, session_id: &str, msg: ClientMsg) -> Option<ServerMsg> {
    match msg {
        ClientMsg::Publish { key, value } => {
            if !is_valid_path(&key) {
                return Some(ServerMsg::error("invalid_key", key));
            }
            relay.publish(&key, value);
            None
        }
        ClientMsg::Remove { key } => {
            relay.remove(&key);
            None
        }
        ClientMsg::Subscribe { prefix } => Some(ServerMsg::error("invalid_prefix", prefix)),
        ClientMsg::Append { stream, value } => {
            if !is_valid_path(&stream) {
                return Some(ServerMsg::error("invalid_stream", stream));
            }
            let event_id = relay.append_event(&stream, value);
            Some(ServerMsg::Appended { stream, event_id })
        }
        ClientMsg::DeleteEvent { stream, event_id } => {
            relay.delete_event(&stream, &event_id);
            None
        }
        ClientMsg::OnDisconnect { key } => {
            if !is_valid_path(&key) {
                return Some(ServerMsg::error("invalid_key", key));
            }
            relay.on_disconnect(session_id, &key);
            None
        }
        ClientMsg::Ping { t } => Some(ServerMsg::Pong { t }),
    }
}

/// Pump one subscription into the connection's outbound queue
async fn forward_changes(mut subscription: Subscription, out_tx: mpsc::Sender<ServerMsg>) {
    let prefix = subscription.prefix().to_string();
    while let Some(change) = subscription.next().await {
        let msg = ServerMsg::Change {
            prefix: prefix.clone(),
            change,
        };
        if out_tx.send(msg).await.is_err() {
            break;
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_replies_with_event_id() {
        let relay = MemoryRelay::default();
        let reply = apply_client_msg(
            &relay,
            "s1",
            ClientMsg::Append {
                stream: "kills".into(),
                value: json!({ "killer_id": "a", "victim_id": "b", "timestamp": 1 }),
            },
        );
        let Some(ServerMsg::Appended { stream, event_id }) = reply else {
            panic!("expected appended reply");
        };
        assert_eq!(stream, "kills");
        assert!(relay.get(&format!("kills/{event_id}")).is_some());
    }

    #[test]
    fn disconnect_hooks_are_scoped_to_the_connection() {
        let relay = MemoryRelay::default();
        apply_client_msg(&relay, "s1", ClientMsg::Publish { key: "players/s1".into(), value: json!(1) });
        apply_client_msg(&relay, "s1", ClientMsg::OnDisconnect { key: "players/s1".into() });
        apply_client_msg(&relay, "s2", ClientMsg::Publish { key: "players/s2".into(), value: json!(2) });

        assert_eq!(relay.disconnect("s2"), 0);
        assert_eq!(relay.disconnect("s1"), 1);
        assert!(relay.get("players/s1").is_none());
        assert!(relay.get("players/s2").is_some());
    }

    #[test]
    fn invalid_keys_are_rejected() {
        let relay = MemoryRelay::default();
        let reply = apply_client_msg(&relay, "s1", ClientMsg::Publish { key: "players/".into(), value: json!(1) });
        assert!(matches!(reply, Some(ServerMsg::Error { ref code, .. }) if code == "invalid_key"));
        assert!(relay.is_empty());
    }

    #[test]
    fn ping_pongs() {
        let relay = MemoryRelay::default();
        assert!(matches!(
            apply_client_msg(&relay, "s1", ClientMsg::Ping { t: 42 }),
            Some(ServerMsg::Pong { t: 42 })
        ));
    }
}
