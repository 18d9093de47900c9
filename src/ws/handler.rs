//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{GameInput, PlayerInput};
use crate::util::rate_limit::IntentRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::connection::Connection;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    debug!(session_id = %session_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (tx, rx) = mpsc::channel(state.config.outbound_buffer);
    let writer = tokio::spawn(write_loop(session_id, ws_sink, rx));

    let Some(slot) = state.game.connect(Connection::new(session_id, tx)).await else {
        // Rejected: let the writer flush the disconnect notice and close
        let _ = writer.await;
        return;
    };

    read_loop(slot, session_id, ws_stream, &state).await;

    let _ = state
        .game
        .send(GameInput::Disconnect { slot, session_id })
        .await;
    writer.abort();

    info!(slot, session_id = %session_id, "WebSocket connection closed");
}

/// Simulation -> socket. Ends when the simulation drops the connection,
/// the socket fails, or after forwarding a `Disconnect`.
async fn write_loop(
    session_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerMsg>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, ServerMsg::Disconnect { .. });
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(session_id = %session_id, error = %e, "WebSocket send failed");
            break;
        }
        if closing {
            let _ = ws_sink.send(Message::Close(None)).await;
            break;
        }
    }
}

/// Socket -> simulation
async fn read_loop(
    slot: usize,
    session_id: Uuid,
    mut ws_stream: SplitStream<WebSocket>,
    state: &AppState,
) {
    let rate_limiter = IntentRateLimiter::new(state.config.intent_rate_limit);

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    debug!(slot, "Rate limited input message");
                    continue;
                }

                // Unknown or malformed messages are dropped
                let msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!(slot, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                let input = PlayerInput {
                    slot,
                    session_id,
                    msg,
                    received_at: unix_millis(),
                };
                if !state.game.send(GameInput::Player(input)).await {
                    debug!(slot, "Input channel closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                debug!(slot, "Received binary message, ignoring");
            }
            Ok(Message::Close(_)) => {
                debug!(slot, "Client initiated close");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(slot, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
