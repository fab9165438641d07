//! WebSocket transport between browser agents and the hub.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use cr_protocol::{ClientRequest, ServerEvent};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::HubCommand;
use crate::state::AppState;

/// Handle WebSocket upgrade for an agent session.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Pump events to the socket and requests to the hub until either side
/// goes away.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let session = Uuid::new_v4();
    let (sender, mut events) = mpsc::unbounded_channel::<ServerEvent>();

    if !state.hub.send(HubCommand::Connect { session, sender }) {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if socket.send(Message::Text(event.to_json().into())).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Text(text))) => forward_request(&state, session, text.as_str()),
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.send(HubCommand::Disconnect { session });
}

fn forward_request(state: &AppState, session: Uuid, text: &str) {
    match serde_json::from_str::<ClientRequest>(text) {
        Ok(request) => {
            state.hub.send(HubCommand::Request { session, request });
        }
        Err(e) => {
            tracing::debug!(session = %session, error = %e, "Ignoring malformed request");
        }
    }
}
