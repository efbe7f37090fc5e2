//! WebSocket handler for real-time session updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

use crate::notify::update_message;
use crate::server::routes::activity::ActivityRequest;
use crate::server::routes::session::SessionStatus;
use crate::server::state::AppState;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Applies one text frame from a client.
///
/// Returns `true` when the frame was an activity report that restarted the
/// idle cycle.
fn handle_client_message(state: &AppState, text: &str) -> bool {
    match serde_json::from_str::<ActivityRequest>(text) {
        Ok(request) => state.monitor.record_activity(request.kind),
        Err(e) => {
            tracing::debug!(?e, "Ignoring malformed WebSocket message");
            false
        }
    }
}

/// Handles an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Send current session state on connection
    if let Some(initial_state) = update_message("initial_state", &SessionStatus::current(&state)) {
        let _ = sender.send(Message::Text(initial_state)).await;
    }

    let mut rx = state.subscribe();

    // Relay notices and logout events to the client
    let send_task = tokio::spawn(async move {
        while let Ok(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Clients may report activity over the socket as {"kind": "..."}
    let activity_state = Arc::clone(&state);
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_client_message(&activity_state, &text);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    tracing::debug!("WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use tokio::sync::broadcast;

    #[tokio::test]
    async fn test_client_activity_frames() {
        let (tx, _) = broadcast::channel(16);
        let state = AppState::new(tx, Arc::new(Database::open_in_memory().unwrap())).unwrap();
        state.start_session();

        assert!(!handle_client_message(&state, "not json"));
        assert!(!handle_client_message(&state, r#"{"kind": "sneeze"}"#));
        assert!(handle_client_message(&state, r#"{"kind": "pointer_down"}"#));
        // Inside the throttle window
        assert!(!handle_client_message(&state, r#"{"kind": "key_down"}"#));

        let counts = state.monitor.input_counts().unwrap();
        assert_eq!(counts.pointer_down, 1);
        assert_eq!(counts.key_down, 1);
    }
}
