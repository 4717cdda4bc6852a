//! WebSocket handler for Axum
//!
//! Handles WebSocket upgrades, optional authentication, and event routing.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use livedesk_shared::{AgentRole, SenderType};

use crate::state::AppState;

use super::{
    connection::{Connection, OUTBOUND_BUFFER},
    events::{ClientEvent, ServerEvent},
};

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    /// Optional credential: agents authenticate at upgrade time, the
    /// customer widget attaches anonymously.
    token: Option<String>,
}

/// WebSocket handler - upgrades HTTP connection to WebSocket.
/// Anonymous connections are allowed; a supplied token must verify.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Query(params): Query<WebSocketQuery>,
) -> Result<Response, StatusCode> {
    let identity = match params.token.as_deref() {
        Some(token) => match app_state.jwt_manager.verify_credential(token) {
            Some(identity) => Some(identity),
            None => {
                tracing::warn!("WebSocket auth failed: invalid token");
                return Err(StatusCode::UNAUTHORIZED);
            }
        },
        None => None,
    };

    tracing::info!(
        authenticated = identity.is_some(),
        "WebSocket connection upgrade requested"
    );

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, identity, app_state)))
}

/// Handle individual WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    identity: Option<livedesk_shared::Identity>,
    app_state: AppState,
) {
    let (mut sender, mut receiver) = socket.split();

    // Bounded channel for events to this connection; the broadcaster drops
    // rather than blocks when the buffer is full.
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_BUFFER);

    let conn = Connection::new(identity, tx);
    let ws_state = app_state.ws_state.clone();
    let conn = ws_state.add_connection(conn).await;
    let session_id = conn.session_id;

    // Send connection acknowledgment
    let _ = conn.send(ServerEvent::Connected { session_id });

    // Spawn task to forward events to the client
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        if let Ok(msg) = msg {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        handle_client_event(event, Arc::clone(&conn), &app_state).await;
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = ?e,
                            message = %text,
                            "Failed to parse client event"
                        );
                        let _ = conn.send(ServerEvent::Error {
                            message: "Invalid event format".to_string(),
                        });
                    }
                },
                Message::Close(_) => {
                    tracing::info!(session_id = %session_id, "WebSocket close frame received");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // Axum handles ping/pong automatically
                }
                _ => {} // Ignore binary messages
            }
        }
    }

    // Cleanup on disconnect: registry removal also clears room memberships
    // and typing timers before returning.
    tracing::info!(session_id = %session_id, "WebSocket connection closing");
    ws_state.remove_connection(&session_id).await;

    send_task.abort();
}

/// Handle client event
async fn handle_client_event(event: ClientEvent, conn: Arc<Connection>, app_state: &AppState) {
    use ClientEvent::*;

    let ws_state = &app_state.ws_state;

    match event {
        Authenticate { token } => {
            match ws_state
                .authenticate(&conn.session_id, &app_state.jwt_manager, &token)
                .await
            {
                Some(identity) => {
                    let _ = conn.send(ServerEvent::Authenticated { identity });
                }
                None => {
                    let _ = conn.send(ServerEvent::Error {
                        message: "Invalid credential".to_string(),
                    });
                }
            }
        }

        JoinChat { chat_id } => {
            conn.subscribe(chat_id).await;
            ws_state.rooms.join(chat_id, Arc::clone(&conn)).await;
        }

        LeaveChat { chat_id } => {
            conn.unsubscribe(chat_id).await;
            ws_state.rooms.leave(&chat_id, &conn.session_id).await;
        }

        SendMessage {
            chat_id,
            content,
            sender_type,
            sender_ref,
            sender_name,
        } => {
            // System messages are platform-authored only; agent messages
            // carry the verified identity, not client-supplied fields.
            let (sender_ref, sender_name) = match sender_type {
                SenderType::System => {
                    let _ = conn.send(ServerEvent::Error {
                        message: "Clients cannot send system messages".to_string(),
                    });
                    return;
                }
                SenderType::Agent => match conn.identity().await {
                    Some(identity)
                        if matches!(identity.role, AgentRole::Agent | AgentRole::Admin) =>
                    {
                        (identity.id.to_string(), identity.name)
                    }
                    _ => {
                        let _ = conn.send(ServerEvent::Error {
                            message: "Authentication required to send as agent".to_string(),
                        });
                        return;
                    }
                },
                SenderType::Customer => (sender_ref, sender_name),
            };

            if let Err(e) = app_state
                .relay
                .send(chat_id, sender_type, sender_ref, sender_name, content)
                .await
            {
                tracing::debug!(
                    chat_id = %chat_id,
                    session_id = %conn.session_id,
                    error = %e,
                    "Message rejected"
                );
                let _ = conn.send(ServerEvent::Error {
                    message: e.to_string(),
                });
            }
        }

        Typing { chat_id, user_name } => {
            ws_state
                .typing
                .notify_typing(chat_id, conn.session_id, user_name)
                .await;
        }

        StopTyping { chat_id } => {
            ws_state
                .typing
                .notify_stop_typing(chat_id, conn.session_id)
                .await;
        }

        Ping => {
            let _ = conn.send(ServerEvent::Pong);
        }
    }
}
