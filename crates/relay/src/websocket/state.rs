//! Presence registry
//!
//! Tracks all live connections, their optional authenticated identity, and
//! the rooms each belongs to. A single instance is created at service start
//! and shared across all connections.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use livedesk_shared::Identity;

use crate::auth::JwtManager;

use super::connection::Connection;
use super::room::RoomManager;
use super::typing::TypingCoordinator;

/// Global WebSocket state shared across all connections
#[derive(Clone)]
pub struct WebSocketState {
    /// All active connections indexed by session_id
    pub connections: Arc<RwLock<HashMap<Uuid, Arc<Connection>>>>,

    /// Room manager for chat subscriptions
    pub rooms: Arc<RoomManager>,

    /// Typing debounce built on top of the room manager
    pub typing: TypingCoordinator,
}

impl WebSocketState {
    /// Create new WebSocket state
    pub fn new() -> Self {
        let rooms = Arc::new(RoomManager::new());
        let typing = TypingCoordinator::new(Arc::clone(&rooms));
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            rooms,
            typing,
        }
    }

    /// Register a connection
    pub async fn add_connection(&self, conn: Connection) -> Arc<Connection> {
        let conn = Arc::new(conn);
        let mut connections = self.connections.write().await;
        connections.insert(conn.session_id, Arc::clone(&conn));

        tracing::info!(
            session_id = %conn.session_id,
            total_connections = connections.len(),
            "Connection registered"
        );

        conn
    }

    /// Attach a verified identity to a registered connection
    pub async fn authenticate(
        &self,
        session_id: &Uuid,
        jwt_manager: &JwtManager,
        token: &str,
    ) -> Option<Identity> {
        let conn = self.get_connection(session_id).await?;
        let identity = jwt_manager.verify_credential(token)?;
        conn.set_identity(identity.clone()).await;
        Some(identity)
    }

    /// Deregister a connection (idempotent).
    ///
    /// Room memberships and typing timers are removed before this returns,
    /// so no broadcast started afterwards can deliver to the connection.
    pub async fn remove_connection(&self, session_id: &Uuid) {
        let mut connections = self.connections.write().await;
        if let Some(_conn) = connections.remove(session_id) {
            self.rooms.remove_connection(session_id).await;
            self.typing.cancel_for_connection(session_id).await;

            tracing::info!(
                session_id = %session_id,
                remaining_connections = connections.len(),
                "Connection deregistered"
            );
        }
    }

    /// Get a connection by session ID
    pub async fn get_connection(&self, session_id: &Uuid) -> Option<Arc<Connection>> {
        let connections = self.connections.read().await;
        connections.get(session_id).cloned()
    }

    /// Get total number of active connections
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }
}

impl Default for WebSocketState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use super::super::connection::OUTBOUND_BUFFER;
    use super::super::events::ServerEvent;
    use tokio::sync::mpsc;

    fn conn() -> (Connection, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        (Connection::new(None, tx), rx)
    }

    #[tokio::test]
    async fn test_add_and_remove_connection() {
        let state = WebSocketState::new();
        let (connection, _rx) = conn();
        let session_id = connection.session_id;

        state.add_connection(connection).await;
        assert_eq!(state.connection_count().await, 1);

        state.remove_connection(&session_id).await;
        assert_eq!(state.connection_count().await, 0);

        // Idempotent
        state.remove_connection(&session_id).await;
        assert_eq!(state.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_clears_rooms_and_typing() {
        let state = WebSocketState::new();
        let chat_id = Uuid::new_v4();

        let (connection, _rx) = conn();
        let connection = state.add_connection(connection).await;
        let session_id = connection.session_id;

        state.rooms.join(chat_id, Arc::clone(&connection)).await;
        state
            .typing
            .notify_typing(chat_id, session_id, "Ada".to_string())
            .await;

        state.remove_connection(&session_id).await;

        assert_eq!(state.rooms.get_room_size(&chat_id).await, 0);
        assert_eq!(state.typing.active_timers().await, 0);
    }

    #[tokio::test]
    async fn test_authenticate_attaches_identity() {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let secret = "test-secret-test-secret-test-secret-test";
        let jwt_manager = JwtManager::new(secret);
        let state = WebSocketState::new();

        let (connection, _rx) = conn();
        let connection = state.add_connection(connection).await;

        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let token = encode(
            &Header::default(),
            &crate::auth::Claims {
                sub: Uuid::new_v4(),
                role: "agent".to_string(),
                name: "Agent A".to_string(),
                iat: now,
                exp: now + 3600,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        let identity = state
            .authenticate(&connection.session_id, &jwt_manager, &token)
            .await;
        assert!(identity.is_some());
        assert!(connection.identity().await.is_some());

        // Bad token fails and leaves the connection anonymous otherwise
        let failed = state
            .authenticate(&connection.session_id, &jwt_manager, "garbage")
            .await;
        assert!(failed.is_none());
    }
}
