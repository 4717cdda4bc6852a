//! Conversation room management for pub/sub
//!
//! Manages chat "rooms" for broadcasting events to all current participants
//! of a conversation.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;
use super::events::ServerEvent;

/// Manages chat "rooms" for broadcasting events
pub struct RoomManager {
    /// Map of chat_id -> list of connections
    rooms: Arc<RwLock<HashMap<Uuid, Vec<Arc<Connection>>>>>,
}

impl RoomManager {
    /// Create a new room manager
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a connection to a chat room (idempotent)
    pub async fn join(&self, chat_id: Uuid, conn: Arc<Connection>) {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(chat_id).or_default();
        if !members.iter().any(|c| c.session_id == conn.session_id) {
            members.push(Arc::clone(&conn));
        }

        tracing::debug!(
            chat_id = %chat_id,
            session_id = %conn.session_id,
            room_size = members.len(),
            "Connection joined chat room"
        );
    }

    /// Remove a connection from a chat room (idempotent)
    pub async fn leave(&self, chat_id: &Uuid, session_id: &Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(chat_id) {
            members.retain(|c| c.session_id != *session_id);

            // Clean up empty rooms
            if members.is_empty() {
                rooms.remove(chat_id);
                tracing::debug!(
                    chat_id = %chat_id,
                    "Removed empty chat room"
                );
            } else {
                tracing::debug!(
                    chat_id = %chat_id,
                    session_id = %session_id,
                    room_size = members.len(),
                    "Connection left chat room"
                );
            }
        }
    }

    /// Broadcast an event to all connections in a chat room, best-effort.
    ///
    /// A failed delivery to one connection (closed socket, full buffer) is
    /// logged and never blocks or fails delivery to the others.
    pub async fn broadcast(&self, chat_id: &Uuid, event: ServerEvent) {
        let rooms = self.rooms.read().await;
        if let Some(members) = rooms.get(chat_id) {
            let mut success_count = 0;
            let mut failed_count = 0;

            for conn in members {
                match conn.send(event.clone()) {
                    Ok(()) => success_count += 1,
                    Err(_) => {
                        failed_count += 1;
                        tracing::warn!(
                            session_id = %conn.session_id,
                            chat_id = %chat_id,
                            "Failed to deliver event to connection (closed or backlogged)"
                        );
                    }
                }
            }

            tracing::debug!(
                chat_id = %chat_id,
                event_type = ?event,
                recipients = success_count,
                failed = failed_count,
                "Broadcast event to chat room"
            );
        } else {
            tracing::debug!(
                chat_id = %chat_id,
                event_type = ?event,
                "No room found for chat - no subscribers"
            );
        }
    }

    /// Remove a connection from all rooms
    pub async fn remove_connection(&self, session_id: &Uuid) {
        let mut rooms = self.rooms.write().await;
        let mut removed_from = Vec::new();

        for (chat_id, members) in rooms.iter_mut() {
            let before_len = members.len();
            members.retain(|c| c.session_id != *session_id);
            if members.len() < before_len {
                removed_from.push(*chat_id);
            }
        }

        // Clean up empty rooms
        rooms.retain(|_, members| !members.is_empty());

        if !removed_from.is_empty() {
            tracing::debug!(
                session_id = %session_id,
                chat_count = removed_from.len(),
                "Removed connection from rooms"
            );
        }
    }

    /// Get room size (number of connections) for a chat
    pub async fn get_room_size(&self, chat_id: &Uuid) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(chat_id).map(|v| v.len()).unwrap_or(0)
    }

    /// Get total number of active rooms
    pub async fn get_room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
