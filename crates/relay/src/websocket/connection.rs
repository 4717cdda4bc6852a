//! WebSocket connection management
//!
//! Represents an active WebSocket connection with its optional authenticated
//! identity and room subscriptions.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use livedesk_shared::Identity;

use super::events::ServerEvent;

/// Outbound event buffer per connection. A consumer that falls this far
/// behind gets events dropped rather than stalling the room.
pub const OUTBOUND_BUFFER: usize = 256;

/// Represents an active WebSocket connection
#[derive(Debug)]
pub struct Connection {
    /// Unique session ID for this connection
    pub session_id: Uuid,

    /// Verified identity, if the connection authenticated. Customers stay
    /// anonymous; agents attach an identity at upgrade or via the
    /// `authenticate` event.
    pub identity: RwLock<Option<Identity>>,

    /// Bounded channel to send events to this connection
    pub sender: mpsc::Sender<ServerEvent>,

    /// Set of chat IDs this connection is joined to
    pub subscriptions: Arc<RwLock<HashSet<Uuid>>>,
}

impl Connection {
    /// Create a new connection
    pub fn new(identity: Option<Identity>, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            identity: RwLock::new(identity),
            sender,
            subscriptions: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Enqueue an event to this connection without blocking.
    ///
    /// Returns Err if the connection is closed or its buffer is full.
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::TrySendError<ServerEvent>> {
        self.sender.try_send(event)
    }

    /// Attach a verified identity to this connection
    pub async fn set_identity(&self, identity: Identity) {
        let mut slot = self.identity.write().await;
        tracing::debug!(
            session_id = %self.session_id,
            user_id = %identity.id,
            "Connection authenticated"
        );
        *slot = Some(identity);
    }

    /// Current identity snapshot, if authenticated
    pub async fn identity(&self) -> Option<Identity> {
        self.identity.read().await.clone()
    }

    /// Record membership in a chat room
    pub async fn subscribe(&self, chat_id: Uuid) {
        let mut subs = self.subscriptions.write().await;
        subs.insert(chat_id);
        tracing::debug!(
            session_id = %self.session_id,
            chat_id = %chat_id,
            "Subscribed to chat"
        );
    }

    /// Drop membership in a chat room
    pub async fn unsubscribe(&self, chat_id: Uuid) {
        let mut subs = self.subscriptions.write().await;
        subs.remove(&chat_id);
        tracing::debug!(
            session_id = %self.session_id,
            chat_id = %chat_id,
            "Unsubscribed from chat"
        );
    }

    /// Check membership in a chat room
    pub async fn is_subscribed(&self, chat_id: &Uuid) -> bool {
        let subs = self.subscriptions.read().await;
        subs.contains(chat_id)
    }
}
