//! WebSocket event types and serialization
//!
//! Defines all client-to-server and server-to-client event types with
//! type-safe serde serialization. Wire names are kebab-case to match the
//! public widget protocol (`join-chat`, `new-message`, ...).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use livedesk_shared::{Chat, Identity, Message, SenderType};

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Attach a verified identity to this connection (agents)
    Authenticate { token: String },

    /// Join a conversation room
    JoinChat { chat_id: Uuid },

    /// Leave a conversation room
    LeaveChat { chat_id: Uuid },

    /// Send a message into a conversation
    SendMessage {
        chat_id: Uuid,
        content: String,
        sender_type: SenderType,
        sender_ref: String,
        sender_name: String,
    },

    /// Typing indicator
    Typing { chat_id: Uuid, user_name: String },

    /// Stop typing
    StopTyping { chat_id: Uuid },

    /// Heartbeat ping to keep connection alive
    Ping,
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Connection acknowledged
    Connected { session_id: Uuid },

    /// Identity attached to this connection
    Authenticated { identity: Identity },

    /// New message committed to a conversation
    NewMessage { message: Message },

    /// Conversation snapshot after a lifecycle transition
    ChatUpdated { chat: Chat },

    /// A participant started typing
    UserTyping { chat_id: Uuid, user_name: String },

    /// A participant stopped typing
    UserStopTyping { chat_id: Uuid },

    /// Heartbeat response
    Pong,

    /// Error message
    Error { message: String },
}
