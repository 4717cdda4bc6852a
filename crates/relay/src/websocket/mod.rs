//! Real-time WebSocket boundary
//!
//! Connections, conversation rooms, typing debounce, and the event channel
//! each connection speaks over.

pub mod connection;
pub mod events;
pub mod handler;
pub mod room;
pub mod state;
pub mod typing;

pub use connection::Connection;
pub use events::{ClientEvent, ServerEvent};
pub use handler::ws_handler;
pub use room::RoomManager;
pub use state::WebSocketState;
pub use typing::TypingCoordinator;
