//! Livedesk Relay Library
//!
//! This crate contains the real-time relay and chat-lifecycle coordinator
//! for the Livedesk support chat platform.

pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod storage;
pub mod websocket;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
