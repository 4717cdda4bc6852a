//! Livedesk Shared Types and Utilities
//!
//! This crate contains the domain types and database utilities shared across
//! the Livedesk platform.

pub mod db;
pub mod types;

pub use db::*;
pub use types::*;
