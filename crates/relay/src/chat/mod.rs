//! Chat lifecycle coordination and message relay

pub mod lifecycle;
pub mod ordering;
pub mod relay;

pub use lifecycle::{ChatLifecycle, NewChat};
pub use ordering::ChatLocks;
pub use relay::MessageRelay;
