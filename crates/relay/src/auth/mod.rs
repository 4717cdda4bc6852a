//! Authentication module for the Livedesk relay
//!
//! The relay never issues or stores credentials; it only verifies opaque
//! bearer tokens handed to it per connection or request.

pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, JwtManager};
pub use middleware::require_agent;
