//! API routes

pub mod chats;
pub mod health;
pub mod messages;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};

use crate::{auth::require_agent, state::AppState, websocket::ws_handler};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Public routes: the customer widget has no credentials
    let public_api_routes = Router::new()
        .route("/chats", post(chats::create_chat))
        .route("/messages", get(messages::list_messages));

    // Agent routes (verified identity required)
    let agent_api_routes = Router::new()
        .route("/chats", get(chats::list_chats))
        .route("/chats/:chat_id", get(chats::get_chat))
        .route("/chats/:chat_id/claim", post(chats::claim_chat))
        .route("/chats/:chat_id/resolve", post(chats::resolve_chat))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_agent,
        ));

    let cors = cors_layer(&state.config.cors_allow_origin);

    Router::new()
        .merge(health_routes)
        .route("/ws", get(ws_handler))
        .nest("/api", public_api_routes.merge(agent_api_routes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the embeddable widget. `*` during development, a single exact
/// origin in production.
fn cors_layer(allow_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if allow_origin == "*" {
        cors.allow_origin(Any)
    } else {
        match allow_origin.parse::<HeaderValue>() {
            Ok(origin) => cors.allow_origin(origin),
            Err(_) => {
                tracing::warn!(origin = %allow_origin, "Invalid CORS origin, falling back to any");
                cors.allow_origin(Any)
            }
        }
    }
}
