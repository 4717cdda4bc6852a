//! Request authentication middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{error::ApiError, state::AppState};

/// Require a verified agent identity on the request.
///
/// Extracts the bearer token, verifies it, and inserts the resulting
/// [`livedesk_shared::Identity`] as a request extension for handlers.
pub async fn require_agent(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let identity = state
        .jwt_manager
        .verify_credential(token)
        .ok_or(ApiError::InvalidCredential)?;

    tracing::debug!(user_id = %identity.id, role = %identity.role.as_str(), "Request authenticated");

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
