use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Member area. The authentication layer above rejects anonymous callers with 401
/// before any handler here runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET/PATCH /api/me
        // Own profile and entitlement; display name edit.
        .route("/api/me", get(handlers::get_me).patch(handlers::update_me))
}
