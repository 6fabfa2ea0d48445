use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Library reads only ever expose
/// published resources.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // POST /api/register
        // Signup, forwarded to the auth provider; creates the member profile.
        .route("/api/register", post(handlers::register_user))
        // POST /api/contacto
        // Contact form submission.
        .route("/api/contacto", post(handlers::submit_contact))
        // GET /api/recursos
        // Library listing, premium items flagged as locked for non-subscribers.
        .route("/api/recursos", get(handlers::list_resources))
        // GET /api/recursos/signed-url?id=...
        // Entitlement-gated redirect to a resource's file. Registered publicly so the
        // handler can answer 400 for a missing id before checking the session.
        .route("/api/recursos/signed-url", get(handlers::get_signed_url))
        // GET /api/recursos/{slug}
        .route("/api/recursos/{slug}", get(handlers::get_resource))
}
