use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Admin Router Module
///
/// Nested under `/api/admin` and wrapped in the authentication layer. Role checks
/// happen in the handlers: editors may create resources, only admins manage roles
/// and subscriptions.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /api/admin/recursos
        // Multipart resource creation with optional file upload.
        .route("/recursos", post(handlers::create_resource))
        // PUT /api/admin/users/{id}/role
        .route("/users/{id}/role", put(handlers::set_user_role))
        // PUT /api/admin/subscriptions
        // Billing sync / manual grants.
        .route("/subscriptions", put(handlers::upsert_subscription))
}
