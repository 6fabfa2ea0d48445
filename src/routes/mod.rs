/// Router Module Index
///
/// Routes are split by who may call them; access control is attached per module
/// when the routers are merged in `create_router`.

/// Open to anonymous visitors. Handlers that need a session resolve it themselves.
pub mod public;

/// Wrapped in the authentication layer; every handler receives an `AuthUser`.
pub mod authenticated;

/// Authenticated, plus role checks (editor/admin) inside each handler.
pub mod admin;
