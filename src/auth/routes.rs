//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/farcaster` - Quick Auth / SIWF sign-in
/// - `GET /api/me` - Identity carried by the current session token
/// - `GET /health` - Liveness probe
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/farcaster", post(handlers::farcaster_auth))
        .route("/api/me", get(handlers::me_handler))
        .route("/health", get(handlers::health_handler))
}
