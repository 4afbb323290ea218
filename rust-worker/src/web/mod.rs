//! Web server module for the tracking endpoint.
//!
//! The server exposes the pixel endpoint that records opens plus a health
//! check. Every pixel request answers 200 with the same GIF bytes whether
//! or not an open was counted.

pub mod handlers;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub use handlers::{email_param, health, track_open, AppState, HealthResponse, MISSING_PARAMETER_BODY};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/track", get(track_open))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
