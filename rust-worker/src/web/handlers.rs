//! Tracking endpoint handlers.
//!
//! The pixel handler never lets the outcome of an open leak into the
//! response: matched, unknown, debounced and failed updates all return the
//! same image.

use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use url::form_urlencoded;

use crate::pixel::{EMAIL_PARAM, PIXEL_CONTENT_TYPE, TRACKING_PIXEL};
use crate::tracking::{OpenOutcome, OpenTracker};

/// Body returned when the `email` parameter is absent.
pub const MISSING_PARAMETER_BODY: &str = "Error: Missing parameters.";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<OpenTracker>,
}

impl AppState {
    pub fn new(tracker: OpenTracker) -> Self {
        Self {
            tracker: Arc::new(tracker),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Tracking Pixel
// =============================================================================

/// First non-empty `email` value of a raw query string, URL-decoded.
///
/// Repeated or unknown parameters are tolerated so the endpoint never
/// rejects a fetch before it reaches the handler.
pub fn email_param(query: Option<&str>) -> Option<String> {
    form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == EMAIL_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Tracking pixel endpoint.
///
/// This endpoint:
/// 1. Rejects requests without an `email` parameter with a text body
/// 2. Hands the address to the open tracker
/// 3. Returns the pixel regardless of what the tracker decided
pub async fn track_open(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let Some(email) = email_param(query.as_deref()) else {
        warn!("track_missing_parameter");
        return missing_parameter_response();
    };

    let user_agent = header_value(&headers, header::USER_AGENT.as_str());
    let referer = header_value(&headers, header::REFERER.as_str());

    info!(
        email = %email,
        user_agent = %user_agent,
        referer = %referer,
        "track_request_received"
    );

    match state.tracker.record_open(&email, Utc::now()).await {
        Ok(OpenOutcome::Recorded { row, open_count }) => {
            info!(email = %email, row = row, open_count = open_count, "track_open_counted");
        }
        Ok(OpenOutcome::Debounced { row }) => {
            info!(email = %email, row = row, "track_prefetch_ignored");
        }
        Ok(outcome @ (OpenOutcome::NoMatchingRecipient | OpenOutcome::NotYetSent)) => {
            info!(email = %email, outcome = ?outcome, "track_no_op");
        }
        Err(e) => {
            error!(email = %email, error = %e, "track_store_update_failed");
        }
    }

    pixel_response()
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

fn pixel_response() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, PIXEL_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
        ],
        TRACKING_PIXEL,
    )
        .into_response()
}

fn missing_parameter_response() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        MISSING_PARAMETER_BODY,
    )
        .into_response()
}
