// API key gate for /api routes

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;

use crate::constants::API_KEY_HEADER;
use crate::server::AppState;

/// Compare a presented key against the configured one in constant time.
/// An unset key never matches, which locks the API until one is configured.
pub fn key_matches(expected: &str, provided: &[u8]) -> bool {
    if expected.is_empty() {
        return false;
    }
    expected.as_bytes().ct_eq(provided).into()
}

pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(API_KEY_HEADER)
        .map(|v| key_matches(&state.api_key, v.as_bytes()))
        .unwrap_or(false);

    if !authorized {
        log::debug!("Rejected {} {}: bad or missing API key", request.method(), request.uri().path());
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "unauthorized" })),
        )
            .into_response();
    }

    next.run(request).await
}
