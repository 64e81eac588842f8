// Route handlers

use std::path::PathBuf;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, Response, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::constants::{OCTET_STREAM, THUMB_CONTENT_TYPE};
use crate::db::schema::{self, CatalogEntry, CatalogStats, FolderCount, ListFilter, MediaKind};
use crate::error::GlimpseError;
use crate::scan::{ScanStatus, TriggerOutcome};
use crate::server::{media, ApiError, AppState};

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("invalid id '{}'", raw)))
}

async fn load_entry(state: &AppState, raw_id: &str) -> Result<CatalogEntry, ApiError> {
    let id = parse_id(raw_id)?;
    state
        .with_db(move |conn| schema::get_entry(conn, id)?.ok_or(GlimpseError::EntryNotFound(id)))
        .await
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/photos
pub async fn list_photos(
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Vec<CatalogEntry>>, ApiError> {
    let entries = state.with_db(move |conn| schema::list_entries(conn, &filter)).await?;
    Ok(Json(entries))
}

/// GET /api/photos/:id
pub async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CatalogEntry>, ApiError> {
    Ok(Json(load_entry(&state, &id).await?))
}

/// GET /api/photos/:id/thumbnail
pub async fn get_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let entry = load_entry(&state, &id).await?;
    media::serve_whole(&PathBuf::from(&entry.thumbnail_path), THUMB_CONTENT_TYPE).await
}

/// GET /api/photos/:id/original
///
/// Videos go through range delivery so players can seek.
pub async fn get_original(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response<Body>, ApiError> {
    let entry = load_entry(&state, &id).await?;
    let path = PathBuf::from(&entry.original_path);

    let mut resp = match entry.media_type {
        MediaKind::Video => media::serve_range(&path, &entry.filename, headers.get(header::RANGE)).await?,
        MediaKind::Photo => media::serve_whole(&path, OCTET_STREAM).await?,
    };

    if let Some(disposition) = media::attachment(&entry.filename) {
        resp.headers_mut().insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok(resp)
}

/// GET /api/photos/:id/stream
pub async fn stream_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response<Body>, ApiError> {
    let entry = load_entry(&state, &id).await?;
    if entry.media_type != MediaKind::Video {
        return Err(ApiError::BadRequest("entry is not a video".to_string()));
    }

    media::serve_range(
        &PathBuf::from(&entry.original_path),
        &entry.filename,
        headers.get(header::RANGE),
    )
    .await
}

/// GET /api/folders
pub async fn list_folders(State(state): State<AppState>) -> Result<Json<Vec<FolderCount>>, ApiError> {
    Ok(Json(state.with_db(schema::list_folders).await?))
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<CatalogStats>, ApiError> {
    Ok(Json(state.with_db(schema::get_stats).await?))
}

/// POST /api/scan
pub async fn trigger_scan(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.scanner.try_start()?;

    let (status, label) = match outcome {
        TriggerOutcome::Started => {
            log::info!("Scan triggered over HTTP");
            (StatusCode::ACCEPTED, "started")
        }
        TriggerOutcome::AlreadyRunning => (StatusCode::CONFLICT, "already_running"),
    };

    Ok((status, Json(serde_json::json!({ "status": label }))))
}

/// GET /api/scan
pub async fn scan_status(State(state): State<AppState>) -> Json<ScanStatus> {
    Json(state.scanner.status())
}
