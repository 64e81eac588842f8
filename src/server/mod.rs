// HTTP API
//
// Read endpoints over the catalog, thumbnail and original delivery, and the
// scan trigger. Handlers never touch SQLite on the async runtime; each request
// opens its own connection on a blocking thread.

pub mod auth;
pub mod handlers;
pub mod media;


use std::future::{Future, IntoFuture};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use rusqlite::Connection;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::constants::{API_KEY_HEADER, SHUTDOWN_GRACE_SECS};
use crate::error::GlimpseError;
use crate::scan::Scanner;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub database_path: Arc<PathBuf>,
    pub scanner: Arc<Scanner>,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(database_path: PathBuf, scanner: Arc<Scanner>, api_key: &str) -> Self {
        Self {
            database_path: Arc::new(database_path),
            scanner,
            api_key: Arc::from(api_key),
        }
    }

    /// Run a catalog query on the blocking pool with a fresh connection.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> crate::error::Result<T> + Send + 'static,
    {
        let path = Arc::clone(&self.database_path);
        tokio::task::spawn_blocking(move || {
            let conn = crate::db::open_connection(&path)?;
            f(&conn)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("database task failed: {}", e)))?
        .map_err(ApiError::from)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Errors a handler can answer with.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<GlimpseError> for ApiError {
    fn from(err: GlimpseError) -> Self {
        match err {
            GlimpseError::EntryNotFound(id) => ApiError::NotFound(format!("entry {} not found", id)),
            other => {
                log::error!("Request failed: {}", other);
                ApiError::Internal("internal error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)])
}

/// Build the full router.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/photos", get(handlers::list_photos))
        .route("/photos/:id", get(handlers::get_photo))
        .route("/photos/:id/thumbnail", get(handlers::get_thumbnail))
        .route("/photos/:id/original", get(handlers::get_original))
        .route("/photos/:id/stream", get(handlers::stream_video))
        .route("/folders", get(handlers::list_folders))
        .route("/stats", get(handlers::get_stats))
        .route("/scan", get(handlers::scan_status).post(handlers::trigger_scan))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

/// Serve until `shutdown` resolves, then give in-flight requests a bounded
/// window to finish.
pub async fn serve<S>(listener: TcpListener, state: AppState, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let server = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            let _ = stop_rx.await;
        })
        .into_future();
    let mut server = tokio::spawn(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        }
        _ = shutdown => {}
    }

    log::info!("Draining connections (up to {}s)", SHUTDOWN_GRACE_SECS);
    let _ = stop_tx.send(());

    match tokio::time::timeout(Duration::from_secs(SHUTDOWN_GRACE_SECS), &mut server).await {
        Ok(joined) => joined.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?,
        Err(_) => {
            log::warn!("Shutdown window elapsed, dropping remaining connections");
            server.abort();
            Ok(())
        }
    }
}
