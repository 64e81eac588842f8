// Media delivery
//
// Whole-file responses for thumbnails and photo originals, single-range
// responses for video. Bodies are streamed from disk, never buffered.

use std::path::Path;

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use http_range::HttpRange;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio_util::io::ReaderStream;

use crate::constants::{CACHE_CONTROL, OCTET_STREAM, VIDEO_CONTENT_TYPES};
use crate::scan::classify::lowercase_extension;
use crate::server::ApiError;

// 64KiB read chunks
const STREAM_CAPACITY: usize = 65536;

/// Content type for range delivery, from the filename's extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = match lowercase_extension(Path::new(filename)) {
        Some(e) => e,
        None => return OCTET_STREAM,
    };
    VIDEO_CONTENT_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, ct)| *ct)
        .unwrap_or(OCTET_STREAM)
}

async fn open(path: &Path) -> Result<(File, u64), ApiError> {
    let file = File::open(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound("file not found".to_string())
        } else {
            log::error!("Failed to open {}: {}", path.display(), e);
            ApiError::Internal("failed to open file".to_string())
        }
    })?;
    let len = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to stat file: {}", e)))?
        .len();
    Ok((file, len))
}

fn built(result: axum::http::Result<Response<Body>>) -> Result<Response<Body>, ApiError> {
    result.map_err(|e| ApiError::Internal(format!("failed to build response: {}", e)))
}

/// Stream a whole file with a long-lived cache directive.
pub async fn serve_whole(path: &Path, content_type: &str) -> Result<Response<Body>, ApiError> {
    let (file, len) = open(path).await?;

    built(
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, len)
            .header(header::CACHE_CONTROL, CACHE_CONTROL)
            .body(Body::from_stream(ReaderStream::with_capacity(file, STREAM_CAPACITY))),
    )
}

/// Stream a file honoring a single `Range` header.
///
/// No header gives 200 with the whole file. Multiple ranges, ranges past the
/// end and malformed headers all give 416.
pub async fn serve_range(
    path: &Path,
    filename: &str,
    range: Option<&HeaderValue>,
) -> Result<Response<Body>, ApiError> {
    let (mut file, len) = open(path).await?;

    let resp = Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(filename))
        .header(header::ACCEPT_RANGES, "bytes");

    let range = match range {
        Some(r) if len > 0 => r,
        _ => {
            return built(
                resp.status(StatusCode::OK)
                    .header(header::CONTENT_LENGTH, len)
                    .body(Body::from_stream(ReaderStream::with_capacity(file, STREAM_CAPACITY))),
            );
        }
    };

    let not_satisfiable = |resp: axum::http::response::Builder| {
        built(
            resp.status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", len))
                .body(Body::empty()),
        )
    };

    let ranges = match range.to_str().ok().map(|r| HttpRange::parse(r, len)) {
        Some(Ok(ranges)) => ranges,
        _ => return not_satisfiable(resp),
    };

    let (start, length) = match ranges.as_slice() {
        [single] if single.length > 0 && single.start + single.length <= len => {
            (single.start, single.length)
        }
        _ => return not_satisfiable(resp),
    };

    file.seek(SeekFrom::Start(start))
        .await
        .map_err(|e| ApiError::Internal(format!("seek failed: {}", e)))?;

    built(
        resp.status(StatusCode::PARTIAL_CONTENT)
            .header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, start + length - 1, len),
            )
            .header(header::CONTENT_LENGTH, length)
            .body(Body::from_stream(ReaderStream::with_capacity(
                file.take(length),
                STREAM_CAPACITY,
            ))),
    )
}

/// `attachment` disposition naming the original file.
pub fn attachment(filename: &str) -> Option<HeaderValue> {
    let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
    HeaderValue::from_bytes(format!("attachment; filename=\"{}\"", escaped).as_bytes()).ok()
}
