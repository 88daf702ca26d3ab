//! File serving routes
//!
//! Lists and serves stored artifacts from the content directory. Any other
//! path ending in the canonical extension is served by its basename, and
//! everything else falls through to the static index page.

use std::path::Path as FsPath;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::upload::CHUNK_SIZE;

/// Create the files router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/uploads", get(list_uploads))
        .fallback(serve_path)
}

#[derive(Debug, Serialize)]
struct UploadList {
    uploads: Vec<String>,
}

/// GET /uploads
async fn list_uploads(State(state): State<AppState>) -> Result<Json<UploadList>> {
    let uploads = state.store().list().await?;
    tracing::debug!(count = uploads.len(), "Listing uploads");
    Ok(Json(UploadList { uploads }))
}

/// Catch-all
///
/// `/<anything>/<name>.ogg` serves the stored artifact `<name>.ogg`; every
/// other path gets the index page.
async fn serve_path(State(state): State<AppState>, uri: Uri) -> Result<Response> {
    let requested = uri.path();
    let suffix = format!(".{}", state.store().extension());
    if !requested.ends_with(&suffix) {
        return index(State(state)).await.map(IntoResponse::into_response);
    }

    let path = state
        .store()
        .resolve(requested)
        .await
        .ok_or_else(|| AppError::NotFound(requested.to_string()))?;

    tracing::debug!(path = %path.display(), "Serving stored file");
    stream_file(&path).await
}

/// GET /
async fn index(State(state): State<AppState>) -> Result<Html<String>> {
    let path = state.config().server.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Ok(Html(page)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AppError::NotFound("index.html".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Stream a file back verbatim, one chunk at a time
async fn stream_file(path: &FsPath) -> Result<Response> {
    let file = File::open(path).await?;
    let size = file.metadata().await?.len();
    let content_type = mime_guess::from_path(path).first_or_octet_stream();

    let chunks = futures::stream::try_unfold(file, read_chunk);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(header::CONTENT_LENGTH, size)
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .body(Body::from_stream(chunks))
        .map_err(|e| AppError::Io(std::io::Error::other(e)))
}

async fn read_chunk(mut file: File) -> std::io::Result<Option<(Bytes, File)>> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let n = file.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    Ok(Some((Bytes::from(buf), file)))
}
