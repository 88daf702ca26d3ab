//! Upload Routes
//!
//! Endpoints:
//! - POST /upload-file - Streaming multipart upload, any number of files
//! - POST /upload - Single file upload (`file` field), size-capped

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::Redirect,
    routing::post,
    Router,
};

use crate::error::Result;
use crate::state::AppState;
use crate::upload::{PartReader, MULTIPART_OVERHEAD};

// ============================================================================
// Router
// ============================================================================

/// Create the upload router
pub fn router(max_bytes_per_file: u64) -> Router<AppState> {
    let single_shot_limit =
        usize::try_from(max_bytes_per_file.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX);

    Router::new()
        .route(
            "/upload-file",
            post(upload_streaming).layer(DefaultBodyLimit::disable()),
        )
        .route(
            "/upload",
            post(upload_single).layer(DefaultBodyLimit::max(single_shot_limit)),
        )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /upload-file
///
/// Ingest every file part; a failing part is logged and skipped. Redirects
/// back to the index once the body is exhausted.
async fn upload_streaming(State(state): State<AppState>, multipart: Multipart) -> Result<Redirect> {
    let mut reader = PartReader::streaming(multipart);
    let report = state.pipeline().ingest_streaming(&mut reader).await?;

    tracing::info!(
        committed = report.committed.len(),
        failed = report.failures.len(),
        "Multipart upload finished"
    );

    Ok(Redirect::to("/"))
}

/// POST /upload
///
/// `curl -F file=@song.wav http://host/upload`
async fn upload_single(State(state): State<AppState>, multipart: Multipart) -> Result<String> {
    let max_bytes = state.config().storage.max_bytes_per_file;
    let mut reader = PartReader::single_shot(multipart, max_bytes);

    let name = state.pipeline().ingest_single(&mut reader).await?;

    Ok(format!("uploaded {}\n", name))
}

// ============================================================================
// Tests
// ============================================================================
