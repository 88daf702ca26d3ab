//! Coffer Server Library
//!
//! Content-addressed audio drop box. Uploads are normalized by an external
//! transcoder and stored as `<sha256>.<ext>` in a flat content directory.
//!
//! # Modules
//!
//! - `upload`: Streaming ingestion pipeline and content store
//! - `routes`: HTTP handlers
//! - `config`, `error`, `state`: Server plumbing

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod upload;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(routes::upload::router(state.config().storage.max_bytes_per_file))
        .merge(routes::files::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
