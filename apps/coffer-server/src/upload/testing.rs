//! Test fixtures: stub transcoders, throwaway pipelines and multipart bodies

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use tempfile::TempDir;

use crate::config::Config;
use crate::state::AppState;

use super::pipeline::UploadPipeline;
use super::store::ContentStore;
use super::transcoder::{converted_path, Transcoder};
use super::types::UploadError;

/// Bytes the stub transcoder puts in front of its input
pub(crate) const CONVERTED_PREFIX: &[u8] = b"OGG:";

/// Inputs containing this marker fail conversion
pub(crate) const FAIL_MARKER: &[u8] = b"corrupt";

const BOUNDARY: &str = "coffer-test-boundary-7d3a";

/// Deterministic transcoder: prefixes the input, fails on `FAIL_MARKER`
pub(crate) struct StubTranscoder;

#[async_trait]
impl Transcoder for StubTranscoder {
    async fn convert(&self, input: &Path) -> Result<std::path::PathBuf, UploadError> {
        let data = tokio::fs::read(input)
            .await
            .map_err(|e| UploadError::Conversion(e.to_string()))?;

        if data.windows(FAIL_MARKER.len()).any(|w| w == FAIL_MARKER) {
            return Err(UploadError::Conversion("unsupported input".to_string()));
        }

        let output = converted_path(input, "ogg");
        tokio::fs::write(&output, [CONVERTED_PREFIX, data.as_slice()].concat())
            .await
            .map_err(|e| UploadError::Conversion(e.to_string()))?;
        Ok(output)
    }
}

/// Converts, then deletes its input so the digest stage cannot read it
pub(crate) struct VandalTranscoder;

#[async_trait]
impl Transcoder for VandalTranscoder {
    async fn convert(&self, input: &Path) -> Result<std::path::PathBuf, UploadError> {
        let output = StubTranscoder.convert(input).await?;
        tokio::fs::remove_file(input)
            .await
            .map_err(|e| UploadError::Conversion(e.to_string()))?;
        Ok(output)
    }
}

/// A pipeline over its own temp and content directories
pub(crate) struct TestPipeline {
    _dir: TempDir,
    pub(crate) pipeline: UploadPipeline,
}

impl TestPipeline {
    pub(crate) fn new() -> Self {
        Self::with_transcoder(Arc::new(StubTranscoder))
    }

    pub(crate) fn with_transcoder(transcoder: Arc<dyn Transcoder>) -> Self {
        let dir = TempDir::new().unwrap();
        let temp_dir = dir.path().join("tmp");
        let content_dir = dir.path().join("uploads");
        std::fs::create_dir_all(&temp_dir).unwrap();
        std::fs::create_dir_all(&content_dir).unwrap();

        let pipeline = UploadPipeline::new(ContentStore::new(content_dir, "ogg"), transcoder, temp_dir);
        Self { _dir: dir, pipeline }
    }
}

pub(crate) fn vandal_pipeline() -> TestPipeline {
    TestPipeline::with_transcoder(Arc::new(VandalTranscoder))
}

/// Files left in the pipeline's temp area
pub(crate) fn temp_entries(t: &TestPipeline) -> usize {
    std::fs::read_dir(t.pipeline.temp_dir()).unwrap().count()
}

/// `multipart/form-data` body from `(field, filename, bytes)` triples
pub(crate) fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, file_name, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file_name {
            Some(file_name) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// POST request to `uri` carrying `parts`
pub(crate) fn multipart_request(uri: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// A full application over throwaway directories and the stub transcoder
pub(crate) struct TestApp {
    _dir: TempDir,
    pub(crate) state: AppState,
}

impl TestApp {
    pub(crate) fn app(&self) -> axum::Router {
        crate::app(self.state.clone())
    }

    /// Files left in the configured temp area
    pub(crate) fn temp_entries(&self) -> usize {
        std::fs::read_dir(self.state.pipeline().temp_dir()).unwrap().count()
    }
}

pub(crate) async fn test_app(max_bytes_per_file: u64) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.server.static_dir = dir.path().join("static");
    config.storage.content_dir = dir.path().join("uploads");
    config.storage.temp_dir = dir.path().join("tmp");
    config.storage.max_bytes_per_file = max_bytes_per_file;

    std::fs::create_dir_all(&config.server.static_dir).unwrap();
    std::fs::write(config.server.static_dir.join("index.html"), "<h1>coffer</h1>").unwrap();

    let state = AppState::with_transcoder(config, Arc::new(StubTranscoder))
        .await
        .unwrap();
    TestApp { _dir: dir, state }
}
