//! Upload Pipeline
//!
//! read -> temp artifact -> transcode -> digest original -> commit converted
//!
//! Every stage runs in order inside the request that owns the upload. Temp
//! files are held by `TempArtifact` guards, so whatever stage fails, the
//! temp area ends up empty again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::digest::digest_file;
use super::reader::{ChunkSource, PartReader};
use super::store::ContentStore;
use super::temp_artifact::{write_part, TempArtifact};
use super::transcoder::Transcoder;
use super::types::{PartFailure, StreamingReport, UploadError, SINGLE_SHOT_FIELD};

/// Orchestrates one upload part at a time; cheap to clone
#[derive(Clone)]
pub struct UploadPipeline {
    inner: Arc<UploadPipelineInner>,
}

struct UploadPipelineInner {
    store: ContentStore,
    transcoder: Arc<dyn Transcoder>,
    temp_dir: PathBuf,
}

impl UploadPipeline {
    pub fn new(store: ContentStore, transcoder: Arc<dyn Transcoder>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(UploadPipelineInner {
                store,
                transcoder,
                temp_dir: temp_dir.into(),
            }),
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.inner.store
    }

    pub fn temp_dir(&self) -> &Path {
        &self.inner.temp_dir
    }

    /// Run one part through every stage and return its canonical name
    pub async fn process_part<S>(&self, part: &mut S) -> Result<String, UploadError>
    where
        S: ChunkSource + ?Sized,
    {
        let original = write_part(part, &self.inner.temp_dir).await?;

        // `original` stays on disk until conversion has been attempted
        let converted = match self.inner.transcoder.convert(original.path()).await {
            Ok(path) => TempArtifact::adopt(path),
            Err(e) => {
                tracing::debug!(
                    path = %original.path().display(),
                    error = %e,
                    "Conversion failed"
                );
                return Err(e);
            }
        };

        // Fingerprint the pre-conversion bytes
        let digest = digest_file(original.path()).await?;

        let name = self.inner.store.commit(converted.path(), &digest).await?;

        tracing::debug!(
            file_name = %part.file_name(),
            size = original.size(),
            digest = %digest,
            stored = %name,
            "Upload part committed"
        );

        Ok(name)
    }

    /// Ingest every file part of a multipart request.
    ///
    /// A failing part is recorded and the loop moves on. Only a transport
    /// error ends the request, since no further parts can be read after it.
    pub async fn ingest_streaming(&self, reader: &mut PartReader) -> Result<StreamingReport, UploadError> {
        let mut report = StreamingReport::default();

        while let Some(mut part) = reader.next_part().await? {
            if !part.is_file() {
                tracing::debug!(field = %part.field_name(), "Skipping non-file part");
                continue;
            }

            let index = report.parts_seen();
            let file_name = part.file_name().to_string();

            match self.process_part(&mut part).await {
                Ok(name) => {
                    tracing::info!(file_name = %file_name, stored = %name, "Saved upload");
                    report.committed.push(name);
                }
                Err(UploadError::Transport(msg)) => return Err(UploadError::Transport(msg)),
                Err(e) => {
                    tracing::warn!(file_name = %file_name, error = %e, "Can't save upload part");
                    report.failures.push(PartFailure {
                        index,
                        file_name,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            committed = report.committed.len(),
            failed = report.failures.len(),
            "Streaming upload complete"
        );

        Ok(report)
    }

    /// Ingest the single `file` field of a request; any failure is returned
    pub async fn ingest_single(&self, reader: &mut PartReader) -> Result<String, UploadError> {
        while let Some(mut part) = reader.next_part().await? {
            if part.field_name() != SINGLE_SHOT_FIELD {
                continue;
            }

            tracing::debug!(
                file_name = %part.file_name(),
                content_type = part.content_type().unwrap_or(""),
                "Single file upload"
            );
            let name = self.process_part(&mut part).await?;
            tracing::info!(stored = %name, bytes = part.bytes_read(), "Saved upload");
            return Ok(name);
        }

        Err(UploadError::MissingFile(SINGLE_SHOT_FIELD))
    }
}

// ============================================================================
// Tests
// ============================================================================
