//! Temp Artifact Writer
//!
//! Materializes one upload part into a private file in the temp area.
//! The returned `TempArtifact` owns that file and removes it when dropped,
//! so every exit path of the pipeline (commit, conversion failure, write
//! error, client disconnect) leaves the temp area clean.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::reader::ChunkSource;
use super::types::{UploadError, TEMP_PREFIX};

const MAX_STEM_LEN: usize = 64;
const MAX_EXT_LEN: usize = 8;

// ============================================================================
// Temp Artifact
// ============================================================================

/// A pipeline-private file, removed on drop
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    size: u64,
}

impl TempArtifact {
    /// Create a fresh, uniquely named file for `file_name_hint` in `temp_dir`
    pub async fn create(temp_dir: &Path, file_name_hint: &str) -> Result<(Self, File), UploadError> {
        let path = temp_dir.join(temp_file_name(file_name_hint));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(UploadError::io("creating temp file"))?;

        tracing::debug!(path = %path.display(), "Created temp artifact");

        Ok((Self { path, size: 0 }, file))
    }

    /// Take ownership of a file some other stage produced
    pub fn adopt(path: PathBuf) -> Self {
        Self { path, size: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written through `write_part`
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        // Blocking unlink of a single file; guards never own directories
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed temp artifact"),
            // Already moved into the store
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove temp artifact"
            ),
        }
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Copy every chunk of `part` into a new temp artifact.
///
/// The file is opened before the first chunk is read. Any read or write
/// error aborts immediately; the partially written file goes with the
/// dropped guard.
pub async fn write_part<S>(part: &mut S, temp_dir: &Path) -> Result<TempArtifact, UploadError>
where
    S: ChunkSource + ?Sized,
{
    let hint = part.file_name().to_string();
    let (mut artifact, mut file) = TempArtifact::create(temp_dir, &hint).await?;

    while let Some(chunk) = part.next_chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(UploadError::io("writing temp file"))?;
        artifact.size += chunk.len() as u64;
    }

    file.flush().await.map_err(UploadError::io("flushing temp file"))?;
    drop(file);

    tracing::debug!(
        path = %artifact.path.display(),
        size = artifact.size,
        "Upload part written"
    );

    Ok(artifact)
}

// ============================================================================
// Helpers
// ============================================================================

/// `upload_<stem>_<uuid>[.<ext>]`, built only from safe characters of the hint
fn temp_file_name(hint: &str) -> String {
    let base = hint.rsplit(['/', '\\']).next().unwrap_or_default();
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (base, ""),
    };

    let stem = sanitize(stem, MAX_STEM_LEN);
    let ext = sanitize(ext, MAX_EXT_LEN);
    let id = Uuid::new_v4().simple();

    if ext.is_empty() {
        format!("{TEMP_PREFIX}{stem}_{id}")
    } else {
        format!("{TEMP_PREFIX}{stem}_{id}.{ext}")
    }
}

fn sanitize(raw: &str, max_len: usize) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(max_len)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
