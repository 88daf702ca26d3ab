//! Content Store
//!
//! The public content directory. Holds only `<digest>.<ext>` files, each
//! published by a single rename so readers never see a partial file.
//! Writers never lock: concurrent commits of the same digest carry the same
//! upload bytes and the last rename wins.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::digest::ContentDigest;
use super::temp_artifact::TempArtifact;
use super::types::UploadError;

#[derive(Debug, Clone)]
pub struct ContentStore {
    content_dir: PathBuf,
    extension: String,
}

impl ContentStore {
    pub fn new(content_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            content_dir: content_dir.into(),
            extension: extension.into(),
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Canonical extension, without the dot
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Create the content directory if it is missing
    pub async fn ensure_dir(&self) -> Result<(), UploadError> {
        tokio::fs::create_dir_all(&self.content_dir)
            .await
            .map_err(UploadError::io("creating content directory"))
    }

    /// `<digest>.<ext>`
    pub fn stored_name(&self, digest: &ContentDigest) -> String {
        format!("{}.{}", digest, self.extension)
    }

    /// Whether `name` looks like something this store publishes
    pub fn is_stored_name(&self, name: &str) -> bool {
        !name.starts_with('.')
            && name
                .strip_suffix(self.extension.as_str())
                .and_then(|rest| rest.strip_suffix('.'))
                .is_some_and(|stem| !stem.is_empty())
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Publish `converted` under its canonical name and return that name.
    ///
    /// An existing file at the target is replaced; for identical content
    /// that is a no-op as far as readers can tell.
    pub async fn commit(&self, converted: &Path, digest: &ContentDigest) -> Result<String, UploadError> {
        let name = self.stored_name(digest);
        let target = self.content_dir.join(&name);

        match tokio::fs::rename(converted, &target).await {
            Ok(()) => {}
            // Temp area on another filesystem
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                tracing::warn!(
                    from = %converted.display(),
                    to = %target.display(),
                    error = %e,
                    "Rename into store crosses devices, staging a copy"
                );
                self.stage_and_rename(converted, &target, &name).await?;
            }
            Err(e) => return Err(UploadError::io("renaming into store")(e)),
        }

        tracing::info!(name = %name, "Committed upload");
        Ok(name)
    }

    /// Copy into a hidden file inside the content directory, then rename
    /// that into place so visibility is still a single rename.
    async fn stage_and_rename(&self, source: &Path, target: &Path, name: &str) -> Result<(), UploadError> {
        let staging = TempArtifact::adopt(
            self.content_dir
                .join(format!(".{}.{}.partial", name, Uuid::new_v4().simple())),
        );

        tokio::fs::copy(source, staging.path())
            .await
            .map_err(UploadError::io("staging copy into store"))?;

        let file = tokio::fs::File::open(staging.path())
            .await
            .map_err(UploadError::io("opening staged file"))?;
        file.sync_all()
            .await
            .map_err(UploadError::io("syncing staged file"))?;
        drop(file);

        tokio::fs::rename(staging.path(), target)
            .await
            .map_err(UploadError::io("renaming staged file into store"))
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    /// Names of every stored artifact, sorted. Recomputed on each call.
    pub async fn list(&self) -> Result<Vec<String>, UploadError> {
        let mut entries = tokio::fs::read_dir(&self.content_dir)
            .await
            .map_err(UploadError::io("listing content directory"))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(UploadError::io("listing content directory"))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !self.is_stored_name(&name) {
                continue;
            }
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Map a requested name to a stored file. Only the basename is used, so
    /// `../x.ogg` resolves inside the content directory or not at all.
    pub async fn resolve(&self, requested: &str) -> Option<PathBuf> {
        let base = requested.rsplit(['/', '\\']).next()?;
        if !self.is_stored_name(base) {
            return None;
        }

        let path = self.content_dir.join(base);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
