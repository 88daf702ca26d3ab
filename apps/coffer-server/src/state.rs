//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::upload::{CommandTranscoder, ContentStore, Transcoder, UploadError, UploadPipeline};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    pipeline: UploadPipeline,
}

impl AppState {
    /// Create state with the configured external transcoder
    pub async fn new(config: Config) -> Result<Self, UploadError> {
        let transcoder = CommandTranscoder::new(
            config.transcoder.program.clone(),
            config.transcoder.sample_rate,
            config.transcoder.extension.clone(),
        );
        Self::with_transcoder(config, Arc::new(transcoder)).await
    }

    /// Create state around any transcoder; makes sure the content
    /// directory exists
    pub async fn with_transcoder(config: Config, transcoder: Arc<dyn Transcoder>) -> Result<Self, UploadError> {
        let store = ContentStore::new(
            config.storage.content_dir.clone(),
            config.transcoder.extension.clone(),
        );
        store.ensure_dir().await?;
        tokio::fs::create_dir_all(&config.storage.temp_dir)
            .await
            .map_err(UploadError::io("creating temp directory"))?;

        let pipeline = UploadPipeline::new(store, transcoder, config.storage.temp_dir.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner { config, pipeline }),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the upload pipeline
    pub fn pipeline(&self) -> &UploadPipeline {
        &self.inner.pipeline
    }

    /// Get the content store
    pub fn store(&self) -> &ContentStore {
        self.inner.pipeline.store()
    }
}
