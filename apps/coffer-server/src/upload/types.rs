//! Upload types shared by every pipeline stage

use std::path::PathBuf;


// ============================================================================
// Constants
// ============================================================================

/// Hard per-file ceiling for single-shot uploads: 100 MB
pub const MAX_BYTES_PER_FILE: u64 = 100_000_000;

/// Largest chunk handed out by the part reader: 64KB
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Extra request-body allowance for multipart framing in single-shot mode
pub const MULTIPART_OVERHEAD: u64 = 20 * 1024 * 1024;

/// Prefix of every temp artifact created by the pipeline
pub const TEMP_PREFIX: &str = "upload_";

/// Multipart field name read by the single-shot endpoint
pub const SINGLE_SHOT_FIELD: &str = "file";

// ============================================================================
// Error Types
// ============================================================================

/// Upload pipeline error types
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Client disconnect or malformed multipart framing
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upload exceeds maximum size: more than {max} bytes")]
    FileTooLarge { max: u64 },

    #[error("IO error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Could not fingerprint {path}: {source}")]
    Digest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No `{0}` field in upload")]
    MissingFile(&'static str),
}

impl UploadError {
    /// Wrap an io::Error with the operation that produced it
    pub fn io(context: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Io { context, source }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::Transport(_) => StatusCode::BAD_REQUEST,
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Conversion(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Digest { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingFile(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl UploadError {
    /// Classify a multipart failure. A body cut off by the request size
    /// limit is a capacity error when the read carries a ceiling.
    pub fn from_multipart(err: axum::extract::multipart::MultipartError, limit: Option<u64>) -> Self {
        match limit {
            Some(max) if err.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE => {
                Self::FileTooLarge { max }
            }
            _ => Self::Transport(err.body_text()),
        }
    }
}

// ============================================================================
// Streaming Results
// ============================================================================

/// A part that failed inside a streaming upload
#[derive(Debug, Clone)]
pub struct PartFailure {
    /// Position of the part within the request (file parts only)
    pub index: usize,
    /// Declared filename, untrusted
    pub file_name: String,
    /// Rendered error
    pub error: String,
}

/// Outcome of a whole streaming request
#[derive(Debug, Clone, Default)]
pub struct StreamingReport {
    /// Canonical names committed, in part order
    pub committed: Vec<String>,
    /// Parts that did not make it into the store
    pub failures: Vec<PartFailure>,
}

impl StreamingReport {
    /// Number of file parts seen
    pub fn parts_seen(&self) -> usize {
        self.committed.len() + self.failures.len()
    }
}
