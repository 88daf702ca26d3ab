//! Streaming Part Reader
//!
//! Pulls one upload part at a time out of a multipart request body and
//! hands its bytes out in bounded chunks. Two explicit signals drive the
//! read loop:
//!
//! - `next_part() == Ok(None)` - end of stream, no parts remain
//! - `next_chunk() == Ok(None)` - end of the current part
//!
//! Anything else coming out of the transport is an `UploadError`.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::multipart::{Field, Multipart};

use super::types::{UploadError, CHUNK_SIZE};

// ============================================================================
// Chunk Source Trait
// ============================================================================

/// A finite, lazily-read sequence of byte chunks for one upload part
#[async_trait]
pub trait ChunkSource: Send {
    /// Declared filename, used only as a naming hint
    fn file_name(&self) -> &str;

    /// Next chunk of the part, or `None` once the part is exhausted
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError>;
}

// ============================================================================
// Part Reader
// ============================================================================

/// How many bytes a single part may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Any number of parts, no per-part ceiling
    Streaming,
    /// One file, rejected once it exceeds `max_bytes`
    SingleShot { max_bytes: u64 },
}

/// Sequential reader over the parts of one request
pub struct PartReader {
    multipart: Multipart,
    mode: ReadMode,
}

impl PartReader {
    /// Reader for the unbounded multipart endpoint
    pub fn streaming(multipart: Multipart) -> Self {
        Self {
            multipart,
            mode: ReadMode::Streaming,
        }
    }

    /// Reader for the size-capped single file endpoint
    pub fn single_shot(multipart: Multipart, max_bytes: u64) -> Self {
        Self {
            multipart,
            mode: ReadMode::SingleShot { max_bytes },
        }
    }

    /// Advance to the next part. `Ok(None)` signals end of stream.
    pub async fn next_part(&mut self) -> Result<Option<UploadPart<'_>>, UploadError> {
        let limit = match self.mode {
            ReadMode::Streaming => None,
            ReadMode::SingleShot { max_bytes } => Some(max_bytes),
        };

        let Some(field) = self
            .multipart
            .next_field()
            .await
            .map_err(|e| UploadError::from_multipart(e, limit))?
        else {
            return Ok(None);
        };

        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        tracing::debug!(
            field = %field_name,
            file_name = file_name.as_deref().unwrap_or(""),
            content_type = content_type.as_deref().unwrap_or(""),
            "Reading upload part"
        );

        Ok(Some(UploadPart {
            field,
            field_name,
            file_name,
            content_type,
            chunker: Rechunker::new(limit),
        }))
    }
}

// ============================================================================
// Upload Part
// ============================================================================

/// One logical file inside a request; lives only for one read loop
pub struct UploadPart<'r> {
    field: Field<'r>,
    field_name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    chunker: Rechunker,
}

impl UploadPart<'_> {
    /// Multipart field name
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Declared content type, untrusted
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Whether the part was sent as a file (carries a filename)
    pub fn is_file(&self) -> bool {
        self.file_name.is_some()
    }

    /// Bytes handed out so far
    pub fn bytes_read(&self) -> u64 {
        self.chunker.bytes_read
    }
}

#[async_trait]
impl<'r> ChunkSource for UploadPart<'r> {
    fn file_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or_default()
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
        let limit = self.chunker.limit;
        while !self.chunker.has_pending() {
            let frame = self
                .field
                .chunk()
                .await
                .map_err(|e| UploadError::from_multipart(e, limit))?;
            match frame {
                Some(bytes) => self.chunker.refill(bytes),
                None => return Ok(None),
            }
        }
        self.chunker.take().map(Some)
    }
}

// ============================================================================
// Rechunking
// ============================================================================

/// Splits transport frames into `CHUNK_SIZE` slices and enforces the
/// per-part ceiling. Slicing `Bytes` is zero-copy, so at most one
/// transport frame is held at a time.
#[derive(Debug)]
struct Rechunker {
    pending: Bytes,
    limit: Option<u64>,
    bytes_read: u64,
}

impl Rechunker {
    fn new(limit: Option<u64>) -> Self {
        Self {
            pending: Bytes::new(),
            limit,
            bytes_read: 0,
        }
    }

    fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn refill(&mut self, bytes: Bytes) {
        self.pending = bytes;
    }

    fn take(&mut self) -> Result<Bytes, UploadError> {
        let len = self.pending.len().min(CHUNK_SIZE);
        let chunk = self.pending.split_to(len);
        self.bytes_read += chunk.len() as u64;

        if let Some(max) = self.limit {
            if self.bytes_read > max {
                return Err(UploadError::FileTooLarge { max });
            }
        }

        Ok(chunk)
    }
}

// ============================================================================
// In-memory source
// ============================================================================

/// Chunk source over fixed in-memory frames, for exercising the writer
/// and pipeline without a live request
#[cfg(test)]
pub(crate) struct MemoryPart {
    file_name: String,
    frames: std::collections::VecDeque<Result<Bytes, UploadError>>,
}

#[cfg(test)]
impl MemoryPart {
    pub(crate) fn new(file_name: &str, data: &[u8]) -> Self {
        let frames = data
            .chunks(CHUNK_SIZE)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Self {
            file_name: file_name.to_string(),
            frames,
        }
    }

    /// Source that delivers `data` and then fails like a dropped connection
    pub(crate) fn disconnecting(file_name: &str, data: &[u8]) -> Self {
        let mut part = Self::new(file_name, data);
        part.frames
            .push_back(Err(UploadError::Transport("connection reset".to_string())));
        part
    }
}

#[cfg(test)]
#[async_trait]
impl ChunkSource for MemoryPart {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
        self.frames.pop_front().transpose()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rechunker_splits_large_frames() {
        let mut chunker = Rechunker::new(None);
        chunker.refill(Bytes::from(vec![7u8; CHUNK_SIZE * 2 + 10]));

        let mut sizes = Vec::new();
        while chunker.has_pending() {
            sizes.push(chunker.take().unwrap().len());
        }

        assert_eq!(sizes, vec![CHUNK_SIZE, CHUNK_SIZE, 10]);
        assert_eq!(chunker.bytes_read, (CHUNK_SIZE * 2 + 10) as u64);
    }

    #[test]
    fn test_rechunker_allows_exact_limit() {
        let mut chunker = Rechunker::new(Some(16));
        chunker.refill(Bytes::from_static(&[1u8; 16]));
        assert!(chunker.take().is_ok());
        assert!(!chunker.has_pending());
    }

    #[test]
    fn test_rechunker_rejects_one_byte_over() {
        let mut chunker = Rechunker::new(Some(16));
        chunker.refill(Bytes::from_static(&[1u8; 10]));
        assert!(chunker.take().is_ok());

        chunker.refill(Bytes::from_static(&[1u8; 7]));
        let result = chunker.take();
        assert!(matches!(result, Err(UploadError::FileTooLarge { max: 16 })));
    }

    #[tokio::test]
    async fn test_memory_part_signals_end_of_part() {
        let mut part = MemoryPart::new("a.wav", b"abc");
        assert_eq!(part.next_chunk().await.unwrap().unwrap(), Bytes::from_static(b"abc"));
        assert!(part.next_chunk().await.unwrap().is_none());
    }
}
