//! Upload Ingestion Module
//!
//! Turns multipart uploads into content-addressed files:
//! - Streaming part reader with explicit end-of-part / end-of-stream
//! - Private temp artifacts, removed on every exit path
//! - External transcoder behind a trait
//! - SHA-256 naming over the original upload bytes
//! - Atomic rename into the public content directory
//!
//! Pipeline Flow:
//! 1. `PartReader` yields one `UploadPart` at a time
//! 2. `write_part` streams it into a `TempArtifact`
//! 3. `Transcoder::convert` produces the canonical container
//! 4. `digest_file` fingerprints the original temp artifact
//! 5. `ContentStore::commit` renames the converted file to `<digest>.<ext>`

pub mod digest;
pub mod pipeline;
pub mod reader;
pub mod store;
pub mod temp_artifact;
pub mod transcoder;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use digest::{digest_file, ContentDigest};
pub use pipeline::UploadPipeline;
pub use reader::{ChunkSource, PartReader, ReadMode, UploadPart};
pub use store::ContentStore;
pub use temp_artifact::{write_part, TempArtifact};
pub use transcoder::{CommandTranscoder, Transcoder};
pub use types::*;
