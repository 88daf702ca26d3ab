//! Content Addresser
//!
//! SHA-256 over a finished file, streamed in fixed-size reads.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use super::types::{UploadError, CHUNK_SIZE};

/// Lowercase hex SHA-256 of an artifact's bytes; the only dedup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Hex width of every digest
    pub const HEX_LEN: usize = 64;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digest of an in-memory buffer
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stream `path` through SHA-256 without loading it whole
pub async fn digest_file(path: &Path) -> Result<ContentDigest, UploadError> {
    let to_err = |source| UploadError::Digest {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::open(path).await.map_err(to_err)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await.map_err(to_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(ContentDigest(hex::encode(hasher.finalize())))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_digest_known_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello");
        std::fs::write(&path, b"hello").unwrap();

        let digest = digest_file(&path).await.unwrap();
        assert_eq!(
            digest.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn test_same_bytes_same_digest_regardless_of_name() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..300_000u32).map(|i| (i * 7 % 256) as u8).collect();
        let a = dir.path().join("first.mp3");
        let b = dir.path().join("other-name.wav");
        std::fs::write(&a, &data).unwrap();
        std::fs::write(&b, &data).unwrap();

        let da = digest_file(&a).await.unwrap();
        let db = digest_file(&b).await.unwrap();

        assert_eq!(da, db);
        assert_eq!(da, ContentDigest::of_bytes(&data));
        assert_eq!(da.as_str().len(), ContentDigest::HEX_LEN);
        assert!(da.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn test_missing_file_is_digest_error() {
        let dir = TempDir::new().unwrap();
        let result = digest_file(&dir.path().join("gone")).await;
        assert!(matches!(result, Err(UploadError::Digest { .. })));
    }
}
