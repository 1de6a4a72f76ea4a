//! Change detection between a source file and its destination copy
//!
//! The comparison is cheap-first: a missing destination or a size mismatch
//! decides immediately; only equal-sized pairs are hashed. Hashing streams
//! both files through SHA-256 in fixed-size chunks.
//!
//! Any failure to read either file counts as "changed". Re-copying a file
//! that turns out to be identical is harmless; skipping one that diverged is
//! not.

use std::io::ErrorKind;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Read buffer size used while hashing.
const CHUNK_SIZE: usize = 64 * 1024;

/// Why a file pair was judged changed or unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Destination does not exist yet.
    Missing,
    /// Byte lengths differ.
    SizeDiffers,
    /// Same length, different digests.
    ContentDiffers,
    /// A stat or digest failed; treated as changed.
    Unverifiable,
    /// Same length and same digest.
    Unchanged,
}

impl Comparison {
    /// Returns true unless the pair is known to be identical.
    pub fn is_changed(self) -> bool {
        !matches!(self, Comparison::Unchanged)
    }
}

/// Computes the lower-case hex SHA-256 digest of a file.
///
/// # Errors
/// Returns the underlying I/O error if the file cannot be opened or read.
pub async fn file_digest(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Compares `source` against `dest` and reports why they differ, if at all.
pub async fn compare(source: &Path, dest: &Path) -> Comparison {
    let dest_len = match tokio::fs::metadata(dest).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => return Comparison::Missing,
        Err(e) => {
            warn!(path = %dest.display(), error = %e, "Cannot stat destination, treating as changed");
            return Comparison::Unverifiable;
        }
    };

    let source_len = match tokio::fs::metadata(source).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!(path = %source.display(), error = %e, "Cannot stat source, treating as changed");
            return Comparison::Unverifiable;
        }
    };

    if source_len != dest_len {
        debug!(source_len, dest_len, path = %source.display(), "Size differs");
        return Comparison::SizeDiffers;
    }

    let (source_digest, dest_digest) = match (file_digest(source).await, file_digest(dest).await)
    {
        (Ok(s), Ok(d)) => (s, d),
        (Err(e), _) | (_, Err(e)) => {
            warn!(
                source = %source.display(),
                dest = %dest.display(),
                error = %e,
                "Digest failed, treating as changed"
            );
            return Comparison::Unverifiable;
        }
    };

    if source_digest == dest_digest {
        Comparison::Unchanged
    } else {
        Comparison::ContentDiffers
    }
}

/// Returns whether `source` needs to be copied over `dest`.
pub async fn has_changed(source: &Path, dest: &Path) -> bool {
    compare(source, dest).await.is_changed()
}
