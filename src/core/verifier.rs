//! Content hashing for copy verification.
//!
//! Files are hashed with BLAKE3, streamed in fixed-size chunks so large files
//! are never buffered whole.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Chunk size used when streaming a file through the hasher.
pub const HASH_CHUNK_SIZE: usize = 128 * 1024;

pub type Digest = blake3::Hash;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("failed to read {path} for hashing: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    pub fn io_error(&self) -> &std::io::Error {
        match self {
            Self::Io { source, .. } => source,
        }
    }
}

/// Hash a file, streaming in chunks to handle large files.
pub fn digest(path: &Path) -> Result<Digest, HashError> {
    let io_err = |source| HashError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut reader = BufReader::with_capacity(HASH_CHUNK_SIZE, file);
    let mut hasher = blake3::Hasher::new();

    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer).map_err(io_err)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize())
}

/// Returns true when `source` and `destination` hash to the same digest.
pub fn contents_match(source: &Path, destination: &Path) -> Result<bool, HashError> {
    Ok(digest(source)? == digest(destination)?)
}
