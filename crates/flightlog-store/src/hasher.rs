//! Content digests for raw log files.
//!
//! The digest is the hex-encoded SHA-256 of the complete raw byte
//! stream. It is the deduplication key: two files with the same digest
//! are the same log, regardless of where they came from.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::Result;

const CHUNK_SIZE: usize = 8192;

/// Computes content digests over files or readers.
pub struct ContentHasher;

impl ContentHasher {
    /// Digest the file at `path`.
    pub fn digest_path(path: impl AsRef<Path>) -> Result<String> {
        let mut file = File::open(path)?;
        Self::digest_reader(&mut file)
    }

    /// Digest a seekable reader from its start.
    ///
    /// The reader is rewound first so a partially consumed handle still
    /// yields the digest of the whole stream. Its position afterwards is
    /// end-of-stream.
    pub fn digest_reader<R: Read + Seek>(reader: &mut R) -> Result<String> {
        reader.seek(SeekFrom::Start(0))?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}
