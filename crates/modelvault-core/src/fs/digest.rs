//! Content digests for artifact files
//!
//! Whole-file BLAKE3 hashing with a bounded read buffer, so multi-gigabyte
//! artifacts never have to fit in memory.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read buffer size for hashing.
const CHUNK_SIZE: usize = 64 * 1024;

/// Digest and length of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Lowercase hex, 64 characters
    pub hex: String,
    pub size: u64,
}

/// Hash a file's content
///
/// # Example
/// ```no_run
/// use modelvault_core::fs::digest::hash_file;
/// use std::path::Path;
///
/// let digest = hash_file(Path::new("models/fraud_detection_model.pkl"))?;
/// assert_eq!(digest.hex.len(), 64);
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn hash_file(path: &Path) -> std::io::Result<FileDigest> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut size = 0u64;

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }

    Ok(FileDigest {
        hex: hasher.finalize().to_hex().to_string(),
        size,
    })
}
