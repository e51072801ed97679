//! Streaming content fingerprints for artifact files
//!
//! Fingerprints are SHA-256 digests rendered as lowercase hex. Files are
//! hashed through a bounded buffer so arbitrarily large artifacts never have
//! to fit in memory.

use crate::error::{IrdpError, Result};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::Path;

/// Chunk size used when streaming file contents through the hasher.
pub const FINGERPRINT_BUFFER_SIZE: usize = 1024 * 1024; // 1 MiB

/// Compute the fingerprint of a file on disk.
pub fn fingerprint_file(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    fingerprint_reader(&mut file)
}

/// Compute the fingerprint of any readable byte stream.
pub fn fingerprint_reader<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; FINGERPRINT_BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Copy `source` to `dest` while computing the fingerprint of the bytes
/// written. Returns `(bytes_copied, fingerprint)`.
pub fn copy_with_fingerprint(
    source: impl AsRef<Path>,
    dest: impl AsRef<Path>,
) -> Result<(u64, String)> {
    let mut src = std::fs::File::open(source)?;
    let mut dst = std::fs::File::create(dest)?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; FINGERPRINT_BUFFER_SIZE];
    let mut total: u64 = 0;

    loop {
        let bytes_read = src.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        dst.write_all(&buffer[..bytes_read])?;
        total += bytes_read as u64;
    }

    dst.flush()?;
    Ok((total, hex::encode(hasher.finalize())))
}

/// Verify that a file's fingerprint matches an expected value.
pub fn verify_fingerprint(path: impl AsRef<Path>, expected: &str) -> Result<()> {
    let actual = fingerprint_file(path)?;
    if actual == expected {
        Ok(())
    } else {
        Err(IrdpError::FingerprintMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_fingerprint_reader() {
        let mut cursor = Cursor::new(b"hello world");
        let digest = fingerprint_reader(&mut cursor).unwrap();
        assert_eq!(digest, HELLO_SHA256);
    }

    #[test]
    fn test_fingerprint_file_matches_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.bin");
        std::fs::write(&path, b"hello world").unwrap();

        assert_eq!(fingerprint_file(&path).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_copy_with_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        std::fs::write(&src, b"hello world").unwrap();

        let (size, digest) = copy_with_fingerprint(&src, &dst).unwrap();
        assert_eq!(size, 11);
        assert_eq!(digest, HELLO_SHA256);
        assert_eq!(std::fs::read(&dst).unwrap(), b"hello world");
    }

    #[test]
    fn test_verify_fingerprint_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.bin");
        std::fs::write(&path, b"other content").unwrap();

        let err = verify_fingerprint(&path, HELLO_SHA256).unwrap_err();
        assert!(matches!(err, IrdpError::FingerprintMismatch { .. }));
    }
}
