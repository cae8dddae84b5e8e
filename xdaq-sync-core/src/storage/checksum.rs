use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::models::error::SyncError;
use crate::models::report::RecordedFile;

/// Compute SHA-256 hex digest of a file, streaming its contents.
pub fn sha256_file(path: &Path) -> Result<String, SyncError> {
    let mut file = File::open(path)
        .map_err(|e| SyncError::Storage(format!("failed to open {} for checksum: {}", path.display(), e)))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| SyncError::Storage(format!("failed to read {} for checksum: {}", path.display(), e)))?;
    Ok(hex_encode(&hasher.finalize()))
}

/// Stat (and optionally hash) a recorded file.
///
/// A file that vanished or cannot be read is still reported, with size 0
/// and no checksum.
pub fn describe_file(path: &Path, with_checksum: bool) -> RecordedFile {
    let size_bytes = path.metadata().map(|m| m.len()).unwrap_or(0);
    let sha256 = if with_checksum {
        match sha256_file(path) {
            Ok(digest) => Some(digest),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    } else {
        None
    };

    RecordedFile {
        path: path.to_path_buf(),
        size_bytes,
        sha256,
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
