//! Content addressing for stored outputs.
//!
//! Processed media is stored under the digest of its bytes so identical
//! outputs collapse to a single object.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Build the storage object name for `data`: `<sha256>.<extension>`.
///
/// A leading dot on `extension` is ignored; an empty extension yields the
/// bare digest.
pub fn content_name(data: &[u8], extension: &str) -> String {
    let digest = sha256_hex(data);
    match extension.trim_start_matches('.') {
        "" => digest,
        ext => format!("{digest}.{ext}"),
    }
}
