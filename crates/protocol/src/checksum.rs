//! Per-frame checksums and whole-file digests.
//!
//! The frame checksum guards against scan and render corruption only. It is
//! a truncated MD5 and offers no protection against deliberate tampering.

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::constants::CHECKSUM_WIDTH;

/// Computes the frame checksum of `text`: the first 4 bytes of its MD5,
/// as 8 uppercase hex characters.
pub fn checksum(text: &str) -> String {
    let digest = Md5::digest(text.as_bytes());
    hex::encode_upper(&digest[..CHECKSUM_WIDTH / 2])
}

/// Returns `true` if `expected` is the checksum of `text`.
///
/// Hex case is not significant.
pub fn verify_checksum(text: &str, expected: &str) -> bool {
    checksum(text).eq_ignore_ascii_case(expected)
}

/// Computes SHA-256 of `data` and returns the lowercase hex digest.
pub fn file_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
