//! MD5 digests for manifest integrity checks.
//!
//! The feed service declares an MD5 per manifest entry; a downloaded
//! payload is persisted only when its digest matches.

use md5::{Digest, Md5};

/// Hex-encoded MD5 of a byte stream.
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Case-insensitive comparison against a declared hex digest.
pub fn matches(data: &[u8], declared: &str) -> bool {
    md5_hex(data).eq_ignore_ascii_case(declared.trim())
}
