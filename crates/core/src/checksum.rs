//! SHA-1 digests used for dump integrity checks.

use sha1::{Digest, Sha1};

/// Length of a SHA-1 digest in bytes.
pub const SHA1_DIGEST_LEN: usize = 20;

/// Raw SHA-1 digest.
pub type Sha1Digest = [u8; SHA1_DIGEST_LEN];

/// Compute the SHA-1 digest of `data`.
pub fn sha1_digest(data: &[u8]) -> Sha1Digest {
    let mut out = [0u8; SHA1_DIGEST_LEN];
    out.copy_from_slice(&Sha1::digest(data));
    out
}

/// Lowercase hex rendering of a digest, for error messages and reports.
pub fn digest_hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
