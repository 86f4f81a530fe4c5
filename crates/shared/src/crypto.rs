//! Digest helpers for secrets that are stored hashed (security keys).

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Checks a plaintext candidate against a stored hex digest in constant time.
///
/// Malformed stored digests never match.
pub fn digest_matches(candidate: &str, stored_hex: &str) -> bool {
    let Ok(stored) = hex::decode(stored_hex) else {
        return false;
    };
    let computed = Sha256::digest(candidate.as_bytes());
    computed.as_slice().ct_eq(stored.as_slice()).into()
}

/// Constant-time equality for short secrets such as one-time codes.
pub fn secrets_equal(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
