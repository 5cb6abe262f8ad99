//! SHA-256 hashing helpers.

use sha2::{Digest, Sha256};

use crate::buf::Buf32;

/// Computes the SHA-256 hash of the input.
pub fn sha256(data: &[u8]) -> Buf32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Buf32::new(hasher.finalize().into())
}

/// Hashes the concatenation of two 32-byte values, used for interior Merkle
/// nodes.
pub fn hash_pair(left: &Buf32, right: &Buf32) -> Buf32 {
    let mut hasher = Sha256::new();
    hasher.update(left.as_slice());
    hasher.update(right.as_slice());
    Buf32::new(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string.
        let expected = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert_eq!(sha256(b"").to_string(), expected);
    }

    #[test]
    fn test_hash_pair_matches_concat() {
        let a = sha256(b"left");
        let b = sha256(b"right");
        let mut concat = Vec::new();
        concat.extend_from_slice(a.as_slice());
        concat.extend_from_slice(b.as_slice());
        assert_eq!(hash_pair(&a, &b), sha256(&concat));
    }
}
