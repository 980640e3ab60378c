//! Cryptographic hashing for APT repository index files.

use serde::{Deserialize, Serialize};
use sha1::Digest as _;
use std::fmt;

/// The hash algorithms listed in a top-level Release file, in the order the
/// blocks are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// MD5 hash algorithm.
    Md5,
    /// SHA-1 hash algorithm.
    Sha1,
    /// SHA-256 hash algorithm.
    Sha256,
}

impl HashAlgorithm {
    /// Get the block header used in Release files.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5Sum",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
        }
    }

    /// All algorithms, in Release block order.
    pub fn all() -> &'static [HashAlgorithm] {
        &[
            HashAlgorithm::Md5,
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
        ]
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The digests and size of one artifact, computed once and queried per
/// algorithm when the Release blocks are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDigests {
    /// MD5 digest, hex-encoded.
    pub md5: String,
    /// SHA-1 digest, hex-encoded.
    pub sha1: String,
    /// SHA-256 digest, hex-encoded.
    pub sha256: String,
    /// Size of the content in bytes.
    pub size: u64,
}

impl ContentDigests {
    /// Compute all digests of the given content.
    pub fn of(data: &[u8]) -> Self {
        Self {
            md5: format!("{:x}", md5::compute(data)),
            sha1: hex::encode(sha1::Sha1::digest(data)),
            sha256: hex::encode(sha2::Sha256::digest(data)),
            size: data.len() as u64,
        }
    }

    /// Get the digest for one algorithm.
    pub fn get(&self, algorithm: HashAlgorithm) -> &str {
        match algorithm {
            HashAlgorithm::Md5 => &self.md5,
            HashAlgorithm::Sha1 => &self.sha1,
            HashAlgorithm::Sha256 => &self.sha256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_algorithm_str() {
        assert_eq!(HashAlgorithm::Md5.as_str(), "MD5Sum");
        assert_eq!(HashAlgorithm::Sha1.as_str(), "SHA1");
        assert_eq!(HashAlgorithm::Sha256.as_str(), "SHA256");
    }

    #[test]
    fn test_digests_of_known_content() {
        let digests = ContentDigests::of(b"foo");
        assert_eq!(digests.md5, "acbd18db4cc2f85cedef654fccc4a4d8");
        assert_eq!(digests.sha1, "0beec7b5ea3f0fdbc95d0dd47f3c5bc275da8a33");
        assert_eq!(
            digests.sha256,
            "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae"
        );
        assert_eq!(digests.size, 3);
    }

    #[test]
    fn test_get_by_algorithm() {
        let digests = ContentDigests::of(b"bar");
        for algorithm in HashAlgorithm::all() {
            assert!(!digests.get(*algorithm).is_empty());
        }
        assert_eq!(
            digests.get(HashAlgorithm::Md5),
            "37b51d194a7513e45b56f6524f2d51f2"
        );
    }
}
