use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use std::fmt;

use crate::digest::Digest;
use crate::error::HashError;

/// Digest algorithms the ledger can pin for an epoch.
///
/// A ledger records one algorithm per epoch in every entry's
/// `hash_algorithm` field. Switching algorithms requires a new epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    Blake3,
}

/// Static parameters of a registered algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlgorithmSpec {
    pub algorithm: HashAlgorithm,
    pub id: &'static str,
    pub digest_len: usize,
    pub security_level: u8,
}

/// Compile-time algorithm registry. Identifiers are stable and lowercase.
pub const REGISTRY: &[AlgorithmSpec] = &[
    AlgorithmSpec {
        algorithm: HashAlgorithm::Sha256,
        id: "sha256",
        digest_len: 32,
        security_level: 1,
    },
    AlgorithmSpec {
        algorithm: HashAlgorithm::Sha512,
        id: "sha512",
        digest_len: 64,
        security_level: 2,
    },
    AlgorithmSpec {
        algorithm: HashAlgorithm::Blake3,
        id: "blake3",
        digest_len: 32,
        security_level: 2,
    },
];

impl HashAlgorithm {
    pub const DEFAULT: HashAlgorithm = HashAlgorithm::Sha256;

    /// Resolve a registry identifier (case-insensitive).
    pub fn from_id(id: &str) -> Result<Self, HashError> {
        let wanted = id.trim().to_ascii_lowercase();
        REGISTRY
            .iter()
            .find(|spec| spec.id == wanted)
            .map(|spec| spec.algorithm)
            .ok_or_else(|| HashError::UnsupportedAlgorithm { id: id.to_string() })
    }

    pub fn spec(&self) -> &'static AlgorithmSpec {
        match self {
            Self::Sha256 => &REGISTRY[0],
            Self::Sha512 => &REGISTRY[1],
            Self::Blake3 => &REGISTRY[2],
        }
    }

    pub fn id(&self) -> &'static str {
        self.spec().id
    }

    pub fn digest_len(&self) -> usize {
        self.spec().digest_len
    }

    pub fn streaming(&self) -> StreamingHasher {
        StreamingHasher::new(*self)
    }

    /// Plain digest of `data`, with no canonicalization or domain tag.
    pub fn digest(&self, data: &[u8]) -> Digest {
        let mut hasher = self.streaming();
        hasher.update(data);
        hasher.finalize()
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s)
    }
}

/// Incremental hasher over any registered algorithm.
pub enum StreamingHasher {
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
    Blake3(Box<blake3::Hasher>),
}

impl StreamingHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Sha512 => Self::Sha512(sha2::Sha512::new()),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    pub fn finalize(self) -> Digest {
        match self {
            Self::Sha256(h) => Digest::from_bytes(h.finalize().to_vec()),
            Self::Sha512(h) => Digest::from_bytes(h.finalize().to_vec()),
            Self::Blake3(h) => Digest::from_bytes(h.finalize().as_bytes().to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_ids() {
        assert_eq!(HashAlgorithm::from_id("sha256").unwrap(), HashAlgorithm::Sha256);
        assert_eq!(HashAlgorithm::from_id("SHA512").unwrap(), HashAlgorithm::Sha512);
        assert_eq!(HashAlgorithm::from_id(" blake3 ").unwrap(), HashAlgorithm::Blake3);
    }

    #[test]
    fn unknown_id_is_unsupported() {
        let err = HashAlgorithm::from_id("argon2id").unwrap_err();
        assert_eq!(
            err,
            HashError::UnsupportedAlgorithm {
                id: "argon2id".into()
            }
        );
    }

    #[test]
    fn registry_matches_spec_lookup() {
        for spec in REGISTRY {
            assert_eq!(spec.algorithm.spec(), spec);
            assert_eq!(spec.algorithm.digest(b"x").len(), spec.digest_len);
        }
    }

    #[test]
    fn sha256_known_vector() {
        let d = HashAlgorithm::Sha256.digest(b"abc");
        assert_eq!(
            d.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn streaming_equals_one_shot() {
        let mut h = HashAlgorithm::Blake3.streaming();
        h.update(b"hello ");
        h.update(b"world");
        assert_eq!(h.finalize(), HashAlgorithm::Blake3.digest(b"hello world"));
    }

    #[test]
    fn serde_uses_registry_ids() {
        assert_eq!(
            serde_json::to_string(&HashAlgorithm::Sha512).unwrap(),
            "\"sha512\""
        );
    }
}
