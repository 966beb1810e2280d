use serde::Serialize;
use serde_json::Value;

use crate::algorithm::HashAlgorithm;
use crate::canonical::{canonical_bytes, to_canonical_value, DOMAIN_TAG};
use crate::digest::Digest;
use crate::error::HashError;
use crate::policy::HashPolicy;

/// Deterministic content hasher pinned to one algorithm and exclusion policy.
///
/// `digest = H(canonical_bytes(value) || 0x00 || DOMAIN_TAG)`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CanonicalHasher {
    algorithm: HashAlgorithm,
    policy: HashPolicy,
}

impl CanonicalHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            policy: HashPolicy::default(),
        }
    }

    /// Build a hasher from a registry identifier.
    pub fn from_id(id: &str) -> Result<Self, HashError> {
        Ok(Self::new(HashAlgorithm::from_id(id)?))
    }

    pub fn with_policy(mut self, policy: HashPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn policy(&self) -> &HashPolicy {
        &self.policy
    }

    /// Canonical hash of a payload after applying the exclusion policy.
    pub fn canonical_hash(&self, payload: &Value) -> Result<Digest, HashError> {
        let stripped = self.policy.strip(payload);
        self.digest_canonical(&stripped)
    }

    /// Canonical hash of any serializable value, exclusion policy applied.
    pub fn canonical_hash_of<T: Serialize + ?Sized>(&self, value: &T) -> Result<Digest, HashError> {
        let value = to_canonical_value(value)?;
        self.canonical_hash(&value)
    }

    /// Canonical hash with no exclusions. Callers that embed a payload in a
    /// larger structure strip the payload with [`HashPolicy::strip`] first.
    pub fn digest_canonical(&self, value: &Value) -> Result<Digest, HashError> {
        let bytes = canonical_bytes(value)?;
        let mut hasher = self.algorithm.streaming();
        hasher.update(&bytes);
        hasher.update(&[0u8]);
        hasher.update(DOMAIN_TAG);
        Ok(hasher.finalize())
    }

    /// Plain digest of raw bytes (sub-artifact checksums).
    pub fn hash_bytes(&self, data: &[u8]) -> Digest {
        self.algorithm.digest(data)
    }
}

/// Canonical hash under the default algorithm and an empty exclusion policy.
pub fn canonical_hash(payload: &Value) -> Result<Digest, HashError> {
    CanonicalHasher::default().canonical_hash(payload)
}
