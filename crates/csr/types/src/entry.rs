use chrono::{DateTime, Utc};
use csr_hasher::{to_canonical_value, CanonicalHasher, Digest, FieldPath, HashAlgorithm, HashError, HashPolicy};
use csr_patch::{diff, Patch, Pointer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::ids::{Signature, SignerId};
use crate::status::{EntryStatus, LifecycleError};

/// Reference to a bundled file that belongs to an entry (policy document,
/// schema, key list). The checksum is a plain digest of the file bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubArtifactRef {
    pub name: String,
    pub path: String,
    pub checksum: Digest,
    pub algorithm: HashAlgorithm,
}

/// The hashed part of an entry.
///
/// `version_hash` covers exactly these fields. Attestations and lifecycle
/// status live outside so signing and status changes never move the hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryContent {
    pub parent_hash: Option<Digest>,
    pub sequence: u64,
    pub payload: Value,
    pub forward: Patch,
    pub inverse: Patch,
    #[serde(default)]
    pub sub_artifacts: Vec<SubArtifactRef>,
    pub proposer: SignerId,
    pub proposed_at: DateTime<Utc>,
    pub hash_algorithm: HashAlgorithm,
    pub epoch: u32,
}

impl EntryContent {
    /// First entry of a chain. Its diff pair runs between `{}` and `payload`
    /// so history replays uniformly from the empty mapping.
    pub fn genesis(
        payload: Value,
        proposer: SignerId,
        hash_algorithm: HashAlgorithm,
        epoch: u32,
    ) -> Self {
        let pair = diff(&Value::Object(Map::new()), &payload);
        Self {
            parent_hash: None,
            sequence: 0,
            payload,
            forward: pair.forward,
            inverse: pair.inverse,
            sub_artifacts: Vec::new(),
            proposer,
            proposed_at: Utc::now(),
            hash_algorithm,
            epoch,
        }
    }

    /// Content that supersedes `parent`, inheriting its algorithm and epoch.
    pub fn successor(parent: &CsrEntry, payload: Value, proposer: SignerId) -> Self {
        let pair = diff(&parent.content.payload, &payload);
        Self {
            parent_hash: Some(parent.version_hash.clone()),
            sequence: parent.content.sequence + 1,
            payload,
            forward: pair.forward,
            inverse: pair.inverse,
            sub_artifacts: Vec::new(),
            proposer,
            proposed_at: Utc::now(),
            hash_algorithm: parent.content.hash_algorithm,
            epoch: parent.content.epoch,
        }
    }

    pub fn with_sub_artifacts(mut self, sub_artifacts: Vec<SubArtifactRef>) -> Self {
        self.sub_artifacts = sub_artifacts;
        self
    }

    pub fn is_genesis(&self) -> bool {
        self.parent_hash.is_none()
    }

    /// Canonical form that is actually hashed: excluded fields are removed
    /// from the payload and from any diff operation that reaches them.
    pub fn hashing_view(&self, policy: &HashPolicy) -> Result<Value, HashError> {
        let mut view = to_canonical_value(self)?;
        if policy.is_empty() {
            return Ok(view);
        }
        if let Value::Object(map) = &mut view {
            map.insert("payload".into(), policy.strip(&self.payload).into_owned());
            map.insert("forward".into(), strip_patch(policy, &self.forward)?);
            map.insert("inverse".into(), strip_patch(policy, &self.inverse)?);
        }
        Ok(view)
    }

    /// `version_hash` of this content under its own `hash_algorithm`.
    pub fn compute_version_hash(&self, policy: &HashPolicy) -> Result<Digest, HashError> {
        let view = self.hashing_view(policy)?;
        CanonicalHasher::new(self.hash_algorithm).digest_canonical(&view)
    }
}

fn strip_patch(policy: &HashPolicy, patch: &Patch) -> Result<Value, HashError> {
    let mut ops = Vec::with_capacity(patch.len());
    'ops: for op in patch {
        let mut encoded = to_canonical_value(op)?;
        if let Ok(target) = Pointer::parse(op.path()) {
            let tokens = target.tokens();
            for field in &policy.excluded_fields {
                let segments = field.segments();
                if tokens.starts_with(segments) {
                    continue 'ops;
                }
                let Some(rest) = segments.strip_prefix(tokens) else {
                    continue;
                };
                let Some(inner) = FieldPath::parse(&rest.join(".")) else {
                    continue;
                };
                if let Some(value) = encoded.get_mut("value") {
                    *value = HashPolicy::new(vec![inner]).strip(value).into_owned();
                }
            }
        }
        ops.push(encoded);
    }
    Ok(Value::Array(ops))
}

/// One Configuration State Root: a sealed entry plus its attestations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CsrEntry {
    pub version_hash: Digest,
    #[serde(flatten)]
    pub content: EntryContent,
    #[serde(default)]
    pub quorum_attestation: BTreeMap<SignerId, Signature>,
    pub status: EntryStatus,
}

impl CsrEntry {
    /// Freeze `content` under its content address. Starts as `PROPOSED`.
    pub fn seal(content: EntryContent, policy: &HashPolicy) -> Result<Self, HashError> {
        let version_hash = content.compute_version_hash(policy)?;
        Ok(Self {
            version_hash,
            content,
            quorum_attestation: BTreeMap::new(),
            status: EntryStatus::Proposed,
        })
    }

    pub fn parent_hash(&self) -> Option<&Digest> {
        self.content.parent_hash.as_ref()
    }

    pub fn sequence(&self) -> u64 {
        self.content.sequence
    }

    pub fn payload(&self) -> &Value {
        &self.content.payload
    }

    pub fn is_genesis(&self) -> bool {
        self.content.is_genesis()
    }

    pub fn recompute_hash(&self, policy: &HashPolicy) -> Result<Digest, HashError> {
        self.content.compute_version_hash(policy)
    }

    pub fn transition(&mut self, next: EntryStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record a signature. A repeat from the same signer replaces the old one.
    pub fn attach(&mut self, signer: SignerId, signature: Signature) -> Option<Signature> {
        self.quorum_attestation.insert(signer, signature)
    }

    pub fn candidate(&self) -> CandidateEntry<'_> {
        CandidateEntry {
            version_hash: &self.version_hash,
            content: &self.content,
            attestations: &self.quorum_attestation,
        }
    }
}

/// Borrowed view of everything the manifest verifier inspects.
#[derive(Clone, Copy, Debug)]
pub struct CandidateEntry<'a> {
    pub version_hash: &'a Digest,
    pub content: &'a EntryContent,
    pub attestations: &'a BTreeMap<SignerId, Signature>,
}
