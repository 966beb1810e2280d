use chrono::{DateTime, Duration, Utc};
use csr_hasher::Digest;
use csr_types::{ArtifactId, EntryStatus, Signature, SignerId, StagingArtifact};
use csr_verifier::ManifestVerifier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::QuorumError;

/// Ratification parameters, fixed per ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuorumPolicy {
    pub threshold: usize,
    /// Staged artifacts older than this are dropped. `None` keeps them forever.
    pub staging_ttl: Option<Duration>,
}

/// Attestation tally for one staged artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumState {
    pub artifact_id: ArtifactId,
    pub version_hash: Digest,
    /// Authorized signers with a valid signature. These count.
    pub counted: BTreeSet<SignerId>,
    /// Registered but unauthorized signers. Recorded, never counted.
    pub uncounted: BTreeSet<SignerId>,
    /// Signer ids with no registered key. Kept for audit only.
    pub unrecognized: BTreeSet<SignerId>,
    pub threshold: usize,
}

impl QuorumState {
    pub fn is_ratified(&self) -> bool {
        self.counted.len() >= self.threshold
    }

    pub fn remaining(&self) -> usize {
        self.threshold.saturating_sub(self.counted.len())
    }
}

struct Staged {
    artifact: StagingArtifact,
    unrecognized: BTreeMap<SignerId, Signature>,
}

impl Staged {
    /// Refuse a second attestation from `signer`: identical bytes are a
    /// duplicate, different bytes a conflict.
    fn check_repeat(
        &self,
        artifact_id: ArtifactId,
        signer: &SignerId,
        signature: &Signature,
    ) -> Result<(), QuorumError> {
        let prior = self
            .artifact
            .entry
            .quorum_attestation
            .get(signer)
            .or_else(|| self.unrecognized.get(signer));
        match prior {
            None => Ok(()),
            Some(prior) if prior == signature => {
                tracing::warn!(artifact_id = %artifact_id, %signer, "duplicate attestation ignored");
                Err(QuorumError::DuplicateAttestation {
                    artifact: artifact_id,
                    signer: signer.clone(),
                })
            }
            Some(_) => {
                tracing::warn!(artifact_id = %artifact_id, %signer, "conflicting attestation refused");
                Err(QuorumError::ConflictingAttestation {
                    artifact: artifact_id,
                    signer: signer.clone(),
                })
            }
        }
    }
}

/// Collects attestations for staged artifacts and decides ratification.
///
/// Each artifact is tracked independently: cancelling or expiring one
/// never affects another, and nothing here touches committed history.
pub struct QuorumGate {
    policy: QuorumPolicy,
    verifier: ManifestVerifier,
    staged: Mutex<HashMap<ArtifactId, Staged>>,
}

impl QuorumGate {
    pub fn new(policy: QuorumPolicy, verifier: ManifestVerifier) -> Result<Self, QuorumError> {
        let authorized = verifier.registry().authorized_count();
        if policy.threshold == 0 || policy.threshold > authorized {
            return Err(QuorumError::InvalidThreshold {
                threshold: policy.threshold,
                authorized,
            });
        }
        Ok(Self {
            policy,
            verifier,
            staged: Mutex::new(HashMap::new()),
        })
    }

    pub fn policy(&self) -> &QuorumPolicy {
        &self.policy
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ArtifactId, Staged>> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit a validated artifact. Moves it to `QUORUM_PENDING`.
    pub fn stage(&self, mut artifact: StagingArtifact) -> Result<QuorumState, QuorumError> {
        let id = artifact.artifact_id;
        let mut staged = self.lock();
        if staged.contains_key(&id) {
            return Err(QuorumError::AlreadyStaged(id));
        }
        artifact.entry.transition(EntryStatus::QuorumPending)?;
        tracing::info!(
            artifact_id = %id,
            version_hash = %artifact.version_hash().short(),
            threshold = self.policy.threshold,
            "artifact staged"
        );
        let entry = Staged {
            artifact,
            unrecognized: BTreeMap::new(),
        };
        let state = self.tally(id, &entry);
        staged.insert(id, entry);
        Ok(state)
    }

    /// Record one signer's attestation over the artifact's frozen hash.
    ///
    /// Signatures are checked against the registry before they are recorded.
    /// A signer attests once; a repeat leaves the first signature in place.
    /// Reaching the threshold moves the artifact to `RATIFIED`.
    pub fn register_attestation(
        &self,
        artifact_id: ArtifactId,
        signer: SignerId,
        signature: Signature,
    ) -> Result<QuorumState, QuorumError> {
        let version_hash = self.live_hash(artifact_id, &signer, &signature)?;
        let registered = self.verifier.registry().get(&signer).is_some();
        if registered {
            self.verifier
                .check_signature(&version_hash, &signer, &signature)
                .map_err(|_| {
                    tracing::warn!(artifact_id = %artifact_id, %signer, "invalid attestation");
                    QuorumError::SignatureInvalid {
                        artifact: artifact_id,
                        signer: signer.clone(),
                    }
                })?;
        }

        let mut staged = self.lock();
        let entry = staged
            .get_mut(&artifact_id)
            .ok_or(QuorumError::UnknownArtifact(artifact_id))?;
        entry.check_repeat(artifact_id, &signer, &signature)?;

        if !registered {
            tracing::warn!(artifact_id = %artifact_id, %signer, "attestation from unregistered signer recorded for audit");
            entry.unrecognized.insert(signer, signature);
        } else {
            if !self.verifier.registry().is_authorized(&signer) {
                tracing::warn!(artifact_id = %artifact_id, %signer, "unauthorized signer does not count toward quorum");
            }
            entry.artifact.entry.attach(signer, signature);
        }

        let state = self.tally(artifact_id, entry);
        if state.is_ratified() && entry.artifact.status() == EntryStatus::QuorumPending {
            entry.artifact.entry.transition(EntryStatus::Ratified)?;
            tracing::info!(
                artifact_id = %artifact_id,
                version_hash = %state.version_hash.short(),
                signers = state.counted.len(),
                "artifact ratified"
            );
        }
        Ok(state)
    }

    pub fn is_ratified(&self, artifact_id: ArtifactId) -> bool {
        self.lock()
            .get(&artifact_id)
            .is_some_and(|s| s.artifact.status() == EntryStatus::Ratified)
    }

    pub fn state(&self, artifact_id: ArtifactId) -> Option<QuorumState> {
        let staged = self.lock();
        staged.get(&artifact_id).map(|s| self.tally(artifact_id, s))
    }

    /// Snapshot of a staged artifact, attestations included.
    pub fn get(&self, artifact_id: ArtifactId) -> Option<StagingArtifact> {
        self.lock().get(&artifact_id).map(|s| s.artifact.clone())
    }

    pub fn staged_ids(&self) -> Vec<ArtifactId> {
        self.lock().keys().copied().collect()
    }

    /// Release a ratified artifact for commit. Below threshold the artifact
    /// stays staged and `QuorumNotMet` is returned.
    pub fn take_ratified(&self, artifact_id: ArtifactId) -> Result<StagingArtifact, QuorumError> {
        let mut staged = self.lock();
        let entry = staged
            .get(&artifact_id)
            .ok_or(QuorumError::UnknownArtifact(artifact_id))?;
        if entry.artifact.status() != EntryStatus::Ratified {
            let state = self.tally(artifact_id, entry);
            return Err(QuorumError::QuorumNotMet {
                have: state.counted.len(),
                need: state.threshold,
            });
        }
        staged
            .remove(&artifact_id)
            .map(|s| s.artifact)
            .ok_or(QuorumError::UnknownArtifact(artifact_id))
    }

    /// Withdraw an artifact from staging.
    pub fn cancel(&self, artifact_id: ArtifactId) -> Result<StagingArtifact, QuorumError> {
        let removed = self
            .lock()
            .remove(&artifact_id)
            .ok_or(QuorumError::UnknownArtifact(artifact_id))?;
        tracing::info!(artifact_id = %artifact_id, "staged artifact cancelled");
        Ok(removed.artifact)
    }

    /// Drop every artifact older than the staging TTL, as of `now`.
    pub fn expire(&self, now: DateTime<Utc>) -> Vec<ArtifactId> {
        let Some(ttl) = self.policy.staging_ttl else {
            return Vec::new();
        };
        let mut staged = self.lock();
        let expired: Vec<ArtifactId> = staged
            .iter()
            .filter(|(_, s)| s.artifact.is_expired(ttl, now))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            staged.remove(id);
            tracing::warn!(artifact_id = %id, "staged artifact expired before reaching quorum");
        }
        expired
    }

    /// Hash of a staged, unexpired artifact that `signer` has not yet attested.
    fn live_hash(
        &self,
        artifact_id: ArtifactId,
        signer: &SignerId,
        signature: &Signature,
    ) -> Result<Digest, QuorumError> {
        let mut staged = self.lock();
        let entry = staged
            .get(&artifact_id)
            .ok_or(QuorumError::UnknownArtifact(artifact_id))?;
        if let Some(ttl) = self.policy.staging_ttl {
            if entry.artifact.is_expired(ttl, Utc::now()) {
                staged.remove(&artifact_id);
                tracing::warn!(artifact_id = %artifact_id, "attestation arrived after staging expiry");
                return Err(QuorumError::UnknownArtifact(artifact_id));
            }
        }
        entry.check_repeat(artifact_id, signer, signature)?;
        Ok(entry.artifact.version_hash().clone())
    }

    fn tally(&self, artifact_id: ArtifactId, staged: &Staged) -> QuorumState {
        let registry = self.verifier.registry();
        let (counted, uncounted): (BTreeSet<SignerId>, BTreeSet<SignerId>) = staged
            .artifact
            .entry
            .quorum_attestation
            .keys()
            .cloned()
            .partition(|signer| registry.is_authorized(signer));
        QuorumState {
            artifact_id,
            version_hash: staged.artifact.version_hash().clone(),
            counted,
            uncounted,
            unrecognized: staged.unrecognized.keys().cloned().collect(),
            threshold: self.policy.threshold,
        }
    }
}

impl std::fmt::Debug for QuorumGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuorumGate")
            .field("policy", &self.policy)
            .field("staged", &self.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csr_crypto::{Ed25519Signer, SignerRegistry, SigningService};
    use csr_hasher::{HashAlgorithm, HashPolicy};
    use csr_types::{CsrEntry, EntryContent};
    use ed25519_dalek::SigningKey;
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        signers: Vec<Ed25519Signer>,
        gate: QuorumGate,
    }

    fn fixture(ttl: Option<Duration>) -> Fixture {
        let signers: Vec<_> = ["alice", "bob", "carol", "eve"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                Ed25519Signer::new(SignerId::new(*id), SigningKey::from_bytes(&[i as u8 + 10; 32]))
            })
            .collect();
        let mut registry = SignerRegistry::new();
        for s in &signers {
            let authorized = s.signer_id().as_str() != "eve";
            registry
                .register(s.signer_id().clone(), s.public_key(), authorized)
                .unwrap();
        }
        let verifier = ManifestVerifier::new(HashPolicy::default(), Arc::new(registry));
        let gate = QuorumGate::new(
            QuorumPolicy {
                threshold: 2,
                staging_ttl: ttl,
            },
            verifier,
        )
        .unwrap();
        Fixture { signers, gate }
    }

    fn validated_artifact() -> StagingArtifact {
        let content = EntryContent::genesis(
            json!({"mode": "LOCKED_DOWN"}),
            SignerId::new("alice"),
            HashAlgorithm::Sha256,
            0,
        );
        let mut entry = CsrEntry::seal(content, &HashPolicy::default()).unwrap();
        entry.transition(EntryStatus::Validating).unwrap();
        StagingArtifact::new(entry)
    }

    fn attest(f: &Fixture, id: ArtifactId, who: usize) -> Result<QuorumState, QuorumError> {
        let signer = &f.signers[who];
        let hash = f.gate.get(id).unwrap().version_hash().clone();
        f.gate
            .register_attestation(id, signer.signer_id().clone(), signer.sign(&hash))
    }

    #[test]
    fn two_of_three_ratifies() {
        let f = fixture(None);
        let id = f.gate.stage(validated_artifact()).unwrap().artifact_id;
        assert!(!attest(&f, id, 0).unwrap().is_ratified());
        assert!(!f.gate.is_ratified(id));
        let state = attest(&f, id, 1).unwrap();
        assert!(state.is_ratified());
        assert!(f.gate.is_ratified(id));
        let artifact = f.gate.take_ratified(id).unwrap();
        assert_eq!(artifact.status(), EntryStatus::Ratified);
        assert_eq!(artifact.entry.quorum_attestation.len(), 2);
        assert!(f.gate.get(id).is_none());
    }

    #[test]
    fn duplicate_attestations_count_once() {
        let f = fixture(None);
        let id = f.gate.stage(validated_artifact()).unwrap().artifact_id;
        attest(&f, id, 0).unwrap();
        let err = attest(&f, id, 0).unwrap_err();
        assert!(matches!(err, QuorumError::DuplicateAttestation { .. }));
        assert!(!err.is_fatal());
        assert_eq!(f.gate.state(id).unwrap().counted.len(), 1);
        assert_eq!(
            f.gate.take_ratified(id).unwrap_err(),
            QuorumError::QuorumNotMet { have: 1, need: 2 }
        );
        assert!(f.gate.get(id).is_some());
    }

    #[test]
    fn second_signature_from_same_signer_conflicts() {
        let f = fixture(None);
        let id = f.gate.stage(validated_artifact()).unwrap().artifact_id;
        attest(&f, id, 0).unwrap();
        let first = f.gate.get(id).unwrap().entry.quorum_attestation[&SignerId::new("alice")].clone();

        let other = Signature::from_bytes(vec![7; 64]);
        let err = f
            .gate
            .register_attestation(id, SignerId::new("alice"), other)
            .unwrap_err();
        assert_eq!(
            err,
            QuorumError::ConflictingAttestation {
                artifact: id,
                signer: SignerId::new("alice"),
            }
        );
        assert!(!err.is_fatal());
        let kept = f.gate.get(id).unwrap().entry.quorum_attestation[&SignerId::new("alice")].clone();
        assert_eq!(kept, first);

        let stranger = Ed25519Signer::generate(SignerId::new("stranger"));
        let hash = f.gate.get(id).unwrap().version_hash().clone();
        f.gate
            .register_attestation(id, stranger.signer_id().clone(), stranger.sign(&hash))
            .unwrap();
        assert!(matches!(
            f.gate
                .register_attestation(id, stranger.signer_id().clone(), stranger.sign(&hash))
                .unwrap_err(),
            QuorumError::DuplicateAttestation { .. }
        ));
        assert!(matches!(
            f.gate
                .register_attestation(id, stranger.signer_id().clone(), Signature::from_bytes(vec![1; 64]))
                .unwrap_err(),
            QuorumError::ConflictingAttestation { .. }
        ));
    }

    #[test]
    fn unauthorized_and_unregistered_never_count() {
        let f = fixture(None);
        let id = f.gate.stage(validated_artifact()).unwrap().artifact_id;
        attest(&f, id, 0).unwrap();
        let state = attest(&f, id, 3).unwrap();
        assert!(state.uncounted.contains(&SignerId::new("eve")));
        assert!(!state.is_ratified());

        let stranger = Ed25519Signer::generate(SignerId::new("stranger"));
        let hash = f.gate.get(id).unwrap().version_hash().clone();
        let state = f
            .gate
            .register_attestation(id, stranger.signer_id().clone(), stranger.sign(&hash))
            .unwrap();
        assert!(state.unrecognized.contains(&SignerId::new("stranger")));
        assert_eq!(state.counted.len(), 1);
        assert!(!f.gate.is_ratified(id));
    }

    #[test]
    fn forged_attestation_is_refused() {
        let f = fixture(None);
        let id = f.gate.stage(validated_artifact()).unwrap().artifact_id;
        let bad = f.signers[0].sign(&HashAlgorithm::Sha256.digest(b"other"));
        let err = f
            .gate
            .register_attestation(id, SignerId::new("alice"), bad)
            .unwrap_err();
        assert!(matches!(err, QuorumError::SignatureInvalid { .. }));
        assert!(f.gate.state(id).unwrap().counted.is_empty());
    }

    #[test]
    fn unknown_and_cancelled_artifacts() {
        let f = fixture(None);
        let stray = ArtifactId::new();
        assert_eq!(
            f.gate
                .register_attestation(stray, SignerId::new("alice"), Signature::from_bytes(vec![0; 64]))
                .unwrap_err(),
            QuorumError::UnknownArtifact(stray)
        );
        let id = f.gate.stage(validated_artifact()).unwrap().artifact_id;
        f.gate.cancel(id).unwrap();
        assert!(f.gate.state(id).is_none());
        assert_eq!(f.gate.cancel(id).unwrap_err(), QuorumError::UnknownArtifact(id));
    }

    #[test]
    fn staging_requires_validation_first() {
        let f = fixture(None);
        let content = EntryContent::genesis(json!({}), SignerId::new("a"), HashAlgorithm::Sha256, 0);
        let unvalidated = StagingArtifact::new(CsrEntry::seal(content, &HashPolicy::default()).unwrap());
        assert!(matches!(
            f.gate.stage(unvalidated),
            Err(QuorumError::Lifecycle(_))
        ));
    }

    #[test]
    fn expiry_drops_only_old_artifacts() {
        let f = fixture(Some(Duration::seconds(60)));
        let old = f.gate.stage(validated_artifact()).unwrap().artifact_id;
        let staged_at = f.gate.get(old).unwrap().staged_at;
        let expired = f.gate.expire(staged_at + Duration::seconds(61));
        assert_eq!(expired, vec![old]);
        assert!(f.gate.get(old).is_none());

        let fresh = f.gate.stage(validated_artifact()).unwrap().artifact_id;
        assert!(f.gate.expire(Utc::now()).is_empty());
        assert!(f.gate.get(fresh).is_some());
    }

    #[test]
    fn threshold_must_be_satisfiable() {
        let registry = SignerRegistry::new();
        let verifier = ManifestVerifier::new(HashPolicy::default(), Arc::new(registry));
        let err = QuorumGate::new(
            QuorumPolicy {
                threshold: 1,
                staging_ttl: None,
            },
            verifier,
        )
        .unwrap_err();
        assert_eq!(
            err,
            QuorumError::InvalidThreshold {
                threshold: 1,
                authorized: 0
            }
        );
    }
}
