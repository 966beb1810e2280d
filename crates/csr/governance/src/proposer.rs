use csr_crypto::SigningService;
use csr_hasher::Digest;
use csr_ledger::{LedgerError, LedgerStore};
use csr_patch::Patch;
use csr_quorum::{QuorumError, QuorumGate, QuorumState};
use csr_types::{
    ArtifactId, CsrEntry, EntryContent, EntryStatus, Signature, SignerId, StagingArtifact,
    SubArtifactRef,
};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::audit::{AuditTrail, RejectionStage};
use crate::error::GovernanceError;

/// Drives one proposer's artifacts through the pipeline:
///
/// ```text
/// propose ─► VALIDATING ─► stage ─► QUORUM_PENDING ─► attest* ─► RATIFIED ─► commit ─► COMMITTED
///                │                                                              │
///                └──────────────► REJECTED (audit trail) ◄──────────────────────┘
/// ```
///
/// Proposers share the ledger, the gate and the audit trail; each carries
/// its own identity.
#[derive(Clone, Debug)]
pub struct Proposer {
    identity: SignerId,
    ledger: Arc<LedgerStore>,
    gate: Arc<QuorumGate>,
    audit: Arc<AuditTrail>,
}

impl Proposer {
    pub fn new(
        identity: SignerId,
        ledger: Arc<LedgerStore>,
        gate: Arc<QuorumGate>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            identity,
            ledger,
            gate,
            audit,
        }
    }

    pub fn identity(&self) -> &SignerId {
        &self.identity
    }

    /// Propose `payload` as the next state. The diff pair is computed
    /// against the current head, or against `{}` on an empty ledger.
    pub fn propose(&self, payload: Value) -> Result<ArtifactId, GovernanceError> {
        self.propose_with(payload, Vec::new())
    }

    pub fn propose_with(
        &self,
        payload: Value,
        sub_artifacts: Vec<SubArtifactRef>,
    ) -> Result<ArtifactId, GovernanceError> {
        let entry = self.build(payload, sub_artifacts, self.identity.clone())?;
        self.submit(entry)
    }

    /// Propose `payload` as the successor of `parent` (`None` for genesis)
    /// rather than of the current head. Committing fails with a stale
    /// parent if the head has since moved past `parent`.
    pub fn propose_onto(
        &self,
        parent: Option<&Digest>,
        payload: Value,
    ) -> Result<ArtifactId, GovernanceError> {
        let base = match parent {
            Some(hash) => Some(
                self.ledger
                    .get_entry(hash)?
                    .ok_or_else(|| LedgerError::EntryNotFound(hash.clone()))?,
            ),
            None => None,
        };
        let entry = self.seal_onto(base.as_ref(), payload, Vec::new(), self.identity.clone())?;
        self.submit(entry)
    }

    /// Apply `patch` to the head state and propose the result.
    pub fn propose_patch(&self, patch: &Patch) -> Result<ArtifactId, GovernanceError> {
        let current = match self.ledger.fetch_latest()? {
            Some(head) => head.content.payload,
            None => Value::Object(Map::new()),
        };
        let next = patch.apply(&current)?;
        self.propose(next)
    }

    /// Validate a sealed `PROPOSED` entry and stage it for attestation.
    ///
    /// A content hash or sub-artifact failure rejects the entry here; it is
    /// recorded in the audit trail and never reaches the gate.
    pub fn submit(&self, mut entry: CsrEntry) -> Result<ArtifactId, GovernanceError> {
        entry.transition(EntryStatus::Validating)?;
        let mut artifact = StagingArtifact::new(entry);
        if let Err(e) = self.ledger.verifier().verify_integrity(artifact.candidate()) {
            artifact.entry.transition(EntryStatus::Rejected)?;
            self.audit.record(
                artifact.artifact_id,
                artifact.version_hash(),
                RejectionStage::Validation,
                e.to_string(),
            );
            return Err(e.into());
        }
        tracing::debug!(
            artifact_id = %artifact.artifact_id,
            version_hash = %artifact.version_hash().short(),
            sequence = artifact.entry.sequence(),
            forward_ops = artifact.entry.content.forward.len(),
            "artifact validated"
        );
        let state = self.gate.stage(artifact)?;
        Ok(state.artifact_id)
    }

    /// Sign the artifact's frozen hash with `signer` and register it.
    pub fn attest(
        &self,
        artifact_id: ArtifactId,
        signer: &dyn SigningService,
    ) -> Result<QuorumState, GovernanceError> {
        let artifact = self
            .gate
            .get(artifact_id)
            .ok_or(QuorumError::UnknownArtifact(artifact_id))?;
        let signature = signer.sign(artifact.version_hash());
        self.register(artifact_id, signer.signer_id().clone(), signature)
    }

    /// Register a signature produced elsewhere.
    pub fn register(
        &self,
        artifact_id: ArtifactId,
        signer: SignerId,
        signature: Signature,
    ) -> Result<QuorumState, GovernanceError> {
        Ok(self
            .gate
            .register_attestation(artifact_id, signer, signature)?)
    }

    /// Commit a ratified artifact against the parent it was diffed from.
    ///
    /// Below threshold the artifact stays staged and the quorum error is
    /// returned. Any ledger refusal marks it `REJECTED` and hands it back in
    /// [`GovernanceError::Rejected`]; on a stale parent the caller rebases.
    pub fn commit(&self, artifact_id: ArtifactId) -> Result<Digest, GovernanceError> {
        let mut artifact = self.gate.take_ratified(artifact_id)?;
        let parent = artifact.entry.parent_hash().cloned();
        match self.ledger.append(artifact.entry.clone(), parent.as_ref()) {
            Ok(hash) => Ok(hash),
            Err(source) => {
                artifact.entry.transition(EntryStatus::Rejected)?;
                self.audit.record(
                    artifact.artifact_id,
                    artifact.version_hash(),
                    RejectionStage::Commit,
                    source.to_string(),
                );
                Err(GovernanceError::Rejected {
                    artifact: Box::new(artifact),
                    source,
                })
            }
        }
    }

    /// Recompute `artifact`'s diff pair against the current head and stage
    /// the result as a new artifact. Attestations do not carry over.
    pub fn rebase(&self, artifact: &StagingArtifact) -> Result<ArtifactId, GovernanceError> {
        let content = &artifact.entry.content;
        let entry = self.build(
            content.payload.clone(),
            content.sub_artifacts.clone(),
            content.proposer.clone(),
        )?;
        tracing::info!(
            artifact_id = %artifact.artifact_id,
            previous = %artifact.version_hash().short(),
            rebased = %entry.version_hash.short(),
            "artifact rebased onto current head"
        );
        self.submit(entry)
    }

    pub fn cancel(&self, artifact_id: ArtifactId) -> Result<StagingArtifact, GovernanceError> {
        Ok(self.gate.cancel(artifact_id)?)
    }

    fn build(
        &self,
        payload: Value,
        sub_artifacts: Vec<SubArtifactRef>,
        proposer: SignerId,
    ) -> Result<CsrEntry, GovernanceError> {
        let head = self.ledger.fetch_latest()?;
        self.seal_onto(head.as_ref(), payload, sub_artifacts, proposer)
    }

    fn seal_onto(
        &self,
        parent: Option<&CsrEntry>,
        payload: Value,
        sub_artifacts: Vec<SubArtifactRef>,
        proposer: SignerId,
    ) -> Result<CsrEntry, GovernanceError> {
        let content = match parent {
            Some(parent) => EntryContent::successor(parent, payload, proposer),
            None => {
                let settings = self.ledger.settings();
                EntryContent::genesis(payload, proposer, settings.hash_algorithm, settings.epoch)
            }
        }
        .with_sub_artifacts(sub_artifacts);
        Ok(CsrEntry::seal(content, self.ledger.verifier().policy())?)
    }
}
