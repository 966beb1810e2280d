use csr_crypto::{Ed25519Verifier, SignatureVerifier, SignerRegistry};
use csr_hasher::{Digest, HashPolicy};
use csr_types::{CandidateEntry, Signature, SignerId};
use std::io;
use std::sync::Arc;

use crate::error::VerificationError;
use crate::source::{ArtifactSource, NoArtifacts};

/// Self-consistency and authenticity checks for candidate entries.
///
/// Steps run in order and the first failure stops verification:
/// 1. recompute `version_hash` from content and compare with the claim
/// 2. verify every attached signature against the signer's registered key
/// 3. recompute each sub-artifact checksum from its source bytes
///
/// All checks are pure reads; nothing here touches ledger state.
#[derive(Clone)]
pub struct ManifestVerifier {
    policy: HashPolicy,
    registry: Arc<SignerRegistry>,
    signatures: Arc<dyn SignatureVerifier>,
    source: Arc<dyn ArtifactSource>,
}

impl ManifestVerifier {
    pub fn new(policy: HashPolicy, registry: Arc<SignerRegistry>) -> Self {
        Self {
            policy,
            registry,
            signatures: Arc::new(Ed25519Verifier),
            source: Arc::new(NoArtifacts),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ArtifactSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_signature_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.signatures = verifier;
        self
    }

    pub fn policy(&self) -> &HashPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &SignerRegistry {
        &self.registry
    }

    pub fn verify(&self, candidate: CandidateEntry<'_>) -> Result<(), VerificationError> {
        self.verify_content_hash(candidate)?;
        for (signer, signature) in candidate.attestations {
            self.check_signature(candidate.version_hash, signer, signature)?;
        }
        tracing::debug!(
            version_hash = %candidate.version_hash.short(),
            signatures = candidate.attestations.len(),
            "signatures verified"
        );
        self.verify_sub_artifacts(candidate)
    }

    /// Steps 1 and 3 only. Used before any attestation exists.
    pub fn verify_integrity(&self, candidate: CandidateEntry<'_>) -> Result<(), VerificationError> {
        self.verify_content_hash(candidate)?;
        self.verify_sub_artifacts(candidate)
    }

    fn verify_content_hash(&self, candidate: CandidateEntry<'_>) -> Result<(), VerificationError> {
        let computed = candidate.content.compute_version_hash(&self.policy)?;
        if &computed != candidate.version_hash {
            tracing::error!(
                claimed = %candidate.version_hash,
                computed = %computed,
                "version_hash mismatch"
            );
            return Err(VerificationError::HashMismatch {
                claimed: candidate.version_hash.clone(),
                computed,
            });
        }
        tracing::debug!(version_hash = %computed.short(), "content hash verified");
        Ok(())
    }

    /// Verify one signature over `digest` against the registered key of `signer`.
    pub fn check_signature(
        &self,
        digest: &Digest,
        signer: &SignerId,
        signature: &Signature,
    ) -> Result<(), VerificationError> {
        let key = self
            .registry
            .public_key(signer)
            .map_err(|e| VerificationError::SignatureInvalid {
                signer: signer.clone(),
                reason: e.to_string(),
            })?;
        if !self.signatures.verify(digest, signature, key) {
            tracing::error!(%signer, version_hash = %digest, "signature does not verify");
            return Err(VerificationError::SignatureInvalid {
                signer: signer.clone(),
                reason: "signature does not verify against registered key".into(),
            });
        }
        Ok(())
    }

    fn verify_sub_artifacts(&self, candidate: CandidateEntry<'_>) -> Result<(), VerificationError> {
        for artifact in &candidate.content.sub_artifacts {
            let bytes = self.source.read(&artifact.path).map_err(|e| {
                tracing::error!(
                    artifact = %artifact.name,
                    path = %artifact.path,
                    error = %e,
                    "sub-artifact not readable"
                );
                if e.kind() == io::ErrorKind::NotFound {
                    VerificationError::MissingArtifact {
                        artifact: artifact.name.clone(),
                        path: artifact.path.clone(),
                    }
                } else {
                    VerificationError::ArtifactUnreadable {
                        artifact: artifact.name.clone(),
                        path: artifact.path.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;
            let computed = artifact.algorithm.digest(&bytes);
            if computed != artifact.checksum {
                tracing::error!(
                    artifact = %artifact.name,
                    expected = %artifact.checksum,
                    computed = %computed,
                    "sub-artifact checksum mismatch"
                );
                return Err(VerificationError::ArtifactChecksum {
                    artifact: artifact.name.clone(),
                    detail: format!("expected {}, computed {}", artifact.checksum, computed),
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ManifestVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestVerifier")
            .field("policy", &self.policy)
            .field("signers", &self.registry.len())
            .finish_non_exhaustive()
    }
}
