use csr_types::{ArtifactId, LifecycleError, SignerId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuorumError {
    #[error("{0} is not staged")]
    UnknownArtifact(ArtifactId),

    #[error("{0} is already staged")]
    AlreadyStaged(ArtifactId),

    #[error("'{signer}' already attested {artifact}")]
    DuplicateAttestation { artifact: ArtifactId, signer: SignerId },

    /// `signer` already attested with a different signature; the first stands.
    #[error("'{signer}' already attested {artifact} with a different signature")]
    ConflictingAttestation { artifact: ArtifactId, signer: SignerId },

    #[error("attestation from '{signer}' on {artifact} does not verify")]
    SignatureInvalid { artifact: ArtifactId, signer: SignerId },

    #[error("quorum not met: {have} of {need} authorized signers")]
    QuorumNotMet { have: usize, need: usize },

    #[error("threshold {threshold} is unsatisfiable with {authorized} authorized signers")]
    InvalidThreshold { threshold: usize, authorized: usize },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl QuorumError {
    /// False when the artifact is untouched and stays staged.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::DuplicateAttestation { .. }
                | Self::ConflictingAttestation { .. }
                | Self::QuorumNotMet { .. }
        )
    }
}
