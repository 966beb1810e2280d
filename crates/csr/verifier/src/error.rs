use csr_hasher::{Digest, HashError};
use csr_types::SignerId;
use std::fmt;
use thiserror::Error;

/// Which verification step rejected a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerificationStep {
    ContentHash,
    Signatures,
    SubArtifacts,
}

impl fmt::Display for VerificationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ContentHash => "content-hash",
            Self::Signatures => "signatures",
            Self::SubArtifacts => "sub-artifacts",
        })
    }
}

/// Verification failures. None of these are retried: the candidate is
/// rejected and must be re-proposed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VerificationError {
    #[error("content could not be hashed: {0}")]
    Hashing(#[from] HashError),

    #[error("version_hash mismatch: claimed {claimed}, recomputed {computed}")]
    HashMismatch { claimed: Digest, computed: Digest },

    #[error("signature from '{signer}' is invalid: {reason}")]
    SignatureInvalid { signer: SignerId, reason: String },

    #[error("sub-artifact '{artifact}' failed checksum: {detail}")]
    ArtifactChecksum { artifact: String, detail: String },

    /// The referenced file does not exist in the artifact source.
    #[error("sub-artifact '{artifact}' is missing at '{path}'")]
    MissingArtifact { artifact: String, path: String },

    #[error("sub-artifact '{artifact}' could not be read at '{path}': {reason}")]
    ArtifactUnreadable {
        artifact: String,
        path: String,
        reason: String,
    },
}

impl VerificationError {
    pub fn step(&self) -> VerificationStep {
        match self {
            Self::Hashing(_) | Self::HashMismatch { .. } => VerificationStep::ContentHash,
            Self::SignatureInvalid { .. } => VerificationStep::Signatures,
            Self::ArtifactChecksum { .. }
            | Self::MissingArtifact { .. }
            | Self::ArtifactUnreadable { .. } => VerificationStep::SubArtifacts,
        }
    }
}
