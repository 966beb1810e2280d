use csr_crypto::CryptoError;
use csr_hasher::{Digest, HashError};
use csr_ledger::{CommitError, LedgerError, PersistenceError};
use csr_patch::PatchApplicationError;
use csr_quorum::QuorumError;
use csr_types::{LifecycleError, StagingArtifact};
use csr_verifier::VerificationError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Hashing(#[from] HashError),

    #[error(transparent)]
    Patch(#[from] PatchApplicationError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Quorum(#[from] QuorumError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The ledger refused the artifact. It is `REJECTED` and handed back so
    /// the caller can rebase it.
    #[error("artifact {} rejected: {source}", .artifact.artifact_id)]
    Rejected {
        artifact: Box<StagingArtifact>,
        #[source]
        source: CommitError,
    },
}

impl GovernanceError {
    /// Head that beat this proposal, when it lost a commit race.
    pub fn stale_parent(&self) -> Option<Option<&Digest>> {
        match self {
            Self::Rejected {
                source: CommitError::StaleParent { current_head },
                ..
            } => Some(current_head.as_ref()),
            _ => None,
        }
    }

    pub fn is_stale_parent(&self) -> bool {
        self.stale_parent().is_some()
    }

    pub fn rejected_artifact(&self) -> Option<&StagingArtifact> {
        match self {
            Self::Rejected { artifact, .. } => Some(artifact),
            _ => None,
        }
    }
}
