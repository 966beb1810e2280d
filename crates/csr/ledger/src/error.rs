use csr_hasher::{Digest, HashError};
use csr_patch::PatchApplicationError;
use csr_types::EntryStatus;
use csr_verifier::VerificationError;
use std::fmt;
use thiserror::Error;

/// Chain invariant named in integrity diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Invariant {
    /// Recomputed content hash equals the stored `version_hash`.
    ContentHash,
    /// `parent_hash` names the previous head.
    ParentLink,
    /// Sequence numbers grow by one from genesis at zero.
    Sequence,
    /// Enough valid authorized attestations over `version_hash`.
    Quorum,
    /// Algorithm and epoch match the ledger's pinned values.
    HashAlgorithm,
    /// Forward and inverse diffs reproduce the neighbouring payloads.
    DiffReplay,
    /// The head pointer resolves to a stored entry.
    HeadPointer,
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ContentHash => "content-hash",
            Self::ParentLink => "parent-link",
            Self::Sequence => "sequence",
            Self::Quorum => "quorum",
            Self::HashAlgorithm => "hash-algorithm",
            Self::DiffReplay => "diff-replay",
            Self::HeadPointer => "head-pointer",
        })
    }
}

/// Failures of the persistence layer.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored record could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed stored digest '{0}'")]
    MalformedDigest(String),

    #[error("vault operation failed: {0}")]
    Vault(String),
}

/// Why an `append` did not commit.
#[derive(Debug, Error)]
pub enum CommitError {
    /// Head moved since the proposer computed its diff. Rebase and resubmit.
    #[error("stale parent: current head is {}", head_label(.current_head))]
    StaleParent { current_head: Option<Digest> },

    #[error("entry is {0}, only RATIFIED entries can be committed")]
    NotRatified(EntryStatus),

    #[error("quorum not met: {have} of {need} authorized signatures")]
    QuorumNotMet { have: usize, need: usize },

    #[error("entry violates {invariant}: {reason}")]
    Admission { invariant: Invariant, reason: String },

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

fn head_label(head: &Option<Digest>) -> String {
    head.as_ref()
        .map(Digest::to_hex)
        .unwrap_or_else(|| "<empty>".into())
}

impl CommitError {
    /// Only a stale parent is recoverable, and only by the caller rebasing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleParent { .. })
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("integrity violation ({invariant}) at entry {hash}: {reason}")]
    IntegrityViolation {
        hash: Digest,
        invariant: Invariant,
        reason: String,
    },

    #[error("entry {0} is not part of this ledger")]
    EntryNotFound(Digest),

    #[error("no ledger named '{0}'")]
    UnknownManifest(String),

    #[error(transparent)]
    Hashing(#[from] HashError),

    #[error(transparent)]
    Patch(#[from] PatchApplicationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl LedgerError {
    pub fn invariant(&self) -> Option<Invariant> {
        match self {
            Self::IntegrityViolation { invariant, .. } => Some(*invariant),
            _ => None,
        }
    }
}
