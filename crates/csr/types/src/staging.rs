use chrono::{DateTime, Duration, Utc};
use csr_hasher::Digest;
use serde::{Deserialize, Serialize};

use crate::entry::{CandidateEntry, CsrEntry};
use crate::ids::ArtifactId;
use crate::status::EntryStatus;

/// A proposed entry travelling through validation and quorum.
///
/// The wrapped entry is sealed, so `version_hash` is frozen for the life of
/// the artifact. Rebasing produces a new artifact rather than mutating this one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StagingArtifact {
    pub artifact_id: ArtifactId,
    pub staged_at: DateTime<Utc>,
    pub entry: CsrEntry,
}

impl StagingArtifact {
    pub fn new(entry: CsrEntry) -> Self {
        Self {
            artifact_id: ArtifactId::new(),
            staged_at: Utc::now(),
            entry,
        }
    }

    pub fn version_hash(&self) -> &Digest {
        &self.entry.version_hash
    }

    pub fn status(&self) -> EntryStatus {
        self.entry.status
    }

    pub fn candidate(&self) -> CandidateEntry<'_> {
        self.entry.candidate()
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.staged_at >= ttl
    }
}
