use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a staging artifact or ledger entry.
///
/// ```text
/// PROPOSED -> VALIDATING -> QUORUM_PENDING -> RATIFIED -> COMMITTED
///     \            \               \              \
///      +------------+---------------+--------------+--> REJECTED
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Proposed,
    Validating,
    QuorumPending,
    Ratified,
    Committed,
    Rejected,
}

impl EntryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Rejected)
    }

    pub fn can_transition_to(&self, next: EntryStatus) -> bool {
        use EntryStatus::*;
        match (self, next) {
            (Proposed, Validating)
            | (Validating, QuorumPending)
            | (QuorumPending, Ratified)
            | (Ratified, Committed) => true,
            (from, Rejected) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "PROPOSED",
            Self::Validating => "VALIDATING",
            Self::QuorumPending => "QUORUM_PENDING",
            Self::Ratified => "RATIFIED",
            Self::Committed => "COMMITTED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("illegal lifecycle transition {from} -> {to}")]
pub struct LifecycleError {
    pub from: EntryStatus,
    pub to: EntryStatus,
}
