use chrono::{DateTime, Utc};
use csr_hasher::Digest;
use csr_types::ArtifactId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Pipeline stage at which an artifact was turned away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionStage {
    Validation,
    Commit,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub artifact_id: ArtifactId,
    pub version_hash: Digest,
    pub stage: RejectionStage,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Records kept by [`AuditTrail::new`].
pub const DEFAULT_AUDIT_LIMIT: usize = 1024;

/// Rejected artifacts, in the order they were turned away. Never part of
/// the chain.
///
/// Holds at most `limit` records; the oldest is dropped to make room.
/// Long-running callers ship records elsewhere with [`AuditTrail::drain`].
#[derive(Debug)]
pub struct AuditTrail {
    limit: usize,
    records: Mutex<VecDeque<RejectionRecord>>,
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::with_limit(DEFAULT_AUDIT_LIMIT)
    }
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            records: Mutex::new(VecDeque::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<RejectionRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(
        &self,
        artifact_id: ArtifactId,
        version_hash: &Digest,
        stage: RejectionStage,
        reason: impl Into<String>,
    ) {
        let record = RejectionRecord {
            artifact_id,
            version_hash: version_hash.clone(),
            stage,
            reason: reason.into(),
            at: Utc::now(),
        };
        tracing::warn!(
            artifact_id = %record.artifact_id,
            version_hash = %record.version_hash.short(),
            stage = ?record.stage,
            reason = %record.reason,
            "artifact rejected"
        );
        let mut records = self.lock();
        if records.len() >= self.limit {
            if let Some(evicted) = records.pop_front() {
                tracing::debug!(artifact_id = %evicted.artifact_id, "audit record evicted");
            }
        }
        records.push_back(record);
    }

    pub fn records(&self) -> Vec<RejectionRecord> {
        self.lock().iter().cloned().collect()
    }

    /// Remove and return every held record, oldest first.
    pub fn drain(&self) -> Vec<RejectionRecord> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
