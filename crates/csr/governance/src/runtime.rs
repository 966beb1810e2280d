use chrono::Utc;
use csr_ledger::{FilePersistence, InMemoryPersistence, LedgerStore, PersistenceAdapter};
use csr_quorum::QuorumGate;
use csr_types::{ArtifactId, SignerId};
use csr_verifier::{FsArtifactSource, ManifestVerifier};
use std::sync::Arc;

use crate::audit::AuditTrail;
use crate::config::{ConfigError, LedgerConfig, StorageBackend};
use crate::error::GovernanceError;
use crate::proposer::Proposer;

/// One ledger with its gate and audit trail, wired from a [`LedgerConfig`].
#[derive(Debug)]
pub struct LedgerRuntime {
    config: LedgerConfig,
    ledger: Arc<LedgerStore>,
    gate: Arc<QuorumGate>,
    audit: Arc<AuditTrail>,
}

impl LedgerRuntime {
    /// Validate `config` and open the storage backend it names.
    pub fn open(config: LedgerConfig) -> Result<Self, GovernanceError> {
        config.validate()?;
        let persistence: Arc<dyn PersistenceAdapter> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(InMemoryPersistence::new()),
            StorageBackend::File => {
                let path = config
                    .storage
                    .path
                    .as_ref()
                    .ok_or(ConfigError::MissingStoragePath)?;
                Arc::new(FilePersistence::open(path)?)
            }
        };
        Self::with_persistence(config, persistence)
    }

    /// Open over a caller-supplied backend, e.g. a vault adapter.
    pub fn with_persistence(
        config: LedgerConfig,
        persistence: Arc<dyn PersistenceAdapter>,
    ) -> Result<Self, GovernanceError> {
        config.validate()?;
        let registry = Arc::new(config.signer_registry()?);
        let mut verifier = ManifestVerifier::new(config.hash_policy(), registry);
        if let Some(dir) = &config.storage.artifacts {
            verifier = verifier.with_source(Arc::new(FsArtifactSource::new(dir.clone())));
        }
        let ledger = LedgerStore::open(config.store_settings()?, verifier.clone(), persistence)?;
        let gate = QuorumGate::new(config.quorum_policy(), verifier)?;
        tracing::info!(
            ledger = %config.ledger.name,
            backend = ?config.storage.backend,
            threshold = config.quorum.threshold,
            signers = config.signers.len(),
            "ledger runtime ready"
        );
        Ok(Self {
            config,
            ledger: Arc::new(ledger),
            gate: Arc::new(gate),
            audit: Arc::new(AuditTrail::new()),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<LedgerStore> {
        &self.ledger
    }

    pub fn gate(&self) -> &Arc<QuorumGate> {
        &self.gate
    }

    pub fn audit(&self) -> &Arc<AuditTrail> {
        &self.audit
    }

    pub fn proposer(&self, identity: impl Into<SignerId>) -> Proposer {
        Proposer::new(
            identity.into(),
            Arc::clone(&self.ledger),
            Arc::clone(&self.gate),
            Arc::clone(&self.audit),
        )
    }

    /// Drop staged artifacts past the configured TTL.
    pub fn expire_staged(&self) -> Vec<ArtifactId> {
        self.gate.expire(Utc::now())
    }
}
