use csr_types::CsrEntry;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::LedgerError;
use crate::store::LedgerStore;

/// Ledgers addressed by manifest name.
#[derive(Debug, Default)]
pub struct ManifestLedgers {
    ledgers: RwLock<BTreeMap<String, Arc<LedgerStore>>>,
}

impl ManifestLedgers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` under its own name. Replaces any previous ledger of that name.
    pub fn insert(&self, store: Arc<LedgerStore>) -> Option<Arc<LedgerStore>> {
        self.ledgers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(store.name().to_string(), store)
    }

    pub fn get(&self, manifest_name: &str) -> Option<Arc<LedgerStore>> {
        self.ledgers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(manifest_name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.ledgers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Head entry of the named ledger. `Ok(None)` when that ledger is empty.
    pub fn fetch_latest(&self, manifest_name: &str) -> Result<Option<CsrEntry>, LedgerError> {
        self.get(manifest_name)
            .ok_or_else(|| LedgerError::UnknownManifest(manifest_name.to_string()))?
            .fetch_latest()
    }
}
