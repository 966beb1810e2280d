use csr_hasher::Digest;
use csr_types::CsrEntry;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{HeadSwap, PersistenceAdapter};
use crate::error::PersistenceError;

/// Key-value secret store with a named pointer slot per ledger.
pub trait SecureVault: Send + Sync {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), PersistenceError>;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    fn get_current_pointer(&self, id: &str) -> Result<Option<Digest>, PersistenceError>;

    fn set_current_pointer(&self, id: &str, digest: &Digest) -> Result<(), PersistenceError>;

    /// Atomically replace pointer `id` with `new` if it still equals `expected`.
    fn compare_and_set_pointer(
        &self,
        id: &str,
        expected: Option<&Digest>,
        new: &Digest,
    ) -> Result<HeadSwap, PersistenceError>;
}

#[derive(Debug, Default)]
pub struct InMemoryVault {
    values: RwLock<HashMap<String, Vec<u8>>>,
    pointers: RwLock<HashMap<String, Digest>>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureVault for InMemoryVault {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), PersistenceError> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn get_current_pointer(&self, id: &str) -> Result<Option<Digest>, PersistenceError> {
        Ok(self
            .pointers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    fn set_current_pointer(&self, id: &str, digest: &Digest) -> Result<(), PersistenceError> {
        self.pointers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), digest.clone());
        Ok(())
    }

    fn compare_and_set_pointer(
        &self,
        id: &str,
        expected: Option<&Digest>,
        new: &Digest,
    ) -> Result<HeadSwap, PersistenceError> {
        let mut pointers = self.pointers.write().unwrap_or_else(PoisonError::into_inner);
        let current = pointers.get(id);
        if current != expected {
            return Ok(HeadSwap::Stale {
                current: current.cloned(),
            });
        }
        pointers.insert(id.to_string(), new.clone());
        Ok(HeadSwap::Swapped)
    }
}

/// Ledger storage on top of a [`SecureVault`].
///
/// Entries live under `csr_stage_<HASH>.json` (upper-case hex) and the head
/// is the vault pointer named after the ledger.
pub struct VaultPersistence<V> {
    vault: V,
    ledger_id: String,
}

impl<V: SecureVault> VaultPersistence<V> {
    pub fn new(vault: V, ledger_id: impl Into<String>) -> Self {
        Self {
            vault,
            ledger_id: ledger_id.into(),
        }
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn entry_key(hash: &Digest) -> String {
        format!("csr_stage_{}.json", hash.to_hex().to_ascii_uppercase())
    }
}

impl<V: SecureVault> PersistenceAdapter for VaultPersistence<V> {
    fn put_artifact(&self, entry: &CsrEntry) -> Result<(), PersistenceError> {
        let record = serde_json::to_vec(entry)?;
        self.vault.put(&Self::entry_key(&entry.version_hash), record)
    }

    fn compare_and_set_head(
        &self,
        expected: Option<&Digest>,
        new: &Digest,
    ) -> Result<HeadSwap, PersistenceError> {
        self.vault
            .compare_and_set_pointer(&self.ledger_id, expected, new)
    }

    fn get_latest_hash(&self) -> Result<Option<Digest>, PersistenceError> {
        self.vault.get_current_pointer(&self.ledger_id)
    }

    fn get_artifact(&self, hash: &Digest) -> Result<Option<CsrEntry>, PersistenceError> {
        match self.vault.get(&Self::entry_key(hash))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
