use csr_hasher::Digest;
use csr_types::CsrEntry;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{HeadSwap, PersistenceAdapter};
use crate::error::PersistenceError;

/// Volatile backend for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    inner: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<Digest, CsrEntry>,
    head: Option<Digest>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite a stored record in place, bypassing every check.
    /// Lets tests simulate on-disk corruption.
    #[doc(hidden)]
    pub fn tamper(&self, hash: &Digest, edit: impl FnOnce(&mut CsrEntry)) -> bool {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match state.entries.get_mut(hash) {
            Some(entry) => {
                edit(entry);
                true
            }
            None => false,
        }
    }
}

impl PersistenceAdapter for InMemoryPersistence {
    fn put_artifact(&self, entry: &CsrEntry) -> Result<(), PersistenceError> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .insert(entry.version_hash.clone(), entry.clone());
        Ok(())
    }

    fn compare_and_set_head(
        &self,
        expected: Option<&Digest>,
        new: &Digest,
    ) -> Result<HeadSwap, PersistenceError> {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if state.head.as_ref() != expected {
            return Ok(HeadSwap::Stale {
                current: state.head.clone(),
            });
        }
        state.head = Some(new.clone());
        Ok(HeadSwap::Swapped)
    }

    fn get_latest_hash(&self) -> Result<Option<Digest>, PersistenceError> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .head
            .clone())
    }

    fn get_artifact(&self, hash: &Digest) -> Result<Option<CsrEntry>, PersistenceError> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(hash)
            .cloned())
    }
}
