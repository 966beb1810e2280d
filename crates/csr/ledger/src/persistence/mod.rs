//! Storage backends behind the ledger store.
//!
//! Every backend keeps the entry set and the head pointer separately. An
//! entry is made durable with `put_artifact` before the head is moved with
//! `compare_and_set_head`, so a crash between the two leaves an
//! unreferenced entry and the old head. The head swap is atomic across
//! every store opened on the same backend.

mod file;
mod memory;
mod vault;

pub use file::FilePersistence;
pub use memory::InMemoryPersistence;
pub use vault::{InMemoryVault, SecureVault, VaultPersistence};

use csr_hasher::Digest;
use csr_types::CsrEntry;

use crate::error::PersistenceError;

/// Result of [`PersistenceAdapter::compare_and_set_head`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeadSwap {
    Swapped,
    /// The head was not the expected value and was left untouched.
    Stale { current: Option<Digest> },
}

pub trait PersistenceAdapter: Send + Sync {
    /// Store `entry` under its `version_hash` without moving the head.
    /// Must be durable when this returns `Ok`.
    fn put_artifact(&self, entry: &CsrEntry) -> Result<(), PersistenceError>;

    /// Move the head to `new` if and only if it currently equals `expected`.
    fn compare_and_set_head(
        &self,
        expected: Option<&Digest>,
        new: &Digest,
    ) -> Result<HeadSwap, PersistenceError>;

    fn get_latest_hash(&self) -> Result<Option<Digest>, PersistenceError>;

    fn get_artifact(&self, hash: &Digest) -> Result<Option<CsrEntry>, PersistenceError>;
}
