//! Append-only ledger of Configuration State Roots.
//!
//! [`LedgerStore`] admits only ratified, fully verified entries and commits
//! them with a single compare-and-swap on the head pointer. Storage sits
//! behind [`PersistenceAdapter`]: in memory, one file per entry on disk, or
//! a [`SecureVault`] pointer store. Chain audit ([`LedgerStore::verify_chain`]),
//! replay and rollback read the same entries back and treat any broken
//! invariant as a hard failure.

#![deny(unsafe_code)]

pub mod error;
pub mod manifests;
pub mod persistence;
pub mod store;

pub use error::{CommitError, Invariant, LedgerError, PersistenceError};
pub use manifests::ManifestLedgers;
pub use persistence::{
    FilePersistence, HeadSwap, InMemoryPersistence, InMemoryVault, PersistenceAdapter,
    SecureVault, VaultPersistence,
};
pub use store::{ChainReport, LedgerStore, StoreSettings};
