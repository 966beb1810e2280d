//! Data model of the Attested Configuration Ledger.
//!
//! A [`CsrEntry`] is one link of the hash chain: an [`EntryContent`] sealed
//! under its `version_hash`, the signer attestations over that hash, and a
//! lifecycle [`EntryStatus`]. Before commit the same entry travels inside a
//! [`StagingArtifact`].

#![deny(unsafe_code)]

pub mod entry;
pub mod ids;
pub mod staging;
pub mod status;

pub use entry::{CandidateEntry, CsrEntry, EntryContent, SubArtifactRef};
pub use ids::{ArtifactId, KeyMaterialError, PublicKey, Signature, SignerId};
pub use staging::StagingArtifact;
pub use status::{EntryStatus, LifecycleError};

pub use csr_hasher::{Digest, HashAlgorithm, HashPolicy};
pub use csr_patch::{DiffPair, Patch, PatchOp};
