//! Canonical hashing for the Attested Configuration Ledger.
//!
//! This crate provides:
//! - a compile-time registry of supported digest algorithms (`sha256`, `sha512`, `blake3`)
//! - a tagged, key-order independent canonical encoding of the JSON data model
//! - [`CanonicalHasher`], which combines both with a fixed domain-separation tag
//! - exclusion policies that strip transient fields before hashing
//!
//! Every content address in the ledger (`version_hash`, `parent_hash`,
//! sub-artifact checksums) is a [`Digest`] produced here.

#![deny(unsafe_code)]

pub mod algorithm;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod hasher;
pub mod policy;

pub use algorithm::{AlgorithmSpec, HashAlgorithm, StreamingHasher, REGISTRY};
pub use canonical::{canonical_bytes, to_canonical_value, DOMAIN_TAG, MAX_DEPTH};
pub use digest::{Digest, DigestParseError};
pub use error::HashError;
pub use hasher::{canonical_hash, CanonicalHasher};
pub use policy::{FieldPath, HashPolicy};
