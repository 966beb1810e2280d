//! Quorum gate for staged CSR artifacts.
//!
//! The gate holds artifacts between validation and commit, verifies each
//! incoming attestation against the signer registry and ratifies an
//! artifact once `threshold` distinct authorized signers have attested its
//! frozen `version_hash`.

#![deny(unsafe_code)]

pub mod error;
pub mod gate;

pub use error::QuorumError;
pub use gate::{QuorumGate, QuorumPolicy, QuorumState};
