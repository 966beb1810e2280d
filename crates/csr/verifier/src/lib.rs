//! Manifest verification for CSR candidate entries.
//!
//! A candidate is checked for self-consistency (its `version_hash` matches
//! its content), authenticity (every attestation verifies against the
//! signer registry) and completeness (every referenced sub-artifact matches
//! its recorded checksum). Failures are reported per step so callers can
//! tell forgery from corruption from a missing dependency.

#![deny(unsafe_code)]

pub mod error;
pub mod source;
pub mod verifier;

pub use error::{VerificationError, VerificationStep};
pub use source::{ArtifactSource, FsArtifactSource, InMemoryArtifactSource, NoArtifacts};
pub use verifier::ManifestVerifier;
