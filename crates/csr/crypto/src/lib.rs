//! Signing and signature verification for ledger attestations.
//!
//! Attestations are Ed25519 signatures over the raw bytes of an entry's
//! `version_hash`. [`SigningService`] and [`SignatureVerifier`] are the seams
//! other backends (HSM, remote signer) plug into; [`SignerRegistry`] holds
//! the configured public keys and which of them count toward quorum.

#![deny(unsafe_code)]

pub mod ed25519;
pub mod error;
pub mod registry;

pub use ed25519::{Ed25519Signer, Ed25519Verifier};
pub use error::CryptoError;
pub use registry::{RegisteredSigner, SignerRegistry};

use csr_hasher::Digest;
use csr_types::{PublicKey, Signature, SignerId};

/// Produces attestations for one signer identity.
pub trait SigningService: Send + Sync {
    fn signer_id(&self) -> &SignerId;

    fn public_key(&self) -> PublicKey;

    fn sign(&self, digest: &Digest) -> Signature;
}

/// Checks a signature over a digest against a public key.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, digest: &Digest, signature: &Signature, public_key: &PublicKey) -> bool;
}
