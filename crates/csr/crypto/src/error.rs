use csr_types::{KeyMaterialError, SignerId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key material: {0}")]
    KeyMaterial(#[from] KeyMaterialError),

    #[error("public key for '{0}' is not a valid Ed25519 point")]
    InvalidPublicKey(SignerId),

    #[error("signer '{0}' is already registered")]
    DuplicateSigner(SignerId),

    #[error("signer '{0}' is not registered")]
    UnknownSigner(SignerId),
}
