use csr_hasher::Digest;
use csr_types::{KeyMaterialError, PublicKey, Signature, SignerId};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use std::fmt;

use crate::error::CryptoError;
use crate::{SignatureVerifier, SigningService};

/// In-process Ed25519 signing key bound to a signer identity.
#[derive(Clone)]
pub struct Ed25519Signer {
    id: SignerId,
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn new(id: SignerId, key: SigningKey) -> Self {
        Self { id, key }
    }

    /// Fresh random key.
    pub fn generate(id: SignerId) -> Self {
        let secret: [u8; 32] = rand::random();
        Self::new(id, SigningKey::from_bytes(&secret))
    }

    pub fn from_secret_hex(id: SignerId, secret_hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| KeyMaterialError::InvalidHex(e.to_string()))?;
        let secret: [u8; 32] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| KeyMaterialError::InvalidLength {
                    expected: 32,
                    actual: bytes.len(),
                })?;
        Ok(Self::new(id, SigningKey::from_bytes(&secret)))
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("id", &self.id)
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl SigningService for Ed25519Signer {
    fn signer_id(&self) -> &SignerId {
        &self.id
    }

    fn public_key(&self) -> PublicKey {
        PublicKey(self.key.verifying_key().to_bytes())
    }

    fn sign(&self, digest: &Digest) -> Signature {
        let signature = self.key.sign(digest.as_bytes());
        Signature::from_bytes(signature.to_bytes().to_vec())
    }
}

/// Stateless Ed25519 verification.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl Ed25519Verifier {
    /// Whether `key` decodes to a usable Ed25519 point.
    pub fn is_valid_key(key: &PublicKey) -> bool {
        VerifyingKey::from_bytes(key.as_bytes()).is_ok()
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, digest: &Digest, signature: &Signature, public_key: &PublicKey) -> bool {
        let Ok(bytes) = <[u8; 64]>::try_from(signature.as_bytes()) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(public_key.as_bytes()) else {
            return false;
        };
        key.verify(digest.as_bytes(), &ed25519_dalek::Signature::from_bytes(&bytes))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csr_hasher::HashAlgorithm;

    fn digest(data: &[u8]) -> Digest {
        HashAlgorithm::Sha256.digest(data)
    }

    #[test]
    fn sign_then_verify() {
        let signer = Ed25519Signer::new(SignerId::new("alice"), SigningKey::from_bytes(&[42u8; 32]));
        let d = digest(b"entry");
        let sig = signer.sign(&d);
        assert_eq!(sig.as_bytes().len(), 64);
        assert!(Ed25519Verifier.verify(&d, &sig, &signer.public_key()));
    }

    #[test]
    fn wrong_key_or_digest_fails() {
        let a = Ed25519Signer::new(SignerId::new("a"), SigningKey::from_bytes(&[42u8; 32]));
        let b = Ed25519Signer::new(SignerId::new("b"), SigningKey::from_bytes(&[99u8; 32]));
        let d = digest(b"entry");
        let sig = a.sign(&d);
        assert!(!Ed25519Verifier.verify(&d, &sig, &b.public_key()));
        assert!(!Ed25519Verifier.verify(&digest(b"other"), &sig, &a.public_key()));
    }

    #[test]
    fn truncated_signature_is_rejected() {
        let a = Ed25519Signer::generate(SignerId::new("a"));
        let d = digest(b"entry");
        let sig = a.sign(&d);
        let short = Signature::from_bytes(sig.as_bytes()[..63].to_vec());
        assert!(!Ed25519Verifier.verify(&d, &short, &a.public_key()));
    }

    #[test]
    fn secret_hex_round_trip() {
        let a = Ed25519Signer::generate(SignerId::new("a"));
        let restored = Ed25519Signer::from_secret_hex(SignerId::new("a"), &a.secret_hex()).unwrap();
        assert_eq!(restored.public_key(), a.public_key());
    }
}
