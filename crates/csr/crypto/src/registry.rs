use csr_types::{PublicKey, SignerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ed25519::Ed25519Verifier;
use crate::error::CryptoError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredSigner {
    pub public_key: PublicKey,
    /// Only authorized signers count toward quorum thresholds.
    pub authorized: bool,
}

/// Known signer identities and their verifying keys.
///
/// Built once from configuration and shared read-only by the verifier,
/// the quorum gate and the ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignerRegistry {
    signers: BTreeMap<SignerId, RegisteredSigner>,
}

impl SignerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: SignerId,
        public_key: PublicKey,
        authorized: bool,
    ) -> Result<(), CryptoError> {
        if self.signers.contains_key(&id) {
            return Err(CryptoError::DuplicateSigner(id));
        }
        if !Ed25519Verifier::is_valid_key(&public_key) {
            return Err(CryptoError::InvalidPublicKey(id));
        }
        tracing::debug!(signer = %id, authorized, "signer registered");
        self.signers.insert(
            id,
            RegisteredSigner {
                public_key,
                authorized,
            },
        );
        Ok(())
    }

    pub fn with_signer(
        mut self,
        id: SignerId,
        public_key: PublicKey,
        authorized: bool,
    ) -> Result<Self, CryptoError> {
        self.register(id, public_key, authorized)?;
        Ok(self)
    }

    pub fn get(&self, id: &SignerId) -> Option<&RegisteredSigner> {
        self.signers.get(id)
    }

    pub fn public_key(&self, id: &SignerId) -> Result<&PublicKey, CryptoError> {
        self.signers
            .get(id)
            .map(|s| &s.public_key)
            .ok_or_else(|| CryptoError::UnknownSigner(id.clone()))
    }

    pub fn is_authorized(&self, id: &SignerId) -> bool {
        self.signers.get(id).is_some_and(|s| s.authorized)
    }

    pub fn authorized_count(&self) -> usize {
        self.signers.values().filter(|s| s.authorized).count()
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SignerId, &RegisteredSigner)> {
        self.signers.iter()
    }
}
