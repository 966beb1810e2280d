//! Signer key files written by `csrctl keygen`.

use anyhow::{Context, Result};
use csr_crypto::{Ed25519Signer, SigningService};
use csr_types::SignerId;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
pub struct KeyFile {
    pub id: SignerId,
    pub public_key: String,
    pub secret_key: String,
}

impl KeyFile {
    pub fn generate(id: SignerId) -> Self {
        Self::from_signer(&Ed25519Signer::generate(id))
    }

    pub fn from_signer(signer: &Ed25519Signer) -> Self {
        Self {
            id: signer.signer_id().clone(),
            public_key: signer.public_key().to_hex(),
            secret_key: signer.secret_hex(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read key file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("malformed key file {}", path.display()))
    }

    /// Create `path` readable only by its owner. Fails if it already exists.
    pub fn write(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(path)
            .with_context(|| format!("cannot create key file {}", path.display()))?;
        file.write_all(text.as_bytes())
            .and_then(|()| file.sync_all())
            .with_context(|| format!("cannot write key file {}", path.display()))
    }

    pub fn signer(&self) -> Result<Ed25519Signer> {
        let signer = Ed25519Signer::from_secret_hex(self.id.clone(), &self.secret_key)
            .with_context(|| format!("invalid secret key for '{}'", self.id))?;
        anyhow::ensure!(
            signer.public_key().to_hex() == self.public_key.to_ascii_lowercase(),
            "public key in key file for '{}' does not match its secret key",
            self.id
        );
        Ok(signer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_file_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.json");
        let key = KeyFile::generate(SignerId::new("alice"));
        key.write(&path).unwrap();

        let loaded = KeyFile::read(&path).unwrap();
        let signer = loaded.signer().unwrap();
        assert_eq!(signer.signer_id().as_str(), "alice");
        assert_eq!(signer.public_key().to_hex(), key.public_key);
    }

    #[test]
    fn mismatched_public_key_is_rejected() {
        let mut key = KeyFile::generate(SignerId::new("alice"));
        key.public_key = KeyFile::generate(SignerId::new("bob")).public_key;
        assert!(key.signer().is_err());
    }

    #[test]
    fn existing_key_file_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.json");
        let first = KeyFile::generate(SignerId::new("alice"));
        first.write(&path).unwrap();
        assert!(KeyFile::generate(SignerId::new("alice")).write(&path).is_err());
        assert_eq!(KeyFile::read(&path).unwrap().secret_key, first.secret_key);
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.json");
        KeyFile::generate(SignerId::new("alice")).write(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
