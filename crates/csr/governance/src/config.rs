//! Ledger configuration
//!
//! One immutable [`LedgerConfig`] is loaded from TOML at startup and handed
//! to every component constructor.
//!
//! ```toml
//! [ledger]
//! name = "governance"
//! epoch = 0
//! hash_algorithm = "sha256"
//! excluded_fields = ["system_metadata.timestamp_staged"]
//!
//! [quorum]
//! threshold = 2
//! staging_ttl_secs = 3600
//!
//! [[signers]]
//! id = "alice"
//! public_key = "3b6a27bc..."
//!
//! [storage]
//! backend = "file"
//! path = "/var/lib/csr/governance"
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

use csr_crypto::SignerRegistry;
use csr_hasher::{FieldPath, HashAlgorithm, HashPolicy};
use csr_ledger::StoreSettings;
use csr_quorum::QuorumPolicy;
use csr_types::{PublicKey, SignerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(String),

    #[error("cannot find config directory")]
    NoConfigDir,

    #[error("unsupported hash algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("quorum threshold {threshold} must be between 1 and the {authorized} authorized signers")]
    InvalidThreshold { threshold: usize, authorized: usize },

    #[error("signer '{0}' is listed more than once")]
    DuplicateSigner(SignerId),

    #[error("public key of signer '{signer}' is invalid: {reason}")]
    InvalidPublicKey { signer: SignerId, reason: String },

    #[error("file storage requires [storage].path")]
    MissingStoragePath,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LedgerConfig {
    pub ledger: LedgerSection,
    pub quorum: QuorumSection,
    pub signers: Vec<SignerEntry>,
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// Manifest name the ledger is addressed by.
    pub name: String,
    pub epoch: u32,
    pub hash_algorithm: String,
    /// Dot paths removed from payloads before hashing.
    pub excluded_fields: Vec<FieldPath>,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            name: "governance".into(),
            epoch: 0,
            hash_algorithm: HashAlgorithm::DEFAULT.id().into(),
            excluded_fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuorumSection {
    pub threshold: usize,
    pub staging_ttl_secs: Option<u64>,
}

impl Default for QuorumSection {
    fn default() -> Self {
        Self {
            threshold: 1,
            staging_ttl_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignerEntry {
    pub id: SignerId,
    /// Hex-encoded Ed25519 verifying key.
    pub public_key: String,
    #[serde(default = "default_true")]
    pub authorized: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackend,
    pub path: Option<PathBuf>,
    /// Directory that sub-artifact paths are resolved against.
    pub artifacts: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl LedgerConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = Self::default_config_path()?;
                if !default.exists() {
                    tracing::debug!(path = %default.display(), "no config file, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };
        let contents = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!(path = %config_path.display(), ledger = %config.ledger.name, "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// `<config_dir>/csr/ledger.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("csr").join("ledger.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hash_algorithm()?;
        let registry = self.signer_registry()?;
        let authorized = registry.authorized_count();
        let threshold = self.quorum.threshold;
        if threshold == 0 || threshold > authorized {
            return Err(ConfigError::InvalidThreshold {
                threshold,
                authorized,
            });
        }
        if self.storage.backend == StorageBackend::File && self.storage.path.is_none() {
            return Err(ConfigError::MissingStoragePath);
        }
        Ok(())
    }

    pub fn hash_algorithm(&self) -> Result<HashAlgorithm, ConfigError> {
        HashAlgorithm::from_id(&self.ledger.hash_algorithm)
            .map_err(|_| ConfigError::UnsupportedAlgorithm(self.ledger.hash_algorithm.clone()))
    }

    pub fn hash_policy(&self) -> HashPolicy {
        HashPolicy::new(self.ledger.excluded_fields.clone())
    }

    pub fn signer_registry(&self) -> Result<SignerRegistry, ConfigError> {
        let mut seen = BTreeSet::new();
        let mut registry = SignerRegistry::new();
        for signer in &self.signers {
            if !seen.insert(signer.id.clone()) {
                return Err(ConfigError::DuplicateSigner(signer.id.clone()));
            }
            let key = PublicKey::from_hex(&signer.public_key).map_err(|e| {
                ConfigError::InvalidPublicKey {
                    signer: signer.id.clone(),
                    reason: e.to_string(),
                }
            })?;
            registry
                .register(signer.id.clone(), key, signer.authorized)
                .map_err(|e| ConfigError::InvalidPublicKey {
                    signer: signer.id.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(registry)
    }

    pub fn store_settings(&self) -> Result<StoreSettings, ConfigError> {
        Ok(StoreSettings {
            name: self.ledger.name.clone(),
            hash_algorithm: self.hash_algorithm()?,
            epoch: self.ledger.epoch,
            threshold: self.quorum.threshold,
        })
    }

    pub fn quorum_policy(&self) -> QuorumPolicy {
        QuorumPolicy {
            threshold: self.quorum.threshold,
            staging_ttl: self
                .quorum
                .staging_ttl_secs
                .and_then(|secs| chrono::Duration::try_seconds(secs.min(i64::MAX as u64) as i64)),
        }
    }
}
