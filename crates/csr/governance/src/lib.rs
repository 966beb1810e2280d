//! Proposal pipeline for the configuration ledger.
//!
//! [`LedgerRuntime`] wires a [`LedgerConfig`] into a ledger store, a quorum
//! gate and a rejection [`AuditTrail`]. [`Proposer`] walks artifacts through
//! propose, validate, attest and commit, and rebases them when another
//! proposer wins the head.

#![deny(unsafe_code)]

pub mod audit;
pub mod config;
pub mod error;
pub mod proposer;
pub mod runtime;

pub use audit::{AuditTrail, RejectionRecord, RejectionStage, DEFAULT_AUDIT_LIMIT};
pub use config::{
    ConfigError, LedgerConfig, LedgerSection, LoggingSection, QuorumSection, SignerEntry,
    StorageBackend, StorageSection,
};
pub use error::GovernanceError;
pub use proposer::Proposer;
pub use runtime::LedgerRuntime;
