//! Command implementations

use anyhow::{anyhow, bail, Context, Result};
use csr_governance::{LedgerConfig, LedgerRuntime, SignerEntry, StorageBackend};
use csr_hasher::Digest;
use csr_ledger::LedgerStore;
use csr_patch::Patch;
use csr_types::{CsrEntry, SignerId};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::keys::KeyFile;

pub struct InitOptions {
    pub storage: PathBuf,
    pub keys: Vec<PathBuf>,
    pub threshold: usize,
    pub name: String,
    pub hash_algorithm: String,
    pub force: bool,
}

pub struct ProposeOptions {
    pub payload: Option<PathBuf>,
    pub patch: Option<PathBuf>,
    pub parent: Option<String>,
    pub proposer: String,
    pub keys: Vec<PathBuf>,
}

pub fn keygen(id: &str, out: &Path) -> Result<()> {
    let key = KeyFile::generate(SignerId::new(id));
    key.write(out)?;
    println!("✓ Key for '{}' written to {}", key.id, out.display());
    println!();
    println!("[[signers]]");
    println!("id = \"{}\"", key.id);
    println!("public_key = \"{}\"", key.public_key);
    Ok(())
}

pub fn init(config_path: Option<&Path>, options: InitOptions) -> Result<()> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => LedgerConfig::default_config_path()?,
    };
    if path.exists() && !options.force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }

    let mut config = LedgerConfig::default();
    config.ledger.name = options.name;
    config.ledger.hash_algorithm = options.hash_algorithm;
    config.quorum.threshold = options.threshold;
    config.storage.backend = StorageBackend::File;
    config.storage.path = Some(options.storage);
    for key_path in &options.keys {
        let key = KeyFile::read(key_path)?;
        config.signers.push(SignerEntry {
            id: key.id,
            public_key: key.public_key,
            authorized: true,
        });
    }
    config.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    std::fs::write(&path, config.to_toml_string()?)
        .with_context(|| format!("cannot write {}", path.display()))?;
    println!("✓ Configuration written to {}", path.display());
    Ok(())
}

pub fn propose(config: LedgerConfig, options: ProposeOptions) -> Result<()> {
    let runtime = LedgerRuntime::open(config)?;
    let proposer = runtime.proposer(options.proposer.as_str());
    let artifact_id = match (&options.payload, &options.patch, &options.parent) {
        (Some(path), _, Some(parent)) => {
            let parent = resolve_hash(runtime.ledger(), parent)?;
            proposer.propose_onto(Some(&parent), read_json(path)?)?
        }
        (Some(path), _, None) => proposer.propose(read_json(path)?)?,
        (None, Some(path), _) => {
            let patch: Patch = serde_json::from_value(read_json(path)?)
                .with_context(|| format!("{} is not a JSON patch", path.display()))?;
            proposer.propose_patch(&patch)?
        }
        (None, None, _) => bail!("either --payload or --patch is required"),
    };

    for key_path in &options.keys {
        let signer = KeyFile::read(key_path)?.signer()?;
        let state = proposer.attest(artifact_id, &signer)?;
        tracing::debug!(
            signer = %key_path.display(),
            counted = state.counted.len(),
            remaining = state.remaining(),
            "attestation registered"
        );
    }

    if let Some(state) = runtime.gate().state(artifact_id) {
        if !state.is_ratified() {
            proposer.cancel(artifact_id)?;
            bail!(
                "quorum not met: {} of {} authorized signatures",
                state.counted.len(),
                state.threshold
            );
        }
    }
    let head = match proposer.commit(artifact_id) {
        Ok(head) => head,
        Err(e) if e.is_stale_parent() => {
            bail!("{e}; rebase onto the current head and propose again")
        }
        Err(e) => return Err(e.into()),
    };
    println!("{head}");
    Ok(())
}

pub fn head(config: LedgerConfig) -> Result<()> {
    let runtime = LedgerRuntime::open(config)?;
    match runtime.ledger().get_head() {
        Some(head) => println!("{head}"),
        None => println!("<empty>"),
    }
    Ok(())
}

pub fn show(config: LedgerConfig, hash: &str) -> Result<()> {
    let runtime = LedgerRuntime::open(config)?;
    let entry = load_entry(runtime.ledger(), hash)?;
    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}

pub fn log(config: LedgerConfig, limit: Option<usize>) -> Result<()> {
    let runtime = LedgerRuntime::open(config)?;
    let history = runtime.ledger().history()?;
    let limit = limit.unwrap_or(history.len());
    for entry in history.iter().rev().take(limit) {
        println!(
            "{:>5}  {}  {:<16} {}  signers={}",
            entry.sequence(),
            entry.version_hash.short(),
            entry.content.proposer,
            entry.content.proposed_at.to_rfc3339(),
            entry.quorum_attestation.len()
        );
    }
    Ok(())
}

pub fn verify(config: LedgerConfig) -> Result<()> {
    let runtime = LedgerRuntime::open(config)?;
    let report = runtime.ledger().verify_chain()?;
    match report.head {
        Some(head) => println!("✓ Chain intact: {} entries, head {}", report.length, head),
        None => println!("✓ Chain empty"),
    }
    Ok(())
}

pub fn diff(config: LedgerConfig, hash: &str) -> Result<()> {
    let runtime = LedgerRuntime::open(config)?;
    let entry = load_entry(runtime.ledger(), hash)?;
    let pair = json!({
        "version_hash": entry.version_hash,
        "parent_hash": entry.content.parent_hash,
        "forward": entry.content.forward,
        "inverse": entry.content.inverse,
    });
    println!("{}", serde_json::to_string_pretty(&pair)?);
    Ok(())
}

pub fn state(config: LedgerConfig, at: Option<&str>) -> Result<()> {
    let runtime = LedgerRuntime::open(config)?;
    let ledger = runtime.ledger();
    let state = match at {
        None => ledger.replay()?,
        Some(text) => ledger.rollback_state(&resolve_hash(ledger, text)?)?,
    };
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn resolve_hash(ledger: &LedgerStore, text: &str) -> Result<Digest> {
    if text == "head" {
        return ledger.get_head().ok_or_else(|| anyhow!("ledger is empty"));
    }
    Digest::from_hex(text).map_err(|e| anyhow!("invalid hash '{text}': {e}"))
}

fn load_entry(ledger: &LedgerStore, text: &str) -> Result<CsrEntry> {
    let hash = resolve_hash(ledger, text)?;
    ledger
        .get_entry(&hash)?
        .ok_or_else(|| anyhow!("no entry {hash}"))
}
