use csr_hasher::{Digest, HashAlgorithm};
use csr_types::{CsrEntry, EntryStatus};
use csr_verifier::ManifestVerifier;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::{CommitError, Invariant, LedgerError, PersistenceError};
use crate::persistence::{HeadSwap, PersistenceAdapter};

/// Values pinned for the lifetime of one ledger epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreSettings {
    pub name: String,
    pub hash_algorithm: HashAlgorithm,
    pub epoch: u32,
    pub threshold: usize,
}

/// Outcome of a successful [`LedgerStore::verify_chain`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub length: usize,
    pub head: Option<Digest>,
}

/// Append-only, content-addressed ledger with a single compare-and-swap
/// commit primitive.
///
/// All admission checks (hash, signatures, quorum, sequence, diff replay)
/// run without any lock. Only "read head, compare, write, move head" runs
/// under the commit mutex, and the final head move is the backend's own
/// compare-and-swap, so stores in other threads or processes sharing the
/// backend cannot fork the chain. The cached head sits behind its own
/// `RwLock` that is held only to copy or swap a digest, so readers never
/// wait on storage I/O.
pub struct LedgerStore {
    settings: StoreSettings,
    verifier: ManifestVerifier,
    persistence: Arc<dyn PersistenceAdapter>,
    head: RwLock<Option<Digest>>,
    commit: Mutex<()>,
}

fn empty_state() -> Value {
    Value::Object(Map::new())
}

fn violation(hash: &Digest, invariant: Invariant, reason: impl Into<String>) -> LedgerError {
    let reason = reason.into();
    tracing::error!(version_hash = %hash, %invariant, %reason, "ledger integrity violation");
    LedgerError::IntegrityViolation {
        hash: hash.clone(),
        invariant,
        reason,
    }
}

/// Forward diff must rebuild `entry`'s payload from `base`, inverse must
/// rebuild `base` from the payload.
fn check_diffs(entry: &CsrEntry, base: &Value) -> Result<(), String> {
    let forward = entry
        .content
        .forward
        .apply(base)
        .map_err(|e| format!("forward diff does not apply to parent state: {e}"))?;
    if &forward != entry.payload() {
        return Err("forward diff does not reproduce the payload".into());
    }
    let inverse = entry
        .content
        .inverse
        .apply(entry.payload())
        .map_err(|e| format!("inverse diff does not apply to payload: {e}"))?;
    if &inverse != base {
        return Err("inverse diff does not restore the parent state".into());
    }
    Ok(())
}

impl LedgerStore {
    /// Open a ledger over `persistence`, validating the stored head.
    pub fn open(
        settings: StoreSettings,
        verifier: ManifestVerifier,
        persistence: Arc<dyn PersistenceAdapter>,
    ) -> Result<Self, LedgerError> {
        let head = persistence.get_latest_hash()?;
        if let Some(hash) = &head {
            let entry = persistence.get_artifact(hash)?.ok_or_else(|| {
                violation(
                    hash,
                    Invariant::HeadPointer,
                    "head pointer does not resolve to a stored entry",
                )
            })?;
            check_pinning(&settings, &entry).map_err(|reason| {
                violation(hash, Invariant::HashAlgorithm, reason)
            })?;
            let computed = entry.recompute_hash(verifier.policy())?;
            if &computed != hash {
                return Err(violation(
                    hash,
                    Invariant::ContentHash,
                    format!("stored head recomputes to {computed}"),
                ));
            }
        }
        tracing::info!(
            ledger = %settings.name,
            algorithm = %settings.hash_algorithm,
            epoch = settings.epoch,
            head = %head.as_ref().map(Digest::short).unwrap_or_default(),
            "ledger opened"
        );
        Ok(Self {
            settings,
            verifier,
            persistence,
            head: RwLock::new(head),
            commit: Mutex::new(()),
        })
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn verifier(&self) -> &ManifestVerifier {
        &self.verifier
    }

    /// Current head as last seen by this store, `None` before genesis.
    pub fn get_head(&self) -> Option<Digest> {
        self.head
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_cached_head(&self, head: Option<Digest>) {
        *self.head.write().unwrap_or_else(PoisonError::into_inner) = head;
    }

    /// Re-read the backend's head pointer into the cache.
    fn refresh_head(&self) -> Result<Option<Digest>, PersistenceError> {
        let persisted = self.persistence.get_latest_hash()?;
        self.set_cached_head(persisted.clone());
        Ok(persisted)
    }

    fn stale(&self, entry: &CsrEntry, current_head: Option<Digest>) -> CommitError {
        tracing::warn!(
            ledger = %self.settings.name,
            version_hash = %entry.version_hash.short(),
            current_head = %current_head.as_ref().map(Digest::short).unwrap_or_default(),
            "commit rejected: stale parent"
        );
        CommitError::StaleParent { current_head }
    }

    /// Commit `entry` as the new head if and only if the head still equals
    /// `expected_parent` (`None` for genesis).
    ///
    /// On success the entry is durable and `COMMITTED`, and its hash is
    /// returned. A moved head, whether moved by this store or by another
    /// one sharing the backend, yields [`CommitError::StaleParent`] and the
    /// head is left as the winner set it. A record stored just before a
    /// lost head swap stays unreferenced.
    pub fn append(
        &self,
        entry: CsrEntry,
        expected_parent: Option<&Digest>,
    ) -> Result<Digest, CommitError> {
        self.admit(&entry, expected_parent)?;
        let mut committed = entry;
        committed
            .transition(EntryStatus::Committed)
            .map_err(|e| CommitError::NotRatified(e.from))?;

        let _guard = self.commit.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.refresh_head()?;
        if current.as_ref() != expected_parent {
            return Err(self.stale(&committed, current));
        }
        self.persistence.put_artifact(&committed)?;
        match self
            .persistence
            .compare_and_set_head(expected_parent, &committed.version_hash)?
        {
            HeadSwap::Swapped => self.set_cached_head(Some(committed.version_hash.clone())),
            HeadSwap::Stale { current } => {
                self.set_cached_head(current.clone());
                return Err(self.stale(&committed, current));
            }
        }
        tracing::info!(
            ledger = %self.settings.name,
            version_hash = %committed.version_hash,
            sequence = committed.sequence(),
            signers = committed.quorum_attestation.len(),
            "entry committed"
        );
        Ok(committed.version_hash)
    }

    fn admit(&self, entry: &CsrEntry, expected_parent: Option<&Digest>) -> Result<(), CommitError> {
        if entry.status != EntryStatus::Ratified {
            return Err(CommitError::NotRatified(entry.status));
        }
        if entry.parent_hash() != expected_parent {
            return Err(CommitError::Admission {
                invariant: Invariant::ParentLink,
                reason: "entry parent_hash differs from the expected parent".into(),
            });
        }
        check_pinning(&self.settings, entry).map_err(|reason| CommitError::Admission {
            invariant: Invariant::HashAlgorithm,
            reason,
        })?;
        self.verifier.verify(entry.candidate())?;
        let have = self.authorized_attestations(entry);
        if have < self.settings.threshold {
            return Err(CommitError::QuorumNotMet {
                have,
                need: self.settings.threshold,
            });
        }

        let (base, expected_sequence) = match expected_parent {
            None => (empty_state(), 0),
            Some(hash) => match self.persistence.get_artifact(hash)? {
                Some(parent) => (parent.content.payload, parent.content.sequence + 1),
                None => {
                    return Err(CommitError::StaleParent {
                        current_head: self.get_head(),
                    })
                }
            },
        };
        if entry.sequence() != expected_sequence {
            return Err(CommitError::Admission {
                invariant: Invariant::Sequence,
                reason: format!(
                    "sequence {} does not follow parent (expected {})",
                    entry.sequence(),
                    expected_sequence
                ),
            });
        }
        check_diffs(entry, &base).map_err(|reason| CommitError::Admission {
            invariant: Invariant::DiffReplay,
            reason,
        })?;
        tracing::debug!(
            version_hash = %entry.version_hash.short(),
            forward_ops = entry.content.forward.len(),
            "admission checks passed"
        );
        Ok(())
    }

    /// Attestations from authorized signers. Signatures are assumed verified.
    fn authorized_attestations(&self, entry: &CsrEntry) -> usize {
        let registry = self.verifier.registry();
        entry
            .quorum_attestation
            .keys()
            .filter(|signer| registry.is_authorized(signer))
            .count()
    }

    /// Point lookup by content address. The stored record is re-hashed
    /// before it is returned.
    pub fn get_entry(&self, hash: &Digest) -> Result<Option<CsrEntry>, LedgerError> {
        let Some(entry) = self.persistence.get_artifact(hash)? else {
            return Ok(None);
        };
        let computed = entry.recompute_hash(self.verifier.policy())?;
        if &computed != hash || &entry.version_hash != hash {
            return Err(violation(
                hash,
                Invariant::ContentHash,
                format!("stored record recomputes to {computed}"),
            ));
        }
        Ok(Some(entry))
    }

    /// The head entry as currently persisted. Picks up commits made by
    /// other stores on the same backend.
    pub fn fetch_latest(&self) -> Result<Option<CsrEntry>, LedgerError> {
        match self.refresh_head()? {
            Some(head) => self.get_entry(&head),
            None => Ok(None),
        }
    }

    /// Every committed entry, genesis first.
    pub fn history(&self) -> Result<Vec<CsrEntry>, LedgerError> {
        let mut chain = Vec::new();
        let mut cursor = self.get_head();
        while let Some(hash) = cursor {
            let entry = self.get_entry(&hash)?.ok_or_else(|| {
                violation(
                    &hash,
                    Invariant::ParentLink,
                    "chain references an entry that is not stored",
                )
            })?;
            cursor = entry.content.parent_hash.clone();
            chain.push(entry);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Walk the whole chain and check every invariant. Stops at the first
    /// violation.
    pub fn verify_chain(&self) -> Result<ChainReport, LedgerError> {
        let chain = self.history()?;
        let mut parent: Option<&CsrEntry> = None;
        for entry in &chain {
            let hash = &entry.version_hash;
            check_pinning(&self.settings, entry)
                .map_err(|reason| violation(hash, Invariant::HashAlgorithm, reason))?;

            let expected_sequence = parent.map_or(0, |p| p.sequence() + 1);
            if entry.sequence() != expected_sequence {
                return Err(violation(
                    hash,
                    Invariant::Sequence,
                    format!(
                        "sequence {} where {} was expected",
                        entry.sequence(),
                        expected_sequence
                    ),
                ));
            }

            for (signer, signature) in &entry.quorum_attestation {
                self.verifier
                    .check_signature(hash, signer, signature)
                    .map_err(|e| violation(hash, Invariant::Quorum, e.to_string()))?;
            }
            let have = self.authorized_attestations(entry);
            if have < self.settings.threshold {
                return Err(violation(
                    hash,
                    Invariant::Quorum,
                    format!(
                        "{have} authorized signatures, threshold {}",
                        self.settings.threshold
                    ),
                ));
            }

            let base = parent.map_or_else(empty_state, |p| p.payload().clone());
            check_diffs(entry, &base).map_err(|reason| violation(hash, Invariant::DiffReplay, reason))?;
            parent = Some(entry);
        }
        tracing::info!(ledger = %self.settings.name, length = chain.len(), "chain verified");
        Ok(ChainReport {
            length: chain.len(),
            head: self.get_head(),
        })
    }

    /// Rebuild the head payload from `{}` through every forward diff.
    pub fn replay(&self) -> Result<Value, LedgerError> {
        let mut state = empty_state();
        for entry in self.history()? {
            state = entry.content.forward.apply(&state)?;
            if &state != entry.payload() {
                return Err(violation(
                    &entry.version_hash,
                    Invariant::DiffReplay,
                    "replayed state diverges from the stored payload",
                ));
            }
        }
        Ok(state)
    }

    /// Rebuild the payload of `target` by unwinding inverse diffs from the head.
    pub fn rollback_state(&self, target: &Digest) -> Result<Value, LedgerError> {
        let chain = self.history()?;
        let position = chain
            .iter()
            .position(|e| &e.version_hash == target)
            .ok_or_else(|| LedgerError::EntryNotFound(target.clone()))?;
        let mut state = chain
            .last()
            .map_or_else(empty_state, |head| head.payload().clone());
        for entry in chain[position + 1..].iter().rev() {
            state = entry.content.inverse.apply(&state)?;
        }
        tracing::debug!(
            target = %target.short(),
            unwound = chain.len() - position - 1,
            "state rolled back"
        );
        Ok(state)
    }

    /// Adopt the backend's head pointer after checking it against the
    /// cached head. A pointer that moved forward along the chain is
    /// accepted; one that vanished, went missing from the entry set, or
    /// does not descend from the cached head is an integrity violation.
    pub fn reconcile_head(&self) -> Result<Option<Digest>, LedgerError> {
        let persisted = self.persistence.get_latest_hash()?;
        let cached = self.get_head();
        let Some(head) = &persisted else {
            return match cached {
                Some(c) => Err(violation(
                    &c,
                    Invariant::HeadPointer,
                    "persisted head pointer is missing",
                )),
                None => Ok(None),
            };
        };
        if self.get_entry(head)?.is_none() {
            return Err(violation(
                head,
                Invariant::HeadPointer,
                "head pointer does not resolve to a stored entry",
            ));
        }
        if let Some(c) = cached.as_ref().filter(|c| *c != head) {
            if !self.descends_from(head, c)? {
                return Err(violation(
                    c,
                    Invariant::HeadPointer,
                    format!("persisted head {head} does not descend from the cached head"),
                ));
            }
            tracing::info!(
                ledger = %self.settings.name,
                from = %c.short(),
                to = %head.short(),
                "head advanced by another writer"
            );
        }
        self.set_cached_head(persisted.clone());
        Ok(persisted)
    }

    fn descends_from(&self, head: &Digest, ancestor: &Digest) -> Result<bool, LedgerError> {
        let mut cursor = Some(head.clone());
        while let Some(hash) = cursor {
            if &hash == ancestor {
                return Ok(true);
            }
            cursor = match self.get_entry(&hash)? {
                Some(entry) => entry.content.parent_hash,
                None => None,
            };
        }
        Ok(false)
    }
}

fn check_pinning(settings: &StoreSettings, entry: &CsrEntry) -> Result<(), String> {
    let content = &entry.content;
    if content.hash_algorithm != settings.hash_algorithm {
        return Err(format!(
            "entry uses {} but the ledger is pinned to {}",
            content.hash_algorithm, settings.hash_algorithm
        ));
    }
    if content.epoch != settings.epoch {
        return Err(format!(
            "entry belongs to epoch {} but the ledger is at epoch {}",
            content.epoch, settings.epoch
        ));
    }
    Ok(())
}

impl std::fmt::Debug for LedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerStore")
            .field("settings", &self.settings)
            .field("head", &self.get_head())
            .finish_non_exhaustive()
    }
}
