use csr_hasher::Digest;
use csr_types::CsrEntry;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{HeadSwap, PersistenceAdapter};
use crate::error::PersistenceError;

const ENTRIES_DIR: &str = "entries";
const HEAD_FILE: &str = "HEAD";
const LOCK_FILE: &str = "LOCK";

/// Directory-backed ledger storage.
///
/// ```text
/// <root>/
///   entries/<version_hash hex>.json   one record per committed entry
///   HEAD                              hex of the current head, no newline
///   LOCK                              held exclusively while HEAD is swapped
/// ```
///
/// Records are written to a temporary sibling, fsynced and renamed into
/// place, then the directory itself is fsynced. The head swap reads and
/// rewrites `HEAD` under an exclusive lock on `LOCK`, so every process
/// sharing the directory sees one linear chain.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    root: PathBuf,
}

impl FilePersistence {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        fs::create_dir_all(root.join(ENTRIES_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, hash: &Digest) -> PathBuf {
        self.root
            .join(ENTRIES_DIR)
            .join(format!("{}.json", hash.to_hex()))
    }

    /// Block until this handle holds the directory's exclusive lock. The
    /// lock is released when the returned file is dropped.
    fn lock(&self) -> Result<File, PersistenceError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.root.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    /// Hashes of every stored record, committed or orphaned.
    pub fn list_hashes(&self) -> Result<Vec<Digest>, PersistenceError> {
        let mut hashes = Vec::new();
        for dirent in fs::read_dir(self.root.join(ENTRIES_DIR))? {
            let name = dirent?.file_name();
            let name = name.to_string_lossy();
            if let Some(hex) = name.strip_suffix(".json") {
                if let Ok(hash) = Digest::from_hex(hex) {
                    hashes.push(hash);
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }
}

fn write_durable(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = dir.join(format!(".{}.tmp", name.to_string_lossy()));
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    sync_dir(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

impl PersistenceAdapter for FilePersistence {
    fn put_artifact(&self, entry: &CsrEntry) -> Result<(), PersistenceError> {
        let record = serde_json::to_vec_pretty(entry)?;
        write_durable(&self.entry_path(&entry.version_hash), &record)?;
        tracing::debug!(
            version_hash = %entry.version_hash.short(),
            bytes = record.len(),
            "entry persisted"
        );
        Ok(())
    }

    fn compare_and_set_head(
        &self,
        expected: Option<&Digest>,
        new: &Digest,
    ) -> Result<HeadSwap, PersistenceError> {
        let _lock = self.lock()?;
        let current = self.get_latest_hash()?;
        if current.as_ref() != expected {
            return Ok(HeadSwap::Stale { current });
        }
        write_durable(&self.root.join(HEAD_FILE), new.to_hex().as_bytes())?;
        Ok(HeadSwap::Swapped)
    }

    fn get_latest_hash(&self) -> Result<Option<Digest>, PersistenceError> {
        let text = match fs::read_to_string(self.root.join(HEAD_FILE)) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let text = text.trim();
        Digest::from_hex(text)
            .map(Some)
            .map_err(|_| PersistenceError::MalformedDigest(text.to_string()))
    }

    fn get_artifact(&self, hash: &Digest) -> Result<Option<CsrEntry>, PersistenceError> {
        let bytes = match fs::read(self.entry_path(hash)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
