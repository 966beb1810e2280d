use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Where sub-artifact bytes are read from during checksum verification.
pub trait ArtifactSource: Send + Sync {
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// Sub-artifacts held in memory, keyed by their manifest path.
#[derive(Clone, Debug, Default)]
pub struct InMemoryArtifactSource {
    files: HashMap<String, Vec<u8>>,
}

impl InMemoryArtifactSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn with_file(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }
}

impl ArtifactSource for InMemoryArtifactSource {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no artifact at '{path}'")))
    }
}

/// Sub-artifacts on disk under a bundle root. Manifest paths are relative
/// and may not leave the root.
#[derive(Clone, Debug)]
pub struct FsArtifactSource {
    root: PathBuf,
}

impl FsArtifactSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("artifact path '{path}' escapes the bundle root"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl ArtifactSource for FsArtifactSource {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path)?)
    }
}

/// Source with no artifacts. Any referenced sub-artifact is reported missing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoArtifacts;

impl ArtifactSource for NoArtifacts {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no artifact source configured for '{path}'"),
        ))
    }
}
