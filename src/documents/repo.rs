//! Backing storage for documents.
//!
//! The store only ever talks to a [`DocumentRepository`], so the flat directory can be
//! replaced by another whole-object backend without touching the naming or rendering
//! rules. Every operation is synchronous and works on complete files.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{AppError, AppResult};

use super::names::is_plain_entry_name;

pub trait DocumentRepository: Send + Sync {
    /// Base names of every stored document, in no guaranteed order.
    fn list_entries(&self) -> AppResult<Vec<String>>;
    fn read(&self, name: &str) -> AppResult<Vec<u8>>;
    /// Replace the whole content of `name`, creating it when absent.
    fn write(&self, name: &str, content: &[u8]) -> AppResult<()>;
    fn delete(&self, name: &str) -> AppResult<()>;
}

/// Documents as regular files directly inside one directory.
#[derive(Debug, Clone)]
pub struct FsRepository {
    root: PathBuf,
}

impl FsRepository {
    /// Open a repository rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path { &self.root }

    fn entry_path(&self, name: &str) -> AppResult<PathBuf> {
        if !is_plain_entry_name(name) {
            return Err(AppError::InvalidName);
        }
        Ok(self.root.join(name))
    }
}

fn not_found_as(name: &str, err: std::io::Error) -> AppError {
    if err.kind() == ErrorKind::NotFound { AppError::NotFound(name.to_string()) } else { AppError::Io(err) }
}

impl DocumentRepository for FsRepository {
    fn list_entries(&self) -> AppResult<Vec<String>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() { continue; }
            let name = entry.file_name().to_string_lossy().to_string();
            // dot-files include in-flight temp files from `write`
            if name.starts_with('.') { continue; }
            out.push(name);
        }
        Ok(out)
    }

    fn read(&self, name: &str) -> AppResult<Vec<u8>> {
        let p = self.entry_path(name)?;
        fs::read(&p).map_err(|e| not_found_as(name, e))
    }

    fn write(&self, name: &str, content: &[u8]) -> AppResult<()> {
        let p = self.entry_path(name)?;
        // Stage next to the target so the final rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&p).map_err(|e| AppError::Io(e.error))?;
        debug!(target: "flatcms::documents", "wrote {} ({} bytes)", p.display(), content.len());
        Ok(())
    }

    fn delete(&self, name: &str) -> AppResult<()> {
        let p = self.entry_path(name)?;
        fs::remove_file(&p).map_err(|e| not_found_as(name, e))
    }
}

/// In-process repository. Useful for tests and for embedding the store without a disk.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    docs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryRepository {
    pub fn new() -> Self { Self::default() }

    pub fn with_documents<I, N, C>(docs: I) -> Self
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<Vec<u8>>,
    {
        let map = docs.into_iter().map(|(n, c)| (n.into(), c.into())).collect();
        Self { docs: RwLock::new(map) }
    }

    pub fn names(&self) -> BTreeSet<String> { self.docs.read().keys().cloned().collect() }
}

impl DocumentRepository for MemoryRepository {
    fn list_entries(&self) -> AppResult<Vec<String>> {
        Ok(self.docs.read().keys().cloned().collect())
    }

    fn read(&self, name: &str) -> AppResult<Vec<u8>> {
        self.docs.read().get(name).cloned().ok_or_else(|| AppError::NotFound(name.to_string()))
    }

    fn write(&self, name: &str, content: &[u8]) -> AppResult<()> {
        if !is_plain_entry_name(name) { return Err(AppError::InvalidName); }
        self.docs.write().insert(name.to_string(), content.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> AppResult<()> {
        self.docs.write().remove(name).map(|_| ()).ok_or_else(|| AppError::NotFound(name.to_string()))
    }
}
