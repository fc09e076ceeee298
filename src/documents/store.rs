//! Document operations used by the HTTP layer.
//!
//! The directory is the source of truth: `list` re-enumerates it on every call and
//! nothing is cached, so a document added or removed behind the server's back shows up
//! on the next request. Writes are whole-file replaces and there is no locking; two
//! writers racing on the same name leave whichever finished last.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use crate::error::{AppError, AppResult};

use super::names::{classify_extension, derive_copy_name, validate_new_name};
use super::render::render_bytes;
use super::repo::DocumentRepository;

#[derive(Clone)]
pub struct DocumentStore {
    repo: Arc<dyn DocumentRepository>,
}

impl DocumentStore {
    pub fn new(repo: Arc<dyn DocumentRepository>) -> Self { Self { repo } }

    pub fn list(&self) -> AppResult<BTreeSet<String>> {
        Ok(self.repo.list_entries()?.into_iter().collect())
    }

    pub fn read_raw(&self, name: &str) -> AppResult<Vec<u8>> {
        if !self.list()?.contains(name) {
            return Err(AppError::NotFound(name.to_string()));
        }
        self.repo.read(name)
    }

    pub fn read_rendered(&self, name: &str) -> AppResult<String> {
        let raw = self.read_raw(name)?;
        Ok(render_bytes(&raw, classify_extension(name)))
    }

    /// Create an empty document. `existing` is the listing the caller just took; the
    /// returned name is the trimmed candidate that was actually stored.
    pub fn create(&self, candidate: &str, existing: &BTreeSet<String>) -> AppResult<String> {
        let name = validate_new_name(candidate, existing)?;
        self.repo.write(&name, b"")?;
        info!(target: "flatcms::documents", "created {}", name);
        Ok(name)
    }

    /// Overwrite the full content. No existence check.
    pub fn write(&self, name: &str, content: &[u8]) -> AppResult<()> {
        self.repo.write(name, content)?;
        info!(target: "flatcms::documents", "updated {} ({} bytes)", name, content.len());
        Ok(())
    }

    pub fn delete(&self, name: &str) -> AppResult<()> {
        self.repo.delete(name)?;
        info!(target: "flatcms::documents", "deleted {}", name);
        Ok(())
    }

    /// Copy `name` to its `_copy` sibling and return the sibling's name. An existing
    /// copy is overwritten.
    pub fn duplicate(&self, name: &str) -> AppResult<String> {
        let content = self.read_raw(name)?;
        let copy = derive_copy_name(name).ok_or(AppError::InvalidExtension)?;
        self.repo.write(&copy, &content)?;
        info!(target: "flatcms::documents", "duplicated {} -> {}", name, copy);
        Ok(copy)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
