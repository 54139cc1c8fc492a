//! Write-ahead journal of an install in progress.
//!
//! Every filesystem effect is appended and persisted before it is made, so
//! an interrupted install can be reverted from the journal alone.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::layout::Layout;
use crate::manifest::{PackageId, Version};
use crate::runtime::Runtime;
use crate::state::{FileKind, InstalledFile};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct JournalFile {
    name: String,
    version: Version,
    effects: Vec<InstalledFile>,
}

pub struct Journal<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    path: PathBuf,
    file: JournalFile,
}

impl<'a, R: Runtime + ?Sized> Journal<'a, R> {
    /// Start an empty journal for `id`, replacing any previous one.
    pub fn begin(runtime: &'a R, layout: &Layout, id: &PackageId) -> Result<Self> {
        let path = layout.journal_path(id);
        if let Some(parent) = path.parent() {
            runtime.create_dir_all(parent)?;
        }
        let journal = Self {
            runtime,
            path,
            file: JournalFile {
                name: id.name.clone(),
                version: id.version.clone(),
                effects: Vec::new(),
            },
        };
        journal.persist()?;
        Ok(journal)
    }

    /// Load a journal left behind by an interrupted install.
    pub fn open(runtime: &'a R, layout: &Layout, id: &PackageId) -> Result<Option<Self>> {
        let path = layout.journal_path(id);
        if !runtime.exists(&path) {
            return Ok(None);
        }
        let content = runtime
            .read_to_string(&path)
            .with_context(|| format!("Failed to read journal {:?}", path))?;
        let file = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse journal {:?}", path))?;
        Ok(Some(Self {
            runtime,
            path,
            file,
        }))
    }

    /// Persist `kind`/`path` before the caller makes the effect.
    pub fn record(&mut self, kind: FileKind, path: impl Into<PathBuf>) -> Result<()> {
        self.file.effects.push(InstalledFile::new(kind, path));
        self.persist()
    }

    pub fn effects(&self) -> &[InstalledFile] {
        &self.file.effects
    }

    fn persist(&self) -> Result<()> {
        let content = serde_json::to_vec_pretty(&self.file)?;
        self.runtime
            .write(&self.path, &content)
            .with_context(|| format!("Failed to write journal {:?}", self.path))
    }

    /// Remove the journal file; the effects are now owned by a record or undone.
    pub fn close(self) -> Result<Vec<InstalledFile>> {
        self.runtime
            .trash(&self.path)
            .with_context(|| format!("Failed to remove journal {:?}", self.path))?;
        Ok(self.file.effects)
    }
}
