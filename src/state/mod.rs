//! Installed state: installation records and their persistence.

mod installed;
mod record;

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::layout::Layout;
use crate::manifest::PackageId;
use crate::runtime::Runtime;

pub use installed::InstalledSet;
pub use record::{FileKind, InstallationRecord, InstalledFile};

/// Reads and writes installation records under the install root.
pub struct RecordRepository<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    layout: &'a Layout,
}

impl<'a, R: Runtime + ?Sized> RecordRepository<'a, R> {
    pub fn new(runtime: &'a R, layout: &'a Layout) -> Self {
        Self { runtime, layout }
    }

    pub fn exists(&self, id: &PackageId) -> bool {
        self.runtime.exists(&self.layout.record_path(id))
    }

    /// Load the record for `id`, or `None` when it is not installed.
    pub fn load(&self, id: &PackageId) -> Result<Option<InstallationRecord>> {
        let path = self.layout.record_path(id);
        if !self.runtime.exists(&path) {
            return Ok(None);
        }
        let content = self
            .runtime
            .read_to_string(&path)
            .with_context(|| format!("Failed to read record {:?}", path))?;
        let record = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse record {:?}", path))?;
        Ok(Some(record))
    }

    pub fn save(&self, record: &InstallationRecord) -> Result<()> {
        let path = self.layout.record_path(&record.id());
        if let Some(parent) = path.parent()
            && !self.runtime.exists(parent)
        {
            self.runtime.create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(record)?;
        self.runtime
            .write(&path, content.as_bytes())
            .with_context(|| format!("Failed to save record to {:?}", path))
    }

    pub fn delete(&self, id: &PackageId) -> Result<()> {
        let path = self.layout.record_path(id);
        self.runtime
            .trash(&path)
            .with_context(|| format!("Failed to delete record {:?}", path))?;

        // Drop the family directory once nothing is left in it.
        let family = self.layout.family_dir(&id.name);
        if self.runtime.is_dir(&family)
            && self.runtime.read_dir(&family).map(|e| e.is_empty()).unwrap_or(false)
        {
            debug!("Removing empty family directory {:?}", family);
            self.runtime.remove_dir_all(&family)?;
        }
        Ok(())
    }

    /// Load every record under the install root.
    ///
    /// Unreadable records are skipped with a warning so one corrupt file does
    /// not hide the rest of the installation.
    pub fn load_all(&self) -> Result<InstalledSet> {
        let caskroom = self.layout.caskroom();
        let mut set = InstalledSet::new();
        if !self.runtime.exists(&caskroom) {
            return Ok(set);
        }

        for family in self.runtime.read_dir(&caskroom)? {
            if !self.runtime.is_dir(&family) {
                continue;
            }
            for path in self.runtime.read_dir(&family)? {
                if !Layout::is_record_file(&path) {
                    continue;
                }
                let parsed = self
                    .runtime
                    .read_to_string(&path)
                    .and_then(|c| serde_json::from_str::<InstallationRecord>(&c).map_err(Into::into));
                match parsed {
                    Ok(record) => set.insert(record),
                    Err(e) => warn!("Skipping unreadable record {:?}: {:#}", path, e),
                }
            }
        }
        debug!("Loaded {} installation records", set.len());
        Ok(set)
    }
}
