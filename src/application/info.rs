//! Info use case - what the store offers for a family and what is installed.

use anyhow::Result;

use crate::error::CaskError;
use crate::manifest::{PackageManifest, Version};
use crate::runtime::Runtime;
use crate::state::RecordRepository;
use crate::store::ManifestStore;

#[derive(Debug, Clone)]
pub struct PackageInfo {
    pub name: String,
    /// Available versions, newest first.
    pub versions: Vec<Version>,
    /// Installed versions, newest first.
    pub installed: Vec<Version>,
    /// Newest manifest in the store, or the newest installed snapshot.
    pub manifest: PackageManifest,
}

pub struct InfoUseCase<'a, R: Runtime + ?Sized> {
    store: &'a ManifestStore,
    records: RecordRepository<'a, R>,
}

impl<'a, R: Runtime + ?Sized> InfoUseCase<'a, R> {
    pub fn new(store: &'a ManifestStore, records: RecordRepository<'a, R>) -> Self {
        Self { store, records }
    }

    pub fn info(&self, name: &str) -> Result<PackageInfo> {
        let installed_set = self.records.load_all()?;
        let installed: Vec<Version> = installed_set
            .family(name)
            .map(|r| r.version.clone())
            .collect();

        let manifest = self
            .store
            .find(name, None)
            .cloned()
            .or_else(|| installed_set.family(name).next().map(|r| r.manifest.clone()))
            .ok_or_else(|| CaskError::NotFound(format!("no package named {}", name)))?;

        Ok(PackageInfo {
            name: name.to_string(),
            versions: self.store.all_versions(name),
            installed,
            manifest,
        })
    }
}
