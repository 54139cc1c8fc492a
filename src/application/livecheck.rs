//! Livecheck use case - compare the upstream version with the store.

use anyhow::Result;

use crate::error::CaskError;
use crate::livecheck::{Livecheck, VersionInfo, is_outdated};
use crate::manifest::Version;
use crate::store::ManifestStore;

#[derive(Debug, Clone)]
pub struct LivecheckReport {
    pub name: String,
    /// Newest version in the store.
    pub current: Version,
    pub latest: VersionInfo,
    pub outdated: bool,
}

pub struct LivecheckUseCase<'a> {
    store: &'a ManifestStore,
    livecheck: &'a Livecheck<'a>,
}

impl<'a> LivecheckUseCase<'a> {
    pub fn new(store: &'a ManifestStore, livecheck: &'a Livecheck<'a>) -> Self {
        Self { store, livecheck }
    }

    #[tracing::instrument(skip(self))]
    pub async fn check(&self, name: &str) -> Result<LivecheckReport> {
        let manifest = self
            .store
            .find(name, None)
            .ok_or_else(|| CaskError::NotFound(format!("no manifest for {}", name)))?;
        let latest = self.livecheck.check_manifest(manifest).await?;
        Ok(LivecheckReport {
            name: name.to_string(),
            current: manifest.version.clone(),
            outdated: is_outdated(Some(&manifest.version), &latest.version),
            latest,
        })
    }
}
