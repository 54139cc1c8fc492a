//! Uninstall use case - pick the installed record a reference names and remove it.

use anyhow::Result;

use crate::error::CaskError;
use crate::executor::{ArtifactFetcher, Executor, UninstallOptions, UninstallReport};
use crate::manifest::PackageRef;
use crate::runtime::Runtime;
use crate::state::{InstallationRecord, InstalledSet, RecordRepository};

pub struct UninstallUseCase<'a, R: Runtime + ?Sized, F: ArtifactFetcher + ?Sized> {
    records: RecordRepository<'a, R>,
    executor: &'a Executor<'a, R, F>,
}

impl<'a, R: Runtime + ?Sized, F: ArtifactFetcher + ?Sized> UninstallUseCase<'a, R, F> {
    pub fn new(records: RecordRepository<'a, R>, executor: &'a Executor<'a, R, F>) -> Self {
        Self { records, executor }
    }

    /// The single installed record `reference` names. An unpinned reference
    /// is ambiguous when several versions are installed.
    fn select(installed: &InstalledSet, reference: &PackageRef) -> Result<InstallationRecord> {
        let matches: Vec<&InstallationRecord> = installed.matching(reference).collect();
        match matches.as_slice() {
            [] => Err(CaskError::NotFound(format!("{} is not installed", reference)).into()),
            [record] => Ok((*record).clone()),
            several => Err(CaskError::NotFound(format!(
                "{} matches several installed versions ({}); name one as {}@<version>",
                reference,
                several
                    .iter()
                    .map(|r| r.version.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                reference.name
            ))
            .into()),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn uninstall(
        &self,
        reference: &PackageRef,
        options: UninstallOptions,
    ) -> Result<UninstallReport> {
        let installed = self.records.load_all()?;
        let record = Self::select(&installed, reference)?;
        Ok(self.executor.uninstall(&record, &installed, options).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockArtifactFetcher;
    use crate::layout::Layout;
    use crate::runtime::RealRuntime;
    use crate::test_utils::{manifest, record};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_uninstall_pinned_version() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf());
        let records = RecordRepository::new(&RealRuntime, &layout);
        records.save(&record(manifest("godot", "3.0"))).unwrap();
        records.save(&record(manifest("godot", "4.0"))).unwrap();

        let fetcher = MockArtifactFetcher::new();
        let executor = Executor::new(&RealRuntime, &fetcher, &layout);
        let use_case = UninstallUseCase::new(RecordRepository::new(&RealRuntime, &layout), &executor);

        let report = use_case
            .uninstall(&"godot@3.0".parse().unwrap(), UninstallOptions::default())
            .await
            .unwrap();
        assert_eq!(report.package.to_string(), "godot@3.0");
        assert!(!layout.record_path(&manifest("godot", "3.0").id()).exists());
        assert!(layout.record_path(&manifest("godot", "4.0").id()).exists());
    }

    #[tokio::test]
    async fn test_unpinned_reference_with_several_versions_is_ambiguous() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf());
        let records = RecordRepository::new(&RealRuntime, &layout);
        records.save(&record(manifest("godot", "3.0"))).unwrap();
        records.save(&record(manifest("godot", "4.0"))).unwrap();

        let fetcher = MockArtifactFetcher::new();
        let executor = Executor::new(&RealRuntime, &fetcher, &layout);
        let use_case = UninstallUseCase::new(records, &executor);

        let err = use_case
            .uninstall(&"godot".parse().unwrap(), UninstallOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("4.0, 3.0"));
    }

    #[tokio::test]
    async fn test_not_installed() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf());
        let fetcher = MockArtifactFetcher::new();
        let executor = Executor::new(&RealRuntime, &fetcher, &layout);
        let use_case = UninstallUseCase::new(RecordRepository::new(&RealRuntime, &layout), &executor);

        let err = use_case
            .uninstall(&"godot".parse().unwrap(), UninstallOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<CaskError>().unwrap().exit_code(), 9);
    }
}
