//! Install use case - resolve a reference, plan it, execute the plan.

use anyhow::Result;
use log::info;

use crate::error::CaskError;
use crate::executor::{ArtifactFetcher, Executor};
use crate::manifest::{PackageManifest, PackageRef};
use crate::resolver::{FamilyPolicy, HostPlatform, InstallPlan, Planner};
use crate::runtime::Runtime;
use crate::state::{InstallationRecord, RecordRepository};
use crate::store::ManifestStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Plan dependencies missing from the installed set instead of failing.
    pub with_deps: bool,
    pub policy: FamilyPolicy,
}

#[derive(Debug)]
pub struct InstallOutcome {
    pub plan: InstallPlan,
    pub record: InstallationRecord,
}

pub struct InstallUseCase<'a, R: Runtime + ?Sized, F: ArtifactFetcher + ?Sized> {
    store: &'a ManifestStore,
    records: RecordRepository<'a, R>,
    executor: &'a Executor<'a, R, F>,
    host: HostPlatform,
}

impl<'a, R: Runtime + ?Sized, F: ArtifactFetcher + ?Sized> InstallUseCase<'a, R, F> {
    pub fn new(
        store: &'a ManifestStore,
        records: RecordRepository<'a, R>,
        executor: &'a Executor<'a, R, F>,
        host: HostPlatform,
    ) -> Self {
        Self {
            store,
            records,
            executor,
            host,
        }
    }

    /// The manifest `reference` names: the pinned version, or the newest one.
    pub fn resolve(&self, reference: &PackageRef) -> Result<&'a PackageManifest> {
        self.store.find_ref(reference).ok_or_else(|| {
            let known = self.store.all_versions(&reference.name);
            let message = if known.is_empty() {
                format!("no manifest for {}", reference)
            } else {
                format!(
                    "no manifest for {} (available: {})",
                    reference,
                    known
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            };
            CaskError::NotFound(message).into()
        })
    }

    pub fn plan(&self, reference: &PackageRef, options: InstallOptions) -> Result<InstallPlan> {
        let target = self.resolve(reference)?;
        let installed = self.records.load_all()?;
        let plan = Planner::new(self.store, self.host.clone())
            .with_policy(options.policy)
            .with_auto_resolve(options.with_deps)
            .plan_install(target, &installed)?;
        Ok(plan)
    }

    #[tracing::instrument(skip(self, options))]
    pub async fn install(
        &self,
        reference: &PackageRef,
        options: InstallOptions,
    ) -> Result<InstallOutcome> {
        let plan = self.plan(reference, options)?;
        if !plan.already_installed {
            info!(
                "Installing {} ({} package(s))",
                plan.target.id(),
                plan.len()
            );
        }
        let record = self.executor.execute(&plan).await?;
        Ok(InstallOutcome { plan, record })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_archives::write_zip;
    use crate::executor::MockArtifactFetcher;
    use crate::layout::Layout;
    use crate::manifest::{Checksum, InstallAction, OsRequirement, Version};
    use crate::resolver::PlanStep;
    use crate::runtime::RealRuntime;
    use crate::test_utils::{manifest, record};
    use std::fs;
    use tempfile::tempdir;

    fn macos() -> HostPlatform {
        HostPlatform::new("macos", Some(Version::parse("14.2").unwrap()))
    }

    fn zip_bytes(dir: &std::path::Path) -> Vec<u8> {
        let path = dir.join("fixture.zip");
        write_zip(&path, &[("Godot.app/Contents/MacOS/Godot", "bin", 0o755)]).unwrap();
        fs::read(path).unwrap()
    }

    fn serving(bytes: Vec<u8>) -> MockArtifactFetcher {
        let mut fetcher = MockArtifactFetcher::new();
        fetcher.expect_fetch().returning(move |_, dest| {
            fs::write(dest, &bytes)?;
            Ok(Checksum::of_bytes(&bytes).as_hex().to_string())
        });
        fetcher
    }

    fn godot(version: &str, zip: &[u8]) -> PackageManifest {
        let mut m = manifest("godot", version);
        m.checksum = Checksum::of_bytes(zip);
        m.requires_os = Some(OsRequirement {
            os: "macos".into(),
            min_version: Some(Version::parse("10.12").unwrap()),
        });
        m.install = vec![InstallAction::App {
            source: "Godot.app".into(),
            target: Some("Godot {version}.app".into()),
        }];
        m
    }

    #[tokio::test]
    async fn test_install_godot_records_name_and_version() {
        let dir = tempdir().unwrap();
        let zip = zip_bytes(dir.path());
        let layout = Layout::new(dir.path().join("root"));
        let store = ManifestStore::from_manifests([godot("3.0", &zip), godot("4.0", &zip)]).unwrap();
        let fetcher = serving(zip);
        let executor = Executor::new(&RealRuntime, &fetcher, &layout);
        let use_case = InstallUseCase::new(
            &store,
            RecordRepository::new(&RealRuntime, &layout),
            &executor,
            macos(),
        );

        let reference: PackageRef = "godot@4.0".parse().unwrap();
        let plan = use_case.plan(&reference, InstallOptions::default()).unwrap();
        assert!(matches!(plan.target.steps[0], PlanStep::Fetch { .. }));
        assert!(matches!(plan.target.steps[1], PlanStep::Action(InstallAction::App { .. })));

        let outcome = use_case
            .install(&reference, InstallOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.record.name, "godot");
        assert_eq!(outcome.record.version.to_string(), "4.0");
        assert!(layout.appdir().join("Godot 4.0.app").exists());
    }

    #[tokio::test]
    async fn test_install_unknown_package_is_not_found() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf());
        let store = ManifestStore::from_manifests([manifest("godot", "4.0")]).unwrap();
        let fetcher = MockArtifactFetcher::new();
        let executor = Executor::new(&RealRuntime, &fetcher, &layout);
        let use_case = InstallUseCase::new(
            &store,
            RecordRepository::new(&RealRuntime, &layout),
            &executor,
            macos(),
        );

        let err = use_case
            .install(&"godot@9.9".parse().unwrap(), InstallOptions::default())
            .await
            .unwrap_err();
        let err = err.downcast_ref::<CaskError>().unwrap();
        assert_eq!(err.exit_code(), 9);
        assert!(err.to_string().contains("available: 4.0"));
    }

    #[tokio::test]
    async fn test_conflict_with_installed_version_blocks_install() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf());
        let records = RecordRepository::new(&RealRuntime, &layout);
        records.save(&record(manifest("godot-mono", "3.3.4"))).unwrap();

        let mut mono = manifest("godot-mono", "4.0");
        mono.conflicts_with = vec!["godot-mono@3.3.4".parse().unwrap()];
        let store =
            ManifestStore::from_manifests([manifest("godot-mono", "3.3.4"), mono]).unwrap();
        let fetcher = MockArtifactFetcher::new();
        let executor = Executor::new(&RealRuntime, &fetcher, &layout);
        let use_case = InstallUseCase::new(&store, records, &executor, macos());

        let err = use_case
            .install(&"godot-mono@4.0".parse().unwrap(), InstallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaskError>(),
            Some(CaskError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_with_deps_installs_dependency_first() {
        let dir = tempdir().unwrap();
        let zip = zip_bytes(dir.path());
        let layout = Layout::new(dir.path().join("root"));

        let mut sdk = manifest("dotnet-sdk", "8.0");
        sdk.checksum = Checksum::of_bytes(&zip);
        let mut mono = manifest("godot-mono", "4.0");
        mono.checksum = Checksum::of_bytes(&zip);
        mono.depends_on = vec!["dotnet-sdk".parse().unwrap()];
        let store = ManifestStore::from_manifests([sdk.clone(), mono]).unwrap();

        let fetcher = serving(zip);
        let executor = Executor::new(&RealRuntime, &fetcher, &layout);
        let records = RecordRepository::new(&RealRuntime, &layout);
        let use_case = InstallUseCase::new(&store, records, &executor, macos());
        let reference: PackageRef = "godot-mono".parse().unwrap();

        let err = use_case
            .install(&reference, InstallOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<CaskError>().unwrap().exit_code(), 4);

        let outcome = use_case
            .install(
                &reference,
                InstallOptions {
                    with_deps: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.plan.dependencies.len(), 1);
        assert!(layout.record_path(&sdk.id()).exists());
    }
}
