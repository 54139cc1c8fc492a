//! Plan execution and uninstallation.
//!
//! # Structure
//!
//! - `fetch` - Artifact retrieval over HTTP(S) or from `file://` URLs
//! - `journal` - Write-ahead journal of the effects of an install in progress
//! - `locks` - Per-path mutual exclusion between concurrent operations
//! - `steps` - Interpretation of install actions
//!
//! Every artifact in a plan is fetched and verified before the first
//! filesystem effect. Each package is then applied on its own: its effects are
//! journaled before they are made, undone in reverse order on failure, and
//! handed to an [`InstallationRecord`] on success.

mod fetch;
mod journal;
mod locks;
mod steps;

use anyhow::{Context, anyhow};
use futures_util::future::try_join_all;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

use crate::archive::ArtifactStager;
use crate::error::{CaskError, CaskResult};
use crate::layout::Layout;
use crate::manifest::{PackageId, UninstallAction};
use crate::resolver::{InstallPlan, PlanStep, PlannedInstall};
use crate::runtime::Runtime;
use crate::state::{FileKind, InstallationRecord, InstalledFile, InstalledSet, RecordRepository};

pub use fetch::{ArtifactFetcher, HttpFetcher};
#[cfg(test)]
pub use fetch::MockArtifactFetcher;
pub use journal::Journal;
pub use locks::{PathGuard, PathLocks};

use steps::StepRunner;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UninstallOptions {
    /// Also remove the manifest's cleanup paths.
    pub deep_clean: bool,
    /// Uninstall even when other installed packages depend on this one.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallReport {
    pub package: PackageId,
    /// Bundle identifiers that were asked to quit.
    pub quit: Vec<String>,
    pub removed: Vec<PathBuf>,
    /// Paths removed by deep clean.
    pub cleaned: Vec<PathBuf>,
}

fn execution(id: &PackageId, source: anyhow::Error, rollback_succeeded: bool) -> CaskError {
    CaskError::Execution {
        package: id.to_string(),
        source,
        rollback_succeeded,
    }
}

pub struct Executor<'a, R: Runtime + ?Sized, F: ArtifactFetcher + ?Sized> {
    runtime: &'a R,
    fetcher: &'a F,
    layout: &'a Layout,
    locks: PathLocks,
    stager: ArtifactStager,
}

impl<'a, R: Runtime + ?Sized, F: ArtifactFetcher + ?Sized> Executor<'a, R, F> {
    pub fn new(runtime: &'a R, fetcher: &'a F, layout: &'a Layout) -> Self {
        Self {
            runtime,
            fetcher,
            layout,
            locks: PathLocks::new(),
            stager: ArtifactStager::new(),
        }
    }

    /// Share a lock table with other executors over the same install root.
    pub fn with_locks(mut self, locks: PathLocks) -> Self {
        self.locks = locks;
        self
    }

    fn records(&self) -> RecordRepository<'a, R> {
        RecordRepository::new(self.runtime, self.layout)
    }

    fn load_record(&self, id: &PackageId) -> CaskResult<InstallationRecord> {
        self.records()
            .load(id)
            .and_then(|r| r.ok_or_else(|| anyhow!("No installation record for {}", id)))
            .map_err(|e| execution(id, e, true))
    }

    /// Paths a planned package will create, used as its lock set.
    fn claimed_paths(&self, planned: &PlannedInstall) -> Vec<PathBuf> {
        let runner = StepRunner::new(self.runtime, self.layout, &planned.manifest);
        let mut paths = vec![runner.staged().to_path_buf()];
        paths.extend(planned.steps.iter().filter_map(|step| match step {
            PlanStep::Action(action) => Some(runner.target_of(action)),
            PlanStep::Fetch { .. } => None,
        }));
        paths
    }

    /// Run every step of `plan`, dependencies first, and return the target's record.
    ///
    /// Packages that already have a record are skipped, so executing the same
    /// plan twice is a no-op. Dependencies installed before a failing target
    /// stay installed.
    #[tracing::instrument(skip(self, plan), fields(target = %plan.target.id()))]
    pub async fn execute(&self, plan: &InstallPlan) -> CaskResult<InstallationRecord> {
        let target_id = plan.target.id();
        let records = self.records();

        let pending: Vec<&PlannedInstall> =
            plan.ordered().filter(|p| !records.exists(&p.id())).collect();
        if pending.is_empty() {
            info!("{} is already installed", target_id);
            return self.load_record(&target_id);
        }

        let _guard = self
            .locks
            .acquire(pending.iter().flat_map(|p| self.claimed_paths(p)))
            .await;

        // Another holder of the locks may have finished the same packages.
        let pending: Vec<&PlannedInstall> = pending
            .into_iter()
            .filter(|p| !records.exists(&p.id()))
            .collect();

        for planned in &pending {
            self.recover(&planned.id())?;
        }

        let artifacts = self.fetch_all(&pending).await?;

        let mut target_record = None;
        let mut remaining = pending.iter().zip(artifacts);
        while let Some((planned, artifact)) = remaining.next() {
            match self.apply(planned, artifact.as_deref()) {
                Ok(record) if record.id() == target_id => target_record = Some(record),
                Ok(_) => {}
                Err(e) => {
                    // Packages after the failed one are never applied.
                    for unused in remaining.by_ref().filter_map(|(_, artifact)| artifact) {
                        self.discard_download(&unused);
                    }
                    self.prune_empty_dir(&self.layout.download_dir());
                    return Err(e);
                }
            }
        }
        self.prune_empty_dir(&self.layout.download_dir());

        match target_record {
            Some(record) => Ok(record),
            None => self.load_record(&target_id),
        }
    }

    /// Fetch and verify every artifact concurrently. On any failure all
    /// downloads of this batch are discarded.
    async fn fetch_all(&self, pending: &[&PlannedInstall]) -> CaskResult<Vec<Option<PathBuf>>> {
        let result = try_join_all(pending.iter().map(|p| self.fetch_verified(p))).await;
        if result.is_err() {
            for planned in pending {
                self.discard_download(&self.layout.download_path(&planned.manifest));
            }
            self.prune_empty_dir(&self.layout.download_dir());
        }
        result
    }

    async fn fetch_verified(&self, planned: &PlannedInstall) -> CaskResult<Option<PathBuf>> {
        let Some((url, checksum)) = planned.steps.iter().find_map(|step| match step {
            PlanStep::Fetch { url, checksum } => Some((url, checksum)),
            PlanStep::Action(_) => None,
        }) else {
            return Ok(None);
        };

        let id = planned.id();
        let dest = self.layout.download_path(&planned.manifest);
        self.runtime
            .create_dir_all(&self.layout.download_dir())
            .map_err(|e| execution(&id, e, true))?;

        let actual = self
            .fetcher
            .fetch(url, &dest)
            .await
            .with_context(|| format!("Failed to fetch {}", url))
            .map_err(|e| execution(&id, e, true))?;

        if !checksum.matches(&actual) {
            warn!("Checksum mismatch for {} from {}", id, url);
            return Err(CaskError::Integrity {
                package: id.to_string(),
                expected: checksum.as_hex().to_string(),
                actual,
            });
        }
        debug!("Verified {} ({})", id, checksum);
        Ok(Some(dest))
    }

    fn discard_download(&self, path: &Path) {
        if let Err(e) = self.runtime.trash(path) {
            warn!("Failed to remove download {:?}: {:#}", path, e);
        }
    }

    fn prune_empty_dir(&self, dir: &Path) {
        match self.runtime.remove_empty_dir(dir) {
            Ok(true) => debug!("Removed empty directory {:?}", dir),
            Ok(false) => {}
            Err(e) => warn!("Failed to remove empty directory {:?}: {:#}", dir, e),
        }
    }

    fn apply(
        &self,
        planned: &PlannedInstall,
        artifact: Option<&Path>,
    ) -> CaskResult<InstallationRecord> {
        let id = planned.id();
        info!("Installing {}...", id);

        let mut journal =
            Journal::begin(self.runtime, self.layout, &id).map_err(|e| execution(&id, e, true))?;

        let outcome = self
            .apply_steps(planned, artifact, &mut journal)
            .and_then(|()| {
                let record =
                    InstallationRecord::new(planned.manifest.clone(), journal.effects().to_vec());
                self.records().save(&record)?;
                Ok(record)
            });

        if let Some(artifact) = artifact {
            self.discard_download(artifact);
        }

        match outcome {
            Ok(record) => {
                if let Err(e) = journal.close() {
                    warn!("Failed to remove journal for {}: {:#}", id, e);
                }
                info!("Installed {}", id);
                Ok(record)
            }
            Err(e) => {
                warn!("Installing {} failed, rolling back: {:#}", id, e);
                let mut rollback_succeeded = self.rollback(journal.effects());
                if let Err(record_err) = self.runtime.trash(&self.layout.record_path(&id)) {
                    error!("Failed to remove partial record for {}: {:#}", id, record_err);
                    rollback_succeeded = false;
                }
                // A failed rollback keeps its journal so `recover` can retry.
                if rollback_succeeded {
                    if let Err(close_err) = journal.close() {
                        warn!("Failed to remove journal for {}: {:#}", id, close_err);
                    }
                    self.prune_empty_dir(&self.layout.family_dir(&id.name));
                }
                Err(execution(&id, e, rollback_succeeded))
            }
        }
    }

    fn apply_steps(
        &self,
        planned: &PlannedInstall,
        artifact: Option<&Path>,
        journal: &mut Journal<'a, R>,
    ) -> anyhow::Result<()> {
        let runner = StepRunner::new(self.runtime, self.layout, &planned.manifest);
        let staged = runner.staged().to_path_buf();

        if self.runtime.exists(&staged) {
            debug!("Clearing leftover staged directory {:?}", staged);
            self.runtime.trash(&staged)?;
        }
        journal.record(FileKind::Staged, &staged)?;
        self.runtime.create_dir_all(&staged)?;

        for step in &planned.steps {
            debug!("{}: {}", planned.id(), step);
            match step {
                PlanStep::Fetch { url, .. } => {
                    if let Some(artifact) = artifact {
                        self.stager
                            .stage(self.runtime, artifact, &staged)
                            .with_context(|| format!("Failed to stage artifact from {}", url))?;
                    }
                }
                PlanStep::Action(action) => runner
                    .apply(action, journal)
                    .with_context(|| format!("{} step failed", action.kind()))?,
            }
        }
        Ok(())
    }

    /// Undo `effects` newest first. Returns false if anything could not be undone.
    fn rollback(&self, effects: &[InstalledFile]) -> bool {
        let mut succeeded = true;
        for file in effects.iter().rev() {
            debug!("Rolling back {} {:?}", file.kind, file.path);
            if let Err(e) = steps::undo(self.runtime, file) {
                error!("Failed to roll back {} {:?}: {:#}", file.kind, file.path, e);
                succeeded = false;
            }
        }
        succeeded
    }

    /// Undo an install of `id` that was interrupted before its record was
    /// written. Returns whether a journal was found.
    #[tracing::instrument(skip(self))]
    pub fn recover(&self, id: &PackageId) -> CaskResult<bool> {
        let Some(journal) =
            Journal::open(self.runtime, self.layout, id).map_err(|e| execution(id, e, false))?
        else {
            return Ok(false);
        };

        if self.records().exists(id) {
            debug!("{} finished installing; dropping its journal", id);
        } else {
            warn!("Rolling back interrupted install of {}", id);
            if !self.rollback(journal.effects()) {
                return Err(execution(
                    id,
                    anyhow!("Could not roll back an interrupted install"),
                    false,
                ));
            }
        }
        journal.close().map_err(|e| execution(id, e, true))?;
        Ok(true)
    }

    /// Remove an installed package.
    ///
    /// Running instances are asked to quit (failures only logged), recorded
    /// files are removed newest first, then `delete` actions run. Cleanup
    /// paths are only touched with `deep_clean`. The record is deleted last,
    /// and kept if anything could not be removed.
    #[tracing::instrument(skip(self, record, installed), fields(package = %record.id()))]
    pub async fn uninstall(
        &self,
        record: &InstallationRecord,
        installed: &InstalledSet,
        options: UninstallOptions,
    ) -> CaskResult<UninstallReport> {
        let id = record.id();

        if !options.force {
            let dependents = installed.dependents_of(&id);
            if !dependents.is_empty() {
                return Err(CaskError::DependentsPresent {
                    package: id.to_string(),
                    dependents: dependents.iter().map(|r| r.id().to_string()).collect(),
                });
            }
        }

        let _guard = self
            .locks
            .acquire(
                record
                    .installed_files
                    .iter()
                    .map(|f| f.path.clone())
                    .chain(std::iter::once(self.layout.staged_dir(&id))),
            )
            .await;

        let placeholders = steps::placeholders(self.runtime, self.layout, &record.manifest);
        let mut report = UninstallReport {
            package: id.clone(),
            quit: Vec::new(),
            removed: Vec::new(),
            cleaned: Vec::new(),
        };
        let mut failures = Vec::new();

        for action in &record.manifest.uninstall {
            if let UninstallAction::Quit { bundle_id } = action {
                match self.runtime.quit_application(bundle_id) {
                    Ok(true) => {
                        info!("Asked {} to quit", bundle_id);
                        report.quit.push(bundle_id.clone());
                    }
                    Ok(false) => debug!("{} is not running", bundle_id),
                    Err(e) => warn!("Failed to quit {}: {:#}", bundle_id, e),
                }
            }
        }

        for file in record.installed_files.iter().rev() {
            match steps::undo(self.runtime, file) {
                Ok(()) => report.removed.push(file.path.clone()),
                Err(e) => {
                    error!("Failed to remove {} {:?}: {:#}", file.kind, file.path, e);
                    failures.push(format!("{:?}", file.path));
                }
            }
        }

        for action in &record.manifest.uninstall {
            if let UninstallAction::Delete { path } = action {
                self.remove_matching(&placeholders.expand(path), &mut report.removed, &mut failures);
            }
        }

        if options.deep_clean {
            for pattern in &record.manifest.cleanup_paths {
                self.remove_matching(
                    &placeholders.expand(pattern),
                    &mut report.cleaned,
                    &mut failures,
                );
            }
        }

        if !failures.is_empty() {
            return Err(CaskError::Uninstall {
                package: id.to_string(),
                message: format!("could not remove {}", failures.join(", ")),
            });
        }

        self.records()
            .delete(&id)
            .map_err(|e| CaskError::Uninstall {
                package: id.to_string(),
                message: format!("{:#}", e),
            })?;
        info!("Uninstalled {}", id);
        Ok(report)
    }

    fn remove_matching(&self, pattern: &str, removed: &mut Vec<PathBuf>, failures: &mut Vec<String>) {
        let home = self.runtime.home_dir();
        let paths = match self.runtime.glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                error!("Invalid path pattern {}: {:#}", pattern, e);
                failures.push(pattern.to_string());
                return;
            }
        };
        for path in paths {
            if steps::is_protected(&path, home.as_deref(), self.layout.root()) {
                warn!("Refusing to remove {:?}", path);
                continue;
            }
            match self.runtime.trash(&path) {
                Ok(()) => {
                    debug!("Removed {:?}", path);
                    removed.push(path);
                }
                Err(e) => {
                    error!("Failed to remove {:?}: {:#}", path, e);
                    failures.push(format!("{:?}", path));
                }
            }
        }
    }
}
