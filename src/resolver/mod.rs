//! Conflict and dependency resolution.
//!
//! [`Planner::plan_install`] decides whether a manifest may be installed next
//! to the installed set and, if so, produces an [`InstallPlan`]. Planning is
//! pure: every failure leaves the system untouched.

mod conflicts;
mod graph;
mod plan;

use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CaskError, CaskResult};
use crate::manifest::{PackageId, PackageManifest, PackageRef, Version};
use crate::runtime::Runtime;
use crate::state::InstalledSet;
use crate::store::ManifestStore;

pub use conflicts::ConflictIndex;
pub use graph::DependencyGraph;
pub use plan::{InstallPlan, PlanStep, PlannedInstall};

/// How versions of the same family relate when nothing is declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FamilyPolicy {
    /// Only declared `conflicts_with` relations apply; versions may coexist.
    #[default]
    DeclaredOnly,
    /// At most one version of a family is installed at a time.
    SingleVersion,
}

impl FromStr for FamilyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "declared" | "declared-only" => Ok(FamilyPolicy::DeclaredOnly),
            "single-version" | "single" => Ok(FamilyPolicy::SingleVersion),
            other => Err(format!(
                "unknown family policy '{}' (expected 'declared' or 'single-version')",
                other
            )),
        }
    }
}

impl fmt::Display for FamilyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FamilyPolicy::DeclaredOnly => f.write_str("declared"),
            FamilyPolicy::SingleVersion => f.write_str("single-version"),
        }
    }
}

/// The platform packages are being installed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub os: String,
    pub version: Option<Version>,
}

impl HostPlatform {
    pub fn new(os: impl Into<String>, version: Option<Version>) -> Self {
        Self {
            os: os.into(),
            version,
        }
    }

    pub fn detect<R: Runtime + ?Sized>(runtime: &R) -> Self {
        let os = runtime.os_name();
        let version = runtime.os_version().and_then(|v| Version::parse(&v).ok());
        debug!("Host platform: {} {:?}", os, version);
        Self { os, version }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{} {}", self.os, v),
            None => write!(f, "{}", self.os),
        }
    }
}

pub struct Planner<'a> {
    store: &'a ManifestStore,
    host: HostPlatform,
    policy: FamilyPolicy,
    auto_resolve: bool,
}

impl<'a> Planner<'a> {
    pub fn new(store: &'a ManifestStore, host: HostPlatform) -> Self {
        Self {
            store,
            host,
            policy: FamilyPolicy::default(),
            auto_resolve: false,
        }
    }

    pub fn with_policy(mut self, policy: FamilyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Plan missing dependencies from the store instead of failing.
    pub fn with_auto_resolve(mut self, auto_resolve: bool) -> Self {
        self.auto_resolve = auto_resolve;
        self
    }

    pub fn plan_install(
        &self,
        target: &PackageManifest,
        installed: &InstalledSet,
    ) -> CaskResult<InstallPlan> {
        let target_id = target.id();
        if installed.contains(&target_id) {
            info!("{} is already installed", target_id);
            return Ok(InstallPlan {
                target: PlannedInstall::new(target.clone()),
                dependencies: Vec::new(),
                already_installed: true,
            });
        }

        self.check_platform(target)?;

        let index = ConflictIndex::build(
            self.store
                .iter()
                .chain(installed.iter().map(|r| &r.manifest))
                .chain(std::iter::once(target)),
        );
        self.check_installed_conflicts(&index, target, installed)?;

        let graph = DependencyGraph::build(target, |r| self.resolve(r, installed));
        graph.detect_cycle(&target_id)?;

        let mut planned = BTreeMap::new();
        self.collect_missing(target, installed, &mut planned)?;

        for manifest in planned.values() {
            self.check_platform(manifest)?;
            self.check_installed_conflicts(&index, manifest, installed)?;
        }
        let members: Vec<&PackageManifest> = planned
            .values()
            .copied()
            .chain(std::iter::once(target))
            .collect();
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                if self.conflicting(&index, &a.id(), &b.id()) {
                    return Err(CaskError::Conflict {
                        package: b.id().to_string(),
                        installed: a.id().to_string(),
                    });
                }
            }
        }

        let dependencies: Vec<PlannedInstall> = graph
            .topological_order(&target_id)
            .into_iter()
            .filter_map(|id| planned.get(&id))
            .map(|m| PlannedInstall::new((*m).clone()))
            .collect();

        debug!(
            "Planned {} with {} dependencies",
            target_id,
            dependencies.len()
        );
        Ok(InstallPlan {
            target: PlannedInstall::new(target.clone()),
            dependencies,
            already_installed: false,
        })
    }

    /// The manifest a reference resolves to: an installed one first, else
    /// the newest match in the store.
    fn resolve<'b>(
        &'b self,
        reference: &PackageRef,
        installed: &'b InstalledSet,
    ) -> Option<&'b PackageManifest> {
        installed
            .matching(reference)
            .next()
            .map(|r| &r.manifest)
            .or_else(|| self.store.find_ref(reference))
    }

    fn collect_missing(
        &self,
        manifest: &PackageManifest,
        installed: &InstalledSet,
        planned: &mut BTreeMap<PackageId, &'a PackageManifest>,
    ) -> CaskResult<()> {
        let mut missing = Vec::new();
        for dep in &manifest.depends_on {
            if installed.satisfies(dep) || planned.keys().any(|id| dep.matches(id)) {
                continue;
            }
            match self.store.find_ref(dep) {
                Some(found) if self.auto_resolve => {
                    debug!("{} pulls in {}", manifest.id(), found.id());
                    planned.insert(found.id(), found);
                    self.collect_missing(found, installed, planned)?;
                }
                _ => missing.push(dep.to_string()),
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CaskError::MissingDependency {
                package: manifest.id().to_string(),
                missing,
            })
        }
    }

    fn conflicting(&self, index: &ConflictIndex, a: &PackageId, b: &PackageId) -> bool {
        if a == b {
            return false;
        }
        index.adjacent(a, b) || (self.policy == FamilyPolicy::SingleVersion && a.name == b.name)
    }

    fn check_installed_conflicts(
        &self,
        index: &ConflictIndex,
        manifest: &PackageManifest,
        installed: &InstalledSet,
    ) -> CaskResult<()> {
        let id = manifest.id();
        match installed
            .iter()
            .find(|record| self.conflicting(index, &id, &record.id()))
        {
            Some(record) => Err(CaskError::Conflict {
                package: id.to_string(),
                installed: record.id().to_string(),
            }),
            None => Ok(()),
        }
    }

    fn check_platform(&self, manifest: &PackageManifest) -> CaskResult<()> {
        let Some(required) = &manifest.requires_os else {
            return Ok(());
        };
        let unsupported = || CaskError::UnsupportedPlatform {
            package: manifest.id().to_string(),
            required: required.to_string(),
            host: self.host.to_string(),
        };

        if required.os != self.host.os {
            return Err(unsupported());
        }
        match (&required.min_version, &self.host.version) {
            (Some(min), Some(host)) if host < min => Err(unsupported()),
            (Some(min), None) => {
                warn!(
                    "Cannot determine {} version; assuming it satisfies {} >= {}",
                    self.host.os, required.os, min
                );
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
