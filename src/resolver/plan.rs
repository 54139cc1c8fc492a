use std::fmt;

use crate::manifest::{Checksum, InstallAction, PackageId, PackageManifest};

/// One step of installing a single package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    /// Download the artifact and verify it against `checksum`.
    Fetch { url: String, checksum: Checksum },
    /// Apply one declared install action.
    Action(InstallAction),
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::Fetch { url, checksum } => write!(f, "fetch {} (verify {})", url, checksum),
            PlanStep::Action(InstallAction::App { source, target }) => write!(
                f,
                "app {} -> {}",
                source,
                InstallAction::app_target_name(source, target.as_deref())
            ),
            PlanStep::Action(InstallAction::Binary { source, target }) => {
                write!(f, "binary {} -> {}", target, source)
            }
            PlanStep::Action(InstallAction::Shim { target, exec, .. }) => {
                write!(f, "shim {} -> {}", target, exec)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedInstall {
    pub manifest: PackageManifest,
    pub steps: Vec<PlanStep>,
}

impl PlannedInstall {
    /// Fetch first, then one step per install action in declared order.
    pub fn new(manifest: PackageManifest) -> Self {
        let fetch = PlanStep::Fetch {
            url: manifest.artifact_url(),
            checksum: manifest.checksum.clone(),
        };
        let steps = std::iter::once(fetch)
            .chain(manifest.install.iter().cloned().map(PlanStep::Action))
            .collect();
        Self { manifest, steps }
    }

    pub fn id(&self) -> PackageId {
        self.manifest.id()
    }
}

/// Everything needed to install one requested package.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallPlan {
    pub target: PlannedInstall,
    /// Dependencies to install first, each before its dependents.
    pub dependencies: Vec<PlannedInstall>,
    /// The exact target id is already installed; executing is a no-op.
    pub already_installed: bool,
}

impl InstallPlan {
    /// Dependencies in order, then the target.
    pub fn ordered(&self) -> impl Iterator<Item = &PlannedInstall> {
        self.dependencies
            .iter()
            .chain(std::iter::once(&self.target))
    }

    pub fn len(&self) -> usize {
        self.dependencies.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::manifest;

    #[test]
    fn test_fetch_step_comes_first() {
        let mut m = manifest("godot", "4.0");
        m.install = vec![InstallAction::App {
            source: "Godot.app".into(),
            target: None,
        }];
        let planned = PlannedInstall::new(m.clone());

        assert_eq!(planned.steps.len(), 2);
        assert_eq!(
            planned.steps[0],
            PlanStep::Fetch {
                url: m.artifact_url(),
                checksum: m.checksum.clone()
            }
        );
        assert_eq!(planned.steps[1].to_string(), "app Godot.app -> Godot.app");
    }

    #[test]
    fn test_ordered_puts_target_last() {
        let plan = InstallPlan {
            target: PlannedInstall::new(manifest("godot-mono", "4.0")),
            dependencies: vec![PlannedInstall::new(manifest("dotnet-sdk", "8.0"))],
            already_installed: false,
        };
        let names: Vec<_> = plan.ordered().map(|p| p.manifest.name.clone()).collect();
        assert_eq!(names, vec!["dotnet-sdk", "godot-mono"]);
        assert_eq!(plan.len(), 2);
    }
}
