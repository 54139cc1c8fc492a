use anyhow::Result;

use crate::application::{InstallOptions, InstallOutcome, InstallUseCase};
use crate::config::Config;
use crate::executor::HttpFetcher;
use crate::manifest::PackageRef;
use crate::resolver::{HostPlatform, PlannedInstall};
use crate::runtime::Runtime;
use crate::state::RecordRepository;

/// Install a package, optionally with its missing dependencies.
#[tracing::instrument(skip(config))]
pub async fn install<R: Runtime>(config: &Config<R>, reference: &str, with_deps: bool) -> Result<()> {
    let reference: PackageRef = reference.parse()?;
    let store = config.load_store()?;
    let fetcher = HttpFetcher::new(&config.runtime, &config.http);
    let executor = super::executor(config, &fetcher);
    let use_case = InstallUseCase::new(
        &store,
        RecordRepository::new(&config.runtime, &config.layout),
        &executor,
        HostPlatform::detect(&config.runtime),
    );

    let outcome = use_case
        .install(
            &reference,
            InstallOptions {
                with_deps,
                policy: config.policy,
            },
        )
        .await?;
    print!("{}", format_outcome(&outcome));
    Ok(())
}

fn format_planned(planned: &PlannedInstall) -> String {
    let mut out = format!("==> {}\n", planned.id());
    for step in &planned.steps {
        out.push_str(&format!("    {}\n", step));
    }
    out
}

fn format_outcome(outcome: &InstallOutcome) -> String {
    if outcome.plan.already_installed {
        return format!("{} is already installed.\n", outcome.record.id());
    }
    let mut out = String::new();
    for planned in outcome.plan.ordered() {
        out.push_str(&format_planned(planned));
    }
    out.push_str(&format!(
        "Installed {} ({} file(s)).\n",
        outcome.record.id(),
        outcome.record.installed_files.len()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::InstallAction;
    use crate::resolver::InstallPlan;
    use crate::test_utils::{manifest, record};

    #[test]
    fn test_format_outcome_lists_steps_in_order() {
        let mut m = manifest("godot", "4.0");
        m.install = vec![InstallAction::App {
            source: "Godot.app".into(),
            target: None,
        }];
        let outcome = InstallOutcome {
            plan: InstallPlan {
                target: PlannedInstall::new(m.clone()),
                dependencies: vec![PlannedInstall::new(manifest("dotnet-sdk", "8.0"))],
                already_installed: false,
            },
            record: record(m),
        };

        let text = format_outcome(&outcome);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "==> dotnet-sdk@8.0");
        assert!(lines[1].trim_start().starts_with("fetch https://example.com/dotnet-sdk-8.0.zip"));
        assert_eq!(lines[2], "==> godot@4.0");
        assert_eq!(lines[4], "    app Godot.app -> Godot.app");
        assert_eq!(lines[5], "Installed godot@4.0 (0 file(s)).");
    }

    #[test]
    fn test_format_already_installed() {
        let m = manifest("godot", "4.0");
        let outcome = InstallOutcome {
            plan: InstallPlan {
                target: PlannedInstall::new(m.clone()),
                dependencies: vec![],
                already_installed: true,
            },
            record: record(m),
        };
        assert_eq!(format_outcome(&outcome), "godot@4.0 is already installed.\n");
    }
}
