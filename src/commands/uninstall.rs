use anyhow::Result;

use crate::application::UninstallUseCase;
use crate::config::Config;
use crate::executor::{HttpFetcher, UninstallOptions, UninstallReport};
use crate::manifest::PackageRef;
use crate::runtime::Runtime;
use crate::state::RecordRepository;

/// Uninstall an installed package.
#[tracing::instrument(skip(config))]
pub async fn uninstall<R: Runtime>(
    config: &Config<R>,
    reference: &str,
    options: UninstallOptions,
) -> Result<()> {
    let reference: PackageRef = reference.parse()?;
    let fetcher = HttpFetcher::new(&config.runtime, &config.http);
    let executor = super::executor(config, &fetcher);
    let use_case = UninstallUseCase::new(
        RecordRepository::new(&config.runtime, &config.layout),
        &executor,
    );

    let report = use_case.uninstall(&reference, options).await?;
    print!("{}", format_report(&report));
    Ok(())
}

fn format_report(report: &UninstallReport) -> String {
    let mut out = String::new();
    for bundle_id in &report.quit {
        out.push_str(&format!("Quit {}\n", bundle_id));
    }
    for path in &report.removed {
        out.push_str(&format!("Removed {}\n", path.display()));
    }
    for path in &report.cleaned {
        out.push_str(&format!("Cleaned {}\n", path.display()));
    }
    out.push_str(&format!("Uninstalled {}.\n", report.package));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{PackageId, Version};
    use std::path::PathBuf;

    #[test]
    fn test_format_report() {
        let report = UninstallReport {
            package: PackageId::new("godot", Version::parse("4.0").unwrap()),
            quit: vec!["org.godotengine.godot".into()],
            removed: vec![PathBuf::from("/Applications/Godot.app")],
            cleaned: vec![PathBuf::from("/home/user/Library/Caches/Godot")],
        };
        assert_eq!(
            format_report(&report),
            "Quit org.godotengine.godot\n\
             Removed /Applications/Godot.app\n\
             Cleaned /home/user/Library/Caches/Godot\n\
             Uninstalled godot@4.0.\n"
        );
    }
}
