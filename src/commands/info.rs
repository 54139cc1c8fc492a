use anyhow::Result;

use crate::application::{InfoUseCase, PackageInfo};
use crate::config::Config;
use crate::runtime::Runtime;
use crate::state::RecordRepository;

/// Show available and installed versions of a package
#[tracing::instrument(skip(config))]
pub fn info<R: Runtime>(config: &Config<R>, name: &str) -> Result<()> {
    let store = config.load_store()?;
    let info = InfoUseCase::new(&store, RecordRepository::new(&config.runtime, &config.layout))
        .info(name)?;
    print!("{}", format_info(&info));
    Ok(())
}

fn format_info(info: &PackageInfo) -> String {
    let m = &info.manifest;
    let mut out = match &m.display_name {
        Some(display) => format!("{}: {}\n", info.name, display),
        None => format!("{}\n", info.name),
    };
    if let Some(description) = &m.description {
        out.push_str(&format!("{}\n", description));
    }
    if let Some(homepage) = &m.homepage {
        out.push_str(&format!("Homepage: {}\n", homepage));
    }
    if !info.versions.is_empty() {
        out.push_str(&format!("Versions: {}\n", super::join(&info.versions)));
    }
    if info.installed.is_empty() {
        out.push_str("Not installed\n");
    } else {
        out.push_str(&format!("Installed: {}\n", super::join(&info.installed)));
    }
    if let Some(requirement) = &m.requires_os {
        out.push_str(&format!("Requires: {}\n", requirement));
    }
    if !m.conflicts_with.is_empty() {
        out.push_str(&format!("Conflicts with: {}\n", super::join(&m.conflicts_with)));
    }
    if !m.depends_on.is_empty() {
        out.push_str(&format!("Depends on: {}\n", super::join(&m.depends_on)));
    }
    out
}
