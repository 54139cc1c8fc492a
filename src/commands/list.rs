use anyhow::Result;
use log::debug;

use crate::application::ListUseCase;
use crate::config::Config;
use crate::runtime::Runtime;
use crate::state::{InstallationRecord, RecordRepository};

/// List all installed packages
#[tracing::instrument(skip(config))]
pub fn list<R: Runtime>(config: &Config<R>) -> Result<()> {
    debug!("Listing packages from {:?}", config.layout.root());
    let records =
        ListUseCase::new(RecordRepository::new(&config.runtime, &config.layout)).list()?;
    print!("{}", format_records(&records));
    Ok(())
}

fn format_records(records: &[InstallationRecord]) -> String {
    if records.is_empty() {
        return "No packages installed.\n".to_string();
    }
    records
        .iter()
        .map(|r| {
            format!(
                "{} {} (installed {})\n",
                r.name,
                r.version,
                r.installed_at.format("%Y-%m-%d")
            )
        })
        .collect()
}
