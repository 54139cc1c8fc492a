use anyhow::Result;

use crate::application::{LivecheckReport, LivecheckUseCase};
use crate::config::Config;
use crate::livecheck::Livecheck;
use crate::runtime::Runtime;

/// Check upstream for a newer version of a package
#[tracing::instrument(skip(config))]
pub async fn livecheck<R: Runtime>(config: &Config<R>, name: &str) -> Result<()> {
    let store = config.load_store()?;
    let livecheck = Livecheck::new(&config.http, config.api_url.clone());
    let report = LivecheckUseCase::new(&store, &livecheck).check(name).await?;
    print!("{}", format_report(&report));
    Ok(())
}

fn format_report(report: &LivecheckReport) -> String {
    if report.outdated {
        format!(
            "{}: {} -> {} (outdated)\n",
            report.name, report.current, report.latest.version
        )
    } else {
        format!(
            "{}: {} is up to date (upstream {})\n",
            report.name, report.current, report.latest.version
        )
    }
}
