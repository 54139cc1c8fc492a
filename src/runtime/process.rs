//! Quitting running applications.

use anyhow::{Context, Result};
use log::debug;
use std::process::Command;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn quit_application_impl(&self, bundle_id: &str) -> Result<bool> {
        if !cfg!(target_os = "macos") {
            debug!("Bundle identifiers are only meaningful on macOS; nothing to quit");
            return Ok(false);
        }

        let running = Command::new("osascript")
            .arg("-e")
            .arg(format!("application id \"{}\" is running", bundle_id))
            .output()
            .context("Failed to run osascript")?;
        if String::from_utf8_lossy(&running.stdout).trim() != "true" {
            return Ok(false);
        }

        let status = Command::new("osascript")
            .arg("-e")
            .arg(format!("tell application id \"{}\" to quit", bundle_id))
            .status()
            .context("Failed to run osascript")?;
        if !status.success() {
            anyhow::bail!("osascript exited with {} while quitting {}", status, bundle_id);
        }
        Ok(true)
    }
}
