//! Environment, privilege and host platform information.

use std::env;
use std::path::PathBuf;
use std::process::Command;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn env_var_impl(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn home_dir_impl(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_privileged_impl(&self) -> bool {
        #[cfg(unix)]
        return nix::unistd::geteuid().as_raw() == 0;

        #[cfg(windows)]
        return is_elevated::is_elevated();
    }

    pub(crate) fn os_name_impl(&self) -> String {
        env::consts::OS.to_string()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn os_version_impl(&self) -> Option<String> {
        let output = if cfg!(target_os = "macos") {
            Command::new("sw_vers").arg("-productVersion").output()
        } else if cfg!(unix) {
            Command::new("uname").arg("-r").output()
        } else {
            return None;
        };

        let output = output.ok().filter(|o| o.status.success())?;
        let raw = String::from_utf8(output.stdout).ok()?;
        // `uname -r` yields things like `6.1.0-18-amd64`; keep the dotted prefix.
        let version: String = raw
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let version = version.trim_end_matches('.').to_string();
        (!version.is_empty()).then_some(version)
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};

    #[test]
    fn test_real_runtime_env_and_dirs() {
        let runtime = RealRuntime;

        // Test env_var - PATH should exist on all systems
        assert!(runtime.env_var("PATH").is_ok());

        // Test home_dir - should exist for most systems
        let home = runtime.home_dir();
        assert!(home.is_some() || cfg!(target_os = "linux")); // CI might not have home

        // Test is_privileged - should work without panic
        let _ = runtime.is_privileged();
    }

    #[test]
    fn test_real_runtime_os_info() {
        let runtime = RealRuntime;
        assert_eq!(runtime.os_name(), std::env::consts::OS);
        if let Some(version) = runtime.os_version() {
            assert!(version.chars().all(|c| c.is_ascii_digit() || c == '.'));
            assert!(!version.ends_with('.'));
        }
    }
}
