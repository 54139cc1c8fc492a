//! On-disk layout of an install root.
//!
//! ```text
//! <root>/
//!   Caskroom/<name>/<version>/             staged artifact and shim scripts
//!   Caskroom/<name>/<version>.record.json  installation record
//!   Caskroom/<name>/<version>.journal.json write-ahead journal of an install in progress
//!   cache/                                 downloaded artifacts awaiting staging
//!   bin/                                   default link directory
//!   Applications/                          default application directory
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::manifest::{PackageId, PackageManifest};
use crate::runtime::Runtime;

const RECORD_SUFFIX: &str = ".record.json";
const JOURNAL_SUFFIX: &str = ".journal.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    appdir: PathBuf,
    bindir: PathBuf,
}

impl Layout {
    /// Layout with the default `Applications/` and `bin/` under `root`.
    pub fn new(root: PathBuf) -> Self {
        Self {
            appdir: root.join("Applications"),
            bindir: root.join("bin"),
            root,
        }
    }

    pub fn with_appdir(mut self, appdir: PathBuf) -> Self {
        self.appdir = appdir;
        self
    }

    pub fn with_bindir(mut self, bindir: PathBuf) -> Self {
        self.bindir = bindir;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn appdir(&self) -> &Path {
        &self.appdir
    }

    pub fn bindir(&self) -> &Path {
        &self.bindir
    }

    pub fn caskroom(&self) -> PathBuf {
        self.root.join("Caskroom")
    }

    /// `<root>/Caskroom/<name>`
    pub fn family_dir(&self, name: &str) -> PathBuf {
        self.caskroom().join(name)
    }

    /// `<root>/Caskroom/<name>/<version>`
    pub fn staged_dir(&self, id: &PackageId) -> PathBuf {
        self.family_dir(&id.name).join(id.version.to_string())
    }

    pub fn record_path(&self, id: &PackageId) -> PathBuf {
        self.family_dir(&id.name)
            .join(format!("{}{}", id.version, RECORD_SUFFIX))
    }

    pub fn journal_path(&self, id: &PackageId) -> PathBuf {
        self.family_dir(&id.name)
            .join(format!("{}{}", id.version, JOURNAL_SUFFIX))
    }

    pub fn download_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Where the artifact of `manifest` is downloaded before staging.
    pub fn download_path(&self, manifest: &PackageManifest) -> PathBuf {
        self.download_dir().join(format!(
            "{}--{}--{}",
            manifest.name,
            manifest.version,
            manifest.artifact_file_name()
        ))
    }

    pub(crate) fn is_record_file(path: &Path) -> bool {
        has_suffix(path, RECORD_SUFFIX)
    }
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with(suffix))
        .unwrap_or(false)
}

/// Get the default install root directory
#[tracing::instrument(skip(runtime))]
pub fn default_install_root<R: Runtime + ?Sized>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(system_install_root())
    } else {
        let home_dir = runtime
            .home_dir()
            .context("Could not find home directory")?;
        Ok(home_dir.join(".caskr"))
    }
}

#[cfg(target_os = "macos")]
fn system_install_root() -> PathBuf {
    PathBuf::from("/opt/caskr")
}

#[cfg(target_os = "windows")]
fn system_install_root() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\caskr")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn system_install_root() -> PathBuf {
    PathBuf::from("/usr/local/caskr")
}
