use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::manifest::{PackageId, PackageManifest, Version};

/// Kind of filesystem effect created by an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// The staged directory `<root>/Caskroom/<name>/<version>`.
    Staged,
    /// An app bundle moved into the application directory.
    App,
    /// A symlink in the bin directory.
    Link,
    /// A generated launcher script.
    Script,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileKind::Staged => "staged",
            FileKind::App => "app",
            FileKind::Link => "link",
            FileKind::Script => "script",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledFile {
    pub kind: FileKind,
    pub path: PathBuf,
}

impl InstalledFile {
    pub fn new(kind: FileKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Durable proof that a package version is installed.
///
/// Created once by the executor after every step succeeded and never mutated.
/// The manifest snapshot keeps uninstall, conflict and dependent checks
/// working after the manifest disappears from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallationRecord {
    pub name: String,
    pub version: Version,
    /// Effects in the order they were made.
    pub installed_files: Vec<InstalledFile>,
    pub installed_at: DateTime<Utc>,
    pub manifest: PackageManifest,
}

impl InstallationRecord {
    pub fn new(manifest: PackageManifest, installed_files: Vec<InstalledFile>) -> Self {
        Self {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            installed_files,
            installed_at: Utc::now(),
            manifest,
        }
    }

    pub fn id(&self) -> PackageId {
        PackageId::new(self.name.clone(), self.version.clone())
    }
}
