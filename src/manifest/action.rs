//! Install and uninstall actions declared by a manifest.
//!
//! Actions are plain data; the executor interprets them. Path-like fields are
//! templates expanded by [`Placeholders`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default launcher script written by a [`InstallAction::Shim`].
pub const DEFAULT_SHIM_TEMPLATE: &str = "#!/bin/bash\n'{exec}' \"$@\"\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallAction {
    /// Move an app bundle from the staged artifact into the application directory.
    App {
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    /// Link `target` in the bin directory to `source`.
    Binary { source: String, target: String },
    /// Write a launcher script into the staged directory and link it as `target`.
    Shim {
        target: String,
        exec: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<String>,
    },
}

impl InstallAction {
    pub fn kind(&self) -> &'static str {
        match self {
            InstallAction::App { .. } => "app",
            InstallAction::Binary { .. } => "binary",
            InstallAction::Shim { .. } => "shim",
        }
    }

    /// File name under the application directory for an `app` action.
    pub fn app_target_name(source: &str, target: Option<&str>) -> String {
        target.map(str::to_string).unwrap_or_else(|| {
            Path::new(source)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.to_string())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UninstallAction {
    /// Ask a running instance to quit. Failure is logged, never fatal.
    Quit { bundle_id: String },
    /// Remove an additional path on every uninstall.
    Delete { path: String },
}

/// Values substituted into action templates.
#[derive(Debug, Clone)]
pub struct Placeholders {
    pub name: String,
    pub version: String,
    pub appdir: PathBuf,
    pub bindir: PathBuf,
    pub staged: PathBuf,
    pub home: Option<PathBuf>,
}

impl Placeholders {
    /// Substitute `{name}`, `{version}`, `{appdir}`, `{bindir}`, `{staged}` and
    /// a leading `~`.
    pub fn expand(&self, template: &str) -> String {
        let expanded = template
            .replace("{name}", &self.name)
            .replace("{version}", &self.version)
            .replace("{appdir}", &self.appdir.to_string_lossy())
            .replace("{bindir}", &self.bindir.to_string_lossy())
            .replace("{staged}", &self.staged.to_string_lossy());
        expand_tilde(&expanded, self.home.as_deref())
    }

    pub fn expand_path(&self, template: &str) -> PathBuf {
        PathBuf::from(self.expand(template))
    }
}

/// Replace a leading `~` with the home directory, when one is known.
pub fn expand_tilde(path: &str, home: Option<&Path>) -> String {
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{}", home.to_string_lossy(), rest)
        }
        _ => path.to_string(),
    }
}
