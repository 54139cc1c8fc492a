use std::fmt;
use std::path::PathBuf;

/// Where manifests are loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// Every `*.json` file directly inside the directory.
    Directory(PathBuf),
    /// One JSON file holding a manifest object or an array of them.
    File(PathBuf),
    /// JSON text supplied by the caller, labelled for error messages.
    Inline { label: String, json: String },
}

impl ManifestSource {
    pub fn inline(label: impl Into<String>, json: impl Into<String>) -> Self {
        ManifestSource::Inline {
            label: label.into(),
            json: json.into(),
        }
    }
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestSource::Directory(path) | ManifestSource::File(path) => {
                write!(f, "{}", path.display())
            }
            ManifestSource::Inline { label, .. } => write!(f, "{}", label),
        }
    }
}
