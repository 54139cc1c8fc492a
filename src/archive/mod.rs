//! Staging of fetched artifacts.
//!
//! Archives are unpacked into the staged directory exactly as laid out (an
//! app bundle at the archive root stays at the staged root). Anything that is
//! not a recognised archive is moved into the staged directory unchanged.

mod tar_gz;
mod zip;

use anyhow::{Context, Result};
use log::debug;
use std::path::{Component, Path, PathBuf};

use crate::runtime::Runtime;

pub use tar_gz::TarGzExtractor;
pub use zip::ZipExtractor;

/// Format-specific archive extractor.
pub trait ArchiveExtractor: Send + Sync {
    fn can_handle(&self, archive_path: &Path) -> bool;

    /// Unpack `archive_path` into the existing directory `extract_to`.
    fn extract<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()>;
}

/// Dispatches to the extractor that understands the artifact.
#[derive(Default)]
pub struct ArtifactStager {
    tar_gz: TarGzExtractor,
    zip: ZipExtractor,
}

impl ArtifactStager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_archive(&self, artifact: &Path) -> bool {
        self.tar_gz.can_handle(artifact) || self.zip.can_handle(artifact)
    }

    /// Place the downloaded `artifact` into `staged_dir`, which must exist.
    #[tracing::instrument(skip(self, runtime))]
    pub fn stage<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        artifact: &Path,
        staged_dir: &Path,
    ) -> Result<()> {
        if self.zip.can_handle(artifact) {
            return self.zip.extract(runtime, artifact, staged_dir);
        }
        if self.tar_gz.can_handle(artifact) {
            return self.tar_gz.extract(runtime, artifact, staged_dir);
        }

        let file_name = artifact
            .file_name()
            .with_context(|| format!("Artifact path {:?} has no file name", artifact))?;
        let dest = staged_dir.join(file_name);
        debug!("Staging plain artifact {:?} as {:?}", artifact, dest);
        runtime
            .move_path(artifact, &dest)
            .with_context(|| format!("Failed to stage {:?}", artifact))
    }
}

/// Archive-relative entry path, rejecting absolute paths and `..` traversal.
pub(crate) fn enclosed_path(entry: &Path) -> Option<PathBuf> {
    let mut result = PathBuf::new();
    for component in entry.components() {
        match component {
            Component::Normal(part) => result.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if result.as_os_str().is_empty() {
        None
    } else {
        Some(result)
    }
}
