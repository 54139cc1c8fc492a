//! Symlink operations (create, read, remove).

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn symlink_impl(&self, original: &Path, link: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::symlink as unix_symlink;
            unix_symlink(original, link).context("Failed to create symlink")?;
        }
        #[cfg(windows)]
        {
            use anyhow::bail;
            use std::os::windows::fs::{symlink_dir, symlink_file};
            use tracing::trace;

            // `is_dir()` on a relative path is relative to CWD; we want it relative to the link's parent.
            let target_path = if original.is_absolute() {
                original.to_path_buf()
            } else {
                link.parent()
                    .context("Failed to get parent directory for symlink")?
                    .join(original)
            };

            if target_path.is_dir() {
                trace!("{} is a directory, creating directory symlink", target_path.display());
                symlink_dir(original, link).context("Failed to create directory symlink")?;
            } else {
                trace!("{} is a file, creating file symlink", target_path.display());
                symlink_file(original, link).context("Failed to create file symlink")?;
            }

            if fs::symlink_metadata(link).is_err() {
                bail!(
                    "Symlink creation reported success but link does not exist: link={:?} target={:?}",
                    link,
                    original
                );
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_link_impl(&self, path: &Path) -> Result<PathBuf> {
        fs::read_link(path).context("Failed to read symlink")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_symlink_impl(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_symlink_impl(&self, path: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            fs::remove_file(path).context("Failed to remove symlink")?;
        }
        #[cfg(windows)]
        {
            // Directory symlinks need remove_dir, file symlinks remove_file.
            fs::remove_dir(path)
                .or_else(|_| fs::remove_file(path))
                .context("Failed to remove symlink")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::path::resolve_link_target;
    use crate::runtime::{RealRuntime, Runtime};
    use tempfile::tempdir;

    #[cfg_attr(
        caskr_skip_cross_windows_tests,
        ignore = "cross windows tests disabled; set CASKR_RUN_CROSS_WINDOWS_TESTS=1 to enable"
    )]
    #[test]
    fn test_real_runtime_symlink_ops() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let target = dir.path().join("Godot.app");
        runtime.create_dir_all(&target).unwrap();

        let link = dir.path().join("link");
        runtime.symlink(&target, &link).unwrap();
        assert!(runtime.is_symlink(&link));
        assert!(!runtime.is_symlink(&target));

        let read_target = runtime.read_link(&link).unwrap();
        assert_eq!(resolve_link_target(&link, &read_target), target);

        runtime.remove_symlink(&link).unwrap();
        assert!(!runtime.exists(&link));
        assert!(runtime.exists(&target));
    }

    #[cfg_attr(
        caskr_skip_cross_windows_tests,
        ignore = "cross windows tests disabled; set CASKR_RUN_CROSS_WINDOWS_TESTS=1 to enable"
    )]
    #[test]
    fn test_trash_removes_link_not_target() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let target = dir.path().join("godot.wrapper.sh");
        runtime.write(&target, b"#!/bin/bash\n").unwrap();

        let link = dir.path().join("godot");
        runtime.symlink(&target, &link).unwrap();
        runtime.trash(&link).unwrap();

        assert!(!runtime.is_symlink(&link));
        assert!(runtime.exists(&target));
    }

    #[test]
    fn test_is_symlink_missing_path() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        assert!(!runtime.is_symlink(&dir.path().join("nothing")));
    }
}
