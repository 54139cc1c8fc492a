use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::path::Path;
use tar::{Archive, EntryType};

use super::{ArchiveExtractor, enclosed_path};
use crate::runtime::Runtime;

/// Extractor for .tar.gz / .tgz archives
#[derive(Default)]
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    fn extract<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        debug!("Extracting tar.gz archive {:?} to {:?}...", archive_path, extract_to);
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;
        let mut archive = Archive::new(GzDecoder::new(file));

        let mut count = 0usize;
        for entry in archive.entries().context("Failed to read tar entries")? {
            let mut entry = entry.context("Failed to read tar entry")?;
            let raw_path = entry.path().context("Invalid tar entry path")?.into_owned();
            let Some(entry_path) = enclosed_path(&raw_path) else {
                debug!("Skipping entry with unsafe path {:?}", raw_path);
                continue;
            };
            let full_path = extract_to.join(&entry_path);

            match entry.header().entry_type() {
                EntryType::Directory => runtime.create_dir_all(&full_path)?,
                EntryType::Regular | EntryType::Continuous => {
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    let mut dest_file = runtime.create_file(&full_path)?;
                    std::io::copy(&mut entry, &mut dest_file)
                        .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                    drop(dest_file);

                    #[cfg(unix)]
                    if let Ok(mode) = entry.header().mode()
                        && let Err(e) = runtime.set_permissions(&full_path, mode & 0o7777)
                    {
                        debug!("Failed to set permissions on {:?}: {}", full_path, e);
                    }
                }
                EntryType::Symlink => {
                    if let Some(target) = entry.link_name().context("Invalid symlink entry")? {
                        if let Some(parent) = full_path.parent() {
                            runtime.create_dir_all(parent)?;
                        }
                        runtime.symlink(&target, &full_path)?;
                    }
                }
                other => {
                    debug!("Skipping unsupported tar entry {:?} ({:?})", raw_path, other);
                    continue;
                }
            }
            count += 1;
        }

        if count == 0 {
            bail!("Archive {:?} is empty", archive_path);
        }
        info!("Extracted {} entries from {:?}", count, archive_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_archives::write_tar_gz;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_can_handle_tar_gz() {
        assert!(TarGzExtractor.can_handle(Path::new("file.tar.gz")));
        assert!(TarGzExtractor.can_handle(Path::new("file.tgz")));
        assert!(!TarGzExtractor.can_handle(Path::new("file.zip")));
    }

    #[test]
    fn test_extract_nested_files() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("tool.tar.gz");
        let extract_path = dir.path().join("out");
        fs::create_dir(&extract_path)?;
        write_tar_gz(
            &archive_path,
            &[("tool/bin/tool", "run", 0o755), ("tool/README", "doc", 0o644)],
        )?;

        TarGzExtractor.extract(&RealRuntime, &archive_path, &extract_path)?;

        assert_eq!(fs::read_to_string(extract_path.join("tool/bin/tool"))?, "run");
        assert_eq!(fs::read_to_string(extract_path.join("tool/README"))?, "doc");
        Ok(())
    }

    #[test]
    fn test_extract_corrupted_archive() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("bad.tar.gz");
        fs::write(&archive_path, "not gzip").unwrap();
        let result = TarGzExtractor.extract(&RealRuntime, &archive_path, dir.path());
        assert!(result.is_err());
    }
}
