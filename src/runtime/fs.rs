//! File system operations (read, write, directory, move, trash, permissions).

use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self, contents))]
    pub(crate) fn write_impl(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents).context("Failed to write to file")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_to_string_impl(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).context("Failed to read file to string")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).context("Failed to create directory")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_dir_all_impl(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).context("Failed to remove directory and its contents")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove_empty_dir_impl(&self, path: &Path) -> Result<bool> {
        match fs::remove_dir(path) {
            Ok(()) => Ok(true),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::DirectoryNotEmpty
                ) =>
            {
                Ok(false)
            }
            Err(e) => Err(e).context("Failed to remove directory"),
        }
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn exists_impl(&self, path: &Path) -> bool {
        path.exists()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn is_dir_impl(&self, path: &Path) -> bool {
        path.is_dir()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn read_dir_impl(&self, path: &Path) -> Result<Vec<PathBuf>> {
        fs::read_dir(path)?.map(|entry| Ok(entry?.path())).collect()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn create_file_impl(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>> {
        let file = fs::File::create(path).context("Failed to create file")?;
        Ok(Box::new(file))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn open_impl(&self, path: &Path) -> Result<Box<dyn std::io::Read + Send>> {
        let file = fs::File::open(path).context("Failed to open file")?;
        Ok(Box::new(file))
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn move_path_impl(&self, from: &Path, to: &Path) -> Result<()> {
        if fs::rename(from, to).is_ok() {
            return Ok(());
        }
        debug!("rename {:?} -> {:?} failed, copying instead", from, to);
        copy_recursive(from, to)
            .with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
        self.trash_impl(from)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn trash_impl(&self, path: &Path) -> Result<()> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e).with_context(|| format!("Failed to stat {:?}", path)),
        };
        if meta.file_type().is_symlink() {
            self.remove_symlink_impl(path)
        } else if meta.is_dir() {
            fs::remove_dir_all(path).with_context(|| format!("Failed to remove {:?}", path))
        } else {
            fs::remove_file(path).with_context(|| format!("Failed to remove {:?}", path))
        }
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn glob_impl(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let paths = glob::glob(pattern)
            .with_context(|| format!("Invalid glob pattern '{}'", pattern))?
            .filter_map(|entry| entry.ok())
            .collect();
        Ok(paths)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn set_permissions_impl(&self, path: &Path, mode: u32) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(mode);
            fs::set_permissions(path, permissions).context("Failed to set permissions")?;
        }
        #[cfg(not(unix))]
        {
            let _ = (path, mode); // Suppress unused warnings on non-Unix
        }
        Ok(())
    }
}

fn copy_recursive(from: &Path, to: &Path) -> std::io::Result<()> {
    let meta = fs::symlink_metadata(from)?;
    if meta.file_type().is_symlink() {
        #[cfg(unix)]
        std::os::unix::fs::symlink(fs::read_link(from)?, to)?;
        #[cfg(not(unix))]
        fs::copy(from, to).map(|_| ())?;
    } else if meta.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        fs::copy(from, to)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RealRuntime, Runtime};
    use std::io::{Read, Write};
    use tempfile::tempdir;

    #[test]
    fn test_real_runtime_file_ops() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.txt");

        // Test write
        runtime.write(&file_path, b"hello").unwrap();
        assert!(runtime.exists(&file_path));

        // Test read_to_string
        let content = runtime.read_to_string(&file_path).unwrap();
        assert_eq!(content, "hello");

        // Overwrite
        runtime.write(&file_path, b"record").unwrap();
        assert_eq!(runtime.read_to_string(&file_path).unwrap(), "record");
    }

    #[test]
    fn test_real_runtime_dir_ops() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let sub_dir = dir.path().join("sub/nested");

        runtime.create_dir_all(&sub_dir).unwrap();
        assert!(runtime.is_dir(&sub_dir));

        let parent = dir.path().join("sub");
        let entries = runtime.read_dir(&parent).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("nested"));

        runtime.remove_dir_all(&parent).unwrap();
        assert!(!runtime.exists(&parent));
    }

    #[test]
    fn test_remove_empty_dir_keeps_populated_dirs() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let full = dir.path().join("full");
        let empty = dir.path().join("empty");
        runtime.create_dir_all(&full).unwrap();
        runtime.create_dir_all(&empty).unwrap();
        runtime.write(&full.join("keep"), b"x").unwrap();

        assert!(!runtime.remove_empty_dir(&full).unwrap());
        assert!(runtime.exists(&full.join("keep")));
        assert!(runtime.remove_empty_dir(&empty).unwrap());
        assert!(!runtime.exists(&empty));
        assert!(!runtime.remove_empty_dir(&empty).unwrap());
    }

    #[test]
    fn test_real_runtime_create_file_and_open() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("stream.txt");

        {
            let mut writer = runtime.create_file(&file_path).unwrap();
            writer.write_all(b"streamed content").unwrap();
        }

        let mut reader = runtime.open(&file_path).unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "streamed content");
    }

    #[test]
    fn test_move_path_moves_directory_tree() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("Godot.app/Contents/MacOS");
        runtime.create_dir_all(&bundle).unwrap();
        runtime.write(&bundle.join("Godot"), b"bin").unwrap();

        let dest = dir.path().join("Applications/Godot.app");
        runtime.create_dir_all(dest.parent().unwrap()).unwrap();
        runtime
            .move_path(&dir.path().join("Godot.app"), &dest)
            .unwrap();

        assert!(!runtime.exists(&dir.path().join("Godot.app")));
        assert_eq!(
            runtime
                .read_to_string(&dest.join("Contents/MacOS/Godot"))
                .unwrap(),
            "bin"
        );
    }

    #[test]
    fn test_trash_handles_files_dirs_and_missing() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let file = dir.path().join("f");
        let tree = dir.path().join("t/inner");
        runtime.write(&file, b"x").unwrap();
        runtime.create_dir_all(&tree).unwrap();

        runtime.trash(&file).unwrap();
        runtime.trash(&dir.path().join("t")).unwrap();
        runtime.trash(&dir.path().join("missing")).unwrap();

        assert!(!runtime.exists(&file));
        assert!(!runtime.exists(&dir.path().join("t")));
    }

    #[test]
    fn test_glob_matches_existing_paths() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        runtime.write(&dir.path().join("a.savedState"), b"").unwrap();
        runtime.write(&dir.path().join("b.savedState"), b"").unwrap();
        runtime.write(&dir.path().join("c.txt"), b"").unwrap();

        let pattern = format!("{}/*.savedState", dir.path().display());
        let mut found = runtime.glob(&pattern).unwrap();
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("a.savedState"));
    }

    #[test]
    fn test_real_runtime_errors() {
        let runtime = RealRuntime;
        let result = runtime.read_to_string(std::path::Path::new("/nonexistent/path/file.txt"));
        assert!(result.is_err());
        let result = runtime.open(std::path::Path::new("/nonexistent/path/file.txt"));
        assert!(result.is_err());
    }
}
