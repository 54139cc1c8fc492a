//! Runtime abstraction for system operations.
//!
//! The executor and the stores never touch the OS directly; they go through
//! [`Runtime`] so tests can substitute `MockRuntime`.
//!
//! # Structure
//!
//! - `path` - Path utility functions (normalize, is_path_under, relative_symlink_path)
//! - `env` - Environment variables, home directory, privilege and host platform
//! - `fs` - File system operations (read, write, directory, move, trash, glob)
//! - `symlink` - Symlink operations (create, read, remove)
//! - `process` - Quitting running applications by bundle identifier

mod env;
mod fs;
pub mod path;
mod process;
mod symlink;

use anyhow::Result;
use std::env as std_env;
use std::path::{Path, PathBuf};

pub use path::{is_path_under, relative_symlink_path, resolve_link_target};

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;

    // File System
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    /// Remove `path` only if it is an empty directory. Returns whether it was removed.
    fn remove_empty_dir(&self, path: &Path) -> Result<bool>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>>;
    fn open(&self, path: &Path) -> Result<Box<dyn std::io::Read + Send>>;

    /// Move a file or directory, falling back to copy-and-delete across devices.
    fn move_path(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a file, directory tree or symlink. Missing paths are not an error.
    fn trash(&self, path: &Path) -> Result<()>;

    /// Expand a glob pattern to the existing paths it matches.
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>>;

    /// Set file permissions (mode) on Unix systems. No-op on Windows.
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()>;

    // Symlinks
    fn symlink(&self, original: &Path, link: &Path) -> Result<()>;
    fn read_link(&self, path: &Path) -> Result<PathBuf>;
    fn is_symlink(&self, path: &Path) -> bool;
    fn remove_symlink(&self, path: &Path) -> Result<()>;

    // Directories
    fn home_dir(&self) -> Option<PathBuf>;

    // Privilege
    fn is_privileged(&self) -> bool;

    // Host platform
    /// Operating system name, as in `std::env::consts::OS`.
    fn os_name(&self) -> String;
    /// Operating system release version, when it can be determined.
    fn os_version(&self) -> Option<String>;

    // Processes
    /// Ask the application with the given bundle identifier to quit.
    /// Returns Ok(true) if a running instance was asked to quit, Ok(false) if none was found.
    fn quit_application(&self, bundle_id: &str) -> Result<bool>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.remove_dir_all_impl(path)
    }

    fn remove_empty_dir(&self, path: &Path) -> Result<bool> {
        self.remove_empty_dir_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>> {
        self.create_file_impl(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn std::io::Read + Send>> {
        self.open_impl(path)
    }

    fn move_path(&self, from: &Path, to: &Path) -> Result<()> {
        self.move_path_impl(from, to)
    }

    fn trash(&self, path: &Path) -> Result<()> {
        self.trash_impl(path)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        self.glob_impl(pattern)
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()> {
        self.set_permissions_impl(path, mode)
    }

    fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
        self.symlink_impl(original, link)
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        self.read_link_impl(path)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        self.is_symlink_impl(path)
    }

    fn remove_symlink(&self, path: &Path) -> Result<()> {
        self.remove_symlink_impl(path)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir_impl()
    }

    fn is_privileged(&self) -> bool {
        self.is_privileged_impl()
    }

    fn os_name(&self) -> String {
        self.os_name_impl()
    }

    fn os_version(&self) -> Option<String> {
        self.os_version_impl()
    }

    fn quit_application(&self, bundle_id: &str) -> Result<bool> {
        self.quit_application_impl(bundle_id)
    }
}
