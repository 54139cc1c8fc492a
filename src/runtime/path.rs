//! Path utility functions for normalization and comparison.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // At root there is nothing to pop; keep the `..`
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Check if a path is under a given directory by comparing normalized path components.
///
/// `/opt/caskr/bin/../../../etc/passwd` is NOT under `/opt/caskr`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// Calculate the relative path from a symlink location to a target.
///
/// For a link at `/opt/caskr/bin/godot` pointing to
/// `/opt/caskr/Caskroom/godot/4.0/godot.wrapper.sh`, this returns
/// `../Caskroom/godot/4.0/godot.wrapper.sh`.
///
/// Returns `None` if a relative path cannot be computed (e.g., different drive letters on Windows).
pub fn relative_symlink_path(from_link: &Path, to_target: &Path) -> Option<PathBuf> {
    let from_dir = from_link.parent()?;
    let result = pathdiff::diff_paths(to_target, from_dir)?;

    if result.is_absolute() {
        return None;
    }

    Some(result)
}

/// Absolute, normalized form of a link target as read from `link`.
pub fn resolve_link_target(link: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        normalize_path(target)
    } else {
        let parent = link.parent().unwrap_or(Path::new(""));
        normalize_path(&parent.join(target))
    }
}
