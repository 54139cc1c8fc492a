//! Interpretation of install actions against the filesystem.

use anyhow::{Context, Result, bail};
use log::debug;
use std::path::{Path, PathBuf};

use super::journal::Journal;
use crate::layout::Layout;
use crate::manifest::{DEFAULT_SHIM_TEMPLATE, InstallAction, PackageManifest, Placeholders};
use crate::runtime::{Runtime, is_path_under, relative_symlink_path, resolve_link_target};
use crate::state::{FileKind, InstalledFile};

const SCRIPT_MODE: u32 = 0o755;

pub(super) fn placeholders<R: Runtime + ?Sized>(
    runtime: &R,
    layout: &Layout,
    manifest: &PackageManifest,
) -> Placeholders {
    Placeholders {
        name: manifest.name.clone(),
        version: manifest.version.to_string(),
        appdir: layout.appdir().to_path_buf(),
        bindir: layout.bindir().to_path_buf(),
        staged: layout.staged_dir(&manifest.id()),
        home: runtime.home_dir(),
    }
}

/// Applies the install actions of one package, journaling each effect first.
pub(super) struct StepRunner<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    layout: &'a Layout,
    placeholders: Placeholders,
}

impl<'a, R: Runtime + ?Sized> StepRunner<'a, R> {
    pub fn new(runtime: &'a R, layout: &'a Layout, manifest: &PackageManifest) -> Self {
        Self {
            runtime,
            layout,
            placeholders: placeholders(runtime, layout, manifest),
        }
    }

    pub fn staged(&self) -> &Path {
        &self.placeholders.staged
    }

    /// Paths outside the staged directory that `action` will create.
    pub fn target_of(&self, action: &InstallAction) -> PathBuf {
        match action {
            InstallAction::App { source, target } => self.app_target(source, target.as_deref()),
            InstallAction::Binary { target, .. } | InstallAction::Shim { target, .. } => {
                self.layout.bindir().join(target)
            }
        }
    }

    fn app_target(&self, source: &str, target: Option<&str>) -> PathBuf {
        let source = self.placeholders.expand(source);
        let target = target.map(|t| self.placeholders.expand(t));
        self.layout
            .appdir()
            .join(InstallAction::app_target_name(&source, target.as_deref()))
    }

    pub fn apply(&self, action: &InstallAction, journal: &mut Journal<'_, R>) -> Result<()> {
        match action {
            InstallAction::App { source, target } => {
                self.place_app(source, target.as_deref(), journal)
            }
            InstallAction::Binary { source, target } => {
                let source = self.resolve_source(source);
                if !self.runtime.exists(&source) {
                    bail!("Binary source {:?} does not exist", source);
                }
                self.place_link(&self.layout.bindir().join(target), &source, journal)
            }
            InstallAction::Shim {
                target,
                exec,
                template,
            } => self.write_shim(target, exec, template.as_deref(), journal),
        }
    }

    /// Relative sources are taken from the staged directory.
    fn resolve_source(&self, source: &str) -> PathBuf {
        let path = self.placeholders.expand_path(source);
        if path.is_absolute() {
            path
        } else {
            self.staged().join(path)
        }
    }

    fn place_app(
        &self,
        source: &str,
        target: Option<&str>,
        journal: &mut Journal<'_, R>,
    ) -> Result<()> {
        let from = self.resolve_source(source);
        let to = self.app_target(source, target);
        if !self.runtime.exists(&from) {
            bail!("App {:?} not found in the staged artifact", from);
        }
        if self.runtime.exists(&to) || self.runtime.is_symlink(&to) {
            bail!("Refusing to overwrite {:?}: it was not installed by this package", to);
        }
        self.runtime.create_dir_all(self.layout.appdir())?;

        debug!("Moving {:?} to {:?}", from, to);
        journal.record(FileKind::App, &to)?;
        self.runtime
            .move_path(&from, &to)
            .with_context(|| format!("Failed to move {:?} to {:?}", from, to))
    }

    fn write_shim(
        &self,
        target: &str,
        exec: &str,
        template: Option<&str>,
        journal: &mut Journal<'_, R>,
    ) -> Result<()> {
        let exec = self.placeholders.expand(exec);
        let body = self
            .placeholders
            .expand(&template.unwrap_or(DEFAULT_SHIM_TEMPLATE).replace("{exec}", &exec));
        let script = self.staged().join(format!("{}.wrapper.sh", target));

        debug!("Writing shim {:?} for {}", script, exec);
        journal.record(FileKind::Script, &script)?;
        self.runtime
            .write(&script, body.as_bytes())
            .with_context(|| format!("Failed to write shim {:?}", script))?;
        self.runtime.set_permissions(&script, SCRIPT_MODE)?;

        self.place_link(&self.layout.bindir().join(target), &script, journal)
    }

    /// Link `link` to `target`. A link that already resolves to `target` is
    /// adopted and left out of the journal, so undo never removes it.
    /// Anything else at `link` is an error.
    fn place_link(&self, link: &Path, target: &Path, journal: &mut Journal<'_, R>) -> Result<()> {
        if self.runtime.is_symlink(link) {
            let existing = self.runtime.read_link(link)?;
            if resolve_link_target(link, &existing) == resolve_link_target(link, target) {
                debug!("{:?} already points to {:?}", link, target);
                return Ok(());
            }
            bail!(
                "{:?} already exists and points to {:?}, not {:?}",
                link,
                existing,
                target
            );
        }
        if self.runtime.exists(link) {
            bail!("{:?} already exists and is not a symlink", link);
        }

        if let Some(parent) = link.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        let original =
            relative_symlink_path(link, target).unwrap_or_else(|| target.to_path_buf());

        debug!("Linking {:?} -> {:?}", link, original);
        journal.record(FileKind::Link, link)?;
        self.runtime
            .symlink(&original, link)
            .with_context(|| format!("Failed to create symlink {:?}", link))
    }
}

/// Remove one recorded effect. Links are only removed while they are still
/// symlinks; everything else goes through `trash`, which tolerates absence.
pub(super) fn undo<R: Runtime + ?Sized>(runtime: &R, file: &InstalledFile) -> Result<()> {
    match file.kind {
        FileKind::Link => {
            if runtime.is_symlink(&file.path) {
                runtime.remove_symlink(&file.path)?;
            }
            Ok(())
        }
        FileKind::Staged | FileKind::App | FileKind::Script => runtime.trash(&file.path),
    }
}

/// Filesystem roots, the home directory itself and anything containing the
/// install root are never removed by a cleanup pattern.
pub(super) fn is_protected(path: &Path, home: Option<&Path>, install_root: &Path) -> bool {
    path.parent().is_none() || home.is_some_and(|h| h == path) || is_path_under(install_root, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PackageId;
    use crate::runtime::{MockRuntime, RealRuntime};
    use crate::test_utils::manifest;
    use mockall::predicate::eq;
    use tempfile::tempdir;

    #[test]
    fn test_target_of_expands_app_and_bin_names() {
        let runtime = RealRuntime;
        let layout = Layout::new(PathBuf::from("/opt/caskr"))
            .with_appdir(PathBuf::from("/Applications"));
        let m = manifest("godot", "4.0");
        let runner = StepRunner::new(&runtime, &layout, &m);

        assert_eq!(
            runner.target_of(&InstallAction::App {
                source: "Godot.app".into(),
                target: Some("Godot {version}.app".into()),
            }),
            PathBuf::from("/Applications/Godot 4.0.app")
        );
        assert_eq!(
            runner.target_of(&InstallAction::Shim {
                target: "godot".into(),
                exec: "x".into(),
                template: None,
            }),
            PathBuf::from("/opt/caskr/bin/godot")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_place_link_adopts_identical_link() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf());
        let m = manifest("godot", "4.0");
        let runtime = RealRuntime;
        let runner = StepRunner::new(&runtime, &layout, &m);

        let target = dir.path().join("tool");
        std::fs::write(&target, "x").unwrap();
        let link = layout.bindir().join("tool");
        std::fs::create_dir_all(layout.bindir()).unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let id = PackageId::new("godot", m.version.clone());
        let mut journal = Journal::begin(&runtime, &layout, &id).unwrap();
        runner.place_link(&link, &target, &mut journal).unwrap();
        assert!(journal.effects().is_empty());
        assert!(runtime.is_symlink(&link));
    }

    #[cfg(unix)]
    #[test]
    fn test_place_link_rejects_foreign_link() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path().to_path_buf());
        let m = manifest("godot", "4.0");
        let runtime = RealRuntime;
        let runner = StepRunner::new(&runtime, &layout, &m);

        let link = layout.bindir().join("tool");
        std::fs::create_dir_all(layout.bindir()).unwrap();
        std::os::unix::fs::symlink("/somewhere/else", &link).unwrap();

        let mut journal = Journal::begin(&runtime, &layout, &m.id()).unwrap();
        let err = runner
            .place_link(&link, &dir.path().join("tool"), &mut journal)
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert!(journal.effects().is_empty());
    }

    #[test]
    fn test_undo_link_skips_non_symlink() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_is_symlink()
            .with(eq(PathBuf::from("/bin/godot")))
            .returning(|_| false);
        runtime.expect_remove_symlink().never();

        undo(&runtime, &InstalledFile::new(FileKind::Link, "/bin/godot")).unwrap();
    }

    #[test]
    fn test_undo_app_trashes() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_trash()
            .with(eq(PathBuf::from("/Applications/Godot.app")))
            .times(1)
            .returning(|_| Ok(()));

        undo(
            &runtime,
            &InstalledFile::new(FileKind::App, "/Applications/Godot.app"),
        )
        .unwrap();
    }

    #[test]
    fn test_is_protected() {
        let home = Path::new("/home/user");
        let root = Path::new("/home/user/.caskr");
        assert!(is_protected(Path::new("/"), Some(home), root));
        assert!(is_protected(home, Some(home), root));
        assert!(is_protected(root, Some(home), root));
        assert!(!is_protected(
            Path::new("/home/user/Library/Caches/Godot"),
            Some(home),
            root
        ));
    }
}
