//! Manifest store: every known manifest, indexed by name and version.
//!
//! The store is built once by [`ManifestStore::load`] and is read-only
//! afterwards.

mod source;

use log::{debug, info};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CaskError, CaskResult};
use crate::manifest::{PackageId, PackageManifest, PackageRef, Version};
use crate::runtime::Runtime;

pub use source::ManifestSource;

#[derive(Debug, Default, Clone)]
pub struct ManifestStore {
    /// name -> version -> manifest
    families: BTreeMap<String, BTreeMap<Version, PackageManifest>>,
}

impl ManifestStore {
    /// Load every manifest from `source`.
    ///
    /// Fails on the first malformed entry or on a duplicate `name@version`.
    pub fn load<R: Runtime + ?Sized>(runtime: &R, source: &ManifestSource) -> CaskResult<Self> {
        let mut store = ManifestStore::default();
        let mut origins: BTreeMap<PackageId, String> = BTreeMap::new();

        for (source_name, text) in read_source(runtime, source)? {
            for manifest in parse_document(&text, &source_name)? {
                let id = manifest.id();
                if let Some(first) = origins.get(&id) {
                    return Err(CaskError::parse(
                        &source_name,
                        format!("duplicate manifest {} (already defined in {})", id, first),
                    ));
                }
                origins.insert(id, source_name.clone());
                store.insert(manifest);
            }
        }

        info!(
            "Loaded {} manifests in {} families from {}",
            store.len(),
            store.families.len(),
            source
        );
        Ok(store)
    }

    /// Build a store from already-parsed manifests.
    pub fn from_manifests(manifests: impl IntoIterator<Item = PackageManifest>) -> CaskResult<Self> {
        let mut store = ManifestStore::default();
        for manifest in manifests {
            if store.find(&manifest.name, Some(&manifest.version)).is_some() {
                return Err(CaskError::parse(
                    "manifests",
                    format!("duplicate manifest {}", manifest.id()),
                ));
            }
            store.insert(manifest);
        }
        Ok(store)
    }

    fn insert(&mut self, manifest: PackageManifest) {
        self.families
            .entry(manifest.name.clone())
            .or_default()
            .insert(manifest.version.clone(), manifest);
    }

    /// The manifest for `name@version`, or the newest version when `version` is `None`.
    pub fn find(&self, name: &str, version: Option<&Version>) -> Option<&PackageManifest> {
        let family = self.families.get(name)?;
        match version {
            Some(version) => family.get(version),
            None => family.values().next_back(),
        }
    }

    pub fn find_ref(&self, reference: &PackageRef) -> Option<&PackageManifest> {
        self.find(&reference.name, reference.version.as_ref())
    }

    pub fn find_id(&self, id: &PackageId) -> Option<&PackageManifest> {
        self.find(&id.name, Some(&id.version))
    }

    /// All versions of a family, newest first. Empty for an unknown name.
    pub fn all_versions(&self, name: &str) -> Vec<Version> {
        self.families
            .get(name)
            .map(|family| family.keys().rev().cloned().collect())
            .unwrap_or_default()
    }

    /// Family names in sorted order.
    pub fn families(&self) -> Vec<&str> {
        self.families.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageManifest> {
        self.families.values().flat_map(|family| family.values())
    }

    pub fn len(&self) -> usize {
        self.families.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

/// Collect `(source name, text)` pairs for a source.
fn read_source<R: Runtime + ?Sized>(
    runtime: &R,
    source: &ManifestSource,
) -> CaskResult<Vec<(String, String)>> {
    match source {
        ManifestSource::Inline { label, json } => Ok(vec![(label.clone(), json.clone())]),
        ManifestSource::File(path) => Ok(vec![read_file(runtime, path)?]),
        ManifestSource::Directory(dir) => {
            let mut paths = runtime.read_dir(dir).map_err(|e| {
                CaskError::parse(dir.display().to_string(), format!("cannot read directory: {:#}", e))
            })?;
            paths.retain(|p| {
                p.extension().is_some_and(|ext| ext == "json") && !runtime.is_dir(p)
            });
            paths.sort();
            debug!("Found {} manifest files in {:?}", paths.len(), dir);
            paths.iter().map(|p| read_file(runtime, p)).collect()
        }
    }
}

fn read_file<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> CaskResult<(String, String)> {
    let name = path.display().to_string();
    let text = runtime
        .read_to_string(path)
        .map_err(|e| CaskError::parse(&name, format!("cannot read file: {:#}", e)))?;
    Ok((name, text))
}

/// A document is one manifest object or an array of them.
fn parse_document(text: &str, source_name: &str) -> CaskResult<Vec<PackageManifest>> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| CaskError::parse(source_name, format!("invalid JSON: {}", e)))?;
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                PackageManifest::from_json(item, &format!("{}[{}]", source_name, i))
            })
            .collect(),
        object @ serde_json::Value::Object(_) => {
            Ok(vec![PackageManifest::from_json(object, source_name)?])
        }
        _ => Err(CaskError::parse(
            source_name,
            "expected a manifest object or an array of manifests",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;
    use std::path::PathBuf;

    const SUM: &str = "5ec01af38bd5f4096bc4c7b1999ccb7fbc7ebfd3f565ef6325739844b86c849c";

    fn manifest_json(name: &str, version: &str) -> String {
        format!(
            r#"{{"name": "{}", "version": "{}", "url": "https://example.com/{{version}}.zip", "sha256": "{}"}}"#,
            name, version, SUM
        )
    }

    fn inline(json: String) -> ManifestSource {
        ManifestSource::inline("inline", json)
    }

    fn godot_store() -> ManifestStore {
        let json = format!(
            "[{}, {}, {}, {}]",
            manifest_json("godot", "3.0"),
            manifest_json("godot", "4.1.4"),
            manifest_json("godot", "4.0"),
            manifest_json("godot-mono", "4.0"),
        );
        ManifestStore::load(&MockRuntime::new(), &inline(json)).unwrap()
    }

    #[test]
    fn test_load_inline_array() {
        let store = godot_store();
        assert_eq!(store.len(), 4);
        assert_eq!(store.families(), vec!["godot", "godot-mono"]);
    }

    #[test]
    fn test_find_exact_and_newest() {
        let store = godot_store();
        let v4 = Version::parse("4.0").unwrap();
        assert_eq!(store.find("godot", Some(&v4)).unwrap().version, v4);
        assert_eq!(
            store.find("godot", None).unwrap().version.to_string(),
            "4.1.4"
        );
        assert!(store.find("godot", Some(&Version::parse("9.9").unwrap())).is_none());
        assert!(store.find("unity", None).is_none());
    }

    #[test]
    fn test_find_ref() {
        let store = godot_store();
        let r: PackageRef = "godot-mono@4.0".parse().unwrap();
        assert_eq!(store.find_ref(&r).unwrap().name, "godot-mono");
    }

    #[test]
    fn test_all_versions_newest_first() {
        let store = godot_store();
        let versions: Vec<String> = store
            .all_versions("godot")
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(versions, vec!["4.1.4", "4.0", "3.0"]);
        assert!(store.all_versions("unknown").is_empty());
    }

    #[test]
    fn test_duplicate_is_parse_error() {
        let json = format!(
            "[{}, {}]",
            manifest_json("godot", "4.0"),
            manifest_json("godot", "4.0")
        );
        let err = ManifestStore::load(&MockRuntime::new(), &inline(json)).unwrap_err();
        assert!(matches!(err, CaskError::Parse { .. }));
        assert!(err.to_string().contains("duplicate manifest godot@4.0"));
    }

    #[test]
    fn test_invalid_json_names_source() {
        let err = ManifestStore::load(&MockRuntime::new(), &inline("{not json".into()))
            .unwrap_err();
        match err {
            CaskError::Parse { source_name, message } => {
                assert_eq!(source_name, "inline");
                assert!(message.contains("invalid JSON"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_array_entry_errors_carry_index() {
        let json = format!(r#"[{}, {{"name": "broken"}}]"#, manifest_json("godot", "4.0"));
        let err = ManifestStore::load(&MockRuntime::new(), &inline(json)).unwrap_err();
        match err {
            CaskError::Parse { source_name, .. } => assert_eq!(source_name, "inline[1]"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_load_directory_reads_json_files_only() {
        let dir = PathBuf::from("/manifests");
        let mut runtime = MockRuntime::new();
        runtime.expect_read_dir().with(eq(dir.clone())).returning(|d| {
            Ok(vec![
                d.join("godot.json"),
                d.join("README.md"),
                d.join("godot-mono.json"),
            ])
        });
        runtime.expect_is_dir().returning(|_| false);
        runtime
            .expect_read_to_string()
            .with(eq(dir.join("godot.json")))
            .returning(|_| Ok(manifest_json("godot", "4.0")));
        runtime
            .expect_read_to_string()
            .with(eq(dir.join("godot-mono.json")))
            .returning(|_| Ok(manifest_json("godot-mono", "4.0")));

        let store = ManifestStore::load(&runtime, &ManifestSource::Directory(dir)).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_duplicate_across_files_names_both() {
        let dir = PathBuf::from("/manifests");
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_dir()
            .returning(|d| Ok(vec![d.join("a.json"), d.join("b.json")]));
        runtime.expect_is_dir().returning(|_| false);
        runtime
            .expect_read_to_string()
            .returning(|_| Ok(manifest_json("godot", "4.0")));

        let err = ManifestStore::load(&runtime, &ManifestSource::Directory(dir)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("b.json"));
        assert!(msg.contains("a.json"));
    }

    #[test]
    fn test_from_manifests_rejects_duplicates() {
        let m = PackageManifest::from_json(
            serde_json::from_str(&manifest_json("godot", "4.0")).unwrap(),
            "x",
        )
        .unwrap();
        assert!(ManifestStore::from_manifests(vec![m.clone(), m]).is_err());
    }

    #[test]
    fn test_bundled_manifests_load() {
        let dir = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/manifests"));
        let store = ManifestStore::load(
            &crate::runtime::RealRuntime,
            &ManifestSource::Directory(dir),
        )
        .unwrap();

        assert_eq!(store.families(), vec!["godot", "godot-dotnet", "godot-mono"]);
        assert_eq!(store.all_versions("godot").len(), 19);
        assert_eq!(store.all_versions("godot-mono").len(), 4);

        // The family reference covers versions missing from the explicit list.
        let index = crate::resolver::ConflictIndex::build(store.iter());
        let mono = store.find("godot-mono", Some(&"4.0".parse().unwrap())).unwrap();
        let unlisted = PackageId::new("godot-mono", "4.4".parse().unwrap());
        assert!(index.adjacent(&mono.id(), &unlisted));
        assert!(!index.adjacent(&mono.id(), &mono.id()));
    }
}
