//! Package manifest model.
//!
//! A [`PackageManifest`] describes one installable version of one package:
//! where its artifact lives, what it must hash to, which packages it cannot
//! coexist with or needs, and the ordered effects of installing and removing it.
//! Manifests are immutable once loaded.

mod action;
mod checksum;
mod livecheck;
mod reference;
mod version;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CaskError, CaskResult};

pub use action::{
    DEFAULT_SHIM_TEMPLATE, InstallAction, Placeholders, UninstallAction, expand_tilde,
};
pub use checksum::{Checksum, HashingWriter};
pub use livecheck::{DEFAULT_TAG_REGEX, LivecheckStrategy, github_repo_from_url};
pub use reference::{PackageId, PackageRef};
pub use version::Version;

/// Minimum host platform required by a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsRequirement {
    /// Operating system name as reported by `std::env::consts::OS` (e.g. `macos`).
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<Version>,
}

impl fmt::Display for OsRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.min_version {
            Some(v) => write!(f, "{} >= {}", self.os, v),
            None => write!(f, "{}", self.os),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// Artifact URL template; `{version}` and `{name}` are substituted.
    pub url: String,
    pub checksum: Checksum,
    #[serde(default)]
    pub conflicts_with: Vec<PackageRef>,
    #[serde(default)]
    pub depends_on: Vec<PackageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_os: Option<OsRequirement>,
    #[serde(default)]
    pub install: Vec<InstallAction>,
    #[serde(default)]
    pub uninstall: Vec<UninstallAction>,
    #[serde(default)]
    pub cleanup_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub livecheck: Option<LivecheckStrategy>,
}

impl PackageManifest {
    pub fn id(&self) -> PackageId {
        PackageId::new(self.name.clone(), self.version.clone())
    }

    /// The artifact URL with the version substituted.
    pub fn artifact_url(&self) -> String {
        self.url
            .replace("{version}", &self.version.to_string())
            .replace("{name}", &self.name)
    }

    /// File name the artifact is staged under, taken from the URL path.
    pub fn artifact_file_name(&self) -> String {
        let url = self.artifact_url();
        let path = url.split(['?', '#']).next().unwrap_or(&url);
        path.rsplit('/')
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-{}", self.name, self.version))
    }

    /// Parse one manifest from a JSON value, reporting problems against `source_name`.
    pub fn from_json(value: serde_json::Value, source_name: &str) -> CaskResult<Self> {
        let raw: RawManifest = serde_json::from_value(value)
            .map_err(|e| CaskError::parse(source_name, e.to_string()))?;
        raw.validate(source_name)
    }
}

/// Wire shape of a manifest before validation. Required fields are optional
/// here so that a missing one yields a precise message.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    url: Option<String>,
    #[serde(alias = "sha256")]
    checksum: Option<String>,
    #[serde(default)]
    conflicts_with: Vec<String>,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    requires_os: Option<RawOsRequirement>,
    #[serde(default)]
    install: Vec<InstallAction>,
    #[serde(default)]
    uninstall: Vec<UninstallAction>,
    #[serde(default)]
    cleanup_paths: Vec<String>,
    #[serde(default)]
    livecheck: Option<LivecheckStrategy>,
}

#[derive(Deserialize)]
struct RawOsRequirement {
    os: String,
    #[serde(default)]
    min_version: Option<String>,
}

impl RawManifest {
    fn validate(self, source_name: &str) -> CaskResult<PackageManifest> {
        let name = self
            .name
            .ok_or_else(|| CaskError::parse(source_name, "missing required field 'name'"))?;
        reference::validate_name(&name).map_err(|msg| CaskError::parse(source_name, msg))?;

        // Everything below names the package for context.
        let fail = |msg: String| CaskError::parse(source_name, format!("{}: {}", name, msg));

        let version_str = self
            .version
            .ok_or_else(|| fail("missing required field 'version'".into()))?;
        let version = Version::parse(&version_str)
            .map_err(|_| fail(format!("malformed version '{}'", version_str)))?;

        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| fail("missing required field 'url'".into()))?;

        let checksum = self
            .checksum
            .ok_or_else(|| fail("missing required field 'checksum'".into()))?
            .parse::<Checksum>()
            .map_err(&fail)?;

        let parse_refs = |field: &str, refs: Vec<String>| -> CaskResult<Vec<PackageRef>> {
            refs.iter()
                .map(|r| {
                    r.parse::<PackageRef>()
                        .map_err(|_| fail(format!("invalid reference '{}' in {}", r, field)))
                })
                .collect()
        };
        let conflicts_with = parse_refs("conflicts_with", self.conflicts_with)?;
        let depends_on = parse_refs("depends_on", self.depends_on)?;

        let requires_os = self
            .requires_os
            .map(|raw| -> CaskResult<OsRequirement> {
                let min_version = raw
                    .min_version
                    .map(|v| {
                        Version::parse(&v)
                            .map_err(|_| fail(format!("malformed requires_os version '{}'", v)))
                    })
                    .transpose()?;
                Ok(OsRequirement {
                    os: raw.os,
                    min_version,
                })
            })
            .transpose()?;

        if let Some(strategy) = &self.livecheck
            && let Err(e) = strategy.compile_regex()
        {
            return Err(fail(format!("invalid livecheck regex: {}", e)));
        }

        Ok(PackageManifest {
            name,
            version,
            display_name: self.display_name,
            description: self.description,
            homepage: self.homepage,
            url,
            checksum,
            conflicts_with,
            depends_on,
            requires_os,
            install: self.install,
            uninstall: self.uninstall,
            cleanup_paths: self.cleanup_paths,
            livecheck: self.livecheck,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SUM: &str = "5ec01af38bd5f4096bc4c7b1999ccb7fbc7ebfd3f565ef6325739844b86c849c";

    fn godot_mono() -> serde_json::Value {
        json!({
            "name": "godot-mono",
            "version": "4.0",
            "display_name": "Godot Engine",
            "url": "https://github.com/godotengine/godot/releases/download/{version}-stable/Godot_v{version}-stable_mono_macos.universal.zip",
            "sha256": SUM,
            "conflicts_with": ["godot-mono@3.3.4", "godot-mono@4.0.1"],
            "depends_on": ["dotnet-sdk"],
            "requires_os": {"os": "macos", "min_version": "10.12"},
            "install": [
                {"type": "app", "source": "Godot_mono.app"},
                {"type": "shim", "target": "godot-mono", "exec": "{appdir}/Godot_mono.app/Contents/MacOS/Godot"}
            ],
            "uninstall": [{"type": "quit", "bundle_id": "org.godotengine.godot"}],
            "cleanup_paths": ["~/Library/Caches/Godot"],
            "livecheck": {"strategy": "github_latest"}
        })
    }

    #[test]
    fn test_from_json_full_manifest() {
        let m = PackageManifest::from_json(godot_mono(), "godot-mono.json").unwrap();
        assert_eq!(m.id().to_string(), "godot-mono@4.0");
        assert_eq!(m.conflicts_with.len(), 2);
        assert_eq!(m.depends_on, vec![PackageRef::name("dotnet-sdk")]);
        assert_eq!(m.requires_os.as_ref().unwrap().to_string(), "macos >= 10.12");
        assert_eq!(m.install.len(), 2);
        assert_eq!(m.checksum.as_hex(), SUM);
    }

    #[test]
    fn test_artifact_url_substitutes_version() {
        let m = PackageManifest::from_json(godot_mono(), "x").unwrap();
        assert_eq!(
            m.artifact_url(),
            "https://github.com/godotengine/godot/releases/download/4.0-stable/Godot_v4.0-stable_mono_macos.universal.zip"
        );
        assert_eq!(
            m.artifact_file_name(),
            "Godot_v4.0-stable_mono_macos.universal.zip"
        );
    }

    #[test]
    fn test_missing_required_fields() {
        for field in ["name", "version", "url", "sha256"] {
            let mut value = godot_mono();
            value.as_object_mut().unwrap().remove(field);
            let err = PackageManifest::from_json(value, "m.json").unwrap_err();
            let field_name = if field == "sha256" { "checksum" } else { field };
            match err {
                CaskError::Parse { source_name, message } => {
                    assert_eq!(source_name, "m.json");
                    assert!(message.contains(field_name), "message: {}", message);
                }
                other => panic!("expected parse error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_malformed_version_is_parse_error() {
        let mut value = godot_mono();
        value["version"] = json!("four");
        let err = PackageManifest::from_json(value, "m.json").unwrap_err();
        assert!(matches!(err, CaskError::Parse { .. }));
        assert!(err.to_string().contains("malformed version"));
    }

    #[test]
    fn test_bad_reference_and_checksum_rejected() {
        let mut value = godot_mono();
        value["conflicts_with"] = json!(["godot-mono@"]);
        assert!(PackageManifest::from_json(value, "m").is_err());

        let mut value = godot_mono();
        value["sha256"] = json!("deadbeef");
        assert!(PackageManifest::from_json(value, "m").is_err());
    }

    #[test]
    fn test_invalid_livecheck_regex_rejected() {
        let mut value = godot_mono();
        value["livecheck"] = json!({"strategy": "github_latest", "regex": "(unclosed"});
        let err = PackageManifest::from_json(value, "m").unwrap_err();
        assert!(err.to_string().contains("livecheck regex"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut value = godot_mono();
        value["colour"] = json!("blue");
        assert!(PackageManifest::from_json(value, "m").is_err());
    }

    #[test]
    fn test_manifest_roundtrips_through_record_snapshot() {
        let m = PackageManifest::from_json(godot_mono(), "x").unwrap();
        let json = serde_json::to_string(&m).unwrap();
        let back: PackageManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
