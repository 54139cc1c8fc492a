//! Package identifiers (`name@version`) and references (`name[@version]`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::Version;
use crate::error::CaskError;

/// Exact identity of one manifest or installation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    pub name: String,
    pub version: Version,
}

impl PackageId {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A reference to a package family, optionally pinned to one version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRef {
    pub name: String,
    pub version: Option<Version>,
}

impl PackageRef {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn exact(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
        }
    }

    /// True when `id` is the referenced package (any version if unpinned).
    pub fn matches(&self, id: &PackageId) -> bool {
        self.name == id.name && self.version.as_ref().is_none_or(|v| *v == id.version)
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("package name is empty".to_string());
    }
    if name.contains('@') || name.contains('/') || name.chars().any(char::is_whitespace) {
        return Err(format!("invalid package name '{}'", name));
    }
    Ok(())
}

impl FromStr for PackageRef {
    type Err = CaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, version) = match s.split_once('@') {
            Some((name, version)) => (name, Some(Version::parse(version)?)),
            None => (s, None),
        };
        validate_name(name).map_err(|msg| CaskError::parse("package reference", msg))?;
        Ok(Self {
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

impl From<&PackageId> for PackageRef {
    fn from(id: &PackageId) -> Self {
        PackageRef::exact(id.name.clone(), id.version.clone())
    }
}

impl Serialize for PackageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PackageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
