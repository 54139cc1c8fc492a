//! Version tokens and their ordering.
//!
//! A version is a dotted numeric sequence (`4.0`, `2.0.4.1`) with an optional
//! leading `v` and an optional pre-release suffix after `-` (`4.0-beta1`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::CaskError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    components: Vec<u64>,
    pre: Option<String>,
}

impl Version {
    pub fn new(components: Vec<u64>) -> Self {
        Self {
            components,
            pre: None,
        }
    }

    pub fn parse(s: &str) -> Result<Self, CaskError> {
        let malformed = || CaskError::MalformedVersion(s.to_string());

        let trimmed = s.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(malformed());
        }

        let (release, pre) = match trimmed.split_once('-') {
            Some((release, pre)) => {
                if pre.is_empty() || !pre.chars().all(|c| c.is_ascii_alphanumeric() || c == '.')
                {
                    return Err(malformed());
                }
                (release, Some(normalize_pre(pre)))
            }
            None => (trimmed, None),
        };

        let components = release
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                    return Err(malformed());
                }
                part.parse::<u64>().map_err(|_| malformed())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { components, pre })
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    pub fn pre_release(&self) -> Option<&str> {
        self.pre.as_deref()
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre.is_some()
    }

    /// The leading component, e.g. `4` for `4.1.3`.
    pub fn major(&self) -> u64 {
        self.components.first().copied().unwrap_or(0)
    }
}

/// Numeric identifiers lose their leading zeros, so `rc.01` and `rc.1` are the
/// same version.
fn normalize_pre(pre: &str) -> String {
    pre.split('.')
        .map(|ident| match ident.parse::<u64>() {
            Ok(n) => n.to_string(),
            Err(_) => ident.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn compare_pre(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }

        // Numerically equal releases: a pre-release sorts first.
        let pre = match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => compare_pre(a, b),
        };
        if pre != Ordering::Equal {
            return pre;
        }

        // `4.0` and `4.0.0` are distinct tokens; keep the order total.
        self.components.len().cmp(&other.components.len())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release = self
            .components
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(".");
        match &self.pre {
            Some(pre) => write!(f, "{}-{}", release, pre),
            None => write!(f, "{}", release),
        }
    }
}

impl FromStr for Version {
    type Err = CaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}
