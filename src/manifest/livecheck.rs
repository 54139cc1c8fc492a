//! Livecheck strategy descriptors.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default tag pattern: `4.1.4-stable`, `v4.1.4-stable` or `4.1.4_STABLE`.
pub const DEFAULT_TAG_REGEX: &str = r"(?i)^v?(\d+(?:\.\d+)+)[._-]stable$";

/// How to discover the newest upstream version of a package.
///
/// A missing `url` means "derive it from the artifact URL".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum LivecheckStrategy {
    /// Latest release of a GitHub repository, tag matched with `regex`.
    GithubLatest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default = "default_regex")]
        regex: String,
    },
    /// Highest matching tag across the GitHub release listing.
    GithubReleases {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default = "default_regex")]
        regex: String,
        #[serde(default)]
        include_prerelease: bool,
    },
    /// Highest regex match over the body of a fixed URL.
    PageMatch { url: String, regex: String },
}

fn default_regex() -> String {
    DEFAULT_TAG_REGEX.to_string()
}

impl LivecheckStrategy {
    pub fn regex_source(&self) -> &str {
        match self {
            LivecheckStrategy::GithubLatest { regex, .. }
            | LivecheckStrategy::GithubReleases { regex, .. }
            | LivecheckStrategy::PageMatch { regex, .. } => regex,
        }
    }

    pub fn compile_regex(&self) -> Result<Regex, regex::Error> {
        Regex::new(self.regex_source())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LivecheckStrategy::GithubLatest { .. } => "github_latest",
            LivecheckStrategy::GithubReleases { .. } => "github_releases",
            LivecheckStrategy::PageMatch { .. } => "page_match",
        }
    }
}

/// Extract `owner/repo` from a `github.com` URL.
pub fn github_repo_from_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))
        .or_else(|| url.strip_prefix("github.com/"))?;
    let mut parts = rest.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    Some((owner.to_string(), repo.to_string()))
}
