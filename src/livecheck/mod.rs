//! Upstream version discovery.
//!
//! Each strategy yields candidate strings (the first capture group of the
//! strategy regex, or the whole match) that must parse as a [`Version`].
//! Requests are single-shot: a failure is reported as
//! [`CaskError::Livecheck`] and left to the caller to retry.

mod github;

use log::{debug, info};
use regex::Regex;

use crate::error::{CaskError, CaskResult};
use crate::http::HttpClient;
use crate::manifest::{
    DEFAULT_TAG_REGEX, LivecheckStrategy, PackageManifest, Version, github_repo_from_url,
};

pub use github::{GitHubRepo, Release};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Newest upstream version and where it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: Version,
    pub source: String,
}

pub struct Livecheck<'a> {
    http: &'a HttpClient,
    api_url: String,
}

impl<'a> Livecheck<'a> {
    pub fn new(http: &'a HttpClient, api_url: Option<String>) -> Self {
        Self {
            http,
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        }
    }

    /// Check `manifest` with its declared strategy, or with `github_latest`
    /// on its artifact URL when it declares none.
    pub async fn check_manifest(&self, manifest: &PackageManifest) -> CaskResult<VersionInfo> {
        let fallback;
        let strategy = match &manifest.livecheck {
            Some(strategy) => strategy,
            None => {
                fallback = LivecheckStrategy::GithubLatest {
                    url: None,
                    regex: DEFAULT_TAG_REGEX.to_string(),
                };
                &fallback
            }
        };
        self.check_latest(strategy, Some(manifest)).await
    }

    #[tracing::instrument(skip(self, manifest), fields(strategy = strategy.kind()))]
    pub async fn check_latest(
        &self,
        strategy: &LivecheckStrategy,
        manifest: Option<&PackageManifest>,
    ) -> CaskResult<VersionInfo> {
        let package = manifest
            .map(|m| m.name.clone())
            .unwrap_or_else(|| strategy.kind().to_string());
        let fail = |message: String| CaskError::Livecheck {
            package: package.clone(),
            message,
        };

        let regex = strategy
            .compile_regex()
            .map_err(|e| fail(format!("invalid regex: {}", e)))?;

        let info = match strategy {
            LivecheckStrategy::GithubLatest { url, .. } => {
                let repo = self.repo_for(url.as_deref(), manifest).ok_or_else(|| {
                    fail("no GitHub repository to check; set a livecheck url".into())
                })?;
                let source = github::latest_release_url(&self.api_url, &repo);
                let release = github::fetch_latest(self.http, &source)
                    .await
                    .map_err(|e| fail(format!("{:#}", e)))?;
                debug!("Latest release of {} is {}", repo, release.tag_name);

                let candidate = first_candidate(&regex, &release.tag_name).ok_or_else(|| {
                    fail(format!(
                        "tag '{}' does not match {}",
                        release.tag_name,
                        regex.as_str()
                    ))
                })?;
                VersionInfo {
                    version: Version::parse(&candidate)?,
                    source,
                }
            }
            LivecheckStrategy::GithubReleases {
                url,
                include_prerelease,
                ..
            } => {
                let repo = self.repo_for(url.as_deref(), manifest).ok_or_else(|| {
                    fail("no GitHub repository to check; set a livecheck url".into())
                })?;
                let source = github::releases_url(&self.api_url, &repo);
                let releases = github::fetch_releases(self.http, &source)
                    .await
                    .map_err(|e| fail(format!("{:#}", e)))?;

                let candidates = releases
                    .iter()
                    .filter(|r| !r.draft && (*include_prerelease || !r.prerelease))
                    .filter_map(|r| first_candidate(&regex, &r.tag_name));
                let version = highest(candidates)?
                    .ok_or_else(|| fail(format!("no release tag matches {}", regex.as_str())))?;
                VersionInfo { version, source }
            }
            LivecheckStrategy::PageMatch { url, .. } => {
                let body = self
                    .http
                    .get_text(url)
                    .await
                    .map_err(|e| fail(format!("{:#}", e)))?;
                let version = highest(all_candidates(&regex, &body).into_iter())?
                    .ok_or_else(|| fail(format!("nothing on {} matches {}", url, regex.as_str())))?;
                VersionInfo {
                    version,
                    source: url.clone(),
                }
            }
        };

        info!("{}: latest upstream version is {}", package, info.version);
        Ok(info)
    }

    fn repo_for(
        &self,
        url: Option<&str>,
        manifest: Option<&PackageManifest>,
    ) -> Option<GitHubRepo> {
        let from = |u: &str| {
            github_repo_from_url(u).map(|(owner, repo)| GitHubRepo { owner, repo })
        };
        match url {
            Some(url) => from(url),
            None => manifest.and_then(|m| {
                from(&m.artifact_url()).or_else(|| m.homepage.as_deref().and_then(from))
            }),
        }
    }
}

fn candidate_of(captures: &regex::Captures<'_>) -> Option<String> {
    captures
        .get(1)
        .or_else(|| captures.get(0))
        .map(|m| m.as_str().to_string())
}

fn first_candidate(regex: &Regex, text: &str) -> Option<String> {
    regex.captures(text).as_ref().and_then(candidate_of)
}

fn all_candidates(regex: &Regex, text: &str) -> Vec<String> {
    regex
        .captures_iter(text)
        .filter_map(|c| candidate_of(&c))
        .collect()
}

/// Highest parseable candidate. Unparseable candidates are skipped unless no
/// candidate parses at all, which is `MalformedVersion`.
fn highest(candidates: impl Iterator<Item = String>) -> CaskResult<Option<Version>> {
    let mut best: Option<Version> = None;
    let mut malformed = None;
    for candidate in candidates {
        match Version::parse(&candidate) {
            Ok(version) => {
                if best.as_ref().is_none_or(|b| version > *b) {
                    best = Some(version);
                }
            }
            Err(e) => {
                debug!("Skipping candidate '{}': {}", candidate, e);
                malformed.get_or_insert(e);
            }
        }
    }
    match (best, malformed) {
        (Some(version), _) => Ok(Some(version)),
        (None, Some(e)) => Err(e),
        (None, None) => Ok(None),
    }
}

/// Whether `latest` is newer than the newest version in the store.
pub fn is_outdated(newest_known: Option<&Version>, latest: &Version) -> bool {
    newest_known.is_none_or(|known| latest > known)
}
