use anyhow::Result;
use serde::Deserialize;
use std::fmt;

use crate::http::HttpClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepo {
    pub owner: String,
    pub repo: String,
}

impl fmt::Display for GitHubRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// The part of a GitHub release object livecheck looks at.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
}

pub fn latest_release_url(api_url: &str, repo: &GitHubRepo) -> String {
    format!(
        "{}/repos/{}/{}/releases/latest",
        api_url.trim_end_matches('/'),
        repo.owner,
        repo.repo
    )
}

pub fn releases_url(api_url: &str, repo: &GitHubRepo) -> String {
    format!(
        "{}/repos/{}/{}/releases?per_page=100",
        api_url.trim_end_matches('/'),
        repo.owner,
        repo.repo
    )
}

#[tracing::instrument(skip(http))]
pub async fn fetch_latest(http: &HttpClient, url: &str) -> Result<Release> {
    http.get_json(url).await
}

#[tracing::instrument(skip(http))]
pub async fn fetch_releases(http: &HttpClient, url: &str) -> Result<Vec<Release>> {
    http.get_json(url).await
}
