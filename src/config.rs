//! Resolved runtime configuration for one CLI invocation.

use anyhow::{Context, Result};
use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CaskError, CaskResult};
use crate::http::{DEFAULT_TIMEOUT, HttpClient};
use crate::layout::{Layout, default_install_root};
use crate::resolver::FamilyPolicy;
use crate::runtime::Runtime;
use crate::store::{ManifestSource, ManifestStore};

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub root: Option<PathBuf>,
    pub manifests: Option<PathBuf>,
    pub appdir: Option<PathBuf>,
    pub bindir: Option<PathBuf>,
    pub api_url: Option<String>,
    pub policy: FamilyPolicy,
    pub timeout: Option<Duration>,
}

pub struct Config<R: Runtime> {
    pub runtime: R,
    pub layout: Layout,
    /// File or directory of manifest JSON.
    pub manifests: PathBuf,
    pub http: HttpClient,
    pub api_url: Option<String>,
    pub policy: FamilyPolicy,
}

impl<R: Runtime> Config<R> {
    pub fn new(runtime: R, options: ConfigOptions) -> Result<Self> {
        let root = match options.root {
            Some(root) => root,
            None => default_install_root(&runtime)?,
        };
        let manifests = options.manifests.unwrap_or_else(|| root.join("manifests"));

        let mut layout = Layout::new(root);
        if let Some(appdir) = options.appdir {
            layout = layout.with_appdir(appdir);
        }
        if let Some(bindir) = options.bindir {
            layout = layout.with_bindir(bindir);
        }

        let mut headers = HeaderMap::new();
        if let Ok(token) = runtime.env_var("GITHUB_TOKEN")
            && !token.is_empty()
        {
            let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("GITHUB_TOKEN is not a valid header value")?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
            debug!("Using GITHUB_TOKEN for authentication");
        }

        // Downloads may run long; they only give up on a stalled connection.
        let timeout = options.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = Client::builder()
            .user_agent(concat!("caskr/", env!("CASKR_VERSION")))
            .default_headers(headers)
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        let http = HttpClient::new(client).with_timeout(timeout);

        debug!(
            "Install root {:?}, manifests {:?}, policy {}",
            layout.root(),
            manifests,
            options.policy
        );

        Ok(Self {
            runtime,
            layout,
            manifests,
            http,
            api_url: options.api_url,
            policy: options.policy,
        })
    }

    pub fn manifest_source(&self) -> ManifestSource {
        if self.runtime.is_dir(&self.manifests) {
            ManifestSource::Directory(self.manifests.clone())
        } else {
            ManifestSource::File(self.manifests.clone())
        }
    }

    pub fn load_store(&self) -> CaskResult<ManifestStore> {
        if !self.runtime.exists(&self.manifests) {
            return Err(CaskError::NotFound(format!(
                "manifest source {}",
                self.manifests.display()
            )));
        }
        ManifestStore::load(&self.runtime, &self.manifest_source())
    }
}
