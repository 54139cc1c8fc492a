//! Artifact retrieval.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Url;
use std::io;
use std::path::Path;

use crate::http::HttpClient;
use crate::manifest::HashingWriter;
use crate::runtime::Runtime;

/// Retrieves an artifact and reports its SHA-256.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Write the bytes behind `url` to `dest` and return their hex digest.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<String>;
}

/// Fetches over HTTP(S) with retry, or reads `file://` URLs from disk.
pub struct HttpFetcher<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    http_client: &'a HttpClient,
}

impl<'a, R: Runtime + ?Sized> HttpFetcher<'a, R> {
    pub fn new(runtime: &'a R, http_client: &'a HttpClient) -> Self {
        Self {
            runtime,
            http_client,
        }
    }

    fn copy_local(&self, source: &Path, dest: &Path) -> Result<String> {
        debug!("Copying local artifact {:?}", source);
        let mut reader = self
            .runtime
            .open(source)
            .with_context(|| format!("Failed to open local artifact {:?}", source))?;
        let writer = self
            .runtime
            .create_file(dest)
            .with_context(|| format!("Failed to create {:?}", dest))?;
        let mut writer = HashingWriter::new(writer);
        io::copy(&mut reader, &mut writer)
            .with_context(|| format!("Failed to copy {:?} to {:?}", source, dest))?;
        let (digest, _) = writer.finish()?;
        Ok(digest)
    }
}

#[async_trait]
impl<'a, R: Runtime + ?Sized> ArtifactFetcher for HttpFetcher<'a, R> {
    #[tracing::instrument(skip(self, dest))]
    async fn fetch(&self, url: &str, dest: &Path) -> Result<String> {
        if url.starts_with("file:") {
            let source = Url::parse(url)
                .ok()
                .and_then(|u| u.to_file_path().ok())
                .ok_or_else(|| anyhow!("Invalid file URL: {}", url))?;
            return self.copy_local(&source, dest);
        }

        info!("Downloading {}...", url);
        let dest_buf = dest.to_path_buf();
        let (writer, bytes) = self
            .http_client
            .download_file(url, || {
                self.runtime
                    .create_file(&dest_buf)
                    .map(HashingWriter::new)
                    .with_context(|| format!("Failed to create download file at {:?}", dest_buf))
            })
            .await?;
        let (digest, _) = writer.finish()?;
        info!("Downloaded {} bytes.", bytes);
        Ok(digest)
    }
}
