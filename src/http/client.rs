//! HTTP client wrapper used for artifact downloads and upstream version checks.

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::io::Write;
use std::time::Duration;

use super::retry::{MAX_RETRIES, NonRetryableError, RETRY_DELAY_MS, check_retryable};

/// Total time allowed for one `get_json`/`get_text` request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin wrapper over a reqwest [`Client`].
///
/// Downloads retry transient failures and are not bounded in total, only by
/// whatever connect and read timeouts the inner client carries. The
/// single-shot `get_*` helpers never retry and must finish within `timeout`.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
    retry_delay: Duration,
}

impl HttpClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }

    /// Bounds each `get_json`/`get_text` request to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn get_bounded(&self, url: &str) -> RequestBuilder {
        self.client.get(url).timeout(self.timeout)
    }

    /// Performs one GET request and deserializes the JSON response.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET JSON from {}...", url);
        let response = self
            .get_bounded(url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let response = response.error_for_status().map_err(check_retryable)?;
        response
            .json::<T>()
            .await
            .context("Failed to parse JSON response")
    }

    /// Performs one GET request and returns the body as text.
    #[tracing::instrument(skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET text from {}...", url);
        let response = self
            .get_bounded(url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let response = response.error_for_status().map_err(check_retryable)?;
        response.text().await.context("Failed to read response body")
    }

    /// Downloads `url` into a fresh writer from `create_writer`, retrying
    /// transient failures. Returns the writer that received the complete body
    /// together with the byte count.
    #[tracing::instrument(skip(self, create_writer))]
    pub async fn download_file<W, F>(&self, url: &str, create_writer: F) -> Result<(W, u64)>
    where
        W: Write,
        F: Fn() -> Result<W>,
    {
        debug!("Downloading file from {}...", url);
        self.with_retry("download", || self.download_file_once(url, &create_writer))
            .await
    }

    async fn download_file_once<W, F>(&self, url: &str, create_writer: &F) -> Result<(W, u64)>
    where
        W: Write,
        F: Fn() -> Result<W>,
    {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to start download from {}", url))?;

        let mut response = response.error_for_status().map_err(check_retryable)?;

        let mut writer = create_writer()?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read chunk from download stream")?
        {
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            downloaded_bytes += chunk.len() as u64;
        }

        debug!(
            "Downloaded {:.2} MB",
            downloaded_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok((writer, downloaded_bytes))
    }

    async fn with_retry<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if e.downcast_ref::<NonRetryableError>().is_some() {
                        debug!("{}: non-retryable error: {}", operation_name, e);
                        return Err(e);
                    }

                    if attempt < MAX_RETRIES {
                        warn!(
                            "{}: attempt {}/{} failed ({:#}), retrying in {}ms...",
                            operation_name,
                            attempt,
                            MAX_RETRIES,
                            e,
                            self.retry_delay.as_millis()
                        );
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("{}: failed after {} attempts", operation_name, MAX_RETRIES)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client() -> HttpClient {
        HttpClient::new(Client::new()).with_retry_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_get_json_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/godotengine/godot/releases/latest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"tag_name": "4.1.4-stable"}"#)
            .create_async()
            .await;

        #[derive(serde::Deserialize)]
        struct Release {
            tag_name: String,
        }

        let release: Release = client()
            .get_json(&format!(
                "{}/repos/godotengine/godot/releases/latest",
                server.url()
            ))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(release.tag_name, "4.1.4-stable");
    }

    #[tokio::test]
    async fn test_get_json_does_not_retry_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/x")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let result: Result<serde_json::Value> =
            client().get_json(&format!("{}/x", server.url())).await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_text_success() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/download")
            .with_status(200)
            .with_body("<a href=\"Godot_v4.2-stable.zip\">")
            .create_async()
            .await;

        let body = client()
            .get_text(&format!("{}/download", server.url()))
            .await
            .unwrap();
        assert!(body.contains("4.2-stable"));
    }

    #[tokio::test]
    async fn test_download_file_returns_writer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/file.zip")
            .with_status(200)
            .with_body("test content")
            .create_async()
            .await;

        let (buffer, bytes) = client()
            .download_file(&format!("{}/file.zip", server.url()), || Ok(Vec::new()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, 12);
        assert_eq!(buffer, b"test content");
    }

    #[tokio::test]
    async fn test_download_file_not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/file.zip")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let result = client()
            .download_file(&format!("{}/file.zip", server.url()), || {
                Ok(std::io::sink())
            })
            .await;

        mock.assert_async().await;
        let err = result.unwrap_err();
        assert!(err.downcast_ref::<NonRetryableError>().is_some());
    }

    #[tokio::test]
    async fn test_download_file_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/file.zip")
            .with_status(503)
            .expect(MAX_RETRIES)
            .create_async()
            .await;

        let result = client()
            .download_file(&format!("{}/file.zip", server.url()), || {
                Ok(std::io::sink())
            })
            .await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_with_retry_stops_after_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = client()
            .with_retry("test", || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(anyhow::anyhow!("connection reset by peer"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_applies_to_requests() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/slow")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(std::time::Duration::from_millis(500));
                w.write_all(b"late")
            })
            .create_async()
            .await;

        let client = client().with_timeout(Duration::from_millis(50));
        let result = client.get_text(&format!("{}/slow", server.url())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_timeout_does_not_bound_downloads() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/steady.zip")
            .with_status(200)
            .with_chunked_body(|w| {
                for byte in b"zip!" {
                    std::thread::sleep(std::time::Duration::from_millis(40));
                    w.write_all(&[*byte])?;
                }
                Ok(())
            })
            .create_async()
            .await;

        let client = client().with_timeout(Duration::from_millis(50));
        let url = format!("{}/steady.zip", server.url());

        let (buffer, bytes) = client.download_file(&url, || Ok(Vec::new())).await.unwrap();
        assert_eq!(bytes, 4);
        assert_eq!(buffer, b"zip!");

        assert!(client.get_text(&url).await.is_err());
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(client().timeout(), DEFAULT_TIMEOUT);
        assert_eq!(
            client().with_timeout(Duration::from_secs(5)).timeout(),
            Duration::from_secs(5)
        );
    }
}
