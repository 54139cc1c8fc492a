//! Error classification for network operations.

use reqwest::StatusCode;
use thiserror::Error;

/// Maximum number of attempts for an artifact download.
pub const MAX_RETRIES: usize = 3;

/// Delay between retry attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// HTTP failures that will not go away by asking again.
#[derive(Error, Debug)]
pub enum NonRetryableError {
    #[error("Rate limit exceeded: {0}. Try again later or set GITHUB_TOKEN.")]
    RateLimitExceeded(String),

    #[error("Authentication failed: {0}. Check your GITHUB_TOKEN.")]
    AuthenticationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access forbidden: {0}")]
    Forbidden(String),

    #[error("Request error: {0}")]
    ClientError(String),
}

/// Classifies an error as retryable or non-retryable.
/// Returns Ok(()) if the error is retryable.
pub fn classify_error(error: &reqwest::Error) -> Result<(), NonRetryableError> {
    let Some(status) = error.status() else {
        // Connection errors, timeouts and the like
        return Ok(());
    };
    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "request".to_string());

    match status {
        StatusCode::UNAUTHORIZED => Err(NonRetryableError::AuthenticationFailed(url)),
        StatusCode::FORBIDDEN => {
            if error.to_string().contains("rate limit") {
                Err(NonRetryableError::RateLimitExceeded(url))
            } else {
                Err(NonRetryableError::Forbidden(url))
            }
        }
        StatusCode::TOO_MANY_REQUESTS => Err(NonRetryableError::RateLimitExceeded(url)),
        StatusCode::NOT_FOUND => Err(NonRetryableError::NotFound(url)),
        s if s.is_client_error() => Err(NonRetryableError::ClientError(format!(
            "HTTP {} from {}",
            s.as_u16(),
            url
        ))),
        // 5xx
        _ => Ok(()),
    }
}

/// Converts an `error_for_status()` failure into an error that carries its
/// retry classification.
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    match classify_error(&error) {
        Ok(()) => anyhow::Error::from(error),
        Err(non_retryable) => anyhow::Error::from(non_retryable),
    }
}
