//! HTTP client with retry logic and error classification.

mod client;
mod retry;

pub use client::{DEFAULT_TIMEOUT, HttpClient};
pub use retry::{MAX_RETRIES, NonRetryableError};
