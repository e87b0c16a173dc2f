//! HTTP requests with exponential backoff
//!
//! One request pipeline for every TVM endpoint: send, log, read the body,
//! and retry transient failures.
//!
//! # Retry policy
//! - **Retried**: 5xx responses and transport failures (connect errors,
//!   timeouts, body read failures)
//! - **Not retried**: everything else, including 4xx; the response goes back
//!   to the caller as-is
//! - **Delay**: retry `n` waits `min(2^n * initial_delay_ms, max_wait_ms)`
//! - **Exhausted**: the last 5xx response is returned as-is; a transport
//!   failure becomes [`TvmError::Network`]

use std::time::Duration;

use reqwest::Client;
use reqwest::header::HeaderMap;

use crate::config::RetryOptions;
use crate::error::{ErrorContext, Result, TvmError};
use crate::utils::log_sanitizer::truncate_for_log;

/// 默认连接超时（秒）
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// 默认请求超时（秒）
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 5xx, the only statuses worth retrying.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Creates an HTTP client with timeout configuration
///
/// A builder failure (TLS backend could not be initialized) is reported as
/// [`TvmError::BadArgument`]: it happens while constructing the client,
/// before any request, and retrying cannot fix it.
pub fn create_http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| TvmError::bad_argument(format!("failed to create HTTP client: {e}")))
}

/// GET requester with bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct BackoffRequester {
    client: Client,
    retry: RetryOptions,
}

impl BackoffRequester {
    pub fn new(retry: RetryOptions) -> Result<Self> {
        Ok(Self::with_client(create_http_client()?, retry))
    }

    /// Reuse an existing `reqwest::Client` (connection pool, proxy settings).
    pub fn with_client(client: Client, retry: RetryOptions) -> Self {
        Self { client, retry }
    }

    pub fn retry_options(&self) -> &RetryOptions {
        &self.retry
    }

    /// Performs a GET and returns the final response, successful or not.
    ///
    /// # Arguments
    /// * `url` - full request URL
    /// * `headers` - request headers (auth, api key)
    /// * `query` - query parameters, may be empty
    /// * `context` - redacted context attached to a [`TvmError::Network`]
    ///
    /// # Returns
    /// * `Ok(RawResponse)` - any HTTP status; 5xx only after retries ran out
    /// * `Err(TvmError::Network)` - transport failure on the last attempt
    pub async fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
        query: &[(&str, String)],
        context: &ErrorContext,
    ) -> Result<RawResponse> {
        let max_retries = self.retry.max_retries;
        let mut retry_count: u32 = 0;

        loop {
            let outcome = self.execute_request(url, headers, query).await;

            let failure = match &outcome {
                Ok(resp) if !resp.is_server_error() => None,
                Ok(resp) => Some(format!("HTTP {}", resp.status)),
                Err(detail) => Some(detail.clone()),
            };
            let Some(failure) = failure else {
                return outcome.map_err(|detail| TvmError::Network {
                    detail,
                    context: context.clone(),
                });
            };

            if retry_count >= max_retries {
                log::debug!("[tvm] Maximum number of retries ({max_retries}) reached for {url}");
                return outcome.map_err(|detail| TvmError::Network {
                    detail,
                    context: context.clone(),
                });
            }

            let delay = backoff_delay(&self.retry, retry_count);
            log::warn!(
                "[tvm] Request failed (attempt {}/{}), retrying in {:.1}s: {}",
                retry_count + 1,
                max_retries + 1,
                delay.as_secs_f32(),
                failure
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
        }
    }

    /// Single attempt. Transport failures come back as `Err(detail)`.
    async fn execute_request(
        &self,
        url: &str,
        headers: &HeaderMap,
        query: &[(&str, String)],
    ) -> std::result::Result<RawResponse, String> {
        log::debug!("[tvm] GET {url}");

        let mut request = self.client.get(url).headers(headers.clone());
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                format!("request timed out: {e}")
            } else {
                format!("request failed: {e}")
            }
        })?;

        let status = response.status().as_u16();
        log::debug!("[tvm] Response Status: {status}");

        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read response body: {e}"))?;

        log::debug!("[tvm] Response Body: {}", truncate_for_log(&body));

        Ok(RawResponse { status, body })
    }
}

/// Calculate exponential backoff delay
///
/// `initial_delay_ms`, 2x, 4x, 8x, ... capped at `max_wait_ms`.
pub fn backoff_delay(retry: &RetryOptions, retry_count: u32) -> Duration {
    let capped = retry_count.min(32); // Prevent 2^n from overflowing
    let delay_ms = retry
        .initial_delay_ms
        .saturating_mul(1_u64 << capped)
        .min(retry.max_wait_ms);
    Duration::from_millis(delay_ms)
}

/// Worst-case total wait before the requester gives up.
pub fn max_total_wait(retry: &RetryOptions) -> Duration {
    (0..retry.max_retries)
        .map(|n| backoff_delay(retry, n))
        .sum()
}
