//! Shared HTTP request handling for hosted providers.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ProviderError;

/// Per-request timeout for hosted providers.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Longest error body kept in a [`ProviderError`].
const MAX_ERROR_BODY: usize = 500;

pub fn build_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Send a JSON request and decode the JSON response, classifying failures.
pub async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(classify_transport)?;
    let status = response.status();

    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("malformed response body: {}", e)));
    }

    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    debug!("Provider returned HTTP {}: {}", status, body);
    Err(classify_status(status, truncate(&body), retry_after))
}

/// Map a non-success status to a provider error.
pub fn classify_status(
    status: StatusCode,
    body: String,
    retry_after: Option<Duration>,
) -> ProviderError {
    let code = status.as_u16();
    match code {
        429 => ProviderError::RateLimited { retry_after },
        401 | 403 => ProviderError::Unauthorized { status: code },
        408 | 500..=599 => ProviderError::ServerError { status: code, body },
        _ => ProviderError::InvalidRequest { status: code, body },
    }
}

fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(REQUEST_TIMEOUT_SECS)
    } else {
        ProviderError::Transport(err.to_string())
    }
}

/// Read a `Retry-After` header given in whole seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

/// Join `path` onto a base URL without doubling slashes.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Reject completions that carry no text.
pub fn non_empty(text: String) -> Result<String, ProviderError> {
    if text.trim().is_empty() {
        Err(ProviderError::InvalidResponse("empty completion".to_string()))
    } else {
        Ok(text)
    }
}
