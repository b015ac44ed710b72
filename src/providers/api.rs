//! Shared request helpers for HTTP providers: pacing, 429 retry, timeouts.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::http::{HttpClient, HttpResponse};
use crate::rate_limit::{backoff_delay, get_delay_from_env, parse_retry_after};

/// Maximum retry attempts on rate limit (429) errors.
pub const MAX_RETRIES: u32 = 5;

/// Base delay for exponential backoff when no Retry-After is sent.
const BACKOFF_BASE_MS: u64 = 1000;

/// Apply a configurable rate-limiting delay before an API request.
pub async fn apply_rate_delay(env_var: &str, default_ms: u64, provider: &str) {
    let delay = get_delay_from_env(env_var, default_ms);
    if delay > Duration::ZERO {
        debug!("{}: waiting {:?} before request", provider, delay);
        tokio::time::sleep(delay).await;
    }
}

/// Build an HTTP client for a provider, mapping failure to `NotAvailable`.
pub fn create_client(provider: &str, timeout: Duration) -> Result<HttpClient, ProviderError> {
    HttpClient::new(provider, timeout).map_err(|e| {
        ProviderError::NotAvailable(format!("Failed to create HTTP client for {}: {}", provider, e))
    })
}

/// Retry an API request on 429 (rate limited) responses with exponential backoff.
///
/// Returns the first non-429 response. If all retries are exhausted,
/// returns `ProviderError::RateLimited`.
pub async fn retry_on_rate_limit<F, Fut>(
    provider: &str,
    make_request: F,
) -> Result<HttpResponse, ProviderError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<HttpResponse, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        let response = make_request().await?;

        if !response.is_rate_limited() {
            return Ok(response);
        }

        let retry_after = response.retry_after();
        let retry_after_secs = retry_after.and_then(|s| s.trim().parse::<u64>().ok());

        if attempt >= MAX_RETRIES {
            return Err(ProviderError::RateLimited {
                provider: provider.to_string(),
                retry_after_secs,
            });
        }

        let wait = parse_retry_after(retry_after)
            .unwrap_or_else(|| backoff_delay(attempt, BACKOFF_BASE_MS));

        warn!(
            "{} rate limited (attempt {}), waiting {:?}",
            provider,
            attempt + 1,
            wait
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

/// Turn a non-success response into `RequestFailed` carrying the body.
pub async fn ensure_success(
    provider: &str,
    response: HttpResponse,
) -> Result<HttpResponse, ProviderError> {
    if response.is_success() {
        return Ok(response);
    }
    let status = response.status;
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::RequestFailed(format!(
        "{} API error ({}): {}",
        provider, status, body
    )))
}

/// Run `future` with a deadline; elapsing is reported as `ProviderError::Timeout`.
pub async fn with_timeout<T, Fut>(
    provider: &str,
    after: Duration,
    future: Fut,
) -> Result<T, ProviderError>
where
    Fut: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            provider: provider.to_string(),
            after,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let ok = with_timeout("fake", Duration::from_secs(5), async { Ok::<_, ProviderError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = with_timeout("fake", Duration::from_secs(5), async {
            Err::<u8, _>(ProviderError::NotAvailable("down".to_string()))
        })
        .await;
        assert!(matches!(err, Err(ProviderError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_with_timeout_elapses() {
        let result = with_timeout("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ProviderError>(())
        })
        .await;
        match result {
            Err(ProviderError::Timeout { provider, after }) => {
                assert_eq!(provider, "slow");
                assert_eq!(after, Duration::from_millis(10));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
