//! Core HTTP operations with rate limiting and retry logic
//!
//! Every request to UK-AIR passes through a single process-wide rate limiter
//! and retries rate-limit, overload and transport failures with exponential
//! backoff.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::app::client::config::ClientConfig;
use crate::constants::limits;
use crate::errors::{ClientError, ClientResult};

/// HTTP operations handler with resilience patterns
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>,
    config: ClientConfig,
}

impl HttpHandler {
    /// Creates a new HttpHandler from client settings
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the HTTP client cannot be built or the rate
    /// limit is zero
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = config.build_http_client()?;
        let rate_limiter = Self::build_rate_limiter(config.rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
            config: config.clone(),
        })
    }

    /// Builds the rate limiter with the specified rate limit
    fn build_rate_limiter(
        rate_limit_rps: u32,
    ) -> ClientResult<RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>> {
        let quota = Quota::per_second(
            NonZeroU32::new(rate_limit_rps).ok_or(ClientError::InvalidRateLimit)?,
        );
        Ok(RateLimiter::direct(quota))
    }

    /// Fetches the HTTP response with rate limiting and retry logic
    ///
    /// Responses other than 429 and 503 are returned as-is, including error
    /// statuses, so callers decide what a 404 means for them.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request still fails after retries
    pub async fn get_response(&self, url: &Url) -> ClientResult<reqwest::Response> {
        // Apply rate limiting with jitter to avoid thundering herd
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(limits::JITTER_MS)))
            .await;

        let mut retries = 0;
        loop {
            match self.client.get(url.as_str()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE
                    {
                        if retries < self.config.max_retries {
                            retries += 1;
                            let delay = self.config.jittered_retry_delay(retries);
                            tracing::warn!(
                                "Server responded {} for {}. Backing off for {}ms",
                                status.as_u16(),
                                url,
                                delay.as_millis()
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        } else if status == StatusCode::TOO_MANY_REQUESTS {
                            return Err(ClientError::RateLimitExceeded);
                        } else {
                            return Err(ClientError::ServerOverloaded);
                        }
                    }

                    tracing::debug!("Fetched response {} from {}", status.as_u16(), url);
                    return Ok(response);
                }
                Err(e) if retries < self.config.max_retries => {
                    retries += 1;
                    let delay = self.config.jittered_retry_delay(retries);
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {}ms",
                        retries,
                        self.config.max_retries,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        "Request failed after {} retries: {}",
                        self.config.max_retries,
                        e
                    );
                    return Err(ClientError::MaxRetriesExceeded {
                        url: url.to_string(),
                        max_retries: self.config.max_retries,
                    });
                }
            }
        }
    }

    /// Fetches the body of a page as text
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ServerError` for any non-success status
    pub async fn get_page(&self, url: &Url) -> ClientResult<String> {
        let response = self.get_response(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::ServerError {
                status: status.as_u16(),
            });
        }
        let text = response.text().await?;
        tracing::debug!("Fetched page: {} ({} bytes)", url, text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_creation() {
        let rate_limiter = HttpHandler::build_rate_limiter(5).unwrap();
        rate_limiter.until_ready().await;
    }

    #[test]
    fn test_rate_limiter_zero_fails() {
        let result = HttpHandler::build_rate_limiter(0);
        assert!(matches!(result, Err(ClientError::InvalidRateLimit)));
    }

    #[tokio::test]
    async fn test_http_handler_creation() {
        let handler = HttpHandler::new(&ClientConfig::default());
        assert!(handler.is_ok());
    }

    #[tokio::test]
    async fn test_http_handler_rejects_zero_rate() {
        let config = ClientConfig {
            rate_limit_rps: 0,
            ..Default::default()
        };
        assert!(HttpHandler::new(&config).is_err());
    }
}
