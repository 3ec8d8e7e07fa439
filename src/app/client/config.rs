//! HTTP client configuration and building logic
//!
//! This module handles the configuration and construction of HTTP clients
//! used against UK-AIR and the time-series database.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants::{http, limits};
use crate::errors::{ClientError, ClientResult};

/// Configuration for HTTP client behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// TCP keep-alive settings
    pub tcp_keepalive: Option<Duration>,
    /// TCP nodelay (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum number of idle connections per host
    pub pool_max_per_host: usize,
    /// Request timeout
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Retry attempts for 429, 503 and transport failures
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub retry_base_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tcp_keepalive: Some(http::TCP_KEEPALIVE),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries: limits::MAX_RETRIES,
            retry_base_delay: Duration::from_millis(limits::RETRY_BASE_DELAY_MS),
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client with the specified configuration
    pub fn build_http_client(&self) -> ClientResult<Client> {
        let mut client_builder = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(http::USER_AGENT)
            .tcp_nodelay(self.tcp_nodelay)
            .pool_max_idle_per_host(self.pool_max_per_host);

        if let Some(keepalive) = self.tcp_keepalive {
            client_builder = client_builder.tcp_keepalive(keepalive);
        }

        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        client_builder.build().map_err(ClientError::Http)
    }

    /// Backoff delay before retry number `attempt` (1-based)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }

    /// [`retry_delay`](Self::retry_delay) spread by up to 10% either way
    pub fn jittered_retry_delay(&self, attempt: u32) -> Duration {
        let base = self.retry_delay(attempt).as_millis() as u64;
        let jitter_range = base / 10;
        let jitter = if jitter_range > 0 {
            fastrand::u64(0..=jitter_range * 2)
        } else {
            0
        };
        Duration::from_millis((base - jitter_range).saturating_add(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert!(config.tcp_nodelay);
        assert_eq!(config.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.max_retries, limits::MAX_RETRIES);
    }

    #[test]
    fn test_http_client_creation() {
        let config = ClientConfig::default();
        assert!(config.build_http_client().is_ok());
    }

    #[test]
    fn test_http_client_with_custom_config() {
        let config = ClientConfig {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            tcp_keepalive: None,
            ..Default::default()
        };
        assert!(config.build_http_client().is_ok());
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let config = ClientConfig {
            retry_base_delay: Duration::from_millis(1000),
            ..Default::default()
        };

        assert_eq!(config.retry_delay(1).as_millis(), 2000);
        assert_eq!(config.retry_delay(2).as_millis(), 4000);
        assert_eq!(config.retry_delay(3).as_millis(), 8000);
    }

    #[test]
    fn test_jittered_delay_stays_near_backoff() {
        let config = ClientConfig {
            retry_base_delay: Duration::from_millis(1000),
            ..Default::default()
        };

        for _ in 0..50 {
            let delay = config.jittered_retry_delay(1).as_millis();
            assert!((1800..=2200).contains(&delay), "delay {} out of range", delay);
        }

        let zero = ClientConfig {
            retry_base_delay: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(zero.jittered_retry_delay(2), Duration::ZERO);
    }
}
