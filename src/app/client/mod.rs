//! HTTP client for the UK-AIR data service
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: Core HTTP operations with rate limiting and retries

use url::Url;

use crate::constants::ukair;
use crate::errors::{ClientError, ClientResult};

pub mod config;
pub mod http;

pub use config::ClientConfig;

use http::HttpHandler;

/// HTTP client for the UK-AIR site
///
/// One instance is shared by the station resolver and every measurement
/// fetch so all requests go through the same rate limiter.
#[derive(Debug)]
pub struct UkAirClient {
    http_handler: HttpHandler,
    base_url: Url,
}

impl UkAirClient {
    /// Creates a client against the public UK-AIR domain
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if HTTP client creation fails
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Self::with_base_url(config, ukair::DOMAIN)
    }

    /// Creates a client against an alternative base URL (mirrors, test stubs)
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the URL does not parse or client creation fails
    pub fn with_base_url(config: ClientConfig, base_url: &str) -> ClientResult<Self> {
        // Join semantics need a trailing slash to keep any base path
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            error: e.to_string(),
        })?;
        let http_handler = HttpHandler::new(&config)?;

        tracing::debug!("Created UK-AIR client for {}", base_url);

        Ok(Self {
            http_handler,
            base_url,
        })
    }

    /// Resolve a path or absolute link against the base URL
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidUrl` if the result is not a valid URL
    pub fn url_for(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl {
                url: path.to_string(),
                error: e.to_string(),
            })
    }

    /// URL of the yearly measurement file for a download code
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidUrl` if the code produces an invalid URL
    pub fn data_file_url(&self, code: &str, year: i32) -> ClientResult<Url> {
        self.url_for(&format!("{}/{}_{}.csv", ukair::DATA_PATH, code, year))
    }

    /// Fetches the HTTP response with rate limiting and retry logic
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails after retries
    pub async fn get_response(&self, url: &Url) -> ClientResult<reqwest::Response> {
        self.http_handler.get_response(url).await
    }

    /// Fetches a page body as text, failing on non-success statuses
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails or the status is not 2xx
    pub async fn get_page(&self, url: &Url) -> ClientResult<String> {
        self.http_handler.get_page(url).await
    }

    /// Get the base URL for the UK-AIR site
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}
