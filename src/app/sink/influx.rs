//! InfluxDB 2.x sink over the HTTP write API

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;
use url::Url;

use crate::app::client::ClientConfig;
use crate::app::models::MeasurementRecord;
use crate::app::sink::line_protocol::{self, PRECISION};
use crate::app::sink::RecordSink;
use crate::constants::sink;
use crate::errors::{SinkError, SinkResult};

/// Connection settings for an InfluxDB 2.x bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxSettings {
    pub url: String,
    pub org: String,
    pub bucket: String,
    /// API token; requests are sent unauthenticated when absent
    pub token: Option<String>,
}

/// Writes records as line protocol to `api/v2/write` under the server URL
#[derive(Debug)]
pub struct InfluxSink {
    client: Client,
    write_url: Url,
    token: Option<String>,
}

impl InfluxSink {
    /// Build a sink, validating the settings
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Misconfigured` for a blank org or bucket or an
    /// unparsable URL
    pub fn new(settings: &InfluxSettings, client_config: &ClientConfig) -> SinkResult<Self> {
        let misconfigured = |reason: String| SinkError::Misconfigured { reason };

        if settings.org.trim().is_empty() {
            return Err(misconfigured("InfluxDB org is not set".to_string()));
        }
        if settings.bucket.trim().is_empty() {
            return Err(misconfigured("InfluxDB bucket is not set".to_string()));
        }

        // Keep any path prefix (e.g. behind a reverse proxy) when joining
        let base = if settings.url.ends_with('/') {
            settings.url.clone()
        } else {
            format!("{}/", settings.url)
        };
        let mut write_url = Url::parse(&base)
            .and_then(|base| base.join(sink::INFLUX_WRITE_PATH))
            .map_err(|e| misconfigured(format!("invalid InfluxDB URL {}: {}", settings.url, e)))?;
        write_url
            .query_pairs_mut()
            .append_pair("org", &settings.org)
            .append_pair("bucket", &settings.bucket)
            .append_pair("precision", PRECISION);

        let client = client_config
            .build_http_client()
            .map_err(|e| misconfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            write_url,
            token: settings.token.clone().filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }
}

#[async_trait]
impl RecordSink for InfluxSink {
    async fn submit(&self, batch: &[MeasurementRecord]) -> SinkResult<usize> {
        let (body, count) = line_protocol::encode_batch(batch);
        if count == 0 {
            return Ok(0);
        }

        let mut request = self
            .client
            .post(self.write_url.clone())
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body);
        if let Some(token) = &self.token {
            request = request.header(header::AUTHORIZATION, format!("Token {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("InfluxDB accepted {} records", count);
        Ok(count)
    }

    fn name(&self) -> &'static str {
        "influx"
    }
}
