//! Application constants for AURN Fetcher
//!
//! Constants are grouped by functional domain. Most of them are defaults
//! that the configuration file can override.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// InfluxDB API token, used when the config file leaves it empty
    pub const INFLUX_TOKEN: &str = "INFLUX_TOKEN";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "AURN-Fetcher/0.1.0 (Air Quality Research Tool)";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// TCP keep-alive interval
    pub const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 8;
}

/// Rate limiting and retry configuration
pub mod limits {
    /// Default rate limit for UK-AIR requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 4;

    /// Maximum retry attempts for transient failures
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;

    /// Upper bound of random jitter added before each request (milliseconds)
    pub const JITTER_MS: u64 = 100;
}

/// UK-AIR service URLs and page structure
pub mod ukair {
    /// UK-AIR base URL
    pub const DOMAIN: &str = "https://uk-air.defra.gov.uk";

    /// Advanced network search returning every AURN site, open or closed
    pub const METADATA_SEARCH: &str = "/networks/find-sites?site_name=&pollutant=9999&group_id=4&closed=true&country_id=9999&region_id=9999&location_type=9999&search=Search+Network&view=advanced&action=results";

    /// Site information page, followed by the UK-AIR ID
    pub const SITE_INFO: &str = "/networks/site-info?uka_id=";

    /// Directory holding per-site yearly CSV files
    pub const DATA_PATH: &str = "data_files/site_data";

    /// Lines preceding the header row in a yearly CSV file
    pub const PREAMBLE_LINES: usize = 4;
}

/// CSS selectors used against UK-AIR HTML pages
pub mod selectors {
    /// Link to the metadata CSV on the search results page
    pub const LISTING_CSV_LINK: &str = "a.bCSV";

    /// Data links on the site information page
    pub const SITE_DATA_LINK: &str = "a.bData";

    /// Query parameter carrying the download code in a data link
    pub const SITE_ID_PARAM: &str = "site_id=";
}

/// Station listing column names
pub mod listing {
    pub const UK_AIR_ID: &str = "UK-AIR ID";
    pub const EU_SITE_ID: &str = "EU Site ID";
    pub const EMEP_SITE_ID: &str = "EMEP Site ID";
    pub const SITE_NAME: &str = "Site Name";
    pub const ENVIRONMENT_TYPE: &str = "Environment Type";
    pub const ZONE: &str = "Zone";
    pub const START_DATE: &str = "Start Date";
    pub const END_DATE: &str = "End Date";
    pub const LATITUDE: &str = "Latitude";
    pub const LONGITUDE: &str = "Longitude";
    pub const NORTHING: &str = "Northing";
    pub const EASTING: &str = "Easting";
    pub const ALTITUDE: &str = "Altitude (m)";
    pub const NETWORKS: &str = "Networks";

    /// Columns that may carry the download code directly
    pub const DOWNLOAD_CODE_COLUMNS: [&str; 2] = ["Site Code", "Download Code"];

    /// Columns without which the listing is rejected
    pub const REQUIRED: [&str; 6] = [
        UK_AIR_ID, SITE_NAME, START_DATE, END_DATE, LATITUDE, LONGITUDE,
    ];

    /// Date format used by the listing
    pub const DATE_FORMAT: &str = "%Y-%m-%d";
}

/// Record tag names written to every measurement
pub mod tags {
    pub const SITE_NAME: &str = "Site Name";
    pub const SITE_ID: &str = "UK-AIR ID";
    pub const EU_SITE_ID: &str = "EU Site ID";
    pub const EMEP_SITE_ID: &str = "EMEP Site ID";
    pub const NETWORK: &str = "Network";
    pub const ENVIRONMENT_TYPE: &str = "Environment Type";
    pub const ZONE: &str = "Zone";
    pub const DOWNLOAD_CODE: &str = "Download Code";
    pub const LATITUDE: &str = "Latitude";
    pub const LONGITUDE: &str = "Longitude";
    pub const NORTHING: &str = "Northing";
    pub const EASTING: &str = "Easting";
    pub const ALTITUDE: &str = "Altitude";
}

/// Default network settings
pub mod network {
    /// Network name as written in the listing's Networks column
    pub const DEFAULT_NAME: &str = "AURN";

    /// Measurement name written to the time-series database
    pub const DEFAULT_MEASUREMENT: &str = "Automatic Urban Rural Network";

    /// Default pollutant allow-list
    pub const DEFAULT_POLLUTANTS: [&str; 6] = [
        "Ozone",
        "Nitric oxide",
        "Nitrogen dioxide",
        "Nitrogen oxides as nitrogen dioxide",
        "PM10 particulate matter",
        "PM2.5 particulate matter",
    ];
}

/// Pipeline and concurrency configuration
pub mod pipeline {
    /// Default number of concurrent (station, year) units
    pub const DEFAULT_WORKER_COUNT: usize = 4;

    /// Maximum recommended concurrent units
    pub const MAX_WORKER_COUNT: usize = 16;
}

/// Sink configuration
pub mod sink {
    /// Default number of records per write request
    pub const DEFAULT_BATCH_SIZE: usize = 5_000;

    /// Default InfluxDB URL
    pub const DEFAULT_INFLUX_URL: &str = "http://localhost:8086";

    /// InfluxDB 2.x write endpoint, relative to the server URL
    pub const INFLUX_WRITE_PATH: &str = "api/v2/write";
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

// Re-export commonly used constants for convenience
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
pub use limits::{DEFAULT_RATE_LIMIT_RPS, MAX_RETRIES, RETRY_BASE_DELAY_MS};
pub use pipeline::DEFAULT_WORKER_COUNT;
