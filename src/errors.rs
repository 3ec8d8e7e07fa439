//! Error types for AURN Fetcher
//!
//! Errors are split by pipeline stage. Fatal conditions (`ResolveError`,
//! `RangeError`, `ConfigError`) abort a run before anything is submitted,
//! while per-unit conditions (`FetchError`, `SinkError`) are reported and
//! counted without stopping sibling units.

use std::path::PathBuf;

use thiserror::Error;

/// HTTP client construction and transport errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Rate limit exceeded after retries
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimitExceeded,

    /// Server overloaded after retries
    #[error("Server overloaded. Server responded with HTTP 503")]
    ServerOverloaded,

    /// Maximum retries exceeded
    #[error("Maximum retry attempts ({max_retries}) exceeded for {url}")]
    MaxRetriesExceeded { url: String, max_retries: u32 },

    /// Invalid URL provided or constructed
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Rate limit configuration is unusable
    #[error("Rate limit must be non-zero")]
    InvalidRateLimit,
}

/// Station directory errors. Both variants are fatal for a run.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The station listing could not be retrieved
    #[error("Station listing unavailable at {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },

    /// The listing does not match the expected schema
    #[error("Malformed station listing: {reason}")]
    MalformedListing { reason: String },
}

/// Per-unit measurement download errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure after the HTTP layer's retries
    #[error("Failed to fetch {code} for {year}: {source}")]
    Transport {
        code: String,
        year: i32,
        #[source]
        source: ClientError,
    },

    /// Non-2xx response other than "not found"
    #[error("Server returned HTTP {status} for {code} in {year}")]
    Status { code: String, year: i32, status: u16 },

    /// Body was received but is not a usable CSV file
    #[error("Malformed measurement file for {code} in {year}: {reason}")]
    Malformed {
        code: String,
        year: i32,
        reason: String,
    },
}

impl FetchError {
    /// Download code of the unit that failed
    pub fn code(&self) -> &str {
        match self {
            FetchError::Transport { code, .. }
            | FetchError::Status { code, .. }
            | FetchError::Malformed { code, .. } => code,
        }
    }
}

/// Errors raised by a record sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// HTTP transport to the database failed
    #[error("Sink HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Database rejected the write
    #[error("Sink rejected batch: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Local file sink failed
    #[error("Sink I/O error")]
    Io(#[from] std::io::Error),

    /// Sink is not usable with the given settings
    #[error("Sink misconfigured: {reason}")]
    Misconfigured { reason: String },
}

/// Date range errors
#[derive(Error, Debug, PartialEq)]
pub enum RangeError {
    /// End precedes start
    #[error("Invalid range: end {end} precedes start {start}")]
    InvalidRange { start: String, end: String },

    /// A date string did not match any accepted format
    #[error("Unrecognised date '{input}'. Expected YYYY, YYYY-MM, YYYY-MM-DD or RFC 3339")]
    UnparsableDate { input: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format in {path}")]
    InvalidFormat {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration could not be read or written
    #[error("Configuration I/O error for {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Requested network has no allow-list entry
    #[error("Unknown network '{name}'. Configured networks: {known:?}")]
    UnknownNetwork { name: String, known: Vec<String> },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP client error
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Station directory error
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Measurement download error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Record sink error
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Date range error
    #[error(transparent)]
    Range(#[from] RangeError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Client(ClientError::Http(_))
            | AppError::Client(ClientError::RateLimitExceeded)
            | AppError::Client(ClientError::ServerOverloaded)
            | AppError::Fetch(FetchError::Transport { .. })
            | AppError::Sink(SinkError::Http(_)) => true,

            AppError::Resolve(_)
            | AppError::Range(_)
            | AppError::Config(_)
            | AppError::Fetch(FetchError::Malformed { .. }) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Client(_) => "http",
            AppError::Resolve(_) => "stations",
            AppError::Fetch(_) => "fetch",
            AppError::Sink(_) => "sink",
            AppError::Range(_) => "range",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// HTTP client result type alias
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Station directory result type alias
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Measurement download result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Sink result type alias
pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
