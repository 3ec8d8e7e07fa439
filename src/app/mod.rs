//! Core application logic for AURN Fetcher
//!
//! The pipeline runs in stages, each in its own module:
//!
//! - [`stations`] resolves the stations active in a year range
//! - [`fetcher`] downloads one station's yearly CSV
//! - [`normalize`] cleans headers and applies the pollutant allow-list
//! - [`convert`] turns cleaned rows into measurement records
//! - [`sink`] submits records to their destination
//!
//! [`coordinator`] drives the stages over a [`range::DateRange`], keeping
//! per-unit state in a [`store::BatchStore`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use aurn_fetcher::app::{
//!     ClientConfig, Coordinator, DateRange, DiscardSink, MeasurementFetcher, PipelineConfig,
//!     StationResolver, UkAirClient,
//! };
//! use aurn_fetcher::config::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let client = Arc::new(UkAirClient::new(ClientConfig::default())?);
//! let coordinator = Coordinator::new(
//!     PipelineConfig::default(),
//!     config.network("AURN")?,
//!     StationResolver::new(Arc::clone(&client), "AURN"),
//!     MeasurementFetcher::new(client),
//!     Arc::new(DiscardSink::new()),
//! );
//!
//! let summary = coordinator.run(&DateRange::parse("2020", "2020")?).await?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod convert;
pub mod coordinator;
pub mod debug_output;
pub mod fetcher;
pub mod models;
pub mod normalize;
pub mod range;
pub mod sink;
pub mod stations;
pub mod store;

// Re-export main public API
pub use client::{ClientConfig, UkAirClient};
pub use convert::{convert, Records};
pub use coordinator::{Coordinator, PipelineConfig, RunStats, RunSummary, ShutdownSignal};
pub use debug_output::DebugOutput;
pub use fetcher::MeasurementFetcher;
pub use models::{
    AllowList, CleanedRow, CleanedTable, DownloadCode, MeasurementRecord, NetworkProfile,
    OperationalHistory, OperationalWindow, RawTable, StationDescriptor,
};
pub use normalize::{normalize, retained_column};
pub use range::DateRange;
pub use sink::{DiscardSink, InfluxSink, LineProtocolFileSink, RecordSink};
pub use stations::StationResolver;
pub use store::BatchStore;
