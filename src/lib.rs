//! AURN Fetcher Library
//!
//! Fetches air-quality measurements for the UK Automatic Urban and Rural
//! Network from UK-AIR, cleans the yearly station files and submits them as
//! time-series records. Downloads are concurrent and rate limited; every
//! (station, year) unit ends in a counted outcome.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
