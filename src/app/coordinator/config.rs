//! Configuration structures for the pipeline coordinator
//!
//! This module defines the runtime options for a batch run: unit
//! concurrency, sink batching, progress display and debug output.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{pipeline, sink};

/// Configuration for the pipeline coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of (station, year) units processed concurrently
    pub worker_count: usize,
    /// Maximum records per sink submission
    pub batch_size: usize,
    /// Enable real-time progress bar display
    pub enable_progress_bar: bool,
    /// Directory receiving cleaned tables as CSV, if any
    pub debug_output: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: pipeline::DEFAULT_WORKER_COUNT,
            batch_size: sink::DEFAULT_BATCH_SIZE,
            enable_progress_bar: true,
            debug_output: None,
        }
    }
}

impl PipelineConfig {
    /// Set the number of concurrent units
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the sink batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable the progress bar
    pub fn with_progress_bar(mut self, enabled: bool) -> Self {
        self.enable_progress_bar = enabled;
        self
    }

    /// Write cleaned tables to a directory
    pub fn with_debug_output(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_output = dir;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("Worker count cannot be zero".to_string());
        }

        if self.worker_count > pipeline::MAX_WORKER_COUNT {
            return Err(format!(
                "Worker count cannot exceed {}",
                pipeline::MAX_WORKER_COUNT
            ));
        }

        if self.batch_size == 0 {
            return Err("Batch size cannot be zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that default configuration is valid
    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker_count, pipeline::DEFAULT_WORKER_COUNT);
        assert!(config.enable_progress_bar);
        assert!(config.debug_output.is_none());
    }

    /// Test configuration builder methods
    #[test]
    fn test_config_builder_methods() {
        let config = PipelineConfig::default()
            .with_worker_count(1)
            .with_batch_size(100)
            .with_progress_bar(false)
            .with_debug_output(Some(PathBuf::from("debug")));

        assert_eq!(config.worker_count, 1);
        assert_eq!(config.batch_size, 100);
        assert!(!config.enable_progress_bar);
        assert_eq!(config.debug_output, Some(PathBuf::from("debug")));
        assert!(config.validate().is_ok());
    }

    /// Test configuration validation
    ///
    /// Ensures that zero or excessive values are rejected.
    #[test]
    fn test_config_validation() {
        let config = PipelineConfig::default().with_worker_count(0);
        assert!(config.validate().is_err());

        let config = PipelineConfig::default().with_worker_count(pipeline::MAX_WORKER_COUNT + 1);
        assert!(config.validate().is_err());

        let config = PipelineConfig::default().with_batch_size(0);
        assert!(config.validate().is_err());
    }
}
