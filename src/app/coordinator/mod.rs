//! Pipeline orchestration
//!
//! The coordinator drives a run: it resolves the active stations, walks the
//! years in increasing order and, within each year, pushes every
//! (station, year) unit through fetch, normalize and convert on a bounded
//! pool. It is the single consumer of finished units, so it owns the batch
//! store and serializes submissions to the sink without locks.
//!
//! # Architecture
//!
//! - [`config`] - Runtime options and validation
//! - [`stats`] - Per-outcome counters and the final summary
//! - [`progress`] - Progress bar over units
//! - [`signals`] - CTRL-C / SIGTERM handling

pub mod config;
pub mod progress;
pub mod signals;
pub mod stats;

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::app::convert::convert;
use crate::app::debug_output::DebugOutput;
use crate::app::fetcher::MeasurementFetcher;
use crate::app::models::{CleanedTable, MeasurementRecord, NetworkProfile, StationDescriptor};
use crate::app::normalize::normalize;
use crate::app::range::DateRange;
use crate::app::sink::{submit_chunked, RecordSink};
use crate::app::stations::StationResolver;
use crate::app::store::BatchStore;
use crate::errors::{AppError, FetchError, Result};

pub use config::PipelineConfig;
pub use progress::RunProgress;
pub use signals::ShutdownSignal;
pub use stats::{RunStats, RunSummary, UnitOutcome};

/// Result of fetching, normalizing and converting one unit
#[derive(Debug)]
enum UnitResult {
    NoData,
    Failed(FetchError),
    Converted {
        table: CleanedTable,
        records: Vec<MeasurementRecord>,
        warnings: usize,
    },
}

/// Main coordinator for a batch run
pub struct Coordinator {
    config: PipelineConfig,
    network: NetworkProfile,
    resolver: StationResolver,
    fetcher: MeasurementFetcher,
    sink: Arc<dyn RecordSink>,
    shutdown: ShutdownSignal,
}

impl Coordinator {
    pub fn new(
        config: PipelineConfig,
        network: NetworkProfile,
        resolver: StationResolver,
        fetcher: MeasurementFetcher,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            config,
            network,
            resolver,
            fetcher,
            sink,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Use an externally controlled shutdown signal
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Run the pipeline over a date range
    ///
    /// # Errors
    ///
    /// Returns `AppError` for fatal conditions only: invalid configuration or
    /// an unusable station listing. Per-unit failures are counted in the
    /// returned summary.
    pub async fn run(&self, range: &DateRange) -> Result<RunSummary> {
        let run_start = Instant::now();
        self.config
            .validate()
            .map_err(|e| AppError::generic(format!("Invalid pipeline configuration: {}", e)))?;

        let (start_year, end_year) = range.year_bounds();
        info!(
            "Starting {} run for {}-{} with {} workers, sink '{}'",
            self.network.name,
            start_year,
            end_year,
            self.config.worker_count,
            self.sink.name()
        );

        let stations = self.resolver.resolve(start_year, end_year).await?;

        let mut stats = RunStats {
            stations_resolved: stations.len(),
            units_total: range
                .year_span()
                .map(|year| active_in(&stations, year).count())
                .sum(),
            ..Default::default()
        };

        let progress = RunProgress::new(stats.units_total, self.config.enable_progress_bar);
        let debug_output = self.config.debug_output.clone().map(DebugOutput::new);
        let mut store = BatchStore::new();
        let mut interrupted = false;

        'years: for year in range.year_span() {
            if self.shutdown.is_requested() {
                interrupted = true;
                break;
            }
            progress.set_year(year);
            let year_stations: Vec<&StationDescriptor> = active_in(&stations, year).collect();
            info!("Processing {} stations for {}", year_stations.len(), year);

            let mut units = stream::iter(year_stations)
                .map(|station| async move { (station, self.process_unit(station, year).await) })
                .buffer_unordered(self.config.worker_count);

            while let Some((station, result)) = units.next().await {
                let code = &station.download_code;
                let outcome = match result {
                    UnitResult::NoData => UnitOutcome::NoData,
                    UnitResult::Failed(e) => {
                        warn!("{}", e);
                        UnitOutcome::FetchFailed
                    }
                    UnitResult::Converted {
                        table,
                        records,
                        warnings,
                    } => {
                        stats.conversion_warnings += warnings;
                        stats.records_converted += records.len();

                        store.store_table(year, code, table);
                        store.store_records(year, code, records);

                        if let (Some(output), Some(table)) =
                            (&debug_output, store.table(year, code))
                        {
                            if let Err(e) = output.save(code, year, table).await {
                                warn!("Could not write debug table for {} {}: {}", code, year, e);
                            }
                        }
                        // The table is not needed once its records are handed on
                        store.clear_tables();
                        let batch = store.take_records(year, code);

                        match submit_chunked(self.sink.as_ref(), &batch, self.config.batch_size)
                            .await
                        {
                            Ok(accepted) => {
                                stats.records_submitted += accepted;
                                debug!(
                                    "Submitted {} records for {} ({}) in {}",
                                    accepted, station.site_name, code, year
                                );
                                UnitOutcome::Submitted
                            }
                            Err(e) => {
                                error!(
                                    "Sink '{}' failed for {} in {}: {}",
                                    self.sink.name(),
                                    code,
                                    year,
                                    e
                                );
                                UnitOutcome::SinkFailed
                            }
                        }
                    }
                };

                stats.record(outcome);
                progress.unit_done();

                if self.shutdown.is_requested() {
                    interrupted = true;
                    break 'years;
                }
            }

            if !store.is_empty() {
                debug!(
                    "Evicting {} tables and {} records left over from {}",
                    store.table_count(),
                    store.record_count(),
                    year
                );
            }
            store.clear_tables();
            store.clear_records();
        }

        progress.finish();
        let summary = RunSummary::new(stats, interrupted, run_start.elapsed());
        info!("{}", summary.summary());
        Ok(summary)
    }

    /// Fetch, normalize and convert one (station, year) unit
    async fn process_unit(&self, station: &StationDescriptor, year: i32) -> UnitResult {
        let raw = match self.fetcher.fetch(&station.download_code, year).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return UnitResult::NoData,
            Err(e) => return UnitResult::Failed(e),
        };

        let table = normalize(&raw, &self.network.allow_list);
        drop(raw);
        if table.is_empty() {
            debug!("{} {} has a header but no rows", station.download_code, year);
            return UnitResult::NoData;
        }

        let mut converted = convert(station, &table, year, &self.network.measurement);
        let records: Vec<MeasurementRecord> = converted.by_ref().collect();
        let warnings = converted.warnings();

        UnitResult::Converted {
            table,
            records,
            warnings,
        }
    }
}

/// Stations operational during `year`
fn active_in(
    stations: &[StationDescriptor],
    year: i32,
) -> impl Iterator<Item = &StationDescriptor> + '_ {
    stations
        .iter()
        .filter(move |station| station.history.intersects(year, year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{DownloadCode, OperationalHistory, OperationalWindow};

    fn station(code: &str, window: OperationalWindow) -> StationDescriptor {
        StationDescriptor {
            download_code: DownloadCode::new(code).unwrap(),
            history: window.into(),
            ..crate::app::models::tests::test_station()
        }
    }

    /// Test that units are only scheduled for years a station operated
    #[test]
    fn test_active_in_filters_by_year() {
        let stations = vec![
            station("ABD", OperationalWindow::new(Some(1999), None)),
            station("OLD", OperationalWindow::new(Some(1990), Some(2017))),
            station("NEW", OperationalWindow::new(Some(2020), None)),
        ];

        let codes = |year| {
            active_in(&stations, year)
                .map(|s| s.download_code.as_str().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(codes(2016), vec!["ABD", "OLD"]);
        assert_eq!(codes(2018), vec!["ABD"]);
        assert_eq!(codes(2021), vec!["ABD", "NEW"]);
    }

    #[test]
    fn test_active_in_schedules_every_period_of_reopened_station() {
        let reopened = StationDescriptor {
            history: OperationalHistory::new([
                OperationalWindow::new(Some(1999), Some(2005)),
                OperationalWindow::new(Some(2015), None),
            ]),
            ..station("RPN", OperationalWindow::default())
        };
        let stations = vec![reopened];

        let years: Vec<i32> = (2000..=2020)
            .filter(|&year| active_in(&stations, year).count() == 1)
            .collect();
        let expected: Vec<i32> = (2000..=2005).chain(2015..=2020).collect();
        assert_eq!(years, expected);
    }
}
