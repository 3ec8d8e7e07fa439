//! Run statistics and final summary
//!
//! Every (station, year) unit ends in exactly one counted outcome, so the
//! summary accounts for all scheduled work.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a single unit ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Records were produced and accepted by the sink
    Submitted,
    /// No file published, or a file without rows
    NoData,
    /// Download or parse failed
    FetchFailed,
    /// The sink rejected the unit's records
    SinkFailed,
}

/// Aggregated run statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Stations returned by the resolver
    pub stations_resolved: usize,
    /// Units scheduled over all years
    pub units_total: usize,
    pub units_submitted: usize,
    pub units_no_data: usize,
    pub units_fetch_failed: usize,
    pub units_sink_failed: usize,
    /// Records produced by the converter
    pub records_converted: usize,
    /// Records accepted by the sink
    pub records_submitted: usize,
    /// Omitted cells plus skipped rows
    pub conversion_warnings: usize,
}

impl RunStats {
    /// Count a finished unit
    pub fn record(&mut self, outcome: UnitOutcome) {
        match outcome {
            UnitOutcome::Submitted => self.units_submitted += 1,
            UnitOutcome::NoData => self.units_no_data += 1,
            UnitOutcome::FetchFailed => self.units_fetch_failed += 1,
            UnitOutcome::SinkFailed => self.units_sink_failed += 1,
        }
    }

    /// Units that reached an outcome
    pub fn units_finished(&self) -> usize {
        self.units_submitted + self.units_no_data + self.units_fetch_failed + self.units_sink_failed
    }

    /// Units that never ran (run interrupted)
    pub fn units_pending(&self) -> usize {
        self.units_total.saturating_sub(self.units_finished())
    }

    pub fn units_failed(&self) -> usize {
        self.units_fetch_failed + self.units_sink_failed
    }
}

/// Final result of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub stats: RunStats,
    /// Whether the run stopped early on a shutdown signal
    pub interrupted: bool,
    pub total_duration: Duration,
}

impl RunSummary {
    pub fn new(stats: RunStats, interrupted: bool, total_duration: Duration) -> Self {
        Self {
            stats,
            interrupted,
            total_duration,
        }
    }

    /// True when every unit finished without a fetch or sink failure
    pub fn is_clean(&self) -> bool {
        !self.interrupted && self.stats.units_failed() == 0
    }

    /// Machine-readable report of the run
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One-line summary of the run
    pub fn summary(&self) -> String {
        let elapsed = format_duration(self.total_duration);
        if self.interrupted {
            format!(
                "Run interrupted after {}: {} records submitted, {} units not processed",
                elapsed,
                self.stats.records_submitted,
                self.stats.units_pending()
            )
        } else if self.is_clean() {
            format!(
                "Run completed successfully: {} records from {} stations in {}",
                self.stats.records_submitted, self.stats.stations_resolved, elapsed
            )
        } else {
            format!(
                "Run completed with failures: {} records submitted, {} units failed in {}",
                self.stats.records_submitted,
                self.stats.units_failed(),
                elapsed
            )
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(f, "{}", self.summary())?;
        writeln!(f, "  Stations processed:   {}", s.stations_resolved)?;
        writeln!(f, "  Units scheduled:      {}", s.units_total)?;
        writeln!(f, "  Units submitted:      {}", s.units_submitted)?;
        writeln!(f, "  Units with no data:   {}", s.units_no_data)?;
        writeln!(f, "  Units failed (fetch): {}", s.units_fetch_failed)?;
        writeln!(f, "  Units failed (sink):  {}", s.units_sink_failed)?;
        writeln!(f, "  Records converted:    {}", s.records_converted)?;
        writeln!(f, "  Records submitted:    {}", s.records_submitted)?;
        write!(f, "  Conversion warnings:  {}", s.conversion_warnings)
    }
}

/// Format a duration as human-readable string
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        format!("{}m{}s", total_secs / 60, total_secs % 60)
    } else {
        format!("{}h{}m", total_secs / 3600, (total_secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that every outcome lands in exactly one counter
    #[test]
    fn test_outcomes_account_for_all_units() {
        let mut stats = RunStats {
            units_total: 5,
            ..Default::default()
        };
        stats.record(UnitOutcome::Submitted);
        stats.record(UnitOutcome::NoData);
        stats.record(UnitOutcome::FetchFailed);
        stats.record(UnitOutcome::SinkFailed);

        assert_eq!(stats.units_finished(), 4);
        assert_eq!(stats.units_pending(), 1);
        assert_eq!(stats.units_failed(), 2);
    }

    /// Test duration formatting
    #[test]
    fn test_duration_formatting() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h1m");
    }

    /// Test run summary wording for each kind of ending
    #[test]
    fn test_summary_variants() {
        let mut stats = RunStats {
            stations_resolved: 2,
            units_total: 2,
            records_submitted: 10,
            ..Default::default()
        };
        stats.record(UnitOutcome::Submitted);
        stats.record(UnitOutcome::NoData);

        let clean = RunSummary::new(stats.clone(), false, Duration::from_secs(5));
        assert!(clean.is_clean());
        assert!(clean.summary().contains("completed successfully"));

        stats.units_no_data -= 1;
        stats.record(UnitOutcome::FetchFailed);
        let failed = RunSummary::new(stats.clone(), false, Duration::from_secs(5));
        assert!(!failed.is_clean());
        assert!(failed.summary().contains("1 units failed"));

        let interrupted = RunSummary::new(stats, true, Duration::from_secs(5));
        assert!(interrupted.summary().contains("interrupted"));
        assert!(interrupted.to_string().contains("Units failed (fetch): 1"));
    }

    #[test]
    fn test_json_report() {
        let stats = RunStats {
            stations_resolved: 3,
            records_submitted: 42,
            ..Default::default()
        };
        let summary = RunSummary::new(stats, false, Duration::from_secs(2));

        let value: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(value["stats"]["records_submitted"], 42);
        assert_eq!(value["interrupted"], false);
    }
}
