//! Record sinks
//!
//! The pipeline hands converted records to a [`RecordSink`] and does not
//! know where they go. Implementations:
//! - `influx`: InfluxDB 2.x HTTP write API
//! - `file`: line protocol appended to a local file, and a discarding sink
//! - `line_protocol`: shared line protocol encoding

use async_trait::async_trait;

use crate::app::models::MeasurementRecord;
use crate::errors::SinkResult;

pub mod file;
pub mod influx;
pub mod line_protocol;

pub use file::{DiscardSink, LineProtocolFileSink};
pub use influx::{InfluxSettings, InfluxSink};

/// Destination for measurement records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Submit one batch; returns the number of records accepted
    async fn submit(&self, batch: &[MeasurementRecord]) -> SinkResult<usize>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Submit records in chunks of at most `batch_size`
///
/// Stops at the first failing chunk.
pub async fn submit_chunked(
    sink: &dyn RecordSink,
    records: &[MeasurementRecord],
    batch_size: usize,
) -> SinkResult<usize> {
    let mut accepted = 0;
    for chunk in records.chunks(batch_size.max(1)) {
        accepted += sink.submit(chunk).await?;
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SinkError;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Records the size of every batch it receives
    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<usize>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl RecordSink for RecordingSink {
        async fn submit(&self, batch: &[MeasurementRecord]) -> SinkResult<usize> {
            let mut batches = self.batches.lock().unwrap();
            if Some(batches.len()) == self.fail_on {
                return Err(SinkError::Rejected {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            batches.push(batch.len());
            Ok(batch.len())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn records(count: usize) -> Vec<MeasurementRecord> {
        (0..count)
            .map(|i| MeasurementRecord {
                timestamp: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(i as i64),
                measurement: "aurn".to_string(),
                tags: BTreeMap::from([("UK-AIR ID".to_string(), "UKA1".to_string())]),
                fields: BTreeMap::from([("Ozone".to_string(), i as f64)]),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_submit_chunked_splits_batches() {
        let sink = RecordingSink::default();
        let accepted = submit_chunked(&sink, &records(7), 3).await.unwrap();
        assert_eq!(accepted, 7);
        assert_eq!(*sink.batches.lock().unwrap(), vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_submit_chunked_stops_on_failure() {
        let sink = RecordingSink {
            fail_on: Some(1),
            ..Default::default()
        };
        let result = submit_chunked(&sink, &records(5), 2).await;
        assert!(matches!(result, Err(SinkError::Rejected { status: 500, .. })));
        assert_eq!(*sink.batches.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_zero_batch_size_is_treated_as_one() {
        let sink = RecordingSink::default();
        let accepted = tokio_test::block_on(submit_chunked(&sink, &records(2), 0));
        tokio_test::assert_ok!(accepted);
        assert_eq!(*sink.batches.lock().unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_empty_input_submits_nothing() {
        let sink = RecordingSink::default();
        let accepted = tokio_test::block_on(submit_chunked(&sink, &[], 10));
        assert_eq!(tokio_test::assert_ok!(accepted), 0);
        assert!(sink.batches.lock().unwrap().is_empty());
    }
}
