//! Local sinks: line protocol file and discard

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::app::models::MeasurementRecord;
use crate::app::sink::line_protocol;
use crate::app::sink::RecordSink;
use crate::errors::SinkResult;

/// Appends line protocol to a local file, one record per line
#[derive(Debug, Clone)]
pub struct LineProtocolFileSink {
    path: PathBuf,
}

impl LineProtocolFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSink for LineProtocolFileSink {
    async fn submit(&self, batch: &[MeasurementRecord]) -> SinkResult<usize> {
        let (body, count) = line_protocol::encode_batch(batch);
        if count == 0 {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(body.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        Ok(count)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Counts records and drops them
#[derive(Debug, Default)]
pub struct DiscardSink {
    accepted: AtomicUsize,
}

impl DiscardSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordSink for DiscardSink {
    async fn submit(&self, batch: &[MeasurementRecord]) -> SinkResult<usize> {
        self.accepted.fetch_add(batch.len(), Ordering::Relaxed);
        Ok(batch.len())
    }

    fn name(&self) -> &'static str {
        "discard"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn record(hour: u32) -> MeasurementRecord {
        MeasurementRecord {
            timestamp: Utc.with_ymd_and_hms(2020, 1, 1, hour, 0, 0).unwrap(),
            measurement: "aurn".to_string(),
            tags: BTreeMap::from([("UK-AIR ID".to_string(), "UKA00399".to_string())]),
            fields: BTreeMap::from([("Ozone".to_string(), 1.0)]),
        }
    }

    #[tokio::test]
    async fn test_file_sink_appends_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("records.lp");
        let sink = LineProtocolFileSink::new(&path);

        assert_eq!(sink.submit(&[record(1), record(2)]).await.unwrap(), 2);
        assert_eq!(sink.submit(&[record(3)]).await.unwrap(), 1);

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("aurn,UK-AIR\\ ID=UKA00399 Ozone=1 "));
    }

    #[tokio::test]
    async fn test_file_sink_ignores_empty_batch() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.lp");
        let sink = LineProtocolFileSink::new(&path);

        assert_eq!(sink.submit(&[]).await.unwrap(), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_discard_sink_counts() {
        let sink = DiscardSink::new();
        sink.submit(&[record(1), record(2)]).await.unwrap();
        assert_eq!(sink.accepted(), 2);
    }
}
