//! Optional CSV dump of cleaned tables for inspection
//!
//! Unit columns are labelled `<pollutant> unit` so each file stands on its
//! own and still normalizes back to the same table.

use std::path::{Path, PathBuf};

use crate::app::models::{CleanedTable, DownloadCode};

/// Writes cleaned tables to `<dir>/<code>_<year>.csv`
#[derive(Debug, Clone)]
pub struct DebugOutput {
    dir: PathBuf,
}

impl DebugOutput {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one table, creating the directory if needed
    pub async fn save(
        &self,
        code: &DownloadCode,
        year: i32,
        table: &CleanedTable,
    ) -> std::io::Result<PathBuf> {
        let bytes = render_csv(table)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(code.file_name(year));
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!("Wrote cleaned table to {}", path.display());
        Ok(path)
    }
}

/// Render a cleaned table as CSV bytes
pub fn render_csv(table: &CleanedTable) -> std::io::Result<Vec<u8>> {
    let mut raw = table.to_raw();
    let mut owner = None;
    for header in raw.headers.iter_mut().skip(table.time_columns.len()) {
        if header == "unit" {
            if let Some(pollutant) = &owner {
                *header = format!("{} unit", pollutant);
            }
        } else {
            owner = Some(header.clone());
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&raw.headers)?;
    for row in &raw.rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}
