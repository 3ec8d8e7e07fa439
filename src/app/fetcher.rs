//! Download of yearly per-station measurement files
//!
//! Files live at `{domain}/data_files/site_data/{code}_{year}.csv`. A missing
//! file is normal (the station did not measure that year) and is reported as
//! `Ok(None)`; anything else that prevents a clean parse is a `FetchError`.

use std::sync::Arc;

use reqwest::StatusCode;
use tracing::debug;

use crate::app::client::UkAirClient;
use crate::app::models::{DownloadCode, RawTable};
use crate::constants::ukair;
use crate::errors::{FetchError, FetchResult};

/// Fetches raw tables for (station, year) units
#[derive(Debug, Clone)]
pub struct MeasurementFetcher {
    client: Arc<UkAirClient>,
    preamble_lines: usize,
}

impl MeasurementFetcher {
    pub fn new(client: Arc<UkAirClient>) -> Self {
        Self {
            client,
            preamble_lines: ukair::PREAMBLE_LINES,
        }
    }

    /// Override the number of lines skipped before the header row
    pub fn with_preamble_lines(mut self, preamble_lines: usize) -> Self {
        self.preamble_lines = preamble_lines;
        self
    }

    /// Fetch the raw table for one station and year
    ///
    /// # Errors
    ///
    /// Returns `FetchError` on transport failure, a non-success status other
    /// than 404/410, or a body that is not a well-formed CSV file
    pub async fn fetch(&self, code: &DownloadCode, year: i32) -> FetchResult<Option<RawTable>> {
        let transport = |source| FetchError::Transport {
            code: code.to_string(),
            year,
            source,
        };

        let url = self
            .client
            .data_file_url(code.as_str(), year)
            .map_err(transport)?;
        let response = self.client.get_response(&url).await.map_err(transport)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            debug!("No data published for {} in {}", code, year);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                code: code.to_string(),
                year,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport(e.into()))?;

        let malformed = |reason: String| FetchError::Malformed {
            code: code.to_string(),
            year,
            reason,
        };
        let text = std::str::from_utf8(&body)
            .map_err(|e| malformed(format!("body is not valid UTF-8: {}", e)))?;
        let table = parse_measurement_csv(text, self.preamble_lines).map_err(malformed)?;

        debug!(
            "Fetched {} for {}: {} columns, {} rows",
            code,
            year,
            table.headers.len(),
            table.row_count()
        );
        Ok(Some(table))
    }
}

/// Parse a measurement file body after skipping its preamble
///
/// Returns a human-readable reason when the body is not a rectangular CSV
/// table with a header row.
pub fn parse_measurement_csv(text: &str, preamble_lines: usize) -> Result<RawTable, String> {
    if looks_like_html(text) {
        return Err("received an HTML page instead of CSV".to_string());
    }

    let mut offset = 0;
    for _ in 0..preamble_lines {
        match text[offset..].find('\n') {
            Some(position) => offset += position + 1,
            None => return Err(format!("fewer than {} preamble lines", preamble_lines)),
        }
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text[offset..].as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| format!("unreadable header row: {}", e))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err("missing header row".to_string());
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| format!("bad data row: {}", e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable::new(headers, rows))
}

fn looks_like_html(text: &str) -> bool {
    let head = text.trim_start().get(..15).unwrap_or("").to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREAMBLE: &str = "Hourly data from DEFRA Site: Aberdeen\n\
        Site Name: Aberdeen\n\
        All Data GMT hour ending\n\
        \n";

    #[test]
    fn test_parse_skips_preamble() {
        let body = format!(
            "{}Date,time,Ozone,status,unit\n01-01-2020,01:00,41.2,V,ugm-3\n01-01-2020,02:00,,,\n",
            PREAMBLE
        );
        let table = parse_measurement_csv(&body, 4).unwrap();
        assert_eq!(table.headers, vec!["Date", "time", "Ozone", "status", "unit"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0][2], "41.2");
        assert_eq!(table.rows[1][2], "");
    }

    #[test]
    fn test_header_only_body_has_zero_rows() {
        let body = format!("{}Date,time,Ozone,status,unit\n", PREAMBLE);
        let table = parse_measurement_csv(&body, 4).unwrap();
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.headers.len(), 5);
    }

    #[test]
    fn test_ragged_rows_are_malformed() {
        let body = format!("{}Date,time,Ozone\n01-01-2020,01:00\n", PREAMBLE);
        let err = parse_measurement_csv(&body, 4).unwrap_err();
        assert!(err.contains("bad data row"));
    }

    #[test]
    fn test_html_is_malformed() {
        let body = "<!DOCTYPE html><html><body>Not found</body></html>";
        assert!(parse_measurement_csv(body, 4).is_err());
    }

    #[test]
    fn test_truncated_preamble_is_malformed() {
        let err = parse_measurement_csv("only one line\n", 4).unwrap_err();
        assert!(err.contains("preamble"));
    }

    #[test]
    fn test_zero_preamble() {
        let table = parse_measurement_csv("Date,Ozone\n2020-01-01,1\n", 0).unwrap();
        assert_eq!(table.row_count(), 1);
    }
}
