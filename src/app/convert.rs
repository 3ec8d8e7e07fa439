//! Conversion of cleaned rows into time-series records
//!
//! UK-AIR timestamps use a `Date` column plus an hour-ending `time` column in
//! which `24:00` stands for midnight of the following day. Files are in GMT
//! throughout the year, so every timestamp is taken as UTC.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tracing::debug;

use crate::app::models::{CleanedRow, CleanedTable, MeasurementRecord, StationDescriptor};

/// Date formats seen in measurement files, tried in order
const DATE_FORMATS: [&str; 3] = ["%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y"];

/// Where a table keeps its timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeLayout {
    /// Single combined `Datetime` column
    Combined(usize),
    /// `Date` column plus `time` column
    Split { date: usize, time: usize },
    /// `Date` column only; rows fall on midnight
    DateOnly(usize),
    /// No usable time column
    Missing,
}

impl TimeLayout {
    fn detect(time_columns: &[String]) -> Self {
        let find = |name: &str| {
            time_columns
                .iter()
                .position(|column| column.eq_ignore_ascii_case(name))
        };

        match (find("datetime"), find("date"), find("time")) {
            (Some(index), _, _) => TimeLayout::Combined(index),
            (None, Some(date), Some(time)) => TimeLayout::Split { date, time },
            (None, Some(date), None) => TimeLayout::DateOnly(date),
            _ => TimeLayout::Missing,
        }
    }

    fn timestamp(&self, row: &CleanedRow) -> Option<DateTime<Utc>> {
        let cell = |index: usize| row.time.get(index).map(|c| c.trim());
        match *self {
            TimeLayout::Combined(index) => parse_datetime_cell(cell(index)?),
            TimeLayout::Split { date, time } => {
                combine(parse_date_cell(cell(date)?)?, cell(time)?)
            }
            TimeLayout::DateOnly(index) => combine(parse_date_cell(cell(index)?)?, "00:00"),
            TimeLayout::Missing => None,
        }
    }
}

/// Parse a date cell against the known formats
pub fn parse_date_cell(cell: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(cell.trim(), format).ok())
}

/// Parse `HH:MM` or `HH:MM:SS` into seconds after midnight
///
/// Hours run to 24 inclusive; `24:00` is the end of the day.
pub fn parse_time_cell(cell: &str) -> Option<i64> {
    let parts: Vec<&str> = cell.trim().split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }

    let mut numbers = [0_i64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }

    let [hours, minutes, seconds] = numbers;
    let valid = match hours {
        0..=23 => minutes < 60 && seconds < 60,
        24 => minutes == 0 && seconds == 0,
        _ => false,
    };
    valid.then_some(hours * 3600 + minutes * 60 + seconds)
}

fn combine(date: NaiveDate, time: &str) -> Option<DateTime<Utc>> {
    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    Some(midnight + Duration::seconds(parse_time_cell(time)?))
}

fn parse_datetime_cell(cell: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt.with_timezone(&Utc));
    }
    let (date, time) = cell
        .split_once('T')
        .or_else(|| cell.split_once(' '))
        .unwrap_or((cell, "00:00"));
    combine(parse_date_cell(date)?, time.trim())
}

/// Parse a reading; non-numeric, NaN and infinite values yield `None`
fn parse_reading(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Lazy iterator of records for one cleaned table
///
/// Rows with an unparsable timestamp are skipped; cells that are not
/// numbers are left out of the row's fields. Both count as warnings.
#[derive(Debug)]
pub struct Records<'a> {
    rows: std::slice::Iter<'a, CleanedRow>,
    layout: TimeLayout,
    tags: BTreeMap<String, String>,
    measurement: String,
    year: i32,
    warnings: usize,
}

impl<'a> Records<'a> {
    /// Conversion warnings raised so far
    pub fn warnings(&self) -> usize {
        self.warnings
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = MeasurementRecord;

    fn next(&mut self) -> Option<Self::Item> {
        for row in self.rows.by_ref() {
            let Some(timestamp) = self.layout.timestamp(row) else {
                self.warnings += 1;
                debug!(
                    year = self.year,
                    time = ?row.time,
                    "Skipping row with unparsable timestamp"
                );
                continue;
            };

            let mut fields = BTreeMap::new();
            for (pollutant, text) in &row.readings {
                match parse_reading(text) {
                    Some(value) => {
                        fields.insert(pollutant.clone(), value);
                    }
                    None => {
                        self.warnings += 1;
                        debug!(
                            year = self.year,
                            %timestamp,
                            pollutant = %pollutant,
                            value = %text,
                            "Omitting non-numeric reading"
                        );
                    }
                }
            }

            return Some(MeasurementRecord {
                timestamp,
                measurement: self.measurement.clone(),
                tags: self.tags.clone(),
                fields,
            });
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.rows.size_hint().1)
    }
}

/// Convert a cleaned table into records tagged with the station identity
pub fn convert<'a>(
    station: &StationDescriptor,
    table: &'a CleanedTable,
    year: i32,
    measurement: &str,
) -> Records<'a> {
    Records {
        rows: table.rows.iter(),
        layout: TimeLayout::detect(&table.time_columns),
        tags: station.tags(),
        measurement: measurement.to_string(),
        year,
        warnings: 0,
    }
}
