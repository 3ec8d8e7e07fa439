//! Data models for AURN Fetcher
//!
//! This module defines the core data structures shared by the pipeline:
//! station descriptors produced by the resolver, raw and cleaned tables
//! produced by the fetcher and normalizer, and the measurement records
//! handed to a sink.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::tags;

/// Opaque per-station code used to build yearly download URLs (e.g. `ABD`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DownloadCode(String);

impl DownloadCode {
    /// Create a download code, rejecting blank input
    pub fn new(code: impl AsRef<str>) -> Option<Self> {
        let code = code.as_ref().trim();
        if code.is_empty() {
            None
        } else {
            Some(Self(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the yearly CSV for this code
    pub fn file_name(&self, year: i32) -> String {
        format!("{}_{}.csv", self.0, year)
    }
}

impl fmt::Display for DownloadCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Years during which a station was operational; `None` means open-ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationalWindow {
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
}

impl OperationalWindow {
    pub fn new(first_year: Option<i32>, last_year: Option<i32>) -> Self {
        Self {
            first_year,
            last_year,
        }
    }

    /// Check whether the window overlaps the inclusive range `[start_year, end_year]`
    pub fn intersects(&self, start_year: i32, end_year: i32) -> bool {
        let starts_in_time = self.first_year.map_or(true, |first| first <= end_year);
        let still_open = self.last_year.map_or(true, |last| last >= start_year);
        starts_in_time && still_open
    }
}

impl fmt::Display for OperationalWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.first_year {
            Some(first) => write!(f, "{}", first)?,
            None => write!(f, "?")?,
        }
        match self.last_year {
            Some(last) => write!(f, "-{}", last),
            None => write!(f, "-open"),
        }
    }
}

/// Every operational period listed for one station
///
/// A station that closed and later reopened appears once per period in the
/// listing; its history keeps all of them so gap years are skipped and
/// later periods are still scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationalHistory {
    periods: Vec<OperationalWindow>,
}

impl OperationalHistory {
    pub fn new<I>(periods: I) -> Self
    where
        I: IntoIterator<Item = OperationalWindow>,
    {
        let mut history = Self::default();
        for period in periods {
            history.push(period);
        }
        history
    }

    /// Add a period, ignoring exact repeats
    pub fn push(&mut self, period: OperationalWindow) {
        if !self.periods.contains(&period) {
            self.periods.push(period);
        }
    }

    /// Check whether any period overlaps `[start_year, end_year]`
    pub fn intersects(&self, start_year: i32, end_year: i32) -> bool {
        self.periods
            .iter()
            .any(|period| period.intersects(start_year, end_year))
    }

    pub fn periods(&self) -> &[OperationalWindow] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

impl From<OperationalWindow> for OperationalHistory {
    fn from(period: OperationalWindow) -> Self {
        Self::new([period])
    }
}

impl fmt::Display for OperationalHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, period) in self.periods.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", period)?;
        }
        Ok(())
    }
}

/// A monitoring station active during the requested range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationDescriptor {
    /// UK-AIR ID (e.g. `UKA00399`)
    pub site_id: String,
    /// European site identifier, when published
    pub eu_site_id: Option<String>,
    /// EMEP site identifier, for stations in that programme
    pub emep_site_id: Option<String>,
    pub site_name: String,
    pub network: String,
    pub environment_type: String,
    /// Zone or agglomeration the station reports to
    pub zone: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// British National Grid coordinates in metres
    pub northing: Option<f64>,
    pub easting: Option<f64>,
    /// Altitude in metres
    pub altitude: Option<f64>,
    pub download_code: DownloadCode,
    pub history: OperationalHistory,
}

impl StationDescriptor {
    /// Identity and location tags written to every record of this station
    ///
    /// Blank values are left out so a tag never carries an empty string.
    pub fn tags(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let mut put = |key: &str, value: &str| {
            if !value.is_empty() {
                out.insert(key.to_string(), value.to_string());
            }
        };

        put(tags::SITE_ID, &self.site_id);
        put(tags::SITE_NAME, &self.site_name);
        put(tags::NETWORK, &self.network);
        put(tags::ENVIRONMENT_TYPE, &self.environment_type);
        put(tags::ZONE, &self.zone);
        put(tags::DOWNLOAD_CODE, self.download_code.as_str());
        if let Some(eu) = &self.eu_site_id {
            put(tags::EU_SITE_ID, eu);
        }
        if let Some(emep) = &self.emep_site_id {
            put(tags::EMEP_SITE_ID, emep);
        }
        for (key, value) in [
            (tags::LATITUDE, self.latitude),
            (tags::LONGITUDE, self.longitude),
            (tags::NORTHING, self.northing),
            (tags::EASTING, self.easting),
            (tags::ALTITUDE, self.altitude),
        ] {
            if let Some(v) = value {
                put(key, &v.to_string());
            }
        }

        out
    }
}

/// Collapse inner whitespace and trim, for display-normalized tag values
pub fn display_normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pollutants a network is permitted to retain
///
/// An empty allow-list keeps every pollutant column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowList {
    pollutants: BTreeSet<String>,
}

impl AllowList {
    pub fn new<I, S>(pollutants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            pollutants: pollutants
                .into_iter()
                .map(|p| display_normalize(p.as_ref()))
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// An allow-list that keeps everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn permits(&self, canonical_name: &str) -> bool {
        self.pollutants.is_empty() || self.pollutants.contains(canonical_name)
    }

    pub fn is_empty(&self) -> bool {
        self.pollutants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.pollutants.iter().map(String::as_str)
    }
}

/// A network's identity in the listing and in the time-series database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProfile {
    /// Name matched against the listing's `Networks` column
    pub name: String,
    /// Measurement name written to every record
    pub measurement: String,
    pub allow_list: AllowList,
}

/// Unprocessed tabular content for one (station, year)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// One cleaned row: verbatim time cells plus only the pollutant cells present
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedRow {
    /// Cells of the table's time columns, in column order
    pub time: Vec<String>,
    /// Canonical pollutant name to cell text; blank cells are absent
    pub readings: BTreeMap<String, String>,
}

/// A raw table reduced to allow-listed pollutants with canonical labels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedTable {
    /// Canonical labels of the time columns (`Date`, `time`, `Datetime`)
    pub time_columns: Vec<String>,
    /// Retained pollutant columns, in source order
    pub pollutants: Vec<String>,
    /// Unit per pollutant, taken from its unit companion column
    pub units: BTreeMap<String, String>,
    pub rows: Vec<CleanedRow>,
}

impl CleanedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// All column labels: time columns followed by pollutants
    pub fn columns(&self) -> Vec<String> {
        self.time_columns
            .iter()
            .chain(self.pollutants.iter())
            .cloned()
            .collect()
    }

    /// Re-render as a raw table that normalizes back to `self`
    ///
    /// Each pollutant with a known unit is followed by a `unit` companion
    /// column so units survive the round trip.
    pub fn to_raw(&self) -> RawTable {
        let mut headers = self.time_columns.clone();
        for pollutant in &self.pollutants {
            headers.push(pollutant.clone());
            if self.units.contains_key(pollutant) {
                headers.push("unit".to_string());
            }
        }

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut cells = row.time.clone();
                for pollutant in &self.pollutants {
                    cells.push(row.readings.get(pollutant).cloned().unwrap_or_default());
                    if let Some(unit) = self.units.get(pollutant) {
                        cells.push(unit.clone());
                    }
                }
                cells
            })
            .collect();

        RawTable::new(headers, rows)
    }
}

/// A time-stamped, tagged measurement ready for a time-series database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub timestamp: DateTime<Utc>,
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
}
