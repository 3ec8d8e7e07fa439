//! Date range arithmetic for a batch run
//!
//! A run is bounded by two instants. Only their calendar years drive the
//! fetch loop; the day/week/year counts are reported for the user.

use std::ops::RangeInclusive;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::errors::RangeError;

/// Inclusive range between two UTC instants, with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    /// Create a range, rejecting an end that precedes the start
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, RangeError> {
        if end < start {
            return Err(RangeError::InvalidRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse both bounds with [`parse_date`] and build the range
    pub fn parse(start: &str, end: &str) -> Result<Self, RangeError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whole days between the bounds
    pub fn days(&self) -> u64 {
        (self.end - self.start).num_days().max(0) as u64
    }

    /// Whole weeks between the bounds
    pub fn weeks(&self) -> u64 {
        self.days() / 7
    }

    /// Whole calendar years between the bounds
    ///
    /// A year is counted once the end reaches the start's anniversary, so
    /// 2019-06-01 to 2020-05-31 is zero years and to 2020-06-01 is one.
    pub fn years(&self) -> u64 {
        let mut years = self.end.year() - self.start.year();
        let start_key = (
            self.start.month(),
            self.start.day(),
            self.start.num_seconds_from_midnight(),
        );
        let end_key = (
            self.end.month(),
            self.end.day(),
            self.end.num_seconds_from_midnight(),
        );
        if end_key < start_key {
            years -= 1;
        }
        years.max(0) as u64
    }

    /// Inclusive calendar years touched by the range
    pub fn year_span(&self) -> RangeInclusive<i32> {
        self.start.year()..=self.end.year()
    }

    /// First and last calendar year
    pub fn year_bounds(&self) -> (i32, i32) {
        (self.start.year(), self.end.year())
    }
}

/// Parse a user supplied date into a UTC instant
///
/// Accepted forms: `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS`,
/// `YYYY-MM-DD HH:MM:SS` and RFC 3339. Partial dates resolve to the first
/// instant they denote.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>, RangeError> {
    let trimmed = input.trim();
    let unparsable = || RangeError::UnparsableDate {
        input: input.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    let date = if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        date
    } else if trimmed.len() == 7 {
        NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d")
            .map_err(|_| unparsable())?
    } else if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        let year = trimmed.parse::<i32>().map_err(|_| unparsable())?;
        NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(unparsable)?
    } else {
        return Err(unparsable());
    };

    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(unparsable)?;
    Ok(Utc.from_utc_datetime(&midnight))
}
