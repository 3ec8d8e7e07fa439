//! In-memory accumulation of cleaned tables and converted records
//!
//! The coordinator owns one `BatchStore` for the whole run. Entries are
//! keyed by `(year, download code)` and live until explicitly cleared.

use std::collections::BTreeMap;

use crate::app::models::{CleanedTable, DownloadCode, MeasurementRecord};

/// Key of one (station, year) unit
pub type UnitKey = (i32, DownloadCode);

/// Tables and records grouped by year then station
#[derive(Debug, Default)]
pub struct BatchStore {
    tables: BTreeMap<UnitKey, CleanedTable>,
    records: BTreeMap<UnitKey, Vec<MeasurementRecord>>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a cleaned table, replacing any previous table for the unit
    pub fn store_table(&mut self, year: i32, code: &DownloadCode, table: CleanedTable) {
        self.tables.insert((year, code.clone()), table);
    }

    /// Append records for a unit
    pub fn store_records(
        &mut self,
        year: i32,
        code: &DownloadCode,
        records: impl IntoIterator<Item = MeasurementRecord>,
    ) {
        self.records
            .entry((year, code.clone()))
            .or_default()
            .extend(records);
    }

    pub fn table(&self, year: i32, code: &DownloadCode) -> Option<&CleanedTable> {
        self.tables.get(&(year, code.clone()))
    }

    /// Records stored for a unit; empty when none were stored
    pub fn records(&self, year: i32, code: &DownloadCode) -> &[MeasurementRecord] {
        self.records
            .get(&(year, code.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Remove and return the records of a unit
    pub fn take_records(&mut self, year: i32, code: &DownloadCode) -> Vec<MeasurementRecord> {
        self.records
            .remove(&(year, code.clone()))
            .unwrap_or_default()
    }

    /// Drop every stored table
    pub fn clear_tables(&mut self) {
        self.tables.clear();
    }

    /// Drop every stored record
    pub fn clear_records(&mut self) {
        self.records.clear();
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Total records currently held
    pub fn record_count(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn code(value: &str) -> DownloadCode {
        DownloadCode::new(value).unwrap()
    }

    fn record(hour: u32) -> MeasurementRecord {
        MeasurementRecord {
            timestamp: Utc.with_ymd_and_hms(2020, 1, 1, hour, 0, 0).unwrap(),
            measurement: "Automatic Urban Rural Network".to_string(),
            tags: BTreeMap::from([("UK-AIR ID".to_string(), "UKA00399".to_string())]),
            fields: BTreeMap::from([("Ozone".to_string(), 41.2)]),
        }
    }

    #[test]
    fn test_store_and_read_back() {
        let mut store = BatchStore::new();
        let abd = code("ABD");

        store.store_table(2020, &abd, CleanedTable::default());
        store.store_records(2020, &abd, vec![record(1), record(2)]);
        store.store_records(2020, &abd, vec![record(3)]);

        assert!(store.table(2020, &abd).is_some());
        assert!(store.table(2021, &abd).is_none());
        assert_eq!(store.records(2020, &abd).len(), 3);
        assert_eq!(store.record_count(), 3);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_take_records_removes_unit() {
        let mut store = BatchStore::new();
        let abd = code("ABD");
        let my1 = code("MY1");
        store.store_records(2020, &abd, vec![record(1)]);
        store.store_records(2020, &my1, vec![record(2)]);

        assert_eq!(store.take_records(2020, &abd).len(), 1);
        assert!(store.records(2020, &abd).is_empty());
        assert_eq!(store.records(2020, &my1).len(), 1);
        assert!(store.take_records(2020, &abd).is_empty());
    }

    #[test]
    fn test_clears_are_independent_and_idempotent() {
        let mut store = BatchStore::new();
        let abd = code("ABD");
        store.store_table(2019, &abd, CleanedTable::default());
        store.store_records(2019, &abd, vec![record(1)]);

        store.clear_tables();
        assert_eq!(store.table_count(), 0);
        assert_eq!(store.record_count(), 1);

        store.clear_records();
        store.clear_records();
        assert_eq!(store.record_count(), 0);
        assert!(store.is_empty());
    }
}
