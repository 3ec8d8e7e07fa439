//! Column filtering and label canonicalisation for yearly measurement tables
//!
//! UK-AIR files label pollutant columns inconsistently between stations and
//! years: some embed HTML subscripts (`PM<sub>10</sub>`), some carry
//! instrument or unit qualifiers in brackets (`(FIDAS)`, `(ug/m3)`). Each
//! pollutant column is usually followed by `status` and `unit` companion
//! columns. Normalization reduces every label to its base name, keeps only
//! allow-listed pollutants and folds unit companions into the table's unit
//! map. Everything here is pure and works without network access.

use std::collections::BTreeSet;

use crate::app::models::{display_normalize, AllowList, CleanedRow, CleanedTable, RawTable};

/// Bracket pairs whose contents are stripped from labels
const BRACKET_PAIRS: [(char, char); 4] = [('(', ')'), ('[', ']'), ('{', '}'), ('<', '>')];

/// Role of a column, decided from its canonical label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// `Date`, `time` or `Datetime`
    Time,
    /// Verification status companion of the preceding pollutant
    Status,
    /// Unit companion of the preceding pollutant
    Unit,
    /// Anything else
    Pollutant,
}

/// Remove bracketed text from a label
///
/// Scanning is not nested: an opening bracket switches copying off until its
/// matching closer is seen.
pub fn remove_brackets(label: &str) -> String {
    let mut clean = String::with_capacity(label.len());
    let mut closer: Option<char> = None;

    for ch in label.chars() {
        if let Some(&(_, close)) = BRACKET_PAIRS.iter().find(|(open, _)| *open == ch) {
            closer = Some(close);
            continue;
        }
        match closer {
            Some(close) if ch == close => closer = None,
            Some(_) => {}
            None => clean.push(ch),
        }
    }

    clean
}

/// Canonical form of a column label
pub fn canonical_label(label: &str) -> String {
    display_normalize(&remove_brackets(label))
}

/// Classify a canonical label
pub fn column_role(canonical: &str) -> ColumnRole {
    let lower = canonical.to_ascii_lowercase();
    match lower.as_str() {
        "date" | "time" | "datetime" => ColumnRole::Time,
        "status" => ColumnRole::Status,
        "unit" | "units" => ColumnRole::Unit,
        _ if lower.ends_with(" status") => ColumnRole::Status,
        _ if lower.ends_with(" unit") => ColumnRole::Unit,
        _ => ColumnRole::Pollutant,
    }
}

/// Decide whether a column survives normalization as a pollutant
///
/// Returns the canonical pollutant name when the label denotes a pollutant
/// permitted by the allow-list.
pub fn retained_column(label: &str, allow_list: &AllowList) -> Option<String> {
    let canonical = canonical_label(label);
    if canonical.is_empty() || column_role(&canonical) != ColumnRole::Pollutant {
        return None;
    }
    allow_list.permits(&canonical).then_some(canonical)
}

/// Column indices selected from a raw header row
#[derive(Debug, Default)]
struct ColumnPlan {
    time: Vec<(usize, String)>,
    pollutants: Vec<(usize, String)>,
    /// Unit column index and the pollutant it describes
    units: Vec<(usize, String)>,
}

impl ColumnPlan {
    fn from_headers(headers: &[String], allow_list: &AllowList) -> Self {
        let mut plan = Self::default();
        let mut seen = BTreeSet::new();
        // Most recent pollutant column, `None` when it was dropped
        let mut owner: Option<String> = None;

        for (index, label) in headers.iter().enumerate() {
            let canonical = canonical_label(label);
            match column_role(&canonical) {
                ColumnRole::Time => {
                    if seen.insert(canonical.clone()) {
                        plan.time.push((index, canonical));
                    }
                    owner = None;
                }
                ColumnRole::Status => {}
                ColumnRole::Unit => {
                    if let Some(pollutant) = &owner {
                        plan.units.push((index, pollutant.clone()));
                    }
                }
                ColumnRole::Pollutant => {
                    owner = match retained_column(label, allow_list) {
                        Some(name) if seen.insert(name.clone()) => {
                            plan.pollutants.push((index, name.clone()));
                            Some(name)
                        }
                        _ => None,
                    };
                }
            }
        }

        plan
    }
}

/// Normalize one raw table against a network's allow-list
///
/// Unknown columns are dropped silently; row order and time cells are kept
/// verbatim. Blank pollutant cells are not stored.
pub fn normalize(raw: &RawTable, allow_list: &AllowList) -> CleanedTable {
    let plan = ColumnPlan::from_headers(&raw.headers, allow_list);

    let mut table = CleanedTable {
        time_columns: plan.time.iter().map(|(_, name)| name.clone()).collect(),
        pollutants: plan.pollutants.iter().map(|(_, name)| name.clone()).collect(),
        ..Default::default()
    };

    for cells in &raw.rows {
        let cell = |index: usize| cells.get(index).map(String::as_str).unwrap_or("");

        let time = plan
            .time
            .iter()
            .map(|(index, _)| cell(*index).to_string())
            .collect();

        let readings = plan
            .pollutants
            .iter()
            .filter_map(|(index, name)| {
                let value = cell(*index).trim();
                (!value.is_empty()).then(|| (name.clone(), value.to_string()))
            })
            .collect();

        for (index, pollutant) in &plan.units {
            let unit = cell(*index).trim();
            if !unit.is_empty() && !table.units.contains_key(pollutant) {
                table.units.insert(pollutant.clone(), unit.to_string());
            }
        }

        table.rows.push(CleanedRow { time, readings });
    }

    table
}
