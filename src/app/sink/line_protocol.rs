//! InfluxDB line protocol encoding
//!
//! `measurement,tag=value field=1.5 1577840400` with second precision.
//! Tags and fields are written in key order, which the `BTreeMap`s in
//! [`MeasurementRecord`] already provide.

use crate::app::models::MeasurementRecord;

/// Timestamp precision query value matching [`encode_record`]
pub const PRECISION: &str = "s";

fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\n' | '\r' => escaped.push(' '),
            c if c == '\\' || special.contains(&c) => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}

fn escape_measurement(value: &str) -> String {
    escape(value, &[',', ' '])
}

fn escape_key(value: &str) -> String {
    escape(value, &[',', '=', ' '])
}

/// Encode one record as a line, or `None` when it has no fields
pub fn encode_record(record: &MeasurementRecord) -> Option<String> {
    if record.fields.is_empty() {
        return None;
    }

    let mut line = escape_measurement(&record.measurement);
    for (key, value) in &record.tags {
        if value.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }

    let fields: Vec<String> = record
        .fields
        .iter()
        .map(|(key, value)| format!("{}={}", escape_key(key), value))
        .collect();
    line.push(' ');
    line.push_str(&fields.join(","));
    line.push(' ');
    line.push_str(&record.timestamp.timestamp().to_string());

    Some(line)
}

/// Encode a batch; returns the body and the number of lines in it
pub fn encode_batch(records: &[MeasurementRecord]) -> (String, usize) {
    let lines: Vec<String> = records.iter().filter_map(encode_record).collect();
    let count = lines.len();
    (lines.join("\n"), count)
}
