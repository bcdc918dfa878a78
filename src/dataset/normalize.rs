//! Record normalization: converts one source file into groups of uniform
//! JSON records.
//!
//! Each group carries an optional dataset-name suffix. Multi-part sources
//! (spreadsheet sheets, JSON object keys) produce one suffixed group per
//! part; single-dataset sources (JSON top-level arrays, CSV files) produce
//! one anonymous group. Null-like values become JSON null and native
//! date/time cells are rendered as ISO-8601 strings, so every format ends up
//! in the same record model.

use std::fs;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{Map, Value};

use crate::dataset::Record;
use crate::error::AppError;

/// Normalized content of one source file.
#[derive(Debug)]
pub struct NormalizedFile {
    /// (dataset-name suffix, records) per logical unit of the file.
    pub groups: Vec<(Option<String>, Vec<Record>)>,
}

/// Convert a source file into dataset groups based on its extension.
///
/// Fails with `UnsupportedFormat` for unrecognized extensions and with
/// `Parse` for unreadable or malformed content.
pub fn normalize(path: &Path) -> Result<NormalizedFile, AppError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xls" => normalize_spreadsheet(path),
        "json" => normalize_json(path),
        "csv" => normalize_csv(path),
        _ => Err(AppError::UnsupportedFormat { extension }),
    }
}

fn normalize_spreadsheet(path: &Path) -> Result<NormalizedFile, AppError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| AppError::parse(path, e.to_string()))?;

    let mut groups = Vec::new();
    for sheet in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| AppError::parse(path, format!("sheet '{sheet}': {e}")))?;
        groups.push((Some(sheet), sheet_records(&range)));
    }
    Ok(NormalizedFile { groups })
}

/// First non-empty row is the header; every following row becomes a record
/// with fields in column order. Rows shorter than the header pad with null.
fn sheet_records(range: &calamine::Range<Data>) -> Vec<Record> {
    let mut header: Option<(usize, Vec<String>)> = None;
    for (idx, row) in range.rows().enumerate() {
        if row.iter().any(|c| !matches!(c, Data::Empty)) {
            header = Some((idx, row.iter().map(header_cell).collect()));
            break;
        }
    }
    let Some((header_idx, fields)) = header else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for (idx, row) in range.rows().enumerate() {
        if idx <= header_idx {
            continue;
        }
        let mut object = Map::new();
        for (col, field) in fields.iter().enumerate() {
            let cell = row.get(col).unwrap_or(&Data::Empty);
            object.insert(field.clone(), cell_value(cell));
        }
        records.push(Value::Object(object));
    }
    records
}

fn header_cell(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => float_value(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => Value::String(naive.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            None => Value::Null,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        // Error cells (#DIV/0! and friends) carry no usable value.
        Data::Error(_) => Value::Null,
    }
}

/// Spreadsheet engines store integral values as floats; surface them as
/// integers when they round-trip exactly.
fn float_value(f: f64) -> Value {
    if !f.is_finite() {
        return Value::Null;
    }
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        return Value::from(f as i64);
    }
    Value::from(f)
}

fn normalize_json(path: &Path) -> Result<NormalizedFile, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::parse(path, format!("read failed: {e}")))?;
    let value: Value =
        serde_json::from_str(&raw).map_err(|e| AppError::parse(path, e.to_string()))?;

    let groups = match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| {
                let records = match value {
                    Value::Array(items) => items,
                    // Scalar/object values are wrapped for uniformity.
                    other => vec![other],
                };
                (Some(key), records)
            })
            .collect(),
        Value::Array(items) => vec![(None, items)],
        _ => {
            return Err(AppError::parse(
                path,
                "top-level JSON must be an object or an array",
            ))
        }
    };
    Ok(NormalizedFile { groups })
}

fn normalize_csv(path: &Path) -> Result<NormalizedFile, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| AppError::parse(path, e.to_string()))?;

    let fields: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::parse(path, e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| AppError::parse(path, e.to_string()))?;
        let mut object = Map::new();
        for (col, field) in fields.iter().enumerate() {
            object.insert(field.clone(), csv_scalar(row.get(col).unwrap_or("")));
        }
        records.push(Value::Object(object));
    }
    Ok(NormalizedFile {
        groups: vec![(None, records)],
    })
}

/// Per-cell scalar inference for CSV: null-like sentinels, bools, integers,
/// floats, then string fallthrough.
fn csv_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || matches!(trimmed, "null" | "NULL" | "NA" | "N/A" | "n/a" | "NaN" | "nan")
    {
        return Value::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        // Written with a decimal point or exponent, so keep it a float.
        if f.is_finite() {
            return Value::from(f);
        }
        return Value::Null;
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod normalize_tests;
