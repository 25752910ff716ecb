use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context};
use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{Map, Number, Value};
use tracing::{debug, info};

use crate::normalize::{excel_serial_to_date, parse_date_text};

pub type Row = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub delimiter: u8,
    /// Trimmed source column name to published key. May be empty.
    pub rename: BTreeMap<String, String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            rename: BTreeMap::new(),
        }
    }
}

pub fn convert_file(input: &Path, output: &Path, options: &ConvertOptions) -> anyhow::Result<usize> {
    let rows = read_rows(input, options)?;
    debug!("Read {} rows from {}", rows.len(), input.display());

    let cleaned: Vec<Row> = rows.into_iter().map(|row| clean_row(row, options)).collect();

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&cleaned)?;
    std::fs::write(output, json)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!("Converted {} records into {}", cleaned.len(), output.display());
    Ok(cleaned.len())
}

pub fn read_rows(input: &Path, options: &ConvertOptions) -> anyhow::Result<Vec<Row>> {
    let extension = input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "csv" | "txt" => read_delimited(input, options.delimiter),
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook(input),
        _ => bail!(
            "unsupported input format for {}: expected .xlsx or .csv",
            input.display()
        ),
    }
}

fn read_delimited(path: &Path, delimiter: u8) -> anyhow::Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, field)| (header.to_string(), Value::String(field.to_string())))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// First sheet only; the first row holds the column names.
fn read_workbook(path: &Path) -> anyhow::Result<Vec<Row>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .with_context(|| format!("{} has no sheets", path.display()))?
        .with_context(|| format!("failed to read first sheet of {}", path.display()))?;

    let mut lines = range.rows();
    let headers: Vec<String> = match lines.next() {
        Some(cells) => cells.iter().map(|cell| cell.to_string()).collect(),
        None => return Ok(Vec::new()),
    };

    let rows = lines
        .map(|cells| {
            headers
                .iter()
                .zip(cells)
                .filter(|(_, cell)| !matches!(cell, Data::Empty))
                .map(|(header, cell)| (header.clone(), cell_value(cell)))
                .collect::<Row>()
        })
        .collect();

    Ok(rows)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(value) => Value::from(*value),
        Data::Float(value) => number_value(*value),
        Data::Bool(flag) => Value::Bool(*flag),
        Data::String(text) => Value::String(text.clone()),
        Data::DateTime(moment) => number_value(moment.as_f64()),
        Data::Empty => Value::Null,
        other => Value::String(other.to_string()),
    }
}

/// Whole floats become integers so identifiers read back as "35733".
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Trim column names, apply the rename table, normalise date columns and
/// trim text values.
pub fn clean_row(row: Row, options: &ConvertOptions) -> Row {
    let mut cleaned = Row::new();

    for (key, value) in row {
        let trimmed = key.trim();
        let name = options
            .rename
            .get(trimmed)
            .cloned()
            .unwrap_or_else(|| trimmed.to_string());

        let value = if trimmed.to_lowercase().contains("date") {
            clean_date(value)
        } else {
            match value {
                Value::String(text) => Value::String(text.trim().to_string()),
                other => other,
            }
        };

        cleaned.insert(name, value);
    }

    cleaned
}

/// `YYYY-MM-DD` when the cell parses as a date, the cell untouched otherwise.
/// Numeric text is read as a spreadsheet serial since CSV loses cell types.
fn clean_date(value: Value) -> Value {
    let parsed = match &value {
        Value::Number(number) => number.as_f64().and_then(excel_serial_to_date),
        Value::String(text) => match text.trim().parse::<f64>() {
            Ok(serial) => excel_serial_to_date(serial),
            Err(_) => parse_date_text(text),
        },
        _ => None,
    };

    match parsed {
        Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
        None => value,
    }
}
