//! CSV ingest and normalization.
//!
//! This module turns the scraper's price file into clean [`Observation`]s.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (rows keep file order)
//! - **Separation of concerns**: no aggregation logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use indexmap::IndexSet;
use tracing::{debug, info, warn};

use crate::domain::{Month, Observation};
use crate::error::AppError;

const COL_DATE: &str = "date";
const COL_COUNTRY: &str = "country name";
const COL_PRODUCT: &str = "product";
const COL_PRICE_EUR: &str = "price in eur";

const REQUIRED_COLUMNS: [&str; 4] = [COL_DATE, COL_COUNTRY, COL_PRODUCT, COL_PRICE_EUR];

/// Format used by the collector for the `Date` column.
pub const COLLECTION_DATE_FORMAT: &str = "%d/%m/%y";

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: observations in file order + row accounting.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub observations: Vec<Observation>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load the price CSV at `path`.
pub fn load_observations(path: &Path, delimiter: u8) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open price CSV '{}': {e}", path.display())))?;
    info!(path = %path.display(), "reading price observations");
    read_observations(file, delimiter)
}

/// Parse price observations from any reader.
pub fn read_observations<R: Read>(source: R, delimiter: u8) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    ensure_required_columns_exist(&header_map)?;

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header, and lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(line, "skipped row: CSV parse error: {e}");
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map) {
            Ok(obs) => {
                debug!(
                    line,
                    month = %obs.month,
                    country = %obs.country,
                    product = %obs.product,
                    price = obs.price_eur,
                    "processing row"
                );
                observations.push(obs);
            }
            Err(message) => {
                warn!(line, "skipped row: {message}");
                row_errors.push(RowError { line, message });
            }
        }
    }

    let rows_used = observations.len();
    if rows_used == 0 {
        return Err(AppError::no_data(
            "No data to write: the price file has no valid rows. Please check the input file.",
        ));
    }

    info!(rows_read, rows_used, skipped = row_errors.len(), "ingest complete");

    Ok(IngestedData {
        observations,
        row_errors,
        rows_read,
        rows_used,
    })
}

/// Distinct collection dates (`dd/mm/yy`) found in the first column of the price file.
///
/// Lines whose first field is not a date (the header, blank lines) are ignored.
/// A price file that does not exist yet means nothing has been collected.
pub fn read_collected_dates(path: &Path, delimiter: u8) -> Result<Vec<String>, AppError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "price CSV not found; no dates collected yet");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(AppError::input(format!(
                "Failed to open price CSV '{}': {e}",
                path.display()
            )));
        }
    };
    collected_dates_from(file, delimiter)
}

pub fn collected_dates_from<R: Read>(source: R, delimiter: u8) -> Result<Vec<String>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut dates = IndexSet::new();
    for result in reader.records() {
        let record = result.map_err(|e| AppError::input(format!("Failed to read price CSV: {e}")))?;
        let Some(first) = record.get(0) else { continue };
        if let Ok(date) = parse_collection_date(first) {
            dates.insert(date.format(COLLECTION_DATE_FORMAT).to_string());
        }
    }
    Ok(dates.into_iter().collect())
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_lowercase()
}

fn ensure_required_columns_exist(header_map: &HashMap<String, usize>) -> Result<(), AppError> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !header_map.contains_key(*c))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(AppError::input(format!(
        "Missing required column(s): {}. Expected `Date`, `Country Name`, `Product`, `Price in EUR`.",
        missing.iter().map(|c| format!("`{c}`")).collect::<Vec<_>>().join(", ")
    )))
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<Observation, String> {
    let raw_date = get_required(record, header_map, COL_DATE)?;
    let date = parse_collection_date(raw_date)?;
    let country = get_required(record, header_map, COL_COUNTRY)?.to_string();
    let product = get_required(record, header_map, COL_PRODUCT)?.to_string();
    let price_eur = parse_price(get_required(record, header_map, COL_PRICE_EUR)?)?;

    Ok(Observation {
        month: Month::from_date(date),
        country,
        product,
        price_eur,
    })
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

/// Parse a collection date: `dd/mm/yy` (years are 20yy), also `dd/mm/yyyy`
/// and `-` as separator.
pub fn parse_collection_date(s: &str) -> Result<NaiveDate, String> {
    let invalid = || format!("Invalid date '{s}'. Expected dd/mm/yy.");
    let s = s.trim();
    let sep = if s.contains('/') { '/' } else { '-' };
    let parts: Vec<&str> = s.split(sep).map(str::trim).collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(invalid());
    };

    let day = day.parse::<u32>().map_err(|_| invalid())?;
    let month = month.parse::<u32>().map_err(|_| invalid())?;
    let year = match year.len() {
        2 => 2000 + year.parse::<i32>().map_err(|_| invalid())?,
        4 => year.parse::<i32>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Parse a EUR price written with a comma or a dot as decimal separator.
///
/// When a comma is present, dots are treated as thousands separators
/// (`1.234,56`). A dot after the last comma (`1,234.56`) is rejected.
pub fn parse_price(s: &str) -> Result<f64, String> {
    let s = s.trim();
    if let (Some(comma), Some(dot)) = (s.rfind(','), s.rfind('.')) {
        if dot > comma {
            return Err(format!("Invalid price '{s}' (ambiguous separators)."));
        }
    }
    let normalized = if s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else {
        s.to_string()
    };
    let v = normalized
        .parse::<f64>()
        .map_err(|_| format!("Invalid price '{s}'."))?;
    if !v.is_finite() || v < 0.0 {
        return Err(format!("Invalid price '{s}' (must be finite and >= 0)."));
    }
    Ok(v)
}
