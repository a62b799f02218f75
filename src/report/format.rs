//! Number rendering and formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the aggregation/index code stays purely numeric
//! - every row of one output file uses the same separator convention

use crate::aggregate::Aggregation;
use crate::domain::{IndexConfig, NumberFormat, RowValue, UNDEFINED_MARKER};
use crate::index::{BaselineStatus, IndexReport};
use crate::io::ingest::IngestedData;

/// Fractional digits for average price rows.
pub const PRICE_DIGITS: usize = 2;

/// Fractional digits for index rows.
pub const INDEX_DIGITS: usize = 4;

/// Render `value` with exactly `digits` fractional digits.
///
/// Ties round half away from zero on the shortest decimal form of `value`,
/// so `60.125` renders as `60,13` rather than the banker's `60,12`.
pub fn format_number(value: f64, digits: usize, fmt: NumberFormat) -> String {
    let fixed = round_half_away(value.abs(), digits);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + 4);
    // "-0,00" reads as a bug in a spreadsheet.
    let is_zero = fixed.bytes().all(|b| b == b'0' || b == b'.');
    if value.is_sign_negative() && !is_zero {
        out.push('-');
    }

    if fmt.group_thousands {
        out.push_str(&group_digits(int_part, fmt.decimal.group_char()));
    } else {
        out.push_str(int_part);
    }

    if let Some(frac) = frac_part {
        out.push(fmt.decimal.as_char());
        out.push_str(frac);
    }
    out
}

/// Fixed-point rendering of a non-negative `value`, rounded half away from zero.
fn round_half_away(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    // `Display` yields the shortest digits that round-trip, never an exponent.
    let shortest = value.to_string();
    let (int_part, frac_part) = shortest.split_once('.').unwrap_or((shortest.as_str(), ""));

    let mut kept: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().chain(std::iter::repeat(b'0')).take(digits))
        .collect();

    let round_up = frac_part.as_bytes().get(digits).is_some_and(|d| *d >= b'5');
    if round_up {
        let mut carry = true;
        for d in kept.iter_mut().rev() {
            if *d == b'9' {
                *d = b'0';
            } else {
                *d += 1;
                carry = false;
                break;
            }
        }
        if carry {
            kept.insert(0, b'1');
        }
    }

    let int_len = kept.len() - digits;
    let mut out = String::with_capacity(kept.len() + 1);
    out.extend(kept[..int_len].iter().map(|b| char::from(*b)));
    if digits > 0 {
        out.push('.');
        out.extend(kept[int_len..].iter().map(|b| char::from(*b)));
    }
    out
}

/// Render a row value; undefined values render as the marker.
pub fn format_value(value: RowValue, fmt: NumberFormat) -> String {
    match value {
        RowValue::Price(v) => format_number(v, PRICE_DIGITS, fmt),
        RowValue::Index(v) => format_number(v, INDEX_DIGITS, fmt),
        RowValue::Undefined => UNDEFINED_MARKER.to_string(),
    }
}

fn group_digits(digits: &str, sep: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(ch);
    }
    out
}

/// Format the run summary printed after `billy build`.
pub fn format_run_summary(
    ingest: &IngestedData,
    aggregation: &Aggregation,
    report: &IndexReport,
    config: &IndexConfig,
    rows_written: usize,
) -> String {
    let mut out = String::new();

    out.push_str("=== billy - BILLY price index ===\n");
    out.push_str(&format!("Input: {}\n", config.input_path.display()));
    out.push_str(&format!(
        "Rows: read={} used={} skipped={}\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len()
    ));

    let months: Vec<String> = aggregation.months().map(|m| m.to_string()).collect();
    out.push_str(&format!(
        "Months: {} [{}]\n",
        months.len(),
        months.join(", ")
    ));
    out.push_str(&format!(
        "Countries: {} | Products: {} | Weighted products: {}\n",
        aggregation.country_names().len(),
        aggregation.product_names().len(),
        config.weights.iter().filter(|(_, w)| *w > 0.0).count()
    ));

    match report.baseline {
        BaselineStatus::Captured(base) => out.push_str(&format!(
            "Baseline: {} World Weighted Average = {}\n",
            base.month,
            format_number(base.value, PRICE_DIGITS, config.number_format)
        )),
        BaselineStatus::MissingMonth(month) => {
            out.push_str(&format!("Baseline: {month} not in input (index rows skipped)\n"));
        }
        BaselineStatus::Undefined(month) => {
            out.push_str(&format!("Baseline: {month} has zero weight sum (index rows skipped)\n"));
        }
        BaselineStatus::NonPositive(base) => out.push_str(&format!(
            "Baseline: {} is not positive (index rows skipped)\n",
            base.month
        )),
    }

    if report.undefined_rows > 0 {
        out.push_str(&format!(
            "Undefined weighted averages: {} ({:?})\n",
            report.undefined_rows, config.undefined
        ));
    }

    out.push_str(&format!(
        "Output: {} ({} rows, {} index rows)\n",
        config.output_path.display(),
        rows_written,
        report.index_rows
    ));

    if !ingest.row_errors.is_empty() {
        out.push_str("\nSkipped rows:\n");
        for e in ingest.row_errors.iter().take(10) {
            out.push_str(&format!("  line {}: {}\n", e.line, e.message));
        }
        if ingest.row_errors.len() > 10 {
            out.push_str(&format!("  ... and {} more\n", ingest.row_errors.len() - 10));
        }
    }

    out
}

/// Format the list of collected dates for `billy dates`.
pub fn format_collected_dates(dates: &[String], check: Option<(&str, bool)>) -> String {
    let mut out = String::new();
    out.push_str(&format!("Collected dates: {}\n", dates.len()));
    for d in dates {
        out.push_str(&format!("  {d}\n"));
    }
    if let Some((date, present)) = check {
        if present {
            out.push_str(&format!("Data for {date} already exists.\n"));
        } else {
            out.push_str(&format!("No data for {date} yet.\n"));
        }
    }
    out
}
