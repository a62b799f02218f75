//! Export index rows to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets: one header line
//! and one line per row. Fields containing the delimiter are quoted.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::domain::{NumberFormat, OUTPUT_HEADERS, ResultRow, UndefinedPolicy};
use crate::error::AppError;
use crate::report::format_value;

/// How rows are rendered into delimited text.
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub delimiter: u8,
    pub number_format: NumberFormat,
    pub undefined: UndefinedPolicy,
}

/// Rows that survive the undefined-value policy.
pub fn rows_to_write<'a>(rows: &'a [ResultRow], policy: UndefinedPolicy) -> impl Iterator<Item = &'a ResultRow> {
    rows.iter()
        .filter(move |r| policy == UndefinedPolicy::Mark || !r.value.is_undefined())
}

/// Write the index CSV to `path`, returning the number of data rows written.
///
/// Nothing is created when there is nothing to write.
pub fn write_index_csv(path: &Path, rows: &[ResultRow], options: ExportOptions) -> Result<usize, AppError> {
    if rows_to_write(rows, options.undefined).next().is_none() {
        return Err(AppError::no_data(
            "No data to write. Please check the input file and processing logic.",
        ));
    }

    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create index CSV '{}': {e}", path.display())))?;
    let written = write_rows(file, rows, options)?;
    info!(path = %path.display(), rows = written, "index CSV written");
    Ok(written)
}

/// Write header + rows to any writer.
pub fn write_rows<W: Write>(sink: W, rows: &[ResultRow], options: ExportOptions) -> Result<usize, AppError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(sink);

    writer
        .write_record(OUTPUT_HEADERS)
        .map_err(|e| AppError::input(format!("Failed to write index CSV header: {e}")))?;

    let mut written = 0usize;
    for r in rows_to_write(rows, options.undefined) {
        let month = r.month.to_string();
        let value = format_value(r.value, options.number_format);
        writer
            .write_record([month.as_str(), r.scope.name(), r.label.name(), value.as_str()])
            .map_err(|e| AppError::input(format!("Failed to write index CSV row: {e}")))?;
        written += 1;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush index CSV: {e}")))?;
    Ok(written)
}
