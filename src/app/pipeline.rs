//! Shared "index pipeline" logic.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> aggregation -> World rollup -> averages + indices -> CSV export
//!
//! The CLI then only has to deal with presentation.

use tracing::info;

use crate::aggregate::{Aggregation, Aggregator};
use crate::domain::IndexConfig;
use crate::error::AppError;
use crate::index::{IndexReport, build_index};
use crate::io::export::{ExportOptions, write_index_csv};
use crate::io::ingest::{IngestedData, load_observations};

/// All computed outputs of a single `billy build` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub aggregation: Aggregation,
    pub report: IndexReport,
}

/// Load the price CSV and compute every result row.
pub fn run_index(config: &IndexConfig) -> Result<RunOutput, AppError> {
    let ingest = load_observations(&config.input_path, config.delimiter)?;
    Ok(run_index_with_ingest(config, ingest))
}

/// Compute every result row from already ingested observations.
pub fn run_index_with_ingest(config: &IndexConfig, ingest: IngestedData) -> RunOutput {
    let mut aggregator = Aggregator::new(config.weights.clone());
    aggregator.ingest_all(&ingest.observations);
    let aggregation = aggregator.finish();
    info!(
        observations = aggregation.observations,
        months = aggregation.countries.len(),
        "aggregation complete"
    );

    let report = build_index(&aggregation, config.baseline);

    RunOutput {
        ingest,
        aggregation,
        report,
    }
}

/// Write the run's rows to `config.output_path`, returning the rows written.
pub fn export(run: &RunOutput, config: &IndexConfig) -> Result<usize, AppError> {
    write_index_csv(&config.output_path, &run.report.rows, export_options(config))
}

pub fn export_options(config: &IndexConfig) -> ExportOptions {
    ExportOptions {
        delimiter: config.delimiter,
        number_format: config.number_format,
        undefined: config.undefined,
    }
}
