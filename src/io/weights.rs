//! Read/write product weight tables.
//!
//! A weight file is a JSON object mapping product name to weight:
//!
//! ```json
//! { "BILLY Bookcase white 80x28x202 cm": 0.4 }
//! ```
//!
//! Products missing from the file weigh `0`.

use std::fs::File;
use std::path::Path;

use tracing::{info, warn};

use crate::domain::ProductWeights;
use crate::error::AppError;

/// Read a weight table from a JSON file.
pub fn read_weights_json(path: &Path) -> Result<ProductWeights, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open weights JSON '{}': {e}", path.display())))?;
    let weights: ProductWeights = serde_json::from_reader(file)
        .map_err(|e| AppError::input(format!("Invalid weights JSON '{}': {e}", path.display())))?;
    if weights.iter().all(|(_, w)| w == 0.0) {
        warn!(path = %path.display(), "weight table has no positive weight; every weighted average will be undefined");
    }
    info!(path = %path.display(), products = weights.len(), "loaded product weights");
    Ok(weights)
}

/// Write a weight table as pretty JSON (used by `billy weights --export`).
pub fn write_weights_json(path: &Path, weights: &ProductWeights) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create weights JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, weights)
        .map_err(|e| AppError::input(format!("Failed to write weights JSON: {e}")))?;
    Ok(())
}
