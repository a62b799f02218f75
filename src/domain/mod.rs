//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input records (`Observation`, `Month`) and the product weight table
//! - output rows (`ResultRow`, `Scope`, `RowLabel`, `RowValue`)
//! - run configuration (`IndexConfig`, `NumberFormat`, `UndefinedPolicy`)

pub mod types;

pub use types::*;
