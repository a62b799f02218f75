//! Input/output helpers.
//!
//! - price CSV ingest + validation (`ingest`)
//! - index CSV export (`export`)
//! - product weight JSON (`weights`)

pub mod export;
pub mod ingest;
pub mod weights;

pub use export::*;
pub use ingest::*;
pub use weights::*;
