//! Reporting utilities: number rendering and terminal summaries.

pub mod format;

pub use format::*;
