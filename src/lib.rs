//! `billy-index` library crate.
//!
//! Builds a monthly BILLY bookcase price index from the collector's price CSV:
//! per-country and World averages, weighted averages, and indices relative to
//! a baseline month.
//!
//! The binary (`billy`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the aggregation engine can be reused without the CSV plumbing

pub mod aggregate;
pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod index;
pub mod io;
pub mod report;
