//! Command-line parsing for the BILLY price index builder.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the aggregation/index code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{DecimalSeparator, Month, UndefinedPolicy};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "billy", version, about = "Monthly BILLY bookcase price index from scraped prices")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Aggregate the price CSV and write monthly averages and indices.
    Build(BuildArgs),
    /// List the collection dates already present in the price CSV.
    Dates(DatesArgs),
    /// Print the product weight table (optionally export it as JSON).
    Weights(WeightsArgs),
}

/// Options for `billy build`.
#[derive(Debug, Parser, Clone)]
pub struct BuildArgs {
    /// Price CSV written by the collector.
    #[arg(short, long, env = "BILLY_PRICES_CSV", default_value = "billy_prices.csv")]
    pub input: PathBuf,

    /// Index CSV to write.
    #[arg(short, long, env = "BILLY_INDEX_CSV", default_value = "billy_index.csv")]
    pub output: PathBuf,

    /// Baseline month (YYYY-MM); its World Weighted Average is index 1.0.
    #[arg(short, long, env = "BILLY_BASELINE_MONTH", default_value = "2025-01", value_parser = parse_month)]
    pub baseline: Month,

    /// JSON object of product -> weight (defaults to the built-in BILLY table).
    #[arg(short, long, env = "BILLY_WEIGHTS")]
    pub weights: Option<PathBuf>,

    /// Decimal separator for every number in the output.
    #[arg(long, value_enum, default_value_t = DecimalSeparator::Comma)]
    pub decimal: DecimalSeparator,

    /// Group thousands (e.g. `1.234,56`).
    #[arg(long)]
    pub group_thousands: bool,

    /// Field delimiter for both input and output CSV.
    #[arg(long, default_value_t = ';', value_parser = parse_delimiter)]
    pub delimiter: char,

    /// What to do with weighted averages over a zero weight sum.
    #[arg(long, value_enum, default_value_t = UndefinedPolicy::Mark)]
    pub undefined: UndefinedPolicy,

    /// Do not print the run summary.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Options for `billy dates`.
#[derive(Debug, Parser, Clone)]
pub struct DatesArgs {
    /// Price CSV written by the collector.
    #[arg(short, long, env = "BILLY_PRICES_CSV", default_value = "billy_prices.csv")]
    pub input: PathBuf,

    /// Exit with code 1 if this date (dd/mm/yy, default today) is already collected.
    #[arg(long, num_args = 0..=1, default_missing_value = "today")]
    pub check: Option<String>,

    /// Field delimiter of the price CSV.
    #[arg(long, default_value_t = ';', value_parser = parse_delimiter)]
    pub delimiter: char,
}

/// Options for `billy weights`.
#[derive(Debug, Parser, Clone)]
pub struct WeightsArgs {
    /// JSON object of product -> weight (defaults to the built-in BILLY table).
    #[arg(short, long, env = "BILLY_WEIGHTS")]
    pub weights: Option<PathBuf>,

    /// Write the effective table to this JSON file.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

fn parse_month(s: &str) -> Result<Month, String> {
    s.parse::<Month>().map_err(|e| e.to_string())
}

fn parse_delimiter(s: &str) -> Result<char, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && c != '"' && c != '\n' && c != '\r' => Ok(c),
        _ => Err(format!("Invalid delimiter '{s}': expected a single ASCII character.")),
    }
}
