//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - produced by the CSV loader
//! - accumulated and indexed in-memory
//! - formatted by the CSV writer and the terminal summary

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Label used for the global scope in result rows.
pub const WORLD: &str = "World";

/// Header of the output relation, in column order.
pub const OUTPUT_HEADERS: [&str; 4] = ["Month", "Country", "Product", "Average Price in EUR"];

/// A calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (0..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::input(format!("Invalid month '{s}'. Expected YYYY-MM."));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Month::new(year, month).ok_or_else(invalid)
    }
}

/// One parsed price observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub month: Month,
    pub country: String,
    pub product: String,
    pub price_eur: f64,
}

/// Product name -> weight in the composite index.
///
/// Products that are not listed weigh `0`: they still get their own average
/// rows but never move a weighted average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IndexMap<String, f64>", into = "IndexMap<String, f64>")]
pub struct ProductWeights {
    weights: IndexMap<String, f64>,
}

impl ProductWeights {
    pub fn new<I, S>(entries: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut weights = IndexMap::new();
        for (product, weight) in entries {
            let product = product.into();
            if !weight.is_finite() || weight < 0.0 {
                return Err(AppError::input(
                    format!("Invalid weight {weight} for '{product}' (must be finite and >= 0)."),
                ));
            }
            weights.insert(product, weight);
        }
        Ok(Self { weights })
    }

    pub fn get(&self, product: &str) -> f64 {
        self.weights.get(product).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for ProductWeights {
    /// The three BILLY bookcase sizes tracked by the collector.
    fn default() -> Self {
        let weights = [
            ("BILLY Bookcase white 80x28x202 cm", 0.4),
            ("BILLY Bookcase white 40x28x202 cm", 0.4),
            ("BILLY Bookcase white 80x28x106 cm", 0.2),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self { weights }
    }
}

impl TryFrom<IndexMap<String, f64>> for ProductWeights {
    type Error = AppError;

    fn try_from(value: IndexMap<String, f64>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProductWeights> for IndexMap<String, f64> {
    fn from(value: ProductWeights) -> Self {
        value.weights
    }
}

/// Decimal separator used for every number in one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DecimalSeparator {
    /// `60,00` (Italian-style locale, the historical output).
    Comma,
    /// `60.00`
    Dot,
}

impl DecimalSeparator {
    pub fn as_char(self) -> char {
        match self {
            DecimalSeparator::Comma => ',',
            DecimalSeparator::Dot => '.',
        }
    }

    /// Separator used between thousands groups when grouping is enabled.
    pub fn group_char(self) -> char {
        match self {
            DecimalSeparator::Comma => '.',
            DecimalSeparator::Dot => ',',
        }
    }
}

/// What to do with a row whose weighted average is undefined (zero weight sum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedPolicy {
    /// Keep the row and write [`UNDEFINED_MARKER`] as its value.
    Mark,
    /// Drop the row from the output.
    Omit,
}

/// Value written for undefined averages under [`UndefinedPolicy::Mark`].
pub const UNDEFINED_MARKER: &str = "n/a";

/// Number rendering conventions for one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub decimal: DecimalSeparator,
    pub group_thousands: bool,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal: DecimalSeparator::Comma,
            group_thousands: false,
        }
    }
}

/// Geographic scope of a result row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Country(String),
    World,
}

impl Scope {
    pub fn name(&self) -> &str {
        match self {
            Scope::Country(name) => name,
            Scope::World => WORLD,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a result row measures: a product average or one of the synthetic rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowLabel {
    Product(String),
    CountryWeightedAverage,
    WorldWeightedAverage,
    CountryIndex,
    WorldIndex,
}

impl RowLabel {
    pub fn name(&self) -> &str {
        match self {
            RowLabel::Product(name) => name,
            RowLabel::CountryWeightedAverage => "Country Weighted Average",
            RowLabel::WorldWeightedAverage => "World Weighted Average",
            RowLabel::CountryIndex => "Country Index",
            RowLabel::WorldIndex => "World Index",
        }
    }
}

impl fmt::Display for RowLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Row payload. Undefined values never carry a numeric placeholder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowValue {
    /// Average price in EUR, rendered with 2 fractional digits.
    Price(f64),
    /// Ratio to the baseline, rendered with 4 fractional digits.
    Index(f64),
    /// Weighted average over a zero weight sum.
    Undefined,
}

impl RowValue {
    pub fn is_undefined(self) -> bool {
        matches!(self, RowValue::Undefined)
    }

    pub fn as_f64(self) -> Option<f64> {
        match self {
            RowValue::Price(v) | RowValue::Index(v) => Some(v),
            RowValue::Undefined => None,
        }
    }
}

/// One line of the output relation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub month: Month,
    pub scope: Scope,
    pub label: RowLabel,
    pub value: RowValue,
}

/// Fully resolved settings for one `billy build` run.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub baseline: Month,
    pub weights: ProductWeights,
    pub number_format: NumberFormat,
    pub delimiter: u8,
    pub undefined: UndefinedPolicy,
    pub print_summary: bool,
}

impl IndexConfig {
    /// Default baseline month for the index.
    pub const DEFAULT_BASELINE: Month = Month {
        year: 2025,
        month: 1,
    };
}
