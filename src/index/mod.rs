//! Indexing stage: turn an [`Aggregation`] into ordered result rows.
//!
//! Two explicit phases:
//! 1. average rows (per country, then World) for every month, and the
//!    baseline taken from the baseline month's World weighted average
//! 2. index rows, only when a usable baseline exists
//!
//! Zero weight sums surface as [`RowValue::Undefined`]; the writer decides
//! whether to mark or omit them.

use tracing::{debug, info, warn};

use crate::aggregate::{Aggregation, ScopeAccumulator};
use crate::domain::{Month, ResultRow, RowLabel, RowValue, Scope};

/// The scalar every index value is divided by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub month: Month,
    pub value: f64,
}

/// Outcome of the baseline lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaselineStatus {
    Captured(Baseline),
    /// No observation fell in the baseline month.
    MissingMonth(Month),
    /// The baseline month exists but its World weight sum is zero.
    Undefined(Month),
    /// The World weighted average is zero or negative; ratios would be meaningless.
    NonPositive(Baseline),
}

impl BaselineStatus {
    pub fn baseline(&self) -> Option<Baseline> {
        match self {
            BaselineStatus::Captured(b) => Some(*b),
            _ => None,
        }
    }
}

/// Ordered output of the indexer plus what the summary needs to know.
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub rows: Vec<ResultRow>,
    pub baseline: BaselineStatus,
    pub undefined_rows: usize,
    pub index_rows: usize,
}

/// Build every result row for the aggregation, normalized to `baseline_month`.
pub fn build_index(aggregation: &Aggregation, baseline_month: Month) -> IndexReport {
    let mut rows = Vec::new();

    // Phase 1: averages.
    for (month, countries) in &aggregation.countries {
        for (country, acc) in countries {
            push_scope_rows(&mut rows, *month, Scope::Country(country.clone()), acc);
        }
        if let Some(world) = aggregation.global.get(month) {
            push_scope_rows(&mut rows, *month, Scope::World, world);
        }
    }

    let baseline = resolve_baseline(aggregation, baseline_month);

    // Phase 2: indices.
    let mut index_rows = 0;
    match baseline {
        BaselineStatus::Captured(base) => {
            let before = rows.len();
            push_index_rows(&mut rows, aggregation, base);
            index_rows = rows.len() - before;
            info!(
                baseline_month = %base.month,
                baseline = base.value,
                rows = index_rows,
                "index rows computed"
            );
        }
        BaselineStatus::MissingMonth(month) => {
            warn!("Baseline month {month} is not present in the input; index rows skipped.");
        }
        BaselineStatus::Undefined(month) => {
            warn!(
                "Baseline month {month} has no weighted observations (World weight sum is 0); index rows skipped."
            );
        }
        BaselineStatus::NonPositive(base) => {
            warn!(
                "Baseline World Weighted Average for {} is {} (must be > 0); index rows skipped.",
                base.month, base.value
            );
        }
    }

    let undefined_rows = rows.iter().filter(|r| r.value.is_undefined()).count();

    IndexReport {
        rows,
        baseline,
        undefined_rows,
        index_rows,
    }
}

/// Look up the baseline month's World weighted average.
pub fn resolve_baseline(aggregation: &Aggregation, baseline_month: Month) -> BaselineStatus {
    let Some(world) = aggregation.global.get(&baseline_month) else {
        return BaselineStatus::MissingMonth(baseline_month);
    };
    match world.weighted_average() {
        None => BaselineStatus::Undefined(baseline_month),
        Some(value) if value > 0.0 && value.is_finite() => BaselineStatus::Captured(Baseline {
            month: baseline_month,
            value,
        }),
        Some(value) => BaselineStatus::NonPositive(Baseline {
            month: baseline_month,
            value,
        }),
    }
}

fn push_scope_rows(rows: &mut Vec<ResultRow>, month: Month, scope: Scope, acc: &ScopeAccumulator) {
    for (product, p) in &acc.products {
        rows.push(ResultRow {
            month,
            scope: scope.clone(),
            label: RowLabel::Product(product.clone()),
            value: RowValue::Price(p.average()),
        });
    }

    let label = match scope {
        Scope::Country(_) => RowLabel::CountryWeightedAverage,
        Scope::World => RowLabel::WorldWeightedAverage,
    };
    let value = match acc.weighted_average() {
        Some(avg) => RowValue::Price(avg),
        None => {
            debug!(month = %month, scope = %scope, "weighted average undefined (weight sum is 0)");
            RowValue::Undefined
        }
    };
    rows.push(ResultRow {
        month,
        scope,
        label,
        value,
    });
}

fn push_index_rows(rows: &mut Vec<ResultRow>, aggregation: &Aggregation, base: Baseline) {
    for (month, countries) in &aggregation.countries {
        for (country, acc) in countries {
            rows.push(ResultRow {
                month: *month,
                scope: Scope::Country(country.clone()),
                label: RowLabel::CountryIndex,
                value: index_value(acc, base),
            });
        }
    }
    for (month, world) in &aggregation.global {
        rows.push(ResultRow {
            month: *month,
            scope: Scope::World,
            label: RowLabel::WorldIndex,
            value: index_value(world, base),
        });
    }
}

fn index_value(acc: &ScopeAccumulator, base: Baseline) -> RowValue {
    match acc.weighted_average() {
        Some(avg) => RowValue::Index(avg / base.value),
        None => RowValue::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::domain::{Observation, ProductWeights};

    const BIG: &str = "BILLY Bookcase white 80x28x202 cm";

    fn month(s: &str) -> Month {
        s.parse().unwrap()
    }

    fn obs(m: &str, country: &str, product: &str, price: f64) -> Observation {
        Observation {
            month: month(m),
            country: country.to_string(),
            product: product.to_string(),
            price_eur: price,
        }
    }

    fn run(observations: &[Observation], weights: ProductWeights, baseline: &str) -> IndexReport {
        let mut agg = Aggregator::new(weights);
        agg.ingest_all(observations);
        build_index(&agg.finish(), month(baseline))
    }

    fn find<'a>(report: &'a IndexReport, m: &str, scope: &str, label: &str) -> Option<&'a ResultRow> {
        report
            .rows
            .iter()
            .find(|r| r.month == month(m) && r.scope.name() == scope && r.label.name() == label)
    }

    fn value(report: &IndexReport, m: &str, scope: &str, label: &str) -> RowValue {
        find(report, m, scope, label)
            .unwrap_or_else(|| panic!("missing row {m}/{scope}/{label}"))
            .value
    }

    /// Writer that appends formatted log lines to a shared buffer.
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a debug-level subscriber and return its result with the log text.
    fn with_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        (out, logs)
    }

    fn assert_price(v: RowValue, expected: f64) {
        match v {
            RowValue::Price(x) => assert!((x - expected).abs() < 1e-9, "{x} != {expected}"),
            other => panic!("expected price, got {other:?}"),
        }
    }

    fn assert_index(v: RowValue, expected: f64) {
        match v {
            RowValue::Index(x) => assert!((x - expected).abs() < 1e-12, "{x} != {expected}"),
            other => panic!("expected index, got {other:?}"),
        }
    }

    #[test]
    fn single_observation_normalizes_to_one() {
        let report = run(&[obs("2025-01", "Germany", BIG, 60.0)], ProductWeights::default(), "2025-01");

        assert_price(value(&report, "2025-01", "Germany", BIG), 60.0);
        assert_price(value(&report, "2025-01", "Germany", "Country Weighted Average"), 60.0);
        assert_price(value(&report, "2025-01", "World", BIG), 60.0);
        assert_price(value(&report, "2025-01", "World", "World Weighted Average"), 60.0);
        let base = report.baseline.baseline().unwrap();
        assert_eq!(base.month, month("2025-01"));
        assert!((base.value - 60.0).abs() < 1e-9);
        assert_index(value(&report, "2025-01", "Germany", "Country Index"), 1.0);
        assert_index(value(&report, "2025-01", "World", "World Index"), 1.0);
        assert_eq!(report.rows.len(), 6);
        assert_eq!(report.index_rows, 2);
    }

    #[test]
    fn world_averages_span_countries() {
        let report = run(
            &[
                obs("2025-01", "Germany", BIG, 60.0),
                obs("2025-01", "Italy", BIG, 80.0),
            ],
            ProductWeights::default(),
            "2025-01",
        );

        assert_price(value(&report, "2025-01", "World", BIG), 70.0);
        assert_price(value(&report, "2025-01", "World", "World Weighted Average"), 70.0);
        assert_index(value(&report, "2025-01", "Germany", "Country Index"), 60.0 / 70.0);
        assert_index(value(&report, "2025-01", "Italy", "Country Index"), 80.0 / 70.0);
        assert_index(value(&report, "2025-01", "World", "World Index"), 1.0);
    }

    #[test]
    fn unweighted_product_keeps_its_row_but_not_the_weighted_average() {
        let report = run(
            &[
                obs("2025-01", "Germany", BIG, 60.0),
                obs("2025-01", "Germany", "POÄNG Armchair", 500.0),
            ],
            ProductWeights::default(),
            "2025-01",
        );

        assert_price(value(&report, "2025-01", "Germany", "POÄNG Armchair"), 500.0);
        assert_price(value(&report, "2025-01", "Germany", "Country Weighted Average"), 60.0);
        assert_price(value(&report, "2025-01", "World", "World Weighted Average"), 60.0);
    }

    #[test]
    fn missing_baseline_month_skips_every_index_row() {
        let report = run(
            &[
                obs("2025-02", "Germany", BIG, 60.0),
                obs("2025-03", "Italy", BIG, 80.0),
            ],
            ProductWeights::default(),
            "2025-01",
        );

        assert_eq!(report.baseline, BaselineStatus::MissingMonth(month("2025-01")));
        assert_eq!(report.index_rows, 0);
        assert!(report
            .rows
            .iter()
            .all(|r| !matches!(r.label, RowLabel::CountryIndex | RowLabel::WorldIndex)));
        assert_price(value(&report, "2025-02", "Germany", "Country Weighted Average"), 60.0);
        assert_price(value(&report, "2025-03", "World", "World Weighted Average"), 80.0);
        assert_eq!(report.rows.len(), 8);
    }

    #[test]
    fn missing_baseline_logs_its_own_warning() {
        let (report, logs) = with_logs(|| {
            run(
                &[obs("2025-02", "Germany", BIG, 60.0)],
                ProductWeights::default(),
                "2025-01",
            )
        });
        assert_eq!(report.baseline, BaselineStatus::MissingMonth(month("2025-01")));
        assert!(logs.contains("WARN"));
        assert!(logs.contains("Baseline month 2025-01 is not present in the input"));
        assert!(!logs.contains("weighted average undefined"));
    }

    #[test]
    fn zero_weight_sum_logs_undefined_average_not_missing_baseline() {
        let (report, logs) = with_logs(|| {
            run(
                &[
                    obs("2025-01", "Germany", BIG, 60.0),
                    obs("2025-01", "Norway", "POÄNG Armchair", 120.0),
                ],
                ProductWeights::default(),
                "2025-01",
            )
        });
        assert!(report.baseline.baseline().is_some());
        assert!(logs.contains("DEBUG"));
        assert!(logs.contains("weighted average undefined"));
        assert!(!logs.contains("is not present in the input"));
        assert!(!logs.contains("index rows skipped"));
    }

    #[test]
    fn zero_weight_country_is_undefined_not_nan() {
        let report = run(
            &[
                obs("2025-01", "Germany", BIG, 60.0),
                obs("2025-01", "Norway", "POÄNG Armchair", 120.0),
            ],
            ProductWeights::default(),
            "2025-01",
        );

        assert_eq!(
            value(&report, "2025-01", "Norway", "Country Weighted Average"),
            RowValue::Undefined
        );
        assert_eq!(value(&report, "2025-01", "Norway", "Country Index"), RowValue::Undefined);
        assert_index(value(&report, "2025-01", "Germany", "Country Index"), 1.0);
        assert_eq!(report.undefined_rows, 2);
        assert!(report
            .rows
            .iter()
            .filter_map(|r| r.value.as_f64())
            .all(f64::is_finite));
    }

    #[test]
    fn undefined_baseline_is_reported_separately() {
        let report = run(
            &[obs("2025-01", "Norway", "POÄNG Armchair", 120.0)],
            ProductWeights::default(),
            "2025-01",
        );
        assert_eq!(report.baseline, BaselineStatus::Undefined(month("2025-01")));
        assert_eq!(report.index_rows, 0);
    }

    #[test]
    fn zero_priced_baseline_is_not_used() {
        let report = run(&[obs("2025-01", "Germany", BIG, 0.0)], ProductWeights::default(), "2025-01");
        assert!(matches!(report.baseline, BaselineStatus::NonPositive(_)));
        assert_eq!(report.index_rows, 0);
    }

    #[test]
    fn rows_follow_output_ordering() {
        let weights = ProductWeights::new([("A", 1.0), ("B", 1.0)]).unwrap();
        let report = run(
            &[
                obs("2025-01", "Italy", "B", 10.0),
                obs("2025-01", "Germany", "A", 20.0),
                obs("2025-01", "Italy", "A", 30.0),
                obs("2024-12", "Germany", "A", 20.0),
            ],
            weights,
            "2025-01",
        );

        let keys: Vec<String> = report
            .rows
            .iter()
            .map(|r| format!("{} {} {}", r.month, r.scope, r.label))
            .collect();
        assert_eq!(
            keys,
            vec![
                "2025-01 Italy B",
                "2025-01 Italy A",
                "2025-01 Italy Country Weighted Average",
                "2025-01 Germany A",
                "2025-01 Germany Country Weighted Average",
                "2025-01 World B",
                "2025-01 World A",
                "2025-01 World World Weighted Average",
                "2024-12 Germany A",
                "2024-12 Germany Country Weighted Average",
                "2024-12 World A",
                "2024-12 World World Weighted Average",
                "2025-01 Italy Country Index",
                "2025-01 Germany Country Index",
                "2024-12 Germany Country Index",
                "2025-01 World World Index",
                "2024-12 World World Index",
            ]
        );
    }

    #[test]
    fn index_uses_world_baseline_for_every_month() {
        let report = run(
            &[
                obs("2025-01", "Germany", BIG, 50.0),
                obs("2025-01", "Italy", BIG, 70.0),
                obs("2025-02", "Germany", BIG, 66.0),
            ],
            ProductWeights::default(),
            "2025-01",
        );
        assert_index(value(&report, "2025-02", "Germany", "Country Index"), 1.1);
        assert_index(value(&report, "2025-02", "World", "World Index"), 1.1);
        assert_index(value(&report, "2025-01", "Germany", "Country Index"), 50.0 / 60.0);
    }
}
