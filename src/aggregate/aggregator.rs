//! Month -> country -> product aggregation.
//!
//! Observations are folded in one pass. Once every observation has been seen,
//! `finish` derives the World accumulators exactly once so the indexer can
//! reuse them for both the average rows and the index rows.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::aggregate::accumulator::{CountryAccumulator, GlobalAccumulator, ProductAccumulator};
use crate::domain::{Month, Observation, ProductWeights};

/// Country accumulators keyed by month, then by country, in first-seen order.
pub type CountryTable = IndexMap<Month, IndexMap<String, CountryAccumulator>>;

/// World accumulators keyed by month, in the same order as [`CountryTable`].
pub type GlobalTable = IndexMap<Month, GlobalAccumulator>;

/// Streaming aggregator over price observations.
#[derive(Debug, Clone)]
pub struct Aggregator {
    weights: ProductWeights,
    countries: CountryTable,
    observations: usize,
}

/// Complete, read-only aggregation result handed to the indexer.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub countries: CountryTable,
    pub global: GlobalTable,
    pub observations: usize,
}

impl Aggregator {
    pub fn new(weights: ProductWeights) -> Self {
        Self {
            weights,
            countries: IndexMap::new(),
            observations: 0,
        }
    }

    /// Add one observation. Repeated observations for the same key count again.
    pub fn ingest(&mut self, obs: &Observation) {
        let country = self
            .countries
            .entry(obs.month)
            .or_default()
            .entry(obs.country.clone())
            .or_default();

        let weights = &self.weights;
        let product = country
            .products
            .entry(obs.product.clone())
            .or_insert_with(|| ProductAccumulator::new(weights.get(&obs.product)));
        product.add(obs.price_eur);

        let weight = product.weight;
        country.weighted_sum += obs.price_eur * weight;
        country.weight_sum += weight;
        self.observations += 1;
    }

    pub fn ingest_all<'a, I>(&mut self, observations: I)
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        for obs in observations {
            self.ingest(obs);
        }
    }

    /// Sum every country's totals into one World accumulator per month.
    ///
    /// Only meaningful after the last `ingest`: World totals depend on the
    /// complete country set.
    pub fn rollup_global(&self) -> GlobalTable {
        let mut global = GlobalTable::with_capacity(self.countries.len());
        for (month, countries) in &self.countries {
            let world = global.entry(*month).or_default();
            for country in countries.values() {
                world.absorb(country);
            }
            debug!(
                month = %month,
                countries = countries.len(),
                products = world.products.len(),
                "rolled up world totals"
            );
        }
        global
    }

    pub fn finish(self) -> Aggregation {
        let global = self.rollup_global();
        Aggregation {
            countries: self.countries,
            global,
            observations: self.observations,
        }
    }
}

impl Aggregation {
    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    pub fn months(&self) -> impl Iterator<Item = Month> + '_ {
        self.countries.keys().copied()
    }

    /// Distinct country names across all months, first-seen order.
    pub fn country_names(&self) -> Vec<&str> {
        let mut seen: IndexSet<&str> = IndexSet::new();
        for countries in self.countries.values() {
            seen.extend(countries.keys().map(String::as_str));
        }
        seen.into_iter().collect()
    }

    /// Distinct product names across all months, first-seen order.
    pub fn product_names(&self) -> Vec<&str> {
        let mut seen: IndexSet<&str> = IndexSet::new();
        for world in self.global.values() {
            seen.extend(world.products.keys().map(String::as_str));
        }
        seen.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIG: &str = "BILLY Bookcase white 80x28x202 cm";
    const NARROW: &str = "BILLY Bookcase white 40x28x202 cm";
    const LOW: &str = "BILLY Bookcase white 80x28x106 cm";

    fn obs(month: &str, country: &str, product: &str, price: f64) -> Observation {
        Observation {
            month: month.parse().unwrap(),
            country: country.to_string(),
            product: product.to_string(),
            price_eur: price,
        }
    }

    fn sample() -> Vec<Observation> {
        vec![
            obs("2025-01", "Germany", BIG, 60.0),
            obs("2025-01", "Germany", NARROW, 45.0),
            obs("2025-01", "Italy", BIG, 69.0),
            obs("2025-01", "Italy", LOW, 39.99),
            obs("2025-01", "Germany", BIG, 62.0),
            obs("2025-02", "Italy", "POÄNG Armchair", 99.0),
            obs("2025-02", "Germany", LOW, 35.0),
            obs("2025-02", "Italy", BIG, 71.5),
        ]
    }

    fn aggregate(observations: &[Observation]) -> Aggregation {
        let mut agg = Aggregator::new(ProductWeights::default());
        agg.ingest_all(observations);
        agg.finish()
    }

    #[test]
    fn duplicates_increase_count_and_sums() {
        let agg = aggregate(&sample());
        let month: Month = "2025-01".parse().unwrap();
        let germany = &agg.countries[&month]["Germany"];
        let big = &germany.products[BIG];
        assert_eq!(big.count, 2);
        assert!((big.total_price - 122.0).abs() < 1e-9);
        // 60*0.4 + 45*0.4 + 62*0.4, weights counted per observation.
        assert!((germany.weighted_sum - 66.8).abs() < 1e-9);
        assert!((germany.weight_sum - 1.2).abs() < 1e-9);
        assert_eq!(agg.observations, 8);
    }

    #[test]
    fn iteration_follows_first_seen_order() {
        let agg = aggregate(&sample());
        let months: Vec<String> = agg.months().map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["2025-01", "2025-02"]);

        let feb: Month = "2025-02".parse().unwrap();
        let countries: Vec<&String> = agg.countries[&feb].keys().collect();
        assert_eq!(countries, vec!["Italy", "Germany"]);

        assert_eq!(agg.country_names(), vec!["Germany", "Italy"]);
        assert_eq!(agg.product_names(), vec![BIG, NARROW, LOW, "POÄNG Armchair"]);
    }

    #[test]
    fn aggregation_is_order_independent() {
        let forward = aggregate(&sample());
        let mut reversed_input = sample();
        reversed_input.reverse();
        let reversed = aggregate(&reversed_input);
        let mut rotated_input = sample();
        rotated_input.rotate_left(3);
        let rotated = aggregate(&rotated_input);

        for other in [&reversed, &rotated] {
            for (month, countries) in &forward.countries {
                for (country, acc) in countries {
                    let o = &other.countries[month][country];
                    assert!((acc.weighted_sum - o.weighted_sum).abs() < 1e-9);
                    assert!((acc.weight_sum - o.weight_sum).abs() < 1e-9);
                    for (product, p) in &acc.products {
                        let op = &o.products[product];
                        assert_eq!(p.count, op.count);
                        assert!((p.total_price - op.total_price).abs() < 1e-9);
                    }
                }
            }
        }
    }

    #[test]
    fn global_rollup_matches_country_sums_exactly() {
        let agg = aggregate(&sample());
        for (month, countries) in &agg.countries {
            let world = &agg.global[month];
            let mut weighted_sum = 0.0;
            let mut weight_sum = 0.0;
            for acc in countries.values() {
                weighted_sum += acc.weighted_sum;
                weight_sum += acc.weight_sum;
            }
            assert_eq!(world.weighted_sum, weighted_sum);
            assert_eq!(world.weight_sum, weight_sum);

            let country_obs: u64 = countries.values().map(|c| c.observation_count()).sum();
            assert_eq!(world.observation_count(), country_obs);
        }
    }

    #[test]
    fn weighted_average_stays_within_weighted_price_range() {
        let observations = sample();
        let agg = aggregate(&observations);
        let weights = ProductWeights::default();
        for (month, countries) in &agg.countries {
            for (country, acc) in countries {
                let Some(avg) = acc.weighted_average() else { continue };
                let prices: Vec<f64> = observations
                    .iter()
                    .filter(|o| o.month == *month && &o.country == country && weights.get(&o.product) > 0.0)
                    .map(|o| o.price_eur)
                    .collect();
                let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
                let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                assert!(avg >= min - 1e-9 && avg <= max + 1e-9, "{avg} not in [{min}, {max}]");
            }
        }
    }

    #[test]
    fn unweighted_products_do_not_move_weighted_sums() {
        let agg = aggregate(&sample());
        let feb: Month = "2025-02".parse().unwrap();
        let italy = &agg.countries[&feb]["Italy"];
        assert_eq!(italy.products["POÄNG Armchair"].count, 1);
        assert!((italy.weighted_sum - 71.5 * 0.4).abs() < 1e-9);
        assert!((italy.weight_sum - 0.4).abs() < 1e-9);
    }

    #[test]
    fn empty_input_yields_empty_aggregation() {
        let agg = aggregate(&[]);
        assert!(agg.is_empty());
        assert!(agg.global.is_empty());
        assert_eq!(agg.observations, 0);
    }
}
