//! Running sums for one (month, scope) cell.

use indexmap::IndexMap;

/// Totals for one product within a country (or the World) for one month.
///
/// Invariant: `count > 0` once the accumulator exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductAccumulator {
    pub total_price: f64,
    pub count: u64,
    /// Looked up once when the product is first seen; constant afterwards.
    pub weight: f64,
}

impl ProductAccumulator {
    pub fn new(weight: f64) -> Self {
        Self {
            total_price: 0.0,
            count: 0,
            weight,
        }
    }

    pub fn add(&mut self, price: f64) {
        self.total_price += price;
        self.count += 1;
    }

    pub fn average(&self) -> f64 {
        self.total_price / self.count as f64
    }
}

/// Per-product totals plus the weighted sums used for the composite average.
///
/// `weight_sum` counts a product's weight once per observation, not once per
/// distinct product.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeAccumulator {
    pub products: IndexMap<String, ProductAccumulator>,
    pub weighted_sum: f64,
    pub weight_sum: f64,
}

/// Accumulator for one (month, country).
pub type CountryAccumulator = ScopeAccumulator;

/// Accumulator for one month summed across every country.
pub type GlobalAccumulator = ScopeAccumulator;

impl ScopeAccumulator {
    /// `Σ(price·weight) / Σ(weight)`, or `None` when no observation carried weight.
    pub fn weighted_average(&self) -> Option<f64> {
        if self.weight_sum > 0.0 {
            Some(self.weighted_sum / self.weight_sum)
        } else {
            None
        }
    }

    /// Fold another scope's totals into this one.
    pub fn absorb(&mut self, other: &ScopeAccumulator) {
        for (product, acc) in &other.products {
            let entry = self
                .products
                .entry(product.clone())
                .or_insert_with(|| ProductAccumulator::new(acc.weight));
            entry.total_price += acc.total_price;
            entry.count += acc.count;
        }
        self.weighted_sum += other.weighted_sum;
        self.weight_sum += other.weight_sum;
    }

    pub fn observation_count(&self) -> u64 {
        self.products.values().map(|p| p.count).sum()
    }
}
