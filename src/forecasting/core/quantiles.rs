//! Ordered set of quantile levels predicted jointly by a model.
use crate::forecasting::errors::{ForecastError, ForecastResult};

/// Validated, sorted quantile levels that always contain the median.
///
/// Invariants
/// ----------
/// - Every level lies strictly inside `(0, 1)`.
/// - Levels are strictly increasing (duplicates are rejected).
/// - `0.5` is present; it is inserted when the caller omits it.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileSet {
    levels: Vec<f64>,
    median: usize,
}

impl QuantileSet {
    /// Build a quantile set from arbitrary-order levels.
    ///
    /// Errors
    /// ------
    /// - `ForecastError::Configuration` for levels outside `(0, 1)`,
    ///   non-finite levels or duplicates.
    pub fn new(levels: &[f64]) -> ForecastResult<Self> {
        let mut sorted = Vec::with_capacity(levels.len() + 1);
        for &q in levels {
            if !q.is_finite() || q <= 0.0 || q >= 1.0 {
                return Err(ForecastError::config(
                    "quantiles",
                    format!("levels must lie strictly between 0 and 1, got {q}"),
                ));
            }
            sorted.push(q);
        }
        if !sorted.iter().any(|&q| q == 0.5) {
            sorted.push(0.5);
        }
        sorted.sort_by(f64::total_cmp);
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(ForecastError::config("quantiles", "levels must be unique"));
        }
        let median = sorted.iter().position(|&q| q == 0.5).unwrap_or(0);
        Ok(Self { levels: sorted, median })
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Column index of the median.
    pub fn median_index(&self) -> usize {
        self.median
    }

    /// Column index of `level`, if present.
    pub fn index_of(&self, level: f64) -> Option<usize> {
        self.levels.iter().position(|&q| (q - level).abs() < 1e-12)
    }

    /// Output column name: `yhat` for the median, `yhat 10.0%` otherwise.
    pub fn column_name(&self, index: usize) -> String {
        if index == self.median {
            "yhat".to_string()
        } else {
            format!("yhat {:.1}%", self.levels[index] * 100.0)
        }
    }
}

impl Default for QuantileSet {
    fn default() -> Self {
        Self { levels: vec![0.5], median: 0 }
    }
}
