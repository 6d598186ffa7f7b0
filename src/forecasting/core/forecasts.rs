//! Forecast output tables and accuracy metrics.
use crate::forecasting::core::quantiles::QuantileSet;
use chrono::NaiveDateTime;
use ndarray::{Array1, Array2, ArrayView1};
use std::collections::BTreeMap;

/// Per-timestamp, per-quantile forecasts of one series, in data units.
///
/// - `yhat[[r, q]]`: forecast for `timestamps[r]` at `quantiles.levels()[q]`.
/// - `actual`: observed values when the rows are in-sample.
/// - `components`: decomposition of the median forecast, one column per
///   component (`trend`, `season_<name>`, `event_<name>`, …) plus the
///   `events_*` and `future_regressors_*` aggregates when present.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTable {
    pub series_id: String,
    pub timestamps: Vec<NaiveDateTime>,
    pub quantiles: QuantileSet,
    pub yhat: Array2<f64>,
    pub actual: Option<Array1<f64>>,
    pub components: BTreeMap<String, Array1<f64>>,
}

impl ForecastTable {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Median forecast column.
    pub fn median(&self) -> ArrayView1<'_, f64> {
        self.yhat.column(self.quantiles.median_index())
    }

    /// Forecast column for `level`, if it was predicted.
    pub fn quantile(&self, level: f64) -> Option<ArrayView1<'_, f64>> {
        self.quantiles.index_of(level).map(|q| self.yhat.column(q))
    }

    /// Named output columns (`yhat`, `yhat 10.0%`, …) in quantile order.
    pub fn column_names(&self) -> Vec<String> {
        (0..self.quantiles.len()).map(|q| self.quantiles.column_name(q)).collect()
    }

    pub fn component(&self, name: &str) -> Option<&Array1<f64>> {
        self.components.get(name)
    }

    /// Share of rows where some lower quantile exceeds a higher one.
    pub fn crossing_rate(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let crossed = self
            .yhat
            .rows()
            .into_iter()
            .filter(|row| row.iter().zip(row.iter().skip(1)).any(|(lo, hi)| lo > hi))
            .count();
        crossed as f64 / self.len() as f64
    }
}

/// In-sample accuracy summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub mae: f64,
    pub rmse: f64,
    /// Mean pinball loss over all quantile levels.
    pub pinball: f64,
    pub n_points: usize,
}
