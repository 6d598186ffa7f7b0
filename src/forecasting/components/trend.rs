//! Piecewise-linear trend.
//!
//! Purpose
//! -------
//! Model the slowly varying level of a series as a continuous piecewise
//! linear function of normalized time `t`.
//!
//! Key behaviors
//! -------------
//! - Parameters per quantile slice: offset `m`, base rate `k`, and one rate
//!   adjustment `δ_i` per changepoint `c_i`.
//! - `trend(t) = m + k·t + Σ_i δ_i · max(0, t − c_i)`. Every adjustment bends
//!   the slope at its changepoint while keeping the curve continuous.
//! - Changepoints are evenly spaced: `c_i = range · i / (K + 1)`, `i = 1..=K`,
//!   so none falls on the first observation and none lies past the allowed
//!   share of the training span.
//! - `trend_reg · mean|δ|` (L1) keeps most adjustments at zero.
//! - `GrowthMode::Off` keeps only `m`.
//!
//! Invariants & assumptions
//! ------------------------
//! - With `K = 0` the trend is exactly `m + k·t` on the whole time axis.
use crate::forecasting::{
    components::{
        l1_penalty, l1_penalty_grad, slot_ranges, Component, ComponentFamily, ComponentRole,
        QuantileLayout, SampleContext,
    },
    core::{
        options::GrowthMode,
        scope::{LayoutBuilder, ParamBlock, ParameterScope},
    },
};
use crate::optimization::trainer::{Grad, Theta};
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct Trend {
    growth: GrowthMode,
    changepoints: Vec<f64>,
    reg: f64,
    layout: QuantileLayout,
    block: ParamBlock,
}

impl Trend {
    pub fn new(
        growth: GrowthMode, n_changepoints: usize, changepoints_range: f64, reg: f64,
        n_quantiles: usize, shared: bool, scope: ParameterScope, layout: &mut LayoutBuilder,
    ) -> Self {
        let changepoints: Vec<f64> = match growth {
            GrowthMode::Linear => (1..=n_changepoints)
                .map(|i| changepoints_range * i as f64 / (n_changepoints + 1) as f64)
                .collect(),
            GrowthMode::Off => Vec::new(),
        };
        let per_quantile = match growth {
            GrowthMode::Linear => 2 + changepoints.len(),
            GrowthMode::Off => 1,
        };
        let qlayout = QuantileLayout::new(per_quantile, n_quantiles, shared);
        let block = layout.allocate(qlayout.slot_len(), scope);
        Self { growth, changepoints, reg, layout: qlayout, block }
    }

    /// Changepoint positions in normalized time.
    pub fn changepoints(&self) -> &[f64] {
        &self.changepoints
    }

    fn value(&self, theta: &Theta, start: usize, t: f64) -> f64 {
        match self.growth {
            GrowthMode::Off => theta[start],
            GrowthMode::Linear => {
                let mut v = theta[start] + theta[start + 1] * t;
                for (i, &c) in self.changepoints.iter().enumerate() {
                    v += theta[start + 2 + i] * (t - c).max(0.0);
                }
                v
            }
        }
    }

    /// Changepoint adjustment ranges of every slot and quantile slice.
    fn delta_ranges(&self) -> Vec<Range<usize>> {
        if self.changepoints.is_empty() {
            return Vec::new();
        }
        let n_slices = if self.layout.shared { 1 } else { self.layout.n_quantiles };
        slot_ranges(&self.block)
            .flat_map(|slot| {
                (0..n_slices).map(move |q| {
                    let start = slot.start + q * self.layout.per_quantile + 2;
                    start..start + self.changepoints.len()
                })
            })
            .collect()
    }
}

impl Component for Trend {
    fn name(&self) -> &str {
        "trend"
    }

    fn family(&self) -> ComponentFamily {
        ComponentFamily::Trend
    }

    fn role(&self) -> ComponentRole {
        ComponentRole::Trend
    }

    fn block(&self) -> &ParamBlock {
        &self.block
    }

    fn column(&self) -> String {
        "trend".to_string()
    }

    fn initialize(&self, theta: &mut Theta, _rng: &mut StdRng) {
        for i in self.block.full_range() {
            theta[i] = 0.0;
        }
    }

    fn forward(&self, theta: &Theta, ctx: &SampleContext<'_>) -> Array2<f64> {
        let slot = self.block.range_for(ctx.series());
        let mut out = Array2::<f64>::zeros((ctx.horizon, self.layout.n_quantiles));
        for (h, row) in ctx.rows().enumerate() {
            let t = ctx.encoded.t[row];
            for q in 0..self.layout.n_quantiles {
                out[[h, q]] = self.value(theta, slot.start + self.layout.offset(q), t);
            }
        }
        out
    }

    fn backward(
        &self, _theta: &Theta, ctx: &SampleContext<'_>, upstream: ArrayView2<'_, f64>,
        grad: &mut Grad,
    ) {
        let slot = self.block.range_for(ctx.series());
        for (h, row) in ctx.rows().enumerate() {
            let t = ctx.encoded.t[row];
            for q in 0..self.layout.n_quantiles {
                let g = upstream[[h, q]];
                if g == 0.0 {
                    continue;
                }
                let start = slot.start + self.layout.offset(q);
                grad[start] += g;
                if self.growth == GrowthMode::Linear {
                    grad[start + 1] += g * t;
                    for (i, &c) in self.changepoints.iter().enumerate() {
                        grad[start + 2 + i] += g * (t - c).max(0.0);
                    }
                }
            }
        }
    }

    fn penalty(&self, theta: &Theta) -> f64 {
        if self.reg == 0.0 {
            return 0.0;
        }
        l1_penalty(theta, &self.delta_ranges(), self.reg)
    }

    fn penalty_grad(&self, theta: &Theta, grad: &mut Grad) {
        if self.reg == 0.0 {
            return;
        }
        l1_penalty_grad(theta, &self.delta_ranges(), self.reg, grad);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecasting::core::features::EncodedSeries;
    use approx::assert_relative_eq;
    use chrono::NaiveDateTime;
    use ndarray::{Array1, Array2};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - Changepoint placement.
    // - Forward values with and without changepoints.
    // - Backward vs. manual derivative; L1 penalty on adjustments only.
    // -------------------------------------------------------------------------

    fn encoded(t: Vec<f64>) -> EncodedSeries {
        let n = t.len();
        EncodedSeries {
            series: 0,
            timestamps: vec![NaiveDateTime::default(); n],
            t: Array1::from(t),
            seasonal: Vec::new(),
            events: Vec::new(),
            future_regressors: Array2::zeros((n, 0)),
            lagged: Vec::new(),
            y: Array1::zeros(n),
            n_history: n,
        }
    }

    fn keys() -> Vec<String> {
        vec!["a".to_string()]
    }

    #[test]
    // Purpose
    // -------
    // Changepoints are evenly spaced strictly inside the allowed range.
    fn changepoints_are_evenly_spaced() {
        let mut layout = LayoutBuilder::new(&keys());

        let trend = Trend::new(
            GrowthMode::Linear, 3, 0.8, 0.0, 1, true, ParameterScope::Global, &mut layout,
        );

        for (got, expected) in trend.changepoints().iter().zip([0.2, 0.4, 0.6]) {
            assert_relative_eq!(*got, expected, epsilon = 1e-12);
        }
        assert_eq!(layout.total(), 5);
    }

    #[test]
    // Purpose
    // -------
    // Without changepoints the trend is an exact straight line, including
    // beyond the training span.
    //
    // Given
    // -----
    // - `m = 1`, `k = 2`; t = 0, 0.5, 1, 1.5.
    //
    // Expect
    // ------
    // - 1, 2, 3, 4.
    fn no_changepoints_is_linear() {
        let mut layout = LayoutBuilder::new(&keys());
        let trend = Trend::new(
            GrowthMode::Linear, 0, 0.8, 0.0, 1, true, ParameterScope::Global, &mut layout,
        );
        let theta = Array1::from(vec![1.0, 2.0]);
        let enc = encoded(vec![0.0, 0.5, 1.0, 1.5]);

        let out = trend.forward(&theta, &SampleContext { encoded: &enc, origin: 0, horizon: 4 });

        for (h, expected) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            assert_relative_eq!(out[[h, 0]], expected);
        }
    }

    #[test]
    // Purpose
    // -------
    // A changepoint bends the slope after its location only.
    //
    // Given
    // -----
    // - One changepoint at 0.5 (range 1.0), `m = 0`, `k = 1`, `δ = 2`.
    //
    // Expect
    // ------
    // - trend(0.25) = 0.25, trend(1.0) = 1 + 2·0.5 = 2.
    fn changepoint_bends_slope() {
        let mut layout = LayoutBuilder::new(&keys());
        let trend = Trend::new(
            GrowthMode::Linear, 1, 1.0, 0.0, 1, true, ParameterScope::Global, &mut layout,
        );
        let theta = Array1::from(vec![0.0, 1.0, 2.0]);
        let enc = encoded(vec![0.25, 1.0]);

        let out = trend.forward(&theta, &SampleContext { encoded: &enc, origin: 0, horizon: 2 });

        assert_relative_eq!(out[[0, 0]], 0.25);
        assert_relative_eq!(out[[1, 0]], 2.0);
    }

    #[test]
    // Purpose
    // -------
    // Backward accumulates `(1, t, relu(t − c))` per quantile slice and the
    // L1 penalty ignores `m` and `k`.
    fn backward_and_penalty() {
        let mut layout = LayoutBuilder::new(&keys());
        let trend = Trend::new(
            GrowthMode::Linear, 1, 1.0, 0.4, 2, false, ParameterScope::Global, &mut layout,
        );
        let theta = Array1::from(vec![5.0, 5.0, 1.0, 5.0, 5.0, -3.0]);
        let enc = encoded(vec![0.75]);
        let ctx = SampleContext { encoded: &enc, origin: 0, horizon: 1 };
        let upstream = ndarray::array![[1.0, 2.0]];

        let mut grad = Array1::<f64>::zeros(6);
        trend.backward(&theta, &ctx, upstream.view(), &mut grad);

        assert_eq!(grad, Array1::from(vec![1.0, 0.75, 0.25, 2.0, 1.5, 0.5]));
        assert_relative_eq!(trend.penalty(&theta), 0.4 * 2.0);
    }

    #[test]
    // Purpose
    // -------
    // Growth `Off` is a constant offset.
    fn growth_off_is_constant() {
        let mut layout = LayoutBuilder::new(&keys());
        let trend = Trend::new(
            GrowthMode::Off, 5, 0.8, 1.0, 1, true, ParameterScope::Global, &mut layout,
        );
        let theta = Array1::from(vec![0.7]);
        let enc = encoded(vec![0.0, 3.0]);

        let out = trend.forward(&theta, &SampleContext { encoded: &enc, origin: 0, horizon: 2 });

        assert_eq!(layout.total(), 1);
        assert_relative_eq!(out[[0, 0]], 0.7);
        assert_relative_eq!(out[[1, 0]], 0.7);
        assert_eq!(trend.penalty(&theta), 0.0);
    }
}
