//! AR-Net: autoregression over the series' own recent values.
//!
//! Purpose
//! -------
//! Map the `n_lags` observed (normalized) values before a forecast origin to
//! one contribution per forecast step and quantile through a small
//! feed-forward network.
//!
//! Key behaviors
//! -------------
//! - Inputs are always observed history rows `origin − n_lags .. origin`;
//!   the network is a pure function of that window and never sees its own
//!   earlier outputs.
//! - Output layer has `n_forecasts · n_quantiles` units and no bias, so an
//!   all-zero window contributes zero.
//! - `ar_reg · mean|W₁|` (L1 on the first layer) favours sparse lags.
use crate::forecasting::{
    components::{
        l1_penalty, l1_penalty_grad, mlp::Mlp, slot_ranges, Component, ComponentFamily,
        ComponentRole, SampleContext,
    },
    core::scope::{LayoutBuilder, ParamBlock, ParameterScope},
};
use crate::optimization::trainer::{Grad, Theta};
use ndarray::{s, Array2, ArrayView2};
use rand::rngs::StdRng;
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct AutoRegression {
    n_lags: usize,
    n_forecasts: usize,
    n_quantiles: usize,
    reg: f64,
    mlp: Mlp,
    block: ParamBlock,
}

impl AutoRegression {
    pub fn new(
        n_lags: usize, hidden_layers: &[usize], n_forecasts: usize, n_quantiles: usize, reg: f64,
        scope: ParameterScope, layout: &mut LayoutBuilder,
    ) -> Self {
        let mlp = Mlp::new(n_lags, hidden_layers, n_forecasts * n_quantiles, false);
        let block = layout.allocate(mlp.n_params(), scope);
        Self { n_lags, n_forecasts, n_quantiles, reg, mlp, block }
    }

    pub fn n_lags(&self) -> usize {
        self.n_lags
    }

    fn window(&self, ctx: &SampleContext<'_>) -> Vec<f64> {
        ctx.encoded.y.slice(s![ctx.origin - self.n_lags..ctx.origin]).to_vec()
    }

    fn first_layers(&self) -> Vec<Range<usize>> {
        let len = self.mlp.first_layer_len();
        slot_ranges(&self.block).map(|r| r.start..r.start + len).collect()
    }
}

impl Component for AutoRegression {
    fn name(&self) -> &str {
        "ar"
    }

    fn family(&self) -> ComponentFamily {
        ComponentFamily::AutoRegression
    }

    fn role(&self) -> ComponentRole {
        ComponentRole::Additive
    }

    fn block(&self) -> &ParamBlock {
        &self.block
    }

    fn column(&self) -> String {
        "ar".to_string()
    }

    fn initialize(&self, theta: &mut Theta, rng: &mut StdRng) {
        for slot in slot_ranges(&self.block) {
            self.mlp.initialize(theta.slice_mut(s![slot]), rng);
        }
    }

    fn forward(&self, theta: &Theta, ctx: &SampleContext<'_>) -> Array2<f64> {
        let params = theta.slice(s![self.block.range_for(ctx.series())]);
        let tape = self.mlp.forward(params, &self.window(ctx));
        unflatten(tape.output(), ctx.horizon.min(self.n_forecasts), self.n_quantiles, ctx.horizon)
    }

    fn backward(
        &self, theta: &Theta, ctx: &SampleContext<'_>, upstream: ArrayView2<'_, f64>,
        grad: &mut Grad,
    ) {
        let range = self.block.range_for(ctx.series());
        let params = theta.slice(s![range.clone()]);
        let tape = self.mlp.forward(params, &self.window(ctx));
        let up = flatten(upstream, self.n_forecasts, self.n_quantiles);
        self.mlp.backward(params, &tape, &up, grad.slice_mut(s![range]));
    }

    fn penalty(&self, theta: &Theta) -> f64 {
        if self.reg == 0.0 {
            return 0.0;
        }
        l1_penalty(theta, &self.first_layers(), self.reg)
    }

    fn penalty_grad(&self, theta: &Theta, grad: &mut Grad) {
        l1_penalty_grad(theta, &self.first_layers(), self.reg, grad);
    }
}

/// `(rows × n_quantiles)` view of a step-major network output; rows past
/// `used` stay zero.
pub(crate) fn unflatten(
    output: &[f64], used: usize, n_quantiles: usize, rows: usize,
) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((rows, n_quantiles));
    for h in 0..used {
        for q in 0..n_quantiles {
            out[[h, q]] = output[h * n_quantiles + q];
        }
    }
    out
}

/// Step-major gradient vector for a `(rows × n_quantiles)` upstream,
/// truncated or zero-padded to `n_forecasts` steps.
pub(crate) fn flatten(
    upstream: ArrayView2<'_, f64>, n_forecasts: usize, n_quantiles: usize,
) -> Vec<f64> {
    let mut up = vec![0.0; n_forecasts * n_quantiles];
    for h in 0..upstream.nrows().min(n_forecasts) {
        for q in 0..n_quantiles {
            up[h * n_quantiles + q] = upstream[[h, q]];
        }
    }
    up
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecasting::core::features::EncodedSeries;
    use approx::assert_relative_eq;
    use chrono::NaiveDateTime;
    use finitediff::FiniteDiff;
    use ndarray::{array, Array1, Array2};
    use rand::SeedableRng;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - Linear AR reads exactly the lag window before the origin.
    // - Backward through a hidden layer vs. central differences.
    // -------------------------------------------------------------------------

    fn encoded(y: Vec<f64>) -> EncodedSeries {
        let n = y.len();
        EncodedSeries {
            series: 0,
            timestamps: vec![NaiveDateTime::default(); n],
            t: Array1::zeros(n),
            seasonal: Vec::new(),
            events: Vec::new(),
            future_regressors: Array2::zeros((n, 0)),
            lagged: Vec::new(),
            y: Array1::from(y),
            n_history: n,
        }
    }

    #[test]
    // Purpose
    // -------
    // A linear AR(2) with one step computes `w₁·y[o−2] + w₂·y[o−1]`.
    //
    // Given
    // -----
    // - y = (1, 2, 3, 4), origin 3, weights (0.5, 0.25).
    //
    // Expect
    // ------
    // - 0.5·2 + 0.25·3 = 1.75.
    fn linear_ar_reads_lag_window() {
        let keys = vec!["a".to_string()];
        let mut layout = LayoutBuilder::new(&keys);
        let ar = AutoRegression::new(2, &[], 1, 1, 0.0, ParameterScope::Global, &mut layout);
        let theta = array![0.5, 0.25];
        let enc = encoded(vec![1.0, 2.0, 3.0, 4.0]);

        let out = ar.forward(&theta, &SampleContext { encoded: &enc, origin: 3, horizon: 1 });

        assert_eq!(layout.total(), 2);
        assert_relative_eq!(out[[0, 0]], 1.75);
    }

    #[test]
    // Purpose
    // -------
    // Backward matches central differences of `Σ upstream ⊙ forward`.
    fn backward_matches_finite_differences() {
        let keys = vec!["a".to_string()];
        let mut layout = LayoutBuilder::new(&keys);
        let ar = AutoRegression::new(3, &[4], 2, 2, 0.0, ParameterScope::Global, &mut layout);
        let mut theta = Array1::<f64>::zeros(layout.total());
        ar.initialize(&mut theta, &mut StdRng::seed_from_u64(3));
        let enc = encoded(vec![0.2, -0.4, 0.9, 0.1, 0.5]);
        let ctx = SampleContext { encoded: &enc, origin: 3, horizon: 2 };
        let upstream = array![[0.3, -0.8], [1.1, 0.4]];
        let loss = |p: &Array1<f64>| (&ar.forward(p, &ctx) * &upstream).sum();

        let mut grad = Array1::<f64>::zeros(layout.total());
        ar.backward(&theta, &ctx, upstream.view(), &mut grad);
        let numeric = theta.central_diff(&loss);

        for (a, n) in grad.iter().zip(numeric.iter()) {
            assert_relative_eq!(*a, *n, epsilon = 1e-5);
        }
    }
}
