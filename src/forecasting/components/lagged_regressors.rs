//! Lagged regressors: signals known only up to the forecast origin.
//!
//! Key behaviors
//! -------------
//! - Input: the `n_lags` normalized regressor values before the origin. The
//!   forecast horizon itself is never read, so future values need not exist.
//! - A feed-forward network with an output bias maps the window to one value
//!   per forecast step and quantile. [`Component::intercept`] is the output
//!   for a window of raw zeros, i.e. every entry at the normalized image of
//!   zero. With `NormalizeMode::Off` that is the all-zero input.
//! - Optional `reg · mean|W₁|` on the first layer.
//!
//! Invariants & assumptions
//! ------------------------
//! - Sample construction has already verified that the window holds no
//!   missing values.
use crate::forecasting::{
    components::{
        autoregression::{flatten, unflatten},
        l1_penalty, l1_penalty_grad,
        mlp::Mlp,
        slot_ranges, Component, ComponentFamily, ComponentRole, SampleContext,
    },
    core::scope::{LayoutBuilder, ParamBlock, ParameterScope},
};
use crate::optimization::trainer::{Grad, Theta};
use ndarray::{s, Array2, ArrayView2};
use rand::rngs::StdRng;
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct LaggedRegressor {
    name: String,
    index: usize,
    n_lags: usize,
    n_forecasts: usize,
    n_quantiles: usize,
    reg: Option<f64>,
    mlp: Mlp,
    block: ParamBlock,
}

impl LaggedRegressor {
    /// `index` is the regressor's position in `EncodedSeries::lagged`.
    pub fn new(
        name: impl Into<String>, index: usize, n_lags: usize, hidden_layers: &[usize],
        n_forecasts: usize, n_quantiles: usize, reg: Option<f64>, scope: ParameterScope,
        layout: &mut LayoutBuilder,
    ) -> Self {
        let mlp = Mlp::new(n_lags, hidden_layers, n_forecasts * n_quantiles, true);
        let block = layout.allocate(mlp.n_params(), scope);
        Self { name: name.into(), index, n_lags, n_forecasts, n_quantiles, reg, mlp, block }
    }

    pub fn n_lags(&self) -> usize {
        self.n_lags
    }

    fn window(&self, ctx: &SampleContext<'_>) -> Vec<f64> {
        ctx.encoded.lagged[self.index].slice(s![ctx.origin - self.n_lags..ctx.origin]).to_vec()
    }

    fn first_layers(&self) -> Vec<Range<usize>> {
        let len = self.mlp.first_layer_len();
        slot_ranges(&self.block).map(|r| r.start..r.start + len).collect()
    }
}

impl Component for LaggedRegressor {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ComponentFamily {
        ComponentFamily::LaggedRegressor
    }

    fn role(&self) -> ComponentRole {
        ComponentRole::Additive
    }

    fn block(&self) -> &ParamBlock {
        &self.block
    }

    fn column(&self) -> String {
        format!("lagged_regressor_{}", self.name)
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
        match self.reg {
            Some(reg) => l1_penalty(theta, &self.first_layers(), reg),
            None => 0.0,
        }
    }

    fn penalty_grad(&self, theta: &Theta, grad: &mut Grad) {
        if let Some(reg) = self.reg {
            l1_penalty_grad(theta, &self.first_layers(), reg, grad);
        }
    }

    fn intercept(&self, theta: &Theta, series: usize, baseline: f64) -> Option<Array2<f64>> {
        let params = theta.slice(s![self.block.range_for(series)]);
        let tape = self.mlp.forward(params, &vec![baseline; self.n_lags]);
        Some(unflatten(tape.output(), self.n_forecasts, self.n_quantiles, self.n_forecasts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecasting::core::features::EncodedSeries;
    use approx::assert_relative_eq;
    use chrono::NaiveDateTime;
    use ndarray::{Array1, Array2};
    use rand::SeedableRng;

    fn encoded(lagged: Vec<f64>) -> EncodedSeries {
        let n = lagged.len();
        EncodedSeries {
            series: 0,
            timestamps: vec![NaiveDateTime::default(); n],
            t: Array1::zeros(n),
            seasonal: Vec::new(),
            events: Vec::new(),
            future_regressors: Array2::zeros((n, 0)),
            lagged: vec![Array1::from(lagged)],
            y: Array1::zeros(n),
            n_history: n,
        }
    }

    #[test]
    // Purpose
    // -------
    // An all-zero lookback window yields exactly the intercept, and a
    // non-zero window moves away from it.
    //
    // Given
    // -----
    // - 3 lags, one hidden layer of 4, two steps, randomly initialized with a
    //   non-zero output bias.
    //
    // Expect
    // ------
    // - Forward on zeros equals `intercept`; the future rows are never read
    //   (they are NaN here).
    fn zero_window_equals_intercept() {
        let keys = vec!["a".to_string()];
        let mut layout = LayoutBuilder::new(&keys);
        let lagged =
            LaggedRegressor::new("x", 0, 3, &[4], 2, 1, None, ParameterScope::Global, &mut layout);
        let mut theta = Array1::<f64>::zeros(layout.total());
        lagged.initialize(&mut theta, &mut StdRng::seed_from_u64(11));
        let n = theta.len();
        theta[n - 1] = 0.4;
        theta[n - 2] = -0.3;
        let zeros = encoded(vec![0.0, 0.0, 0.0, f64::NAN, f64::NAN]);
        let ones = encoded(vec![1.0, 2.0, 3.0, f64::NAN, f64::NAN]);

        let at_zero =
            lagged.forward(&theta, &SampleContext { encoded: &zeros, origin: 3, horizon: 2 });
        let at_ones =
            lagged.forward(&theta, &SampleContext { encoded: &ones, origin: 3, horizon: 2 });
        let intercept = lagged.intercept(&theta, 0, 0.0).unwrap();

        assert_relative_eq!(at_zero[[0, 0]], -0.3, epsilon = 1e-12);
        assert_relative_eq!(at_zero[[1, 0]], 0.4, epsilon = 1e-12);
        assert_eq!(at_zero, intercept);
        assert!(at_ones.iter().all(|v| v.is_finite()));
        assert_eq!(lagged.column(), "lagged_regressor_x");
    }

    #[test]
    // Purpose
    // -------
    // The intercept follows the baseline: a window holding the normalized
    // image of a raw zero reproduces `intercept(.., baseline)` exactly.
    //
    // Given
    // -----
    // - The regressor map of a soft-normalized column, where a raw zero
    //   lands at -0.45.
    //
    // Expect
    // ------
    // - Forward on a constant -0.45 window equals the intercept at -0.45.
    fn intercept_uses_normalized_zero() {
        let keys = vec!["a".to_string()];
        let mut layout = LayoutBuilder::new(&keys);
        let lagged =
            LaggedRegressor::new("x", 0, 3, &[4], 2, 1, None, ParameterScope::Global, &mut layout);
        let mut theta = Array1::<f64>::zeros(layout.total());
        lagged.initialize(&mut theta, &mut StdRng::seed_from_u64(5));
        let baseline = -0.45;
        let window = encoded(vec![baseline, baseline, baseline, f64::NAN, f64::NAN]);

        let at_baseline =
            lagged.forward(&theta, &SampleContext { encoded: &window, origin: 3, horizon: 2 });
        let intercept = lagged.intercept(&theta, 0, baseline).unwrap();

        for (a, b) in at_baseline.iter().zip(intercept.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}
