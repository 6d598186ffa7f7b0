//! Component modules: the pluggable functions whose composition is the
//! forecast.
//!
//! Purpose
//! -------
//! Every additive or multiplicative term of the model implements
//! [`Component`]. A component owns a [`ParamBlock`] of the flat parameter
//! vector, maps one sample's encoded features to a `(horizon × quantiles)`
//! contribution, and accumulates its own gradient given the upstream
//! derivative handed down by the composer.
//!
//! Key behaviors
//! -------------
//! - [`Trend`]: piecewise-linear trend with sparse changepoint adjustments.
//! - [`Seasonality`]: linear combination of Fourier features of one period.
//! - [`EventEffect`]: one weight per event window offset.
//! - [`FutureRegressor`]: one weight per known-ahead regressor.
//! - [`AutoRegression`]: AR-Net over the series' own lags.
//! - [`LaggedRegressor`]: feed-forward network over a regressor's lags.
//!
//! Invariants & assumptions
//! ------------------------
//! - `forward` is infallible: all data conditions are checked while building
//!   samples. Lag windows of every sample lie fully inside the encoded rows.
//! - A component reads and writes only inside its own block, at the range
//!   its parameter store assigns to the sample's series.
//! - Quantile-specific parameter slices are laid out quantile-major inside a
//!   slot; see [`QuantileLayout`].
pub mod autoregression;
pub mod events;
pub mod future_regressors;
pub mod lagged_regressors;
pub mod mlp;
pub mod seasonality;
pub mod trend;

pub use self::autoregression::AutoRegression;
pub use self::events::EventEffect;
pub use self::future_regressors::FutureRegressor;
pub use self::lagged_regressors::LaggedRegressor;
pub use self::seasonality::Seasonality;
pub use self::trend::Trend;

use crate::forecasting::core::{features::EncodedSeries, scope::ParamBlock};
use crate::optimization::trainer::{Grad, Theta};
use ndarray::{s, Array2, ArrayView2};
use rand::rngs::StdRng;
use std::{fmt::Debug, ops::Range};

/// How a component enters the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentRole {
    Trend,
    Additive,
    Multiplicative,
}

/// Component family, used to group decomposition columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentFamily {
    Trend,
    Seasonality,
    Event,
    FutureRegressor,
    AutoRegression,
    LaggedRegressor,
}

/// One sample seen by a component: rows `origin .. origin + horizon` of an
/// encoded series are predicted; rows before `origin` are lag context.
#[derive(Debug, Clone, Copy)]
pub struct SampleContext<'a> {
    pub encoded: &'a EncodedSeries,
    pub origin: usize,
    pub horizon: usize,
}

impl SampleContext<'_> {
    pub fn rows(&self) -> Range<usize> {
        self.origin..self.origin + self.horizon
    }

    pub fn series(&self) -> usize {
        self.encoded.series
    }
}

/// Trainable term of the forecast.
pub trait Component: Send + Sync + Debug {
    fn name(&self) -> &str;
    fn family(&self) -> ComponentFamily;
    fn role(&self) -> ComponentRole;
    fn block(&self) -> &ParamBlock;

    /// Decomposition column name.
    fn column(&self) -> String;

    /// Write initial values into every slot of the block.
    fn initialize(&self, theta: &mut Theta, rng: &mut StdRng);

    /// `(horizon × n_quantiles)` contribution in normalized units.
    fn forward(&self, theta: &Theta, ctx: &SampleContext<'_>) -> Array2<f64>;

    /// Accumulate `∂L/∂θ` given `upstream = ∂L/∂forward`.
    fn backward(
        &self, theta: &Theta, ctx: &SampleContext<'_>, upstream: ArrayView2<'_, f64>,
        grad: &mut Grad,
    );

    fn penalty(&self, _theta: &Theta) -> f64 {
        0.0
    }

    fn penalty_grad(&self, _theta: &Theta, _grad: &mut Grad) {}

    /// Contribution for a window whose every entry is `baseline`, for
    /// components that have one. `baseline` is the normalized image of a raw
    /// zero, so the result is the contribution of an all-zero raw window.
    fn intercept(&self, _theta: &Theta, _series: usize, _baseline: f64) -> Option<Array2<f64>> {
        None
    }
}

/// Placement of per-quantile parameter slices inside one slot.
///
/// With `shared = true` all quantiles read the same slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantileLayout {
    pub per_quantile: usize,
    pub n_quantiles: usize,
    pub shared: bool,
}

impl QuantileLayout {
    pub fn new(per_quantile: usize, n_quantiles: usize, shared: bool) -> Self {
        Self { per_quantile, n_quantiles, shared }
    }

    pub fn slot_len(&self) -> usize {
        if self.shared { self.per_quantile } else { self.per_quantile * self.n_quantiles }
    }

    /// Offset of quantile `q`'s slice relative to the slot start.
    pub fn offset(&self, q: usize) -> usize {
        if self.shared { 0 } else { q * self.per_quantile }
    }
}

/// `out[h, q] = Σ_f x[row_h, f] · w_q[f]` for a linear component.
pub(crate) fn linear_forward(
    theta: &Theta, slot: Range<usize>, layout: QuantileLayout, x: ArrayView2<'_, f64>,
    rows: Range<usize>,
) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((rows.len(), layout.n_quantiles));
    if layout.per_quantile == 0 {
        return out;
    }
    for (h, row) in rows.enumerate() {
        let features = x.row(row);
        for q in 0..layout.n_quantiles {
            let start = slot.start + layout.offset(q);
            let w = theta.slice(s![start..start + layout.per_quantile]);
            out[[h, q]] = features.dot(&w);
        }
    }
    out
}

/// Gradient of [`linear_forward`].
pub(crate) fn linear_backward(
    slot: Range<usize>, layout: QuantileLayout, x: ArrayView2<'_, f64>, rows: Range<usize>,
    upstream: ArrayView2<'_, f64>, grad: &mut Grad,
) {
    if layout.per_quantile == 0 {
        return;
    }
    for (h, row) in rows.enumerate() {
        let features = x.row(row);
        for q in 0..layout.n_quantiles {
            let g = upstream[[h, q]];
            if g == 0.0 {
                continue;
            }
            let start = slot.start + layout.offset(q);
            grad.slice_mut(s![start..start + layout.per_quantile]).scaled_add(g, &features);
        }
    }
}

/// `strength · mean(w²)` over `indices`.
pub(crate) fn l2_penalty(theta: &Theta, indices: &[Range<usize>], strength: f64) -> f64 {
    let (sum, count) = fold_params(theta, indices, |w| w * w);
    if count == 0 { 0.0 } else { strength * sum / count as f64 }
}

pub(crate) fn l2_penalty_grad(
    theta: &Theta, indices: &[Range<usize>], strength: f64, grad: &mut Grad,
) {
    let count: usize = indices.iter().map(|r| r.len()).sum();
    if count == 0 || strength == 0.0 {
        return;
    }
    let scale = 2.0 * strength / count as f64;
    for range in indices {
        for i in range.clone() {
            grad[i] += scale * theta[i];
        }
    }
}

/// `strength · mean(|w|)` over `indices`.
pub(crate) fn l1_penalty(theta: &Theta, indices: &[Range<usize>], strength: f64) -> f64 {
    let (sum, count) = fold_params(theta, indices, f64::abs);
    if count == 0 { 0.0 } else { strength * sum / count as f64 }
}

pub(crate) fn l1_penalty_grad(
    theta: &Theta, indices: &[Range<usize>], strength: f64, grad: &mut Grad,
) {
    let count: usize = indices.iter().map(|r| r.len()).sum();
    if count == 0 || strength == 0.0 {
        return;
    }
    let scale = strength / count as f64;
    for range in indices {
        for i in range.clone() {
            let w = theta[i];
            if w != 0.0 {
                grad[i] += scale * w.signum();
            }
        }
    }
}

fn fold_params(theta: &Theta, indices: &[Range<usize>], f: impl Fn(f64) -> f64) -> (f64, usize) {
    indices.iter().fold((0.0, 0), |(sum, count), range| {
        let part: f64 = range.clone().map(|i| f(theta[i])).sum();
        (sum + part, count + range.len())
    })
}

/// Parameter ranges of the whole block, one per slot.
pub(crate) fn slot_ranges(block: &ParamBlock) -> impl Iterator<Item = Range<usize>> + '_ {
    (0..block.n_slots()).map(move |slot| block.slot_range(slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecasting::core::scope::{LayoutBuilder, ParameterScope};
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - Quantile slice offsets (shared vs. per quantile).
    // - Linear forward/backward helpers.
    // - Penalty helpers and their gradients.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Shared layouts collapse every quantile onto one slice.
    fn quantile_layout_offsets() {
        let shared = QuantileLayout::new(4, 3, true);
        let split = QuantileLayout::new(4, 3, false);

        assert_eq!(shared.slot_len(), 4);
        assert_eq!(shared.offset(2), 0);
        assert_eq!(split.slot_len(), 12);
        assert_eq!(split.offset(2), 8);
    }

    #[test]
    // Purpose
    // -------
    // The linear helper applies each quantile's weights and its backward pass
    // accumulates `upstream · features` per slice.
    //
    // Given
    // -----
    // - Two features, two quantiles, weights q0 = (1, 2), q1 = (−1, 0).
    // - Row (3, 4).
    //
    // Expect
    // ------
    // - Outputs 11 and −3; grads (3g0, 4g0, 3g1, 4g1).
    fn linear_helpers() {
        let layout = QuantileLayout::new(2, 2, false);
        let theta: Array1<f64> = array![1.0, 2.0, -1.0, 0.0];
        let x = array![[0.0, 0.0], [3.0, 4.0]];

        let out = linear_forward(&theta, 0..4, layout, x.view(), 1..2);
        let mut grad = Array1::<f64>::zeros(4);
        linear_backward(0..4, layout, x.view(), 1..2, array![[1.0, 0.5]].view(), &mut grad);

        assert_relative_eq!(out[[0, 0]], 11.0);
        assert_relative_eq!(out[[0, 1]], -3.0);
        assert_eq!(grad, array![3.0, 4.0, 1.5, 2.0]);
    }

    #[test]
    // Purpose
    // -------
    // Penalties average over all covered parameters.
    fn penalties_average_over_ranges() {
        let theta: Array1<f64> = array![1.0, -2.0, 3.0, 0.0];
        let ranges = [0..2, 3..4];

        let l1 = l1_penalty(&theta, &ranges, 3.0);
        let l2 = l2_penalty(&theta, &ranges, 3.0);
        let mut g = Array1::<f64>::zeros(4);
        l1_penalty_grad(&theta, &ranges, 3.0, &mut g);

        assert_relative_eq!(l1, 3.0);
        assert_relative_eq!(l2, 5.0);
        assert_eq!(g, array![1.0, -1.0, 0.0, 0.0]);
    }

    #[test]
    // Purpose
    // -------
    // Slot ranges enumerate every slot of a local block.
    fn slot_ranges_cover_local_block() {
        let keys = vec!["a".to_string(), "b".to_string()];
        let mut layout = LayoutBuilder::new(&keys);
        let block = layout.allocate(3, ParameterScope::Local);

        let ranges: Vec<_> = slot_ranges(&block).collect();

        assert_eq!(ranges, vec![0..3, 3..6]);
    }
}
