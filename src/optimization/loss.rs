//! Quantile (pinball) loss and its derivative.
//!
//! Purpose
//! -------
//! Provide the scalar training criterion used by every forecasting model in
//! this crate. For a residual `r = y − ŷ` and a quantile level `q ∈ (0, 1)`:
//!
//! ```text
//! ρ_q(r) = max(q · r, (q − 1) · r)
//! ```
//!
//! Minimizing `E[ρ_q(y − ŷ)]` over `ŷ` yields the `q`-quantile of `y`; `q = 0.5`
//! recovers (half) the absolute error.
//!
//! Conventions
//! -----------
//! - Derivatives are taken with respect to the **prediction** `ŷ`.
//! - At the kink (`r == 0`) the subgradient `1 − q` is used, which keeps the
//!   derivative piecewise constant and deterministic.
//! - The matrix helpers treat predictions as `(horizon × n_quantiles)` blocks,
//!   matching the layout produced by the forecasting composer.
use ndarray::{ArrayView1, ArrayView2};

/// Pinball loss `ρ_q(y − ŷ)` for a single observation.
pub fn pinball_loss(y: f64, yhat: f64, q: f64) -> f64 {
    let r = y - yhat;
    if r >= 0.0 { q * r } else { (q - 1.0) * r }
}

/// Derivative of [`pinball_loss`] with respect to `ŷ`.
///
/// Returns `−q` when the observation lies above the prediction and `1 − q`
/// otherwise.
pub fn pinball_grad(y: f64, yhat: f64, q: f64) -> f64 {
    if y - yhat > 0.0 { -q } else { 1.0 - q }
}

/// Summed pinball loss over a `(horizon × n_quantiles)` prediction block.
///
/// Parameters
/// ----------
/// - `targets`: true values, one per horizon step (length `horizon`).
/// - `preds`: predictions with shape `(horizon, quantiles.len())`.
/// - `quantiles`: quantile levels, one per column of `preds`.
///
/// Notes
/// -----
/// The caller divides by the element count; keeping the sum here lets batch
/// code accumulate across samples without repeated rescaling.
pub fn pinball_block_sum(
    targets: ArrayView1<'_, f64>, preds: ArrayView2<'_, f64>, quantiles: &[f64],
) -> f64 {
    let mut total = 0.0;
    for (h, &y) in targets.iter().enumerate() {
        for (qi, &q) in quantiles.iter().enumerate() {
            total += pinball_loss(y, preds[[h, qi]], q);
        }
    }
    total
}
