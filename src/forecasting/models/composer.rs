//! Composer: combine component outputs into one forecast per quantile.
//!
//! `ŷ = T ⊙ (1 + Σ multiplicative) + Σ additive`, element-wise over
//! `(horizon × quantiles)`. The trend is the only term multiplicative
//! components scale; autoregression and lagged regressors are additive.
//!
//! Backward pass, for `g = ∂L/∂ŷ`:
//! - trend: `g ⊙ (1 + M)`
//! - multiplicative: `g ⊙ T`
//! - additive: `g`
use crate::forecasting::components::{Component, ComponentRole, SampleContext};
use crate::optimization::trainer::{Grad, Theta};
use ndarray::{Array2, ArrayView2};

/// Forward outputs of every component for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub trend: Array2<f64>,
    pub multiplicative: Array2<f64>,
    pub additive: Array2<f64>,
    /// Per-component outputs, in component order.
    pub parts: Vec<Array2<f64>>,
}

impl Composition {
    pub fn yhat(&self) -> Array2<f64> {
        &self.trend * &(&self.multiplicative + 1.0) + &self.additive
    }
}

pub fn compose(
    components: &[Box<dyn Component>], theta: &Theta, ctx: &SampleContext<'_>, n_quantiles: usize,
) -> Composition {
    let shape = (ctx.horizon, n_quantiles);
    let mut trend = Array2::<f64>::zeros(shape);
    let mut multiplicative = Array2::<f64>::zeros(shape);
    let mut additive = Array2::<f64>::zeros(shape);
    let mut parts = Vec::with_capacity(components.len());
    for component in components {
        let out = component.forward(theta, ctx);
        match component.role() {
            ComponentRole::Trend => trend += &out,
            ComponentRole::Multiplicative => multiplicative += &out,
            ComponentRole::Additive => additive += &out,
        }
        parts.push(out);
    }
    Composition { trend, multiplicative, additive, parts }
}

/// Route `upstream = ∂L/∂ŷ` to every component's backward pass.
pub fn backpropagate(
    components: &[Box<dyn Component>], theta: &Theta, ctx: &SampleContext<'_>,
    composition: &Composition, upstream: ArrayView2<'_, f64>, grad: &mut Grad,
) {
    let to_trend = &upstream * &(&composition.multiplicative + 1.0);
    let to_multiplicative = &upstream * &composition.trend;
    for component in components {
        let g = match component.role() {
            ComponentRole::Trend => to_trend.view(),
            ComponentRole::Multiplicative => to_multiplicative.view(),
            ComponentRole::Additive => upstream.view(),
        };
        component.backward(theta, ctx, g, grad);
    }
}
