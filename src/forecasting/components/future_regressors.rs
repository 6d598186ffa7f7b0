//! Future-known regressors.
//!
//! One weight per quantile; the contribution is `w_q · x(row)` with `x` the
//! normalized regressor value at the predicted row. Values must exist for
//! every encoded row, which the encoder enforces.
use crate::forecasting::{
    components::{
        l2_penalty, l2_penalty_grad, linear_backward, linear_forward, slot_ranges, Component,
        ComponentFamily, ComponentRole, QuantileLayout, SampleContext,
    },
    core::{
        options::ComponentMode,
        scope::{LayoutBuilder, ParamBlock, ParameterScope},
    },
};
use crate::optimization::trainer::{Grad, Theta};
use ndarray::{s, Array2, ArrayView2};
use rand::rngs::StdRng;

#[derive(Debug, Clone)]
pub struct FutureRegressor {
    name: String,
    column: usize,
    mode: ComponentMode,
    reg: Option<f64>,
    layout: QuantileLayout,
    block: ParamBlock,
}

impl FutureRegressor {
    /// `column` is the regressor's column in
    /// `EncodedSeries::future_regressors`.
    pub fn new(
        name: impl Into<String>, column: usize, mode: ComponentMode, reg: Option<f64>,
        n_quantiles: usize, scope: ParameterScope, layout: &mut LayoutBuilder,
    ) -> Self {
        let qlayout = QuantileLayout::new(1, n_quantiles, false);
        let block = layout.allocate(qlayout.slot_len(), scope);
        Self { name: name.into(), column, mode, reg, layout: qlayout, block }
    }

    fn features<'a>(&self, ctx: &SampleContext<'a>) -> ArrayView2<'a, f64> {
        ctx.encoded.future_regressors.slice(s![.., self.column..self.column + 1])
    }
}

impl Component for FutureRegressor {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ComponentFamily {
        ComponentFamily::FutureRegressor
    }

    fn role(&self) -> ComponentRole {
        match self.mode {
            ComponentMode::Additive => ComponentRole::Additive,
            ComponentMode::Multiplicative => ComponentRole::Multiplicative,
        }
    }

    fn block(&self) -> &ParamBlock {
        &self.block
    }

    fn column(&self) -> String {
        format!("future_regressor_{}", self.name)
    }

    fn initialize(&self, theta: &mut Theta, _rng: &mut StdRng) {
        for i in self.block.full_range() {
            theta[i] = 0.0;
        }
    }

    fn forward(&self, theta: &Theta, ctx: &SampleContext<'_>) -> Array2<f64> {
        let range = self.block.range_for(ctx.series());
        linear_forward(theta, range, self.layout, self.features(ctx), ctx.rows())
    }

    fn backward(
        &self, _theta: &Theta, ctx: &SampleContext<'_>, upstream: ArrayView2<'_, f64>,
        grad: &mut Grad,
    ) {
        linear_backward(
            self.block.range_for(ctx.series()),
            self.layout,
            self.features(ctx),
            ctx.rows(),
            upstream,
            grad,
        );
    }

    fn penalty(&self, theta: &Theta) -> f64 {
        match self.reg {
            Some(reg) => l2_penalty(theta, &slot_ranges(&self.block).collect::<Vec<_>>(), reg),
            None => 0.0,
        }
    }

    fn penalty_grad(&self, theta: &Theta, grad: &mut Grad) {
        if let Some(reg) = self.reg {
            l2_penalty_grad(theta, &slot_ranges(&self.block).collect::<Vec<_>>(), reg, grad);
        }
    }
}
