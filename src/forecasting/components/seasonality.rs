//! Fourier seasonality.
//!
//! One instance per configured period. The contribution is a linear
//! combination of the period's `2·order` Fourier columns; weights are
//! shrunk by `seasonality_reg · mean(w²)`. Order 0 has no weights and
//! contributes exactly zero.
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
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;

#[derive(Debug, Clone)]
pub struct Seasonality {
    name: String,
    index: usize,
    mode: ComponentMode,
    reg: f64,
    layout: QuantileLayout,
    block: ParamBlock,
}

impl Seasonality {
    /// `index` is the position of this period's matrix in
    /// `EncodedSeries::seasonal`.
    pub fn new(
        name: impl Into<String>, index: usize, order: usize, mode: ComponentMode, reg: f64,
        n_quantiles: usize, shared: bool, scope: ParameterScope, layout: &mut LayoutBuilder,
    ) -> Self {
        let qlayout = QuantileLayout::new(2 * order, n_quantiles, shared);
        let block = layout.allocate(qlayout.slot_len(), scope);
        Self { name: name.into(), index, mode, reg, layout: qlayout, block }
    }
}

impl Component for Seasonality {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ComponentFamily {
        ComponentFamily::Seasonality
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
        format!("season_{}", self.name)
    }

    fn initialize(&self, theta: &mut Theta, _rng: &mut StdRng) {
        for i in self.block.full_range() {
            theta[i] = 0.0;
        }
    }

    fn forward(&self, theta: &Theta, ctx: &SampleContext<'_>) -> Array2<f64> {
        linear_forward(
            theta,
            self.block.range_for(ctx.series()),
            self.layout,
            ctx.encoded.seasonal[self.index].view(),
            ctx.rows(),
        )
    }

    fn backward(
        &self, _theta: &Theta, ctx: &SampleContext<'_>, upstream: ArrayView2<'_, f64>,
        grad: &mut Grad,
    ) {
        linear_backward(
            self.block.range_for(ctx.series()),
            self.layout,
            ctx.encoded.seasonal[self.index].view(),
            ctx.rows(),
            upstream,
            grad,
        );
    }

    fn penalty(&self, theta: &Theta) -> f64 {
        if self.reg == 0.0 {
            return 0.0;
        }
        l2_penalty(theta, &slot_ranges(&self.block).collect::<Vec<_>>(), self.reg)
    }

    fn penalty_grad(&self, theta: &Theta, grad: &mut Grad) {
        l2_penalty_grad(theta, &slot_ranges(&self.block).collect::<Vec<_>>(), self.reg, grad);
    }
}
