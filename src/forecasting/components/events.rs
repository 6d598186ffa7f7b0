//! Event and holiday effects.
//!
//! One component per event name (user events and each expanded country
//! holiday alike). It holds one weight per window offset and quantile; the
//! contribution at a row is the sum of the weights of the offsets active
//! there. An optional strength adds `reg · mean(w²)`.
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
pub struct EventEffect {
    name: String,
    index: usize,
    mode: ComponentMode,
    reg: Option<f64>,
    layout: QuantileLayout,
    block: ParamBlock,
}

impl EventEffect {
    /// `index` is the position of the event's indicator block in
    /// `EncodedSeries::events`; `width` its number of window offsets.
    pub fn new(
        name: impl Into<String>, index: usize, width: usize, mode: ComponentMode, reg: Option<f64>,
        n_quantiles: usize, scope: ParameterScope, layout: &mut LayoutBuilder,
    ) -> Self {
        let qlayout = QuantileLayout::new(width, n_quantiles, false);
        let block = layout.allocate(qlayout.slot_len(), scope);
        Self { name: name.into(), index, mode, reg, layout: qlayout, block }
    }

    pub fn mode(&self) -> ComponentMode {
        self.mode
    }
}

impl Component for EventEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ComponentFamily {
        ComponentFamily::Event
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
        format!("event_{}", self.name)
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
            ctx.encoded.events[self.index].view(),
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
            ctx.encoded.events[self.index].view(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecasting::core::features::EncodedSeries;
    use approx::assert_relative_eq;
    use chrono::NaiveDateTime;
    use ndarray::{array, Array1, Array2};

    #[test]
    // Purpose
    // -------
    // Only active offsets contribute, per quantile, and each series reads its
    // own slot under a local scope.
    //
    // Given
    // -----
    // - Window width 2, two quantiles, two series (local scope).
    // - Series 1 weights: q0 = (1, 2), q1 = (3, 4); row active on offset 1.
    //
    // Expect
    // ------
    // - Outputs (2, 4) for series 1.
    fn active_offsets_use_series_slot() {
        let keys = vec!["a".to_string(), "b".to_string()];
        let mut layout = LayoutBuilder::new(&keys);
        let effect = EventEffect::new(
            "promo", 0, 2, ComponentMode::Additive, Some(0.5), 2, ParameterScope::Local,
            &mut layout,
        );
        let theta = Array1::from(vec![9.0, 9.0, 9.0, 9.0, 1.0, 2.0, 3.0, 4.0]);
        let enc = EncodedSeries {
            series: 1,
            timestamps: vec![NaiveDateTime::default()],
            t: Array1::zeros(1),
            seasonal: Vec::new(),
            events: vec![array![[0.0, 1.0]]],
            future_regressors: Array2::zeros((1, 0)),
            lagged: Vec::new(),
            y: Array1::zeros(1),
            n_history: 1,
        };

        let out = effect.forward(&theta, &SampleContext { encoded: &enc, origin: 0, horizon: 1 });

        assert_eq!(layout.total(), 8);
        assert_relative_eq!(out[[0, 0]], 2.0);
        assert_relative_eq!(out[[0, 1]], 4.0);
        assert_eq!(effect.column(), "event_promo");
        assert!(effect.penalty(&theta) > 0.0);
    }
}
