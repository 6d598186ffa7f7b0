//! Model graph: the trainable objective behind `Forecaster::fit`.
//!
//! Purpose
//! -------
//! Bundle the ordered component list with the quantile levels and expose the
//! loss the trainer minimizes: mean pinball loss over every
//! `(sample, step, quantile)` of a minibatch plus the sum of component
//! penalties.
//!
//! Key behaviors
//! -------------
//! - Analytic gradients: pinball subgradient → composer → components.
//! - Optional rayon evaluation of the samples of one minibatch; per-sample
//!   gradients are reduced into one vector. Off by default because the
//!   reduction order of a parallel sum is not fixed.
//! - Held-out validation loss (no penalties) when the data has a split.
//!
//! Invariants & assumptions
//! ------------------------
//! - The parameter vector has exactly `n_params` entries.
//! - Targets of every training sample are observed rows, so the loss is
//!   finite for finite parameters.
use crate::forecasting::{
    components::{Component, SampleContext},
    core::dataset::{SampleRef, TrainingData},
    models::composer::{backpropagate, compose, Composition},
};
use crate::optimization::{
    errors::{OptError, OptResult},
    loss::{pinball_grad, pinball_loss},
    trainer::{Cost, Grad, Objective, Theta},
};
use ndarray::{s, Array1, Array2};
use rayon::prelude::*;

#[derive(Debug)]
pub struct ModelGraph {
    components: Vec<Box<dyn Component>>,
    quantiles: Vec<f64>,
    n_params: usize,
    parallel: bool,
}

impl ModelGraph {
    pub fn new(
        components: Vec<Box<dyn Component>>, quantiles: Vec<f64>, n_params: usize, parallel: bool,
    ) -> Self {
        Self { components, quantiles, n_params, parallel }
    }

    pub fn components(&self) -> &[Box<dyn Component>] {
        &self.components
    }

    pub fn n_params(&self) -> usize {
        self.n_params
    }

    pub fn n_quantiles(&self) -> usize {
        self.quantiles.len()
    }

    /// Forward pass for one context.
    pub fn compose(&self, theta: &Theta, ctx: &SampleContext<'_>) -> Composition {
        compose(&self.components, theta, ctx, self.quantiles.len())
    }

    fn context<'a>(data: &'a TrainingData, sample: SampleRef) -> SampleContext<'a> {
        SampleContext {
            encoded: &data.encoded[sample.series],
            origin: sample.origin,
            horizon: data.n_forecasts,
        }
    }

    /// Summed pinball loss of one sample.
    fn sample_loss(&self, theta: &Theta, data: &TrainingData, sample: SampleRef) -> f64 {
        let ctx = Self::context(data, sample);
        let yhat = self.compose(theta, &ctx).yhat();
        let targets = ctx.encoded.y.slice(s![ctx.rows()]);
        let mut total = 0.0;
        for (h, &y) in targets.iter().enumerate() {
            for (q, &level) in self.quantiles.iter().enumerate() {
                total += pinball_loss(y, yhat[[h, q]], level);
            }
        }
        total
    }

    /// Summed pinball loss and its gradient, both scaled by `weight`.
    fn sample_loss_and_grad(
        &self, theta: &Theta, data: &TrainingData, sample: SampleRef, weight: f64,
    ) -> (f64, Grad) {
        let ctx = Self::context(data, sample);
        let composition = self.compose(theta, &ctx);
        let yhat = composition.yhat();
        let targets = ctx.encoded.y.slice(s![ctx.rows()]);
        let mut upstream = Array2::<f64>::zeros(yhat.dim());
        let mut total = 0.0;
        for (h, &y) in targets.iter().enumerate() {
            for (q, &level) in self.quantiles.iter().enumerate() {
                total += pinball_loss(y, yhat[[h, q]], level);
                upstream[[h, q]] = weight * pinball_grad(y, yhat[[h, q]], level);
            }
        }
        let mut grad = Array1::<f64>::zeros(self.n_params);
        backpropagate(&self.components, theta, &ctx, &composition, upstream.view(), &mut grad);
        (weight * total, grad)
    }

    fn penalty(&self, theta: &Theta) -> f64 {
        self.components.iter().map(|c| c.penalty(theta)).sum()
    }

    fn normalizer(&self, data: &TrainingData, batch_len: usize) -> f64 {
        (batch_len * data.n_forecasts * self.quantiles.len()).max(1) as f64
    }

    fn mean_loss(&self, theta: &Theta, data: &TrainingData, samples: &[SampleRef]) -> f64 {
        let total: f64 = if self.parallel {
            samples.par_iter().map(|&s| self.sample_loss(theta, data, s)).sum()
        } else {
            samples.iter().map(|&s| self.sample_loss(theta, data, s)).sum()
        };
        total / self.normalizer(data, samples.len())
    }
}

impl Objective for ModelGraph {
    type Data = TrainingData;

    fn n_samples(&self, data: &TrainingData) -> usize {
        data.train.len()
    }

    fn check(&self, theta: &Theta, data: &TrainingData) -> OptResult<()> {
        if theta.len() != self.n_params {
            return Err(OptError::ThetaLengthMismatch {
                expected: self.n_params,
                actual: theta.len(),
            });
        }
        if data.train.is_empty() {
            return Err(OptError::EmptyTrainingSet);
        }
        Ok(())
    }

    fn value(&self, theta: &Theta, data: &TrainingData, batch: &[usize]) -> OptResult<Cost> {
        let samples: Vec<SampleRef> = batch.iter().map(|&i| data.train[i]).collect();
        Ok(self.mean_loss(theta, data, &samples) + self.penalty(theta))
    }

    fn grad(&self, theta: &Theta, data: &TrainingData, batch: &[usize]) -> OptResult<Grad> {
        self.value_and_grad(theta, data, batch).map(|(_, g)| g)
    }

    fn value_and_grad(
        &self, theta: &Theta, data: &TrainingData, batch: &[usize],
    ) -> OptResult<(Cost, Grad)> {
        let weight = 1.0 / self.normalizer(data, batch.len());
        let zero = || (0.0, Array1::<f64>::zeros(self.n_params));
        let (loss, mut grad) = if self.parallel {
            batch
                .par_iter()
                .map(|&i| self.sample_loss_and_grad(theta, data, data.train[i], weight))
                .reduce(zero, |(la, ga), (lb, gb)| (la + lb, ga + gb))
        } else {
            batch.iter().fold(zero(), |(la, ga), &i| {
                let (lb, gb) = self.sample_loss_and_grad(theta, data, data.train[i], weight);
                (la + lb, ga + gb)
            })
        };
        for component in &self.components {
            component.penalty_grad(theta, &mut grad);
        }
        Ok((loss + self.penalty(theta), grad))
    }

    fn validation_loss(&self, theta: &Theta, data: &TrainingData) -> OptResult<Option<Cost>> {
        if data.valid.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.mean_loss(theta, data, &data.valid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecasting::{
        components::Trend,
        core::{
            dataset::build_samples,
            features::EncodedSeries,
            options::GrowthMode,
            scope::{LayoutBuilder, ParameterScope},
        },
    };
    use approx::assert_relative_eq;
    use chrono::NaiveDateTime;
    use finitediff::FiniteDiff;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - Mean pinball loss of a constant model on a known series.
    // - Analytic gradient (with penalty) vs. central differences.
    // - Parallel and sequential evaluation agree.
    // -------------------------------------------------------------------------

    fn setup(parallel: bool) -> (ModelGraph, TrainingData) {
        let keys = vec!["a".to_string()];
        let mut layout = LayoutBuilder::new(&keys);
        let trend = Trend::new(
            GrowthMode::Linear, 2, 0.8, 0.5, 2, false, ParameterScope::Global, &mut layout,
        );
        let graph =
            ModelGraph::new(vec![Box::new(trend)], vec![0.1, 0.9], layout.total(), parallel);
        let n = 6;
        let enc = EncodedSeries {
            series: 0,
            timestamps: vec![NaiveDateTime::default(); n],
            t: Array1::linspace(0.0, 1.0, n),
            seasonal: Vec::new(),
            events: Vec::new(),
            future_regressors: Array2::zeros((n, 0)),
            lagged: Vec::new(),
            y: Array1::from(vec![0.0, 0.3, 0.1, 0.7, 0.4, 1.0]),
            n_history: n,
        };
        let data = build_samples(vec![enc], &keys, 0, 1, &[], 0.0).unwrap();
        (graph, data)
    }

    #[test]
    // Purpose
    // -------
    // A zero model's loss is the mean of `q·y` over samples and quantiles
    // (all residuals are non-negative).
    //
    // Given
    // -----
    // - y sums to 2.5 over 6 samples; quantiles 0.1 and 0.9.
    //
    // Expect
    // ------
    // - (0.1·2.5 + 0.9·2.5) / 12 = 2.5 / 12.
    fn zero_model_loss() {
        let (graph, data) = setup(false);
        let theta = Array1::<f64>::zeros(graph.n_params());
        let batch: Vec<usize> = (0..6).collect();

        let loss = graph.value(&theta, &data, &batch).unwrap();

        assert_relative_eq!(loss, 2.5 / 12.0, epsilon = 1e-12);
        assert_eq!(graph.validation_loss(&theta, &data).unwrap(), None);
    }

    #[test]
    // Purpose
    // -------
    // The analytic gradient (loss + L1 changepoint penalty) matches central
    // differences at a point away from kinks.
    fn gradient_matches_finite_differences() {
        let (graph, data) = setup(false);
        let theta = Array1::from(vec![0.05, 0.2, 0.3, -0.4, 1.5, -0.1, 0.2, 0.35]);
        let batch = vec![0, 2, 5];
        let f = |p: &Array1<f64>| graph.value(p, &data, &batch).unwrap();

        let (_, analytic) = graph.value_and_grad(&theta, &data, &batch).unwrap();
        let numeric = theta.central_diff(&f);

        for (a, b) in analytic.iter().zip(numeric.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    // Purpose
    // -------
    // Parallel evaluation matches the sequential result.
    fn parallel_matches_sequential() {
        let (seq, data) = setup(false);
        let (par, _) = setup(true);
        let theta = Array1::from(vec![0.1, 0.2, 0.0, 0.1, 0.4, 0.3, -0.2, 0.0]);
        let batch: Vec<usize> = (0..6).collect();

        let (ls, gs) = seq.value_and_grad(&theta, &data, &batch).unwrap();
        let (lp, gp) = par.value_and_grad(&theta, &data, &batch).unwrap();

        assert_relative_eq!(ls, lp, epsilon = 1e-12);
        for (a, b) in gs.iter().zip(gp.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}
