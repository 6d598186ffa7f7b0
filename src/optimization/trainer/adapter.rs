//! Adapter that exposes a model [`Objective`] as an `argmin` problem.
//!
//! The trainer works on minibatches, so the main entry point is
//! [`BatchAdapter::batch_cost_and_gradient`]. The full-data
//! `CostFunction`/`Gradient` implementations evaluate every training sample at
//! once; the solver uses them to score the initial guess, and they make the
//! adapter usable with stock argmin solvers.
//!
//! If the model does not provide an analytic gradient, the adapter falls back
//! to central finite differences of the batch cost, capturing any error raised
//! inside the difference closure.
use std::cell::RefCell;

use crate::optimization::{
    errors::OptError,
    trainer::{
        traits::Objective,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::{CostFunction, Error, Gradient};
use finitediff::FiniteDiff;

/// Bridges a model [`Objective`] and its data to argmin.
pub struct BatchAdapter<'a, F: Objective> {
    pub f: &'a F,
    pub data: &'a F::Data,
    all: Vec<usize>,
}

impl<'a, F: Objective> BatchAdapter<'a, F> {
    /// Construct a new adapter over a model and its training data.
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        let all = (0..f.n_samples(data)).collect();
        Self { f, data, all }
    }

    /// Number of training samples exposed by the model.
    pub fn n_samples(&self) -> usize {
        self.all.len()
    }

    /// Evaluate the mean loss on `batch`, rejecting non-finite values.
    ///
    /// # Errors
    /// - [`OptError::NonFiniteCost`] if the model returns NaN or ±∞.
    /// - Propagates any model error.
    pub fn batch_cost(&self, theta: &Theta, batch: &[usize]) -> Result<Cost, Error> {
        let value = self.f.value(theta, self.data, batch)?;
        if !value.is_finite() {
            return Err(OptError::NonFiniteCost { value }.into());
        }
        Ok(value)
    }

    /// Evaluate loss and gradient on `batch`.
    ///
    /// Behavior:
    /// - If the model implements a gradient, the fused `value_and_grad` is
    ///   used and both outputs are validated.
    /// - Otherwise the batch cost is finite-differenced with central
    ///   differences. Errors raised inside the difference closure are captured
    ///   and returned after the sweep.
    ///
    /// # Errors
    /// - [`OptError::NonFiniteCost`] / [`OptError::InvalidGradient`] when the
    ///   parameters have left the finite domain.
    /// - Propagates model errors other than `GradientNotImplemented`.
    pub fn batch_cost_and_gradient(
        &self, theta: &Theta, batch: &[usize],
    ) -> Result<(Cost, Grad), Error> {
        let dim = theta.len();
        match self.f.value_and_grad(theta, self.data, batch) {
            Ok((value, grad)) => {
                if !value.is_finite() {
                    return Err(OptError::NonFiniteCost { value }.into());
                }
                validate_grad(&grad, dim)?;
                Ok((value, grad))
            }
            Err(OptError::GradientNotImplemented) => {
                let value = self.batch_cost(theta, batch)?;
                let grad = self.finite_diff_gradient(theta, batch)?;
                Ok((value, grad))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn finite_diff_gradient(&self, theta: &Theta, batch: &[usize]) -> Result<Grad, Error> {
        let closure_err: RefCell<Option<Error>> = RefCell::new(None);
        let cost_func = |theta: &Theta| -> f64 {
            match self.batch_cost(theta, batch) {
                Ok(val) => val,
                Err(e) => {
                    let mut slot = closure_err.borrow_mut();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    f64::NAN
                }
            }
        };
        let fd_grad = theta.central_diff(&cost_func);
        if let Some(err) = closure_err.take() {
            return Err(err);
        }
        validate_grad(&fd_grad, theta.len())?;
        Ok(fd_grad)
    }
}

impl<'a, F: Objective> CostFunction for BatchAdapter<'a, F> {
    type Param = Theta;
    type Output = Cost;

    /// Mean loss over every training sample.
    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        self.batch_cost(theta, &self.all)
    }
}

impl<'a, F: Objective> Gradient for BatchAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    /// Gradient of the mean loss over every training sample.
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        self.batch_cost_and_gradient(theta, &self.all).map(|(_, g)| g)
    }
}
