//! AdamW minibatch solver implemented as an argmin [`Solver`].
//!
//! Purpose
//! -------
//! Drive stochastic first-order training inside argmin's `Executor` so that
//! iteration limits, best-parameter tracking, observers and termination
//! reporting come from the same machinery as the rest of the crate.
//!
//! Key behaviors
//! -------------
//! - One argmin iteration is one **epoch**: the sample order is reshuffled
//!   with a seeded RNG, then every minibatch triggers one AdamW update with the
//!   learning rate given by the [`OneCycle`] schedule.
//! - After each epoch the monitored loss (validation if available, otherwise
//!   the mean training loss of the epoch) is written to the state's cost, so
//!   argmin's best-parameter tracking keeps the best epoch.
//! - Early stopping is evaluated in [`Solver::terminate`] and reported as
//!   `SolverConverged`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Epochs are strictly sequential; a minibatch update completes before the
//!   next minibatch reads the parameters.
//! - Any non-finite loss or gradient aborts the run with
//!   [`OptError::TrainingDiverged`], carrying the epoch index and the last
//!   finite epoch loss. Parameters are never updated with non-finite values.
use crate::optimization::{
    errors::OptError,
    trainer::{
        adapter::BatchAdapter,
        schedule::OneCycle,
        traits::{EarlyStopping, EpochRecord, Objective, TrainingPhase},
        types::{Grad, Theta, TrainState},
    },
};
use argmin::core::{
    CostFunction, Error, Problem, Solver, State, TerminationReason, TerminationStatus, KV,
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// AdamW moment estimates and hyper-parameters.
#[derive(Debug, Clone)]
struct AdamW {
    beta1: f64,
    beta2: f64,
    eps: f64,
    weight_decay: f64,
    m: Grad,
    v: Grad,
    t: i32,
}

impl AdamW {
    fn new(dim: usize, betas: (f64, f64), eps: f64, weight_decay: f64) -> Self {
        Self {
            beta1: betas.0,
            beta2: betas.1,
            eps,
            weight_decay,
            m: Grad::zeros(dim),
            v: Grad::zeros(dim),
            t: 0,
        }
    }

    /// One decoupled-weight-decay Adam step, in place.
    fn step(&mut self, theta: &mut Theta, grad: &Grad, lr: f64) {
        self.t += 1;
        let bc1 = 1.0 - self.beta1.powi(self.t);
        let bc2 = 1.0 - self.beta2.powi(self.t);
        for i in 0..theta.len() {
            let g = grad[i];
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * g;
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * g * g;
            let m_hat = self.m[i] / bc1;
            let v_hat = self.v[i] / bc2;
            theta[i] -= lr * (m_hat / (v_hat.sqrt() + self.eps) + self.weight_decay * theta[i]);
        }
    }
}

/// Minibatch AdamW trainer with a one-cycle schedule and early stopping.
#[derive(Debug, Clone)]
pub struct MinibatchSolver {
    optimizer: AdamW,
    schedule: OneCycle,
    batch_size: usize,
    order: Vec<usize>,
    rng: StdRng,
    early_stopping: Option<EarlyStopping>,
    step: usize,
    epoch: usize,
    best_monitored: f64,
    stalled_epochs: usize,
    last_finite_loss: Option<f64>,
    phase: TrainingPhase,
    history: Vec<EpochRecord>,
}

impl MinibatchSolver {
    /// Construct a solver for `n_samples` samples and `dim` parameters.
    ///
    /// Parameters
    /// ----------
    /// - `schedule`: step-wise learning rates; its step budget should equal
    ///   `epochs · ceil(n_samples / batch_size)`.
    /// - `seed`: seeds the per-epoch shuffling RNG.
    pub fn new(
        dim: usize, n_samples: usize, batch_size: usize, schedule: OneCycle, betas: (f64, f64),
        eps: f64, weight_decay: f64, early_stopping: Option<EarlyStopping>, seed: u64,
    ) -> Self {
        Self {
            optimizer: AdamW::new(dim, betas, eps, weight_decay),
            schedule,
            batch_size: batch_size.max(1),
            order: (0..n_samples).collect(),
            rng: StdRng::seed_from_u64(seed),
            early_stopping,
            step: 0,
            epoch: 0,
            best_monitored: f64::INFINITY,
            stalled_epochs: 0,
            last_finite_loss: None,
            phase: TrainingPhase::Uninitialized,
            history: Vec::new(),
        }
    }

    /// Per-epoch diagnostics collected so far.
    pub fn history(&self) -> &[EpochRecord] {
        &self.history
    }

    /// Current phase of the state machine.
    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    /// Map a failure raised mid-epoch onto the divergence error when the
    /// parameters left the finite domain; pass other failures through.
    fn classify(&self, err: Error) -> Error {
        let opt_err = OptError::from(err);
        if opt_err.is_divergence() {
            OptError::TrainingDiverged {
                epoch: self.epoch,
                last_finite_loss: self.last_finite_loss,
            }
            .into()
        } else {
            opt_err.into()
        }
    }

    fn record_improvement(&mut self, monitored: f64) {
        let min_delta = self.early_stopping.map(|es| es.min_delta).unwrap_or(0.0);
        if monitored < self.best_monitored - min_delta {
            self.best_monitored = monitored;
            self.stalled_epochs = 0;
        } else {
            self.stalled_epochs += 1;
        }
    }
}

impl<'a, F: Objective> Solver<BatchAdapter<'a, F>, TrainState> for MinibatchSolver {
    const NAME: &'static str = "Minibatch AdamW";

    /// Score the initial guess so that the best-parameter tracker starts from
    /// `θ₀` and an immediately divergent model is rejected before epoch 0.
    fn init(
        &mut self, problem: &mut Problem<BatchAdapter<'a, F>>, state: TrainState,
    ) -> Result<(TrainState, Option<KV>), Error> {
        let theta0 = state.get_param().cloned().ok_or_else(|| OptError::NotInitialized {
            text: "Initial parameter vector was not set on the trainer state.".to_string(),
        })?;
        let train = problem
            .problem("cost_count", |p| p.cost(&theta0))
            .map_err(|e| self.classify(e))?;
        let validation = problem
            .problem("validation_count", |p| {
                p.f.validation_loss(&theta0, p.data).map_err(Error::from)
            })
            .map_err(|e| self.classify(e))?;
        let monitored = match validation {
            Some(v) if !v.is_finite() => {
                return Err(self.classify(OptError::NonFiniteCost { value: v }.into()));
            }
            Some(v) => v,
            None => train,
        };
        self.last_finite_loss = Some(train);
        self.best_monitored = monitored;
        self.phase = self.schedule.phase_at(0);
        Ok((state.cost(monitored), None))
    }

    fn next_iter(
        &mut self, problem: &mut Problem<BatchAdapter<'a, F>>, mut state: TrainState,
    ) -> Result<(TrainState, Option<KV>), Error> {
        let mut theta = state.take_param().ok_or_else(|| OptError::NotInitialized {
            text: "Trainer state lost its parameter vector.".to_string(),
        })?;

        let mut order = std::mem::take(&mut self.order);
        order.shuffle(&mut self.rng);
        let mut loss_sum = 0.0;
        let mut n_batches = 0usize;
        let mut lr = self.schedule.lr_at(self.step);
        for batch in order.chunks(self.batch_size) {
            lr = self.schedule.lr_at(self.step);
            self.phase = self.schedule.phase_at(self.step);
            let evaluated =
                problem.problem("batch_count", |p| p.batch_cost_and_gradient(&theta, batch));
            let (cost, grad) = match evaluated {
                Ok(v) => v,
                Err(e) => {
                    self.order = order;
                    return Err(self.classify(e));
                }
            };
            self.optimizer.step(&mut theta, &grad, lr);
            self.step += 1;
            loss_sum += cost;
            n_batches += 1;
        }
        self.order = order;
        let train_loss = loss_sum / n_batches.max(1) as f64;

        let validation = problem
            .problem("validation_count", |p| {
                p.f.validation_loss(&theta, p.data).map_err(Error::from)
            })
            .map_err(|e| self.classify(e))?;
        if let Some(v) = validation {
            if !v.is_finite() {
                return Err(self.classify(OptError::NonFiniteCost { value: v }.into()));
            }
        }
        let monitored = validation.unwrap_or(train_loss);

        tracing::debug!(
            epoch = self.epoch,
            train_loss,
            validation_loss = ?validation,
            learning_rate = lr,
            phase = ?self.phase,
            "epoch finished"
        );
        self.history.push(EpochRecord {
            epoch: self.epoch,
            train_loss,
            validation_loss: validation,
            learning_rate: lr,
            phase: self.phase,
        });
        self.last_finite_loss = Some(train_loss);
        self.record_improvement(monitored);
        self.epoch += 1;

        Ok((state.param(theta).cost(monitored), None))
    }

    fn terminate(&mut self, state: &TrainState) -> TerminationStatus {
        if let Some(es) = self.early_stopping {
            if self.stalled_epochs >= es.patience {
                self.phase = TrainingPhase::Converged;
                return TerminationStatus::Terminated(TerminationReason::SolverConverged);
            }
        }
        if state.get_iter() >= state.get_max_iters() {
            self.phase = TrainingPhase::MaxEpochsReached;
        }
        TerminationStatus::NotTerminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - AdamW step arithmetic on a single coordinate.
    // - Early-stopping bookkeeping.
    // End-to-end solver behavior inside the argmin executor is covered by the
    // `api` tests.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // The first Adam step moves each coordinate by ≈ lr against the gradient
    // sign (bias-corrected moments make |m̂ / √v̂| = 1).
    //
    // Given
    // -----
    // - θ = [1, 1], g = [2, −3], lr = 0.1, no weight decay.
    //
    // Expect
    // ------
    // - θ ≈ [0.9, 1.1].
    fn first_adam_step_moves_by_learning_rate() {
        let mut adam = AdamW::new(2, (0.9, 0.999), 1e-12, 0.0);
        let mut theta = array![1.0, 1.0];

        adam.step(&mut theta, &array![2.0, -3.0], 0.1);

        assert_relative_eq!(theta[0], 0.9, epsilon = 1e-9);
        assert_relative_eq!(theta[1], 1.1, epsilon = 1e-9);
    }

    #[test]
    // Purpose
    // -------
    // Decoupled weight decay shrinks parameters even with a zero gradient.
    fn weight_decay_shrinks_parameters() {
        let mut adam = AdamW::new(1, (0.9, 0.999), 1e-8, 0.5);
        let mut theta = array![2.0];

        adam.step(&mut theta, &array![0.0], 0.1);

        assert_relative_eq!(theta[0], 2.0 - 0.1 * 0.5 * 2.0, epsilon = 1e-9);
    }

    #[test]
    // Purpose
    // -------
    // Improvements larger than `min_delta` reset the stall counter; smaller
    // ones count as stalls.
    fn improvement_tracking_respects_min_delta() {
        let schedule = OneCycle::new(0.1, 10, &Default::default());
        let es = EarlyStopping::new(2, 0.1).unwrap();
        let mut solver =
            MinibatchSolver::new(1, 4, 2, schedule, (0.9, 0.999), 1e-8, 0.0, Some(es), 0);
        solver.best_monitored = 1.0;

        solver.record_improvement(0.95);
        assert_eq!(solver.stalled_epochs, 1);
        solver.record_improvement(0.5);
        assert_eq!(solver.stalled_epochs, 0);
        assert_relative_eq!(solver.best_monitored, 0.5);
    }

    struct Flat;

    impl Objective for Flat {
        type Data = ();

        fn n_samples(&self, _data: &()) -> usize {
            1
        }

        fn check(&self, _theta: &Theta, _data: &()) -> crate::optimization::errors::OptResult<()> {
            Ok(())
        }

        fn value(
            &self, _theta: &Theta, _data: &(), _batch: &[usize],
        ) -> crate::optimization::errors::OptResult<f64> {
            Ok(0.0)
        }
    }

    #[test]
    // Purpose
    // -------
    // The solver identifies itself to argmin observers and termination
    // reports through the trait's `NAME` constant.
    fn solver_reports_its_name() {
        let name = <MinibatchSolver as Solver<BatchAdapter<'static, Flat>, TrainState>>::NAME;

        assert_eq!(name, "Minibatch AdamW");
    }
}
