//! Public surface of the minibatch trainer.
//!
//! - [`Objective`]: trait a model implements to be trainable.
//! - [`TrainerOptions`], [`LrSchedule`], [`EarlyStopping`]: configuration.
//! - [`TrainingPhase`]: the trainer's state machine.
//! - [`EpochRecord`] / [`TrainOutcome`]: normalized results returned by
//!   [`minimize`](crate::optimization::trainer::minimize).
//!
//! Convention: the trainer *minimizes* the objective. Models report a mean
//! loss per minibatch (plus any regularization) and, when available, its
//! analytic gradient; the adapter falls back to finite differences otherwise.
use crate::optimization::{
    errors::{OptError, OptResult},
    trainer::{
        types::{Cost, FnEvalMap, Grad, Theta, DEFAULT_LEARNING_RATE},
        validation::{validate_theta_hat, verify_fraction, verify_learning_rate},
    },
};
use argmin::core::TerminationStatus;

/// Model interface consumed by the trainer.
///
/// - `type Data`: the full training payload (all samples of all series).
///   Minibatches are index slices into `0..n_samples(data)`.
///
/// Required:
/// - `n_samples(&Data)`: number of training samples.
/// - `check(&Theta, &Data)`: validation hook run once before training.
/// - `value(&Theta, &Data, batch)`: mean loss over `batch` plus penalties.
///
/// Optional:
/// - `grad(&Theta, &Data, batch)`: analytic gradient of `value`. If not
///   implemented, finite differences are used automatically.
/// - `value_and_grad`: fused evaluation; defaults to `value` then `grad`.
/// - `validation_loss(&Theta, &Data)`: held-out loss used for early
///   stopping; `None` when the data carries no validation split.
pub trait Objective: Sync {
    type Data: Sync + 'static;

    // Required methods
    fn n_samples(&self, data: &Self::Data) -> usize;
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()>;
    fn value(&self, theta: &Theta, data: &Self::Data, batch: &[usize]) -> OptResult<Cost>;

    // Optional methods
    fn grad(&self, _theta: &Theta, _data: &Self::Data, _batch: &[usize]) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }

    fn value_and_grad(
        &self, theta: &Theta, data: &Self::Data, batch: &[usize],
    ) -> OptResult<(Cost, Grad)> {
        let value = self.value(theta, data, batch)?;
        let grad = self.grad(theta, data, batch)?;
        Ok((value, grad))
    }

    fn validation_loss(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<Option<Cost>> {
        Ok(None)
    }
}

/// State machine of a training run.
///
/// `Uninitialized → WarmingUp → Annealing → Converged | MaxEpochsReached`.
/// The warm-up/annealing boundary is defined by [`LrSchedule::pct_start`];
/// `Converged` is reached only through early stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    Uninitialized,
    WarmingUp,
    Annealing,
    Converged,
    MaxEpochsReached,
}

impl TrainingPhase {
    /// `true` once the run has ended, whichever way.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrainingPhase::Converged | TrainingPhase::MaxEpochsReached)
    }
}

/// One-cycle learning-rate schedule.
///
/// The rate climbs linearly from `max_lr / div_factor` to `max_lr` during the
/// first `pct_start` share of all optimizer steps, then follows a half cosine
/// down to `max_lr / (div_factor · final_div_factor)`.
///
/// Default: `pct_start = 0.3`, `div_factor = 10`, `final_div_factor = 10`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LrSchedule {
    pub pct_start: f64,
    pub div_factor: f64,
    pub final_div_factor: f64,
}

impl LrSchedule {
    /// Build a validated schedule.
    ///
    /// # Errors
    /// - [`OptError::InvalidSchedule`] if `pct_start ∉ [0, 1)` or either
    ///   divider is not finite and `>= 1`.
    pub fn new(pct_start: f64, div_factor: f64, final_div_factor: f64) -> OptResult<Self> {
        let schedule = Self { pct_start, div_factor, final_div_factor };
        schedule.validate()?;
        Ok(schedule)
    }

    pub(crate) fn validate(&self) -> OptResult<()> {
        if !self.pct_start.is_finite() || !(0.0..1.0).contains(&self.pct_start) {
            return Err(OptError::InvalidSchedule {
                param: "pct_start",
                value: self.pct_start,
                reason: "Warm-up share must lie in [0, 1).",
            });
        }
        for (param, value) in
            [("div_factor", self.div_factor), ("final_div_factor", self.final_div_factor)]
        {
            if !value.is_finite() || value < 1.0 {
                return Err(OptError::InvalidSchedule {
                    param,
                    value,
                    reason: "Divider must be finite and at least 1.",
                });
            }
        }
        Ok(())
    }
}

impl Default for LrSchedule {
    fn default() -> Self {
        Self { pct_start: 0.3, div_factor: 10.0, final_div_factor: 10.0 }
    }
}

/// Early-stopping rule on the monitored loss.
///
/// Training stops once `patience` consecutive epochs fail to improve the best
/// monitored loss by more than `min_delta`. The monitored loss is the
/// validation loss when a validation split exists, the training loss otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EarlyStopping {
    pub patience: usize,
    pub min_delta: f64,
}

impl EarlyStopping {
    /// # Errors
    /// [`OptError::InvalidEarlyStopping`] if `patience == 0` or `min_delta` is
    /// negative or non-finite.
    pub fn new(patience: usize, min_delta: f64) -> OptResult<Self> {
        if patience == 0 {
            return Err(OptError::InvalidEarlyStopping {
                patience,
                min_delta,
                reason: "Patience must be greater than zero.",
            });
        }
        if !min_delta.is_finite() || min_delta < 0.0 {
            return Err(OptError::InvalidEarlyStopping {
                patience,
                min_delta,
                reason: "Minimum improvement must be finite and non-negative.",
            });
        }
        Ok(Self { patience, min_delta })
    }
}

/// Trainer configuration.
///
/// Fields left as `None` are resolved from the number of training samples by
/// [`TrainerOptions::resolve`]:
/// - `epochs`: `clamp(1000 / n · 2^(2.5 · log10 n), 40, 500)`
/// - `batch_size`: `clamp(2^(2 + ⌊log10 n⌋), 8, 1024)`, capped at `n`
/// - `learning_rate`: [`DEFAULT_LEARNING_RATE`]
///
/// Optimizer: AdamW with `betas`, `eps` and decoupled `weight_decay`.
///
/// Flags:
/// - `verbose`: attach the per-epoch tracing observer (and, with the
///   `obs_slog` feature, argmin's terminal logger).
/// - `warm_start`: re-fits with an unchanged parameter layout resume from the
///   previous estimate instead of re-initializing.
/// - `parallel`: evaluate minibatch samples on the rayon pool. Off by default
///   because parallel floating-point reduction order is not reproducible.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerOptions {
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub learning_rate: Option<f64>,
    pub schedule: LrSchedule,
    pub betas: (f64, f64),
    pub eps: f64,
    pub weight_decay: f64,
    pub early_stopping: Option<EarlyStopping>,
    pub validation_fraction: f64,
    pub seed: u64,
    pub verbose: bool,
    pub warm_start: bool,
    pub parallel: bool,
}

impl Default for TrainerOptions {
    fn default() -> Self {
        Self {
            epochs: None,
            batch_size: None,
            learning_rate: None,
            schedule: LrSchedule::default(),
            betas: (0.9, 0.999),
            eps: 1e-8,
            weight_decay: 0.0,
            early_stopping: None,
            validation_fraction: 0.0,
            seed: 0,
            verbose: false,
            warm_start: false,
            parallel: false,
        }
    }
}

impl TrainerOptions {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = Some(epochs);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = Some(learning_rate);
        self
    }

    pub fn with_schedule(mut self, schedule: LrSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn with_early_stopping(mut self, early_stopping: EarlyStopping) -> Self {
        self.early_stopping = Some(early_stopping);
        self
    }

    pub fn with_validation_fraction(mut self, fraction: f64) -> Self {
        self.validation_fraction = fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_warm_start(mut self, warm_start: bool) -> Self {
        self.warm_start = warm_start;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check every numeric field.
    ///
    /// # Errors
    /// Returns the first offending field as the matching `OptError::Invalid*`
    /// variant.
    pub fn validate(&self) -> OptResult<()> {
        if let Some(epochs) = self.epochs {
            if epochs == 0 {
                return Err(OptError::InvalidEpochs {
                    epochs,
                    reason: "Epoch budget must be greater than zero.",
                });
            }
        }
        if let Some(batch_size) = self.batch_size {
            if batch_size == 0 {
                return Err(OptError::InvalidBatchSize {
                    batch_size,
                    reason: "Batch size must be greater than zero.",
                });
            }
        }
        if let Some(lr) = self.learning_rate {
            verify_learning_rate(lr)?;
        }
        self.schedule.validate()?;
        let (beta1, beta2) = self.betas;
        if !(0.0..1.0).contains(&beta1) || !(0.0..1.0).contains(&beta2) {
            return Err(OptError::InvalidBetas { beta1, beta2 });
        }
        if !self.eps.is_finite() || self.eps <= 0.0 {
            return Err(OptError::InvalidSchedule {
                param: "eps",
                value: self.eps,
                reason: "Adam epsilon must be finite and positive.",
            });
        }
        if !self.weight_decay.is_finite() || self.weight_decay < 0.0 {
            return Err(OptError::InvalidWeightDecay { value: self.weight_decay });
        }
        if let Some(es) = self.early_stopping {
            EarlyStopping::new(es.patience, es.min_delta)?;
        }
        verify_fraction(self.validation_fraction)?;
        Ok(())
    }

    /// Fill in the automatic epoch budget, batch size and learning rate.
    ///
    /// Parameters
    /// ----------
    /// - `n_samples`: number of training samples; must be `> 0`.
    ///
    /// Errors
    /// ------
    /// - [`OptError::EmptyTrainingSet`] if `n_samples == 0`.
    pub fn resolve(&self, n_samples: usize) -> OptResult<ResolvedOptions> {
        if n_samples == 0 {
            return Err(OptError::EmptyTrainingSet);
        }
        let n = n_samples as f64;
        let epochs = self.epochs.unwrap_or_else(|| {
            let raw = 1000.0 / n * 2f64.powf(2.5 * n.log10());
            (raw.round() as usize).clamp(40, 500)
        });
        let batch_size = self
            .batch_size
            .unwrap_or_else(|| {
                let exp = 2 + n.log10().floor() as i32;
                (2f64.powi(exp) as usize).clamp(8, 1024)
            })
            .min(n_samples);
        let learning_rate = self.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE);
        Ok(ResolvedOptions { epochs, batch_size, learning_rate })
    }
}

/// Concrete run parameters after automatic resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
}

/// Per-epoch diagnostics kept by the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f64,
    pub validation_loss: Option<f64>,
    pub learning_rate: f64,
    pub phase: TrainingPhase,
}

/// Canonical result returned by `minimize`.
///
/// - `theta_hat`: parameters with the lowest monitored loss.
/// - `best_loss`: that monitored loss.
/// - `phase`: terminal phase (`Converged` or `MaxEpochsReached`).
/// - `status`: argmin's termination status, formatted.
/// - `epochs`: number of completed epochs.
/// - `fn_evals`: argmin's evaluation counters.
/// - `history`: one [`EpochRecord`] per completed epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOutcome {
    pub theta_hat: Theta,
    pub best_loss: f64,
    pub phase: TrainingPhase,
    pub status: String,
    pub epochs: usize,
    pub fn_evals: FnEvalMap,
    pub history: Vec<EpochRecord>,
}

impl TrainOutcome {
    /// Build a validated [`TrainOutcome`] from raw solver state.
    ///
    /// # Errors
    /// - Propagates `validate_theta_hat` failures (missing or non-finite).
    pub fn new(
        theta_hat: Option<Theta>, best_loss: f64, status: TerminationStatus, epochs: u64,
        fn_evals: FnEvalMap, history: Vec<EpochRecord>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat)?;
        let phase = match &status {
            TerminationStatus::Terminated(argmin::core::TerminationReason::SolverConverged) => {
                TrainingPhase::Converged
            }
            _ => TrainingPhase::MaxEpochsReached,
        };
        Ok(Self {
            theta_hat,
            best_loss,
            phase,
            status: format!("{status:?}"),
            epochs: epochs as usize,
            fn_evals,
            history,
        })
    }

    /// Training loss of the final epoch, if any epoch ran.
    pub fn final_train_loss(&self) -> Option<f64> {
        self.history.last().map(|r| r.train_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - Option validation for each numeric knob.
    // - Automatic epoch / batch-size resolution.
    // - Phase mapping in `TrainOutcome::new`.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Defaults are valid and resolve to the documented automatic values.
    //
    // Given
    // -----
    // - Default options and 1000 samples.
    //
    // Expect
    // ------
    // - epochs = round(1 · 2^7.5) = 181, batch = 2^5 = 32, lr = 0.1.
    fn defaults_resolve_to_automatic_values() {
        let opts = TrainerOptions::default();
        opts.validate().unwrap();

        let resolved = opts.resolve(1000).unwrap();

        assert_eq!(resolved.epochs, 181);
        assert_eq!(resolved.batch_size, 32);
        assert_eq!(resolved.learning_rate, DEFAULT_LEARNING_RATE);
    }

    #[test]
    // Purpose
    // -------
    // Automatic values respect their clamps and the sample count.
    //
    // Given
    // -----
    // - 5 samples (tiny) and 10^9 samples (huge).
    //
    // Expect
    // ------
    // - Tiny: batch capped at 5, epochs clamped to 500.
    // - Huge: epochs clamped to 40, batch to 1024.
    fn automatic_values_are_clamped() {
        let opts = TrainerOptions::default();

        let tiny = opts.resolve(5).unwrap();
        let huge = opts.resolve(1_000_000_000).unwrap();

        assert_eq!(tiny.batch_size, 5);
        assert_eq!(tiny.epochs, 500);
        assert_eq!(huge.batch_size, 1024);
        assert_eq!(huge.epochs, 40);
    }

    #[test]
    // Purpose
    // -------
    // Each invalid knob is reported with its own variant.
    fn invalid_fields_are_rejected() {
        let zero_epochs = TrainerOptions::default().with_epochs(0);
        let bad_lr = TrainerOptions::default().with_learning_rate(-1.0);
        let bad_split = TrainerOptions::default().with_validation_fraction(1.0);
        let bad_decay = TrainerOptions::default().with_weight_decay(f64::NAN);

        assert!(matches!(zero_epochs.validate(), Err(OptError::InvalidEpochs { .. })));
        assert!(matches!(bad_lr.validate(), Err(OptError::InvalidLearningRate { .. })));
        assert!(matches!(bad_split.validate(), Err(OptError::InvalidValidationFraction { .. })));
        assert!(matches!(bad_decay.validate(), Err(OptError::InvalidWeightDecay { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Schedule and early-stopping constructors validate their inputs.
    fn schedule_and_early_stopping_constructors_validate() {
        assert!(LrSchedule::new(0.3, 10.0, 10.0).is_ok());
        assert!(matches!(LrSchedule::new(1.0, 10.0, 10.0), Err(OptError::InvalidSchedule { .. })));
        assert!(matches!(LrSchedule::new(0.3, 0.5, 10.0), Err(OptError::InvalidSchedule { .. })));
        assert!(matches!(EarlyStopping::new(0, 0.0), Err(OptError::InvalidEarlyStopping { .. })));
        assert!(EarlyStopping::new(3, 1e-4).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Solver convergence maps to `Converged`; anything else to
    // `MaxEpochsReached`.
    fn outcome_maps_termination_to_phase() {
        use argmin::core::TerminationReason;
        let theta = Some(ndarray::array![1.0, 2.0]);

        let converged = TrainOutcome::new(
            theta.clone(),
            0.1,
            TerminationStatus::Terminated(TerminationReason::SolverConverged),
            5,
            FnEvalMap::new(),
            Vec::new(),
        )
        .unwrap();
        let exhausted = TrainOutcome::new(
            theta,
            0.1,
            TerminationStatus::Terminated(TerminationReason::MaxItersReached),
            10,
            FnEvalMap::new(),
            Vec::new(),
        )
        .unwrap();

        assert_eq!(converged.phase, TrainingPhase::Converged);
        assert_eq!(exhausted.phase, TrainingPhase::MaxEpochsReached);
        assert!(exhausted.phase.is_terminal());
        assert_eq!(exhausted.epochs, 10);
    }
}
