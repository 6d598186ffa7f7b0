//! High-level entry point for training an [`Objective`].
//!
//! Workflow:
//! 1. Validate [`TrainerOptions`] and the initial guess (`Objective::check`).
//! 2. Resolve the epoch budget, batch size and peak learning rate from the
//!    number of training samples.
//! 3. Build the one-cycle schedule and the minibatch AdamW solver.
//! 4. Run via [`run_trainer`] and return a [`TrainOutcome`].
use crate::optimization::{
    errors::{OptError, OptResult},
    trainer::{
        adapter::BatchAdapter,
        run::run_trainer,
        schedule::OneCycle,
        solver::MinibatchSolver,
        traits::{Objective, TrainOutcome, TrainerOptions},
        types::Theta,
    },
};

/// Minimize an objective with minibatch AdamW.
///
/// # Parameters
/// - `f`: the model implementing [`Objective`].
/// - `theta0`: initial parameters.
/// - `data`: training payload.
/// - `opts`: trainer configuration.
///
/// # Errors
/// - Option validation errors (`OptError::Invalid*`).
/// - [`OptError::EmptyTrainingSet`] if the model exposes no samples.
/// - Errors from `f.check`.
/// - [`OptError::TrainingDiverged`] if the loss becomes non-finite.
///
/// # Example
/// ```ignore
/// let out = minimize(&graph, theta0, &data, &TrainerOptions::default())?;
/// println!("{} epochs, best loss {}", out.epochs, out.best_loss);
/// ```
pub fn minimize<F: Objective>(
    f: &F, theta0: Theta, data: &F::Data, opts: &TrainerOptions,
) -> OptResult<TrainOutcome> {
    opts.validate()?;
    f.check(&theta0, data)?;
    let n_samples = f.n_samples(data);
    if n_samples == 0 {
        return Err(OptError::EmptyTrainingSet);
    }
    let resolved = opts.resolve(n_samples)?;
    let steps_per_epoch = n_samples.div_ceil(resolved.batch_size);
    let schedule =
        OneCycle::new(resolved.learning_rate, resolved.epochs * steps_per_epoch, &opts.schedule);
    let solver = MinibatchSolver::new(
        theta0.len(),
        n_samples,
        resolved.batch_size,
        schedule,
        opts.betas,
        opts.eps,
        opts.weight_decay,
        opts.early_stopping,
        opts.seed,
    );
    tracing::debug!(
        n_samples,
        epochs = resolved.epochs,
        batch_size = resolved.batch_size,
        learning_rate = resolved.learning_rate,
        n_params = theta0.len(),
        "starting training"
    );
    let problem = BatchAdapter::new(f, data);
    run_trainer(theta0, resolved.epochs, opts.verbose, problem, solver)
}
