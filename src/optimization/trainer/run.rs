//! Execution helper that runs the minibatch solver inside argmin's `Executor`
//! and returns a crate-friendly [`TrainOutcome`].
use crate::optimization::{
    errors::{OptError, OptResult},
    trainer::{
        adapter::BatchAdapter,
        solver::MinibatchSolver,
        traits::{Objective, TrainOutcome},
        types::{Theta, TrainState},
    },
};
use argmin::core::{observers::Observe, Error, Executor, State, KV};

/// Argmin observer that reports each finished epoch through `tracing`.
///
/// Attached by [`run_trainer`] when `verbose` is set. The event is emitted at
/// `INFO` level with the target `rust_forecast::trainer`; installing a
/// subscriber is left to the application.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochLogger;

impl Observe<TrainState> for EpochLogger {
    fn observe_iter(&mut self, state: &TrainState, _kv: &KV) -> Result<(), Error> {
        tracing::info!(
            target: "rust_forecast::trainer",
            epoch = state.get_iter(),
            loss = state.get_cost(),
            best_loss = state.get_best_cost(),
            "training progress"
        );
        Ok(())
    }
}

/// Run the minibatch solver for at most `epochs` epochs.
///
/// Wires up:
/// - the model via [`BatchAdapter`],
/// - the [`MinibatchSolver`],
/// - the initial parameter `theta0` and the epoch budget,
/// - the [`EpochLogger`] observer when `verbose` is set, plus argmin's slog
///   terminal observer behind the `obs_slog` feature.
///
/// # Returns
/// A [`TrainOutcome`] holding the best parameters (lowest monitored loss),
/// the terminal phase, evaluation counters and per-epoch history.
///
/// # Errors
/// - [`OptError::TrainingDiverged`] when a loss or gradient became non-finite.
/// - Any other objective or backend error, converted via `From<argmin::core::Error>`.
pub fn run_trainer<'a, F>(
    theta0: Theta, epochs: usize, verbose: bool, problem: BatchAdapter<'a, F>,
    solver: MinibatchSolver,
) -> OptResult<TrainOutcome>
where
    F: Objective,
{
    let mut executor = Executor::new(problem, solver)
        .configure(|state| state.param(theta0).max_iters(epochs as u64));
    if verbose {
        executor =
            executor.add_observer(EpochLogger, argmin::core::observers::ObserverMode::Always);
    }
    #[cfg(feature = "obs_slog")]
    if verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        executor = executor.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }

    let result = executor.run().map_err(OptError::from)?;
    let history = result.solver().history().to_vec();
    let mut state = result.state().clone();
    let iterations = state.get_iter();
    let function_counts = state.get_func_counts().clone();
    let termination = state.get_termination_status().clone();
    let best_loss = state.get_best_cost();
    tracing::debug!(epochs = iterations, best_loss, status = ?termination, "training finished");
    TrainOutcome::new(
        state.take_best_param(),
        best_loss,
        termination,
        iterations,
        function_counts,
        history,
    )
}
