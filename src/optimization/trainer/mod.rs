//! trainer — argmin-powered minibatch trainer for forecasting models.
//!
//! Purpose
//! -------
//! Provide the optimization layer that fits every model parameter against a
//! mean quantile loss plus regularization penalties. Callers implement a
//! single trait, [`Objective`], and invoke [`minimize`] to run minibatch AdamW
//! with a one-cycle learning-rate schedule and optional early stopping.
//!
//! Key behaviors
//! -------------
//! - Convert a model [`Objective`] into an argmin problem via
//!   [`adapter::BatchAdapter`], with a finite-difference fallback when the
//!   model provides no analytic gradient.
//! - Drive epochs through argmin's `Executor` using the custom
//!   [`solver::MinibatchSolver`]; one argmin iteration is one epoch.
//! - Track the run as a small state machine ([`TrainingPhase`]):
//!   `Uninitialized → WarmingUp → Annealing → Converged | MaxEpochsReached`.
//! - Abort with [`OptError::TrainingDiverged`](crate::optimization::errors::OptError)
//!   as soon as a loss or gradient stops being finite.
//!
//! Invariants & assumptions
//! ------------------------
//! - The epoch loop is strictly sequential; parallelism, if any, happens
//!   inside a single minibatch evaluation on the model side.
//! - Shuffling is driven by a seeded `StdRng`, so identical inputs and seeds
//!   reproduce identical parameter trajectories.
//! - [`TrainerOptions`] is validated at the start of every run.
//!
//! Conventions
//! -----------
//! - Parameters live in one flat [`Theta`] vector; the model layer owns the
//!   mapping from offsets to components.
//! - The monitored loss is the validation loss when the model exposes one, the
//!   epoch's mean training loss otherwise. The returned parameters are those
//!   of the epoch with the lowest monitored loss.
//!
//! Downstream usage
//! ----------------
//! - The forecasting layer implements [`Objective`] for its model graph and
//!   calls [`minimize`] from `Forecaster::fit`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover option validation, schedule shape, AdamW arithmetic,
//!   adapter gradients and end-to-end runs on toy objectives.
pub mod adapter;
pub mod api;
pub mod run;
pub mod schedule;
pub mod solver;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::minimize;
pub use self::run::EpochLogger;
pub use self::traits::{
    EarlyStopping, EpochRecord, LrSchedule, Objective, ResolvedOptions, TrainOutcome,
    TrainerOptions, TrainingPhase,
};
pub use self::types::{Cost, FnEvalMap, Grad, Theta, TrainState, DEFAULT_LEARNING_RATE};

pub mod prelude {
    pub use super::api::minimize;
    pub use super::traits::{EarlyStopping, LrSchedule, Objective, TrainOutcome, TrainerOptions};
    pub use super::types::{Cost, Grad, Theta};
}
