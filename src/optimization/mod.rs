//! optimization — quantile loss, minibatch trainer, and unified error surface.
//!
//! Purpose
//! -------
//! Provide a cohesive optimization layer for model fitting: the pinball loss
//! every forecasting model is trained on, an argmin-backed minibatch trainer,
//! and a single error/result surface. Model code implements an objective,
//! picks trainer options, and obtains fitted parameters and diagnostics
//! without touching backend solver details.
//!
//! Key behaviors
//! -------------
//! - Expose the quantile (pinball) loss and its derivative (`loss`).
//! - Expose a high-level API for **minimizing** a minibatch objective with
//!   AdamW, a one-cycle schedule and early stopping (`trainer`).
//! - Normalize configuration issues, divergence, and backend solver errors
//!   into a single enum (`errors::OptError`) with a common result alias
//!   (`OptResult<T>`).
//!
//! Invariants & assumptions
//! ------------------------
//! - The trainer operates on a flat unconstrained parameter vector `θ` and
//!   assumes inputs are finite once validation has passed; invalid states are
//!   reported as `OptError`, not panics.
//! - A non-finite loss or gradient is never absorbed: it ends the run with
//!   `OptError::TrainingDiverged`.
//!
//! Conventions
//! -----------
//! - Public entrypoints that can fail return `OptResult<T>`; callers never see
//!   raw argmin errors.
//! - Progress reporting goes through `tracing` events and argmin observers;
//!   no subscriber is installed here.
//!
//! Downstream usage
//! ----------------
//! - `forecasting::models` implements `trainer::Objective` for its model graph
//!   and converts `OptError` into `ForecastError`.
//! - Front-ends typically import `optimization::prelude::*`.
pub mod errors;
pub mod loss;
pub mod trainer;

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loss::{pinball_grad, pinball_loss};
    pub use super::trainer::prelude::*;
}
