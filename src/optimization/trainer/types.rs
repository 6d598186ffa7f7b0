//! trainer::types — shared numeric aliases for the minibatch trainer.
//!
//! Purpose
//! -------
//! Centralize the parameter, gradient and state types used by the trainer so
//! that the solver, the adapter and the model layer agree on one set of
//! `ndarray`/argmin generics.
//!
//! Conventions
//! -----------
//! - `Theta` is the flat parameter vector of a whole model; component modules
//!   address it through offsets handed out by the forecasting layout builder.
//! - One argmin iteration corresponds to one training **epoch**, so
//!   `TrainState::get_iter()` counts epochs, not minibatches.
use argmin::core::IterState;
use ndarray::Array1;
use std::collections::HashMap;

/// Flat parameter vector `θ`.
pub type Theta = Array1<f64>;

/// Gradient vector `∇L(θ)`, same length as [`Theta`].
pub type Grad = Array1<f64>;

/// Scalar training objective (mean pinball loss plus penalties).
pub type Cost = f64;

/// Function-evaluation counters as reported by argmin
/// (e.g. `"batch_count"`, `"validation_count"`).
pub type FnEvalMap = HashMap<String, u64>;

/// Argmin state carried between epochs.
pub type TrainState = IterState<Theta, Grad, (), (), (), f64>;

/// Learning rate used when the caller does not pick one.
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;
