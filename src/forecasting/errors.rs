//! Errors for the forecasting engine (configuration, data validation, model
//! lifecycle, and training failures).
//!
//! [`ForecastError`] is the single error type returned by every public
//! forecasting operation. [`ErrorKind`] groups variants into the coarse
//! taxonomy callers usually branch on.
//!
//! ## Conventions
//! - **Indices are 0-based** and refer to positions within one series.
//! - Configuration problems are raised eagerly: at construction, at `add_*`
//!   time, or at the start of `fit` before any epoch runs.
//! - Optimizer failures are normalized through `From<OptError>`; divergence
//!   keeps its epoch and last finite loss, everything else becomes
//!   [`ForecastError::OptimizationFailed`] with a human-readable status.
use crate::optimization::errors::OptError;
use chrono::NaiveDateTime;

/// Crate-wide result alias for forecasting operations.
pub type ForecastResult<T> = Result<T, ForecastError>;

/// Coarse error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    InsufficientData,
    MissingRegressor,
    ModelNotFitted,
    ModelAlreadyFitted,
    TrainingDiverged,
    InvalidData,
    Optimization,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForecastError {
    // ---- Configuration ----
    /// Invalid or contradictory setting.
    Configuration { param: &'static str, reason: String },

    /// Two components of the same kind share a name.
    DuplicateComponent { kind: &'static str, name: String },

    // ---- Input/data validation ----
    /// Series has no observations.
    EmptySeries { series: String },

    /// Timestamps must be strictly increasing; `index` is the first offender.
    NonMonotonicTimestamps { series: String, index: usize },

    /// An observation is NaN/±inf.
    NonFiniteData { series: String, index: usize, value: f64 },

    /// Parallel inputs disagree in length.
    LengthMismatch { what: &'static str, expected: usize, actual: usize },

    /// Series identifier not seen during `fit`.
    UnknownSeries { id: String },

    /// History shorter than the configured lags/changepoints require.
    InsufficientData { series: String, required: usize, actual: usize },

    /// A declared regressor has no value at a required timestamp.
    MissingRegressor { name: String, timestamp: NaiveDateTime },

    // ---- Lifecycle ----
    /// `predict`-side operation on a model that was never fitted.
    ModelNotFitted,

    /// Configuration change requested after `fit`.
    ModelAlreadyFitted,

    // ---- Training ----
    /// Loss became non-finite during training.
    TrainingDiverged { epoch: usize, last_finite_loss: Option<f64> },

    /// Optimizer failed; include a human-readable status/reason.
    OptimizationFailed { status: String },
}

impl ForecastError {
    /// Map the variant onto the coarse [`ErrorKind`] taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForecastError::Configuration { .. } | ForecastError::DuplicateComponent { .. } => {
                ErrorKind::Configuration
            }
            ForecastError::EmptySeries { .. }
            | ForecastError::NonMonotonicTimestamps { .. }
            | ForecastError::NonFiniteData { .. }
            | ForecastError::LengthMismatch { .. }
            | ForecastError::UnknownSeries { .. } => ErrorKind::InvalidData,
            ForecastError::InsufficientData { .. } => ErrorKind::InsufficientData,
            ForecastError::MissingRegressor { .. } => ErrorKind::MissingRegressor,
            ForecastError::ModelNotFitted => ErrorKind::ModelNotFitted,
            ForecastError::ModelAlreadyFitted => ErrorKind::ModelAlreadyFitted,
            ForecastError::TrainingDiverged { .. } => ErrorKind::TrainingDiverged,
            ForecastError::OptimizationFailed { .. } => ErrorKind::Optimization,
        }
    }

    pub(crate) fn config(param: &'static str, reason: impl Into<String>) -> Self {
        ForecastError::Configuration { param, reason: reason.into() }
    }
}

impl std::error::Error for ForecastError {}

impl std::fmt::Display for ForecastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Configuration ----
            ForecastError::Configuration { param, reason } => {
                write!(f, "Invalid configuration for '{param}': {reason}")
            }
            ForecastError::DuplicateComponent { kind, name } => {
                write!(f, "Duplicate {kind} component '{name}'")
            }

            // ---- Input/data validation ----
            ForecastError::EmptySeries { series } => {
                write!(f, "Series '{series}' is empty")
            }
            ForecastError::NonMonotonicTimestamps { series, index } => {
                write!(
                    f,
                    "Series '{series}': timestamps must be strictly increasing \
                         (violated at index {index})"
                )
            }
            ForecastError::NonFiniteData { series, index, value } => {
                write!(f, "Series '{series}': non-finite value {value} at index {index}")
            }
            ForecastError::LengthMismatch { what, expected, actual } => {
                write!(f, "Length mismatch for {what}: expected {expected}, actual {actual}")
            }
            ForecastError::UnknownSeries { id } => {
                write!(f, "Series '{id}' was not part of the training data")
            }
            ForecastError::InsufficientData { series, required, actual } => {
                write!(
                    f,
                    "Series '{series}' has {actual} observations; at least {required} are required"
                )
            }
            ForecastError::MissingRegressor { name, timestamp } => {
                write!(f, "Regressor '{name}' has no value at {timestamp}")
            }

            // ---- Lifecycle ----
            ForecastError::ModelNotFitted => {
                write!(f, "Model has not been fitted yet")
            }
            ForecastError::ModelAlreadyFitted => {
                write!(f, "Model is already fitted; components must be added before fit")
            }

            // ---- Training ----
            ForecastError::TrainingDiverged { epoch, last_finite_loss } => match last_finite_loss {
                Some(loss) => {
                    write!(f, "Training diverged at epoch {epoch}; last finite loss was {loss}")
                }
                None => write!(f, "Training diverged at epoch {epoch} before any finite loss"),
            },
            ForecastError::OptimizationFailed { status } => {
                write!(f, "Optimization failed: {status}")
            }
        }
    }
}

impl From<OptError> for ForecastError {
    fn from(err: OptError) -> Self {
        match err {
            OptError::TrainingDiverged { epoch, last_finite_loss } => {
                ForecastError::TrainingDiverged { epoch, last_finite_loss }
            }
            OptError::InvalidLearningRate { .. }
            | OptError::InvalidEpochs { .. }
            | OptError::InvalidBatchSize { .. }
            | OptError::InvalidBetas { .. }
            | OptError::InvalidWeightDecay { .. }
            | OptError::InvalidSchedule { .. }
            | OptError::InvalidEarlyStopping { .. }
            | OptError::InvalidValidationFraction { .. } => {
                ForecastError::Configuration { param: "trainer", reason: err.to_string() }
            }
            other => ForecastError::OptimizationFailed { status: other.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - `From<OptError>` preserves divergence diagnostics and routes option
    //   errors to `Configuration`.
    // - `kind()` groups variants as documented.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Divergence keeps its epoch and loss across the layer boundary.
    fn divergence_is_preserved() {
        let err: ForecastError =
            OptError::TrainingDiverged { epoch: 4, last_finite_loss: Some(0.3) }.into();

        assert_eq!(err, ForecastError::TrainingDiverged { epoch: 4, last_finite_loss: Some(0.3) });
        assert_eq!(err.kind(), ErrorKind::TrainingDiverged);
    }

    #[test]
    // Purpose
    // -------
    // Trainer option errors are configuration errors; other optimizer
    // failures are reported as `OptimizationFailed`.
    fn option_and_backend_errors_are_routed() {
        let cfg: ForecastError = OptError::InvalidEpochs { epochs: 0, reason: "x" }.into();
        let backend: ForecastError = OptError::BackendError { text: "boom".into() }.into();

        assert_eq!(cfg.kind(), ErrorKind::Configuration);
        assert!(matches!(
            backend,
            ForecastError::OptimizationFailed { ref status } if status.contains("boom")
        ));
    }

    #[test]
    // Purpose
    // -------
    // Data-validation variants share the `InvalidData` kind.
    fn data_variants_share_kind() {
        let errs = [
            ForecastError::EmptySeries { series: "a".into() },
            ForecastError::NonMonotonicTimestamps { series: "a".into(), index: 1 },
            ForecastError::UnknownSeries { id: "b".into() },
        ];

        assert!(errs.iter().all(|e| e.kind() == ErrorKind::InvalidData));
    }
}
