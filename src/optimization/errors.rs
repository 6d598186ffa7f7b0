//! Errors for the training stack (options validation, objective evaluation,
//! divergence detection, and argmin backend failures).
//!
//! [`OptError`] is the single error surface of [`crate::optimization`]. Model
//! code reports objective failures as `OptError` values; the solver and the
//! runner never leak raw `argmin::core::Error` values across module
//! boundaries. Conversions into the forecasting layer live in
//! `forecasting::errors`.
use argmin::core::{ArgminError, Error};

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq)]
pub enum OptError {
    // ---- Gradient ----
    /// Implies that finite differences should be used.
    GradientNotImplemented,

    /// Gradient dimensions do not match parameter dimensions.
    GradientDimMismatch { expected: usize, found: usize },

    /// Gradient elements need to be finite.
    InvalidGradient { index: usize, value: f64, reason: &'static str },

    // ---- TrainerOptions ----
    /// Learning rate must be finite and > 0.
    InvalidLearningRate { value: f64, reason: &'static str },

    /// Epoch budget must be > 0.
    InvalidEpochs { epochs: usize, reason: &'static str },

    /// Batch size must be > 0.
    InvalidBatchSize { batch_size: usize, reason: &'static str },

    /// Adam moment coefficients must lie in [0, 1).
    InvalidBetas { beta1: f64, beta2: f64 },

    /// Weight decay must be finite and >= 0.
    InvalidWeightDecay { value: f64 },

    /// Schedule knobs (`pct_start`, dividers) out of range.
    InvalidSchedule { param: &'static str, value: f64, reason: &'static str },

    /// Early-stopping patience must be > 0 and `min_delta` finite and >= 0.
    InvalidEarlyStopping { patience: usize, min_delta: f64, reason: &'static str },

    /// Validation fraction must lie in [0, 1).
    InvalidValidationFraction { value: f64 },

    // ---- Objective ----
    /// Objective returned a non-finite value.
    NonFiniteCost { value: f64 },

    /// Objective has no samples to train on.
    EmptyTrainingSet,

    /// Parameter vector length does not match the model layout.
    ThetaLengthMismatch { expected: usize, actual: usize },

    /// Parameter vector entries must be finite.
    InvalidThetaInput { index: usize, value: f64 },

    // ---- Training run ----
    /// Loss became non-finite; carries the offending epoch and last finite loss.
    TrainingDiverged { epoch: usize, last_finite_loss: Option<f64> },

    /// Estimated parameters must be finite.
    InvalidThetaHat { index: usize, value: f64, reason: &'static str },

    /// Theta hat is missing.
    MissingThetaHat,

    // ---- Argmin ---
    /// Wrapper for argmin::InvalidParameter
    InvalidParameter { text: String },
    /// Wrapper for argmin::NotImplemented
    NotImplemented { text: String },
    /// Wrapper for argmin::NotInitialized
    NotInitialized { text: String },
    /// Wrapper for argmin::ConditionViolated
    ConditionViolated { text: String },
    /// Wrapper for argmin::CheckPointNotFound
    CheckPointNotFound { text: String },
    /// Wrapper for argmin::PotentialBug
    PotentialBug { text: String },
    /// Wrapper for argmin::ImpossibleError
    ImpossibleError { text: String },
    /// Wrapper for other argmin::Error types
    BackendError { text: String },

    // ---- Fallback ----
    UnknownError,
}

impl OptError {
    /// `true` for failures that mean the parameters left the finite domain.
    pub fn is_divergence(&self) -> bool {
        matches!(self, OptError::NonFiniteCost { .. } | OptError::InvalidGradient { .. })
    }
}

impl std::error::Error for OptError {}

impl std::fmt::Display for OptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Gradient ----
            OptError::GradientNotImplemented => {
                write!(f, "Gradient optimization not implemented")
            }
            OptError::GradientDimMismatch { expected, found } => {
                write!(f, "Gradient dimension mismatch: expected {expected}, found {found}")
            }
            OptError::InvalidGradient { index, value, reason } => {
                write!(f, "Invalid gradient at index {index}: {value}: {reason}")
            }

            // ---- TrainerOptions ----
            OptError::InvalidLearningRate { value, reason } => {
                write!(f, "Invalid learning rate {value}: {reason}")
            }
            OptError::InvalidEpochs { epochs, reason } => {
                write!(f, "Invalid epoch budget {epochs}: {reason}")
            }
            OptError::InvalidBatchSize { batch_size, reason } => {
                write!(f, "Invalid batch size {batch_size}: {reason}")
            }
            OptError::InvalidBetas { beta1, beta2 } => {
                write!(f, "Invalid Adam betas ({beta1}, {beta2}): both must lie in [0, 1)")
            }
            OptError::InvalidWeightDecay { value } => {
                write!(f, "Invalid weight decay {value}: must be finite and >= 0")
            }
            OptError::InvalidSchedule { param, value, reason } => {
                write!(f, "Invalid learning-rate schedule parameter '{param}' = {value}: {reason}")
            }
            OptError::InvalidEarlyStopping { patience, min_delta, reason } => {
                write!(
                    f,
                    "Invalid early stopping (patience {patience}, min_delta {min_delta}): {reason}"
                )
            }
            OptError::InvalidValidationFraction { value } => {
                write!(f, "Invalid validation fraction {value}: must lie in [0, 1)")
            }

            // ---- Objective ----
            OptError::NonFiniteCost { value } => {
                write!(f, "Non-finite cost value: {value}")
            }
            OptError::EmptyTrainingSet => {
                write!(f, "Training set contains no samples")
            }
            OptError::ThetaLengthMismatch { expected, actual } => {
                write!(f, "Theta length mismatch: expected {expected}, actual {actual}")
            }
            OptError::InvalidThetaInput { index, value } => {
                write!(f, "Invalid theta input at index {index}: {value}, must be finite")
            }

            // ---- Training run ----
            OptError::TrainingDiverged { epoch, last_finite_loss } => match last_finite_loss {
                Some(loss) => write!(
                    f,
                    "Training diverged at epoch {epoch}; last finite loss was {loss}"
                ),
                None => write!(f, "Training diverged at epoch {epoch} before any finite loss"),
            },
            OptError::InvalidThetaHat { index, value, reason } => {
                write!(f, "Invalid estimated parameter at index {index}: {value}: {reason}")
            }
            OptError::MissingThetaHat => {
                write!(f, "Missing estimated parameters (theta hat)")
            }

            // ---- Argmin ----
            OptError::InvalidParameter { text } => {
                write!(f, "Invalid parameter: {text}")
            }
            OptError::NotImplemented { text } => {
                write!(f, "Not implemented: {text}")
            }
            OptError::NotInitialized { text } => {
                write!(f, "Not initialized: {text}")
            }
            OptError::ConditionViolated { text } => {
                write!(f, "Condition violated: {text}")
            }
            OptError::CheckPointNotFound { text } => {
                write!(f, "Checkpoint not found: {text}")
            }
            OptError::PotentialBug { text } => {
                write!(f, "Potential bug: {text}")
            }
            OptError::ImpossibleError { text } => {
                write!(f, "Impossible error: {text}")
            }
            OptError::BackendError { text } => {
                write!(f, "Backend error: {text}")
            }

            // ---- Fallback ----
            OptError::UnknownError => {
                write!(f, "Unknown error")
            }
        }
    }
}

impl From<Error> for OptError {
    fn from(original_err: Error) -> Self {
        // Our own errors travel through argmin boxed; unwrap them first.
        let original_err = match original_err.downcast::<OptError>() {
            Ok(opt_err) => return opt_err,
            Err(err) => err,
        };
        match original_err.downcast() {
            Ok(opt_err) => match opt_err {
                ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => OptError::NotImplemented { text },
                ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                ArgminError::CheckpointNotFound { text } => OptError::CheckPointNotFound { text },
                ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                ArgminError::ImpossibleError { text } => OptError::ImpossibleError { text },
                _ => OptError::UnknownError,
            },
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Round-tripping `OptError` through `argmin::core::Error`.
    // - Mapping of argmin's own error enum.
    // - The divergence classifier and a couple of `Display` strings.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // An `OptError` boxed into argmin's error type must come back unchanged.
    //
    // Given
    // -----
    // - `OptError::TrainingDiverged { epoch: 3, last_finite_loss: Some(0.5) }`
    //   converted into `argmin::core::Error`.
    //
    // Expect
    // ------
    // - `OptError::from` recovers the identical variant.
    fn opt_error_round_trips_through_argmin_error() {
        let original = OptError::TrainingDiverged { epoch: 3, last_finite_loss: Some(0.5) };
        let boxed: Error = original.clone().into();

        assert_eq!(OptError::from(boxed), original);
    }

    #[test]
    // Purpose
    // -------
    // Argmin's own error enum maps onto the matching wrapper variant.
    //
    // Given
    // -----
    // - `ArgminError::InvalidParameter { text: "bad" }`.
    //
    // Expect
    // ------
    // - `OptError::InvalidParameter { text: "bad" }`.
    fn argmin_error_maps_to_wrapper_variant() {
        let boxed: Error = ArgminError::InvalidParameter { text: "bad".to_string() }.into();

        assert_eq!(OptError::from(boxed), OptError::InvalidParameter { text: "bad".to_string() });
    }

    #[test]
    // Purpose
    // -------
    // Only non-finite cost and non-finite gradients count as divergence.
    //
    // Expect
    // ------
    // - `is_divergence` is true for those two and false for a config error.
    fn divergence_classifier_matches_non_finite_failures() {
        assert!(OptError::NonFiniteCost { value: f64::NAN }.is_divergence());
        assert!(
            OptError::InvalidGradient { index: 0, value: f64::INFINITY, reason: "x" }
                .is_divergence()
        );
        assert!(!OptError::EmptyTrainingSet.is_divergence());
    }

    #[test]
    // Purpose
    // -------
    // The divergence message names both the epoch and the last finite loss.
    fn diverged_display_mentions_epoch_and_loss() {
        let msg = OptError::TrainingDiverged { epoch: 7, last_finite_loss: Some(1.25) }.to_string();

        assert!(msg.contains("epoch 7"));
        assert!(msg.contains("1.25"));
    }
}
