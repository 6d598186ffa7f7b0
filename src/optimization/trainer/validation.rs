//! Validation helpers for the minibatch trainer.
//!
//! This module centralizes the consistency checks used across the trainer:
//!
//! - **Option checks**: [`verify_learning_rate`], [`verify_fraction`].
//! - **Gradient validation**: [`validate_grad`] enforces correct dimension
//!   and finite entries.
//! - **Parameter vectors**: [`validate_theta`] for initial guesses and
//!   [`validate_theta_hat`] for estimates.
//!
//! Every helper reports a dedicated [`OptError`] variant so the solver and the
//! model layer fail in a uniform way.
use crate::optimization::{
    errors::{OptError, OptResult},
    trainer::types::{Grad, Theta},
};

/// Validate a learning rate: finite and strictly positive.
///
/// # Errors
/// Returns [`OptError::InvalidLearningRate`] otherwise.
pub fn verify_learning_rate(lr: f64) -> OptResult<()> {
    if !lr.is_finite() {
        return Err(OptError::InvalidLearningRate {
            value: lr,
            reason: "Learning rate must be finite.",
        });
    }
    if lr <= 0.0 {
        return Err(OptError::InvalidLearningRate {
            value: lr,
            reason: "Learning rate must be positive.",
        });
    }
    Ok(())
}

/// Validate a held-out fraction in `[0, 1)`.
///
/// # Errors
/// Returns [`OptError::InvalidValidationFraction`] otherwise.
pub fn verify_fraction(value: f64) -> OptResult<()> {
    if !value.is_finite() || !(0.0..1.0).contains(&value) {
        return Err(OptError::InvalidValidationFraction { value });
    }
    Ok(())
}

/// Validate a gradient vector against dimension and finiteness.
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] if length does not match `dim`.
/// - [`OptError::InvalidGradient`] for the first non-finite element.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidGradient {
                index,
                value,
                reason: "Gradient elements must be finite.",
            });
        }
    }
    Ok(())
}

/// Validate a parameter vector against the expected layout length.
///
/// # Errors
/// - [`OptError::ThetaLengthMismatch`] if `theta.len() != expected`.
/// - [`OptError::InvalidThetaInput`] for the first non-finite entry.
pub fn validate_theta(theta: &Theta, expected: usize) -> OptResult<()> {
    if theta.len() != expected {
        return Err(OptError::ThetaLengthMismatch { expected, actual: theta.len() });
    }
    for (index, &value) in theta.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidThetaInput { index, value });
        }
    }
    Ok(())
}

/// Validate and unwrap an estimated parameter vector (`theta_hat`).
///
/// # Errors
/// - [`OptError::MissingThetaHat`] if no vector was provided.
/// - [`OptError::InvalidThetaHat`] if any element is non-finite.
pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    match theta_hat {
        Some(t) => {
            for (index, &value) in t.iter().enumerate() {
                if !value.is_finite() {
                    return Err(OptError::InvalidThetaHat {
                        index,
                        value,
                        reason: "Parameter estimates must be finite.",
                    });
                }
            }
            Ok(t)
        }
        None => Err(OptError::MissingThetaHat),
    }
}
