//! Windowed training samples over encoded series.
//!
//! A sample is a forecast origin inside one series: the model sees the
//! `max_lag` rows before the origin as lag context and predicts the
//! `n_forecasts` rows starting at it. Lag inputs are always the observed
//! history, never earlier model outputs.
//!
//! Conventions
//! -----------
//! - For a series with `n` observed rows, valid origins are
//!   `max_lag ..= n − n_forecasts`.
//! - With a validation split, the most recent origins of every series are
//!   held out; at least one origin per series stays in the training set.
use crate::forecasting::{
    core::features::EncodedSeries,
    errors::{ForecastError, ForecastResult},
};

/// One forecast origin: series position in the training set and first
/// target row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRef {
    pub series: usize,
    pub origin: usize,
}

/// Requirements on a lagged regressor window.
#[derive(Debug, Clone, PartialEq)]
pub struct LagRequirement {
    pub name: String,
    pub n_lags: usize,
}

/// Encoded series plus train/validation sample lists.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingData {
    pub encoded: Vec<EncodedSeries>,
    pub train: Vec<SampleRef>,
    pub valid: Vec<SampleRef>,
    pub n_forecasts: usize,
}

/// Minimum observed rows a series needs.
///
/// Enough for one full lag window plus one full horizon, enough to place
/// every changepoint on its own observation, and never fewer than two.
pub fn minimum_history(max_lag: usize, n_forecasts: usize, n_changepoints: usize) -> usize {
    (max_lag + n_forecasts).max(n_changepoints + 1).max(2)
}

/// Check that every lagged regressor has values over the lookback window of
/// an origin.
///
/// Errors
/// ------
/// - `ForecastError::MissingRegressor` naming the first missing row.
pub fn check_lag_window(
    enc: &EncodedSeries, lagged: &[LagRequirement], origin: usize,
) -> ForecastResult<()> {
    for (col, req) in lagged.iter().enumerate() {
        let start = origin.saturating_sub(req.n_lags);
        for row in start..origin {
            if enc.lagged[col][row].is_nan() {
                return Err(ForecastError::MissingRegressor {
                    name: req.name.clone(),
                    timestamp: enc.timestamps[row],
                });
            }
        }
    }
    Ok(())
}

/// Enumerate training and validation samples.
///
/// Errors
/// ------
/// - `ForecastError::InsufficientData` if a series has no valid origin.
/// - `ForecastError::MissingRegressor` from [`check_lag_window`].
pub fn build_samples(
    encoded: Vec<EncodedSeries>, series_ids: &[String], max_lag: usize, n_forecasts: usize,
    lagged: &[LagRequirement], validation_fraction: f64,
) -> ForecastResult<TrainingData> {
    let mut train = Vec::new();
    let mut valid = Vec::new();
    for (idx, enc) in encoded.iter().enumerate() {
        let n = enc.n_history;
        if n < max_lag + n_forecasts {
            return Err(ForecastError::InsufficientData {
                series: series_ids.get(idx).cloned().unwrap_or_default(),
                required: max_lag + n_forecasts,
                actual: n,
            });
        }
        let origins: Vec<usize> = (max_lag..=n - n_forecasts).collect();
        for &origin in &origins {
            check_lag_window(enc, lagged, origin)?;
        }
        let n_valid = held_out(origins.len(), validation_fraction);
        let split = origins.len() - n_valid;
        train.extend(
            origins[..split].iter().map(|&origin| SampleRef { series: enc.series, origin }),
        );
        valid.extend(
            origins[split..].iter().map(|&origin| SampleRef { series: enc.series, origin }),
        );
    }
    Ok(TrainingData { encoded, train, valid, n_forecasts })
}

fn held_out(count: usize, fraction: f64) -> usize {
    if fraction <= 0.0 || count < 2 {
        return 0;
    }
    ((count as f64 * fraction).ceil() as usize).min(count - 1)
}
