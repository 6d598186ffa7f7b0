//! Normalization statistics for values, regressors and time.
//!
//! Purpose
//! -------
//! Establish, once per `fit`, the affine maps that bring observations and
//! regressors to a unit scale and timestamps to `[0, 1]`. The same constants
//! are reused verbatim for every later `predict`.
//!
//! Key behaviors
//! -------------
//! - [`ShiftScale::fit`] derives `(shift, scale)` from a sample under a
//!   [`NormalizeMode`] using `statrs` order statistics.
//! - [`TimeNormalization`] maps a timestamp to `(ts − start) / span` in days;
//!   dates after the training window extrapolate beyond 1.
//! - [`SeriesStats`] bundles the value map and the per-regressor maps of one
//!   series.
//!
//! Invariants & assumptions
//! ------------------------
//! - `scale` is always finite and strictly positive; degenerate samples
//!   (constant or single-valued) fall back to `scale = 1`.
//! - Time normalization is global across all series of a fit.
use crate::forecasting::{
    core::data::duration_days,
    errors::{ForecastError, ForecastResult},
};
use chrono::NaiveDateTime;
use statrs::statistics::{Data, Distribution, Max, Min, OrderStatistics};
use std::collections::BTreeMap;

/// How raw values are brought to unit scale.
///
/// - `Soft`: min → 0, 95th percentile → 1.
/// - `Soft1`: min → 0.1, 90th percentile → 0.9.
/// - `MinMax`: min → 0, max → 1.
/// - `Standardize`: zero mean, unit standard deviation.
/// - `Auto`: `MinMax` for binary signals, `Soft` otherwise.
/// - `Off`: identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizeMode {
    #[default]
    Auto,
    Soft,
    Soft1,
    MinMax,
    Standardize,
    Off,
}

/// Affine map `x ↦ (x − shift) / scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftScale {
    pub shift: f64,
    pub scale: f64,
}

impl ShiftScale {
    pub fn identity() -> Self {
        Self { shift: 0.0, scale: 1.0 }
    }

    /// Fit the map on `values` (all finite, non-empty).
    ///
    /// Errors
    /// ------
    /// - `ForecastError::Configuration` if `values` is empty or contains
    ///   non-finite entries.
    pub fn fit(values: &[f64], mode: NormalizeMode) -> ForecastResult<Self> {
        if values.is_empty() {
            return Err(ForecastError::config("normalize", "cannot fit statistics on no values"));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::config("normalize", "statistics require finite values"));
        }
        let mut data = Data::new(values.to_vec());
        let min = Min::min(&data);
        let max = Max::max(&data);
        let mode = match mode {
            NormalizeMode::Auto if is_binary(values) => NormalizeMode::MinMax,
            NormalizeMode::Auto => NormalizeMode::Soft,
            other => other,
        };
        let (shift, scale) = match mode {
            NormalizeMode::Off | NormalizeMode::Auto => (0.0, 1.0),
            NormalizeMode::MinMax => (min, max - min),
            NormalizeMode::Soft => (min, data.quantile(0.95) - min),
            NormalizeMode::Soft1 => {
                let scale = (data.quantile(0.90) - min) / 0.8;
                (min - 0.1 * scale, scale)
            }
            NormalizeMode::Standardize => {
                (data.mean().unwrap_or(0.0), data.std_dev().unwrap_or(1.0))
            }
        };
        let scale = if scale.is_finite() && scale > 1e-12 { scale } else { 1.0 };
        let shift = if shift.is_finite() { shift } else { 0.0 };
        Ok(Self { shift, scale })
    }

    pub fn normalize(&self, x: f64) -> f64 {
        (x - self.shift) / self.scale
    }

    pub fn denormalize(&self, x: f64) -> f64 {
        x * self.scale + self.shift
    }
}

fn is_binary(values: &[f64]) -> bool {
    let mut distinct: Vec<f64> = Vec::with_capacity(2);
    for &v in values {
        if !distinct.contains(&v) {
            if distinct.len() == 2 {
                return false;
            }
            distinct.push(v);
        }
    }
    distinct.len() == 2
}

/// Global time map shared by every series of a fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeNormalization {
    pub start: NaiveDateTime,
    pub span_days: f64,
}

impl TimeNormalization {
    /// Span between `start` and `end`; a zero span is replaced by one day.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let span = duration_days(end - start);
        let span_days = if span > 0.0 { span } else { 1.0 };
        Self { start, span_days }
    }

    /// Normalized position of `ts`: 0 at `start`, 1 at the end of training.
    pub fn position(&self, ts: NaiveDateTime) -> f64 {
        duration_days(ts - self.start) / self.span_days
    }
}

/// Value and regressor maps for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStats {
    pub y: ShiftScale,
    pub regressors: BTreeMap<String, ShiftScale>,
}

impl SeriesStats {
    /// Regressor map, or the identity when the name is unknown.
    pub fn regressor(&self, name: &str) -> ShiftScale {
        self.regressors.get(name).copied().unwrap_or_else(ShiftScale::identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - Each normalization mode on a known sample.
    // - Degenerate inputs fall back to unit scale.
    // - Time positions inside and beyond the training window.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // `MinMax` maps min to 0 and max to 1; `Off` is the identity.
    fn minmax_and_off() {
        let v = [2.0, 4.0, 6.0];

        let mm = ShiftScale::fit(&v, NormalizeMode::MinMax).unwrap();
        let off = ShiftScale::fit(&v, NormalizeMode::Off).unwrap();

        assert_relative_eq!(mm.normalize(2.0), 0.0);
        assert_relative_eq!(mm.normalize(6.0), 1.0);
        assert_eq!(off, ShiftScale::identity());
    }

    #[test]
    // Purpose
    // -------
    // `Standardize` yields zero mean and `Auto` treats binary data as MinMax.
    fn standardize_and_auto_binary() {
        let v = [1.0, 2.0, 3.0, 4.0];
        let st = ShiftScale::fit(&v, NormalizeMode::Standardize).unwrap();
        let mean: f64 = v.iter().map(|&x| st.normalize(x)).sum::<f64>() / 4.0;
        let bin = ShiftScale::fit(&[0.0, 5.0, 0.0], NormalizeMode::Auto).unwrap();

        assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
        assert_relative_eq!(bin.shift, 0.0);
        assert_relative_eq!(bin.scale, 5.0);
    }

    #[test]
    // Purpose
    // -------
    // Constant samples cannot define a scale and fall back to 1; the map
    // still round-trips values.
    fn constant_sample_falls_back_to_unit_scale() {
        let ss = ShiftScale::fit(&[3.0, 3.0, 3.0], NormalizeMode::Soft).unwrap();

        assert_relative_eq!(ss.scale, 1.0);
        assert_relative_eq!(ss.denormalize(ss.normalize(7.5)), 7.5, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Empty and non-finite samples are rejected.
    fn invalid_samples_are_rejected() {
        assert!(ShiftScale::fit(&[], NormalizeMode::Soft).is_err());
        assert!(ShiftScale::fit(&[f64::NAN], NormalizeMode::Soft).is_err());
    }

    #[test]
    // Purpose
    // -------
    // Time positions are 0 at the start, 1 at the end, and extrapolate.
    fn time_positions_extrapolate() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let later = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let tn = TimeNormalization::new(start, end);

        assert_relative_eq!(tn.position(start), 0.0);
        assert_relative_eq!(tn.position(end), 1.0);
        assert_relative_eq!(tn.position(later), 1.5);
    }
}
