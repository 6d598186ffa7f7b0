//! Time-indexed data containers for the forecasting engine.
//!
//! Purpose
//! -------
//! Provide small, validated containers for observed series and their side
//! signals. Everything downstream (normalization, encoding, training) may rely
//! on the invariants established here and never re-validates them.
//!
//! Key behaviors
//! -------------
//! - [`Series`] enforces non-emptiness, strictly increasing timestamps and
//!   finite values, and infers the sampling step.
//! - [`CovariateTable`] stores named regressor columns on its own timestamp
//!   grid; missing values are encoded as `NaN` and reported by lookups as
//!   `None`.
//! - [`SeriesFrame`] pairs a series with its optional covariates; it is the
//!   unit handed to `fit`/`predict`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Timestamps are naive (timezone-free) and strictly increasing.
//! - Gaps are allowed but never filled here; regular sampling is the caller's
//!   responsibility.
//!
//! Conventions
//! -----------
//! - Indexing is 0-based.
//! - A covariate table may extend beyond the series (future values for
//!   prediction) or start before it.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the validation paths, step inference and covariate
//!   lookups.
use crate::forecasting::errors::{ForecastError, ForecastResult};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use ndarray::Array1;
use std::collections::{BTreeMap, HashMap};

/// One observed time series.
///
/// Invariants
/// ----------
/// - `timestamps.len() == values.len() > 0`.
/// - Timestamps strictly increasing.
/// - Every value finite.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    id: String,
    timestamps: Vec<NaiveDateTime>,
    values: Array1<f64>,
}

impl Series {
    /// Construct a validated series.
    ///
    /// Errors
    /// ------
    /// - `ForecastError::EmptySeries` for zero observations.
    /// - `ForecastError::LengthMismatch` if timestamps and values differ in length.
    /// - `ForecastError::NonMonotonicTimestamps` at the first non-increasing step.
    /// - `ForecastError::NonFiniteData` at the first NaN/±inf value.
    pub fn new(
        id: impl Into<String>, timestamps: Vec<NaiveDateTime>, values: Array1<f64>,
    ) -> ForecastResult<Self> {
        let id = id.into();
        if values.len() != timestamps.len() {
            return Err(ForecastError::LengthMismatch {
                what: "series values",
                expected: timestamps.len(),
                actual: values.len(),
            });
        }
        if timestamps.is_empty() {
            return Err(ForecastError::EmptySeries { series: id });
        }
        if let Some(index) = first_non_increasing(&timestamps) {
            return Err(ForecastError::NonMonotonicTimestamps { series: id, index });
        }
        for (index, &value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(ForecastError::NonFiniteData { series: id, index, value });
            }
        }
        Ok(Self { id, timestamps, values })
    }

    /// Daily convenience constructor; every date is taken at midnight.
    pub fn from_dates(
        id: impl Into<String>, dates: &[NaiveDate], values: Array1<f64>,
    ) -> ForecastResult<Self> {
        let timestamps = dates.iter().map(|d| d.and_time(NaiveTime::default())).collect();
        Self::new(id, timestamps, values)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_timestamp(&self) -> NaiveDateTime {
        self.timestamps[0]
    }

    pub fn last_timestamp(&self) -> NaiveDateTime {
        self.timestamps[self.timestamps.len() - 1]
    }

    /// Covered span in fractional days.
    pub fn span_days(&self) -> f64 {
        duration_days(self.last_timestamp() - self.first_timestamp())
    }

    /// Most common spacing between consecutive timestamps.
    ///
    /// Ties resolve to the shorter spacing. Returns `None` for single-point
    /// series.
    pub fn infer_step(&self) -> Option<Duration> {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for pair in self.timestamps.windows(2) {
            *counts.entry((pair[1] - pair[0]).num_seconds()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(secs, _)| Duration::seconds(secs))
    }
}

/// Named covariate columns on a shared timestamp grid.
///
/// Values are stored as `f64`; `NaN` marks a missing observation.
#[derive(Debug, Clone, PartialEq)]
pub struct CovariateTable {
    timestamps: Vec<NaiveDateTime>,
    columns: BTreeMap<String, Array1<f64>>,
}

impl CovariateTable {
    /// Start an empty table on `timestamps` (strictly increasing).
    ///
    /// Errors
    /// ------
    /// - `ForecastError::NonMonotonicTimestamps` (series label `"covariates"`).
    pub fn new(timestamps: Vec<NaiveDateTime>) -> ForecastResult<Self> {
        if let Some(index) = first_non_increasing(&timestamps) {
            return Err(ForecastError::NonMonotonicTimestamps {
                series: "covariates".into(),
                index,
            });
        }
        Ok(Self { timestamps, columns: BTreeMap::new() })
    }

    /// Add (or replace) a column.
    ///
    /// Errors
    /// ------
    /// - `ForecastError::LengthMismatch` if `values` does not match the grid.
    /// - `ForecastError::NonFiniteData` for ±inf (NaN is allowed and means
    ///   missing).
    pub fn with_column(
        mut self, name: impl Into<String>, values: Array1<f64>,
    ) -> ForecastResult<Self> {
        let name = name.into();
        if values.len() != self.timestamps.len() {
            return Err(ForecastError::LengthMismatch {
                what: "covariate column",
                expected: self.timestamps.len(),
                actual: values.len(),
            });
        }
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| v.is_infinite()) {
            return Err(ForecastError::NonFiniteData { series: name, index, value });
        }
        self.columns.insert(name, values);
        Ok(self)
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Value of `name` at `ts`, or `None` when the column, the timestamp or
    /// the observation is missing.
    pub fn value(&self, name: &str, ts: NaiveDateTime) -> Option<f64> {
        let column = self.columns.get(name)?;
        let idx = self.timestamps.binary_search(&ts).ok()?;
        let v = column[idx];
        if v.is_nan() { None } else { Some(v) }
    }
}

/// A series plus its optional covariates.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFrame {
    pub series: Series,
    pub covariates: Option<CovariateTable>,
}

impl SeriesFrame {
    pub fn new(series: Series) -> Self {
        Self { series, covariates: None }
    }

    pub fn with_covariates(mut self, covariates: CovariateTable) -> Self {
        self.covariates = Some(covariates);
        self
    }

    pub fn id(&self) -> &str {
        self.series.id()
    }
}

/// Fractional days of a chrono duration.
pub fn duration_days(d: Duration) -> f64 {
    d.num_seconds() as f64 / 86_400.0
}

fn first_non_increasing(timestamps: &[NaiveDateTime]) -> Option<usize> {
    timestamps.windows(2).position(|w| w[1] <= w[0]).map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - `Series::new` happy path and each validation failure.
    // - Step inference with irregular gaps.
    // - Covariate lookups including missing values.
    // -------------------------------------------------------------------------

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // A well-formed series is accepted and reports its span.
    fn series_new_accepts_valid_input() {
        let s = Series::new("a", vec![day(1), day(2), day(4)], array![1.0, 2.0, 3.0]).unwrap();

        assert_eq!(s.len(), 3);
        assert_eq!(s.id(), "a");
        assert!((s.span_days() - 3.0).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Each invariant violation maps to its own error.
    fn series_new_rejects_invalid_input() {
        assert!(matches!(
            Series::new("a", vec![], array![]),
            Err(ForecastError::EmptySeries { .. })
        ));
        assert!(matches!(
            Series::new("a", vec![day(2), day(2)], array![1.0, 2.0]),
            Err(ForecastError::NonMonotonicTimestamps { index: 1, .. })
        ));
        assert!(matches!(
            Series::new("a", vec![day(1), day(2)], array![1.0, f64::NAN]),
            Err(ForecastError::NonFiniteData { index: 1, .. })
        ));
        assert!(matches!(
            Series::new("a", vec![day(1)], array![1.0, 2.0]),
            Err(ForecastError::LengthMismatch { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // The inferred step is the most common spacing, ignoring sporadic gaps.
    //
    // Given
    // -----
    // - Days 1, 2, 3, 4, 7 (three 1-day steps and one 3-day gap).
    //
    // Expect
    // ------
    // - One day.
    fn infer_step_uses_mode() {
        let s = Series::new(
            "a",
            vec![day(1), day(2), day(3), day(4), day(7)],
            array![0.0, 0.0, 0.0, 0.0, 0.0],
        )
        .unwrap();

        assert_eq!(s.infer_step(), Some(Duration::days(1)));
    }

    #[test]
    // Purpose
    // -------
    // Lookups return `None` for missing columns, timestamps and NaN cells.
    fn covariate_lookup_handles_missing() {
        let table = CovariateTable::new(vec![day(1), day(2)])
            .unwrap()
            .with_column("x", array![1.5, f64::NAN])
            .unwrap();

        assert_eq!(table.value("x", day(1)), Some(1.5));
        assert_eq!(table.value("x", day(2)), None);
        assert_eq!(table.value("x", day(3)), None);
        assert_eq!(table.value("y", day(1)), None);
        assert!(table.has_column("x"));
    }
}
