//! Time feature encoder.
//!
//! Purpose
//! -------
//! Turn raw timestamps, values and side signals of one series into the
//! dense, normalized arrays every component reads. The encoder is a frozen
//! [`FeaturePlan`] established once at `fit`; `predict` re-applies the same
//! plan (same time origin and span, same normalization constants) to new
//! timestamps.
//!
//! Key behaviors
//! -------------
//! - Normalized trend position `t` (0 at the earliest training timestamp, 1
//!   at the latest, extrapolating beyond 1 for future dates).
//! - `2·order` Fourier columns per seasonality, interleaved `sin, cos` for
//!   harmonics `1..=order`.
//! - One indicator block per event (see `core::events::event_indicators`).
//! - Future regressors normalized per regressor; a missing value anywhere in
//!   the encoded range is a `MissingRegressor` error.
//! - Lagged regressors normalized per regressor; missing values are kept as
//!   `NaN` and rejected later, only for the lookback windows actually used.
//!
//! Conventions
//! -----------
//! - Fourier phase is measured in days since the Unix epoch, so features do
//!   not depend on the training window.
//! - Rows `0..n_history` carry observed values; later rows are future rows
//!   with `y = NaN`.
use crate::forecasting::{
    core::{
        data::{duration_days, CovariateTable},
        events::{event_indicators, EventTable, HolidayCalendar},
        normalization::{SeriesStats, TimeNormalization},
    },
    errors::{ForecastError, ForecastResult},
};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use ndarray::{Array1, Array2};
use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::ops::RangeInclusive;

/// Fourier design matrix for one period.
///
/// Column `2(k−1)` is `sin(2πk·d/P)`, column `2(k−1)+1` is `cos(2πk·d/P)`,
/// where `d` is days since the Unix epoch and `P = period_days`. Order 0
/// yields a matrix with no columns.
pub fn fourier_features(
    timestamps: &[NaiveDateTime], period_days: f64, order: usize,
) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((timestamps.len(), 2 * order));
    for (r, ts) in timestamps.iter().enumerate() {
        let days = epoch_days(*ts);
        for k in 1..=order {
            let angle = 2.0 * PI * k as f64 * days / period_days;
            out[[r, 2 * (k - 1)]] = angle.sin();
            out[[r, 2 * (k - 1) + 1]] = angle.cos();
        }
    }
    out
}

fn epoch_days(ts: NaiveDateTime) -> f64 {
    let utc = ts.and_utc();
    (utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) * 1e-9) / 86_400.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalPlan {
    pub name: String,
    pub period_days: f64,
    pub order: usize,
}

/// Where an event block takes its trigger dates from.
#[derive(Debug, Clone, PartialEq)]
pub enum EventSource {
    /// The caller's [`EventTable`], looked up by event name.
    User,
    /// The holiday calendar, for the given country.
    Holiday { country: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventBlockPlan {
    pub name: String,
    pub source: EventSource,
    pub lower_window: u32,
    pub upper_window: u32,
}

impl EventBlockPlan {
    pub fn width(&self) -> usize {
        (self.lower_window + self.upper_window + 1) as usize
    }
}

/// Frozen encoding recipe shared by `fit` and every later `predict`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePlan {
    pub time: TimeNormalization,
    pub seasonalities: Vec<SeasonalPlan>,
    pub events: Vec<EventBlockPlan>,
    pub future_regressors: Vec<String>,
    pub lagged_regressors: Vec<String>,
}

/// Raw inputs for one encoding call.
///
/// `values` holds the observed values of the first `values.len()` rows of
/// `timestamps`; the remaining rows are future rows.
#[derive(Debug, Clone, Copy)]
pub struct EncodeInput<'a> {
    pub series: usize,
    pub timestamps: &'a [NaiveDateTime],
    pub values: &'a [f64],
    pub covariates: Option<&'a CovariateTable>,
    pub stats: &'a SeriesStats,
    pub events: Option<&'a EventTable>,
    pub calendar: Option<&'a dyn HolidayCalendar>,
}

/// Encoded features of one series over a contiguous block of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSeries {
    pub series: usize,
    pub timestamps: Vec<NaiveDateTime>,
    pub t: Array1<f64>,
    pub seasonal: Vec<Array2<f64>>,
    pub events: Vec<Array2<f64>>,
    pub future_regressors: Array2<f64>,
    pub lagged: Vec<Array1<f64>>,
    pub y: Array1<f64>,
    pub n_history: usize,
}

impl EncodedSeries {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

impl FeaturePlan {
    /// Encode one series.
    ///
    /// Errors
    /// ------
    /// - `ForecastError::LengthMismatch` if there are more values than
    ///   timestamps.
    /// - `ForecastError::MissingRegressor` if a future regressor has no value
    ///   at some row.
    /// - Errors from the holiday calendar are propagated.
    pub fn encode(&self, input: EncodeInput<'_>) -> ForecastResult<EncodedSeries> {
        let ts = input.timestamps;
        let n = ts.len();
        if input.values.len() > n {
            return Err(ForecastError::LengthMismatch {
                what: "encoded values",
                expected: n,
                actual: input.values.len(),
            });
        }

        let t = ts.iter().map(|&x| self.time.position(x)).collect::<Array1<f64>>();

        let seasonal = self
            .seasonalities
            .iter()
            .map(|s| fourier_features(ts, s.period_days, s.order))
            .collect();

        let mut events = Vec::with_capacity(self.events.len());
        for block in &self.events {
            let triggers: Option<BTreeSet<NaiveDate>> = match &block.source {
                EventSource::User => input.events.and_then(|e| e.dates(&block.name)).cloned(),
                EventSource::Holiday { country } => match (input.calendar, ts.first(), ts.last()) {
                    (Some(cal), Some(&first), Some(&last)) => {
                        let years =
                            trigger_years(first, last, block.lower_window, block.upper_window);
                        cal.holidays(country, years)?.remove(&block.name)
                    }
                    _ => None,
                },
            };
            events.push(event_indicators(
                ts,
                triggers.as_ref(),
                block.lower_window,
                block.upper_window,
            ));
        }

        let mut future_regressors = Array2::<f64>::zeros((n, self.future_regressors.len()));
        for (c, name) in self.future_regressors.iter().enumerate() {
            let norm = input.stats.regressor(name);
            for (r, &stamp) in ts.iter().enumerate() {
                let raw = input
                    .covariates
                    .and_then(|cov| cov.value(name, stamp))
                    .ok_or_else(|| ForecastError::MissingRegressor {
                        name: name.clone(),
                        timestamp: stamp,
                    })?;
                future_regressors[[r, c]] = norm.normalize(raw);
            }
        }

        let lagged = self
            .lagged_regressors
            .iter()
            .map(|name| {
                let norm = input.stats.regressor(name);
                ts.iter()
                    .map(|&stamp| {
                        input
                            .covariates
                            .and_then(|cov| cov.value(name, stamp))
                            .map_or(f64::NAN, |raw| norm.normalize(raw))
                    })
                    .collect::<Array1<f64>>()
            })
            .collect();

        let mut y = Array1::<f64>::from_elem(n, f64::NAN);
        for (r, &v) in input.values.iter().enumerate() {
            y[r] = input.stats.y.normalize(v);
        }

        Ok(EncodedSeries {
            series: input.series,
            timestamps: ts.to_vec(),
            t,
            seasonal,
            events,
            future_regressors,
            lagged,
            y,
            n_history: input.values.len(),
        })
    }
}

/// Calendar years whose triggers can touch a row in `first..=last`.
///
/// A trigger `d` marks rows from `d − lower_window` to `d + upper_window`, so
/// the range reaches `upper_window` days before `first` and `lower_window`
/// days after `last`.
pub fn trigger_years(
    first: NaiveDateTime, last: NaiveDateTime, lower_window: u32, upper_window: u32,
) -> RangeInclusive<i32> {
    let from = first.date();
    let to = last.date();
    let start = from.checked_sub_signed(Duration::days(i64::from(upper_window))).unwrap_or(from);
    let end = to.checked_add_signed(Duration::days(i64::from(lower_window))).unwrap_or(to);
    start.year()..=end.year()
}

/// `count` timestamps continuing `last` with spacing `step`.
///
/// Errors
/// ------
/// - `ForecastError::Configuration` (`future_periods`) if the grid leaves the
///   representable calendar.
pub fn future_grid(
    last: NaiveDateTime, step: Duration, count: usize,
) -> ForecastResult<Vec<NaiveDateTime>> {
    let overflow =
        || ForecastError::config("future_periods", "horizon leaves the supported calendar");
    let periods = i32::try_from(count).map_err(|_| overflow())?;
    (1..=periods)
        .map(|k| step.checked_mul(k).and_then(|d| last.checked_add_signed(d)).ok_or_else(overflow))
        .collect()
}

/// Fractional days of a step, for seasonality auto-detection.
pub fn step_days(step: Duration) -> f64 {
    duration_days(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecasting::core::normalization::ShiftScale;
    use crate::forecasting::core::events::StaticHolidayCalendar;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - Fourier columns: shape, periodicity, order 0.
    // - Full encoding: time positions, future rows, regressors.
    // -------------------------------------------------------------------------

    fn day(offset: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
            + Duration::days(offset)
    }

    fn stats() -> SeriesStats {
        SeriesStats { y: ShiftScale { shift: 1.0, scale: 2.0 }, regressors: BTreeMap::new() }
    }

    #[test]
    // Purpose
    // -------
    // Weekly features repeat every 7 days and order 0 has no columns.
    fn fourier_features_are_periodic() {
        let ts: Vec<_> = (0..15).map(day).collect();

        let x = fourier_features(&ts, 7.0, 3);
        let empty = fourier_features(&ts, 7.0, 0);

        assert_eq!(x.dim(), (15, 6));
        for c in 0..6 {
            assert_relative_eq!(x[[0, c]], x[[7, c]], epsilon = 1e-9);
            assert_relative_eq!(x[[3, c]], x[[10, c]], epsilon = 1e-9);
        }
        assert_eq!(empty.dim(), (15, 0));
    }

    proptest! {
        #[test]
        // Purpose
        // -------
        // Each sin/cos pair lies on the unit circle.
        fn fourier_pairs_are_unit_norm(offset in 0i64..5000, order in 1usize..6) {
            let x = fourier_features(&[day(offset)], 365.25, order);
            for k in 0..order {
                let norm = x[[0, 2 * k]].powi(2) + x[[0, 2 * k + 1]].powi(2);
                prop_assert!((norm - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Encoding normalizes values, marks future rows as NaN and extrapolates
    // time beyond 1.
    //
    // Given
    // -----
    // - Time span Jan 1 → Jan 5; rows Jan 1..Jan 7 with 5 observed values.
    //
    // Expect
    // ------
    // - `t` = 0, 0.25, …, 1.5; `y[0] = (3 − 1) / 2 = 1`; rows 5, 6 NaN.
    fn encode_marks_future_rows() {
        let plan = FeaturePlan {
            time: TimeNormalization::new(day(0), day(4)),
            seasonalities: vec![SeasonalPlan { name: "weekly".into(), period_days: 7.0, order: 2 }],
            events: Vec::new(),
            future_regressors: Vec::new(),
            lagged_regressors: Vec::new(),
        };
        let ts: Vec<_> = (0..7).map(day).collect();
        let s = stats();

        let enc = plan
            .encode(EncodeInput {
                series: 0,
                timestamps: &ts,
                values: &[3.0, 3.0, 3.0, 3.0, 3.0],
                covariates: None,
                stats: &s,
                events: None,
                calendar: None,
            })
            .unwrap();

        assert_eq!(enc.n_history, 5);
        assert_relative_eq!(enc.t[6], 1.5);
        assert_relative_eq!(enc.y[0], 1.0);
        assert!(enc.y[5].is_nan() && enc.y[6].is_nan());
        assert_eq!(enc.seasonal[0].dim(), (7, 4));
    }

    #[test]
    // Purpose
    // -------
    // A future regressor without a value at some encoded row is reported
    // with the offending timestamp; lagged regressors keep NaN instead.
    fn missing_future_regressor_is_an_error() {
        let ts: Vec<_> = (0..3).map(day).collect();
        let cov = CovariateTable::new(ts.clone())
            .unwrap()
            .with_column("x", ndarray::array![1.0, f64::NAN, 2.0])
            .unwrap();
        let mut plan = FeaturePlan {
            time: TimeNormalization::new(day(0), day(2)),
            seasonalities: Vec::new(),
            events: Vec::new(),
            future_regressors: Vec::new(),
            lagged_regressors: vec!["x".into()],
        };
        let s = stats();
        let input = EncodeInput {
            series: 0,
            timestamps: &ts,
            values: &[1.0, 1.0, 1.0],
            covariates: Some(&cov),
            stats: &s,
            events: None,
            calendar: None,
        };

        let lagged = plan.encode(input).unwrap();
        plan.future_regressors.push("x".into());
        let err = plan.encode(input).unwrap_err();

        assert!(lagged.lagged[0][1].is_nan());
        assert_relative_eq!(lagged.lagged[0][2], 2.0);
        assert_eq!(err, ForecastError::MissingRegressor { name: "x".into(), timestamp: day(1) });
    }

    #[test]
    // Purpose
    // -------
    // The future grid continues the last timestamp by whole steps.
    fn future_grid_steps_forward() {
        let grid = future_grid(day(10), Duration::days(1), 3).unwrap();

        assert_eq!(grid, vec![day(11), day(12), day(13)]);
        assert_relative_eq!(step_days(Duration::hours(12)), 0.5);
    }

    #[test]
    // Purpose
    // -------
    // Horizons beyond the calendar are rejected instead of panicking.
    //
    // Given
    // -----
    // - A count that does not fit the step multiplier, and a step so large
    //   that the first future timestamp is out of range.
    //
    // Expect
    // ------
    // - Both return `Configuration` on `future_periods`.
    fn future_grid_rejects_overflow() {
        let too_many = future_grid(day(0), Duration::days(1), usize::MAX);
        let too_far = future_grid(day(0), Duration::days(1_000_000_000), 2);

        for result in [too_many, too_far] {
            assert!(matches!(
                result,
                Err(ForecastError::Configuration { param: "future_periods", .. })
            ));
        }
    }

    #[test]
    // Purpose
    // -------
    // Holiday windows that cross a year boundary see triggers from the
    // neighbouring year.
    //
    // Given
    // -----
    // - Rows Dec 29 2024 → Dec 31 2024 (the helper starts at Jan 1 2024).
    // - "new_year" on Jan 1 2025 with a lower window of 2 days; "eve" on
    //   Dec 31 2023 with an upper window of 1 day, against rows from
    //   Jan 1 2024.
    //
    // Expect
    // ------
    // - Dec 30 and Dec 31 are marked at offsets −2 and −1.
    // - Jan 1 2024 is marked at offset +1 for the earlier-year trigger.
    fn holiday_windows_cross_year_boundaries() {
        let new_year = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let eve = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let calendar = StaticHolidayCalendar::new()
            .with_holiday("XX", "new_year", [new_year])
            .with_holiday("XX", "eve", [eve]);
        let holiday = |name: &str, lower_window, upper_window| EventBlockPlan {
            name: name.into(),
            source: EventSource::Holiday { country: "XX".into() },
            lower_window,
            upper_window,
        };
        let plan = FeaturePlan {
            time: TimeNormalization::new(day(0), day(365)),
            seasonalities: Vec::new(),
            events: vec![holiday("new_year", 2, 0), holiday("eve", 0, 1)],
            future_regressors: Vec::new(),
            lagged_regressors: Vec::new(),
        };
        let s = stats();
        let late: Vec<_> = (363..366).map(day).collect();
        let early: Vec<_> = (0..2).map(day).collect();
        let encode = |ts: &[NaiveDateTime]| {
            plan.encode(EncodeInput {
                series: 0,
                timestamps: ts,
                values: &[],
                covariates: None,
                stats: &s,
                events: None,
                calendar: Some(&calendar),
            })
            .unwrap()
        };

        let at_end = encode(&late);
        let at_start = encode(&early);

        assert_eq!(late[0].date(), NaiveDate::from_ymd_opt(2024, 12, 29).unwrap());
        assert_eq!(at_end.events[0].column(0).to_vec(), vec![0.0, 1.0, 0.0]);
        assert_eq!(at_end.events[0].column(1).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(at_start.events[1].column(1).to_vec(), vec![1.0, 0.0]);
        assert_eq!(trigger_years(late[0], late[2], 2, 0), 2024..=2025);
    }
}
