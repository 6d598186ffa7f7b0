//! Calendar events, their activity windows, and the holiday-calendar
//! collaborator.
//!
//! Purpose
//! -------
//! Describe named calendar occurrences (user events and country holidays) and
//! turn them into per-offset indicator features.
//!
//! Key behaviors
//! -------------
//! - [`EventTable`] maps event names to their trigger dates.
//! - [`EventConfig`] declares one user event: its activity window (days
//!   before/after each trigger), composition mode and optional L2 strength.
//! - [`CountryHolidaysConfig`] declares a country whose holidays are pulled
//!   from a [`HolidayCalendar`]; every holiday name becomes its own event
//!   with the shared window settings.
//! - [`event_indicators`] builds the `(n_timestamps × window)` 0/1 matrix for
//!   one event.
//!
//! Conventions
//! -----------
//! - Windows are given as non-negative day counts: `lower_window` days before
//!   and `upper_window` days after each trigger. One feature exists per offset
//!   in `-lower_window ..= upper_window`, in that order.
//! - Activity compares calendar dates only; the time of day is ignored.
use crate::forecasting::{
    core::options::ComponentMode,
    errors::{ForecastError, ForecastResult},
};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use ndarray::Array2;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::ops::RangeInclusive;

/// Trigger dates per event name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    occurrences: BTreeMap<String, BTreeSet<NaiveDate>>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add trigger dates for `name` (merged with any existing ones).
    pub fn with_event(
        mut self, name: impl Into<String>, dates: impl IntoIterator<Item = NaiveDate>,
    ) -> Self {
        self.occurrences.entry(name.into()).or_default().extend(dates);
        self
    }

    pub fn dates(&self, name: &str) -> Option<&BTreeSet<NaiveDate>> {
        self.occurrences.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.occurrences.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.occurrences.keys().map(String::as_str)
    }
}

/// One user-declared event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventConfig {
    pub name: String,
    pub lower_window: u32,
    pub upper_window: u32,
    pub mode: ComponentMode,
    pub regularization: Option<f64>,
}

impl EventConfig {
    /// Additive event active on its trigger day only.
    ///
    /// Errors
    /// ------
    /// - `ForecastError::Configuration` for an empty name.
    pub fn new(name: impl Into<String>) -> ForecastResult<Self> {
        let name = name.into();
        validate_name("event", &name)?;
        Ok(Self {
            name,
            lower_window: 0,
            upper_window: 0,
            mode: ComponentMode::Additive,
            regularization: None,
        })
    }

    pub fn with_window(mut self, lower_window: u32, upper_window: u32) -> Self {
        self.lower_window = lower_window;
        self.upper_window = upper_window;
        self
    }

    pub fn with_mode(mut self, mode: ComponentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Errors
    /// ------
    /// - `ForecastError::Configuration` if `reg` is negative or non-finite.
    pub fn with_regularization(mut self, reg: f64) -> ForecastResult<Self> {
        validate_regularization("event regularization", reg)?;
        self.regularization = Some(reg);
        Ok(self)
    }

    pub fn n_features(&self) -> usize {
        (self.lower_window + self.upper_window + 1) as usize
    }
}

/// Country-holiday expansion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryHolidaysConfig {
    pub country: String,
    pub lower_window: u32,
    pub upper_window: u32,
    pub mode: ComponentMode,
    pub regularization: Option<f64>,
}

impl CountryHolidaysConfig {
    pub fn new(country: impl Into<String>) -> ForecastResult<Self> {
        let country = country.into();
        validate_name("country", &country)?;
        Ok(Self {
            country,
            lower_window: 0,
            upper_window: 0,
            mode: ComponentMode::Additive,
            regularization: None,
        })
    }

    pub fn with_window(mut self, lower_window: u32, upper_window: u32) -> Self {
        self.lower_window = lower_window;
        self.upper_window = upper_window;
        self
    }

    pub fn with_mode(mut self, mode: ComponentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_regularization(mut self, reg: f64) -> ForecastResult<Self> {
        validate_regularization("holiday regularization", reg)?;
        self.regularization = Some(reg);
        Ok(self)
    }

    /// Event declaration for one holiday name of this country.
    pub(crate) fn event_for(&self, holiday: &str) -> EventConfig {
        EventConfig {
            name: holiday.to_string(),
            lower_window: self.lower_window,
            upper_window: self.upper_window,
            mode: self.mode,
            regularization: self.regularization,
        }
    }
}

/// Source of country holiday dates.
///
/// Implementations return every holiday of `country` whose date falls in one
/// of `years`, keyed by holiday name.
pub trait HolidayCalendar: Send + Sync + Debug {
    fn holidays(
        &self, country: &str, years: RangeInclusive<i32>,
    ) -> ForecastResult<BTreeMap<String, BTreeSet<NaiveDate>>>;
}

/// In-memory [`HolidayCalendar`] populated by the caller.
#[derive(Debug, Clone, Default)]
pub struct StaticHolidayCalendar {
    countries: BTreeMap<String, BTreeMap<String, BTreeSet<NaiveDate>>>,
}

impl StaticHolidayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holiday(
        mut self, country: impl Into<String>, name: impl Into<String>,
        dates: impl IntoIterator<Item = NaiveDate>,
    ) -> Self {
        self.countries
            .entry(country.into())
            .or_default()
            .entry(name.into())
            .or_default()
            .extend(dates);
        self
    }
}

impl HolidayCalendar for StaticHolidayCalendar {
    fn holidays(
        &self, country: &str, years: RangeInclusive<i32>,
    ) -> ForecastResult<BTreeMap<String, BTreeSet<NaiveDate>>> {
        let table = self.countries.get(country).ok_or_else(|| {
            ForecastError::config("country", format!("no holidays known for country '{country}'"))
        })?;
        Ok(table
            .iter()
            .map(|(name, dates)| {
                let kept = dates.iter().filter(|d| years.contains(&d.year())).copied().collect();
                (name.clone(), kept)
            })
            .collect())
    }
}

/// 0/1 indicator matrix for one event.
///
/// Column `k` corresponds to offset `o = k − lower_window`; cell `(r, k)` is 1
/// when the date of `timestamps[r]` minus `o` days is a trigger date.
pub fn event_indicators(
    timestamps: &[NaiveDateTime], triggers: Option<&BTreeSet<NaiveDate>>, lower_window: u32,
    upper_window: u32,
) -> Array2<f64> {
    let width = (lower_window + upper_window + 1) as usize;
    let mut out = Array2::<f64>::zeros((timestamps.len(), width));
    let Some(triggers) = triggers else {
        return out;
    };
    if triggers.is_empty() {
        return out;
    }
    for (r, ts) in timestamps.iter().enumerate() {
        let date = ts.date();
        for k in 0..width {
            let offset = k as i64 - lower_window as i64;
            if let Some(trigger) = date.checked_sub_signed(Duration::days(offset)) {
                if triggers.contains(&trigger) {
                    out[[r, k]] = 1.0;
                }
            }
        }
    }
    out
}

pub(crate) fn validate_name(what: &'static str, name: &str) -> ForecastResult<()> {
    if name.trim().is_empty() {
        return Err(ForecastError::config(what, "name must not be empty"));
    }
    Ok(())
}

pub(crate) fn validate_regularization(what: &'static str, reg: f64) -> ForecastResult<()> {
    if !reg.is_finite() || reg < 0.0 {
        return Err(ForecastError::config(what, format!("must be finite and >= 0, got {reg}")));
    }
    Ok(())
}
