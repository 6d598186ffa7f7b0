//! forecasting — decomposable time-series forecasting stack.
//!
//! Purpose
//! -------
//! Bundle the data containers, feature encoding, model components, model
//! composition and the user-facing [`Forecaster`] under one namespace. This
//! is the surface most consumers should depend on.
//!
//! Key behaviors
//! -------------
//! - [`core`]: validated series and covariates, events and holiday calendars,
//!   normalization, calendar feature encoding, sample construction, parameter
//!   scopes, configuration and forecast tables.
//! - [`components`]: trend, seasonality, events, future regressors, AR-Net
//!   and lagged regressors behind the [`components::Component`] trait.
//! - [`models`]: the composer, the trainable model graph and [`Forecaster`].
//! - [`errors`]: [`ForecastError`] and the [`ForecastResult`] alias.
//!
//! Invariants & assumptions
//! ------------------------
//! - A fitted model is immutable; prediction takes `&self` and may run
//!   concurrently from several threads.
//! - All internal computation happens in normalized units; forecast tables
//!   and decompositions are reported in data units.
//!
//! Conventions
//! -----------
//! - Indexing is 0-based, oldest observation first.
//! - Forecast matrices are `(rows × quantiles)` with quantile levels in
//!   increasing order; the median is always present.
//!
//! Downstream usage
//! ----------------
//! 1. Build a [`ForecasterConfig`] and a [`Forecaster`].
//! 2. Declare extra components with the `add_*` methods.
//! 3. `fit` on one or more [`SeriesFrame`]s, then `predict` per series.
//!
//! Front-ends typically import `forecasting::prelude::*`.

pub mod components;
pub mod core;
pub mod errors;
pub mod models;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::core::{
    ComponentMode, CountryHolidaysConfig, CovariateTable, EventConfig, EventTable, ForecastTable,
    ForecasterConfig, FutureRegressorConfig, GrowthMode, HolidayCalendar, LaggedRegressorConfig,
    Metrics, NormalizeMode, ParameterScope, QuantileSet, ScopeConfig, SeasonalityConfig,
    SeasonalitySetting, Series, SeriesFrame, StaticHolidayCalendar,
};

pub use self::errors::{ErrorKind, ForecastError, ForecastResult};

pub use self::models::Forecaster;

pub mod prelude {
    pub use super::{
        ComponentMode, CountryHolidaysConfig, CovariateTable, ErrorKind, EventConfig, EventTable,
        ForecastError, ForecastResult, ForecastTable, Forecaster, ForecasterConfig,
        FutureRegressorConfig, GrowthMode, HolidayCalendar, LaggedRegressorConfig, Metrics,
        NormalizeMode, ParameterScope, QuantileSet, ScopeConfig, SeasonalityConfig,
        SeasonalitySetting, Series, SeriesFrame, StaticHolidayCalendar,
    };
}
