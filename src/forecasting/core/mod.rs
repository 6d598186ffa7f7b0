//! Core data model, configuration and feature encoding.
//!
//! - [`data`]: validated series and covariate containers.
//! - [`events`]: event tables, event/holiday declarations, indicator windows.
//! - [`quantiles`]: the ordered quantile set.
//! - [`options`]: forecaster and component configuration.
//! - [`normalization`]: value, regressor and time normalization.
//! - [`features`]: the time feature encoder.
//! - [`dataset`]: windowed training samples.
//! - [`scope`]: global/local parameter stores and layout.
//! - [`forecasts`]: output tables and metrics.
pub mod data;
pub mod dataset;
pub mod events;
pub mod features;
pub mod forecasts;
pub mod normalization;
pub mod options;
pub mod quantiles;
pub mod scope;

pub use self::data::{CovariateTable, Series, SeriesFrame};
pub use self::events::{
    CountryHolidaysConfig, EventConfig, EventTable, HolidayCalendar, StaticHolidayCalendar,
};
pub use self::forecasts::{ForecastTable, Metrics};
pub use self::normalization::NormalizeMode;
pub use self::options::{
    ComponentMode, ComponentSpec, ConfigSet, ForecasterConfig, FutureRegressorConfig, GrowthMode,
    LaggedRegressorConfig, SeasonalityConfig, SeasonalitySetting,
};
pub use self::quantiles::QuantileSet;
pub use self::scope::{ParameterScope, ScopeConfig};
