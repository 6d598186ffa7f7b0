//! Model configuration: forecaster-level settings and per-component
//! declarations.
//!
//! Purpose
//! -------
//! Represent every configuration choice as an explicit, validated value. The
//! `Forecaster` never patches attributes at runtime: `add_*` calls append a
//! tagged [`ComponentSpec`] to an ordered [`ConfigSet`], and `fit` builds its
//! component modules from a frozen copy of that set.
//!
//! Key behaviors
//! -------------
//! - [`ForecasterConfig`] carries trend, seasonality, autoregression,
//!   quantile, normalization, scope and trainer settings, with builder-style
//!   `with_*` methods and an eager [`ForecasterConfig::validate`].
//! - [`SeasonalityConfig`], [`FutureRegressorConfig`] and
//!   [`LaggedRegressorConfig`] validate themselves on construction; events
//!   and holidays live in `core::events`.
//! - [`ConfigSet::push`] rejects duplicate names within a component kind.
//!
//! Invariants & assumptions
//! ------------------------
//! - `changepoints_range ∈ (0, 1]`, `n_forecasts >= 1`, regularization
//!   strengths finite and `>= 0`, seasonal periods finite and `> 0`.
//! - Conditions that depend on data (lag length vs. history length, minimum
//!   history) are checked at the start of `fit`, before any epoch.
//!
//! Conventions
//! -----------
//! - Periods are expressed in days (`7.0` for weekly, `365.25` for yearly).
//! - Auto seasonality names are `yearly`, `weekly` and `daily`.
use crate::forecasting::{
    core::{
        events::{validate_name, validate_regularization, CountryHolidaysConfig, EventConfig},
        normalization::NormalizeMode,
        quantiles::QuantileSet,
        scope::ScopeConfig,
    },
    errors::{ForecastError, ForecastResult},
};
use crate::optimization::trainer::TrainerOptions;

/// Trend growth model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrowthMode {
    /// Piecewise-linear trend with changepoints.
    #[default]
    Linear,
    /// Constant offset only.
    Off,
}

/// How a component enters the composed forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentMode {
    #[default]
    Additive,
    /// Scales the trend: `trend · (1 + Σ multiplicative)`.
    Multiplicative,
}

/// Built-in seasonality switch.
///
/// - `Auto`: enabled with the default order when the history is long and
///   dense enough (see `Forecaster::fit`).
/// - `On`: always enabled with the default order.
/// - `Order(n)`: always enabled with Fourier order `n`.
/// - `Off`: disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeasonalitySetting {
    #[default]
    Auto,
    On,
    Off,
    Order(usize),
}

/// One periodic component.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalityConfig {
    pub name: String,
    pub period_days: f64,
    pub fourier_order: usize,
    /// Overrides [`ForecasterConfig::seasonality_mode`] when set.
    pub mode: Option<ComponentMode>,
}

impl SeasonalityConfig {
    /// Errors
    /// ------
    /// - `ForecastError::Configuration` for an empty name or a non-positive /
    ///   non-finite period.
    pub fn new(
        name: impl Into<String>, period_days: f64, fourier_order: usize,
    ) -> ForecastResult<Self> {
        let name = name.into();
        validate_name("seasonality", &name)?;
        if !period_days.is_finite() || period_days <= 0.0 {
            return Err(ForecastError::config(
                "seasonality period",
                format!("period must be finite and > 0, got {period_days}"),
            ));
        }
        Ok(Self { name, period_days, fourier_order, mode: None })
    }

    pub fn with_mode(mut self, mode: ComponentMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Regressor known for the whole forecast horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct FutureRegressorConfig {
    pub name: String,
    pub mode: ComponentMode,
    pub normalize: NormalizeMode,
    pub regularization: Option<f64>,
}

impl FutureRegressorConfig {
    pub fn new(name: impl Into<String>) -> ForecastResult<Self> {
        let name = name.into();
        validate_name("future regressor", &name)?;
        Ok(Self {
            name,
            mode: ComponentMode::Additive,
            normalize: NormalizeMode::Auto,
            regularization: None,
        })
    }

    pub fn with_mode(mut self, mode: ComponentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_normalize(mut self, normalize: NormalizeMode) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_regularization(mut self, reg: f64) -> ForecastResult<Self> {
        validate_regularization("future regressor regularization", reg)?;
        self.regularization = Some(reg);
        Ok(self)
    }
}

/// Regressor known only up to the forecast origin.
#[derive(Debug, Clone, PartialEq)]
pub struct LaggedRegressorConfig {
    pub name: String,
    pub n_lags: usize,
    pub hidden_layers: Vec<usize>,
    pub normalize: NormalizeMode,
    pub regularization: Option<f64>,
}

impl LaggedRegressorConfig {
    /// Errors
    /// ------
    /// - `ForecastError::Configuration` for an empty name or `n_lags == 0`.
    pub fn new(name: impl Into<String>, n_lags: usize) -> ForecastResult<Self> {
        let name = name.into();
        validate_name("lagged regressor", &name)?;
        if n_lags == 0 {
            return Err(ForecastError::config("n_lags", "lagged regressors need at least one lag"));
        }
        Ok(Self {
            name,
            n_lags,
            hidden_layers: Vec::new(),
            normalize: NormalizeMode::Auto,
            regularization: None,
        })
    }

    /// Errors
    /// ------
    /// - `ForecastError::Configuration` if any layer width is zero.
    pub fn with_hidden_layers(mut self, layers: Vec<usize>) -> ForecastResult<Self> {
        validate_layers("lagged regressor layers", &layers)?;
        self.hidden_layers = layers;
        Ok(self)
    }

    pub fn with_normalize(mut self, normalize: NormalizeMode) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_regularization(mut self, reg: f64) -> ForecastResult<Self> {
        validate_regularization("lagged regressor regularization", reg)?;
        self.regularization = Some(reg);
        Ok(self)
    }
}

/// Tagged record appended by the `add_*` calls.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentSpec {
    Seasonality(SeasonalityConfig),
    Events(EventConfig),
    CountryHolidays(CountryHolidaysConfig),
    FutureRegressor(FutureRegressorConfig),
    LaggedRegressor(LaggedRegressorConfig),
}

impl ComponentSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ComponentSpec::Seasonality(_) => "seasonality",
            ComponentSpec::Events(_) => "event",
            ComponentSpec::CountryHolidays(_) => "country holidays",
            ComponentSpec::FutureRegressor(_) => "future regressor",
            ComponentSpec::LaggedRegressor(_) => "lagged regressor",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ComponentSpec::Seasonality(c) => &c.name,
            ComponentSpec::Events(c) => &c.name,
            ComponentSpec::CountryHolidays(c) => &c.country,
            ComponentSpec::FutureRegressor(c) => &c.name,
            ComponentSpec::LaggedRegressor(c) => &c.name,
        }
    }
}

/// Ordered, duplicate-free list of component declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSet {
    specs: Vec<ComponentSpec>,
}

impl ConfigSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a declaration.
    ///
    /// Errors
    /// ------
    /// - `ForecastError::DuplicateComponent` if a declaration of the same kind
    ///   and name exists. Regressor names are unique across future and lagged
    ///   regressors since both read the same covariate column.
    pub fn push(&mut self, spec: ComponentSpec) -> ForecastResult<()> {
        let clash = self.specs.iter().any(|existing| {
            existing.name() == spec.name()
                && (existing.kind() == spec.kind()
                    || (is_regressor(existing) && is_regressor(&spec)))
        });
        if clash {
            return Err(ForecastError::DuplicateComponent {
                kind: spec.kind(),
                name: spec.name().to_string(),
            });
        }
        self.specs.push(spec);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn seasonalities(&self) -> impl Iterator<Item = &SeasonalityConfig> {
        self.specs.iter().filter_map(|s| match s {
            ComponentSpec::Seasonality(c) => Some(c),
            _ => None,
        })
    }

    pub fn events(&self) -> impl Iterator<Item = &EventConfig> {
        self.specs.iter().filter_map(|s| match s {
            ComponentSpec::Events(c) => Some(c),
            _ => None,
        })
    }

    pub fn country_holidays(&self) -> impl Iterator<Item = &CountryHolidaysConfig> {
        self.specs.iter().filter_map(|s| match s {
            ComponentSpec::CountryHolidays(c) => Some(c),
            _ => None,
        })
    }

    pub fn future_regressors(&self) -> impl Iterator<Item = &FutureRegressorConfig> {
        self.specs.iter().filter_map(|s| match s {
            ComponentSpec::FutureRegressor(c) => Some(c),
            _ => None,
        })
    }

    pub fn lagged_regressors(&self) -> impl Iterator<Item = &LaggedRegressorConfig> {
        self.specs.iter().filter_map(|s| match s {
            ComponentSpec::LaggedRegressor(c) => Some(c),
            _ => None,
        })
    }
}

fn is_regressor(spec: &ComponentSpec) -> bool {
    matches!(spec, ComponentSpec::FutureRegressor(_) | ComponentSpec::LaggedRegressor(_))
}

/// Forecaster-level configuration.
///
/// Defaults
/// --------
/// - Trend: linear growth, 10 changepoints over the first 80% of history,
///   `trend_reg = 0`.
/// - Seasonality: additive, yearly/weekly/daily `Auto`, `seasonality_reg = 0`.
/// - AR: disabled (`ar_lags = 0`), no hidden layers, `ar_reg = 0`.
/// - One-step forecasts of the median only.
/// - `Auto` normalization per series; global parameter scopes.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecasterConfig {
    pub growth: GrowthMode,
    pub n_changepoints: usize,
    pub changepoints_range: f64,
    pub trend_reg: f64,
    pub seasonality_mode: ComponentMode,
    pub yearly_seasonality: SeasonalitySetting,
    pub weekly_seasonality: SeasonalitySetting,
    pub daily_seasonality: SeasonalitySetting,
    pub seasonality_reg: f64,
    pub ar_lags: usize,
    pub ar_layers: Vec<usize>,
    pub ar_reg: f64,
    pub n_forecasts: usize,
    pub quantiles: QuantileSet,
    pub normalize: NormalizeMode,
    pub global_normalization: bool,
    pub share_trend_seasonality: bool,
    pub scopes: ScopeConfig,
    pub trainer: TrainerOptions,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            growth: GrowthMode::Linear,
            n_changepoints: 10,
            changepoints_range: 0.8,
            trend_reg: 0.0,
            seasonality_mode: ComponentMode::Additive,
            yearly_seasonality: SeasonalitySetting::Auto,
            weekly_seasonality: SeasonalitySetting::Auto,
            daily_seasonality: SeasonalitySetting::Auto,
            seasonality_reg: 0.0,
            ar_lags: 0,
            ar_layers: Vec::new(),
            ar_reg: 0.0,
            n_forecasts: 1,
            quantiles: QuantileSet::default(),
            normalize: NormalizeMode::Auto,
            global_normalization: false,
            share_trend_seasonality: false,
            scopes: ScopeConfig::default(),
            trainer: TrainerOptions::default(),
        }
    }
}

impl ForecasterConfig {
    pub fn with_growth(mut self, growth: GrowthMode) -> Self {
        self.growth = growth;
        self
    }

    pub fn with_changepoints(mut self, n_changepoints: usize, changepoints_range: f64) -> Self {
        self.n_changepoints = n_changepoints;
        self.changepoints_range = changepoints_range;
        self
    }

    pub fn with_trend_reg(mut self, trend_reg: f64) -> Self {
        self.trend_reg = trend_reg;
        self
    }

    pub fn with_seasonality_mode(mut self, mode: ComponentMode) -> Self {
        self.seasonality_mode = mode;
        self
    }

    pub fn with_yearly_seasonality(mut self, setting: SeasonalitySetting) -> Self {
        self.yearly_seasonality = setting;
        self
    }

    pub fn with_weekly_seasonality(mut self, setting: SeasonalitySetting) -> Self {
        self.weekly_seasonality = setting;
        self
    }

    pub fn with_daily_seasonality(mut self, setting: SeasonalitySetting) -> Self {
        self.daily_seasonality = setting;
        self
    }

    pub fn with_seasonality_reg(mut self, reg: f64) -> Self {
        self.seasonality_reg = reg;
        self
    }

    pub fn with_ar(mut self, ar_lags: usize, ar_layers: Vec<usize>) -> Self {
        self.ar_lags = ar_lags;
        self.ar_layers = ar_layers;
        self
    }

    pub fn with_ar_reg(mut self, ar_reg: f64) -> Self {
        self.ar_reg = ar_reg;
        self
    }

    pub fn with_n_forecasts(mut self, n_forecasts: usize) -> Self {
        self.n_forecasts = n_forecasts;
        self
    }

    pub fn with_quantiles(mut self, quantiles: QuantileSet) -> Self {
        self.quantiles = quantiles;
        self
    }

    pub fn with_normalize(mut self, normalize: NormalizeMode) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_global_normalization(mut self, global: bool) -> Self {
        self.global_normalization = global;
        self
    }

    pub fn with_shared_trend_seasonality(mut self, shared: bool) -> Self {
        self.share_trend_seasonality = shared;
        self
    }

    pub fn with_scopes(mut self, scopes: ScopeConfig) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_trainer(mut self, trainer: TrainerOptions) -> Self {
        self.trainer = trainer;
        self
    }

    /// Validate every data-independent setting.
    ///
    /// Errors
    /// ------
    /// - `ForecastError::Configuration` naming the first offending setting.
    pub fn validate(&self) -> ForecastResult<()> {
        if !self.changepoints_range.is_finite()
            || self.changepoints_range <= 0.0
            || self.changepoints_range > 1.0
        {
            return Err(ForecastError::config(
                "changepoints_range",
                format!("must lie in (0, 1], got {}", self.changepoints_range),
            ));
        }
        validate_regularization("trend_reg", self.trend_reg)?;
        validate_regularization("seasonality_reg", self.seasonality_reg)?;
        validate_regularization("ar_reg", self.ar_reg)?;
        if self.n_forecasts == 0 {
            return Err(ForecastError::config("n_forecasts", "must be at least 1"));
        }
        validate_layers("ar_layers", &self.ar_layers)?;
        self.trainer.validate()?;
        Ok(())
    }
}

fn validate_layers(what: &'static str, layers: &[usize]) -> ForecastResult<()> {
    if layers.iter().any(|&w| w == 0) {
        return Err(ForecastError::config(what, "hidden layer widths must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - Eager validation of forecaster settings.
    // - Component constructors and duplicate detection in `ConfigSet`.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Defaults are valid; an out-of-range changepoints range is rejected.
    //
    // Given
    // -----
    // - `changepoints_range = 1.5`.
    //
    // Expect
    // ------
    // - `Configuration { param: "changepoints_range", .. }`.
    fn changepoints_range_is_validated() {
        assert!(ForecasterConfig::default().validate().is_ok());

        let err = ForecasterConfig::default().with_changepoints(5, 1.5).validate().unwrap_err();

        assert!(matches!(err, ForecastError::Configuration { param: "changepoints_range", .. }));
    }

    #[test]
    // Purpose
    // -------
    // Other scalar settings are validated too.
    fn other_settings_are_validated() {
        assert!(ForecasterConfig::default().with_n_forecasts(0).validate().is_err());
        assert!(ForecasterConfig::default().with_seasonality_reg(-0.1).validate().is_err());
        assert!(ForecasterConfig::default().with_ar(3, vec![0]).validate().is_err());
        let bad_trainer = TrainerOptions::default().with_epochs(0);
        assert!(ForecasterConfig::default().with_trainer(bad_trainer).validate().is_err());
    }

    #[test]
    // Purpose
    // -------
    // Component constructors reject invalid periods and lag counts.
    fn component_constructors_validate() {
        assert!(SeasonalityConfig::new("monthly", 30.5, 5).is_ok());
        assert!(SeasonalityConfig::new("bad", 0.0, 5).is_err());
        assert!(LaggedRegressorConfig::new("x", 0).is_err());
        let lagged = LaggedRegressorConfig::new("x", 3).unwrap();
        assert!(lagged.with_hidden_layers(vec![4, 0]).is_err());
    }

    #[test]
    // Purpose
    // -------
    // Duplicates are rejected within a kind and across regressor kinds, but
    // the same name may be reused across unrelated kinds.
    fn config_set_rejects_duplicates() {
        let mut set = ConfigSet::new();
        set.push(ComponentSpec::FutureRegressor(FutureRegressorConfig::new("temp").unwrap()))
            .unwrap();
        set.push(ComponentSpec::Events(EventConfig::new("temp").unwrap())).unwrap();

        let temp = LaggedRegressorConfig::new("temp", 2).unwrap();
        let dup = set.push(ComponentSpec::LaggedRegressor(temp));

        assert!(matches!(dup, Err(ForecastError::DuplicateComponent { .. })));
        assert_eq!(set.len(), 2);
        assert_eq!(set.future_regressors().count(), 1);
        assert_eq!(set.events().count(), 1);
    }
}
