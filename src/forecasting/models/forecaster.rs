//! Forecaster: configuration, fit and predict.
//!
//! Purpose
//! -------
//! Orchestrate the full lifecycle of a decomposable forecasting model:
//! collect component declarations, validate inputs, establish normalization
//! and encoding constants, instantiate components, drive the trainer, and
//! compose forecasts from the fitted parameters.
//!
//! Key behaviors
//! -------------
//! - `add_*` calls append validated [`ComponentSpec`]s; they are rejected with
//!   `ModelAlreadyFitted` once a fit has succeeded.
//! - [`Forecaster::fit`] is transactional: the model is only replaced when
//!   training succeeds. Re-fitting replaces all parameters unless
//!   `TrainerOptions::warm_start` is set and the parameter layout is
//!   unchanged, in which case training resumes from the previous estimate.
//! - [`Forecaster::predict`] encodes the requested future grid with the
//!   fitted constants and composes a forecast; it takes `&self` and mutates
//!   nothing, so concurrent calls are safe.
//! - Every forecast carries a per-component decomposition of the median in
//!   data units.
//!
//! Invariants & assumptions
//! ------------------------
//! - Data-independent settings are validated in [`Forecaster::new`];
//!   data-dependent ones (lag length vs. history, minimum history, declared
//!   regressors and events) at the start of `fit`, before any epoch.
//! - Time normalization is global across series; value normalization is per
//!   series unless `global_normalization` is set.
//! - The future grid of a series continues its last observed timestamp by
//!   the sampling step inferred at fit time.
//!
//! Conventions
//! -----------
//! - Series are identified by `Series::id`; `predict` on an id not seen in
//!   `fit` fails with `UnknownSeries`.
//! - With autoregression or lagged regressors the model forecasts up to
//!   `n_forecasts` steps from the last observation; without them any number
//!   of future periods can be predicted.
use crate::forecasting::{
    components::{
        AutoRegression, Component, ComponentFamily, ComponentRole, EventEffect, FutureRegressor,
        LaggedRegressor, SampleContext, Seasonality, Trend,
    },
    core::{
        data::SeriesFrame,
        dataset::{build_samples, check_lag_window, minimum_history, LagRequirement},
        events::{CountryHolidaysConfig, EventConfig, EventTable, HolidayCalendar},
        features::{
            future_grid, step_days, trigger_years, EncodeInput, EncodedSeries, EventBlockPlan,
            EventSource,
            FeaturePlan, SeasonalPlan,
        },
        forecasts::{ForecastTable, Metrics},
        normalization::{NormalizeMode, SeriesStats, ShiftScale, TimeNormalization},
        options::{
            ComponentMode, ComponentSpec, ConfigSet, ForecasterConfig, FutureRegressorConfig,
            GrowthMode, LaggedRegressorConfig, SeasonalityConfig, SeasonalitySetting,
        },
        scope::LayoutBuilder,
    },
    errors::{ForecastError, ForecastResult},
    models::graph::ModelGraph,
};
use crate::optimization::{
    loss::pinball_loss,
    trainer::{minimize, Theta, TrainOutcome},
};
use chrono::{Duration, NaiveDateTime};
use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, SeedableRng};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

const YEARLY_PERIOD: f64 = 365.25;
const WEEKLY_PERIOD: f64 = 7.0;
const DAILY_PERIOD: f64 = 1.0;
const YEARLY_ORDER: usize = 6;
const WEEKLY_ORDER: usize = 3;
const DAILY_ORDER: usize = 6;

/// Decomposable forecasting model.
#[derive(Debug)]
pub struct Forecaster {
    config: ForecasterConfig,
    specs: ConfigSet,
    calendar: Option<Arc<dyn HolidayCalendar>>,
    fitted: Option<FittedModel>,
}

/// Everything `predict` needs, frozen at the end of a successful fit.
#[derive(Debug)]
struct FittedModel {
    plan: FeaturePlan,
    series_ids: Vec<String>,
    series_index: HashMap<String, usize>,
    stats: Vec<SeriesStats>,
    steps: Vec<Duration>,
    max_lag: usize,
    lag_requirements: Vec<LagRequirement>,
    graph: ModelGraph,
    theta: Theta,
    outcome: TrainOutcome,
}

/// Seasonalities and event blocks resolved against the training data.
struct ResolvedFeatures {
    plan: FeaturePlan,
    seasonal_modes: Vec<ComponentMode>,
    event_configs: Vec<EventConfig>,
}

/// Rows of forecasts and decomposition columns accumulated across origins.
#[derive(Default)]
struct Decomposition {
    yhat: Vec<Vec<f64>>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl Forecaster {
    /// Create an unfitted model.
    ///
    /// Errors
    /// ------
    /// - `ForecastError::Configuration` for any invalid setting, e.g.
    ///   `changepoints_range` outside `(0, 1]`.
    pub fn new(config: ForecasterConfig) -> ForecastResult<Self> {
        config.validate()?;
        Ok(Self { config, specs: ConfigSet::new(), calendar: None, fitted: None })
    }

    /// Attach the holiday calendar used by `add_country_holidays`.
    pub fn with_holiday_calendar(mut self, calendar: Arc<dyn HolidayCalendar>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn config(&self) -> &ForecasterConfig {
        &self.config
    }

    pub fn component_specs(&self) -> &ConfigSet {
        &self.specs
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Result of the last successful fit.
    pub fn training_outcome(&self) -> Option<&TrainOutcome> {
        self.fitted.as_ref().map(|f| &f.outcome)
    }

    /// Decomposition column names of the fitted model, in component order.
    pub fn component_columns(&self) -> ForecastResult<Vec<String>> {
        let fitted = self.fitted()?;
        Ok(fitted.graph.components().iter().map(|c| c.column()).collect())
    }

    // ---- Configuration ----------------------------------------------------

    pub fn add_seasonality(&mut self, seasonality: SeasonalityConfig) -> ForecastResult<()> {
        self.push_spec(ComponentSpec::Seasonality(seasonality))
    }

    pub fn add_events(&mut self, event: EventConfig) -> ForecastResult<()> {
        self.push_spec(ComponentSpec::Events(event))
    }

    /// Errors
    /// ------
    /// - `ForecastError::Configuration` if no holiday calendar is attached.
    pub fn add_country_holidays(&mut self, holidays: CountryHolidaysConfig) -> ForecastResult<()> {
        if self.fitted.is_none() && self.calendar.is_none() {
            return Err(ForecastError::config(
                "country_holidays",
                "attach a holiday calendar before adding country holidays",
            ));
        }
        self.push_spec(ComponentSpec::CountryHolidays(holidays))
    }

    pub fn add_future_regressor(&mut self, regressor: FutureRegressorConfig) -> ForecastResult<()> {
        self.push_spec(ComponentSpec::FutureRegressor(regressor))
    }

    pub fn add_lagged_regressor(&mut self, regressor: LaggedRegressorConfig) -> ForecastResult<()> {
        self.push_spec(ComponentSpec::LaggedRegressor(regressor))
    }

    fn push_spec(&mut self, spec: ComponentSpec) -> ForecastResult<()> {
        if self.fitted.is_some() {
            return Err(ForecastError::ModelAlreadyFitted);
        }
        self.specs.push(spec)
    }

    fn fitted(&self) -> ForecastResult<&FittedModel> {
        self.fitted.as_ref().ok_or(ForecastError::ModelNotFitted)
    }

    fn max_lag(&self) -> usize {
        self.specs
            .lagged_regressors()
            .map(|r| r.n_lags)
            .chain([self.config.ar_lags])
            .max()
            .unwrap_or(0)
    }

    fn effective_changepoints(&self) -> usize {
        match self.config.growth {
            GrowthMode::Linear => self.config.n_changepoints,
            GrowthMode::Off => 0,
        }
    }

    // ---- Fit --------------------------------------------------------------

    /// Fit all components on one or more series.
    ///
    /// Parameters
    /// ----------
    /// - `frames`: one entry per series, ids unique. Covariate tables must
    ///   hold every declared regressor over the history.
    /// - `events`: trigger dates of every declared user event.
    ///
    /// Errors
    /// ------
    /// - `Configuration`: no series, duplicate ids, `ar_lags` not below the
    ///   history length, `n_forecasts > 1` without lags, declared events
    ///   absent from `events`, invalid trainer options.
    /// - `InsufficientData`: a series shorter than
    ///   `max(max_lag + n_forecasts, n_changepoints + 1, 2)`.
    /// - `MissingRegressor`: a declared regressor lacks a required value.
    /// - `TrainingDiverged`: the loss stopped being finite.
    pub fn fit(
        &mut self, frames: &[SeriesFrame], events: Option<&EventTable>,
    ) -> ForecastResult<TrainOutcome> {
        let series_ids = self.validate_inputs(frames, events)?;
        let max_lag = self.max_lag();
        let n_forecasts = self.config.n_forecasts;

        let start = frames.iter().map(|f| f.series.first_timestamp()).min();
        let end = frames.iter().map(|f| f.series.last_timestamp()).max();
        let (Some(start), Some(end)) = (start, end) else {
            return Err(ForecastError::config("series", "at least one series is required"));
        };
        let time = TimeNormalization::new(start, end);
        let steps: Vec<Duration> =
            frames.iter().map(|f| f.series.infer_step().unwrap_or(Duration::days(1))).collect();
        let stats = self.fit_stats(frames)?;
        let resolved = self.resolve_features(time, frames, &steps)?;

        let calendar = self.calendar.as_deref();
        let mut encoded = Vec::with_capacity(frames.len());
        for (idx, frame) in frames.iter().enumerate() {
            let values = frame.series.values().to_vec();
            encoded.push(resolved.plan.encode(EncodeInput {
                series: idx,
                timestamps: frame.series.timestamps(),
                values: &values,
                covariates: frame.covariates.as_ref(),
                stats: &stats[idx],
                events,
                calendar,
            })?);
        }

        let lag_requirements: Vec<LagRequirement> = self
            .specs
            .lagged_regressors()
            .map(|r| LagRequirement { name: r.name.clone(), n_lags: r.n_lags })
            .collect();
        let data = build_samples(
            encoded,
            &series_ids,
            max_lag,
            n_forecasts,
            &lag_requirements,
            self.config.trainer.validation_fraction,
        )?;

        let (components, n_params) = self.build_components(&resolved, &series_ids);
        let columns: Vec<String> = components.iter().map(|c| c.column()).collect();
        let theta0 = match self.warm_start_theta(&series_ids, &columns, n_params) {
            Some(theta) => theta,
            None => {
                let mut rng = StdRng::seed_from_u64(self.config.trainer.seed);
                let mut theta = Theta::zeros(n_params);
                for component in &components {
                    component.initialize(&mut theta, &mut rng);
                }
                theta
            }
        };
        let graph = ModelGraph::new(
            components,
            self.config.quantiles.levels().to_vec(),
            n_params,
            self.config.trainer.parallel,
        );

        tracing::debug!(
            n_series = frames.len(),
            n_train = data.train.len(),
            n_valid = data.valid.len(),
            n_params,
            components = ?columns,
            "fitting forecaster"
        );
        let outcome = minimize(&graph, theta0, &data, &self.config.trainer)?;
        tracing::info!(
            epochs = outcome.epochs,
            best_loss = outcome.best_loss,
            status = %outcome.status,
            "forecaster fitted"
        );

        let series_index = series_ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        self.fitted = Some(FittedModel {
            plan: resolved.plan,
            series_ids,
            series_index,
            stats,
            steps,
            max_lag,
            lag_requirements,
            graph,
            theta: outcome.theta_hat.clone(),
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    /// Data-dependent checks that must pass before any work is done.
    fn validate_inputs(
        &self, frames: &[SeriesFrame], events: Option<&EventTable>,
    ) -> ForecastResult<Vec<String>> {
        if frames.is_empty() {
            return Err(ForecastError::config("series", "at least one series is required"));
        }
        let mut seen = BTreeSet::new();
        for frame in frames {
            if !seen.insert(frame.id()) {
                let msg = format!("duplicate series id '{}'", frame.id());
                return Err(ForecastError::config("series", msg));
            }
        }

        let max_lag = self.max_lag();
        let n_forecasts = self.config.n_forecasts;
        if max_lag == 0 && n_forecasts > 1 {
            return Err(ForecastError::config(
                "n_forecasts",
                "multi-step forecasts need ar_lags > 0 or a lagged regressor",
            ));
        }
        let required = minimum_history(max_lag, n_forecasts, self.effective_changepoints());
        for frame in frames {
            let n = frame.series.len();
            if self.config.ar_lags > 0 && self.config.ar_lags >= n {
                return Err(ForecastError::config(
                    "ar_lags",
                    format!(
                        "{} lags exceed the {n} observations of series '{}'",
                        self.config.ar_lags,
                        frame.id()
                    ),
                ));
            }
            if n < required {
                return Err(ForecastError::InsufficientData {
                    series: frame.id().to_string(),
                    required,
                    actual: n,
                });
            }
        }

        for event in self.specs.events() {
            if !events.is_some_and(|table| table.contains(&event.name)) {
                return Err(ForecastError::config(
                    "events",
                    format!("event '{}' has no occurrences in the event table", event.name),
                ));
            }
        }

        let regressors = self
            .specs
            .future_regressors()
            .map(|r| r.name.as_str())
            .chain(self.specs.lagged_regressors().map(|r| r.name.as_str()));
        for name in regressors {
            for frame in frames {
                let present = frame.covariates.as_ref().is_some_and(|c| c.has_column(name));
                if !present {
                    return Err(ForecastError::MissingRegressor {
                        name: name.to_string(),
                        timestamp: frame.series.first_timestamp(),
                    });
                }
            }
        }

        Ok(frames.iter().map(|f| f.id().to_string()).collect())
    }

    /// Value and regressor normalization per series (or pooled).
    fn fit_stats(&self, frames: &[SeriesFrame]) -> ForecastResult<Vec<SeriesStats>> {
        let mode = self.config.normalize;
        let global = self.config.global_normalization;
        let regressors: Vec<(&str, NormalizeMode)> = self
            .specs
            .future_regressors()
            .map(|r| (r.name.as_str(), r.normalize))
            .chain(self.specs.lagged_regressors().map(|r| (r.name.as_str(), r.normalize)))
            .collect();

        let pooled_y = if global {
            let all: Vec<f64> =
                frames.iter().flat_map(|f| f.series.values().iter().copied()).collect();
            Some(ShiftScale::fit(&all, mode)?)
        } else {
            None
        };
        let mut pooled_regressors = BTreeMap::new();
        if global {
            for &(name, reg_mode) in &regressors {
                let all: Vec<f64> =
                    frames.iter().flat_map(|f| regressor_history(f, name)).collect();
                let first = frames[0].series.first_timestamp();
                let pooled = fit_regressor(name, &all, reg_mode, first)?;
                pooled_regressors.insert(name.to_string(), pooled);
            }
        }

        frames
            .iter()
            .map(|frame| {
                let y = match pooled_y {
                    Some(ss) => ss,
                    None => ShiftScale::fit(&frame.series.values().to_vec(), mode)?,
                };
                let mut per_regressor = BTreeMap::new();
                for &(name, reg_mode) in &regressors {
                    let ss = match pooled_regressors.get(name) {
                        Some(&ss) => ss,
                        None => fit_regressor(
                            name,
                            &regressor_history(frame, name),
                            reg_mode,
                            frame.series.first_timestamp(),
                        )?,
                    };
                    per_regressor.insert(name.to_string(), ss);
                }
                Ok(SeriesStats { y, regressors: per_regressor })
            })
            .collect()
    }

    /// Resolve built-in and custom seasonalities and expand event blocks.
    fn resolve_features(
        &self, time: TimeNormalization, frames: &[SeriesFrame], steps: &[Duration],
    ) -> ForecastResult<ResolvedFeatures> {
        let span = frames.iter().map(|f| f.series.span_days()).fold(0.0_f64, f64::max);
        let step = steps.iter().map(|&s| step_days(s)).fold(f64::INFINITY, f64::min);
        let custom: BTreeSet<&str> = self.specs.seasonalities().map(|s| s.name.as_str()).collect();

        let weekly_auto = span >= 14.0 && step < 7.0;
        let daily_auto = span >= 2.0 && step < 1.0;
        let builtins = [
            ("yearly", YEARLY_PERIOD, self.config.yearly_seasonality, YEARLY_ORDER, span >= 730.0),
            ("weekly", WEEKLY_PERIOD, self.config.weekly_seasonality, WEEKLY_ORDER, weekly_auto),
            ("daily", DAILY_PERIOD, self.config.daily_seasonality, DAILY_ORDER, daily_auto),
        ];
        let mut seasonalities = Vec::new();
        let mut seasonal_modes = Vec::new();
        for (name, period_days, setting, default_order, auto_enabled) in builtins {
            if custom.contains(name) {
                continue;
            }
            let order = match setting {
                SeasonalitySetting::Off => None,
                SeasonalitySetting::Auto => auto_enabled.then_some(default_order),
                SeasonalitySetting::On => Some(default_order),
                SeasonalitySetting::Order(order) => Some(order),
            };
            if let Some(order) = order {
                tracing::debug!(name, order, "enabling built-in seasonality");
                seasonalities.push(SeasonalPlan { name: name.to_string(), period_days, order });
                seasonal_modes.push(self.config.seasonality_mode);
            }
        }
        for s in self.specs.seasonalities() {
            seasonalities.push(SeasonalPlan {
                name: s.name.clone(),
                period_days: s.period_days,
                order: s.fourier_order,
            });
            seasonal_modes.push(s.mode.unwrap_or(self.config.seasonality_mode));
        }

        let mut events = Vec::new();
        let mut event_configs: Vec<EventConfig> = Vec::new();
        for ev in self.specs.events() {
            events.push(EventBlockPlan {
                name: ev.name.clone(),
                source: EventSource::User,
                lower_window: ev.lower_window,
                upper_window: ev.upper_window,
            });
            event_configs.push(ev.clone());
        }
        let end = time.start + Duration::days(time.span_days.ceil() as i64);
        for holidays in self.specs.country_holidays() {
            let calendar = self.calendar.as_deref().ok_or_else(|| {
                ForecastError::config("country_holidays", "no holiday calendar attached")
            })?;
            let years =
                trigger_years(time.start, end, holidays.lower_window, holidays.upper_window);
            for (name, dates) in calendar.holidays(&holidays.country, years)? {
                if dates.is_empty() {
                    continue;
                }
                if event_configs.iter().any(|e| e.name == name) {
                    return Err(ForecastError::DuplicateComponent { kind: "event", name });
                }
                events.push(EventBlockPlan {
                    name: name.clone(),
                    source: EventSource::Holiday { country: holidays.country.clone() },
                    lower_window: holidays.lower_window,
                    upper_window: holidays.upper_window,
                });
                event_configs.push(holidays.event_for(&name));
            }
        }

        let plan = FeaturePlan {
            time,
            seasonalities,
            events,
            future_regressors: self.specs.future_regressors().map(|r| r.name.clone()).collect(),
            lagged_regressors: self.specs.lagged_regressors().map(|r| r.name.clone()).collect(),
        };
        Ok(ResolvedFeatures { plan, seasonal_modes, event_configs })
    }

    /// Instantiate components in a fixed order: trend, seasonalities,
    /// events, future regressors, autoregression, lagged regressors.
    fn build_components(
        &self, resolved: &ResolvedFeatures, series_ids: &[String],
    ) -> (Vec<Box<dyn Component>>, usize) {
        let cfg = &self.config;
        let scopes = cfg.scopes;
        let q = cfg.quantiles.len();
        let shared = cfg.share_trend_seasonality;
        let mut layout = LayoutBuilder::new(series_ids);
        let mut components: Vec<Box<dyn Component>> = Vec::new();

        components.push(Box::new(Trend::new(
            cfg.growth,
            cfg.n_changepoints,
            cfg.changepoints_range,
            cfg.trend_reg,
            q,
            shared,
            scopes.trend,
            &mut layout,
        )));
        for (idx, (plan, mode)) in
            resolved.plan.seasonalities.iter().zip(&resolved.seasonal_modes).enumerate()
        {
            components.push(Box::new(Seasonality::new(
                plan.name.clone(),
                idx,
                plan.order,
                *mode,
                cfg.seasonality_reg,
                q,
                shared,
                scopes.seasonality,
                &mut layout,
            )));
        }
        let event_blocks = resolved.plan.events.iter().zip(&resolved.event_configs);
        for (idx, (block, ev)) in event_blocks.enumerate() {
            components.push(Box::new(EventEffect::new(
                ev.name.clone(),
                idx,
                block.width(),
                ev.mode,
                ev.regularization,
                q,
                scopes.events,
                &mut layout,
            )));
        }
        for (idx, reg) in self.specs.future_regressors().enumerate() {
            components.push(Box::new(FutureRegressor::new(
                reg.name.clone(),
                idx,
                reg.mode,
                reg.regularization,
                q,
                scopes.future_regressors,
                &mut layout,
            )));
        }
        if cfg.ar_lags > 0 {
            components.push(Box::new(AutoRegression::new(
                cfg.ar_lags,
                &cfg.ar_layers,
                cfg.n_forecasts,
                q,
                cfg.ar_reg,
                scopes.autoregression,
                &mut layout,
            )));
        }
        for (idx, reg) in self.specs.lagged_regressors().enumerate() {
            components.push(Box::new(LaggedRegressor::new(
                reg.name.clone(),
                idx,
                reg.n_lags,
                &reg.hidden_layers,
                cfg.n_forecasts,
                q,
                reg.regularization,
                scopes.lagged_regressors,
                &mut layout,
            )));
        }
        let n_params = layout.total();
        (components, n_params)
    }

    fn warm_start_theta(
        &self, series_ids: &[String], columns: &[String], n_params: usize,
    ) -> Option<Theta> {
        if !self.config.trainer.warm_start {
            return None;
        }
        let previous = self.fitted.as_ref()?;
        let same_layout = previous.series_ids == series_ids
            && previous.graph.n_params() == n_params
            && previous.graph.components().iter().map(|c| c.column()).eq(columns.iter().cloned());
        if same_layout {
            tracing::debug!("warm start from previous parameters");
            Some(previous.theta.clone())
        } else {
            None
        }
    }

    // ---- Predict ----------------------------------------------------------

    /// Forecast `future_periods` steps past the last observation of `frame`.
    ///
    /// Parameters
    /// ----------
    /// - `frame`: history of a series seen during `fit` (possibly extended),
    ///   with covariates covering the lookback window and, for future
    ///   regressors, every future timestamp.
    /// - `future_periods`: number of future rows, `>= 1`; at most
    ///   `n_forecasts` when the model has lags.
    /// - `events`: trigger dates for the forecast range.
    ///
    /// Errors
    /// ------
    /// - `ModelNotFitted`, `UnknownSeries`, `Configuration` (bad
    ///   `future_periods`), `InsufficientData` (history shorter than the lag
    ///   window), `MissingRegressor`.
    pub fn predict(
        &self, frame: &SeriesFrame, future_periods: usize, events: Option<&EventTable>,
    ) -> ForecastResult<ForecastTable> {
        let fitted = self.fitted()?;
        let idx = fitted.index_of(frame.id())?;
        if future_periods == 0 {
            return Err(ForecastError::config("future_periods", "must be at least 1"));
        }
        if fitted.max_lag > 0 && future_periods > self.config.n_forecasts {
            return Err(ForecastError::config(
                "future_periods",
                format!(
                    "a model with lags forecasts at most n_forecasts = {} steps, \
                         got {future_periods}",
                    self.config.n_forecasts
                ),
            ));
        }
        let series = &frame.series;
        let n = series.len();
        if n < fitted.max_lag {
            return Err(ForecastError::InsufficientData {
                series: frame.id().to_string(),
                required: fitted.max_lag,
                actual: n,
            });
        }

        let future = future_grid(series.last_timestamp(), fitted.steps[idx], future_periods)?;
        let start = n - fitted.max_lag;
        let mut timestamps = series.timestamps()[start..].to_vec();
        timestamps.extend_from_slice(&future);
        let values: Vec<f64> = series.values().iter().skip(start).copied().collect();
        let enc = self.encode(fitted, idx, frame, &timestamps, &values, events)?;
        check_lag_window(&enc, &fitted.lag_requirements, fitted.max_lag)?;

        let mut decomposition = Decomposition::default();
        let ctx = SampleContext { encoded: &enc, origin: fitted.max_lag, horizon: future_periods };
        self.decompose_into(fitted, &ctx, &mut decomposition);
        tracing::debug!(series = frame.id(), future_periods, "predicted");
        Ok(self.table(frame.id(), future, None, decomposition))
    }

    /// One-step-ahead fitted values over the history of `frame`.
    ///
    /// The first `max_lag` observations have no full lag window and are not
    /// part of the output.
    pub fn predict_in_sample(
        &self, frame: &SeriesFrame, events: Option<&EventTable>,
    ) -> ForecastResult<ForecastTable> {
        let fitted = self.fitted()?;
        let idx = fitted.index_of(frame.id())?;
        let series = &frame.series;
        let n = series.len();
        if n <= fitted.max_lag {
            return Err(ForecastError::InsufficientData {
                series: frame.id().to_string(),
                required: fitted.max_lag + 1,
                actual: n,
            });
        }
        let values = series.values().to_vec();
        let enc = self.encode(fitted, idx, frame, series.timestamps(), &values, events)?;

        let mut decomposition = Decomposition::default();
        if fitted.max_lag == 0 {
            let ctx = SampleContext { encoded: &enc, origin: 0, horizon: n };
            self.decompose_into(fitted, &ctx, &mut decomposition);
        } else {
            for origin in fitted.max_lag..n {
                check_lag_window(&enc, &fitted.lag_requirements, origin)?;
                let ctx = SampleContext { encoded: &enc, origin, horizon: 1 };
                self.decompose_into(fitted, &ctx, &mut decomposition);
            }
        }
        let timestamps = series.timestamps()[fitted.max_lag..].to_vec();
        let actual = Array1::from(values[fitted.max_lag..].to_vec());
        Ok(self.table(frame.id(), timestamps, Some(actual), decomposition))
    }

    /// MAE, RMSE (median) and mean pinball loss over in-sample predictions.
    pub fn evaluate(
        &self, frames: &[SeriesFrame], events: Option<&EventTable>,
    ) -> ForecastResult<Metrics> {
        let levels = self.config.quantiles.levels();
        let (mut abs, mut sq, mut pinball, mut count) = (0.0, 0.0, 0.0, 0usize);
        for frame in frames {
            let table = self.predict_in_sample(frame, events)?;
            let Some(actual) = table.actual.as_ref() else {
                continue;
            };
            let median = table.median();
            for (r, &y) in actual.iter().enumerate() {
                let err = y - median[r];
                abs += err.abs();
                sq += err * err;
                pinball += levels
                    .iter()
                    .enumerate()
                    .map(|(q, &level)| pinball_loss(y, table.yhat[[r, q]], level))
                    .sum::<f64>()
                    / levels.len() as f64;
                count += 1;
            }
        }
        if count == 0 {
            return Err(ForecastError::config("evaluate", "no in-sample points to evaluate"));
        }
        let n = count as f64;
        Ok(Metrics { mae: abs / n, rmse: (sq / n).sqrt(), pinball: pinball / n, n_points: count })
    }

    /// Median contribution of a lagged regressor for a lookback window of raw
    /// zeros, per forecast step, in data units. The zeros pass through the
    /// regressor's fitted normalization, as observed windows do.
    pub fn lagged_regressor_intercept(
        &self, name: &str, series_id: &str,
    ) -> ForecastResult<Array1<f64>> {
        let fitted = self.fitted()?;
        let idx = fitted.index_of(series_id)?;
        let component = fitted
            .graph
            .components()
            .iter()
            .find(|c| c.family() == ComponentFamily::LaggedRegressor && c.name() == name)
            .ok_or_else(|| {
                let msg = format!("unknown lagged regressor '{name}'");
                ForecastError::config("lagged regressor", msg)
            })?;
        let baseline = fitted.stats[idx].regressor(name).normalize(0.0);
        let intercept = component
            .intercept(&fitted.theta, idx, baseline)
            .ok_or_else(|| {
                ForecastError::config("lagged regressor", "component has no intercept")
            })?;
        let scale = fitted.stats[idx].y.scale;
        Ok(intercept.column(self.config.quantiles.median_index()).mapv(|v| v * scale))
    }

    fn encode(
        &self, fitted: &FittedModel, idx: usize, frame: &SeriesFrame, timestamps: &[NaiveDateTime],
        values: &[f64], events: Option<&EventTable>,
    ) -> ForecastResult<EncodedSeries> {
        fitted.plan.encode(EncodeInput {
            series: idx,
            timestamps,
            values,
            covariates: frame.covariates.as_ref(),
            stats: &fitted.stats[idx],
            events,
            calendar: self.calendar.as_deref(),
        })
    }

    /// Append the rows of one context, denormalized, to `out`.
    fn decompose_into(
        &self, fitted: &FittedModel, ctx: &SampleContext<'_>, out: &mut Decomposition,
    ) {
        let composition = fitted.graph.compose(&fitted.theta, ctx);
        let yhat = composition.yhat();
        let y_norm = fitted.stats[ctx.series()].y;
        let median = self.config.quantiles.median_index();

        for row in yhat.rows() {
            out.yhat.push(row.iter().map(|&v| y_norm.denormalize(v)).collect());
        }

        let mut aggregates: BTreeMap<&'static str, Vec<f64>> = BTreeMap::new();
        for (component, part) in fitted.graph.components().iter().zip(&composition.parts) {
            let values: Vec<f64> = (0..ctx.horizon)
                .map(|h| match component.role() {
                    ComponentRole::Trend => y_norm.denormalize(part[[h, median]]),
                    ComponentRole::Additive => part[[h, median]] * y_norm.scale,
                    ComponentRole::Multiplicative => {
                        composition.trend[[h, median]] * part[[h, median]] * y_norm.scale
                    }
                })
                .collect();
            if let Some(key) = aggregate_column(component.family(), component.role()) {
                let acc = aggregates.entry(key).or_insert_with(|| vec![0.0; ctx.horizon]);
                for (a, v) in acc.iter_mut().zip(&values) {
                    *a += v;
                }
            }
            out.columns.entry(component.column()).or_default().extend(values);
        }
        for (key, values) in aggregates {
            out.columns.entry(key.to_string()).or_default().extend(values);
        }
    }

    fn table(
        &self, series_id: &str, timestamps: Vec<NaiveDateTime>, actual: Option<Array1<f64>>,
        decomposition: Decomposition,
    ) -> ForecastTable {
        let q = self.config.quantiles.len();
        let rows = decomposition.yhat.len();
        let yhat = Array2::from_shape_fn((rows, q), |(r, c)| decomposition.yhat[r][c]);
        ForecastTable {
            series_id: series_id.to_string(),
            timestamps,
            quantiles: self.config.quantiles.clone(),
            yhat,
            actual,
            components: decomposition
                .columns
                .into_iter()
                .map(|(k, v)| (k, Array1::from(v)))
                .collect(),
        }
    }
}

impl FittedModel {
    fn index_of(&self, id: &str) -> ForecastResult<usize> {
        self.series_index
            .get(id)
            .copied()
            .ok_or_else(|| ForecastError::UnknownSeries { id: id.to_string() })
    }
}

fn aggregate_column(family: ComponentFamily, role: ComponentRole) -> Option<&'static str> {
    match (family, role) {
        (ComponentFamily::Event, ComponentRole::Additive) => Some("events_additive"),
        (ComponentFamily::Event, ComponentRole::Multiplicative) => Some("events_multiplicative"),
        (ComponentFamily::FutureRegressor, ComponentRole::Additive) => {
            Some("future_regressors_additive")
        }
        (ComponentFamily::FutureRegressor, ComponentRole::Multiplicative) => {
            Some("future_regressors_multiplicative")
        }
        _ => None,
    }
}

/// Observed values of a regressor over the history of a series.
fn regressor_history(frame: &SeriesFrame, name: &str) -> Vec<f64> {
    let Some(cov) = frame.covariates.as_ref() else {
        return Vec::new();
    };
    frame.series.timestamps().iter().filter_map(|&ts| cov.value(name, ts)).collect()
}

fn fit_regressor(
    name: &str, values: &[f64], mode: NormalizeMode, first: NaiveDateTime,
) -> ForecastResult<ShiftScale> {
    if values.is_empty() {
        return Err(ForecastError::MissingRegressor { name: name.to_string(), timestamp: first });
    }
    ShiftScale::fit(values, mode)
}
