//! rust_forecast — decomposable neural forecasting for time series.
//!
//! Purpose
//! -------
//! Serve as the crate root. Forecasts are built from interpretable parts
//! (piecewise-linear trend, Fourier seasonality, events and holidays, future
//! and lagged regressors, and an AR-Net) that are fitted jointly with a
//! quantile (pinball) loss by a minibatch gradient trainer.
//!
//! Key behaviors
//! -------------
//! - Re-export the forecasting stack ([`forecasting`]) and the optimization
//!   layer ([`optimization`]) as the public crate surface.
//! - Keep numerical components, model orchestration and training separate:
//!   components know nothing of the trainer, the trainer knows nothing of
//!   time series.
//!
//! Invariants & assumptions
//! ------------------------
//! - The crate installs no logging subscriber; diagnostics are emitted as
//!   `tracing` events for the host application to collect.
//! - Given the same data, configuration and seed, fitting is deterministic
//!   (with sequential minibatch evaluation).
//!
//! Conventions
//! -----------
//! - Errors surface as [`forecasting::ForecastError`] at the model layer and
//!   [`optimization::errors::OptError`] at the trainer layer; the former
//!   wraps the latter.
//!
//! Downstream usage
//! ----------------
//! ```no_run
//! use rust_forecast::forecasting::prelude::*;
//!
//! # fn run(frame: SeriesFrame) -> ForecastResult<()> {
//! let mut model = Forecaster::new(ForecasterConfig::default())?;
//! model.fit(std::slice::from_ref(&frame), None)?;
//! let forecast = model.predict(&frame, 30, None)?;
//! println!("{:?}", forecast.median());
//! # Ok(())
//! # }
//! ```
//!
//! Testing notes
//! -------------
//! - Unit tests live next to the code they cover; end-to-end pipelines are
//!   exercised in `tests/`.

pub mod forecasting;
pub mod optimization;
