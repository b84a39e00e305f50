//! hydrocast: multi-model river discharge forecasting for a dam-regulated
//! basin.
//!
//! Modules:
//! - `model`: shared data types and the `HydroError` enum.
//! - `config`: TOML-backed engine configuration and lookup tables.
//! - `logging`: global component-tagged logger.
//! - `rng`: seeded noise source and sampling helpers.
//! - `stations`: static registry of reference locations.
//! - `provider`: data-acquisition trait and the synthetic provider.
//! - `forecast`: sequence (days) and climatology (months) forecasters.
//! - `flood`: spatial inundation estimate.
//! - `basin`: delayed anomaly propagation over the river graph.
//! - `optimize`: multi-objective reservoir release plan.
//! - `alert`: alert levels, alert records, snapshot staleness.
//! - `ensemble`: per-session orchestration and the forecast bundle.

pub mod alert;
pub mod basin;
pub mod config;
pub mod ensemble;
pub mod flood;
pub mod forecast;
pub mod logging;
pub mod model;
pub mod optimize;
pub mod provider;
pub mod rng;
pub mod stations;

pub use config::EngineConfig;
pub use ensemble::{EnsembleCoordinator, ForecastSession};
pub use model::HydroError;
pub use provider::{HydroDataProvider, SyntheticProvider};
