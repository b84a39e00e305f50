/// Discharge forecasters.
///
/// Submodules:
/// - `regression`  — standardisation and ridge least squares used by the
///   sequence forecaster.
/// - `sequence`    — short-horizon (days) lag-window forecaster with
///   iterative rollout and a heuristic fallback.
/// - `climatology` — seasonal (months) forecaster from per-month statistics
///   adjusted for the teleconnection phase.

pub mod climatology;
pub mod regression;
pub mod sequence;

pub use climatology::{ClimatologyForecaster, MonthlyStats};
pub use sequence::SequenceForecaster;
