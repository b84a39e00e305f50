/// Alert derivation and data-freshness checks.
///
/// Submodules:
/// - `thresholds`  — alert level from the forecast-to-recent discharge ratio,
///   and the flood/drought alert records derived from a short-term forecast.
/// - `stalenesses` — snapshot age checks with an injectable clock.

pub mod stalenesses;
pub mod thresholds;

pub use stalenesses::{is_snapshot_stale, is_snapshot_stale_at};
pub use thresholds::{derive_alert_level, generate_alerts};
