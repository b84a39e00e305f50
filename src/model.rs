/// Core data types for the basin forecasting engine.
///
/// This module defines the shared domain model imported by all other modules:
/// observations, locations, forecast results and the error type. It contains
/// no forecasting logic and no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Observation types
// ---------------------------------------------------------------------------

/// One sample of a location's historical series, as supplied by the data
/// provider. Series are ordered oldest to newest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesSample {
    pub timestamp: DateTime<Utc>,
    pub discharge_m3_s: f64,
    pub rainfall_mm: f64,
    pub temperature_c: f64,
    pub ndvi: f64,
}

/// Discharge values of a series, in order.
pub fn discharges(series: &[TimeSeriesSample]) -> Vec<f64> {
    series.iter().map(|s| s.discharge_m3_s).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Station,
    Dam,
    Basin,
}

/// Immutable reference data for a monitored location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub kind: LocationKind,
    pub latitude: f64,
    pub longitude: f64,
    /// Characteristic discharge in m³/s.
    pub baseline_discharge: f64,
}

/// Hydrological state of a location relative to its baseline discharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterStatus {
    CriticalLow,
    Low,
    Normal,
    High,
    CriticalHigh,
}

impl WaterStatus {
    /// Classifies a discharge against the location baseline.
    pub fn classify(discharge: f64, baseline: f64) -> Self {
        if discharge < baseline * 0.5 {
            WaterStatus::CriticalLow
        } else if discharge < baseline * 0.8 {
            WaterStatus::Low
        } else if discharge < baseline * 1.3 {
            WaterStatus::Normal
        } else if discharge < baseline * 1.8 {
            WaterStatus::High
        } else {
            WaterStatus::CriticalHigh
        }
    }

    pub fn alert_level(self) -> AlertLevel {
        match self {
            WaterStatus::CriticalLow => AlertLevel::Alert,
            WaterStatus::Low => AlertLevel::Vigilance,
            WaterStatus::Normal => AlertLevel::Normal,
            WaterStatus::High => AlertLevel::Vigilance,
            WaterStatus::CriticalHigh => AlertLevel::AlertMax,
        }
    }
}

/// Point reading returned by `HydroDataProvider::current_snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSnapshot {
    pub location_id: String,
    pub timestamp: DateTime<Utc>,
    pub discharge_m3_s: f64,
    pub water_level_m: f64,
    pub rainfall_24h_mm: f64,
    pub temperature_c: f64,
    pub ndvi: f64,
    /// Percent, in [0, 100].
    pub soil_moisture: f64,
    /// In [0, 1].
    pub confidence: f64,
    pub water_status: WaterStatus,
    pub alert_level: AlertLevel,
}

// ---------------------------------------------------------------------------
// Forecast results
// ---------------------------------------------------------------------------

/// Which branch of the sequence forecaster produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastPath {
    Fitted,
    Fallback,
}

/// Short-horizon discharge forecast.
///
/// `low` and `high` run parallel to `values`. The band is a fixed ±15%
/// heuristic, not derived from residual variance, so it carries no coverage
/// guarantee. `drivers` weights sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub horizon_days: usize,
    pub values: Vec<f64>,
    pub low: Vec<f64>,
    pub high: Vec<f64>,
    pub drivers: BTreeMap<String, f64>,
    pub path: ForecastPath,
}

impl ForecastResult {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonClass {
    Drought,
    Normal,
    StrongMonsoon,
}

/// Large-scale climate oscillation state, ordered from wettest to driest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeleconnectionPhase {
    StrongLaNina,
    WeakLaNina,
    Neutral,
    WeakElNino,
    StrongElNino,
}

impl TeleconnectionPhase {
    pub const ALL: [TeleconnectionPhase; 5] = [
        TeleconnectionPhase::StrongLaNina,
        TeleconnectionPhase::WeakLaNina,
        TeleconnectionPhase::Neutral,
        TeleconnectionPhase::WeakElNino,
        TeleconnectionPhase::StrongElNino,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TeleconnectionPhase::StrongLaNina => "strong_la_nina",
            TeleconnectionPhase::WeakLaNina => "weak_la_nina",
            TeleconnectionPhase::Neutral => "neutral",
            TeleconnectionPhase::WeakElNino => "weak_el_nino",
            TeleconnectionPhase::StrongElNino => "strong_el_nino",
        }
    }
}

/// Probabilities of strong, normal and weak seasonal flow. Sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowProbabilities {
    pub strong: f64,
    pub normal: f64,
    pub weak: f64,
}

impl FlowProbabilities {
    pub fn total(&self) -> f64 {
        self.strong + self.normal + self.weak
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalOutlook {
    pub horizon_months: usize,
    pub season: SeasonClass,
    pub probabilities: FlowProbabilities,
    pub monthly_discharge_m3_s: Vec<f64>,
    pub predicted_total_rainfall_mm: f64,
    pub predicted_avg_discharge_m3_s: f64,
    /// In [0, 1].
    pub skill_score: f64,
    pub teleconnections: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalZone {
    pub name: String,
    pub inundation_probability: f64,
    pub affected_population: u64,
}

/// Square inundation-probability grid for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodMap {
    /// Row-major, `grid.len() == grid[i].len()`, every cell in [0, 1].
    pub grid: Vec<Vec<f64>>,
    pub resolution_m: f64,
    pub intensity: f64,
    pub affected_area_km2: f64,
    pub affected_population: u64,
    pub critical_zones: Vec<CriticalZone>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

/// A `FloodMap` stamped with its identity and geographic extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodPrediction {
    pub prediction_id: String,
    pub issued_at: DateTime<Utc>,
    pub bbox: BoundingBox,
    pub map: FloodMap,
}

/// Per-node anomaly magnitudes, indexed by day offset `0..horizon`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationSeries {
    pub horizon_days: usize,
    pub series: BTreeMap<String, Vec<f64>>,
}

impl PropagationSeries {
    pub fn node(&self, id: &str) -> Option<&[f64]> {
        self.series.get(id).map(|v| v.as_slice())
    }
}

/// Release target for one reservoir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservoirTarget {
    pub id: String,
    pub name: String,
    pub target_discharge_m3_s: f64,
    pub target_level_percent: f64,
}

/// Per-objective values, used both for weights and for scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    pub energy: f64,
    pub irrigation: f64,
    pub environment: f64,
    pub safety: f64,
}

impl ObjectiveWeights {
    pub fn total(&self) -> f64 {
        self.energy + self.irrigation + self.environment + self.safety
    }
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            energy: 0.30,
            irrigation: 0.35,
            environment: 0.20,
            safety: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveScores {
    pub energy: f64,
    pub irrigation: f64,
    pub environment: f64,
    pub safety: f64,
}

/// Recommended release policy for the primary, secondary and tertiary
/// reservoirs, in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationPlan {
    pub reservoirs: Vec<ReservoirTarget>,
    pub scores: ObjectiveScores,
    pub weights: ObjectiveWeights,
    /// Score × weight for each objective; the fields sum to `composite_score`.
    pub contributions: ObjectiveScores,
    pub composite_score: f64,
    pub expected_energy_gwh: f64,
    pub expected_irrigation_m3: f64,
    pub expected_salinity_control: bool,
    pub expected_environmental_benefit: String,
    /// Placeholder design target, not a measured improvement.
    pub improvement_vs_manual: f64,
}

impl OptimizationPlan {
    pub fn primary(&self) -> Option<&ReservoirTarget> {
        self.reservoirs.first()
    }

    pub fn secondary(&self) -> Option<&ReservoirTarget> {
        self.reservoirs.get(1)
    }

    pub fn tertiary(&self) -> Option<&ReservoirTarget> {
        self.reservoirs.get(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    EnsembleVoting,
    WeightedFusion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleForecast {
    pub values: Vec<f64>,
    pub low: Vec<f64>,
    pub high: Vec<f64>,
    /// In [0, 1].
    pub confidence_score: f64,
    pub drivers: BTreeMap<String, f64>,
    pub method: FusionMethod,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Hydrological alert levels, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Normal,
    Vigilance,
    Alert,
    AlertMax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Flood,
    Drought,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::Flood => "flood",
            AlertKind::Drought => "drought",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub location_id: String,
    pub location_name: String,
    pub trigger_date: DateTime<Utc>,
    pub event_expected_date: DateTime<Utc>,
    pub lead_time_days: usize,
    pub message_en: String,
    pub message_fr: String,
    pub confidence: f64,
}

/// Short-term forecast as presented to alerting and the bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTermForecast {
    pub location_id: String,
    pub location_name: String,
    pub issued_at: DateTime<Utc>,
    pub horizon_days: usize,
    /// First forecast day; 0 when the horizon is empty.
    pub predicted_discharge_m3_s: f64,
    pub predicted_water_level_m: f64,
    pub inundation_risk: f64,
    pub alert_level: AlertLevel,
    pub confidence_score: f64,
    pub confidence_interval_low: f64,
    pub confidence_interval_high: f64,
    pub forecast: ForecastResult,
}

/// Everything the coordinator produces for one location in one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub location_id: String,
    pub short_term: ShortTermForecast,
    pub seasonal: SeasonalOutlook,
    pub flood: FloodPrediction,
    pub dam_plan: OptimizationPlan,
    pub alerts: Vec<Alert>,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise in the engine or at the data-provider boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum HydroError {
    /// The data provider could not be reached or failed internally.
    ProviderUnavailable(String),
    /// The provider does not know the requested location.
    UnknownLocation(String),
    /// Not enough samples to perform an operation.
    InsufficientData { needed: usize, found: usize },
    /// A series contained non-finite or otherwise unusable values.
    MalformedSeries(String),
    /// The regression normal equations could not be solved.
    SingularSystem,
    /// A basin graph failed structural validation.
    InvalidTopology(String),
    /// A basin node id is not part of the graph.
    UnknownNode(String),
    /// Configuration could not be read or parsed.
    Config(String),
}

impl std::fmt::Display for HydroError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HydroError::ProviderUnavailable(msg) => write!(f, "Provider unavailable: {}", msg),
            HydroError::UnknownLocation(id) => write!(f, "Unknown location: {}", id),
            HydroError::InsufficientData { needed, found } => {
                write!(f, "Insufficient data: needed {}, found {}", needed, found)
            }
            HydroError::MalformedSeries(msg) => write!(f, "Malformed series: {}", msg),
            HydroError::SingularSystem => write!(f, "Regression system is singular"),
            HydroError::InvalidTopology(msg) => write!(f, "Invalid basin topology: {}", msg),
            HydroError::UnknownNode(id) => write!(f, "Unknown basin node: {}", id),
            HydroError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for HydroError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_water_status_bands() {
        assert_eq!(WaterStatus::classify(400.0, 1000.0), WaterStatus::CriticalLow);
        assert_eq!(WaterStatus::classify(700.0, 1000.0), WaterStatus::Low);
        assert_eq!(WaterStatus::classify(1000.0, 1000.0), WaterStatus::Normal);
        assert_eq!(WaterStatus::classify(1500.0, 1000.0), WaterStatus::High);
        assert_eq!(WaterStatus::classify(1800.0, 1000.0), WaterStatus::CriticalHigh);
    }

    #[test]
    fn test_alert_levels_are_ordered_by_severity() {
        assert!(AlertLevel::Normal < AlertLevel::Vigilance);
        assert!(AlertLevel::Vigilance < AlertLevel::Alert);
        assert!(AlertLevel::Alert < AlertLevel::AlertMax);
    }

    #[test]
    fn test_default_objective_weights_sum_to_one() {
        assert!((ObjectiveWeights::default().total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_error_display_includes_context() {
        let err = HydroError::InsufficientData { needed: 31, found: 12 };
        assert_eq!(err.to_string(), "Insufficient data: needed 31, found 12");
        assert!(HydroError::UnknownNode("nowhere".into()).to_string().contains("nowhere"));
    }

    #[test]
    fn test_teleconnection_phase_serializes_snake_case() {
        let json = serde_json::to_string(&TeleconnectionPhase::StrongLaNina).unwrap();
        assert_eq!(json, "\"strong_la_nina\"");
        for phase in TeleconnectionPhase::ALL {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{}\"", phase.as_str()));
        }
    }
}
