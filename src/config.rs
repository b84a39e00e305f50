//! Engine configuration.
//!
//! Every lookup table the models consult (flood thresholds, population
//! densities, teleconnection multipliers, basin topology, reservoir shares)
//! is carried here instead of being embedded in the models, so a basin can
//! be reconfigured from a TOML file without recompiling. All fields default
//! to the Senegal-basin reference values; a partial file overrides only the
//! keys it names.

use crate::logging::{self, Component};
use crate::model::{HydroError, ObjectiveWeights, TeleconnectionPhase};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// Environment variable naming the TOML file read by `EngineConfig::from_env`.
pub const CONFIG_ENV_VAR: &str = "HYDROCAST_CONFIG";

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sequence: SequenceConfig,
    pub climatology: ClimatologyConfig,
    pub flood: FloodConfig,
    pub basin: BasinConfig,
    pub optimizer: OptimizerConfig,
    pub ensemble: EnsembleConfig,
    pub provider: ProviderConfig,
}

impl EngineConfig {
    /// Parses a TOML document. Missing sections and keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, HydroError> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| HydroError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, HydroError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| HydroError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&text)?;
        logging::info(
            Component::Config,
            None,
            &format!("Loaded engine configuration from {}", path.display()),
        );
        Ok(config)
    }

    /// Loads `.env` if present, then reads the file named by
    /// `HYDROCAST_CONFIG`. Without that variable the built-in defaults apply.
    pub fn from_env() -> Result<Self, HydroError> {
        dotenv::dotenv().ok();
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::load(path),
            Err(_) => {
                logging::debug(
                    Component::Config,
                    None,
                    &format!("{} not set, using built-in defaults", CONFIG_ENV_VAR),
                );
                Ok(Self::default())
            }
        }
    }

    /// Checks structural constraints the models rely on.
    pub fn validate(&self) -> Result<(), HydroError> {
        if self.sequence.window_length == 0 {
            return Err(HydroError::Config("sequence.window_length must be >= 1".into()));
        }
        if self.flood.grid_size == 0 {
            return Err(HydroError::Config("flood.grid_size must be >= 1".into()));
        }
        if !(self.flood.resolution_m > 0.0) {
            return Err(HydroError::Config("flood.resolution_m must be positive".into()));
        }
        // A seed shorter than the lag window pins every short-term forecast
        // to the fallback path.
        if self.sequence.recent_samples < self.sequence.window_length {
            return Err(HydroError::Config(format!(
                "sequence.recent_samples ({}) must be >= sequence.window_length ({})",
                self.sequence.recent_samples, self.sequence.window_length
            )));
        }
        self.climatology.validate()?;
        self.basin.validate()
    }
}

/// Lays a table read from the file over the built-in entries, so a file
/// naming one key keeps the rest.
fn merged_over<'de, D>(
    deserializer: D,
    defaults: BTreeMap<String, f64>,
) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<String, f64>::deserialize(deserializer)?;
    let mut merged = defaults;
    merged.extend(overrides);
    Ok(merged)
}

fn merge_multipliers<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, f64>, D::Error> {
    merged_over(d, ClimatologyConfig::default().multipliers)
}

fn merge_thresholds<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, f64>, D::Error> {
    merged_over(d, FloodConfig::default().thresholds)
}

fn merge_densities<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, f64>, D::Error> {
    merged_over(d, FloodConfig::default().densities)
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Lag-window length L.
    pub window_length: usize,
    /// Ridge penalty on the lag coefficients.
    pub ridge_lambda: f64,
    /// Fallback point estimate = mean of this many trailing values.
    pub fallback_tail: usize,
    /// Fallback noise scale is taken over this many trailing values.
    pub noise_tail: usize,
    pub noise_fraction: f64,
    pub interval_fraction: f64,
    /// History requested from the provider when fitting a session.
    pub history_days: u32,
    /// Trailing samples used as the forecast seed.
    pub recent_samples: usize,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            window_length: 30,
            ridge_lambda: 1e-3,
            fallback_tail: 5,
            noise_tail: 10,
            noise_fraction: 0.10,
            interval_fraction: 0.15,
            history_days: 90,
            recent_samples: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimatologyConfig {
    pub default_mean: f64,
    pub noise_fraction: f64,
    pub skill_score: f64,
    pub rainfall_factor: f64,
    pub drought_ratio: f64,
    pub monsoon_ratio: f64,
    /// Keyed by phase name, e.g. `strong_la_nina`. Entries in a file are
    /// merged over the defaults.
    #[serde(deserialize_with = "merge_multipliers")]
    pub multipliers: BTreeMap<String, f64>,
}

impl ClimatologyConfig {
    pub fn multiplier(&self, phase: TeleconnectionPhase) -> f64 {
        self.multipliers.get(phase.as_str()).copied().unwrap_or(1.0)
    }

    /// The table must name exactly the five phases, with finite multipliers
    /// strictly decreasing from strong La Niña to strong El Niño.
    pub fn validate(&self) -> Result<(), HydroError> {
        for key in self.multipliers.keys() {
            if !TeleconnectionPhase::ALL.iter().any(|p| p.as_str() == key) {
                return Err(HydroError::Config(format!(
                    "climatology.multipliers: unknown phase '{}'",
                    key
                )));
            }
        }
        let mut previous: Option<(TeleconnectionPhase, f64)> = None;
        for phase in TeleconnectionPhase::ALL {
            let Some(&m) = self.multipliers.get(phase.as_str()) else {
                return Err(HydroError::Config(format!(
                    "climatology.multipliers: missing phase '{}'",
                    phase.as_str()
                )));
            };
            if !m.is_finite() || m < 0.0 {
                return Err(HydroError::Config(format!(
                    "climatology.multipliers.{} must be a non-negative number",
                    phase.as_str()
                )));
            }
            if let Some((prev_phase, prev)) = previous {
                if m >= prev {
                    return Err(HydroError::Config(format!(
                        "climatology.multipliers: {} ({}) must be below {} ({})",
                        phase.as_str(),
                        m,
                        prev_phase.as_str(),
                        prev
                    )));
                }
            }
            previous = Some((phase, m));
        }
        Ok(())
    }
}

impl Default for ClimatologyConfig {
    fn default() -> Self {
        let multipliers = [
            (TeleconnectionPhase::StrongLaNina, 1.15),
            (TeleconnectionPhase::WeakLaNina, 1.07),
            (TeleconnectionPhase::Neutral, 1.0),
            (TeleconnectionPhase::WeakElNino, 0.93),
            (TeleconnectionPhase::StrongElNino, 0.75),
        ]
        .into_iter()
        .map(|(phase, m)| (phase.as_str().to_string(), m))
        .collect();
        Self {
            default_mean: 1000.0,
            noise_fraction: 0.10,
            skill_score: 0.65,
            rainfall_factor: 0.1,
            drought_ratio: 0.7,
            monsoon_ratio: 1.4,
            multipliers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    pub grid_size: usize,
    pub resolution_m: f64,
    pub noise_scale: f64,
    /// Distance (cells) at which the proximity weight halves.
    pub proximity_scale: f64,
    pub cell_threshold: f64,
    pub default_threshold: f64,
    /// Per-location overrides, merged over the defaults.
    #[serde(deserialize_with = "merge_thresholds")]
    pub thresholds: BTreeMap<String, f64>,
    /// Inhabitants per km².
    pub default_density: f64,
    #[serde(deserialize_with = "merge_densities")]
    pub densities: BTreeMap<String, f64>,
    pub critical_population: u64,
    pub critical_zone_name: String,
}

impl FloodConfig {
    pub fn threshold_for(&self, location_id: &str) -> f64 {
        self.thresholds
            .get(location_id)
            .copied()
            .unwrap_or(self.default_threshold)
    }

    pub fn density_for(&self, location_id: &str) -> f64 {
        self.densities
            .get(location_id)
            .copied()
            .unwrap_or(self.default_density)
    }
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            grid_size: 128,
            resolution_m: 30.0,
            noise_scale: 0.3,
            proximity_scale: 30.0,
            cell_threshold: 0.5,
            default_threshold: 2000.0,
            thresholds: BTreeMap::from([
                ("station_001".to_string(), 2500.0),
                ("station_002".to_string(), 1800.0),
                ("dam_manantali".to_string(), 2200.0),
            ]),
            default_density: 50.0,
            densities: BTreeMap::from([
                ("station_001".to_string(), 80.0),
                ("station_002".to_string(), 60.0),
                ("dam_manantali".to_string(), 30.0),
            ]),
            critical_population: 10_000,
            critical_zone_name: "Main floodplain".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Source,
    Station,
    Dam,
    Outlet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    pub delay_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasinConfig {
    /// Fraction of the attenuated signal passed along each edge.
    pub transfer: f64,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

impl BasinConfig {
    /// Rejects duplicate nodes, dangling edges and zero-delay edges.
    pub fn validate(&self) -> Result<(), HydroError> {
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(HydroError::InvalidTopology(format!(
                    "duplicate node '{}'",
                    node.id
                )));
            }
        }
        for edge in &self.edges {
            for end in [&edge.from, &edge.to] {
                if !ids.contains(end.as_str()) {
                    return Err(HydroError::InvalidTopology(format!(
                        "edge {} -> {} references unknown node '{}'",
                        edge.from, edge.to, end
                    )));
                }
            }
            // A zero delay would let a node feed a value computed on the same day.
            if edge.delay_days == 0 {
                return Err(HydroError::InvalidTopology(format!(
                    "edge {} -> {} has zero delay",
                    edge.from, edge.to
                )));
            }
        }
        Ok(())
    }
}

fn node(id: &str, name: &str, kind: NodeKind, latitude: f64, longitude: f64) -> NodeSpec {
    NodeSpec {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        latitude,
        longitude,
    }
}

fn edge(from: &str, to: &str, delay_days: usize) -> EdgeSpec {
    EdgeSpec {
        from: from.to_string(),
        to: to.to_string(),
        delay_days,
    }
}

impl Default for BasinConfig {
    fn default() -> Self {
        Self {
            transfer: 0.7,
            nodes: vec![
                node("fouta_djallon", "Fouta Djallon", NodeKind::Source, 10.5, -10.5),
                node("bakel", "Bakel", NodeKind::Station, 14.22, -11.92),
                node("matam", "Matam", NodeKind::Station, 14.13, -11.77),
                node("manantali", "Manantali", NodeKind::Dam, 12.08, -7.98),
                node("kaedi", "Kaédi", NodeKind::Station, 13.83, -13.15),
                node("diama", "Diama", NodeKind::Dam, 14.72, -14.65),
                node("delta", "Delta", NodeKind::Outlet, 14.8, -14.5),
            ],
            edges: vec![
                edge("fouta_djallon", "manantali", 3),
                edge("fouta_djallon", "bakel", 8),
                edge("manantali", "matam", 5),
                edge("manantali", "kaedi", 7),
                edge("bakel", "matam", 1),
                edge("matam", "kaedi", 3),
                edge("kaedi", "diama", 8),
                edge("diama", "delta", 2),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservoirSpec {
    pub id: String,
    pub name: String,
    /// Target discharge as a share of the mean forecast inflow.
    pub share_of_inflow: f64,
    /// Fixed target level; `None` uses the inflow-dependent step.
    pub fixed_level_percent: Option<f64>,
    pub current_level_percent: f64,
    pub current_inflow_m3_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Primary, secondary, tertiary.
    pub reservoirs: Vec<ReservoirSpec>,
    pub high_inflow_m3_s: f64,
    pub high_level_percent: f64,
    pub low_level_percent: f64,
    pub default_weights: ObjectiveWeights,
    pub safe_discharge_m3_s: f64,
    pub safety_score_ok: f64,
    pub safety_score_risky: f64,
    pub environment_score: f64,
    pub irrigation_score: f64,
    /// Primary discharge that scores 100 on energy.
    pub energy_reference_m3_s: f64,
    pub expected_irrigation_m3: f64,
    pub salinity_min_discharge_m3_s: f64,
    /// Design target, not a measured value.
    pub improvement_vs_manual: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        let reservoir = |id: &str, name: &str, share: f64, fixed: Option<f64>, level: f64, inflow: f64| {
            ReservoirSpec {
                id: id.to_string(),
                name: name.to_string(),
                share_of_inflow: share,
                fixed_level_percent: fixed,
                current_level_percent: level,
                current_inflow_m3_s: inflow,
            }
        };
        Self {
            reservoirs: vec![
                reservoir("manantali", "Manantali", 1.0, None, 62.0, 1200.0),
                reservoir("diama", "Diama", 0.8, Some(70.0), 68.0, 950.0),
                reservoir("felou", "Félou", 0.3, Some(72.0), 71.0, 400.0),
            ],
            high_inflow_m3_s: 1200.0,
            high_level_percent: 65.0,
            low_level_percent: 55.0,
            default_weights: ObjectiveWeights::default(),
            safe_discharge_m3_s: 2500.0,
            safety_score_ok: 80.0,
            safety_score_risky: 50.0,
            environment_score: 75.0,
            irrigation_score: 85.0,
            energy_reference_m3_s: 1500.0,
            expected_irrigation_m3: 50e6,
            salinity_min_discharge_m3_s: 500.0,
            improvement_vs_manual: 0.17,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionPolicy {
    /// Forward the sequence forecaster's output unchanged.
    PassThrough,
    /// Weighted mean of all available members, agreement-based confidence.
    Weighted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub seed: u64,
    pub fusion: FusionPolicy,
    pub confidence_base: f64,
    pub confidence_span: f64,
    pub sequence_weight: f64,
    pub climatology_weight: f64,
    pub persistence_weight: f64,
    pub short_term_confidence: f64,
    pub drought_ratio: f64,
    pub vigilance_ratio: f64,
    pub alert_max_ratio: f64,
    pub drought_discharge_m3_s: f64,
    pub seasonal_months: usize,
    pub max_snapshot_age_minutes: u64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            seed: crate::rng::DEFAULT_SEED,
            fusion: FusionPolicy::PassThrough,
            confidence_base: 0.85,
            confidence_span: 0.10,
            sequence_weight: 0.60,
            climatology_weight: 0.25,
            persistence_weight: 0.15,
            short_term_confidence: 0.88,
            drought_ratio: 0.7,
            vigilance_ratio: 1.2,
            alert_max_ratio: 1.5,
            drought_discharge_m3_s: 600.0,
            seasonal_months: 3,
            max_snapshot_age_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub seed: u64,
    pub sample_interval_hours: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            sample_interval_hours: 24,
        }
    }
}
