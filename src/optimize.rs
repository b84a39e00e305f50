//! Multi-objective reservoir release recommendation.
//!
//! Release targets are fixed shares of the mean forecast inflow. The primary
//! reservoir's target level steps up when inflow is high; the others hold
//! fixed levels. Four objective scores in [0, 100] are combined with
//! normalised weights into a composite score in [0, 100].

use crate::config::OptimizerConfig;
use crate::logging::{self, Component};
use crate::model::{ObjectiveScores, ObjectiveWeights, OptimizationPlan, ReservoirTarget};
use std::collections::BTreeMap;

const WEIGHT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct DamReleaseOptimizer {
    config: OptimizerConfig,
}

impl DamReleaseOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Normalises weights to sum to 1.
    ///
    /// Negative or non-finite components count as zero; if nothing positive
    /// remains the configured defaults are used instead.
    pub fn normalize_weights(&self, weights: ObjectiveWeights) -> ObjectiveWeights {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let cleaned = ObjectiveWeights {
            energy: clean(weights.energy),
            irrigation: clean(weights.irrigation),
            environment: clean(weights.environment),
            safety: clean(weights.safety),
        };
        let total = cleaned.total();
        if !(total > 0.0) {
            logging::warn(
                Component::Optimizer,
                None,
                "objective weights have no positive component, using defaults",
            );
            return self.normalize_weights_or_self(self.config.default_weights);
        }
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            logging::debug(
                Component::Optimizer,
                None,
                &format!("normalising objective weights (sum was {:.4})", total),
            );
        }
        ObjectiveWeights {
            energy: cleaned.energy / total,
            irrigation: cleaned.irrigation / total,
            environment: cleaned.environment / total,
            safety: cleaned.safety / total,
        }
    }

    fn normalize_weights_or_self(&self, weights: ObjectiveWeights) -> ObjectiveWeights {
        let total = weights.total();
        if total > 0.0 {
            ObjectiveWeights {
                energy: weights.energy / total,
                irrigation: weights.irrigation / total,
                environment: weights.environment / total,
                safety: weights.safety / total,
            }
        } else {
            ObjectiveWeights::default()
        }
    }

    /// Recommends targets for the configured reservoirs.
    ///
    /// `current_inflows` and `current_levels` are keyed by reservoir id.
    /// With no forecast inflows the primary reservoir's current inflow
    /// stands in for the forecast mean.
    pub fn optimize(
        &self,
        current_inflows: &BTreeMap<String, f64>,
        current_levels: &BTreeMap<String, f64>,
        forecast_inflows: &[f64],
        weights: Option<ObjectiveWeights>,
    ) -> OptimizationPlan {
        let weights = self.normalize_weights(weights.unwrap_or(self.config.default_weights));

        let finite: Vec<f64> = forecast_inflows.iter().copied().filter(|v| v.is_finite()).collect();
        let mean_inflow = if finite.is_empty() {
            let primary_id = self.config.reservoirs.first().map(|r| r.id.as_str()).unwrap_or("");
            let fallback = current_inflows.get(primary_id).copied().unwrap_or(0.0);
            logging::warn(
                Component::Optimizer,
                Some(primary_id),
                &format!("no forecast inflows, using current inflow {:.0} m³/s", fallback),
            );
            fallback
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        };

        let primary_level = if mean_inflow > self.config.high_inflow_m3_s {
            self.config.high_level_percent
        } else {
            self.config.low_level_percent
        };

        let reservoirs: Vec<ReservoirTarget> = self
            .config
            .reservoirs
            .iter()
            .map(|spec| {
                if let Some(level) = current_levels.get(&spec.id) {
                    logging::debug(
                        Component::Optimizer,
                        Some(&spec.id),
                        &format!("current level {:.1}%", level),
                    );
                }
                ReservoirTarget {
                    id: spec.id.clone(),
                    name: spec.name.clone(),
                    target_discharge_m3_s: mean_inflow * spec.share_of_inflow,
                    target_level_percent: spec.fixed_level_percent.unwrap_or(primary_level),
                }
            })
            .collect();

        let primary_discharge = reservoirs.first().map(|r| r.target_discharge_m3_s).unwrap_or(0.0);
        let secondary_discharge = reservoirs.get(1).map(|r| r.target_discharge_m3_s).unwrap_or(0.0);

        let scores = self.score(primary_discharge);
        let contributions = ObjectiveScores {
            energy: scores.energy * weights.energy,
            irrigation: scores.irrigation * weights.irrigation,
            environment: scores.environment * weights.environment,
            safety: scores.safety * weights.safety,
        };
        let composite = (contributions.energy
            + contributions.irrigation
            + contributions.environment
            + contributions.safety)
            .clamp(0.0, 100.0);

        OptimizationPlan {
            reservoirs,
            scores,
            weights,
            contributions,
            composite_score: composite,
            expected_energy_gwh: primary_discharge * 0.8 / 1000.0,
            expected_irrigation_m3: self.config.expected_irrigation_m3,
            expected_salinity_control: secondary_discharge > self.config.salinity_min_discharge_m3_s,
            expected_environmental_benefit: if scores.environment > 70.0 { "good" } else { "fair" }
                .to_string(),
            improvement_vs_manual: self.config.improvement_vs_manual,
        }
    }

    fn score(&self, primary_discharge: f64) -> ObjectiveScores {
        let safety = if primary_discharge < self.config.safe_discharge_m3_s {
            self.config.safety_score_ok
        } else {
            self.config.safety_score_risky
        };
        let energy = if self.config.energy_reference_m3_s > 0.0 {
            primary_discharge / self.config.energy_reference_m3_s * 100.0
        } else {
            0.0
        };
        ObjectiveScores {
            energy: energy.clamp(0.0, 100.0),
            irrigation: self.config.irrigation_score.clamp(0.0, 100.0),
            environment: self.config.environment_score.clamp(0.0, 100.0),
            safety: safety.clamp(0.0, 100.0),
        }
    }

    /// Current inflows keyed by reservoir id, from configuration.
    pub fn configured_inflows(&self) -> BTreeMap<String, f64> {
        self.config
            .reservoirs
            .iter()
            .map(|r| (r.id.clone(), r.current_inflow_m3_s))
            .collect()
    }

    /// Current levels keyed by reservoir id, from configuration.
    pub fn configured_levels(&self) -> BTreeMap<String, f64> {
        self.config
            .reservoirs
            .iter()
            .map(|r| (r.id.clone(), r.current_level_percent))
            .collect()
    }
}
