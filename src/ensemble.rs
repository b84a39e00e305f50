//! Session-scoped orchestration of every model.
//!
//! A `ForecastSession` owns the data provider, the seeded noise source and
//! the fitted forecasters. Fitting happens at most once per session, on the
//! first request that needs a model; concurrent first requests block on the
//! same fit and all observe the finished state.
//!
//! `EnsembleCoordinator` wraps a session together with the stateless
//! estimators (flood, basin, reservoirs) and exposes the per-location
//! operations, up to the combined `ForecastBundle`.

use crate::alert::{self, is_snapshot_stale_at};
use crate::basin::BasinPropagationGraph;
use crate::config::{EngineConfig, FusionPolicy};
use crate::flood::SpatialFloodEstimator;
use crate::forecast::sequence::{mean, population_std};
use crate::forecast::{ClimatologyForecaster, SequenceForecaster};
use crate::logging::{self, Component};
use crate::model::{
    discharges, Alert, BoundingBox, EnsembleForecast, FloodPrediction, ForecastBundle,
    ForecastPath, ForecastResult, FusionMethod, HydroError, Location, ObjectiveWeights,
    OptimizationPlan, PropagationSeries, SeasonalOutlook, ShortTermForecast,
    TeleconnectionPhase, TimeSeriesSample,
};
use crate::optimize::DamReleaseOptimizer;
use crate::provider::{water_level_for, HydroDataProvider};
use crate::rng::{self, NoiseSource};
use crate::stations::resolve_location;
use chrono::{DateTime, Datelike, Duration, Utc};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};

/// Half-width, in degrees, of the box reported around a flood prediction.
pub const FLOOD_BBOX_HALF_WIDTH_DEG: f64 = 0.3;

/// Phase assumed for a calendar month when no teleconnection index is fed in.
pub fn phase_for_month(month: u32) -> TeleconnectionPhase {
    const CYCLE: [TeleconnectionPhase; 3] = [
        TeleconnectionPhase::Neutral,
        TeleconnectionPhase::WeakLaNina,
        TeleconnectionPhase::StrongElNino,
    ];
    CYCLE[(month % 3) as usize]
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Forecasters as left by the session's single fit.
#[derive(Debug, Clone)]
pub struct FittedModels {
    pub sequence: SequenceForecaster,
    pub climatology: ClimatologyForecaster,
    /// Location whose history the fit used.
    pub fitted_from: String,
}

pub struct ForecastSession {
    config: EngineConfig,
    provider: Arc<dyn HydroDataProvider>,
    models: OnceLock<FittedModels>,
    noise: Mutex<NoiseSource>,
}

impl ForecastSession {
    pub fn new(config: EngineConfig, provider: Arc<dyn HydroDataProvider>) -> Self {
        let noise = Mutex::new(NoiseSource::from_seed_u64(config.ensemble.seed));
        Self {
            config,
            provider,
            models: OnceLock::new(),
            noise,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn HydroDataProvider {
        self.provider.as_ref()
    }

    /// `true` once the fit step has run, whether or not it succeeded.
    pub fn is_initialised(&self) -> bool {
        self.models.get().is_some()
    }

    pub fn models(&self) -> Option<&FittedModels> {
        self.models.get()
    }

    /// Fits the forecasters from `location_id`'s history unless a fit has
    /// already run in this session.
    ///
    /// Failures are logged and leave the affected model unfitted; the
    /// session still counts as initialised and will not retry.
    pub fn ensure_fitted(&self, location_id: &str) -> &FittedModels {
        self.models.get_or_init(|| self.fit_models(location_id))
    }

    fn fit_models(&self, location_id: &str) -> FittedModels {
        let mut sequence = SequenceForecaster::new(self.config.sequence.clone());
        let mut climatology = ClimatologyForecaster::new(self.config.climatology.clone());

        let days = self.config.sequence.history_days;
        match self.provider.historical_series(location_id, days) {
            Ok(history) => {
                if let Err(e) = sequence.fit(&discharges(&history)) {
                    logging::log_fit_failure(Component::Sequence, Some(location_id), &e);
                }
                if let Err(e) = climatology.fit(&history) {
                    logging::log_fit_failure(Component::Climatology, Some(location_id), &e);
                }
                logging::info(
                    Component::Ensemble,
                    Some(location_id),
                    &format!(
                        "Session models initialised from {} samples (sequence {}, climatology {})",
                        history.len(),
                        if sequence.is_fitted() { "fitted" } else { "fallback" },
                        if climatology.is_fitted() { "fitted" } else { "default" },
                    ),
                );
            }
            Err(e) => {
                logging::log_provider_failure(location_id, "historical_series", &e);
            }
        }

        FittedModels {
            sequence,
            climatology,
            fitted_from: location_id.to_string(),
        }
    }

    /// Runs `f` with exclusive access to the session's noise source.
    pub fn with_noise<T>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
        // Noise state stays usable even if another request panicked with the lock held.
        let mut guard = self.noise.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard.0)
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct EnsembleCoordinator {
    session: ForecastSession,
    flood: SpatialFloodEstimator,
    basin: BasinPropagationGraph,
    optimizer: DamReleaseOptimizer,
}

impl EnsembleCoordinator {
    /// Builds a coordinator for a fresh session.
    ///
    /// Fails only if the configuration does not validate.
    pub fn new(config: EngineConfig, provider: Arc<dyn HydroDataProvider>) -> Result<Self, HydroError> {
        config.validate()?;
        let basin = BasinPropagationGraph::new(&config.basin)?;
        let flood = SpatialFloodEstimator::new(config.flood.clone());
        let optimizer = DamReleaseOptimizer::new(config.optimizer.clone());
        Ok(Self {
            session: ForecastSession::new(config, provider),
            flood,
            basin,
            optimizer,
        })
    }

    pub fn session(&self) -> &ForecastSession {
        &self.session
    }

    pub fn basin(&self) -> &BasinPropagationGraph {
        &self.basin
    }

    fn config(&self) -> &EngineConfig {
        self.session.config()
    }

    // -----------------------------------------------------------------------
    // Ensemble forecast
    // -----------------------------------------------------------------------

    /// Combined short-horizon forecast for `location`.
    ///
    /// `recent` seeds the sequence forecaster; `history` supplies the
    /// climatology member under the weighted fusion policy.
    pub fn ensemble_forecast(
        &self,
        recent: &[f64],
        history: &[TimeSeriesSample],
        location: &Location,
        horizon: usize,
    ) -> EnsembleForecast {
        self.run_ensemble(recent, history, location, horizon).0
    }

    fn run_ensemble(
        &self,
        recent: &[f64],
        history: &[TimeSeriesSample],
        location: &Location,
        horizon: usize,
    ) -> (EnsembleForecast, ForecastPath) {
        let models = self.session.ensure_fitted(&location.id);
        let cfg = &self.config().ensemble;

        let (sequence, ensemble) = self.session.with_noise(|rng| {
            let sequence = models.sequence.forecast(recent, horizon, rng);
            let ensemble = match cfg.fusion {
                FusionPolicy::PassThrough => {
                    let confidence = cfg.confidence_base + rng::uniform(rng, 0.0, cfg.confidence_span);
                    EnsembleForecast {
                        values: sequence.values.clone(),
                        low: sequence.low.clone(),
                        high: sequence.high.clone(),
                        confidence_score: confidence.clamp(0.0, 1.0),
                        drivers: sequence.drivers.clone(),
                        method: FusionMethod::EnsembleVoting,
                    }
                }
                FusionPolicy::Weighted => {
                    self.weighted_fusion(&sequence, recent, history, &models.climatology, horizon)
                }
            };
            (sequence, ensemble)
        });

        logging::debug(
            Component::Ensemble,
            Some(&location.id),
            &format!(
                "{}-day ensemble via {:?} ({:?} sequence path), confidence {:.2}",
                horizon, ensemble.method, sequence.path, ensemble.confidence_score
            ),
        );
        (ensemble, sequence.path)
    }

    /// Weighted mean of the sequence, climatology and persistence members.
    ///
    /// Weights are renormalised over the members that produced a value.
    /// Confidence is `1 / (1 + mean coefficient of variation)` across
    /// members, and the band widens to cover every member.
    fn weighted_fusion(
        &self,
        sequence: &ForecastResult,
        recent: &[f64],
        history: &[TimeSeriesSample],
        session_climatology: &ClimatologyForecaster,
        horizon: usize,
    ) -> EnsembleForecast {
        let cfg = &self.config().ensemble;
        let band = self.config().sequence.interval_fraction;

        let mut members: Vec<(&str, f64, Vec<f64>)> = Vec::new();
        if sequence.values.len() == horizon && horizon > 0 {
            members.push(("sequence", cfg.sequence_weight, sequence.values.clone()));
        }
        if let Some(values) = self.climatology_member(history, session_climatology, horizon) {
            members.push(("climatology", cfg.climatology_weight, values));
        }
        if let Some(&last) = recent.iter().rev().find(|v| v.is_finite()) {
            if horizon > 0 {
                members.push(("persistence", cfg.persistence_weight, vec![last.max(0.0); horizon]));
            }
        }
        members.retain(|(_, w, _)| w.is_finite() && *w > 0.0);

        let total_weight: f64 = members.iter().map(|(_, w, _)| w).sum();
        if members.is_empty() || !(total_weight > 0.0) {
            return EnsembleForecast {
                values: Vec::new(),
                low: Vec::new(),
                high: Vec::new(),
                confidence_score: cfg.confidence_base.clamp(0.0, 1.0),
                drivers: BTreeMap::new(),
                method: FusionMethod::WeightedFusion,
            };
        }

        let mut values = Vec::with_capacity(horizon);
        let mut low = Vec::with_capacity(horizon);
        let mut high = Vec::with_capacity(horizon);
        let mut dispersion = Vec::with_capacity(horizon);
        for day in 0..horizon {
            let outputs: Vec<f64> = members.iter().map(|(_, _, v)| v[day]).collect();
            let point = members
                .iter()
                .map(|(_, w, v)| w / total_weight * v[day])
                .sum::<f64>();
            let member_min = outputs.iter().cloned().fold(f64::INFINITY, f64::min);
            let member_max = outputs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            values.push(point);
            low.push((point * (1.0 - band)).min(member_min));
            high.push((point * (1.0 + band)).max(member_max));

            let m = mean(&outputs);
            dispersion.push(if m > 0.0 { population_std(&outputs) / m } else { 0.0 });
        }

        let drivers = members
            .iter()
            .map(|(name, w, _)| (name.to_string(), w / total_weight))
            .collect();

        EnsembleForecast {
            values,
            low,
            high,
            confidence_score: (1.0 / (1.0 + mean(&dispersion))).clamp(0.0, 1.0),
            drivers,
            method: FusionMethod::WeightedFusion,
        }
    }

    /// Monthly climatological means for the days following the last
    /// history sample. Prefers a table built from `history` itself.
    fn climatology_member(
        &self,
        history: &[TimeSeriesSample],
        session_climatology: &ClimatologyForecaster,
        horizon: usize,
    ) -> Option<Vec<f64>> {
        let last = history.last()?.timestamp;
        let mut local = ClimatologyForecaster::new(self.config().climatology.clone());
        let table = if local.fit(history).is_ok() {
            &local
        } else if session_climatology.is_fitted() {
            session_climatology
        } else {
            return None;
        };

        (1..=horizon as i64)
            .map(|d| {
                let month = (last + Duration::days(d)).month();
                table.monthly(month).map(|s| s.mean)
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Per-location operations
    // -----------------------------------------------------------------------

    fn fetch_history(&self, location_id: &str) -> Result<Vec<TimeSeriesSample>, HydroError> {
        let days = self.config().sequence.history_days;
        self.session
            .provider()
            .historical_series(location_id, days)
            .inspect_err(|e| logging::log_provider_failure(location_id, "historical_series", e))
    }

    pub fn forecast_short_term(&self, location_id: &str, horizon: usize) -> Result<ShortTermForecast, HydroError> {
        self.forecast_short_term_at(location_id, horizon, Utc::now())
    }

    /// Short-term forecast issued at `now`.
    pub fn forecast_short_term_at(
        &self,
        location_id: &str,
        horizon: usize,
        now: DateTime<Utc>,
    ) -> Result<ShortTermForecast, HydroError> {
        self.session.ensure_fitted(location_id);
        let location = resolve_location(location_id);
        let history = self.fetch_history(location_id)?;

        let all = discharges(&history);
        let recent = &all[all.len().saturating_sub(self.config().sequence.recent_samples)..];

        let (ensemble, path) = self.run_ensemble(recent, &history, &location, horizon);
        let (alert_level, inundation_risk) =
            alert::derive_alert_level(&ensemble.values, recent, &self.config().ensemble);

        let first = ensemble.values.first().copied().unwrap_or(0.0);
        let confidence_score = match self.config().ensemble.fusion {
            FusionPolicy::PassThrough => self.config().ensemble.short_term_confidence,
            FusionPolicy::Weighted => ensemble.confidence_score,
        };

        Ok(ShortTermForecast {
            location_id: location.id.clone(),
            location_name: location.name.clone(),
            issued_at: now,
            horizon_days: horizon,
            predicted_discharge_m3_s: first,
            predicted_water_level_m: water_level_for(first),
            inundation_risk,
            alert_level,
            confidence_score,
            confidence_interval_low: ensemble.low.first().copied().unwrap_or(0.0),
            confidence_interval_high: ensemble.high.first().copied().unwrap_or(0.0),
            forecast: ForecastResult {
                horizon_days: ensemble.values.len(),
                values: ensemble.values,
                low: ensemble.low,
                high: ensemble.high,
                drivers: ensemble.drivers,
                path,
            },
        })
    }

    pub fn generate_alerts(&self, forecast: &ShortTermForecast) -> Vec<Alert> {
        self.generate_alerts_at(forecast, Utc::now())
    }

    pub fn generate_alerts_at(&self, forecast: &ShortTermForecast, now: DateTime<Utc>) -> Vec<Alert> {
        let alerts = alert::generate_alerts(forecast, &self.config().ensemble, now);
        for a in &alerts {
            logging::warn(
                Component::Ensemble,
                Some(&a.location_id),
                &format!("{} alert raised at level {:?}", a.kind.as_str(), a.level),
            );
        }
        alerts
    }

    pub fn forecast_seasonal(&self, location_id: &str, months: usize) -> SeasonalOutlook {
        self.forecast_seasonal_at(location_id, months, Utc::now())
    }

    /// Seasonal outlook starting at the calendar month of `now`.
    pub fn forecast_seasonal_at(&self, location_id: &str, months: usize, now: DateTime<Utc>) -> SeasonalOutlook {
        let models = self.session.ensure_fitted(location_id);
        let month = now.month();
        let phase = phase_for_month(month);
        logging::debug(
            Component::Climatology,
            Some(location_id),
            &format!("{}-month outlook from month {} under {}", months, month, phase.as_str()),
        );
        self.session
            .with_noise(|rng| models.climatology.forecast(month, months, phase, rng))
    }

    pub fn predict_flood(&self, location_id: &str) -> Result<FloodPrediction, HydroError> {
        self.predict_flood_at(location_id, Utc::now())
    }

    /// Inundation map from the provider's current snapshot.
    pub fn predict_flood_at(&self, location_id: &str, now: DateTime<Utc>) -> Result<FloodPrediction, HydroError> {
        let snapshot = self
            .session
            .provider()
            .current_snapshot(location_id)
            .inspect_err(|e| logging::log_provider_failure(location_id, "current_snapshot", e))?;

        let max_age = self.config().ensemble.max_snapshot_age_minutes;
        if is_snapshot_stale_at(&snapshot, max_age, now) {
            logging::warn(
                Component::Flood,
                Some(location_id),
                &format!(
                    "snapshot from {} is older than {} min; flood map may be outdated",
                    snapshot.timestamp.to_rfc3339(),
                    max_age
                ),
            );
        }

        let location = resolve_location(location_id);
        let map = self
            .session
            .with_noise(|rng| self.flood.predict(snapshot.discharge_m3_s, &location, rng));

        Ok(FloodPrediction {
            prediction_id: format!("flood_pred_{}_{}", location.id, now.timestamp()),
            issued_at: now,
            bbox: BoundingBox {
                north: location.latitude + FLOOD_BBOX_HALF_WIDTH_DEG,
                south: location.latitude - FLOOD_BBOX_HALF_WIDTH_DEG,
                east: location.longitude + FLOOD_BBOX_HALF_WIDTH_DEG,
                west: location.longitude - FLOOD_BBOX_HALF_WIDTH_DEG,
            },
            map,
        })
    }

    /// Reservoir plan for the given inflow forecast, from the configured
    /// current levels and inflows.
    pub fn optimize_dams(&self, forecast_inflows: &[f64], weights: Option<ObjectiveWeights>) -> OptimizationPlan {
        self.optimizer.optimize(
            &self.optimizer.configured_inflows(),
            &self.optimizer.configured_levels(),
            forecast_inflows,
            weights,
        )
    }

    pub fn trace_anomaly(&self, anomaly: f64, source: &str, horizon: usize) -> Result<PropagationSeries, HydroError> {
        self.basin.propagate(anomaly, source, horizon)
    }

    // -----------------------------------------------------------------------
    // Bundle
    // -----------------------------------------------------------------------

    pub fn ensemble_bundle(&self, location_id: &str, horizon: usize) -> Result<ForecastBundle, HydroError> {
        self.ensemble_bundle_at(location_id, horizon, Utc::now())
    }

    /// Every output for one location, stamped at `now`.
    ///
    /// Provider failures abort the bundle; model failures never do.
    pub fn ensemble_bundle_at(
        &self,
        location_id: &str,
        horizon: usize,
        now: DateTime<Utc>,
    ) -> Result<ForecastBundle, HydroError> {
        let short_term = self.forecast_short_term_at(location_id, horizon, now)?;
        let seasonal = self.forecast_seasonal_at(location_id, self.config().ensemble.seasonal_months, now);
        let flood = self.predict_flood_at(location_id, now)?;
        let dam_plan = self.optimize_dams(&short_term.forecast.values, None);
        let alerts = self.generate_alerts_at(&short_term, now);

        logging::log_bundle_summary(
            location_id,
            horizon,
            alerts.len(),
            short_term.forecast.path == ForecastPath::Fitted,
        );

        Ok(ForecastBundle {
            location_id: short_term.location_id.clone(),
            short_term,
            seasonal,
            flood,
            dam_plan,
            alerts,
            generated_at: now,
        })
    }
}
