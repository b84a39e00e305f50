//! Property checks across the public model APIs.
//!
//! Each test sweeps a range of inputs and asserts an invariant that must
//! hold for all of them, rather than checking a single worked example.

use hydrocast::basin::BasinPropagationGraph;
use hydrocast::config::{BasinConfig, ClimatologyConfig, FloodConfig, OptimizerConfig, SequenceConfig};
use hydrocast::flood::SpatialFloodEstimator;
use hydrocast::forecast::{ClimatologyForecaster, SequenceForecaster};
use hydrocast::model::{ObjectiveWeights, TeleconnectionPhase, TimeSeriesSample};
use hydrocast::optimize::DamReleaseOptimizer;
use hydrocast::rng::NoiseSource;
use hydrocast::stations::{LOCATION_REGISTRY, resolve_location};
use chrono::{Duration, TimeZone, Utc};
use std::collections::BTreeMap;

fn seasonal_history(days: i64) -> Vec<TimeSeriesSample> {
    let start = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
    (0..days)
        .map(|d| TimeSeriesSample {
            timestamp: start + Duration::days(d),
            discharge_m3_s: 900.0 + 600.0 * (d as f64 * 2.0 * std::f64::consts::PI / 365.0).sin(),
            rainfall_mm: 0.0,
            temperature_c: 28.0,
            ndvi: 0.3,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Climatology
// ---------------------------------------------------------------------------

#[test]
fn test_outlook_probabilities_sum_to_one_everywhere() {
    let mut fitted = ClimatologyForecaster::new(ClimatologyConfig::default());
    fitted.fit(&seasonal_history(730)).unwrap();
    let empty = ClimatologyForecaster::new(ClimatologyConfig::default());
    let mut rng = NoiseSource::default();

    for forecaster in [&fitted, &empty] {
        for month in 1..=12 {
            for horizon in [0, 1, 3, 6, 12, 18] {
                for phase in TeleconnectionPhase::ALL {
                    let o = forecaster.forecast(month, horizon, phase, &mut rng.0);
                    assert!((o.probabilities.total() - 1.0).abs() < 1e-9);
                    assert_eq!(o.monthly_discharge_m3_s.len(), horizon);
                    assert!(o.monthly_discharge_m3_s.iter().all(|&q| q >= 0.0));
                    assert!((0.0..=1.0).contains(&o.skill_score));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Sequence forecaster
// ---------------------------------------------------------------------------

#[test]
fn test_driver_weights_sum_to_one_on_both_paths() {
    let history: Vec<f64> = seasonal_history(200).iter().map(|s| s.discharge_m3_s).collect();
    let mut fitted = SequenceForecaster::new(SequenceConfig::default());
    fitted.fit(&history).unwrap();
    let unfitted = SequenceForecaster::new(SequenceConfig::default());
    let mut rng = NoiseSource::default();

    for f in [&fitted, &unfitted] {
        for recent_len in [1, 5, 29, 30, 60] {
            let recent = &history[history.len() - recent_len..];
            let r = f.forecast(recent, 7, &mut rng.0);
            assert!((r.drivers.values().sum::<f64>() - 1.0).abs() < 1e-2);
            assert_eq!(r.values.len(), 7);
            assert!(r.values.iter().all(|&v| v >= 0.0));
            for i in 0..7 {
                assert!(r.low[i] <= r.values[i] && r.values[i] <= r.high[i]);
            }
        }
    }
}

#[test]
fn test_fallback_example_is_exact_for_any_seed() {
    let f = SequenceForecaster::new(SequenceConfig::default());
    for seed in 0..20 {
        let mut rng = NoiseSource::from_seed_u64(seed);
        let r = f.forecast(&[100.0; 5], 3, &mut rng.0);
        assert_eq!(r.values, vec![100.0; 3]);
        assert_eq!(r.low, vec![85.0; 3]);
        assert_eq!(r.high, vec![115.0; 3]);
    }
}

// ---------------------------------------------------------------------------
// Flood estimator
// ---------------------------------------------------------------------------

#[test]
fn test_flood_area_monotonic_for_every_registered_location() {
    let estimator = SpatialFloodEstimator::new(FloodConfig::default());
    for entry in LOCATION_REGISTRY {
        let location = resolve_location(entry.id);
        let mut previous = 0.0;
        for step in 0..12 {
            let discharge = 500.0 * step as f64;
            let mut rng = NoiseSource::from_seed_u64(11);
            let map = estimator.predict(discharge, &location, &mut rng.0);
            assert!(map.grid.iter().flatten().all(|&p| (0.0..=1.0).contains(&p)));
            assert!(map.affected_area_km2 >= previous, "{} at {}", entry.id, discharge);
            previous = map.affected_area_km2;
        }
    }
}

// ---------------------------------------------------------------------------
// Basin graph
// ---------------------------------------------------------------------------

#[test]
fn test_one_day_horizon_never_leaves_the_source() {
    let graph = BasinPropagationGraph::new(&BasinConfig::default()).unwrap();
    let ids: Vec<String> = graph.node_ids().map(String::from).collect();
    for source in &ids {
        let result = graph.propagate(100.0, source, 1).unwrap();
        for id in &ids {
            let expected = if id == source { 100.0 } else { 0.0 };
            assert_eq!(result.node(id).unwrap(), &[expected]);
        }
    }
}

#[test]
fn test_propagation_is_linear_in_anomaly() {
    let graph = BasinPropagationGraph::new(&BasinConfig::default()).unwrap();
    let unit = graph.propagate(1.0, "fouta_djallon", 20).unwrap();
    let scaled = graph.propagate(250.0, "fouta_djallon", 20).unwrap();
    for (id, values) in &unit.series {
        for (a, b) in values.iter().zip(scaled.node(id).unwrap()) {
            assert!((a * 250.0 - b).abs() < 1e-9);
        }
    }
}

// ---------------------------------------------------------------------------
// Reservoir optimizer
// ---------------------------------------------------------------------------

#[test]
fn test_weights_normalised_and_composite_bounded() {
    let optimizer = DamReleaseOptimizer::new(OptimizerConfig::default());
    let inflows = optimizer.configured_inflows();
    let levels = optimizer.configured_levels();

    for e in [0.0, 0.1, 1.0, 5.0] {
        for i in [0.0, 0.35, 2.0] {
            for env in [0.0, 0.2, 3.0] {
                for s in [0.0, 0.15, 10.0] {
                    let weights = ObjectiveWeights { energy: e, irrigation: i, environment: env, safety: s };
                    for q in [0.0, 800.0, 1200.0, 1201.0, 2600.0] {
                        let plan = optimizer.optimize(&inflows, &levels, &[q; 10], Some(weights));
                        assert!((plan.weights.total() - 1.0).abs() < 1e-9);
                        let c = plan.contributions;
                        let sum = c.energy + c.irrigation + c.environment + c.safety;
                        assert!((sum - plan.composite_score).abs() < 1e-9);
                        assert!((0.0..=100.0).contains(&plan.composite_score));
                    }
                }
            }
        }
    }
}

#[test]
fn test_primary_level_steps_at_1200() {
    let optimizer = DamReleaseOptimizer::new(OptimizerConfig::default());
    let none = BTreeMap::new();
    let at = optimizer.optimize(&none, &none, &[1200.0; 10], None);
    let above = optimizer.optimize(&none, &none, &[1200.5; 10], None);
    assert_eq!(at.primary().unwrap().target_level_percent, 55.0);
    assert_eq!(above.primary().unwrap().target_level_percent, 65.0);
    assert!((at.secondary().unwrap().target_discharge_m3_s - 960.0).abs() < 1e-9);
}
