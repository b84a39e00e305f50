//! Data-acquisition boundary.
//!
//! The engine never fetches data itself. Everything it knows about a
//! location arrives through `HydroDataProvider`: an ordered historical
//! series for fitting and a point snapshot for the flood estimate.
//!
//! `SyntheticProvider` is the reference implementation used by tests and
//! demos. It produces seasonal series around each location's baseline
//! discharge from a seeded noise source, anchored either to a fixed clock
//! or to `Utc::now()`.

use crate::config::ProviderConfig;
use crate::model::{CurrentSnapshot, HydroError, TimeSeriesSample, WaterStatus};
use crate::rng::{self, NoiseSource};
use crate::stations::resolve_location;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use std::f64::consts::PI;
use std::sync::Mutex;

/// Synthetic discharge never drops below this floor.
pub const MIN_SYNTHETIC_DISCHARGE: f64 = 100.0;

/// Source of observations for the engine.
///
/// Implementations must be shareable across threads; a session holds one
/// behind an `Arc` and may be queried from several requests at once.
pub trait HydroDataProvider: Send + Sync {
    /// Samples covering the last `days_back` days, oldest first, at the
    /// provider's native interval.
    fn historical_series(
        &self,
        location_id: &str,
        days_back: u32,
    ) -> Result<Vec<TimeSeriesSample>, HydroError>;

    fn current_snapshot(&self, location_id: &str) -> Result<CurrentSnapshot, HydroError>;
}

// ---------------------------------------------------------------------------
// Seasonal shape
// ---------------------------------------------------------------------------

fn month_phase(month: u32) -> f64 {
    2.0 * PI * month as f64 / 12.0
}

/// Annual multiplier on baseline discharge, between 0.1 and 1.5.
pub fn seasonal_factor(month: u32) -> f64 {
    0.8 + 0.7 * month_phase(month).sin()
}

/// Stage in metres for a discharge in m³/s.
pub fn water_level_for(discharge: f64) -> f64 {
    35.0 + discharge / 150.0
}

// ---------------------------------------------------------------------------
// Synthetic provider
// ---------------------------------------------------------------------------

pub struct SyntheticProvider {
    config: ProviderConfig,
    noise: Mutex<NoiseSource>,
    anchor: Option<DateTime<Utc>>,
}

impl SyntheticProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let noise = Mutex::new(NoiseSource::from_seed_u64(config.seed));
        Self {
            config,
            noise,
            anchor: None,
        }
    }

    /// Pins the provider's clock so series and snapshots end at `now`.
    pub fn anchored_at(mut self, now: DateTime<Utc>) -> Self {
        self.anchor = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.anchor.unwrap_or_else(Utc::now)
    }

    fn interval_hours(&self) -> u32 {
        self.config.sample_interval_hours.max(1)
    }

    fn with_noise<T>(&self, f: impl FnOnce(&mut NoiseSource) -> T) -> Result<T, HydroError> {
        let mut guard = self
            .noise
            .lock()
            .map_err(|_| HydroError::ProviderUnavailable("noise source lock poisoned".into()))?;
        Ok(f(&mut guard))
    }
}

impl HydroDataProvider for SyntheticProvider {
    fn historical_series(
        &self,
        location_id: &str,
        days_back: u32,
    ) -> Result<Vec<TimeSeriesSample>, HydroError> {
        let location = resolve_location(location_id);
        let interval = self.interval_hours();
        let count = (days_back as usize * 24) / interval as usize;
        let end = self.now();

        self.with_noise(|noise| {
            let rng = &mut noise.0;
            (0..count)
                .map(|i| {
                    let steps_back = (count - 1 - i) as i64;
                    let timestamp = end - Duration::hours(steps_back * interval as i64);
                    let phase = month_phase(timestamp.month());
                    let hour_phase = 2.0 * PI * timestamp.hour() as f64 / 24.0;

                    let seasonal = location.baseline_discharge * seasonal_factor(timestamp.month());
                    let discharge =
                        (seasonal * (1.0 + rng::gaussian(rng, 0.15))).max(MIN_SYNTHETIC_DISCHARGE);
                    let rainfall = (5.0 + 25.0 * phase.sin() + rng::gaussian(rng, 10.0)).max(0.0);
                    let temperature =
                        25.0 + 8.0 * phase.cos() + 5.0 * hour_phase.sin() + rng::gaussian(rng, 1.0);
                    let ndvi = -0.2 + 0.7 * phase.sin() + rng::gaussian(rng, 0.05);

                    TimeSeriesSample {
                        timestamp,
                        discharge_m3_s: discharge,
                        rainfall_mm: rainfall,
                        temperature_c: temperature,
                        ndvi,
                    }
                })
                .collect()
        })
    }

    fn current_snapshot(&self, location_id: &str) -> Result<CurrentSnapshot, HydroError> {
        let location = resolve_location(location_id);
        let now = self.now();
        let phase = month_phase(now.month());
        let wetness = phase.sin().abs();

        let (discharge, rainfall, soil_moisture, confidence) = self.with_noise(|noise| {
            let rng = &mut noise.0;
            let discharge = location.baseline_discharge
                * seasonal_factor(now.month())
                * rng::uniform(rng, 0.9, 1.1);
            let rainfall = (5.0 + 25.0 * wetness) * rng::uniform(rng, 0.8, 1.2);
            let soil = ((30.0 + 50.0 * wetness) * rng::uniform(rng, 0.8, 1.2)).clamp(0.0, 100.0);
            let confidence = rng::uniform(rng, 0.93, 0.99);
            (discharge.max(0.0), rainfall, soil, confidence)
        })?;

        let water_status = WaterStatus::classify(discharge, location.baseline_discharge);
        Ok(CurrentSnapshot {
            location_id: location.id,
            timestamp: now,
            discharge_m3_s: discharge,
            water_level_m: water_level_for(discharge),
            rainfall_24h_mm: rainfall,
            temperature_c: 25.0
                + 8.0 * phase.cos()
                + 5.0 * (2.0 * PI * now.hour() as f64 / 24.0).sin(),
            ndvi: -0.2 + 0.7 * wetness,
            soil_moisture,
            confidence,
            water_status,
            alert_level: water_status.alert_level(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 15, 12, 0, 0).unwrap()
    }

    fn provider() -> SyntheticProvider {
        SyntheticProvider::new(ProviderConfig::default()).anchored_at(fixed_now())
    }

    #[test]
    fn test_series_is_ordered_and_ends_at_anchor() {
        let series = provider().historical_series("station_001", 90).unwrap();
        assert_eq!(series.len(), 90);
        assert!(series.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(series.last().unwrap().timestamp, fixed_now());
        assert_eq!(series[0].timestamp, fixed_now() - Duration::days(89));
    }

    #[test]
    fn test_hourly_interval_gives_24_samples_per_day() {
        let config = ProviderConfig {
            sample_interval_hours: 1,
            ..ProviderConfig::default()
        };
        let p = SyntheticProvider::new(config).anchored_at(fixed_now());
        assert_eq!(p.historical_series("station_002", 3).unwrap().len(), 72);
    }

    #[test]
    fn test_discharge_respects_floor_and_rainfall_is_non_negative() {
        let series = provider().historical_series("dam_felou", 365).unwrap();
        assert!(series.iter().all(|s| s.discharge_m3_s >= MIN_SYNTHETIC_DISCHARGE));
        assert!(series.iter().all(|s| s.rainfall_mm >= 0.0));
    }

    #[test]
    fn test_zero_days_gives_empty_series() {
        assert!(provider().historical_series("station_001", 0).unwrap().is_empty());
    }

    #[test]
    fn test_same_seed_same_series() {
        let a = provider().historical_series("station_001", 30).unwrap();
        let b = provider().historical_series("station_001", 30).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_snapshot_fields_are_in_range() {
        let snap = provider().current_snapshot("station_001").unwrap();
        assert_eq!(snap.location_id, "station_001");
        assert_eq!(snap.timestamp, fixed_now());
        assert!((0.93..=0.99).contains(&snap.confidence));
        assert!((0.0..=100.0).contains(&snap.soil_moisture));
        assert!((snap.water_level_m - water_level_for(snap.discharge_m3_s)).abs() < 1e-9);
        assert_eq!(snap.alert_level, snap.water_status.alert_level());
    }

    #[test]
    fn test_unknown_location_uses_default_baseline() {
        let snap = provider().current_snapshot("station_404").unwrap();
        // August factor is 0.8 + 0.7·sin(4π/3) ≈ 0.194, jittered by ±10%.
        let expected = 1000.0 * seasonal_factor(8);
        assert!((snap.discharge_m3_s - expected).abs() <= expected * 0.1 + 1e-9);
    }

    #[test]
    fn test_provider_is_object_safe_and_shareable() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn HydroDataProvider>();
        let boxed: Box<dyn HydroDataProvider> = Box::new(provider());
        assert!(boxed.current_snapshot("dam_diama").is_ok());
    }
}
