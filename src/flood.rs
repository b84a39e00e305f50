//! Spatial inundation estimate for a single location.
//!
//! Flood intensity ramps linearly from 0 at 80% of the location's flood
//! threshold to 1 at 120%. The probability grid is exponential noise shaped
//! by a radial proximity weight around the grid centre and scaled by that
//! intensity, so for a fixed noise draw every cell is non-decreasing in
//! discharge.

use crate::config::FloodConfig;
use crate::logging::{self, Component};
use crate::model::{CriticalZone, FloodMap, Location};
use crate::rng;
use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct SpatialFloodEstimator {
    config: FloodConfig,
}

impl SpatialFloodEstimator {
    pub fn new(config: FloodConfig) -> Self {
        Self { config }
    }

    /// Intensity in [0, 1] for a discharge at this location.
    pub fn intensity(&self, discharge: f64, location_id: &str) -> f64 {
        let threshold = self.config.threshold_for(location_id);
        if !(threshold > 0.0) || !discharge.is_finite() {
            return 0.0;
        }
        ((discharge - 0.8 * threshold) / (0.4 * threshold)).clamp(0.0, 1.0)
    }

    pub fn predict<R: Rng + ?Sized>(&self, discharge: f64, location: &Location, rng: &mut R) -> FloodMap {
        if !self.config.thresholds.contains_key(&location.id) {
            logging::debug(
                Component::Flood,
                Some(&location.id),
                &format!(
                    "no flood threshold configured, using default {}",
                    self.config.default_threshold
                ),
            );
        }
        let intensity = self.intensity(discharge, &location.id);

        let size = self.config.grid_size;
        let center = (size / 2) as f64;
        let grid: Vec<Vec<f64>> = (0..size)
            .map(|y| {
                (0..size)
                    .map(|x| {
                        let noise = rng::exponential(rng, self.config.noise_scale);
                        let dx = x as f64 - center;
                        let dy = y as f64 - center;
                        let distance = (dx * dx + dy * dy).sqrt();
                        let proximity = 1.0 / (1.0 + distance / self.config.proximity_scale);
                        (noise * proximity * intensity).clamp(0.0, 1.0)
                    })
                    .collect()
            })
            .collect();

        let flooded_cells = grid
            .iter()
            .flatten()
            .filter(|&&p| p > self.config.cell_threshold)
            .count();
        let cell_km2 = (self.config.resolution_m / 1000.0).powi(2);
        let affected_area_km2 = flooded_cells as f64 * cell_km2;
        let affected_population =
            (affected_area_km2 * self.config.density_for(&location.id)).max(0.0) as u64;

        let mut critical_zones = Vec::new();
        if affected_population > self.config.critical_population {
            critical_zones.push(CriticalZone {
                name: self.config.critical_zone_name.clone(),
                inundation_probability: intensity,
                affected_population,
            });
        }

        FloodMap {
            grid,
            resolution_m: self.config.resolution_m,
            intensity,
            affected_area_km2,
            affected_population,
            critical_zones,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::NoiseSource;
    use crate::stations::resolve_location;

    fn estimator() -> SpatialFloodEstimator {
        SpatialFloodEstimator::new(FloodConfig::default())
    }

    #[test]
    fn test_intensity_ramp() {
        let e = estimator();
        // station_001 threshold is 2500: ramp from 2000 to 3000.
        assert_eq!(e.intensity(1500.0, "station_001"), 0.0);
        assert_eq!(e.intensity(2000.0, "station_001"), 0.0);
        assert!((e.intensity(2500.0, "station_001") - 0.5).abs() < 1e-12);
        assert_eq!(e.intensity(4000.0, "station_001"), 1.0);
        // Unknown location uses the 2000 default: ramp from 1600 to 2400.
        assert!((e.intensity(2000.0, "nowhere") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_below_threshold_grid_is_all_zero() {
        let mut rng = NoiseSource::default();
        let map = estimator().predict(500.0, &resolve_location("station_002"), &mut rng.0);
        assert!(map.grid.iter().flatten().all(|&p| p == 0.0));
        assert_eq!(map.affected_area_km2, 0.0);
        assert_eq!(map.affected_population, 0);
        assert!(map.critical_zones.is_empty());
    }

    #[test]
    fn test_grid_is_square_and_bounded() {
        let mut rng = NoiseSource::default();
        let map = estimator().predict(5000.0, &resolve_location("station_001"), &mut rng.0);
        assert_eq!(map.grid.len(), 128);
        assert!(map.grid.iter().all(|row| row.len() == 128));
        assert!(map.grid.iter().flatten().all(|&p| (0.0..=1.0).contains(&p)));
        assert_eq!(map.resolution_m, 30.0);
    }

    #[test]
    fn test_affected_area_counts_cells_above_half() {
        let mut rng = NoiseSource::default();
        let map = estimator().predict(5000.0, &resolve_location("station_001"), &mut rng.0);
        let cells = map.grid.iter().flatten().filter(|&&p| p > 0.5).count();
        assert!(cells > 0);
        assert!((map.affected_area_km2 - cells as f64 * 0.0009).abs() < 1e-9);
        assert_eq!(map.affected_population, (map.affected_area_km2 * 80.0) as u64);
    }

    #[test]
    fn test_affected_area_is_monotonic_in_discharge() {
        let location = resolve_location("station_001");
        let mut previous = 0.0;
        for discharge in [1000.0, 2100.0, 2300.0, 2600.0, 2900.0, 3500.0, 8000.0] {
            let mut rng = NoiseSource::from_seed_u64(99);
            let map = estimator().predict(discharge, &location, &mut rng.0);
            assert!(
                map.affected_area_km2 >= previous,
                "area dropped at discharge {}",
                discharge
            );
            previous = map.affected_area_km2;
        }
    }

    #[test]
    fn test_critical_zone_emitted_above_population_limit() {
        let mut config = FloodConfig::default();
        config.densities.insert("station_001".into(), 1_000_000.0);
        let e = SpatialFloodEstimator::new(config);
        let mut rng = NoiseSource::default();
        let map = e.predict(5000.0, &resolve_location("station_001"), &mut rng.0);
        assert!(map.affected_population > 10_000);
        assert_eq!(map.critical_zones.len(), 1);
        assert_eq!(map.critical_zones[0].inundation_probability, 1.0);
        assert_eq!(map.critical_zones[0].affected_population, map.affected_population);
    }
}
