//! Seasonal discharge outlook from monthly climatology.
//!
//! The fitted state is a table of per-calendar-month mean and standard
//! deviation. A forecast walks the next `n` months, scales each monthly mean
//! by the teleconnection multiplier, jitters it, and classifies the season
//! against the long-run mean of all known months.

use crate::config::ClimatologyConfig;
use crate::model::{
    FlowProbabilities, HydroError, SeasonClass, SeasonalOutlook, TeleconnectionPhase,
    TimeSeriesSample,
};
use crate::rng;
use chrono::Datelike;
use rand::Rng;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyStats {
    pub mean: f64,
    /// Sample standard deviation; 0 for a month with a single sample.
    pub std: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClimatologyForecaster {
    config: ClimatologyConfig,
    table: BTreeMap<u32, MonthlyStats>,
}

impl ClimatologyForecaster {
    pub fn new(config: ClimatologyConfig) -> Self {
        Self {
            config,
            table: BTreeMap::new(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.table.is_empty()
    }

    pub fn monthly(&self, month: u32) -> Option<&MonthlyStats> {
        self.table.get(&month)
    }

    /// Mean of the known monthly means, if any month is known.
    pub fn overall_mean(&self) -> Option<f64> {
        if self.table.is_empty() {
            return None;
        }
        Some(self.table.values().map(|s| s.mean).sum::<f64>() / self.table.len() as f64)
    }

    /// Rebuilds the climatology table from a time-stamped history.
    ///
    /// Non-finite discharges are skipped. An empty usable history is an
    /// error and leaves the table empty.
    pub fn fit(&mut self, history: &[TimeSeriesSample]) -> Result<(), HydroError> {
        self.table.clear();

        let mut by_month: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for sample in history.iter().filter(|s| s.discharge_m3_s.is_finite()) {
            by_month
                .entry(sample.timestamp.month())
                .or_default()
                .push(sample.discharge_m3_s);
        }
        if by_month.is_empty() {
            return Err(HydroError::InsufficientData {
                needed: 1,
                found: 0,
            });
        }

        self.table = by_month
            .into_iter()
            .map(|(month, values)| (month, month_stats(&values)))
            .collect();
        Ok(())
    }

    /// Seasonal outlook for the `horizon_months` months starting at
    /// `current_month` (1..=12; other values wrap).
    pub fn forecast<R: Rng + ?Sized>(
        &self,
        current_month: u32,
        horizon_months: usize,
        phase: TeleconnectionPhase,
        rng: &mut R,
    ) -> SeasonalOutlook {
        let multiplier = self.config.multiplier(phase);
        let start = current_month.saturating_sub(1) % 12;

        let monthly: Vec<f64> = (0..horizon_months)
            .map(|offset| {
                let month = (start + offset as u32 % 12) % 12 + 1;
                let (mean, std) = match self.table.get(&month) {
                    Some(stats) => (stats.mean, stats.std),
                    None => (self.config.default_mean, 0.0),
                };
                let noise = rng::gaussian(rng, std * self.config.noise_fraction);
                (mean * multiplier + noise).max(0.0)
            })
            .collect();

        let total_rainfall = monthly.iter().sum::<f64>() * self.config.rainfall_factor;
        let avg_discharge = if monthly.is_empty() {
            0.0
        } else {
            monthly.iter().sum::<f64>() / monthly.len() as f64
        };

        let season = if monthly.is_empty() {
            SeasonClass::Normal
        } else {
            let baseline = self.overall_mean().unwrap_or(self.config.default_mean);
            self.classify(avg_discharge, baseline)
        };

        SeasonalOutlook {
            horizon_months,
            season,
            probabilities: season_probabilities(season),
            monthly_discharge_m3_s: monthly,
            predicted_total_rainfall_mm: total_rainfall,
            predicted_avg_discharge_m3_s: avg_discharge,
            skill_score: self.config.skill_score.clamp(0.0, 1.0),
            teleconnections: teleconnection_state(phase, season),
        }
    }

    fn classify(&self, avg_discharge: f64, baseline: f64) -> SeasonClass {
        if avg_discharge < baseline * self.config.drought_ratio {
            SeasonClass::Drought
        } else if avg_discharge > baseline * self.config.monsoon_ratio {
            SeasonClass::StrongMonsoon
        } else {
            SeasonClass::Normal
        }
    }
}

fn month_stats(values: &[f64]) -> MonthlyStats {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let std = if n > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        0.0
    };
    MonthlyStats {
        mean,
        std,
        count: n,
    }
}

/// Probabilities of (strong, normal, weak) flow for each season class.
pub fn season_probabilities(season: SeasonClass) -> FlowProbabilities {
    match season {
        SeasonClass::Drought => FlowProbabilities {
            strong: 0.05,
            normal: 0.15,
            weak: 0.80,
        },
        SeasonClass::StrongMonsoon => FlowProbabilities {
            strong: 0.80,
            normal: 0.15,
            weak: 0.05,
        },
        SeasonClass::Normal => FlowProbabilities {
            strong: 0.20,
            normal: 0.60,
            weak: 0.20,
        },
    }
}

fn teleconnection_state(phase: TeleconnectionPhase, season: SeasonClass) -> BTreeMap<String, String> {
    let sahel = match season {
        SeasonClass::Drought => "predicted_drought",
        SeasonClass::Normal => "predicted_normal",
        SeasonClass::StrongMonsoon => "predicted_strong_monsoon",
    };
    BTreeMap::from([
        ("enso".to_string(), phase.as_str().to_string()),
        ("indian_ocean".to_string(), "neutral".to_string()),
        ("sahel_monsoon".to_string(), sahel.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::NoiseSource;
    use chrono::{TimeZone, Utc};

    fn sample(year: i32, month: u32, day: u32, discharge: f64) -> TimeSeriesSample {
        TimeSeriesSample {
            timestamp: Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap(),
            discharge_m3_s: discharge,
            rainfall_mm: 0.0,
            temperature_c: 28.0,
            ndvi: 0.3,
        }
    }

    /// Twelve months with means 100, 200, ... 1200 and no spread.
    fn stepped_climatology() -> ClimatologyForecaster {
        let history: Vec<_> = (1..=12)
            .flat_map(|m| [sample(2023, m, 1, m as f64 * 100.0), sample(2023, m, 15, m as f64 * 100.0)])
            .collect();
        let mut f = ClimatologyForecaster::new(ClimatologyConfig::default());
        f.fit(&history).unwrap();
        f
    }

    #[test]
    fn test_fit_groups_by_calendar_month() {
        let history = vec![
            sample(2022, 8, 1, 1000.0),
            sample(2023, 8, 1, 3000.0),
            sample(2023, 2, 1, 200.0),
        ];
        let mut f = ClimatologyForecaster::new(ClimatologyConfig::default());
        f.fit(&history).unwrap();

        let aug = f.monthly(8).expect("August present");
        assert_eq!(aug.mean, 2000.0);
        assert!((aug.std - 1414.2135623730951).abs() < 1e-9);
        assert_eq!(f.monthly(2).unwrap().std, 0.0);
        assert!(f.monthly(5).is_none());
    }

    #[test]
    fn test_fit_on_empty_history_fails_and_stays_empty() {
        let mut f = ClimatologyForecaster::new(ClimatologyConfig::default());
        assert!(f.fit(&[]).is_err());
        assert!(!f.is_fitted());
    }

    #[test]
    fn test_months_wrap_around_the_year() {
        let f = stepped_climatology();
        let mut rng = NoiseSource::default();
        let outlook = f.forecast(11, 4, TeleconnectionPhase::Neutral, &mut rng.0);
        assert_eq!(outlook.monthly_discharge_m3_s, vec![1100.0, 1200.0, 100.0, 200.0]);
    }

    #[test]
    fn test_teleconnection_multiplier_applies() {
        let f = stepped_climatology();
        let mut rng = NoiseSource::default();
        let wet = f.forecast(6, 1, TeleconnectionPhase::StrongLaNina, &mut rng.0);
        let dry = f.forecast(6, 1, TeleconnectionPhase::StrongElNino, &mut rng.0);
        assert!((wet.monthly_discharge_m3_s[0] - 690.0).abs() < 1e-9);
        assert!((dry.monthly_discharge_m3_s[0] - 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_season_classification_against_overall_mean() {
        // Overall mean is 650.
        let f = stepped_climatology();
        let mut rng = NoiseSource::default();

        let drought = f.forecast(1, 3, TeleconnectionPhase::Neutral, &mut rng.0);
        assert_eq!(drought.season, SeasonClass::Drought);
        assert_eq!(drought.probabilities.weak, 0.80);

        let normal = f.forecast(6, 2, TeleconnectionPhase::Neutral, &mut rng.0);
        assert_eq!(normal.season, SeasonClass::Normal);

        let monsoon = f.forecast(12, 1, TeleconnectionPhase::StrongLaNina, &mut rng.0);
        assert_eq!(monsoon.season, SeasonClass::StrongMonsoon);
        assert_eq!(monsoon.teleconnections["sahel_monsoon"], "predicted_strong_monsoon");
    }

    #[test]
    fn test_unknown_months_use_default_mean() {
        let f = ClimatologyForecaster::new(ClimatologyConfig::default());
        let mut rng = NoiseSource::default();
        let outlook = f.forecast(3, 2, TeleconnectionPhase::Neutral, &mut rng.0);
        assert_eq!(outlook.monthly_discharge_m3_s, vec![1000.0, 1000.0]);
        // Empty table falls back to the same default baseline, so the season is normal.
        assert_eq!(outlook.season, SeasonClass::Normal);
        assert_eq!(outlook.predicted_avg_discharge_m3_s, 1000.0);
        assert!((outlook.predicted_total_rainfall_mm - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_probabilities_sum_to_one_for_every_class() {
        for season in [SeasonClass::Drought, SeasonClass::Normal, SeasonClass::StrongMonsoon] {
            assert!((season_probabilities(season).total() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_predictions_are_never_negative() {
        let history: Vec<_> = (0..20)
            .map(|d| sample(2023, 3, d + 1, if d % 2 == 0 { 0.0 } else { 5000.0 }))
            .collect();
        let mut f = ClimatologyForecaster::new(ClimatologyConfig::default());
        f.fit(&history).unwrap();
        let mut rng = NoiseSource::from_seed_u64(5);
        for _ in 0..200 {
            let outlook = f.forecast(3, 1, TeleconnectionPhase::StrongElNino, &mut rng.0);
            assert!(outlook.monthly_discharge_m3_s[0] >= 0.0);
        }
    }

    #[test]
    fn test_zero_horizon_gives_empty_outlook() {
        let f = stepped_climatology();
        let mut rng = NoiseSource::default();
        let outlook = f.forecast(5, 0, TeleconnectionPhase::Neutral, &mut rng.0);
        assert!(outlook.monthly_discharge_m3_s.is_empty());
        assert_eq!(outlook.predicted_avg_discharge_m3_s, 0.0);
        assert!((outlook.probabilities.total() - 1.0).abs() < 1e-9);
    }
}
