//! Alert level thresholds and alert record generation.
//!
//! The level compares the mean of the first three forecast days with the
//! mean of the recent history. Only the two extreme outcomes produce alert
//! records: ALERT_MAX raises a flood alert, and ALERT with a low first-day
//! discharge raises a drought alert.

use crate::config::EnsembleConfig;
use crate::model::{Alert, AlertKind, AlertLevel, ShortTermForecast};
use chrono::{DateTime, Duration, Utc};

/// Forecast days averaged when computing the level ratio.
pub const LEAD_WINDOW_DAYS: usize = 3;

const RISK_DROUGHT: f64 = 0.10;
const RISK_ALERT_MAX: f64 = 0.85;
const RISK_VIGILANCE: f64 = 0.45;
const RISK_NORMAL: f64 = 0.15;

/// Alert level and inundation risk for a forecast against recent history.
///
/// Returns NORMAL with the baseline risk when either input is empty or the
/// recent mean is not positive.
pub fn derive_alert_level(
    forecast: &[f64],
    recent: &[f64],
    config: &EnsembleConfig,
) -> (AlertLevel, f64) {
    let lead = &forecast[..forecast.len().min(LEAD_WINDOW_DAYS)];
    if lead.is_empty() || recent.is_empty() {
        return (AlertLevel::Normal, RISK_NORMAL);
    }
    let lead_mean = lead.iter().sum::<f64>() / lead.len() as f64;
    let base = recent.iter().sum::<f64>() / recent.len() as f64;
    if !(base > 0.0) || !lead_mean.is_finite() {
        return (AlertLevel::Normal, RISK_NORMAL);
    }

    let ratio = lead_mean / base;
    if ratio < config.drought_ratio {
        (AlertLevel::Alert, RISK_DROUGHT)
    } else if ratio > config.alert_max_ratio {
        (AlertLevel::AlertMax, RISK_ALERT_MAX)
    } else if ratio > config.vigilance_ratio {
        (AlertLevel::Vigilance, RISK_VIGILANCE)
    } else {
        (AlertLevel::Normal, RISK_NORMAL)
    }
}

/// Flood and drought alerts implied by a short-term forecast, triggered at
/// `now`.
pub fn generate_alerts(
    forecast: &ShortTermForecast,
    config: &EnsembleConfig,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let q = forecast.predicted_discharge_m3_s;

    if forecast.alert_level == AlertLevel::AlertMax {
        alerts.push(build_alert(
            forecast,
            AlertKind::Flood,
            AlertLevel::AlertMax,
            format!("SEVERE FLOOD WARNING: High-magnitude discharge predicted ({:.0} m³/s)", q),
            format!("ALERTE CRUE SÉVÈRE : débit élevé prévu ({:.0} m³/s)", q),
            now,
        ));
    }

    if forecast.alert_level == AlertLevel::Alert && q < config.drought_discharge_m3_s {
        alerts.push(build_alert(
            forecast,
            AlertKind::Drought,
            AlertLevel::Alert,
            format!("DROUGHT WARNING: Low flow ({:.0} m³/s)", q),
            format!("ALERTE SÉCHERESSE : débit faible ({:.0} m³/s)", q),
            now,
        ));
    }

    alerts
}

fn build_alert(
    forecast: &ShortTermForecast,
    kind: AlertKind,
    level: AlertLevel,
    message_en: String,
    message_fr: String,
    now: DateTime<Utc>,
) -> Alert {
    let lead_time_days = forecast.horizon_days;
    Alert {
        alert_id: format!("{}_{}_{}", kind.as_str(), forecast.location_id, now.timestamp()),
        kind,
        level,
        location_id: forecast.location_id.clone(),
        location_name: forecast.location_name.clone(),
        trigger_date: now,
        event_expected_date: now + Duration::days(lead_time_days as i64),
        lead_time_days,
        message_en,
        message_fr,
        confidence: forecast.confidence_score,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
