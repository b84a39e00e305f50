/// Structured logging for the forecasting engine
///
/// Provides context-rich logging with component and location identifiers,
/// timestamps, and severity levels. Supports both console output
/// and file-based logging for long-running services.

use crate::model::HydroError;
use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Sequence,
    Climatology,
    Flood,
    Basin,
    Optimizer,
    Ensemble,
    Provider,
    Config,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Sequence => write!(f, "SEQ"),
            Component::Climatology => write!(f, "CLIM"),
            Component::Flood => write!(f, "FLOOD"),
            Component::Basin => write!(f, "BASIN"),
            Component::Optimizer => write!(f, "OPT"),
            Component::Ensemble => write!(f, "ENS"),
            Component::Provider => write!(f, "PROV"),
            Component::Config => write!(f, "CFG"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - location not served by this provider
    Expected,
    /// Unexpected failure - provider degraded or misconfigured
    Unexpected,
    /// Unknown - data arrived but was unusable
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, component: Component, location_id: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let location_part = location_id.map(|s| format!(" [{}]", s)).unwrap_or_default();
        let log_entry = format!(
            "{} {} {}{}: {}",
            timestamp, level, component, location_part, message
        );

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, location_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, location_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, component: Component, location_id: Option<&str>, message: &str) {
    // A poisoned lock only means another thread panicked mid-log.
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, location_id, message);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, location_id: Option<&str>, message: &str) {
    emit(LogLevel::Info, component, location_id, message);
}

/// Log a warning message
pub fn warn(component: Component, location_id: Option<&str>, message: &str) {
    emit(LogLevel::Warning, component, location_id, message);
}

/// Log an error message
pub fn error(component: Component, location_id: Option<&str>, message: &str) {
    emit(LogLevel::Error, component, location_id, message);
}

/// Log a debug message
pub fn debug(component: Component, location_id: Option<&str>, message: &str) {
    emit(LogLevel::Debug, component, location_id, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a data-provider failure by its error variant
pub fn classify_provider_failure(err: &HydroError) -> FailureType {
    match err {
        HydroError::UnknownLocation(_) => FailureType::Expected,
        HydroError::ProviderUnavailable(_) | HydroError::Config(_) => FailureType::Unexpected,
        HydroError::InsufficientData { .. } | HydroError::MalformedSeries(_) => FailureType::Unknown,
        _ => FailureType::Unknown,
    }
}

/// Log a data-provider failure with automatic classification
pub fn log_provider_failure(location_id: &str, operation: &str, err: &HydroError) {
    let failure_type = classify_provider_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(Component::Provider, Some(location_id), &message),
        FailureType::Unexpected => error(Component::Provider, Some(location_id), &message),
        FailureType::Unknown => warn(Component::Provider, Some(location_id), &message),
    }
}

/// Log a model fit that left the model unfitted
pub fn log_fit_failure(component: Component, location_id: Option<&str>, err: &HydroError) {
    warn(
        component,
        location_id,
        &format!("fit failed, falling back to heuristic path: {}", err),
    );
}

// ---------------------------------------------------------------------------
// Bundle Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one ensemble bundle
pub fn log_bundle_summary(location_id: &str, horizon_days: usize, alerts: usize, fitted: bool) {
    let message = format!(
        "Bundle complete: {}-day horizon, {} alert(s), {} model",
        horizon_days,
        alerts,
        if fitted { "fitted" } else { "fallback" }
    );

    if alerts == 0 {
        info(Component::Ensemble, Some(location_id), &message);
    } else {
        warn(Component::Ensemble, Some(location_id), &message);
    }
}
