use crate::*;
use thiserror::Error;

const LOG_FORMATS: [&str; 3] = ["pretty", "json", "compact"];

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Service name is required")]
    MissingServiceName,

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("{field} must be a non-negative number")]
    InvalidNonNegative { field: String },

    #[error("Band range invalid: floor {floor} must be below ceiling {ceiling}")]
    InvalidBandRange { floor: f64, ceiling: f64 },

    #[error("metrics.port must be non-zero when metrics are enabled")]
    InvalidMetricsPort,

    #[error("Environment variable placeholder left unresolved in {field}")]
    UnresolvedEnvVar { field: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &AnalyticsConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_service(&config.service, &mut report);
    validate_windows(&config.windows, &mut report);
    validate_options(&config.options, &mut report);
    validate_bands(&config.bands, &mut report);
    validate_pnl(&config.pnl, &mut report);
    validate_feeds(&config.feeds, &mut report);
    validate_metrics(&config.metrics, &mut report);

    report
}

fn validate_service(service: &ServiceConfig, report: &mut ValidationReport) {
    if service.name.trim().is_empty() {
        report.add_error(ValidationError::MissingServiceName);
    } else if has_unresolved_env_vars(&service.name) {
        report.add_error(ValidationError::UnresolvedEnvVar {
            field: "service.name".to_string(),
        });
    }

    if !LOG_FORMATS.contains(&service.log_format.to_lowercase().as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(service.log_format.clone()));
    }

    if service.log_level.trim().is_empty() {
        report.add_default("service.log_level", &default_log_level());
    }
}

fn validate_windows(windows: &WindowConfig, report: &mut ValidationReport) {
    let capacities = [
        ("windows.bounded_capacity", windows.bounded_capacity),
        ("windows.depth_levels", windows.depth_levels),
        ("windows.recent_trades", windows.recent_trades),
    ];
    for (field, value) in capacities {
        if value == 0 {
            report.add_error(ValidationError::InvalidPositiveInteger {
                field: field.to_string(),
            });
        }
    }

    if windows.bounded_capacity == 1 {
        report.add_warning(
            "windows.bounded_capacity",
            "A single-sample window never yields a volatility estimate",
        );
    }

    if windows.decimation_ms == 0 {
        report.add_warning(
            "windows.decimation_ms",
            "Decimation disabled; every price tick is appended to the bounded window",
        );
    }
}

fn validate_options(options: &OptionsConfig, report: &mut ValidationReport) {
    if !options.fee_cents.is_finite() || options.fee_cents < 0.0 {
        report.add_error(ValidationError::InvalidNonNegative {
            field: "options.fee_cents".to_string(),
        });
    }
}

fn validate_bands(bands: &BandConfig, report: &mut ValidationReport) {
    if !bands.half_width.is_finite() || bands.half_width < 0.0 {
        report.add_error(ValidationError::InvalidNonNegative {
            field: "bands.half_width".to_string(),
        });
    }

    if !(bands.floor.is_finite() && bands.ceiling.is_finite() && bands.floor < bands.ceiling) {
        report.add_error(ValidationError::InvalidBandRange {
            floor: bands.floor,
            ceiling: bands.ceiling,
        });
    }

    if bands.history_capacity == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "bands.history_capacity".to_string(),
        });
    }

    if bands.volatility_history_capacity == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "bands.volatility_history_capacity".to_string(),
        });
    }
}

fn validate_pnl(pnl: &PnlConfig, report: &mut ValidationReport) {
    if pnl.alignment == PnlAlignment::Index {
        report.add_warning(
            "pnl.alignment",
            "Index alignment sums points by position; series with different sampling will be misaligned",
        );
    }
}

fn validate_feeds(feeds: &FeedConfig, report: &mut ValidationReport) {
    match feeds.reconnect_delay_ms {
        None => report.add_default(
            "feeds.reconnect_delay_ms",
            &default_reconnect_delay_ms().to_string(),
        ),
        Some(0) => report.add_warning(
            "feeds.reconnect_delay_ms",
            "Reconnecting without delay may spin against an unavailable source",
        ),
        Some(_) => {}
    }

    match feeds.max_reconnect_attempts {
        None => report.add_default(
            "feeds.max_reconnect_attempts",
            &default_max_reconnect_attempts().to_string(),
        ),
        Some(0) => report.add_warning(
            "feeds.max_reconnect_attempts",
            "Feeds will not be reopened after the first disconnect",
        ),
        Some(_) => {}
    }

    match feeds.channel_capacity {
        None => report.add_default(
            "feeds.channel_capacity",
            &default_channel_capacity().to_string(),
        ),
        Some(0) => report.add_error(ValidationError::InvalidPositiveInteger {
            field: "feeds.channel_capacity".to_string(),
        }),
        Some(_) => {}
    }
}

fn validate_metrics(metrics: &MetricsConfig, report: &mut ValidationReport) {
    if !metrics.enabled {
        return;
    }

    match metrics.port {
        None => report.add_default("metrics.port", &default_metrics_port().to_string()),
        Some(0) => report.add_error(ValidationError::InvalidMetricsPort),
        Some(_) => {}
    }
}
