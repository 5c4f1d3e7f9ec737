use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AnalyticsConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    let config = parse_config(&content)?;

    info!("Configuration loaded successfully");
    Ok(config)
}

/// Parse a YAML document after environment variable substitution.
pub fn parse_config(content: &str) -> Result<AnalyticsConfig> {
    let substituted = substitution::substitute_env_vars(content)?;
    debug!("Environment variable substitution completed");

    let config: AnalyticsConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    Ok(config)
}

#[instrument]
pub fn generate_default_config() -> AnalyticsConfig {
    AnalyticsConfig {
        service: ServiceConfig::default(),
        windows: WindowConfig::default(),
        options: OptionsConfig::default(),
        bands: BandConfig::default(),
        pnl: PnlConfig::default(),
        feeds: FeedConfig {
            reconnect_delay_ms: Some(default_reconnect_delay_ms()),
            max_reconnect_attempts: Some(default_max_reconnect_attempts()),
            channel_capacity: Some(default_channel_capacity()),
        },
        metrics: MetricsConfig {
            enabled: false,
            port: Some(default_metrics_port()),
        },
    }
}

#[instrument(skip(config))]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(
    config: &AnalyticsConfig,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}
