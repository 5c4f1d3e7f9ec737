use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Root configuration for a RangeDesk process.
///
/// Every section may be omitted from the YAML file; omitted sections take
/// their documented defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub windows: WindowConfig,
    #[serde(default)]
    pub options: OptionsConfig,
    #[serde(default)]
    pub bands: BandConfig,
    #[serde(default)]
    pub pnl: PnlConfig,
    #[serde(default)]
    pub feeds: FeedConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    /// One of `pretty`, `json`, `compact`
    #[serde(rename = "log_format")]
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    #[serde(rename = "log_level")]
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    /// Capacity of the bounded price window (samples)
    #[serde(rename = "bounded_capacity")]
    #[serde(default = "default_bounded_capacity")]
    pub bounded_capacity: usize,
    /// Minimum spacing between accepted price samples
    #[serde(rename = "decimation_ms")]
    #[serde(default = "default_decimation_ms")]
    pub decimation_ms: u64,
    /// Order book levels kept per side
    #[serde(rename = "depth_levels")]
    #[serde(default = "default_depth_levels")]
    pub depth_levels: usize,
    /// Recent trades kept with the depth snapshot
    #[serde(rename = "recent_trades")]
    #[serde(default = "default_recent_trades")]
    pub recent_trades: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            bounded_capacity: default_bounded_capacity(),
            decimation_ms: default_decimation_ms(),
            depth_levels: default_depth_levels(),
            recent_trades: default_recent_trades(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptionsConfig {
    /// Per-leg fee applied to range replication costs, in cents
    #[serde(rename = "fee_cents")]
    #[serde(default = "default_fee_cents")]
    pub fee_cents: f64,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            fee_cents: default_fee_cents(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BandConfig {
    #[serde(rename = "half_width")]
    #[serde(default = "default_band_half_width")]
    pub half_width: f64,
    #[serde(default = "default_band_floor")]
    pub floor: f64,
    #[serde(default = "default_band_ceiling")]
    pub ceiling: f64,
    /// Band samples kept per instrument
    #[serde(rename = "history_capacity")]
    #[serde(default = "default_band_history_capacity")]
    pub history_capacity: usize,
    /// Process-wide realized volatility samples kept for trend display
    #[serde(rename = "volatility_history_capacity")]
    #[serde(default = "default_volatility_history_capacity")]
    pub volatility_history_capacity: usize,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            half_width: default_band_half_width(),
            floor: default_band_floor(),
            ceiling: default_band_ceiling(),
            history_capacity: default_band_history_capacity(),
            volatility_history_capacity: default_volatility_history_capacity(),
        }
    }
}

/// How the aggregate ("ALL") PnL series lines up per-ticker series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PnlAlignment {
    /// Merge-join on timestamp, carrying each ticker's last known value forward
    #[default]
    Timestamp,
    /// Sum points sharing the same position in each series
    Index,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PnlConfig {
    #[serde(default)]
    pub alignment: PnlAlignment,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeedConfig {
    #[serde(rename = "reconnect_delay_ms")]
    #[serde(default)]
    pub reconnect_delay_ms: Option<u64>,
    #[serde(rename = "max_reconnect_attempts")]
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,
    /// Capacity of in-process feed channels
    #[serde(rename = "channel_capacity")]
    #[serde(default)]
    pub channel_capacity: Option<usize>,
}

impl FeedConfig {
    pub fn reconnect_delay_ms(&self) -> u64 {
        self.reconnect_delay_ms
            .unwrap_or_else(default_reconnect_delay_ms)
    }

    pub fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
            .unwrap_or_else(default_max_reconnect_attempts)
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity.unwrap_or_else(default_channel_capacity)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub port: Option<u16>,
}

impl MetricsConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(default_metrics_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_document_uses_defaults() {
        let config: AnalyticsConfig = serde_yaml::from_str("{}").unwrap();

        assert_eq!(config.service.name, "rangedesk");
        assert_eq!(config.windows.bounded_capacity, 60);
        assert_eq!(config.windows.decimation_ms, 100);
        assert_eq!(config.windows.depth_levels, 20);
        assert_eq!(config.options.fee_cents, 2.0);
        assert_eq!(config.bands.history_capacity, 100);
        assert_eq!(config.bands.volatility_history_capacity, 600);
        assert_eq!(config.pnl.alignment, PnlAlignment::Timestamp);
        assert_eq!(config.feeds.max_reconnect_attempts(), 5);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_parse_partial_sections() {
        let yaml = r#"
windows:
  bounded_capacity: 120
bands:
  half_width: 3.0
pnl:
  alignment: index
feeds:
  reconnect_delay_ms: 250
metrics:
  enabled: true
  port: 9100
"#;
        let config: AnalyticsConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.windows.bounded_capacity, 120);
        assert_eq!(config.windows.decimation_ms, 100);
        assert_eq!(config.bands.half_width, 3.0);
        assert_eq!(config.bands.ceiling, 100.0);
        assert_eq!(config.pnl.alignment, PnlAlignment::Index);
        assert_eq!(config.feeds.reconnect_delay_ms(), 250);
        assert_eq!(config.metrics.port(), 9100);
    }

    #[test]
    fn test_roundtrip_default_config() {
        let config = generate_default_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AnalyticsConfig = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.service.name, config.service.name);
        assert_eq!(parsed.feeds.reconnect_delay_ms, Some(1000));
    }
}
