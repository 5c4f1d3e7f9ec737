//! RangeDesk CLI binary
//!
//! Initializes, validates, and replays recorded feed sessions through the
//! analytics core, printing the resulting snapshots as JSON.

use analytics::feed::{run_feed, ReconnectPolicy};
use analytics::{AnalyticsCoordinator, JsonLinesFeed};
use anyhow::{Context, Result};
use cli::{Cli, Commands, SnapshotKind};
use config::{
    generate_default_config, load_config, save_config, validate_config, AnalyticsConfig,
    ServiceConfig,
};
use observability::{init_logging, init_metrics, LogFormat};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Replay {
            ref config,
            ref input,
            output,
            pretty,
        } => {
            // Config comes first so its service section can drive logging
            let loaded = load_config(config)?;
            start_logging(&cli, &loaded.service)?;
            debug!(?cli, "CLI arguments parsed");
            info!("Executing 'replay' command");
            replay_command(loaded, input, output, pretty).await
        }
        Commands::Validate { ref config } => {
            start_logging(&cli, &ServiceConfig::default())?;
            info!("Executing 'validate' command");
            validate_command(config).await
        }
        Commands::Init { ref output } => {
            start_logging(&cli, &ServiceConfig::default())?;
            info!("Executing 'init' command");
            init_command(output).await
        }
    }
}

fn start_logging(cli: &Cli, service: &ServiceConfig) -> Result<()> {
    let format = cli
        .log_format
        .map(|f| f.as_str())
        .and_then(LogFormat::parse)
        .or_else(|| LogFormat::parse(&service.log_format))
        .unwrap_or_default();
    let level = cli.log_level.as_deref().unwrap_or(&service.log_level);

    init_logging(&service.name, format, level)
}

async fn replay_command(
    config: AnalyticsConfig,
    input: &Path,
    output: SnapshotKind,
    pretty: bool,
) -> Result<()> {
    let report = validate_config(&config);

    if !report.warnings.is_empty() {
        warn!("Configuration warnings:");
        for warning in &report.warnings {
            warn!(field = %warning.field, message = %warning.message);
        }
    }

    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot replay due to configuration errors");
    }

    if config.metrics.enabled {
        let port = config.metrics.port();
        init_metrics(port).context("Failed to start metrics exporter")?;
        info!(port, "Prometheus exporter listening");
    }

    let coordinator = AnalyticsCoordinator::new(&config);
    let policy = ReconnectPolicy::from_config(&config.feeds);
    let mut feed = JsonLinesFeed::from_path(input);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping replay");
            let _ = shutdown_tx.send(true);
        }
    });

    info!(?input, "Starting replay");
    let stats = run_feed(&mut feed, &coordinator, policy, shutdown_rx)
        .await
        .with_context(|| format!("Replay of {:?} failed", input))?;
    info!(
        events = stats.events,
        skipped = stats.skipped,
        reconnects = stats.reconnects,
        "Replay finished"
    );

    let value = snapshot_json(&coordinator, output)?;
    let text = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    println!("{}", text);

    Ok(())
}

fn snapshot_json(coordinator: &AnalyticsCoordinator, kind: SnapshotKind) -> Result<Value> {
    fn to_value<T: Serialize>(snapshot: &T) -> Result<Value> {
        serde_json::to_value(snapshot).context("Failed to serialize snapshot")
    }

    match kind {
        SnapshotKind::Price => to_value(&*coordinator.price_snapshot()),
        SnapshotKind::Depth => to_value(&*coordinator.depth_snapshot()),
        SnapshotKind::Options => to_value(&*coordinator.options_snapshot()),
        SnapshotKind::Dashboard => to_value(&*coordinator.dashboard_snapshot()),
        SnapshotKind::All => {
            let mut all = Map::new();
            all.insert("price".into(), to_value(&*coordinator.price_snapshot())?);
            all.insert("depth".into(), to_value(&*coordinator.depth_snapshot())?);
            all.insert("options".into(), to_value(&*coordinator.options_snapshot())?);
            all.insert(
                "dashboard".into(),
                to_value(&*coordinator.dashboard_snapshot())?,
            );
            Ok(Value::Object(all))
        }
    }
}

async fn validate_command(config_path: &Path) -> Result<()> {
    info!(path = ?config_path, "Validating configuration");

    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Service: {}", config.service.name);
    println!(
        "Bounded window: {} samples, decimation {} ms",
        config.windows.bounded_capacity, config.windows.decimation_ms
    );
    println!(
        "Depth: {} levels, {} recent trades",
        config.windows.depth_levels, config.windows.recent_trades
    );
    println!("PnL alignment: {:?}", config.pnl.alignment);
    println!(
        "Metrics: {}",
        if config.metrics.enabled {
            format!("enabled on port {}", config.metrics.port())
        } else {
            "disabled".to_string()
        }
    );

    Ok(())
}

async fn init_command(output_path: &Path) -> Result<()> {
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("This configuration includes:");
    println!("  - Service name and logging defaults");
    println!("  - Price window, decimation and depth limits");
    println!("  - Options fee, price band and PnL alignment settings");
    println!("  - Feed reconnect policy and metrics exporter (disabled)");
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file to customize settings");
    println!(
        "  2. Run 'rangedesk validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  3. Run 'rangedesk replay --config {:?} --input <events.jsonl>' to replay a session",
        output_path
    );

    Ok(())
}
