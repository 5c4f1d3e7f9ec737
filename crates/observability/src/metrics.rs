//! Prometheus metrics infrastructure
//!
//! Initializes the exporter and provides the per-feed ingestion metric set.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Initialize the Prometheus metrics exporter
///
/// Starts an HTTP listener exposing `/metrics` on the given port.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Ingestion metrics for one feed type
///
/// # Metrics
///
/// * `rangedesk_events_total{feed}` - events ingested
/// * `rangedesk_ingest_duration_seconds{feed}` - time spent in one ingest cycle
/// * `rangedesk_snapshot_version{feed}` - latest published snapshot version
/// * `rangedesk_degraded_fields_total{feed,kind}` - absorbed field degradations
/// * `rangedesk_decimation_rejects_total{feed}` - samples dropped by the decimation gate
///
/// Recording is a no-op until an exporter is installed.
#[derive(Clone)]
pub struct IngestMetrics {
    events_total: Counter,
    ingest_duration: Histogram,
    snapshot_version: Gauge,
    decimation_rejects: Counter,
    feed: &'static str,
}

impl IngestMetrics {
    /// Create metrics for a feed (e.g. "price", "depth", "options", "dashboard")
    pub fn new(feed: &'static str) -> Self {
        Self {
            events_total: counter!("rangedesk_events_total", "feed" => feed),
            ingest_duration: histogram!("rangedesk_ingest_duration_seconds", "feed" => feed),
            snapshot_version: gauge!("rangedesk_snapshot_version", "feed" => feed),
            decimation_rejects: counter!("rangedesk_decimation_rejects_total", "feed" => feed),
            feed,
        }
    }

    pub fn record_event(&self, duration: Duration, version: u64) {
        self.events_total.increment(1);
        self.ingest_duration.record(duration.as_secs_f64());
        self.snapshot_version.set(version as f64);
    }

    pub fn record_degraded(&self, kind: &'static str) {
        counter!("rangedesk_degraded_fields_total", "feed" => self.feed, "kind" => kind)
            .increment(1);
    }

    pub fn record_decimation_reject(&self) {
        self.decimation_rejects.increment(1);
    }

    pub fn feed(&self) -> &'static str {
        self.feed
    }

    /// Start timing an ingest cycle
    pub fn start(&self) -> IngestTimer {
        IngestTimer {
            start: Instant::now(),
        }
    }
}

impl std::fmt::Debug for IngestMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestMetrics").field("feed", &self.feed).finish()
    }
}

/// Elapsed-time handle for one ingest cycle
#[derive(Debug)]
pub struct IngestTimer {
    start: Instant,
}

impl IngestTimer {
    /// Record the cycle against `metrics` with the version it published
    pub fn finish(self, metrics: &IngestMetrics, version: u64) {
        metrics.record_event(self.start.elapsed(), version);
    }
}
