//! Feed events and feed handles
//!
//! A feed is anything that yields [`FeedEvent`]s: a JSON-lines file being
//! replayed, an in-process channel, or a network adapter living outside
//! this crate. [`run_feed`] drives one handle into the coordinator and owns
//! the reconnect policy.

use crate::coordinator::AnalyticsCoordinator;
use crate::error::AnalyticsError;
use crate::types::{lenient, DashboardUpdate, OptionContract, OrderBookLevel, PriceTick, Trade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config::FeedConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{info, instrument, warn};

#[cfg(test)]
use mockall::automock;

/// One market update, tagged by feed type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    PriceTick(PriceTick),
    OptionsSnapshot(OptionsChainEvent),
    MarketDepth(MarketDepthEvent),
    DashboardUpdate(DashboardUpdate),
}

impl FeedEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            FeedEvent::PriceTick(_) => "price_tick",
            FeedEvent::OptionsSnapshot(_) => "options_snapshot",
            FeedEvent::MarketDepth(_) => "market_depth",
            FeedEvent::DashboardUpdate(_) => "dashboard_update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsChainEvent {
    #[serde(deserialize_with = "lenient::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, alias = "brti")]
    pub reference_price: Option<f64>,
    #[serde(default)]
    pub simple_average: Option<f64>,
    #[serde(default)]
    pub contracts: Vec<OptionContract>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketDepthEvent {
    #[serde(default)]
    pub bids: Vec<OrderBookLevel>,
    #[serde(default)]
    pub asks: Vec<OrderBookLevel>,
    #[serde(default)]
    pub recent_trades: Vec<Trade>,
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single malformed event; the feed itself is still usable
    #[error("Decode error at line {line}: {message}")]
    Decode { line: usize, message: String },

    #[error("Feed not open")]
    NotOpen,

    #[error("Reconnect attempts exhausted after {attempts} tries: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl From<FeedError> for AnalyticsError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Decode { .. } => AnalyticsError::Decode(err.to_string()),
            other => AnalyticsError::Feed(other.to_string()),
        }
    }
}

/// Event source with an explicit lifecycle
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeedHandle: Send {
    /// Label used in logs
    fn name(&self) -> String;

    /// Open (or reopen) the underlying source
    async fn open(&mut self) -> Result<(), FeedError>;

    /// Next event; `Ok(None)` once the source is exhausted
    async fn next_event(&mut self) -> Result<Option<FeedEvent>, FeedError>;

    async fn close(&mut self) -> Result<(), FeedError>;
}

/// How often and how long to wait before reopening a failed feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(
            config.max_reconnect_attempts(),
            Duration::from_millis(config.reconnect_delay_ms()),
        )
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&FeedConfig::default())
    }
}

/// Counters returned when a feed finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub events: u64,
    pub skipped: u64,
    pub reconnects: u32,
}

/// Drive `feed` into `coordinator` until the feed ends, shutdown is
/// signalled, or the reconnect policy is exhausted.
///
/// Decode errors skip one event. Any other error closes the feed and
/// reopens it after `policy.delay`; consecutive failures beyond
/// `policy.max_attempts` end the run with [`FeedError::Exhausted`].
#[instrument(skip_all, fields(feed = %feed.name()))]
pub async fn run_feed<F>(
    feed: &mut F,
    coordinator: &AnalyticsCoordinator,
    policy: ReconnectPolicy,
    mut shutdown: watch::Receiver<bool>,
) -> Result<FeedStats, FeedError>
where
    F: FeedHandle + ?Sized,
{
    let mut stats = FeedStats::default();
    let mut failures: u32 = 0;

    loop {
        if let Err(e) = feed.open().await {
            failures += 1;
            warn!(attempt = failures, error = %e, "Failed to open feed");
            if failures > policy.max_attempts {
                return Err(FeedError::Exhausted {
                    attempts: failures,
                    last_error: e.to_string(),
                });
            }
            if wait_or_shutdown(policy.delay, &mut shutdown).await {
                return Ok(stats);
            }
            stats.reconnects += 1;
            continue;
        }
        info!("Feed opened");

        let failure = loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(events = stats.events, "Feed shutting down");
                        close_quietly(feed).await;
                        return Ok(stats);
                    }
                }
                next = feed.next_event() => match next {
                    Ok(Some(event)) => {
                        coordinator.ingest_event(event).await;
                        stats.events += 1;
                        failures = 0;
                    }
                    Ok(None) => {
                        info!(events = stats.events, skipped = stats.skipped, "Feed ended");
                        close_quietly(feed).await;
                        return Ok(stats);
                    }
                    Err(FeedError::Decode { line, message }) => {
                        warn!(line, %message, "Skipping malformed event");
                        stats.skipped += 1;
                    }
                    Err(e) => break e,
                }
            }
        };

        close_quietly(feed).await;
        failures += 1;
        warn!(attempt = failures, error = %failure, "Feed failed");
        if failures > policy.max_attempts {
            return Err(FeedError::Exhausted {
                attempts: failures,
                last_error: failure.to_string(),
            });
        }
        if wait_or_shutdown(policy.delay, &mut shutdown).await {
            return Ok(stats);
        }
        stats.reconnects += 1;
    }
}

/// Sleep for `delay`; true when shutdown was signalled first
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

async fn close_quietly<F: FeedHandle + ?Sized>(feed: &mut F) {
    if let Err(e) = feed.close().await {
        warn!(error = %e, "Error closing feed");
    }
}

/// Replays newline-delimited JSON events. Blank lines are ignored.
pub struct JsonLinesFeed {
    source: LinesSource,
    reader: Option<Box<dyn AsyncBufRead + Send + Unpin>>,
    line: usize,
    /// Lines already delivered; a reopened file resumes after them
    consumed: usize,
    skip: usize,
}

enum LinesSource {
    Path(PathBuf),
    Reader(Option<Box<dyn AsyncBufRead + Send + Unpin>>),
}

impl JsonLinesFeed {
    /// Feed over a file; reopening after a drop resumes past the lines
    /// already read
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            source: LinesSource::Path(path.as_ref().to_path_buf()),
            reader: None,
            line: 0,
            consumed: 0,
            skip: 0,
        }
    }

    /// Feed over an already-open reader; it can only be opened once
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        Self {
            source: LinesSource::Reader(Some(Box::new(reader))),
            reader: None,
            line: 0,
            consumed: 0,
            skip: 0,
        }
    }
}

#[async_trait]
impl FeedHandle for JsonLinesFeed {
    fn name(&self) -> String {
        match &self.source {
            LinesSource::Path(path) => format!("jsonl:{}", path.display()),
            LinesSource::Reader(_) => "jsonl:reader".to_string(),
        }
    }

    async fn open(&mut self) -> Result<(), FeedError> {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = match &mut self.source {
            LinesSource::Path(path) => Box::new(BufReader::new(File::open(&*path).await?)),
            LinesSource::Reader(reader) => reader
                .take()
                .ok_or_else(|| FeedError::Connection("reader already consumed".to_string()))?,
        };
        self.reader = Some(reader);
        self.line = 0;
        self.skip = self.consumed;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<FeedEvent>, FeedError> {
        let reader = self.reader.as_mut().ok_or(FeedError::NotOpen)?;
        let mut buf = String::new();

        loop {
            buf.clear();
            if reader.read_line(&mut buf).await? == 0 {
                return Ok(None);
            }
            self.line += 1;
            if self.line <= self.skip {
                continue;
            }
            self.consumed = self.line;

            let text = buf.trim();
            if text.is_empty() {
                continue;
            }

            return serde_json::from_str(text)
                .map(Some)
                .map_err(|e| FeedError::Decode {
                    line: self.line,
                    message: e.to_string(),
                });
        }
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        self.reader = None;
        Ok(())
    }
}

/// Feed over an in-process channel, for adapters running in the same process
pub struct ChannelFeed {
    name: String,
    rx: mpsc::Receiver<FeedEvent>,
    open: bool,
}

impl ChannelFeed {
    pub fn new(name: impl Into<String>, rx: mpsc::Receiver<FeedEvent>) -> Self {
        Self {
            name: name.into(),
            rx,
            open: false,
        }
    }

    /// Channel of the given capacity plus the feed reading from it
    pub fn channel(name: impl Into<String>, capacity: usize) -> (mpsc::Sender<FeedEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(name, rx))
    }

    /// Channel sized by `feeds.channel_capacity`
    pub fn from_config(
        name: impl Into<String>,
        config: &FeedConfig,
    ) -> (mpsc::Sender<FeedEvent>, Self) {
        Self::channel(name, config.channel_capacity())
    }
}

#[async_trait]
impl FeedHandle for ChannelFeed {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn open(&mut self) -> Result<(), FeedError> {
        self.open = true;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<FeedEvent>, FeedError> {
        if !self.open {
            return Err(FeedError::NotOpen);
        }
        // All senders dropped ends the feed
        Ok(self.rx.recv().await)
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WindowKind;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use mockall::Sequence;

    fn tick_event(ms: i64, price: f64) -> FeedEvent {
        FeedEvent::PriceTick(PriceTick::new(
            Utc.timestamp_millis_opt(1_750_000_000_000 + ms).unwrap(),
            price,
            None,
        ))
    }

    fn no_shutdown() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        // Keep the sender alive for the whole test
        std::mem::forget(tx);
        rx
    }

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_event_tags() {
        let json = r#"{"type": "price_tick", "timestamp": "2025-07-18T16:00:00Z", "brti": 118000.5, "simple_average": 117990.0}"#;
        let event: FeedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind(), "price_tick");

        let json = r#"{"type": "market_depth", "bids": [[100.0, 1.0]], "asks": []}"#;
        let event: FeedEvent = serde_json::from_str(json).unwrap();
        assert_matches!(event, FeedEvent::MarketDepth(ref d) if d.bids.len() == 1);

        let json = r#"{"type": "unknown"}"#;
        assert!(serde_json::from_str::<FeedEvent>(json).is_err());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_json_lines_skips_malformed() {
        let input = concat!(
            r#"{"type": "price_tick", "timestamp": "2025-07-18T16:00:00Z", "price": 100.0}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"type": "price_tick", "timestamp": "2025-07-18T16:00:01Z", "price": 101.0}"#,
            "\n",
        );
        let mut feed = JsonLinesFeed::from_reader(BufReader::new(input.as_bytes()));
        let coordinator = AnalyticsCoordinator::default();

        let stats = run_feed(&mut feed, &coordinator, fast_policy(0), no_shutdown())
            .await
            .unwrap();

        assert_eq!(stats.events, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(coordinator.get_price_series(WindowKind::Session).len(), 2);
    }

    #[tokio::test]
    async fn test_reopened_file_resumes_after_consumed_lines() {
        let path = std::env::temp_dir().join(format!(
            "rangedesk-feed-resume-{}.jsonl",
            std::process::id()
        ));
        let input = concat!(
            r#"{"type": "price_tick", "timestamp": "2025-07-18T16:00:00Z", "price": 100.0}"#,
            "\n",
            "\n",
            r#"{"type": "price_tick", "timestamp": "2025-07-18T16:00:01Z", "price": 101.0}"#,
            "\n",
        );
        tokio::fs::write(&path, input).await.unwrap();

        let mut feed = JsonLinesFeed::from_path(&path);
        feed.open().await.unwrap();
        assert_matches!(
            feed.next_event().await.unwrap(),
            Some(FeedEvent::PriceTick(ref tick)) if tick.price == 100.0
        );
        feed.close().await.unwrap();

        feed.open().await.unwrap();
        assert_matches!(
            feed.next_event().await.unwrap(),
            Some(FeedEvent::PriceTick(ref tick)) if tick.price == 101.0
        );
        assert!(feed.next_event().await.unwrap().is_none());

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_error_exhausts_single_use_reader() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"type\": \"price_tick\", \"timestamp\": \"2025-07-18T16:00:00Z\", \"price\": 100.0}\n")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();
        let mut feed = JsonLinesFeed::from_reader(BufReader::new(mock));
        let coordinator = AnalyticsCoordinator::default();

        let result = run_feed(&mut feed, &coordinator, fast_policy(1), no_shutdown()).await;

        // The reader cannot be reopened, so the retry fails too
        assert_matches!(result, Err(FeedError::Exhausted { attempts: 2, .. }));
        assert_eq!(coordinator.price_snapshot().version, 1);
    }

    #[tokio::test]
    async fn test_next_event_before_open() {
        let mut feed = JsonLinesFeed::from_reader(BufReader::new(&b""[..]));
        assert_matches!(feed.next_event().await, Err(FeedError::NotOpen));
    }

    #[tokio::test]
    async fn test_channel_feed_ends_when_senders_drop() {
        let (tx, mut feed) = ChannelFeed::from_config("test", &FeedConfig::default());
        let coordinator = AnalyticsCoordinator::default();

        tx.send(tick_event(0, 100.0)).await.unwrap();
        tx.send(tick_event(100, 101.0)).await.unwrap();
        drop(tx);

        let stats = run_feed(&mut feed, &coordinator, fast_policy(0), no_shutdown())
            .await
            .unwrap();

        assert_eq!(stats.events, 2);
        assert_eq!(coordinator.price_snapshot().version, 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_feed() {
        let (_tx, mut feed) = ChannelFeed::channel("idle", 8);
        let coordinator = AnalyticsCoordinator::default();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            run_feed(&mut feed, &coordinator, fast_policy(0), shutdown_rx).await
        });
        shutdown_tx.send(true).unwrap();

        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.events, 0);
    }

    #[tokio::test]
    async fn test_reconnects_after_failure() {
        let mut feed = MockFeedHandle::new();
        let mut seq = Sequence::new();

        feed.expect_name().return_const("mock".to_string());
        feed.expect_open()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        feed.expect_next_event()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(FeedError::Connection("reset by peer".to_string())));
        feed.expect_close()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        feed.expect_open()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        feed.expect_next_event()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Some(tick_event(0, 100.0))));
        feed.expect_next_event()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(None));
        feed.expect_close()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let coordinator = AnalyticsCoordinator::default();
        let stats = run_feed(&mut feed, &coordinator, fast_policy(3), no_shutdown())
            .await
            .unwrap();

        assert_eq!(stats.events, 1);
        assert_eq!(stats.reconnects, 1);
    }

    #[tokio::test]
    async fn test_exhausted_policy_returns_error() {
        let mut feed = MockFeedHandle::new();
        feed.expect_name().return_const("mock".to_string());
        feed.expect_open()
            .times(3)
            .returning(|| Err(FeedError::Connection("refused".to_string())));

        let coordinator = AnalyticsCoordinator::default();
        let result = run_feed(&mut feed, &coordinator, fast_policy(2), no_shutdown()).await;

        assert_matches!(result, Err(FeedError::Exhausted { attempts: 3, .. }));
    }

    #[test]
    fn test_feed_error_into_analytics_error() {
        let decode: AnalyticsError = FeedError::Decode {
            line: 3,
            message: "bad".to_string(),
        }
        .into();
        assert_matches!(decode, AnalyticsError::Decode(_));

        let closed: AnalyticsError = FeedError::NotOpen.into();
        assert_matches!(closed, AnalyticsError::Feed(_));
    }
}
