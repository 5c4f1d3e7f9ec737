//! Analytics coordinator
//!
//! Owns one store per feed type (price, depth, options, dashboard). Every
//! ingest call runs its update cycle under the store's write lock and
//! publishes a new versioned snapshot; queries never take the lock.

use crate::bands::PriceBandTracker;
use crate::depth::DepthBook;
use crate::error::AnalyticsError;
use crate::feed::FeedEvent;
use crate::options::OptionsAnalytics;
use crate::positions::PositionPnLAggregator;
use crate::registry::InstrumentRegistry;
use crate::snapshot::{DashboardSnapshot, DepthSnapshot, OptionsSnapshot, PriceSnapshot};
use crate::types::{
    BandSample, DashboardUpdate, DepthCurve, InstrumentRecord, OptionContract, OrderBookLevel,
    PnlPoint, PricePoint, PriceTick, Rollups, SeriesKey, Trade, TradeLogEntry,
    VolatilityEstimate, VolatilitySample, WindowKind,
};
use crate::volatility::{Admission, PriceSeries};
use chrono::{DateTime, Utc};
use common::finite_opt;
use config::AnalyticsConfig;
use observability::IngestMetrics;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::debug;

/// Single-writer state for one feed type plus its snapshot channel
#[derive(Debug)]
struct Store<S, T> {
    state: S,
    version: u64,
    tx: watch::Sender<Arc<T>>,
    metrics: IngestMetrics,
}

impl<S, T> Store<S, T> {
    fn new(state: S, metrics: IngestMetrics) -> (Self, watch::Receiver<Arc<T>>)
    where
        T: Default,
    {
        let (tx, rx) = watch::channel(Arc::new(T::default()));
        (
            Self {
                state,
                version: 0,
                tx,
                metrics,
            },
            rx,
        )
    }

    fn next_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    fn absorb(&self, degraded: Vec<AnalyticsError>) {
        for error in degraded {
            debug!(
                feed = self.metrics.feed(),
                kind = error.kind(),
                %error,
                "Absorbed degraded field"
            );
            self.metrics.record_degraded(error.kind());
        }
    }
}

#[derive(Debug)]
struct DashboardState {
    registry: InstrumentRegistry,
    positions: PositionPnLAggregator,
    bands: PriceBandTracker,
}

#[derive(Debug)]
struct OptionsState {
    analytics: OptionsAnalytics,
}

type PriceStore = Store<PriceSeries, PriceSnapshot>;
type DepthStore = Store<DepthBook, DepthSnapshot>;
type OptionsStore = Store<OptionsState, OptionsSnapshot>;
type DashboardStore = Store<DashboardState, DashboardSnapshot>;

/// Owns one store per feed type. Each ingest call runs a full update cycle
/// under that store's write lock and publishes the resulting snapshot
/// before releasing it. Queries only read published snapshots.
#[derive(Debug, Clone)]
pub struct AnalyticsCoordinator {
    price: Arc<RwLock<PriceStore>>,
    depth: Arc<RwLock<DepthStore>>,
    options: Arc<RwLock<OptionsStore>>,
    dashboard: Arc<RwLock<DashboardStore>>,
    price_rx: watch::Receiver<Arc<PriceSnapshot>>,
    depth_rx: watch::Receiver<Arc<DepthSnapshot>>,
    options_rx: watch::Receiver<Arc<OptionsSnapshot>>,
    dashboard_rx: watch::Receiver<Arc<DashboardSnapshot>>,
}

impl AnalyticsCoordinator {
    pub fn new(config: &AnalyticsConfig) -> Self {
        let (price, price_rx) = Store::new(
            PriceSeries::new(config.windows.bounded_capacity, config.windows.decimation_ms),
            IngestMetrics::new("price"),
        );
        let (depth, depth_rx) = Store::new(
            DepthBook::new(config.windows.depth_levels, config.windows.recent_trades),
            IngestMetrics::new("depth"),
        );
        let (options, options_rx) = Store::new(
            OptionsState {
                analytics: OptionsAnalytics::new(config.options.fee_cents),
            },
            IngestMetrics::new("options"),
        );
        let (dashboard, dashboard_rx) = Store::new(
            DashboardState {
                registry: InstrumentRegistry::new(),
                positions: PositionPnLAggregator::new(config.pnl.alignment),
                bands: PriceBandTracker::new(&config.bands),
            },
            IngestMetrics::new("dashboard"),
        );

        Self {
            price: Arc::new(RwLock::new(price)),
            depth: Arc::new(RwLock::new(depth)),
            options: Arc::new(RwLock::new(options)),
            dashboard: Arc::new(RwLock::new(dashboard)),
            price_rx,
            depth_rx,
            options_rx,
            dashboard_rx,
        }
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    pub async fn ingest_price_tick(
        &self,
        timestamp: DateTime<Utc>,
        price: f64,
        simple_average: Option<f64>,
    ) {
        let mut store = self.price.write().await;
        let timer = store.metrics.start();

        match store.state.ingest(PriceTick::new(timestamp, price, simple_average)) {
            Ok(Admission::Accepted) => {}
            Ok(Admission::Decimated) => {
                store.metrics.record_decimation_reject();
                timer.finish(&store.metrics, store.version);
                return;
            }
            Err(error) => {
                store.absorb(vec![error]);
                timer.finish(&store.metrics, store.version);
                return;
            }
        }

        let version = store.next_version();
        let series = &store.state;
        let snapshot = PriceSnapshot {
            version,
            latest: series.latest().map(PricePoint::from),
            bounded: series.points(WindowKind::Bounded),
            session: series.points(WindowKind::Session),
            bounded_volatility: series.estimate(WindowKind::Bounded),
            session_volatility: series.estimate(WindowKind::Session),
        };
        store.tx.send_replace(Arc::new(snapshot));
        timer.finish(&store.metrics, version);
    }

    pub async fn ingest_options_snapshot(
        &self,
        timestamp: DateTime<Utc>,
        brti: Option<f64>,
        simple_average: Option<f64>,
        contracts: Vec<OptionContract>,
    ) {
        let mut store = self.options.write().await;
        let timer = store.metrics.start();

        let mut degraded = Vec::new();
        if let Some(value) = brti.filter(|v| !v.is_finite()) {
            degraded.push(AnalyticsError::invalid("brti", value));
        }
        let contracts: Vec<OptionContract> =
            contracts.iter().map(OptionContract::sanitized).collect();
        let dropped_moneyness = contracts.iter().filter(|c| c.moneyness.is_none()).count();
        if dropped_moneyness > 0 {
            degraded.push(AnalyticsError::MissingField("moneyness"));
        }
        store.absorb(degraded);

        let analytics = store.state.analytics;
        let snapshot = OptionsSnapshot {
            version: store.next_version(),
            timestamp: Some(timestamp),
            reference_price: finite_opt(brti),
            simple_average: finite_opt(simple_average),
            atm_ticker: analytics.atm(&contracts).map(|c| c.ticker.clone()),
            smile: analytics.smile(&contracts),
            replication_costs: analytics.replication_costs(&contracts),
            binary_price_series: analytics.binary_prices(&contracts),
            contracts,
        };
        let version = snapshot.version;
        store.tx.send_replace(Arc::new(snapshot));
        timer.finish(&store.metrics, version);
    }

    pub async fn ingest_market_depth(
        &self,
        bids: Vec<OrderBookLevel>,
        asks: Vec<OrderBookLevel>,
        recent_trades: Vec<Trade>,
    ) {
        let mut store = self.depth.write().await;
        let timer = store.metrics.start();

        let degraded = store.state.update(&bids, &asks, recent_trades);
        store.absorb(degraded);

        let version = store.next_version();
        let book = &store.state;
        let snapshot = DepthSnapshot {
            version,
            curve: book.curve().clone(),
            top: book.top(),
            recent_trades: book.recent_trades().to_vec(),
        };
        store.tx.send_replace(Arc::new(snapshot));
        timer.finish(&store.metrics, version);
    }

    pub async fn ingest_dashboard_update(&self, update: DashboardUpdate) {
        let mut store = self.dashboard.write().await;
        let timer = store.metrics.start();

        let state = &mut store.state;
        let mut degraded = state.positions.merge(&update, &mut state.registry);
        degraded.extend(state.bands.record(&update));
        store.absorb(degraded);

        let version = store.next_version();
        let state = &store.state;
        let snapshot = DashboardSnapshot {
            version,
            timestamp: Some(update.timestamp),
            reference_price: state.positions.reference_price(),
            tickers: state.registry.tickers(),
            instruments: state.positions.records(),
            pnl_series: state.positions.all_series().clone(),
            aggregate_pnl: state.positions.aggregate().to_vec(),
            rollups: state.positions.rollups(),
            trade_log: state.positions.trade_log().to_vec(),
            bands: state.bands.all_histories(),
            volatility_history: state.bands.volatility_history(),
        };
        store.tx.send_replace(Arc::new(snapshot));
        timer.finish(&store.metrics, version);
    }

    /// Route a decoded feed event to its ingestion path
    pub async fn ingest_event(&self, event: FeedEvent) {
        match event {
            FeedEvent::PriceTick(tick) => {
                self.ingest_price_tick(tick.timestamp, tick.price, tick.simple_average)
                    .await
            }
            FeedEvent::OptionsSnapshot(snapshot) => {
                self.ingest_options_snapshot(
                    snapshot.timestamp,
                    snapshot.reference_price,
                    snapshot.simple_average,
                    snapshot.contracts,
                )
                .await
            }
            FeedEvent::MarketDepth(depth) => {
                self.ingest_market_depth(depth.bids, depth.asks, depth.recent_trades)
                    .await
            }
            FeedEvent::DashboardUpdate(update) => self.ingest_dashboard_update(update).await,
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_price_series(&self, window: WindowKind) -> Vec<PricePoint> {
        self.price_rx.borrow().series(window).to_vec()
    }

    pub fn get_volatility(&self, window: WindowKind) -> Option<f64> {
        self.price_rx.borrow().volatility(window).value
    }

    pub fn get_volatility_estimate(&self, window: WindowKind) -> VolatilityEstimate {
        self.price_rx.borrow().volatility(window)
    }

    pub fn get_depth_curve(&self) -> DepthCurve {
        self.depth_rx.borrow().curve.clone()
    }

    pub fn get_recent_trades(&self) -> Vec<Trade> {
        self.depth_rx.borrow().recent_trades.clone()
    }

    /// Instrument table sorted by ticker
    pub fn get_instrument_table(&self) -> Vec<InstrumentRecord> {
        self.dashboard_rx.borrow().instruments.clone()
    }

    pub fn get_pnl_series(&self, key: impl Into<SeriesKey>) -> Vec<PnlPoint> {
        self.dashboard_rx.borrow().pnl_series(&key.into()).to_vec()
    }

    pub fn get_options_table(&self) -> Arc<OptionsSnapshot> {
        self.options_rx.borrow().clone()
    }

    pub fn get_price_band(&self, ticker: &str) -> Vec<BandSample> {
        self.dashboard_rx.borrow().price_band(ticker).to_vec()
    }

    pub fn get_tickers(&self) -> Vec<String> {
        self.dashboard_rx.borrow().tickers.clone()
    }

    pub fn get_rollups(&self) -> Rollups {
        self.dashboard_rx.borrow().rollups
    }

    /// Latest trade log, newest first
    pub fn get_trade_log(&self) -> Vec<TradeLogEntry> {
        self.dashboard_rx.borrow().trade_log.clone()
    }

    pub fn get_volatility_history(&self) -> Vec<VolatilitySample> {
        self.dashboard_rx.borrow().volatility_history.clone()
    }

    // ------------------------------------------------------------------
    // Snapshots and subscriptions
    // ------------------------------------------------------------------

    pub fn price_snapshot(&self) -> Arc<PriceSnapshot> {
        self.price_rx.borrow().clone()
    }

    pub fn depth_snapshot(&self) -> Arc<DepthSnapshot> {
        self.depth_rx.borrow().clone()
    }

    pub fn options_snapshot(&self) -> Arc<OptionsSnapshot> {
        self.options_rx.borrow().clone()
    }

    pub fn dashboard_snapshot(&self) -> Arc<DashboardSnapshot> {
        self.dashboard_rx.borrow().clone()
    }

    pub fn subscribe_price(&self) -> watch::Receiver<Arc<PriceSnapshot>> {
        self.price_rx.clone()
    }

    pub fn subscribe_depth(&self) -> watch::Receiver<Arc<DepthSnapshot>> {
        self.depth_rx.clone()
    }

    pub fn subscribe_options(&self) -> watch::Receiver<Arc<OptionsSnapshot>> {
        self.options_rx.clone()
    }

    pub fn subscribe_dashboard(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.dashboard_rx.clone()
    }
}

impl Default for AnalyticsCoordinator {
    fn default() -> Self {
        Self::new(&AnalyticsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Quote;
    use chrono::{Duration, TimeZone};
    use common::{Side, Ticker};

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_750_000_000_000).unwrap() + Duration::milliseconds(ms)
    }

    #[tokio::test]
    async fn test_price_ticks_and_volatility() {
        let coordinator = AnalyticsCoordinator::default();

        coordinator.ingest_price_tick(at(0), 100.0, Some(100.0)).await;
        coordinator.ingest_price_tick(at(100), 101.0, Some(100.5)).await;
        assert_eq!(coordinator.get_volatility(WindowKind::Bounded), None);

        coordinator.ingest_price_tick(at(200), 102.0, None).await;

        let series = coordinator.get_price_series(WindowKind::Session);
        assert_eq!(series.len(), 3);
        assert_eq!(series[1].average, Some(100.5));
        assert!(coordinator.get_volatility(WindowKind::Bounded).is_some());
        assert_eq!(
            coordinator
                .get_volatility_estimate(WindowKind::Session)
                .sample_count,
            2
        );
    }

    #[tokio::test]
    async fn test_decimated_and_invalid_ticks_do_not_publish() {
        let coordinator = AnalyticsCoordinator::default();

        coordinator.ingest_price_tick(at(0), 100.0, None).await;
        coordinator.ingest_price_tick(at(50), 100.5, None).await;
        coordinator.ingest_price_tick(at(150), f64::NAN, None).await;

        let snapshot = coordinator.price_snapshot();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.session.len(), 1);
    }

    #[tokio::test]
    async fn test_bounded_window_capacity_from_config() {
        let mut config = AnalyticsConfig::default();
        config.windows.bounded_capacity = 5;
        config.windows.decimation_ms = 0;
        let coordinator = AnalyticsCoordinator::new(&config);

        for i in 0..8 {
            coordinator
                .ingest_price_tick(at(i), 100.0 + i as f64, None)
                .await;
        }

        assert_eq!(coordinator.get_price_series(WindowKind::Bounded).len(), 5);
        assert_eq!(coordinator.get_price_series(WindowKind::Session).len(), 8);
    }

    #[tokio::test]
    async fn test_market_depth() {
        let coordinator = AnalyticsCoordinator::default();

        coordinator
            .ingest_market_depth(
                vec![
                    OrderBookLevel::new(100.0, 1.0),
                    OrderBookLevel::new(99.0, 2.0),
                    OrderBookLevel::new(98.0, 3.0),
                ],
                vec![OrderBookLevel::new(101.0, 0.5)],
                vec![Trade {
                    timestamp: at(0),
                    side: Side::Sell,
                    price: 100.0,
                    size: 0.25,
                }],
            )
            .await;

        let curve = coordinator.get_depth_curve();
        let sizes: Vec<f64> = curve.bids.iter().map(|p| p.cumulative_size).collect();
        assert_eq!(sizes, vec![1.0, 3.0, 6.0]);
        assert_eq!(coordinator.get_recent_trades().len(), 1);
        assert_eq!(coordinator.depth_snapshot().top.spread, Some(1.0));
    }

    #[tokio::test]
    async fn test_options_snapshot() {
        let coordinator = AnalyticsCoordinator::default();
        let contracts = vec![
            OptionContract::new("KX-A")
                .with_strike(100.0)
                .with_moneyness(-0.5)
                .with_book(Some(40.0), Some(44.0)),
            OptionContract::new("KX-B")
                .with_strike(200.0)
                .with_moneyness(0.1)
                .with_iv(Some(0.5), Some(f64::NAN))
                .with_book(Some(20.0), Some(23.0)),
            OptionContract::new("KX-C")
                .with_strike(300.0)
                .with_moneyness(0.3)
                .with_book(Some(10.0), None),
        ];

        coordinator
            .ingest_options_snapshot(at(0), Some(118_000.0), Some(117_990.0), contracts)
            .await;

        let table = coordinator.get_options_table();
        assert_eq!(table.atm_ticker, Some(Ticker::new("KX-B")));
        assert_eq!(table.reference_price, Some(118_000.0));
        assert_eq!(table.replication_costs.len(), 1);
        assert_eq!(table.binary_price_series.len(), 2);
        assert_eq!(table.smile[1].mid_iv, None);
        // Sanitized contracts never carry NaN
        assert_eq!(table.contracts[1].ask_iv, None);
    }

    #[tokio::test]
    async fn test_dashboard_update() {
        let coordinator = AnalyticsCoordinator::default();
        let ticker = Ticker::new("KX-B1");

        let mut update = DashboardUpdate::new(at(0));
        update.positions.insert(ticker.clone(), 10.0);
        update.avg_prices.insert(ticker.clone(), 40.0);
        update.mid_prices.insert(ticker.clone(), 45.0);
        update
            .market_quotes
            .insert(ticker.clone(), Quote::new(Some(44.0), Some(46.0)));
        update.estimated_mid_prices.insert(ticker.clone(), 45.0);
        update.realized_volatility = Some(0.35);
        update.totals.total_trades = Some(2);

        coordinator.ingest_dashboard_update(update).await;

        assert_eq!(coordinator.get_tickers(), vec!["ALL", "KX-B1"]);
        assert_eq!(coordinator.get_instrument_table()[0].unrealized_pnl, Some(0.5));
        assert_eq!(coordinator.get_pnl_series("KX-B1").len(), 1);
        assert_eq!(coordinator.get_pnl_series("ALL")[0].pnl, 0.5);
        assert_eq!(coordinator.get_price_band("KX-B1").len(), 1);
        assert_eq!(coordinator.get_volatility_history().len(), 1);
        assert_eq!(coordinator.get_rollups().total_trades, 2);
        assert!(coordinator.get_trade_log().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_new_versions() {
        let coordinator = AnalyticsCoordinator::default();
        let mut rx = coordinator.subscribe_dashboard();
        assert_eq!(rx.borrow().version, 0);

        let writer = coordinator.clone();
        let handle = tokio::spawn(async move {
            writer
                .ingest_dashboard_update(DashboardUpdate::new(at(0)))
                .await;
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().version, 1);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_ingestion_versions_are_sequential() {
        let coordinator = AnalyticsCoordinator::default();

        let mut handles = Vec::new();
        for i in 0..10 {
            let c = coordinator.clone();
            handles.push(tokio::spawn(async move {
                let mut update = DashboardUpdate::new(at(i * 1000));
                update.realized_pnl.insert(Ticker::new("A"), i as f64);
                c.ingest_dashboard_update(update).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = coordinator.dashboard_snapshot();
        assert_eq!(snapshot.version, 10);
        assert_eq!(snapshot.pnl_series(&SeriesKey::from("A")).len(), 10);
    }
}
