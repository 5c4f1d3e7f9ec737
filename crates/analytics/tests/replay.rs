//! Replays a mixed JSON-lines session through the coordinator

use analytics::feed::{run_feed, ReconnectPolicy};
use analytics::{AnalyticsCoordinator, JsonLinesFeed, SeriesKey, WindowKind};
use config::AnalyticsConfig;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::watch;

const SESSION: &str = r#"
{"type": "price_tick", "timestamp": "2025-07-18 16:00:00.000", "brti": 100.0, "simple_average": 99.5}
{"type": "price_tick", "timestamp": "2025-07-18 16:00:00.050", "brti": 100.5}
{"type": "price_tick", "timestamp": "2025-07-18 16:00:01.000", "brti": 101.0}
{"type": "price_tick", "timestamp": "2025-07-18 16:00:02.000", "brti": null}
{"type": "price_tick", "timestamp": "2025-07-18 16:00:03.000", "brti": 102.0}
{"type": "market_depth", "bids": [[99.0, 1.0], [98.0, 2.0]], "asks": [{"price": 101.0, "amount": 0.5}], "recent_trades": [{"timestamp": "2025-07-18T16:00:03Z", "side": "buy", "price": 101.0, "amount": 0.1}]}
{"type": "options_snapshot", "timestamp": 1752854403000, "brti": 101.5, "contracts": [{"ticker": "KX-100", "strike": 100.0, "moneyness": -0.2, "best_bid": 40.0, "best_ask": 44.0}, {"ticker": "KX-102", "strike": 102.0, "moneyness": 0.05, "best_bid": 20.0, "best_ask": 23.0}]}
this line is not an event
{"type": "dashboard_update", "timestamp": "2025-07-18T16:00:04Z", "positions": {"KX-100": 10}, "avg_prices": {"KX-100": 40}, "mid_prices": {"KX-100": 45}, "realized_pnl": {"KX-100": 1.5}, "market_quotes": {"KX-100": {"bid": 44, "ask": 46}}, "strikes": {"KX-100": "100-102"}, "brti": 101.5, "estimated_mid_prices": {"KX-100": 45}, "brti_60s_realized_volatility": 10.0, "total_trades": 3, "total_expected_spread_pnl": 0.9, "cumulative_pnl": 2.0, "trade_log": [{"ticker": "KX-100", "side": "buy", "price": 40, "size": 10}]}
"#;

fn replay_config() -> AnalyticsConfig {
    let mut config = AnalyticsConfig::default();
    config.windows.decimation_ms = 100;
    config
}

#[tokio::test]
async fn test_replay_session() {
    let coordinator = AnalyticsCoordinator::new(&replay_config());
    let mut feed = JsonLinesFeed::from_reader(BufReader::new(SESSION.as_bytes()));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let stats = run_feed(
        &mut feed,
        &coordinator,
        ReconnectPolicy::new(0, Duration::from_millis(1)),
        shutdown_rx,
    )
    .await
    .unwrap();

    assert_eq!(stats.events, 8);
    assert_eq!(stats.skipped, 1);

    // 16:00:00.050 is decimated, the null price is rejected
    let session = coordinator.get_price_series(WindowKind::Session);
    let prices: Vec<f64> = session.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![100.0, 101.0, 102.0]);
    assert_eq!(session[0].average, Some(99.5));
    assert_eq!(coordinator.price_snapshot().version, 3);
    assert_eq!(
        coordinator.get_volatility_estimate(WindowKind::Session).sample_count,
        2
    );
    assert!(coordinator.get_volatility(WindowKind::Bounded).unwrap() > 0.0);

    let curve = coordinator.get_depth_curve();
    assert_eq!(curve.bids.len(), 2);
    assert_eq!(curve.bids[1].cumulative_size, 3.0);
    assert_eq!(coordinator.get_recent_trades().len(), 1);

    let options = coordinator.get_options_table();
    assert_eq!(options.atm_ticker.as_ref().map(|t| t.to_string()), Some("KX-102".to_string()));
    assert_eq!(options.replication_costs.len(), 1);
    assert_eq!(options.binary_price_series.len(), 2);

    assert_eq!(coordinator.get_tickers(), vec!["ALL".to_string(), "KX-100".to_string()]);
    let table = coordinator.get_instrument_table();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].unrealized_pnl, Some(0.5));
    assert!(table[0].in_range);
    assert_eq!(table[0].spread, Some(2.0));

    let all = coordinator.get_pnl_series(SeriesKey::ALL);
    assert_eq!(all.len(), 1);
    assert_eq!(coordinator.get_pnl_series("KX-100").len(), 1);

    let rollups = coordinator.get_rollups();
    assert_eq!(rollups.total_trades, 3);
    assert_eq!(rollups.total_realized, 1.5);
    assert_eq!(rollups.realized_per_trade, Some(0.5));

    assert_eq!(coordinator.get_trade_log().len(), 1);
    assert_eq!(coordinator.get_price_band("KX-100").len(), 1);
    assert_eq!(coordinator.get_volatility_history().len(), 1);
}

#[tokio::test]
async fn test_snapshots_serialize_after_replay() {
    let coordinator = AnalyticsCoordinator::new(&replay_config());
    let mut feed = JsonLinesFeed::from_reader(BufReader::new(SESSION.as_bytes()));
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    run_feed(&mut feed, &coordinator, ReconnectPolicy::default(), shutdown_rx)
        .await
        .unwrap();

    let dashboard = serde_json::to_value(&*coordinator.dashboard_snapshot()).unwrap();
    assert_eq!(dashboard["version"], 1);
    assert_eq!(dashboard["tickers"][0], "ALL");

    let price = serde_json::to_value(&*coordinator.price_snapshot()).unwrap();
    assert_eq!(price["session"].as_array().map(Vec::len), Some(3));
}
