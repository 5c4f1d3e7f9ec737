//! Immutable snapshots published after each ingest cycle
//!
//! One snapshot type per feed. `version` starts at 0 (nothing ingested yet)
//! and increases by one with every publish.

use crate::depth::TopOfBook;
use crate::types::{
    BandSample, BinaryPricePoint, DepthCurve, InstrumentRecord, OptionContract, PnlPoint,
    PricePoint, ReplicationCostEntry, Rollups, SeriesKey, SmilePoint, Trade, TradeLogEntry,
    VolatilityEstimate, VolatilitySample, WindowKind,
};
use chrono::{DateTime, Utc};
use common::Ticker;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PriceSnapshot {
    pub version: u64,
    pub latest: Option<PricePoint>,
    pub bounded: Vec<PricePoint>,
    pub session: Vec<PricePoint>,
    pub bounded_volatility: VolatilityEstimate,
    pub session_volatility: VolatilityEstimate,
}

impl PriceSnapshot {
    pub fn series(&self, window: WindowKind) -> &[PricePoint] {
        match window {
            WindowKind::Bounded => &self.bounded,
            WindowKind::Session => &self.session,
        }
    }

    pub fn volatility(&self, window: WindowKind) -> VolatilityEstimate {
        match window {
            WindowKind::Bounded => self.bounded_volatility,
            WindowKind::Session => self.session_volatility,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DepthSnapshot {
    pub version: u64,
    pub curve: DepthCurve,
    pub top: TopOfBook,
    pub recent_trades: Vec<Trade>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OptionsSnapshot {
    pub version: u64,
    pub timestamp: Option<DateTime<Utc>>,
    pub reference_price: Option<f64>,
    pub simple_average: Option<f64>,
    pub atm_ticker: Option<Ticker>,
    pub contracts: Vec<OptionContract>,
    pub smile: Vec<SmilePoint>,
    pub replication_costs: Vec<ReplicationCostEntry>,
    pub binary_price_series: Vec<BinaryPricePoint>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSnapshot {
    pub version: u64,
    pub timestamp: Option<DateTime<Utc>>,
    pub reference_price: Option<f64>,
    /// `ALL` followed by every observed ticker
    pub tickers: Vec<String>,
    pub instruments: Vec<InstrumentRecord>,
    pub pnl_series: BTreeMap<Ticker, Vec<PnlPoint>>,
    pub aggregate_pnl: Vec<PnlPoint>,
    pub rollups: Rollups,
    /// Newest first
    pub trade_log: Vec<TradeLogEntry>,
    pub bands: BTreeMap<Ticker, Vec<BandSample>>,
    pub volatility_history: Vec<VolatilitySample>,
}

impl DashboardSnapshot {
    pub fn pnl_series(&self, key: &SeriesKey) -> &[PnlPoint] {
        match key {
            SeriesKey::All => &self.aggregate_pnl,
            SeriesKey::Ticker(ticker) => self
                .pnl_series
                .get(ticker)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        }
    }

    pub fn price_band(&self, ticker: &str) -> &[BandSample] {
        self.bands
            .get(ticker)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
