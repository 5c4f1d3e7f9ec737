//! Position and PnL aggregation
//!
//! Merges partial dashboard updates into per-instrument records, appends
//! per-instrument PnL points and rebuilds the aggregate ("ALL") series.
//!
//! Merge rules:
//! - a ticker absent from a map keeps its previous value for that field
//! - a present but non-finite value clears the field and is reported
//! - quote maps only touch quote fields

use crate::error::AnalyticsError;
use crate::registry::InstrumentRegistry;
use crate::types::{
    DashboardUpdate, InstrumentRecord, PnlPoint, Quote, Rollups, SeriesKey, TradeLogEntry,
};
use chrono::{DateTime, Utc};
use common::{finite, finite_opt, Ticker};
use config::PnlAlignment;
use std::collections::{BTreeMap, BTreeSet};

/// Strike labels that mean "no strike"
const NO_STRIKE: [&str; 2] = ["", "N/A"];

#[derive(Debug, Clone, Default)]
struct InstrumentState {
    position: Option<f64>,
    avg_price: Option<f64>,
    mid_price: Option<f64>,
    realized_pnl: Option<f64>,
    market_quote: Option<Quote>,
    our_quote: Option<Quote>,
    strike: Option<String>,
}

impl InstrumentState {
    /// Unrealized PnL in dollars from cent prices. Exactly 0 when flat or
    /// when avg or mid is absent; `None` only if the product is not finite.
    fn unrealized(&self) -> Option<f64> {
        let position = self.position.unwrap_or(0.0);
        match (self.avg_price, self.mid_price) {
            (Some(avg), Some(mid)) if position != 0.0 => finite((mid - avg) * position / 100.0),
            _ => Some(0.0),
        }
    }

    fn total_pnl(&self) -> f64 {
        self.unrealized().unwrap_or(0.0) + self.realized_pnl.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct PositionPnLAggregator {
    alignment: PnlAlignment,
    instruments: BTreeMap<Ticker, InstrumentState>,
    series: BTreeMap<Ticker, Vec<PnlPoint>>,
    expected: Vec<(DateTime<Utc>, f64)>,
    aggregate: Vec<PnlPoint>,
    /// Latest pnl per ticker, for extending the timestamp-aligned aggregate
    carry: BTreeMap<Ticker, f64>,
    rollups: Rollups,
    trade_log: Vec<TradeLogEntry>,
    reference_price: Option<f64>,
}

impl PositionPnLAggregator {
    pub fn new(alignment: PnlAlignment) -> Self {
        Self {
            alignment,
            instruments: BTreeMap::new(),
            series: BTreeMap::new(),
            expected: Vec::new(),
            aggregate: Vec::new(),
            carry: BTreeMap::new(),
            rollups: Rollups::default(),
            trade_log: Vec::new(),
            reference_price: None,
        }
    }

    /// Merge one update. Returns the degradations absorbed along the way.
    pub fn merge(
        &mut self,
        update: &DashboardUpdate,
        registry: &mut InstrumentRegistry,
    ) -> Vec<AnalyticsError> {
        let mut degraded = Vec::new();

        merge_numeric(&mut self.instruments, &update.positions, "positions", &mut degraded, |s| {
            &mut s.position
        });
        merge_numeric(&mut self.instruments, &update.avg_prices, "avg_prices", &mut degraded, |s| {
            &mut s.avg_price
        });
        merge_numeric(&mut self.instruments, &update.mid_prices, "mid_prices", &mut degraded, |s| {
            &mut s.mid_price
        });
        merge_numeric(
            &mut self.instruments,
            &update.realized_pnl,
            "realized_pnl",
            &mut degraded,
            |s| &mut s.realized_pnl,
        );

        for (ticker, quote) in &update.market_quotes {
            self.state(ticker).market_quote = Some(quote.sanitized());
        }
        for (ticker, quote) in &update.our_quotes {
            self.state(ticker).our_quote = Some(quote.sanitized());
        }
        for (ticker, strike) in &update.strikes {
            let strike = strike.trim();
            self.state(ticker).strike =
                (!NO_STRIKE.contains(&strike)).then(|| strike.to_string());
        }

        if let Some(reference) = update.reference_price {
            self.reference_price = finite(reference);
            if self.reference_price.is_none() {
                degraded.push(AnalyticsError::invalid("reference_price", reference));
            }
        }

        for ticker in self.instruments.keys() {
            registry.observe(ticker);
        }

        // Series points only for tickers carried by the PnL maps
        let pnl_keys: BTreeSet<&Ticker> = update
            .positions
            .keys()
            .chain(update.avg_prices.keys())
            .chain(update.mid_prices.keys())
            .chain(update.realized_pnl.keys())
            .collect();

        // Replayed or reordered updates replace the point at their timestamp
        let in_order = self
            .expected
            .last()
            .map_or(true, |(ts, _)| *ts < update.timestamp);

        let mut added: Vec<(Ticker, f64)> = Vec::with_capacity(pnl_keys.len());
        for ticker in pnl_keys {
            let total = self
                .instruments
                .get(ticker)
                .map(InstrumentState::total_pnl)
                .unwrap_or(0.0);
            upsert_point(
                self.series.entry(ticker.clone()).or_default(),
                PnlPoint {
                    timestamp: update.timestamp,
                    pnl: total,
                    expected_pnl: None,
                },
            );
            added.push((ticker.clone(), total));
        }

        let expected = match update.totals.total_expected_spread_pnl {
            Some(value) if !value.is_finite() => {
                degraded.push(AnalyticsError::invalid("total_expected_spread_pnl", value));
                0.0
            }
            value => value.unwrap_or(0.0),
        };
        upsert_expected(&mut self.expected, update.timestamp, expected);

        if in_order {
            self.extend_aggregate(update.timestamp, expected, &added);
        } else {
            self.rebuild_aggregate();
        }

        self.rollups = rollups(update, expected);
        self.trade_log = update.trade_log.iter().rev().cloned().collect();

        degraded
    }

    /// Append the newest update to the aggregate without touching history
    fn extend_aggregate(&mut self, timestamp: DateTime<Utc>, expected: f64, added: &[(Ticker, f64)]) {
        match self.alignment {
            PnlAlignment::Timestamp => {
                for (ticker, pnl) in added {
                    self.carry.insert(ticker.clone(), *pnl);
                }
                if !added.is_empty() {
                    self.aggregate.push(PnlPoint {
                        timestamp,
                        pnl: self.carry.values().sum(),
                        expected_pnl: Some(expected),
                    });
                }
            }
            PnlAlignment::Index => {
                let k = self.expected.len() - 1;
                if let Some(point) = self.aggregate.get_mut(k) {
                    point.expected_pnl = Some(expected);
                }
                for (ticker, pnl) in added {
                    let i = self.series.get(ticker).map_or(0, |p| p.len().saturating_sub(1));
                    match self.aggregate.get_mut(i) {
                        Some(point) => point.pnl += pnl,
                        None => self.aggregate.push(PnlPoint {
                            timestamp,
                            pnl: *pnl,
                            expected_pnl: self.expected.get(i).map(|(_, v)| *v),
                        }),
                    }
                }
            }
        }
    }

    fn rebuild_aggregate(&mut self) {
        self.aggregate = match self.alignment {
            PnlAlignment::Timestamp => align_by_timestamp(&self.series, &self.expected),
            PnlAlignment::Index => align_by_index(&self.series, &self.expected),
        };
        self.carry = self
            .series
            .iter()
            .filter_map(|(ticker, points)| points.last().map(|p| (ticker.clone(), p.pnl)))
            .collect();
    }

    fn state(&mut self, ticker: &Ticker) -> &mut InstrumentState {
        self.instruments.entry(ticker.clone()).or_default()
    }

    /// Instrument table sorted by ticker
    pub fn records(&self) -> Vec<InstrumentRecord> {
        self.instruments
            .iter()
            .map(|(ticker, state)| InstrumentRecord {
                ticker: ticker.clone(),
                strike: state
                    .strike
                    .clone()
                    .unwrap_or_else(|| ticker.to_string()),
                position: state.position.unwrap_or(0.0),
                avg_price: state.avg_price,
                mid_price: state.mid_price,
                unrealized_pnl: state.unrealized(),
                realized_pnl: state.realized_pnl,
                market_quote: state.market_quote,
                our_quote: state.our_quote,
                spread: state.market_quote.and_then(|q| q.spread()),
                in_range: in_range(state.strike.as_deref(), self.reference_price),
            })
            .collect()
    }

    pub fn series(&self, key: &SeriesKey) -> &[PnlPoint] {
        match key {
            SeriesKey::All => &self.aggregate,
            SeriesKey::Ticker(ticker) => self
                .series
                .get(ticker)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        }
    }

    pub fn all_series(&self) -> &BTreeMap<Ticker, Vec<PnlPoint>> {
        &self.series
    }

    pub fn aggregate(&self) -> &[PnlPoint] {
        &self.aggregate
    }

    pub fn rollups(&self) -> Rollups {
        self.rollups
    }

    /// Latest trade log, newest first
    pub fn trade_log(&self) -> &[TradeLogEntry] {
        &self.trade_log
    }

    pub fn reference_price(&self) -> Option<f64> {
        self.reference_price
    }
}

impl Default for PositionPnLAggregator {
    fn default() -> Self {
        Self::new(PnlAlignment::default())
    }
}

fn merge_numeric<F>(
    instruments: &mut BTreeMap<Ticker, InstrumentState>,
    values: &BTreeMap<Ticker, f64>,
    field: &'static str,
    degraded: &mut Vec<AnalyticsError>,
    slot: F,
) where
    F: Fn(&mut InstrumentState) -> &mut Option<f64>,
{
    for (ticker, &value) in values {
        let state = instruments.entry(ticker.clone()).or_default();
        *slot(state) = finite(value);
        if !value.is_finite() {
            degraded.push(AnalyticsError::invalid(field, value));
        }
    }
}

/// Insert keeping timestamp order; a point at an existing timestamp replaces it
fn upsert_point(points: &mut Vec<PnlPoint>, point: PnlPoint) {
    let idx = points.partition_point(|p| p.timestamp < point.timestamp);
    match points.get_mut(idx) {
        Some(existing) if existing.timestamp == point.timestamp => *existing = point,
        _ => points.insert(idx, point),
    }
}

fn upsert_expected(expected: &mut Vec<(DateTime<Utc>, f64)>, timestamp: DateTime<Utc>, value: f64) {
    let idx = expected.partition_point(|(ts, _)| *ts < timestamp);
    match expected.get_mut(idx) {
        Some(existing) if existing.0 == timestamp => existing.1 = value,
        _ => expected.insert(idx, (timestamp, value)),
    }
}

fn rollups(update: &DashboardUpdate, total_expected: f64) -> Rollups {
    let total_trades = update.totals.total_trades.unwrap_or(0);
    let total_realized: f64 = update.realized_pnl.values().copied().filter_map(finite).sum();
    let per_trade = |value: f64| (total_trades > 0).then(|| value / total_trades as f64);

    Rollups {
        total_trades,
        total_expected_spread_pnl: total_expected,
        cumulative_pnl: finite_opt(update.totals.cumulative_pnl).unwrap_or(0.0),
        total_realized,
        realized_per_trade: per_trade(total_realized),
        expected_per_trade: per_trade(total_expected),
        pnl_vs_expected: total_realized - total_expected,
    }
}

/// True when `strike` has the form `low-high` and `reference` lies inside it
fn in_range(strike: Option<&str>, reference: Option<f64>) -> bool {
    let (Some(strike), Some(reference)) = (strike, reference) else {
        return false;
    };
    let Some((low, high)) = strike.split_once('-') else {
        return false;
    };
    match (low.trim().parse::<f64>(), high.trim().parse::<f64>()) {
        (Ok(low), Ok(high)) => low <= reference && reference <= high,
        _ => false,
    }
}

/// Full rebuild: merge-join every series on timestamp. Each ticker
/// contributes its last known value (carry-forward); the expected value is
/// the latest one at or before each point.
fn align_by_timestamp(
    series: &BTreeMap<Ticker, Vec<PnlPoint>>,
    expected: &[(DateTime<Utc>, f64)],
) -> Vec<PnlPoint> {
    let mut events: Vec<(DateTime<Utc>, &Ticker, f64)> = series
        .iter()
        .flat_map(|(ticker, points)| points.iter().map(move |p| (p.timestamp, ticker, p.pnl)))
        .collect();
    events.sort_by_key(|(ts, _, _)| *ts);

    let mut last: BTreeMap<&Ticker, f64> = BTreeMap::new();
    let mut expected_idx = 0;
    let mut current_expected = None;
    let mut out: Vec<PnlPoint> = Vec::new();

    let mut i = 0;
    while i < events.len() {
        let ts = events[i].0;
        while i < events.len() && events[i].0 == ts {
            last.insert(events[i].1, events[i].2);
            i += 1;
        }
        while expected_idx < expected.len() && expected[expected_idx].0 <= ts {
            current_expected = Some(expected[expected_idx].1);
            expected_idx += 1;
        }

        out.push(PnlPoint {
            timestamp: ts,
            pnl: last.values().sum(),
            expected_pnl: current_expected,
        });
    }

    out
}

/// Full rebuild: sum points sharing the same position in each series. Each
/// aggregate point takes the earliest timestamp at its position.
fn align_by_index(
    series: &BTreeMap<Ticker, Vec<PnlPoint>>,
    expected: &[(DateTime<Utc>, f64)],
) -> Vec<PnlPoint> {
    let mut out: Vec<PnlPoint> = Vec::new();

    for points in series.values() {
        for (i, point) in points.iter().enumerate() {
            match out.get_mut(i) {
                Some(acc) => {
                    acc.pnl += point.pnl;
                    acc.timestamp = acc.timestamp.min(point.timestamp);
                }
                None => out.push(PnlPoint {
                    timestamp: point.timestamp,
                    pnl: point.pnl,
                    expected_pnl: None,
                }),
            }
        }
    }

    for (acc, (_, value)) in out.iter_mut().zip(expected) {
        acc.expected_pnl = Some(*value);
    }

    out
}
