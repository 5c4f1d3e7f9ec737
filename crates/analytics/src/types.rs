//! Shared types for the analytics core

use chrono::{DateTime, Utc};
use common::{finite_opt, Side, Ticker};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which of the two price windows a query reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// Most recent N decimated samples
    Bounded,
    /// Every decimated sample since process start
    Session,
}

/// One index price observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    #[serde(deserialize_with = "lenient::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "brti")]
    #[serde(default = "lenient::nan", deserialize_with = "lenient::nullable_f64")]
    pub price: f64,
    #[serde(default)]
    pub simple_average: Option<f64>,
}

impl PriceTick {
    pub fn new(timestamp: DateTime<Utc>, price: f64, simple_average: Option<f64>) -> Self {
        Self {
            timestamp,
            price,
            simple_average,
        }
    }
}

/// Price series point as handed to consumers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub price: f64,
    pub average: Option<f64>,
}

impl From<&PriceTick> for PricePoint {
    fn from(tick: &PriceTick) -> Self {
        Self {
            time: tick.timestamp,
            price: tick.price,
            average: finite_opt(tick.simple_average),
        }
    }
}

/// Annualized volatility with the number of log returns behind it
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VolatilityEstimate {
    /// `None` when fewer than two returns are available
    pub value: Option<f64>,
    pub sample_count: usize,
}

/// Order book level. Accepts `[price, size]` pairs or `{price, size}` objects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "LevelRepr")]
pub struct OrderBookLevel {
    pub price: f64,
    pub size: f64,
}

impl OrderBookLevel {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Pair(Option<f64>, Option<f64>),
    Object {
        price: Option<f64>,
        #[serde(alias = "amount")]
        size: Option<f64>,
    },
}

impl From<LevelRepr> for OrderBookLevel {
    fn from(repr: LevelRepr) -> Self {
        let (price, size) = match repr {
            LevelRepr::Pair(price, size) => (price, size),
            LevelRepr::Object { price, size } => (price, size),
        };
        Self {
            price: price.unwrap_or(f64::NAN),
            size: size.unwrap_or(f64::NAN),
        }
    }
}

/// Point on a cumulative depth curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepthPoint {
    pub price: f64,
    pub cumulative_size: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DepthCurve {
    pub bids: Vec<DepthPoint>,
    pub asks: Vec<DepthPoint>,
}

/// Executed trade on the underlying market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(deserialize_with = "lenient::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub price: f64,
    #[serde(alias = "amount")]
    pub size: f64,
}

/// Two-sided quote. Either leg may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default, alias = "best_bid")]
    pub bid: Option<f64>,
    #[serde(default, alias = "best_ask")]
    pub ask: Option<f64>,
}

impl Quote {
    pub fn new(bid: Option<f64>, ask: Option<f64>) -> Self {
        Self { bid, ask }
    }

    /// Copy with non-finite legs cleared
    pub fn sanitized(&self) -> Self {
        Self {
            bid: finite_opt(self.bid),
            ask: finite_opt(self.ask),
        }
    }

    /// Both legs, when both are finite
    pub fn legs(&self) -> Option<(f64, f64)> {
        Some((finite_opt(self.bid)?, finite_opt(self.ask)?))
    }

    pub fn spread(&self) -> Option<f64> {
        self.legs().map(|(bid, ask)| ask - bid)
    }
}

/// Explicit price interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBand {
    pub low: f64,
    pub high: f64,
}

/// Series selector: one instrument or the aggregate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SeriesKey {
    All,
    Ticker(Ticker),
}

impl SeriesKey {
    pub const ALL: &'static str = "ALL";
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesKey::All => f.write_str(Self::ALL),
            SeriesKey::Ticker(t) => write!(f, "{}", t),
        }
    }
}

impl From<&str> for SeriesKey {
    fn from(s: &str) -> Self {
        if s == Self::ALL {
            SeriesKey::All
        } else {
            SeriesKey::Ticker(Ticker::new(s))
        }
    }
}

impl From<Ticker> for SeriesKey {
    fn from(t: Ticker) -> Self {
        SeriesKey::Ticker(t)
    }
}

/// One row of the instrument table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentRecord {
    pub ticker: Ticker,
    /// Strike label; the ticker when none was supplied
    pub strike: String,
    pub position: f64,
    pub avg_price: Option<f64>,
    pub mid_price: Option<f64>,
    /// 0 when flat or missing avg/mid; `None` only for a non-finite product
    pub unrealized_pnl: Option<f64>,
    pub realized_pnl: Option<f64>,
    pub market_quote: Option<Quote>,
    pub our_quote: Option<Quote>,
    /// Market quote spread (`ask - bid`)
    pub spread: Option<f64>,
    /// Reference price lies inside a `low-high` strike range
    pub in_range: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PnlPoint {
    pub timestamp: DateTime<Utc>,
    pub pnl: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_pnl: Option<f64>,
}

/// Scalar totals delivered with a dashboard update
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    #[serde(default)]
    pub total_trades: Option<u64>,
    #[serde(default)]
    pub total_expected_spread_pnl: Option<f64>,
    #[serde(default)]
    pub cumulative_pnl: Option<f64>,
}

/// Dashboard statistics derived from the latest update
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rollups {
    pub total_trades: u64,
    pub total_expected_spread_pnl: f64,
    pub cumulative_pnl: f64,
    pub total_realized: f64,
    pub realized_per_trade: Option<f64>,
    pub expected_per_trade: Option<f64>,
    pub pnl_vs_expected: f64,
}

/// Own-fill record from the trading engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
    pub ticker: Ticker,
    pub side: Side,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<f64>,
    #[serde(default)]
    pub position_after: Option<f64>,
    #[serde(default)]
    pub avg_entry_price_after: Option<f64>,
}

/// Options chain contract as quoted upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub ticker: Ticker,
    #[serde(default)]
    pub strike: Option<f64>,
    #[serde(default)]
    pub moneyness: Option<f64>,
    #[serde(default)]
    pub time_left_sec: Option<f64>,
    #[serde(default)]
    pub interest: Option<f64>,
    #[serde(default)]
    pub bid_iv: Option<f64>,
    #[serde(default)]
    pub ask_iv: Option<f64>,
    #[serde(default)]
    pub bid_delta: Option<f64>,
    #[serde(default)]
    pub ask_delta: Option<f64>,
    #[serde(default)]
    pub best_bid: Option<f64>,
    #[serde(default)]
    pub best_ask: Option<f64>,
    #[serde(default)]
    pub bid_value: Option<f64>,
    #[serde(default)]
    pub ask_value: Option<f64>,
}

impl OptionContract {
    pub fn new(ticker: impl Into<Ticker>) -> Self {
        Self {
            ticker: ticker.into(),
            strike: None,
            moneyness: None,
            time_left_sec: None,
            interest: None,
            bid_iv: None,
            ask_iv: None,
            bid_delta: None,
            ask_delta: None,
            best_bid: None,
            best_ask: None,
            bid_value: None,
            ask_value: None,
        }
    }

    pub fn with_strike(mut self, strike: f64) -> Self {
        self.strike = Some(strike);
        self
    }

    pub fn with_moneyness(mut self, moneyness: f64) -> Self {
        self.moneyness = Some(moneyness);
        self
    }

    pub fn with_iv(mut self, bid_iv: Option<f64>, ask_iv: Option<f64>) -> Self {
        self.bid_iv = bid_iv;
        self.ask_iv = ask_iv;
        self
    }

    pub fn with_book(mut self, best_bid: Option<f64>, best_ask: Option<f64>) -> Self {
        self.best_bid = best_bid;
        self.best_ask = best_ask;
        self
    }

    /// Copy with every non-finite numeric field cleared
    pub fn sanitized(&self) -> Self {
        Self {
            ticker: self.ticker.clone(),
            strike: finite_opt(self.strike),
            moneyness: finite_opt(self.moneyness),
            time_left_sec: finite_opt(self.time_left_sec),
            interest: finite_opt(self.interest),
            bid_iv: finite_opt(self.bid_iv),
            ask_iv: finite_opt(self.ask_iv),
            bid_delta: finite_opt(self.bid_delta),
            ask_delta: finite_opt(self.ask_delta),
            best_bid: finite_opt(self.best_bid),
            best_ask: finite_opt(self.best_ask),
            bid_value: finite_opt(self.bid_value),
            ask_value: finite_opt(self.ask_value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SmilePoint {
    pub moneyness: f64,
    pub bid_iv: Option<f64>,
    pub ask_iv: Option<f64>,
    pub mid_iv: Option<f64>,
}

/// Cost of replicating the range between two adjacent strikes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReplicationCostEntry {
    pub low_strike: Option<f64>,
    pub high_strike: Option<f64>,
    pub buy_cost: f64,
    pub sell_cost: f64,
}

/// Contract quote expressed as probabilities in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryPricePoint {
    pub ticker: Ticker,
    pub strike: Option<f64>,
    pub bid: f64,
    pub ask: f64,
    pub mid: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandSample {
    pub time: DateTime<Utc>,
    pub estimated_band: Option<PriceBand>,
    pub market_band: Option<PriceBand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolatilitySample {
    pub time: DateTime<Utc>,
    /// `None` when the update carried no usable volatility
    pub value: Option<f64>,
}

/// Partial position/PnL update from the trading engine.
///
/// Every map is partial: tickers absent from a map keep their previous
/// values for that field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardUpdate {
    #[serde(deserialize_with = "lenient::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::nullable_f64_map")]
    pub positions: BTreeMap<Ticker, f64>,
    #[serde(default, deserialize_with = "lenient::nullable_f64_map")]
    pub avg_prices: BTreeMap<Ticker, f64>,
    #[serde(default, deserialize_with = "lenient::nullable_f64_map")]
    pub mid_prices: BTreeMap<Ticker, f64>,
    #[serde(default, deserialize_with = "lenient::nullable_f64_map")]
    pub realized_pnl: BTreeMap<Ticker, f64>,
    #[serde(default)]
    pub market_quotes: BTreeMap<Ticker, Quote>,
    #[serde(default)]
    pub our_quotes: BTreeMap<Ticker, Quote>,
    #[serde(default)]
    pub strikes: BTreeMap<Ticker, String>,
    #[serde(default, deserialize_with = "lenient::nullable_f64_map")]
    pub estimated_mid_prices: BTreeMap<Ticker, f64>,
    #[serde(default, alias = "brti")]
    pub reference_price: Option<f64>,
    #[serde(default, alias = "brti_60s_realized_volatility")]
    pub realized_volatility: Option<f64>,
    #[serde(flatten)]
    pub totals: Totals,
    #[serde(default)]
    pub trade_log: Vec<TradeLogEntry>,
}

impl DashboardUpdate {
    /// Empty update at `timestamp`
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            positions: BTreeMap::new(),
            avg_prices: BTreeMap::new(),
            mid_prices: BTreeMap::new(),
            realized_pnl: BTreeMap::new(),
            market_quotes: BTreeMap::new(),
            our_quotes: BTreeMap::new(),
            strikes: BTreeMap::new(),
            estimated_mid_prices: BTreeMap::new(),
            reference_price: None,
            realized_volatility: None,
            totals: Totals::default(),
            trade_log: Vec::new(),
        }
    }
}

/// Deserialisers that turn JSON nulls into NaN so that missing and invalid
/// numbers take the same path through the core.
pub(crate) mod lenient {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use common::Ticker;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use std::collections::BTreeMap;

    pub fn nan() -> f64 {
        f64::NAN
    }

    pub fn nullable_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }

    pub fn nullable_f64_map<'de, D>(deserializer: D) -> Result<BTreeMap<Ticker, f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<Ticker, Option<f64>>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(ticker, value)| (ticker, value.unwrap_or(f64::NAN)))
            .collect())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TimestampRepr {
        Millis(i64),
        Text(String),
    }

    /// RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (UTC) or epoch milliseconds
    pub fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match TimestampRepr::deserialize(deserializer)? {
            TimestampRepr::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", ms))),
            TimestampRepr::Text(text) => parse_timestamp(&text).map_err(D::Error::custom),
        }
    }

    pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp '{}': {}", text, e))
    }
}
