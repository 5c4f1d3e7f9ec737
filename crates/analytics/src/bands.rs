//! Price band tracking
//!
//! Per-instrument history of the estimated band (estimated mid ± half
//! width, clamped) against the market band (best bid to best ask), plus a
//! process-wide realized volatility history.

use crate::error::AnalyticsError;
use crate::types::{BandSample, DashboardUpdate, PriceBand, VolatilitySample};
use crate::window::RollingWindow;
use common::{finite, Ticker};
use config::BandConfig;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct PriceBandTracker {
    half_width: f64,
    floor: f64,
    ceiling: f64,
    history_capacity: usize,
    bands: BTreeMap<Ticker, RollingWindow<BandSample>>,
    volatility: RollingWindow<VolatilitySample>,
}

impl PriceBandTracker {
    pub fn new(config: &BandConfig) -> Self {
        Self {
            half_width: config.half_width,
            floor: config.floor,
            ceiling: config.ceiling,
            history_capacity: config.history_capacity,
            bands: BTreeMap::new(),
            volatility: RollingWindow::bounded(config.volatility_history_capacity),
        }
    }

    /// Band around an estimated mid, clamped to the floor and ceiling
    pub fn estimated_band(&self, mid: f64) -> Option<PriceBand> {
        let mid = finite(mid)?;
        Some(PriceBand {
            low: (mid - self.half_width).max(self.floor),
            high: (mid + self.half_width).min(self.ceiling),
        })
    }

    /// Record one sample per ticker in the update's market quotes, and one
    /// volatility sample per update.
    pub fn record(&mut self, update: &DashboardUpdate) -> Vec<AnalyticsError> {
        let mut degraded = Vec::new();

        for (ticker, quote) in &update.market_quotes {
            let estimated_band = match update.estimated_mid_prices.get(ticker) {
                Some(&mid) => {
                    let band = self.estimated_band(mid);
                    if band.is_none() {
                        degraded.push(AnalyticsError::invalid("estimated_mid_prices", mid));
                    }
                    band
                }
                None => None,
            };
            let market_band = quote.legs().map(|(bid, ask)| PriceBand { low: bid, high: ask });

            let capacity = self.history_capacity;
            self.bands
                .entry(ticker.clone())
                .or_insert_with(|| RollingWindow::bounded(capacity))
                .push(BandSample {
                    time: update.timestamp,
                    estimated_band,
                    market_band,
                });
        }

        // One sample per update, `None` when unusable
        let value = match update.realized_volatility {
            Some(value) if value.is_finite() => Some(value),
            Some(value) => {
                degraded.push(AnalyticsError::invalid("realized_volatility", value));
                None
            }
            None => {
                degraded.push(AnalyticsError::MissingField("realized_volatility"));
                None
            }
        };
        self.volatility.push(VolatilitySample {
            time: update.timestamp,
            value,
        });

        degraded
    }

    pub fn history(&self, ticker: &str) -> Vec<BandSample> {
        self.bands
            .get(ticker)
            .map(RollingWindow::snapshot)
            .unwrap_or_default()
    }

    pub fn all_histories(&self) -> BTreeMap<Ticker, Vec<BandSample>> {
        self.bands
            .iter()
            .map(|(ticker, window)| (ticker.clone(), window.snapshot()))
            .collect()
    }

    pub fn volatility_history(&self) -> Vec<VolatilitySample> {
        self.volatility.snapshot()
    }
}

impl Default for PriceBandTracker {
    fn default() -> Self {
        Self::new(&BandConfig::default())
    }
}
