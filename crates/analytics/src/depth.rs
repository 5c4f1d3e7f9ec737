//! Order book depth
//!
//! Levels are consumed as delivered: bids best-first (price descending),
//! asks best-first (price ascending). No merging or interpolation.

use crate::error::AnalyticsError;
use crate::types::{DepthCurve, DepthPoint, OrderBookLevel, Trade};
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct DepthCurveBuilder {
    max_levels: usize,
}

impl DepthCurveBuilder {
    pub fn new(max_levels: usize) -> Self {
        Self { max_levels }
    }

    /// Cumulate one side of the book.
    ///
    /// The top `max_levels` rows are taken first; rows with a non-finite
    /// price or a non-finite/negative size are then dropped and reported.
    pub fn cumulate(
        &self,
        levels: &[OrderBookLevel],
        degraded: &mut Vec<AnalyticsError>,
    ) -> Vec<DepthPoint> {
        let mut total = 0.0;
        let mut curve = Vec::with_capacity(levels.len().min(self.max_levels));

        for level in levels.iter().take(self.max_levels) {
            if !level.price.is_finite() {
                degraded.push(AnalyticsError::invalid("level.price", level.price));
                continue;
            }
            if !level.size.is_finite() || level.size < 0.0 {
                degraded.push(AnalyticsError::invalid("level.size", level.size));
                continue;
            }

            total += level.size;
            curve.push(DepthPoint {
                price: level.price,
                cumulative_size: total,
            });
        }

        curve
    }

    pub fn build(
        &self,
        bids: &[OrderBookLevel],
        asks: &[OrderBookLevel],
        degraded: &mut Vec<AnalyticsError>,
    ) -> DepthCurve {
        DepthCurve {
            bids: self.cumulate(bids, degraded),
            asks: self.cumulate(asks, degraded),
        }
    }
}

impl Default for DepthCurveBuilder {
    fn default() -> Self {
        Self::new(config::default_depth_levels())
    }
}

/// Top of book derived from the first valid level of each side
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TopOfBook {
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub mid: Option<f64>,
    pub spread: Option<f64>,
}

impl TopOfBook {
    pub fn from_curve(curve: &DepthCurve) -> Self {
        let best_bid = curve.bids.first().map(|p| p.price);
        let best_ask = curve.asks.first().map(|p| p.price);
        let (mid, spread) = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => (Some((bid + ask) / 2.0), Some(ask - bid)),
            _ => (None, None),
        };

        Self {
            best_bid,
            best_ask,
            mid,
            spread,
        }
    }
}

/// Latest book state: depth curve, top of book and recent trades
#[derive(Debug, Clone)]
pub struct DepthBook {
    builder: DepthCurveBuilder,
    max_trades: usize,
    curve: DepthCurve,
    top: TopOfBook,
    recent_trades: Vec<Trade>,
}

impl DepthBook {
    pub fn new(max_levels: usize, max_trades: usize) -> Self {
        Self {
            builder: DepthCurveBuilder::new(max_levels),
            max_trades,
            curve: DepthCurve::default(),
            top: TopOfBook::default(),
            recent_trades: Vec::new(),
        }
    }

    /// Replace the book with a new snapshot. Returns the absorbed degradations.
    pub fn update(
        &mut self,
        bids: &[OrderBookLevel],
        asks: &[OrderBookLevel],
        recent_trades: Vec<Trade>,
    ) -> Vec<AnalyticsError> {
        let mut degraded = Vec::new();

        self.curve = self.builder.build(bids, asks, &mut degraded);
        self.top = TopOfBook::from_curve(&self.curve);

        let mut trades: Vec<Trade> = Vec::with_capacity(recent_trades.len().min(self.max_trades));
        for trade in recent_trades.into_iter().take(self.max_trades) {
            if !trade.price.is_finite() {
                degraded.push(AnalyticsError::invalid("trade.price", trade.price));
            } else if !trade.size.is_finite() {
                degraded.push(AnalyticsError::invalid("trade.size", trade.size));
            } else {
                trades.push(trade);
            }
        }
        self.recent_trades = trades;

        degraded
    }

    pub fn curve(&self) -> &DepthCurve {
        &self.curve
    }

    pub fn top(&self) -> TopOfBook {
        self.top
    }

    pub fn recent_trades(&self) -> &[Trade] {
        &self.recent_trades
    }
}

impl Default for DepthBook {
    fn default() -> Self {
        Self::new(config::default_depth_levels(), config::default_recent_trades())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::Side;

    fn levels(rows: &[(f64, f64)]) -> Vec<OrderBookLevel> {
        rows.iter().map(|&(p, s)| OrderBookLevel::new(p, s)).collect()
    }

    fn sizes(points: &[DepthPoint]) -> Vec<f64> {
        points.iter().map(|p| p.cumulative_size).collect()
    }

    #[test]
    fn test_cumulative_sizes() {
        let builder = DepthCurveBuilder::new(20);
        let mut degraded = Vec::new();
        let curve = builder.cumulate(&levels(&[(10.0, 1.0), (9.0, 2.0), (8.0, 3.0)]), &mut degraded);

        assert_eq!(sizes(&curve), vec![1.0, 3.0, 6.0]);
        assert!(degraded.is_empty());
    }

    #[test]
    fn test_non_decreasing_for_non_negative_sizes() {
        let builder = DepthCurveBuilder::new(20);
        let rows: Vec<(f64, f64)> = (0..30).map(|i| (100.0 + i as f64, (i % 4) as f64)).collect();
        let curve = builder.cumulate(&levels(&rows), &mut Vec::new());

        assert_eq!(curve.len(), 20);
        assert!(curve.windows(2).all(|w| w[0].cumulative_size <= w[1].cumulative_size));
    }

    #[test]
    fn test_invalid_levels_dropped() {
        let builder = DepthCurveBuilder::new(20);
        let mut degraded = Vec::new();
        let curve = builder.cumulate(
            &levels(&[(10.0, 1.0), (f64::NAN, 5.0), (9.0, -2.0), (8.0, 2.0)]),
            &mut degraded,
        );

        assert_eq!(sizes(&curve), vec![1.0, 3.0]);
        assert_eq!(degraded.len(), 2);
    }

    #[test]
    fn test_book_top_and_trades() {
        let mut book = DepthBook::new(20, 2);
        let trade = |price| Trade {
            timestamp: Utc::now(),
            side: Side::Buy,
            price,
            size: 1.0,
        };

        let degraded = book.update(
            &levels(&[(99.0, 1.0), (98.0, 1.0)]),
            &levels(&[(101.0, 2.0)]),
            vec![trade(100.0), trade(100.5), trade(99.5)],
        );

        assert!(degraded.is_empty());
        let top = book.top();
        assert_eq!(top.best_bid, Some(99.0));
        assert_eq!(top.best_ask, Some(101.0));
        assert_eq!(top.mid, Some(100.0));
        assert_eq!(top.spread, Some(2.0));
        assert_eq!(book.recent_trades().len(), 2);
        assert_eq!(book.recent_trades()[0].price, 100.0);
    }

    #[test]
    fn test_one_sided_book_has_no_mid() {
        let mut book = DepthBook::default();
        book.update(&levels(&[(99.0, 1.0)]), &[], Vec::new());

        assert_eq!(book.top().best_ask, None);
        assert_eq!(book.top().mid, None);
        assert!(book.curve().asks.is_empty());
    }
}
