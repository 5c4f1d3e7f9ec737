//! Realized volatility
//!
//! Annualized standard deviation of consecutive log returns, computed over
//! the prices held in a [`RollingWindow`]. Returns are assumed zero-mean:
//!
//! ```text
//! r_i  = ln(p_i / p_{i-1})
//! std  = sqrt(Σ r_i² / (n - 1))
//! vol  = std * sqrt(seconds per year)
//! ```

use crate::error::AnalyticsError;
use crate::types::{PricePoint, PriceTick, VolatilityEstimate, WindowKind};
use crate::window::RollingWindow;
use chrono::{DateTime, Duration, Utc};

/// 365 * 24 * 3600
pub const SECONDS_PER_YEAR: f64 = 31_536_000.0;

/// Minimum number of log returns for an estimate
pub const MIN_RETURNS: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct VolatilityEstimator {
    annualization: f64,
}

impl VolatilityEstimator {
    pub fn new() -> Self {
        Self {
            annualization: SECONDS_PER_YEAR.sqrt(),
        }
    }

    /// Estimate from raw prices in time order
    pub fn estimate_prices<I>(&self, prices: I) -> VolatilityEstimate
    where
        I: IntoIterator<Item = f64>,
    {
        let mut prev: Option<f64> = None;
        let mut sum_sq = 0.0;
        let mut returns = 0usize;

        for price in prices {
            if let Some(p) = prev {
                let r = (price / p).ln();
                sum_sq += r * r;
                returns += 1;
            }
            prev = Some(price);
        }

        if returns < MIN_RETURNS {
            return VolatilityEstimate {
                value: None,
                sample_count: returns,
            };
        }

        let std = (sum_sq / (returns - 1) as f64).sqrt();
        let value = std * self.annualization;

        VolatilityEstimate {
            value: value.is_finite().then_some(value),
            sample_count: returns,
        }
    }

    pub fn estimate(&self, window: &RollingWindow<PriceTick>) -> VolatilityEstimate {
        self.estimate_prices(window.iter().map(|tick| tick.price))
    }

    /// Like [`estimate`](Self::estimate) but reports underflow as an error
    pub fn try_estimate(&self, window: &RollingWindow<PriceTick>) -> Result<f64, AnalyticsError> {
        let estimate = self.estimate(window);
        estimate.value.ok_or(AnalyticsError::WindowUnderflow {
            needed: MIN_RETURNS + 1,
            available: window.len(),
        })
    }
}

impl Default for VolatilityEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Admits a sample only when enough event time has passed since the last
/// admitted one.
#[derive(Debug, Clone)]
pub struct DecimationGate {
    interval: Duration,
    last_accepted: Option<DateTime<Utc>>,
}

impl DecimationGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::milliseconds(i64::try_from(millis).unwrap_or(i64::MAX)))
    }

    pub fn admit(&mut self, timestamp: DateTime<Utc>) -> bool {
        match self.last_accepted {
            Some(last) if timestamp < last || timestamp - last < self.interval => false,
            _ => {
                self.last_accepted = Some(timestamp);
                true
            }
        }
    }

    pub fn last_accepted(&self) -> Option<DateTime<Utc>> {
        self.last_accepted
    }
}

/// Outcome of offering a tick to a [`PriceSeries`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Decimated,
}

/// Decimated price history feeding the bounded and session windows
#[derive(Debug, Clone)]
pub struct PriceSeries {
    gate: DecimationGate,
    bounded: RollingWindow<PriceTick>,
    session: RollingWindow<PriceTick>,
    estimator: VolatilityEstimator,
}

impl PriceSeries {
    pub fn new(bounded_capacity: usize, decimation_ms: u64) -> Self {
        Self {
            gate: DecimationGate::from_millis(decimation_ms),
            bounded: RollingWindow::bounded(bounded_capacity),
            session: RollingWindow::unbounded(),
            estimator: VolatilityEstimator::new(),
        }
    }

    /// Offer a tick. Invalid prices never reach the gate or the windows.
    pub fn ingest(&mut self, tick: PriceTick) -> Result<Admission, AnalyticsError> {
        if !tick.price.is_finite() || tick.price <= 0.0 {
            return Err(AnalyticsError::invalid("price", tick.price));
        }

        if !self.gate.admit(tick.timestamp) {
            return Ok(Admission::Decimated);
        }

        self.bounded.push(tick);
        self.session.push(tick);
        Ok(Admission::Accepted)
    }

    pub fn window(&self, kind: WindowKind) -> &RollingWindow<PriceTick> {
        match kind {
            WindowKind::Bounded => &self.bounded,
            WindowKind::Session => &self.session,
        }
    }

    pub fn points(&self, kind: WindowKind) -> Vec<PricePoint> {
        self.window(kind).iter().map(PricePoint::from).collect()
    }

    pub fn estimate(&self, kind: WindowKind) -> VolatilityEstimate {
        self.estimator.estimate(self.window(kind))
    }

    pub fn latest(&self) -> Option<&PriceTick> {
        self.session.latest()
    }
}

impl Default for PriceSeries {
    fn default() -> Self {
        Self::new(
            config::default_bounded_capacity(),
            config::default_decimation_ms(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_750_000_000_000 + ms).unwrap()
    }

    fn tick(ms: i64, price: f64) -> PriceTick {
        PriceTick::new(at(ms), price, Some(price))
    }

    #[test]
    fn test_unknown_below_two_returns() {
        let estimator = VolatilityEstimator::new();

        assert_eq!(estimator.estimate_prices([]).value, None);
        assert_eq!(estimator.estimate_prices([100.0]).value, None);

        let one_return = estimator.estimate_prices([100.0, 101.0]);
        assert_eq!(one_return.value, None);
        assert_eq!(one_return.sample_count, 1);
    }

    #[test]
    fn test_three_prices_exact_figure() {
        let estimator = VolatilityEstimator::new();
        let estimate = estimator.estimate_prices([100.0, 101.0, 102.0]);

        let r1 = (101.0f64 / 100.0).ln();
        let r2 = (102.0f64 / 101.0).ln();
        let expected = ((r1 * r1 + r2 * r2) / 1.0).sqrt() * 31_536_000f64.sqrt();

        let value = estimate.value.unwrap();
        assert!(((value - expected) / expected).abs() < 1e-9);
        assert_eq!(estimate.sample_count, 2);
    }

    #[test]
    fn test_flat_prices_zero_volatility() {
        let estimator = VolatilityEstimator::new();
        let estimate = estimator.estimate_prices([50.0, 50.0, 50.0, 50.0]);
        assert_eq!(estimate.value, Some(0.0));
    }

    #[test]
    fn test_try_estimate_underflow() {
        let estimator = VolatilityEstimator::new();
        let mut window = RollingWindow::bounded(10);
        window.push(tick(0, 100.0));

        assert_matches!(
            estimator.try_estimate(&window),
            Err(AnalyticsError::WindowUnderflow { available: 1, .. })
        );
    }

    #[test]
    fn test_gate_spacing() {
        let mut gate = DecimationGate::from_millis(100);

        assert!(gate.admit(at(0)));
        assert!(!gate.admit(at(50)));
        assert!(!gate.admit(at(99)));
        assert!(gate.admit(at(100)));
        assert!(gate.admit(at(250)));
        assert_eq!(gate.last_accepted(), Some(at(250)));
    }

    #[test]
    fn test_gate_rejects_older_samples() {
        let mut gate = DecimationGate::from_millis(0);

        assert!(gate.admit(at(1000)));
        assert!(!gate.admit(at(500)));
        assert!(gate.admit(at(1000)));
    }

    #[test]
    fn test_series_gate_applies_to_both_windows() {
        let mut series = PriceSeries::new(3, 100);

        assert_eq!(series.ingest(tick(0, 100.0)), Ok(Admission::Accepted));
        assert_eq!(series.ingest(tick(10, 101.0)), Ok(Admission::Decimated));
        for i in 1..=4 {
            series.ingest(tick(i * 100, 100.0 + i as f64)).unwrap();
        }

        assert_eq!(series.window(WindowKind::Bounded).len(), 3);
        assert_eq!(series.window(WindowKind::Session).len(), 5);
        assert_eq!(series.latest().map(|t| t.price), Some(104.0));
    }

    #[test]
    fn test_series_rejects_invalid_prices() {
        let mut series = PriceSeries::new(60, 100);

        assert_matches!(
            series.ingest(tick(0, f64::NAN)),
            Err(AnalyticsError::InvalidNumeric { field: "price", .. })
        );
        assert_matches!(series.ingest(tick(0, 0.0)), Err(AnalyticsError::InvalidNumeric { .. }));
        assert_matches!(series.ingest(tick(0, -3.0)), Err(AnalyticsError::InvalidNumeric { .. }));

        // Rejected prices do not advance the gate
        assert_eq!(series.ingest(tick(0, 100.0)), Ok(Admission::Accepted));
        assert!(series.points(WindowKind::Session).len() == 1);
    }
}
