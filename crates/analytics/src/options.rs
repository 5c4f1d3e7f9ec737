//! Options chain analytics
//!
//! Works on sanitized contracts (every non-finite field already `None`).
//! Quotes are in cents; binary prices are probabilities.

use crate::types::{BinaryPricePoint, OptionContract, ReplicationCostEntry, SmilePoint};

#[derive(Debug, Clone, Copy)]
pub struct OptionsAnalytics {
    fee_cents: f64,
}

impl OptionsAnalytics {
    pub fn new(fee_cents: f64) -> Self {
        Self { fee_cents }
    }

    pub fn fee_cents(&self) -> f64 {
        self.fee_cents
    }

    /// Index of the contract with the smallest |moneyness|; first wins ties
    pub fn atm_index(&self, contracts: &[OptionContract]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;

        for (i, contract) in contracts.iter().enumerate() {
            let Some(moneyness) = contract.moneyness.filter(|m| m.is_finite()) else {
                continue;
            };
            let distance = moneyness.abs();
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((i, distance)),
            }
        }

        best.map(|(i, _)| i)
    }

    pub fn atm<'a>(&self, contracts: &'a [OptionContract]) -> Option<&'a OptionContract> {
        self.atm_index(contracts).map(|i| &contracts[i])
    }

    /// Smile points for contracts with a known moneyness
    pub fn smile(&self, contracts: &[OptionContract]) -> Vec<SmilePoint> {
        contracts
            .iter()
            .filter_map(|c| {
                let moneyness = c.moneyness.filter(|m| m.is_finite())?;
                let bid_iv = c.bid_iv.filter(|v| v.is_finite());
                let ask_iv = c.ask_iv.filter(|v| v.is_finite());
                let mid_iv = match (bid_iv, ask_iv) {
                    (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
                    _ => None,
                };
                Some(SmilePoint {
                    moneyness,
                    bid_iv,
                    ask_iv,
                    mid_iv,
                })
            })
            .collect()
    }

    /// Cost of buying/selling the range between each pair of adjacent
    /// contracts. A pair is kept only when all four legs are quoted.
    pub fn replication_costs(&self, contracts: &[OptionContract]) -> Vec<ReplicationCostEntry> {
        let fee = self.fee_cents;

        contracts
            .windows(2)
            .filter_map(|pair| {
                let (low, high) = (&pair[0], &pair[1]);
                let bid_low = low.best_bid.filter(|v| v.is_finite())?;
                let ask_low = low.best_ask.filter(|v| v.is_finite())?;
                let bid_high = high.best_bid.filter(|v| v.is_finite())?;
                let ask_high = high.best_ask.filter(|v| v.is_finite())?;

                Some(ReplicationCostEntry {
                    low_strike: low.strike,
                    high_strike: high.strike,
                    buy_cost: ask_low + fee - (bid_high - fee),
                    sell_cost: bid_low - fee - (ask_high + fee),
                })
            })
            .collect()
    }

    /// Quotes as probabilities; contracts missing either side are skipped
    pub fn binary_prices(&self, contracts: &[OptionContract]) -> Vec<BinaryPricePoint> {
        contracts
            .iter()
            .filter_map(|c| {
                let bid = c.best_bid.filter(|v| v.is_finite())?;
                let ask = c.best_ask.filter(|v| v.is_finite())?;
                Some(BinaryPricePoint {
                    ticker: c.ticker.clone(),
                    strike: c.strike,
                    bid: bid / 100.0,
                    ask: ask / 100.0,
                    mid: (bid + ask) / 200.0,
                })
            })
            .collect()
    }
}

impl Default for OptionsAnalytics {
    fn default() -> Self {
        Self::new(config::default_fee_cents())
    }
}
