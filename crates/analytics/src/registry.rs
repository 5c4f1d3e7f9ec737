//! Instrument universe
//!
//! Membership only grows; a ticker observed once stays selectable for the
//! lifetime of the process.

use crate::types::SeriesKey;
use common::Ticker;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    tickers: BTreeSet<Ticker>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the ticker was not seen before
    pub fn observe(&mut self, ticker: &Ticker) -> bool {
        if self.tickers.contains(ticker) {
            return false;
        }
        self.tickers.insert(ticker.clone())
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.contains(ticker)
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Selectable series: `ALL` followed by every ticker in lexicographic order
    pub fn tickers(&self) -> Vec<String> {
        std::iter::once(SeriesKey::ALL.to_string())
            .chain(self.tickers.iter().map(|t| t.to_string()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ticker> {
        self.tickers.iter()
    }
}
