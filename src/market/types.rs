//! Core data types for market data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-of-book quote for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Quote timestamp
    pub time: DateTime<Utc>,
    /// Best bid
    pub bid: f64,
    /// Best ask
    pub ask: f64,
}

impl Quote {
    /// Create a new quote
    ///
    /// # Panics
    /// Panics if ask < bid
    pub fn new(time: DateTime<Utc>, bid: f64, ask: f64) -> Self {
        assert!(ask >= bid, "ask must not be below bid");
        Self { time, bid, ask }
    }

    /// Validate the quote
    pub fn is_valid(&self) -> bool {
        self.bid > 0.0 && self.ask >= self.bid
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// OHLC bar built from bid prices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time, aligned to the timeframe
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Number of quotes aggregated into the bar
    pub ticks: u32,
}

impl Bar {
    /// Start a bar with its first price
    pub fn new(open_time: DateTime<Utc>, price: f64) -> Self {
        Self {
            open_time,
            open: price,
            high: price,
            low: price,
            close: price,
            ticks: 1,
        }
    }

    /// Fold another price into the bar
    pub fn update(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.ticks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        let quote = Quote::new(Utc::now(), 1.1000, 1.1002);
        assert!(quote.is_valid());
        assert!((quote.spread() - 0.0002).abs() < 1e-12);
        assert!((quote.mid() - 1.1001).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "ask must not be below bid")]
    fn test_crossed_quote() {
        Quote::new(Utc::now(), 1.1002, 1.1000);
    }

    #[test]
    fn test_bar_update() {
        let mut bar = Bar::new(Utc::now(), 1.10);
        bar.update(1.12);
        bar.update(1.09);
        bar.update(1.11);

        assert_eq!(bar.open, 1.10);
        assert_eq!(bar.high, 1.12);
        assert_eq!(bar.low, 1.09);
        assert_eq!(bar.close, 1.11);
        assert_eq!(bar.ticks, 4);
    }
}
