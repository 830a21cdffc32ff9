//! Per-tick market snapshot

use chrono::{DateTime, Utc};

use crate::grid::errors::{GridError, GridResult};

/// Completed bars the momentum signal looks back over
pub const REQUIRED_CLOSES: usize = 2;

/// Consistent view of the market for the duration of one tick
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub time: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    pub pip_size: f64,
    /// Closes of completed bars, most recent first
    closes: Vec<f64>,
    /// Open time of the bar currently forming
    current_bar_open: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn new(
        time: DateTime<Utc>,
        bid: f64,
        ask: f64,
        pip_size: f64,
        closes: Vec<f64>,
        current_bar_open: DateTime<Utc>,
    ) -> Self {
        Self {
            time,
            bid,
            ask,
            pip_size,
            closes,
            current_bar_open,
        }
    }

    /// Spread expressed in pips, rounded to a millionth of a pip so that a
    /// spread of exactly n pips compares equal to n
    pub fn spread_in_pips(&self) -> f64 {
        ((self.ask - self.bid) / self.pip_size * 1e6).round() / 1e6
    }

    /// Close of the n-th most recent completed bar (1 = last completed).
    ///
    /// Fails with `DataUnavailable` until at least two bars have completed,
    /// or when `n` reaches past the retained history.
    pub fn last_close(&self, n: usize) -> GridResult<f64> {
        let unavailable = GridError::DataUnavailable {
            required: n.max(REQUIRED_CLOSES),
            available: self.closes.len(),
        };
        if self.closes.len() < REQUIRED_CLOSES || n == 0 {
            return Err(unavailable);
        }
        self.closes.get(n - 1).copied().ok_or(unavailable)
    }

    pub fn current_bar_open(&self) -> DateTime<Utc> {
        self.current_bar_open
    }

    pub fn completed_bars(&self) -> usize {
        self.closes.len()
    }

    /// Convert a pip distance to a price distance
    pub fn pips(&self, pips: f64) -> f64 {
        pips * self.pip_size
    }
}
