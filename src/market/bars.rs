//! Time-frame bar aggregation

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use log::debug;

use super::snapshot::MarketSnapshot;
use super::types::{Bar, Quote};

const DEFAULT_HISTORY: usize = 100;

/// Builds fixed time-frame bars from a quote stream.
///
/// Bars are aligned to multiples of the timeframe since the Unix epoch and
/// track the bid, like a broker's chart series.
#[derive(Debug, Clone)]
pub struct BarSeries {
    timeframe_secs: i64,
    history: usize,
    current: Option<Bar>,
    /// Completed bars, most recent first
    completed: VecDeque<Bar>,
}

impl BarSeries {
    /// # Panics
    /// Panics if `timeframe_secs` is zero
    pub fn new(timeframe_secs: u64) -> Self {
        assert!(timeframe_secs > 0, "timeframe must be positive");
        Self {
            timeframe_secs: timeframe_secs as i64,
            history: DEFAULT_HISTORY,
            current: None,
            completed: VecDeque::with_capacity(DEFAULT_HISTORY),
        }
    }

    /// Builder: number of completed bars to retain
    pub fn with_history(mut self, bars: usize) -> Self {
        self.history = bars.max(2);
        self
    }

    /// Open time of the bar containing `time`
    pub fn bar_open_time(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let secs = time.timestamp();
        let aligned = secs - secs.rem_euclid(self.timeframe_secs);
        DateTime::from_timestamp(aligned, 0).unwrap_or(time)
    }

    /// Fold a quote into the series. Returns the bar it completed, if any.
    pub fn on_quote(&mut self, quote: &Quote) -> Option<Bar> {
        let open_time = self.bar_open_time(quote.time);

        if let Some(bar) = self.current.as_mut() {
            if bar.open_time == open_time {
                bar.update(quote.bid);
                return None;
            }
            if open_time < bar.open_time {
                debug!("Ignoring out-of-order quote at {}", quote.time);
                return None;
            }
        }

        let finished = self.current.replace(Bar::new(open_time, quote.bid));
        if let Some(bar) = finished {
            self.completed.push_front(bar);
            self.completed.truncate(self.history);
        }
        finished
    }

    /// Bar currently forming
    pub fn current(&self) -> Option<&Bar> {
        self.current.as_ref()
    }

    /// Completed bars, most recent first
    pub fn completed(&self) -> impl Iterator<Item = &Bar> {
        self.completed.iter()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Snapshot of the market at `quote`, which should already have been
    /// folded in with `on_quote`
    pub fn snapshot(&self, quote: &Quote, pip_size: f64) -> MarketSnapshot {
        let current_bar_open = self
            .current
            .as_ref()
            .map(|bar| bar.open_time)
            .unwrap_or_else(|| self.bar_open_time(quote.time));

        MarketSnapshot::new(
            quote.time,
            quote.bid,
            quote.ask,
            pip_size,
            self.completed.iter().map(|bar| bar.close).collect(),
            current_bar_open,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn quote(secs: i64, bid: f64) -> Quote {
        Quote::new(Utc.timestamp_opt(secs, 0).unwrap(), bid, bid + 0.0002)
    }

    #[test]
    fn test_bar_alignment() {
        let series = BarSeries::new(60);
        let t = Utc.timestamp_opt(125, 0).unwrap();
        assert_eq!(series.bar_open_time(t), Utc.timestamp_opt(120, 0).unwrap());
    }

    #[test]
    fn test_bars_roll_over() {
        let mut series = BarSeries::new(60);

        assert!(series.on_quote(&quote(0, 1.10)).is_none());
        assert!(series.on_quote(&quote(30, 1.12)).is_none());

        let done = series.on_quote(&quote(60, 1.11)).unwrap();
        assert_eq!(done.open, 1.10);
        assert_eq!(done.close, 1.12);
        assert_eq!(done.high, 1.12);

        series.on_quote(&quote(125, 1.13));
        assert_eq!(series.completed_count(), 2);

        let closes: Vec<f64> = series.completed().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.11, 1.12]);
        assert_eq!(series.current().unwrap().open_time, Utc.timestamp_opt(120, 0).unwrap());
    }

    #[test]
    fn test_out_of_order_quote_ignored() {
        let mut series = BarSeries::new(60);
        series.on_quote(&quote(120, 1.10));
        series.on_quote(&quote(30, 1.50));

        let bar = series.current().unwrap();
        assert_eq!(bar.high, 1.10);
        assert_eq!(series.completed_count(), 0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut series = BarSeries::new(1).with_history(3);
        for i in 0..10 {
            series.on_quote(&quote(i, 1.0 + i as f64 * 0.001));
        }
        assert_eq!(series.completed_count(), 3);
    }

    #[test]
    fn test_snapshot_closes_and_bar_open() {
        let mut series = BarSeries::new(60);
        series.on_quote(&quote(0, 1.1040));
        series.on_quote(&quote(60, 1.1050));
        let q = quote(150, 1.1060);
        series.on_quote(&q);

        let snap = series.snapshot(&q, 0.0001);
        assert_eq!(snap.last_close(1).unwrap(), 1.1050);
        assert_eq!(snap.last_close(2).unwrap(), 1.1040);
        assert_eq!(snap.current_bar_open(), Utc.timestamp_opt(120, 0).unwrap());
    }
}
