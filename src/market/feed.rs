//! Quote feeds

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::types::Quote;
use crate::grid::errors::{GridError, GridResult};

/// Source of top-of-book quotes - can be mocked for testing
#[async_trait]
pub trait PriceFeed: Send {
    /// Start streaming quotes for `symbol`. The channel closes when the
    /// feed has no more data.
    async fn subscribe(&mut self, symbol: &str) -> GridResult<mpsc::UnboundedReceiver<Quote>>;

    /// Stop streaming
    async fn unsubscribe(&mut self) -> GridResult<()>;
}

/// Replays a recorded quote series, in memory or from a `time,bid,ask` CSV
pub struct ReplayFeed {
    quotes: Vec<Quote>,
    pace: Option<Duration>,
    task: Option<JoinHandle<()>>,
}

impl ReplayFeed {
    pub fn new(quotes: Vec<Quote>) -> Self {
        Self {
            quotes,
            pace: None,
            task: None,
        }
    }

    /// Load quotes from a CSV file with a `time,bid,ask` header.
    ///
    /// Rows with a crossed or non-positive quote are skipped.
    pub fn from_csv(path: impl AsRef<Path>) -> GridResult<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;

        let mut quotes = Vec::new();
        for (row, record) in reader.deserialize::<Quote>().enumerate() {
            let quote = record?;
            if !quote.is_valid() {
                warn!("Skipping invalid quote on row {}: bid={} ask={}", row + 1, quote.bid, quote.ask);
                continue;
            }
            quotes.push(quote);
        }

        if quotes.is_empty() {
            return Err(GridError::Feed(format!("no quotes in {}", path.display())));
        }

        info!("Loaded {} quotes from {}", quotes.len(), path.display());
        Ok(Self::new(quotes))
    }

    /// Builder: wait `pace` between quotes (paper mode)
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = (!pace.is_zero()).then_some(pace);
        self
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[async_trait]
impl PriceFeed for ReplayFeed {
    async fn subscribe(&mut self, symbol: &str) -> GridResult<mpsc::UnboundedReceiver<Quote>> {
        if self.task.is_some() {
            return Err(GridError::Feed("feed already subscribed".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let quotes = self.quotes.clone();
        let pace = self.pace;
        info!("Replaying {} quotes for {}", quotes.len(), symbol);

        self.task = Some(tokio::spawn(async move {
            for quote in quotes {
                if tx.send(quote).is_err() {
                    break;
                }
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                }
            }
        }));

        Ok(rx)
    }

    async fn unsubscribe(&mut self) -> GridResult<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;

    fn quotes() -> Vec<Quote> {
        (0..3)
            .map(|i| Quote::new(Utc.timestamp_opt(i * 60, 0).unwrap(), 1.1 + i as f64 * 0.001, 1.1002 + i as f64 * 0.001))
            .collect()
    }

    #[tokio::test]
    async fn test_replay_in_order_then_close() {
        let mut feed = ReplayFeed::new(quotes());
        let mut rx = feed.subscribe("EURUSD").await.unwrap();

        let mut received = Vec::new();
        while let Some(quote) = rx.recv().await {
            received.push(quote);
        }
        assert_eq!(received, quotes());
        feed.unsubscribe().await.unwrap();
    }

    #[tokio::test]
    async fn test_double_subscribe_rejected() {
        let mut feed = ReplayFeed::new(quotes());
        let _rx = feed.subscribe("EURUSD").await.unwrap();
        assert!(feed.subscribe("EURUSD").await.is_err());
    }

    #[test]
    fn test_from_csv_skips_invalid_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time,bid,ask").unwrap();
        writeln!(file, "2024-01-01T00:00:00Z,1.1000,1.1002").unwrap();
        writeln!(file, "2024-01-01T00:00:01Z,1.1005,1.1001").unwrap();
        writeln!(file, "2024-01-01T00:00:02Z,1.1001,1.1003").unwrap();
        file.flush().unwrap();

        let feed = ReplayFeed::from_csv(file.path()).unwrap();
        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn test_from_csv_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time,bid,ask").unwrap();
        writeln!(file, "yesterday,1.1000,1.1002").unwrap();
        file.flush().unwrap();

        assert!(matches!(ReplayFeed::from_csv(file.path()), Err(GridError::Feed(_))));
    }
}
