use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::config::{ConfigError, RunMode, Settings};
use crate::grid::{GridManager, GridRunner, PaperExchange, RunStats};
use crate::market::ReplayFeed;

/// Runner for the trading bot
pub struct BotRunner {
    config: Settings,
}

impl BotRunner {
    /// Create a new runner from a configuration file
    pub fn new(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = config_path
            .as_ref()
            .to_str()
            .ok_or_else(|| ConfigError::Message("config path is not valid UTF-8".into()))?;
        let config = Settings::new(path)?;
        Ok(Self { config })
    }

    pub fn settings(&self) -> &Settings {
        &self.config
    }

    /// Run the bot until the feed is exhausted or the process is interrupted
    pub async fn run(self) -> Result<RunStats, Box<dyn std::error::Error>> {
        // 1. Setup Logging
        if std::env::var("RUST_LOG").is_err() {
            std::env::set_var("RUST_LOG", &self.config.log.level);
        }
        env_logger::try_init().ok();

        info!("Starting BotRunner...");

        // 2. Paper broker
        let paper = &self.config.paper;
        let exchange = PaperExchange::new(self.config.instrument.clone(), paper.initial_balance)
            .with_fee_rate(paper.fee_rate);
        let exchange = Arc::new(exchange);

        // 3. Quote feed
        let feed_config = &self.config.feed;
        let mut feed = ReplayFeed::from_csv(&feed_config.path)?;
        if feed_config.mode == RunMode::Paper {
            feed = feed.with_pace(Duration::from_millis(feed_config.pace_ms));
        }
        info!(
            "Feed ready: {} quotes, {:?} mode, {}s bars",
            feed.len(),
            feed_config.mode,
            feed_config.timeframe_secs
        );

        // 4. Run the strategy
        let manager = GridManager::new(
            self.config.strategy.clone(),
            exchange.clone(),
            feed_config.timeframe_secs,
        );
        let mut runner = GridRunner::new(manager, feed, self.config.runner_config());
        let stats = runner.run().await?;

        info!(
            "Final balance {:.2} (realized {:.2}, fees {:.2}, {} closed positions)",
            exchange.balance().await,
            exchange.realized_profit().await,
            exchange.total_fees().await,
            exchange.closed_count().await
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_backtest_from_files() {
        let mut quotes = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(quotes, "time,bid,ask").unwrap();
        for (secs, bid) in [(0, 1.1040), (60, 1.1050), (120, 1.1050), (130, 1.1036)] {
            writeln!(quotes, "1970-01-01T00:{:02}:{:02}Z,{},{}", secs / 60, secs % 60, bid, bid + 0.0002).unwrap();
        }
        quotes.flush().unwrap();

        let mut config = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            config,
            r#"
[strategy]
symbol = "EURUSD"
label = "grid"

[instrument]
symbol = "EURUSD"
pip_size = 0.0001

[feed]
path = "{}"
timeframe_secs = 60
"#,
            quotes.path().display()
        )
        .unwrap();
        config.flush().unwrap();

        let runner = BotRunner::new(config.path()).unwrap();
        assert!(runner.settings().runner_config().backtest);

        let stats = runner.run().await.unwrap();
        assert_eq!(stats.ticks, 4);
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.closed, 1);
    }

    #[test]
    fn test_missing_config_file() {
        assert!(BotRunner::new("does/not/exist.toml").is_err());
    }
}
