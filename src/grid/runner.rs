//! Grid bot runner - main execution loop

use std::time::Duration;

use log::info;
use tokio::time::interval;

use super::errors::GridResult;
use super::executor::GridExchange;
use super::manager::{GridManager, RunStats};
use crate::market::PriceFeed;

/// Grid bot runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub status_interval_secs: u64,
    /// Replaying history: every position is closed when the feed ends
    pub backtest: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            status_interval_secs: 30,
            backtest: false,
        }
    }
}

/// Feeds quotes to a [`GridManager`] one at a time until the feed ends or
/// the process is interrupted
pub struct GridRunner<E: GridExchange, P: PriceFeed> {
    manager: GridManager<E>,
    price_feed: P,
    runner_config: RunnerConfig,
}

impl<E: GridExchange + 'static, P: PriceFeed + 'static> GridRunner<E, P> {
    pub fn new(manager: GridManager<E>, price_feed: P, runner_config: RunnerConfig) -> Self {
        Self {
            manager,
            price_feed,
            runner_config,
        }
    }

    pub async fn run(&mut self) -> GridResult<RunStats> {
        info!("Starting grid bot");
        self.manager.on_start().await?;

        let symbol = self.manager.config().symbol.clone();
        let mut quote_rx = self.price_feed.subscribe(&symbol).await?;

        let mut status_timer = interval(Duration::from_secs(self.runner_config.status_interval_secs.max(1)));
        // First tick completes immediately
        status_timer.tick().await;

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                quote = quote_rx.recv() => match quote {
                    Some(quote) => {
                        if let Err(e) = self.manager.on_tick(&quote).await {
                            self.manager.on_error(&e);
                        }
                    }
                    None => { info!("Price feed ended"); break; }
                },
                _ = status_timer.tick() => self.manager.log_summary(),
                _ = &mut shutdown => { info!("Shutdown signal received"); break; }
            }
        }

        self.price_feed.unsubscribe().await?;
        self.manager.log_summary();

        let close_all = self.runner_config.backtest || self.manager.config().close_all_on_stop;
        self.manager.on_stop(close_all).await?;

        Ok(self.manager.stats().clone())
    }

    pub fn manager(&self) -> &GridManager<E> {
        &self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use crate::grid::config::{GridConfig, InstrumentSpec};
    use crate::grid::paper::PaperExchange;
    use crate::grid::types::BotStatus;
    use crate::market::{Quote, ReplayFeed};

    fn quotes() -> Vec<Quote> {
        [(0, 1.1040), (60, 1.1050), (120, 1.1050), (130, 1.1036), (180, 1.1036)]
            .iter()
            .map(|&(secs, bid)| Quote::new(Utc.timestamp_opt(secs, 0).unwrap(), bid, bid + 0.0002))
            .collect()
    }

    fn build_runner(config: GridConfig, backtest: bool) -> GridRunner<PaperExchange, ReplayFeed> {
        let exchange = PaperExchange::new(InstrumentSpec::new("EURUSD", 0.0001), 10_000.0);
        let manager = GridManager::new(config, Arc::new(exchange), 60);
        let runner_config = RunnerConfig {
            backtest,
            ..RunnerConfig::default()
        };
        GridRunner::new(manager, ReplayFeed::new(quotes()), runner_config)
    }

    #[tokio::test]
    async fn test_backtest_closes_everything_at_end() {
        let mut runner = build_runner(GridConfig::new("EURUSD", "grid"), true);
        let stats = runner.run().await.unwrap();

        assert_eq!(stats.ticks, 5);
        assert_eq!(stats.opened, 3);
        assert_eq!(stats.closed, 3);
        assert_eq!(runner.manager().status(), BotStatus::Stopped);
        assert!(runner.manager().exchange().positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_paper_run_keeps_positions_unless_configured() {
        let mut runner = build_runner(GridConfig::new("EURUSD", "grid"), false);
        let stats = runner.run().await.unwrap();
        assert_eq!(stats.closed, 0);
        assert_eq!(runner.manager().exchange().positions().await.unwrap().len(), 3);

        let config = GridConfig::new("EURUSD", "grid").with_close_all_on_stop(true);
        let mut runner = build_runner(config, false);
        runner.run().await.unwrap();
        assert!(runner.manager().exchange().positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_fails_run() {
        let mut runner = build_runner(GridConfig::new("EURUSD", "grid").with_pip_step(0), true);
        assert!(runner.run().await.is_err());
    }
}
