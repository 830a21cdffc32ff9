//! Grid manager - lifecycle hooks around the decision engine

use std::fmt;
use std::sync::Arc;

use log::{debug, error, info, warn};

use super::config::GridConfig;
use super::engine::GridEngine;
use super::errors::{GridError, GridResult};
use super::executor::{ExecutionAdapter, ExecutionReport, GridExchange};
use super::ledger::LedgerView;
use super::types::{BotStatus, Direction};
use crate::market::{BarSeries, MarketSnapshot, Quote};

/// Counters over the lifetime of a run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub ticks: u64,
    pub opened: u64,
    pub closed: u64,
    pub stopped_out: u64,
    pub realized_profit: f64,
    pub errors: u64,
}

/// Ladder status line, refreshed every tick
#[derive(Debug, Clone, PartialEq)]
pub struct LadderSummary {
    pub label: String,
    /// Spread in pips, one decimal
    pub spread_pips: f64,
    pub spread_exceeded: bool,
    pub long_count: usize,
    pub short_count: usize,
    /// Pips from the bid down to the average long entry
    pub long_target_away: Option<f64>,
    /// Pips from the average short entry up to the ask
    pub short_target_away: Option<f64>,
}

impl LadderSummary {
    pub fn compute(market: &MarketSnapshot, ledger: &LedgerView<'_>, label: &str, max_spread: f64) -> Self {
        let spread = market.spread_in_pips();
        let long_target_away = ledger
            .average_entry_price(Direction::Long)
            .ok()
            .map(|avg| round_one((avg - market.bid) / market.pip_size));
        let short_target_away = ledger
            .average_entry_price(Direction::Short)
            .ok()
            .map(|avg| round_one((market.ask - avg) / market.pip_size));

        Self {
            label: label.to_string(),
            spread_pips: round_one(spread),
            spread_exceeded: spread > max_spread,
            long_count: ledger.count(Direction::Long),
            short_count: ledger.count(Direction::Short),
            long_target_away,
            short_target_away,
        }
    }
}

impl fmt::Display for LadderSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.spread_exceeded {
            return f.write_str("MAX SPREAD EXCEED");
        }

        write!(
            f,
            "{} | Buy Positions = {} | Spread = {:.1} | Sell Positions = {}",
            self.label, self.long_count, self.spread_pips, self.short_count
        )?;
        if let Some(away) = self.long_target_away {
            write!(f, " | Buy Target Away = {:.1}", away)?;
        }
        if let Some(away) = self.short_target_away {
            write!(f, " | Sell Target Away = {:.1}", away)?;
        }
        Ok(())
    }
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Drives one grid strategy against a broker: builds the per-tick inputs,
/// runs the engine and executes its commands.
pub struct GridManager<E: GridExchange> {
    config: GridConfig,
    adapter: ExecutionAdapter<E>,
    bars: BarSeries,
    engine: Option<GridEngine>,
    status: BotStatus,
    stats: RunStats,
    summary: Option<LadderSummary>,
}

impl<E: GridExchange> GridManager<E> {
    /// Create a manager; bars are built on a `timeframe_secs` time frame
    pub fn new(config: GridConfig, exchange: Arc<E>, timeframe_secs: u64) -> Self {
        Self {
            config,
            adapter: ExecutionAdapter::new(exchange),
            bars: BarSeries::new(timeframe_secs),
            engine: None,
            status: BotStatus::Initializing,
            stats: RunStats::default(),
            summary: None,
        }
    }

    /// Validate the configuration, fetch instrument properties and build
    /// the engine. Any error here aborts the run.
    pub async fn on_start(&mut self) -> GridResult<()> {
        if self.status != BotStatus::Initializing {
            return Err(GridError::InvalidState {
                current_state: format!("{:?}", self.status),
            });
        }

        self.config.validate()?;
        let instrument = self.adapter.exchange().instrument(&self.config.symbol).await?;
        instrument.validate()?;

        info!(
            "Starting grid on {} ({}): pip size {}, volume step {}",
            self.config.symbol, self.config.label, instrument.pip_size, instrument.volume_step
        );

        self.engine = Some(GridEngine::new(self.config.clone(), instrument));
        self.set_status(BotStatus::Running);
        Ok(())
    }

    /// Process one quote
    pub async fn on_tick(&mut self, quote: &Quote) -> GridResult<ExecutionReport> {
        if !self.status.is_active() {
            return Err(GridError::InvalidState {
                current_state: format!("{:?}", self.status),
            });
        }
        if !quote.is_valid() {
            return Err(GridError::Feed(format!(
                "invalid quote at {}: bid={} ask={}",
                quote.time, quote.bid, quote.ask
            )));
        }

        let exchange = self.adapter.exchange().clone();
        let stopped = exchange.mark_to_market(quote).await?;
        if !stopped.is_empty() {
            self.stats.stopped_out += stopped.len() as u64;
            self.stats.realized_profit += stopped.iter().map(|p| p.net_profit).sum::<f64>();
        }

        if let Some(bar) = self.bars.on_quote(quote) {
            debug!("Bar {} closed at {}", bar.open_time, bar.close);
        }

        let engine = self.engine.as_mut().ok_or_else(|| GridError::InvalidState {
            current_state: "engine not started".into(),
        })?;
        let snapshot = self.bars.snapshot(quote, engine.instrument().pip_size);

        let positions = exchange.positions().await?;
        let ledger = LedgerView::new(&positions, &self.config.symbol, &self.config.label);
        let commands = engine.on_tick(&snapshot, &ledger)?;

        let report = self.adapter.execute(commands).await;
        self.stats.ticks += 1;
        self.stats.opened += report.opened.len() as u64;
        self.stats.closed += report.closed.len() as u64;
        self.stats.realized_profit += report.realized_profit();
        for (_, e) in &report.failures {
            self.on_error(e);
        }

        let positions = if report.is_empty() {
            positions
        } else {
            exchange.positions().await?
        };
        let ledger = LedgerView::new(&positions, &self.config.symbol, &self.config.label);
        self.summary = Some(LadderSummary::compute(
            &snapshot,
            &ledger,
            &self.config.label,
            self.config.max_spread,
        ));

        Ok(report)
    }

    /// Stop the strategy, closing every ladder position if `close_all`
    pub async fn on_stop(&mut self, close_all: bool) -> GridResult<ExecutionReport> {
        self.set_status(BotStatus::Stopping);

        let mut report = ExecutionReport::default();
        if close_all {
            if let Some(engine) = self.engine.as_ref() {
                let positions = self.adapter.exchange().positions().await?;
                let ledger = LedgerView::new(&positions, &self.config.symbol, &self.config.label);
                let commands = engine.close_all(&ledger);
                info!("Closing {} positions on stop", commands.len());

                report = self.adapter.execute(commands).await;
                self.stats.closed += report.closed.len() as u64;
                self.stats.realized_profit += report.realized_profit();
                for (_, e) in &report.failures {
                    self.on_error(e);
                }
            }
        }

        self.summary = None;
        self.set_status(BotStatus::Stopped);
        info!(
            "Grid stopped: {} ticks, {} opened, {} closed, {} stopped out, realized {:.2}, {} errors",
            self.stats.ticks,
            self.stats.opened,
            self.stats.closed,
            self.stats.stopped_out,
            self.stats.realized_profit,
            self.stats.errors
        );
        Ok(report)
    }

    /// Report an error. Never fatal.
    pub fn on_error(&mut self, err: &GridError) {
        self.stats.errors += 1;
        error!("Error occurred: {}", err);
    }

    fn set_status(&mut self, status: BotStatus) {
        if self.status != status {
            self.status = status;
            info!("Bot status changed to {:?}", status);
        }
    }

    pub fn status(&self) -> BotStatus {
        self.status
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn engine(&self) -> Option<&GridEngine> {
        self.engine.as_ref()
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Status line from the most recent tick
    pub fn summary(&self) -> Option<&LadderSummary> {
        self.summary.as_ref()
    }

    pub fn exchange(&self) -> &Arc<E> {
        self.adapter.exchange()
    }

    /// Log the current status line
    pub fn log_summary(&self) {
        match &self.summary {
            Some(summary) => info!("{}", summary),
            None => warn!("No ticks processed yet"),
        }
    }
}
