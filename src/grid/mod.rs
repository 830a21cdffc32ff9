//! Grid Ladder Trading Module
//!
//! A per-direction ladder strategy: a ladder opens on a two-bar momentum
//! signal, adds exponentially sized rungs each time price moves `pip_step`
//! beyond its worst entry, and is closed as a whole once its average net
//! profit reaches the target.
//!
//! # Architecture
//!
//! The grid module is organized into several sub-modules:
//!
//! - [`config`] - Strategy configuration, instrument properties, volume normalization
//! - [`types`] - Core data types (Direction, Position, GridCommand, etc.)
//! - [`errors`] - Grid-specific error types
//! - [`ledger`] - Read-only per-tick view over the broker's position book
//! - [`engine`] - Ladder state machine, one decision per tick
//! - [`executor`] - Broker abstraction (mockable for testing) and command execution
//! - [`paper`] - In-process paper broker
//! - [`manager`] - Lifecycle hooks around the engine
//! - [`runner`] - Main execution loop
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use grid_ladder_bot::grid::{
//!     GridConfig, GridManager, GridRunner, InstrumentSpec, PaperExchange, RunnerConfig,
//! };
//! use grid_ladder_bot::market::ReplayFeed;
//!
//! let config = GridConfig::new("EURUSD", "GridLadderBot")
//!     .with_pip_step(10)
//!     .with_volume_exponent(1.5);
//!
//! let exchange = PaperExchange::new(InstrumentSpec::new("EURUSD", 0.0001), 10_000.0);
//! let manager = GridManager::new(config, Arc::new(exchange), 3600);
//! let feed = ReplayFeed::from_csv("quotes.csv")?;
//!
//! let mut runner = GridRunner::new(manager, feed, RunnerConfig::default());
//! let stats = runner.run().await?;
//! ```
//!
//! # Testing
//!
//! The module provides a mock broker for testing without a venue:
//!
//! ```rust,ignore
//! use grid_ladder_bot::grid::executor::mock::MockExchange;
//!
//! let exchange = MockExchange::new(1.1050);
//! exchange.set_should_fail(true).await;
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod ledger;
pub mod manager;
pub mod paper;
pub mod runner;
pub mod types;

// Re-export commonly used types
pub use config::{GridConfig, InstrumentSpec};
pub use engine::{GridEngine, TradeGuard};
pub use errors::{GridError, GridResult};
pub use executor::{ExecutionAdapter, ExecutionReport, GridExchange};
pub use ledger::LedgerView;
pub use manager::{GridManager, LadderSummary, RunStats};
pub use paper::PaperExchange;
pub use runner::{GridRunner, RunnerConfig};
pub use types::{
    BotStatus, CloseReason, Direction, GridCommand, LadderState, OpenRequest, Position,
};
